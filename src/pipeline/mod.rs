//! Pipeline stages for PDF-to-EPUB conversion.
//!
//! Each submodule implements one transformation step; the driver in
//! [`crate::convert`] runs them page by page and hands the results to
//! [`crate::package::BookAssembler`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ images ──▶ text ──▶ package
//! (path)   (pdfium)   (lopdf)    (split/classify)
//! ```
//!
//! 1. [`input`]: validate the user-supplied path, derive output path and
//!    book identifier
//! 2. [`render`]: pick the page box (bleed → trim → crop → media) and
//!    rasterise it to JPEG
//! 3. [`images`]: pull every image XObject off the page, best effort
//! 4. [`text`]: lay positioned text out as lines and paragraphs, normalise
//!    it and classify headings
//! 5. [`encode`]: shared RGB/JPEG encoding used by stages 2 and 3

pub mod encode;
pub mod images;
pub mod input;
pub mod render;
pub mod text;
