//! # pdf2epub
//!
//! Convert PDF documents to EPUB e-books without losing anything on the page.
//!
//! Text extraction alone drops figures, marginalia and anything drawn rather
//! than typeset; page images alone are not searchable or reflowable. This
//! crate keeps both: every page is rendered as a full-page image, followed
//! by its extracted text (split into headings and paragraphs) and by every
//! embedded raster image pulled from the page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic
//!  ├─ 2. Render   pick bleed/trim/crop/media box, rasterise via pdfium → JPEG
//!  ├─ 3. Images   walk /XObject resources via lopdf, transcode to JPEG
//!  ├─ 4. Text     lay out positioned runs, split paragraphs, detect headings
//!  ├─ 5. Package  one chapter + stylesheet + nav + NCX
//!  └─ 6. Output   zip container bytes + per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2epub::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .title("Field Notes")
//!         .author("A. Naturalist")
//!         .build()?;
//!     let stats = convert_to_file("notes.pdf", "notes.epub", &config).await?;
//!     eprintln!(
//!         "{} full-page images, {} embedded images",
//!         stats.fullpage_images, stats.embedded_images
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2epub` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2epub = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! pdfium is bound at runtime. Set `PDFIUM_LIB_PATH` to the library (or its
//! directory), place it next to the working directory, or install it
//! system-wide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageSelection};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, inspect};
pub use error::{PageWarning, Pdf2EpubError};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageSummary};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
