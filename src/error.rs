//! Error types for the pdf2epub library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2EpubError`]: **Fatal**: the conversion cannot proceed at all
//!   (bad input file, pdfium missing, a page failed to rasterise). Returned
//!   as `Err(Pdf2EpubError)` from the top-level `convert*` functions. No
//!   output file is written.
//!
//! * [`PageWarning`]: **Non-fatal**: a single embedded image on a page could
//!   not be read or decoded. The image is dropped, everything else on the
//!   page (full-page render, text, other images) is kept, and the warning is
//!   stored in [`crate::output::ConversionOutput::warnings`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2epub library.
#[derive(Debug, Error)]
pub enum Pdf2EpubError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error while rasterising a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// pdfium could not load the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The EPUB container could not be assembled.
    #[error("Failed to build EPUB package: {0}")]
    PackageFailed(String),

    /// Could not create or write the output EPUB file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or\n\
set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for Pdf2EpubError {
    fn from(e: zip::result::ZipError) -> Self {
        Pdf2EpubError::PackageFailed(e.to_string())
    }
}

impl From<quick_xml::Error> for Pdf2EpubError {
    fn from(e: quick_xml::Error) -> Self {
        Pdf2EpubError::PackageFailed(format!("XML: {e}"))
    }
}

/// A non-fatal problem with one embedded image.
///
/// The page it belongs to is still converted; only the image is omitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageWarning {
    /// The XObject could not be resolved or its stream is empty.
    #[error("Page {page}: image '{name}' unreadable: {detail}")]
    ImageUnreadable {
        page: usize,
        name: String,
        detail: String,
    },

    /// The stream bytes are not in a format the image decoder recognises,
    /// or decoding/re-encoding failed.
    #[error("Page {page}: image '{name}' skipped: {detail}")]
    ImageUndecodable {
        page: usize,
        name: String,
        detail: String,
    },
}

impl PageWarning {
    /// 1-indexed page the warning belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageWarning::ImageUnreadable { page, .. } | PageWarning::ImageUndecodable { page, .. } => {
                *page
            }
        }
    }
}
