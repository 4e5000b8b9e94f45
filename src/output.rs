//! Result types returned by the conversion entry points.

use crate::error::PageWarning;
use serde::{Deserialize, Serialize};

/// The finished EPUB plus what went into it.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Serialised EPUB container bytes.
    pub epub: Vec<u8>,
    /// One summary per converted page, in page order.
    pub pages: Vec<PageSummary>,
    /// Embedded images that were dropped.
    pub warnings: Vec<PageWarning>,
    /// Info-dictionary metadata of the source PDF.
    pub metadata: DocumentMetadata,
    /// Aggregate counters and timings.
    pub stats: ConversionStats,
}

/// Per-page outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Number of `\w+` runs in the extracted text.
    pub word_count: usize,
    /// `word_count < word_threshold`. Informational only.
    pub below_threshold: bool,
    /// Headings plus paragraphs emitted for this page.
    pub text_blocks: usize,
    /// Embedded images added for this page.
    pub embedded_images: usize,
    /// Embedded images dropped for this page.
    pub skipped_images: usize,
}

/// Aggregate statistics for a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that were converted.
    pub processed_pages: usize,
    /// Full-page renders in the package (one per processed page).
    pub fullpage_images: usize,
    /// Embedded images in the package.
    pub embedded_images: usize,
    /// Embedded images that could not be decoded.
    pub skipped_images: usize,
    /// Headings plus paragraphs across the whole chapter.
    pub text_blocks: usize,
    /// Size of the serialised EPUB in bytes.
    pub epub_bytes: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
}

/// Document-level metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
