//! Configuration types for PDF-to-EPUB conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The builder clamps numeric knobs into
//! their valid ranges and [`ConversionConfigBuilder::build`] rejects anything
//! that still cannot work (an empty title, for instance).

use crate::error::Pdf2EpubError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default book title when none is given.
pub const DEFAULT_TITLE: &str = "Untitled Book";

/// Default author when none is given.
pub const DEFAULT_AUTHOR: &str = "Unknown Author";

/// Configuration for a PDF-to-EPUB conversion.
///
/// # Example
/// ```rust
/// use pdf2epub::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .title("Field Notes")
///     .author("A. Naturalist")
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.jpeg_quality, 95);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Book title written to the package metadata and the chapter heading.
    pub title: String,

    /// Single author written as `dc:creator`.
    pub author: String,

    /// Rendering DPI for full-page images. Range: 72–600. Default: 300.
    ///
    /// The page is rasterised at a scale factor of `dpi / 72`.
    pub dpi: u32,

    /// JPEG quality for every image in the package. Range: 1–100. Default: 95.
    pub jpeg_quality: u8,

    /// Word-count threshold for "low text" pages. Default: 100.
    ///
    /// Reported per page in [`crate::output::PageSummary::below_threshold`].
    /// Every page gets a full-page image regardless of this value.
    pub word_threshold: usize,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            dpi: 300,
            jpeg_quality: 95,
            word_threshold: 100,
            pages: PageSelection::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("author", &self.author)
            .field("dpi", &self.dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("word_threshold", &self.word_threshold)
            .field("pages", &self.pages)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Scale factor applied to PDF points when rasterising.
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = author.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn word_threshold(mut self, words: usize) -> Self {
        self.config.word_threshold = words;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2EpubError> {
        let c = &self.config;
        if c.title.trim().is_empty() {
            return Err(Pdf2EpubError::InvalidConfig("Title must not be empty".into()));
        }
        if c.author.trim().is_empty() {
            return Err(Pdf2EpubError::InvalidConfig("Author must not be empty".into()));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(Pdf2EpubError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive). An end of
    /// `usize::MAX` runs to the last page.
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

/// Most pages a list selection may expand to. pdfium indexes pages with a `u16`.
const MAX_LISTED_PAGES: usize = u16::MAX as usize + 1;

/// A selection resolved against a document's page count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPages {
    /// Sorted, deduplicated 0-indexed pages to convert.
    pub indices: Vec<usize>,
    /// Requested 1-indexed pages the document does not have, as inclusive
    /// spans. An open-ended range reports `usize::MAX` as its end.
    pub missing: Vec<(usize, usize)>,
}

impl ResolvedPages {
    /// `"0, 9-12, 40-"`: the missing spans for a log line or error.
    pub fn describe_missing(&self) -> String {
        self.missing
            .iter()
            .map(|&(start, end)| match end {
                usize::MAX => format!("{start}-"),
                e if e == start => start.to_string(),
                e => format!("{start}-{e}"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PageSelection {
    /// Resolve against a document with `total_pages` pages.
    pub fn resolve(&self, total_pages: usize) -> ResolvedPages {
        let requested = match self {
            PageSelection::All => {
                return ResolvedPages {
                    indices: (0..total_pages).collect(),
                    missing: Vec::new(),
                }
            }
            PageSelection::Single(p) => vec![(*p, *p)],
            PageSelection::Range(start, end) => vec![(*start, *end)],
            PageSelection::Set(pages) => {
                let mut pages = pages.clone();
                pages.sort_unstable();
                pages.dedup();
                contiguous_spans(&pages)
            }
        };

        let mut resolved = ResolvedPages::default();
        for (start, end) in requested.into_iter().filter(|(s, e)| s <= e) {
            if start == 0 {
                resolved.missing.push((0, 0));
            }
            let (first, last) = (start.max(1), end.min(total_pages));
            if first <= last {
                resolved.indices.extend(first - 1..last);
            }
            if end > total_pages {
                resolved.missing.push((start.max(total_pages + 1), end));
            }
        }
        resolved.indices.sort_unstable();
        resolved.indices.dedup();
        resolved
    }

    /// 0-indexed pages to convert; see [`PageSelection::resolve`].
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        self.resolve(total_pages).indices
    }
}

/// Group sorted page numbers into inclusive runs.
fn contiguous_spans(pages: &[usize]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for &p in pages {
        match spans.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(p) => *end = p,
            _ => spans.push((p, p)),
        }
    }
    spans
}

/// Parses `all`, `5`, `3-15`, `12-` (to the last page) and comma lists
/// such as `1,3-5,9`.
impl FromStr for PageSelection {
    type Err = Pdf2EpubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let items: Vec<&str> = s.split(',').map(str::trim).collect();
        if let [item] = items.as_slice() {
            let (start, end) = parse_span(item)?;
            return Ok(if item.contains('-') {
                PageSelection::Range(start, end)
            } else {
                PageSelection::Single(start)
            });
        }

        let mut pages = Vec::new();
        for item in items {
            let (start, end) = parse_span(item)?;
            if end == usize::MAX {
                return Err(invalid_pages(item, "open-ended ranges cannot be combined"));
            }
            if pages.len() + (end - start + 1) > MAX_LISTED_PAGES {
                return Err(invalid_pages(s, "list names too many pages"));
            }
            pages.extend(start..=end);
        }
        Ok(PageSelection::Set(pages))
    }
}

fn invalid_pages(item: &str, why: &str) -> Pdf2EpubError {
    Pdf2EpubError::InvalidConfig(format!("Invalid page selection '{item}': {why}"))
}

/// `N` or `A-B` or `A-` as an inclusive 1-indexed span.
fn parse_span(item: &str) -> Result<(usize, usize), Pdf2EpubError> {
    let page = |text: &str| -> Result<usize, Pdf2EpubError> {
        match text.trim().parse::<usize>() {
            Ok(0) => Err(invalid_pages(item, "pages are 1-indexed")),
            Ok(p) => Ok(p),
            Err(_) => Err(invalid_pages(item, "expected a page number")),
        }
    };

    match item.split_once('-') {
        None => page(item).map(|p| (p, p)),
        Some((start, end)) => {
            let start = page(start)?;
            let end = if end.trim().is_empty() { usize::MAX } else { page(end)? };
            if start > end {
                return Err(invalid_pages(item, "start must not exceed end"));
            }
            Ok((start, end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.title, "Untitled Book");
        assert_eq!(c.author, "Unknown Author");
        assert_eq!(c.dpi, 300);
        assert_eq!(c.jpeg_quality, 95);
        assert_eq!(c.word_threshold, 100);
        assert_eq!(c.pages, PageSelection::All);
    }

    #[test]
    fn builder_clamps_ranges() {
        let c = ConversionConfig::builder()
            .dpi(10_000)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.jpeg_quality, 1);
    }

    #[test]
    fn render_scale_is_dpi_over_72() {
        let c = ConversionConfig::builder().dpi(144).build().unwrap();
        assert!((c.render_scale() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_title_rejected() {
        let err = ConversionConfig::builder().title("   ").build().unwrap_err();
        assert!(matches!(err, Pdf2EpubError::InvalidConfig(_)));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
        assert_eq!(PageSelection::Single(4).to_indices(3), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 9).to_indices(3), vec![1, 2]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(3), vec![0, 2]);
        assert_eq!(PageSelection::Range(2, usize::MAX).to_indices(4), vec![1, 2, 3]);
    }

    #[test]
    fn pages_past_the_end_are_reported() {
        let resolved = PageSelection::Range(2, 9).resolve(3);
        assert_eq!(resolved.indices, vec![1, 2]);
        assert_eq!(resolved.missing, vec![(4, 9)]);
        assert_eq!(resolved.describe_missing(), "4-9");

        let resolved = PageSelection::Set(vec![0, 2, 7, 5, 6, 12]).resolve(3);
        assert_eq!(resolved.indices, vec![1]);
        assert_eq!(resolved.missing, vec![(0, 0), (5, 7), (12, 12)]);
        assert_eq!(resolved.describe_missing(), "0, 5-7, 12");

        let resolved = PageSelection::Range(5, usize::MAX).resolve(3);
        assert!(resolved.indices.is_empty());
        assert_eq!(resolved.describe_missing(), "5-");

        assert!(PageSelection::All.resolve(3).missing.is_empty());
        assert!(PageSelection::Range(1, 3).resolve(3).missing.is_empty());
    }

    #[test]
    fn parses_page_selections() {
        let parse = |s: &str| s.parse::<PageSelection>().unwrap();
        assert_eq!(parse("all"), PageSelection::All);
        assert_eq!(parse(" ALL "), PageSelection::All);
        assert_eq!(parse(" 5 "), PageSelection::Single(5));
        assert_eq!(parse("3-15"), PageSelection::Range(3, 15));
        assert_eq!(parse("3 - 3"), PageSelection::Range(3, 3));
        assert_eq!(parse("12-"), PageSelection::Range(12, usize::MAX));
        assert_eq!(parse("1,3,5"), PageSelection::Set(vec![1, 3, 5]));
        assert_eq!(parse("1, 4-6 ,9"), PageSelection::Set(vec![1, 4, 5, 6, 9]));
    }

    #[test]
    fn rejects_bad_page_selections() {
        for bad in ["", "0", "9-3", "1,x", "1,0", "-4", "1,,2", "2-,5", "1-70000,2"] {
            let err = bad.parse::<PageSelection>().unwrap_err();
            assert!(matches!(err, Pdf2EpubError::InvalidConfig(_)), "{bad:?}");
        }
    }
}
