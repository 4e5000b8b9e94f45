//! Book assembly: turns per-page pipeline output into an [`EpubPackage`].
//!
//! Everything lands in a single chapter. For each page, in order:
//!
//! 1. the full-page render
//! 2. the page's headings and paragraphs
//! 3. the page's embedded images
//!
//! Resource names and ids come from two running counters owned by the
//! assembler, so they are unique across the package.

pub mod epub;
pub mod markup;

use crate::error::Pdf2EpubError;
use crate::pipeline::images::EmbeddedImage;
use crate::pipeline::text::ParagraphClassifier;
use epub::{BookMetadata, EpubPackage, TocEntry, MEDIA_CSS, MEDIA_JPEG, MEDIA_XHTML};
use markup::ChapterWriter;
use tracing::debug;

/// Book language written to the package and the chapter.
pub const LANGUAGE: &str = "zh";

pub const CHAPTER_ID: &str = "content";
pub const CHAPTER_FILE: &str = "content.xhtml";
pub const CHAPTER_TITLE: &str = "Main Content";

pub const STYLESHEET_ID: &str = "style_css";
pub const STYLESHEET_FILE: &str = "style/style.css";

/// What the pipeline produced for one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-indexed page number.
    pub page_num: usize,
    pub fullpage_jpeg: Vec<u8>,
    /// Raw text layer as returned by the extractor.
    pub text: String,
    pub embedded: Vec<EmbeddedImage>,
}

/// What one [`BookAssembler::add_page`] call added to the chapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageAdded {
    pub text_blocks: usize,
    pub embedded_images: usize,
}

/// Totals over the whole book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookCounts {
    pub fullpage_images: usize,
    pub embedded_images: usize,
    pub text_blocks: usize,
}

/// Accumulates pages into one chapter plus image resources.
pub struct BookAssembler {
    package: EpubPackage,
    classifier: ParagraphClassifier,
    chapter: ChapterWriter,
    counts: BookCounts,
}

impl BookAssembler {
    pub fn new(metadata: BookMetadata) -> Result<Self, Pdf2EpubError> {
        let mut chapter = ChapterWriter::new(CHAPTER_TITLE, &metadata.language, STYLESHEET_FILE)?;
        chapter.title(&metadata.title)?;
        let mut package = EpubPackage::new(metadata);
        package.add_resource(
            STYLESHEET_ID,
            STYLESHEET_FILE,
            MEDIA_CSS,
            markup::STYLESHEET.as_bytes().to_vec(),
        )?;
        Ok(Self {
            package,
            classifier: ParagraphClassifier::new(),
            chapter,
            counts: BookCounts::default(),
        })
    }

    pub fn counts(&self) -> BookCounts {
        self.counts
    }

    /// Append one page to the chapter.
    pub fn add_page(&mut self, page: PageContent) -> Result<PageAdded, Pdf2EpubError> {
        let page_num = page.page_num;

        self.counts.fullpage_images += 1;
        let href = format!("images/fullpage_{page_num:03}.jpg");
        self.package.add_resource(
            format!("fullpage_{}", self.counts.fullpage_images),
            href.clone(),
            MEDIA_JPEG,
            page.fullpage_jpeg,
        )?;
        self.chapter.fullpage_image(&href, page_num)?;

        let blocks = self.classifier.classify_page(&page.text);
        for block in &blocks {
            self.chapter.text_block(block)?;
        }
        self.counts.text_blocks += blocks.len();

        let embedded_images = page.embedded.len();
        for image in page.embedded {
            self.counts.embedded_images += 1;
            let n = self.counts.embedded_images;
            let href = format!("images/embedded_{page_num:03}_{n:03}.jpg");
            debug!("Page {}: embedded '{}' → {}", page_num, image.name, href);
            self.package
                .add_resource(format!("embedded_{n}"), href.clone(), MEDIA_JPEG, image.jpeg)?;
            self.chapter.embedded_image(&href, n)?;
        }

        Ok(PageAdded {
            text_blocks: blocks.len(),
            embedded_images,
        })
    }

    /// Close the chapter and return the finished package.
    pub fn finish(mut self) -> Result<(EpubPackage, BookCounts), Pdf2EpubError> {
        let chapter = self.chapter.finish()?;
        self.package
            .add_resource(CHAPTER_ID, CHAPTER_FILE, MEDIA_XHTML, chapter)?;
        self.package.push_spine(CHAPTER_ID)?;
        self.package.push_toc(TocEntry {
            id: CHAPTER_ID.to_string(),
            href: CHAPTER_FILE.to_string(),
            label: CHAPTER_TITLE.to_string(),
        });
        Ok((self.package, self.counts))
    }
}
