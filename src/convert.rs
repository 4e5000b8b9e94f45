//! Conversion entry points.
//!
//! The pipeline itself is synchronous: pdfium is not async-safe and pages
//! are processed strictly in order. The async functions move the whole run
//! onto `tokio::task::spawn_blocking` so callers on a runtime are not
//! stalled while pages rasterise.

use crate::config::ConversionConfig;
use crate::error::Pdf2EpubError;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, PageSummary};
use crate::package::epub::BookMetadata;
use crate::package::{BookAssembler, PageContent, LANGUAGE};
use crate::pipeline::images::ImageSource;
use crate::pipeline::{input, render, text};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file to an EPUB held in memory.
///
/// # Errors
/// Returns `Err(Pdf2EpubError)` for anything that stops the book from being
/// built: a missing or non-PDF input, pdfium not found, a page that fails to
/// rasterise. Embedded images that cannot be decoded are not errors; they
/// are listed in [`ConversionOutput::warnings`].
///
/// # Example
/// ```rust,no_run
/// use pdf2epub::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder().title("Atlas").build()?;
/// let output = convert("atlas.pdf", &config).await?;
/// std::fs::write("atlas.epub", &output.epub)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2EpubError> {
    let path = input_path.as_ref().to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || convert_blocking(&path, &config))
        .await
        .map_err(|e| Pdf2EpubError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Blocking variant of [`convert`] for callers without a runtime.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2EpubError> {
    convert_blocking(input_path.as_ref(), config)
}

/// Convert a PDF and write the EPUB to `output_path`.
///
/// The package is written to a sibling temp file and renamed into place, so
/// a failed run never leaves a partial `.epub` behind.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2EpubError> {
    let output = convert(input_path, config).await?;
    let path = output_path.as_ref();
    let write_err = |e| Pdf2EpubError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("epub.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, &output.epub).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    info!("Wrote {} ({} bytes)", path.display(), output.epub.len());
    Ok(output.stats)
}

/// Convert PDF bytes held in memory.
///
/// The bytes are spooled to a managed [`tempfile`] that is removed when the
/// call returns. The book identifier is derived from that temp file's name,
/// so pass an explicit title in `config`.
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2EpubError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2EpubError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2EpubError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_path_buf();
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(&path, config).await
}

/// Read document metadata without converting anything.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<DocumentMetadata, Pdf2EpubError> {
    let path = input_path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || inspect_blocking(&path))
        .await
        .map_err(|e| Pdf2EpubError::Internal(format!("Inspect task panicked: {}", e)))?
}

fn inspect_blocking(path: &Path) -> Result<DocumentMetadata, Pdf2EpubError> {
    let pdf_path = input::resolve_local(path)?;
    let pdfium = render::bind_pdfium()?;
    let document = render::open_document(&pdfium, &pdf_path)?;
    Ok(render::extract_metadata(&document))
}

// ── Pipeline ─────────────────────────────────────────────────────────────

fn convert_blocking(
    path: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2EpubError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", path.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf_path: PathBuf = input::resolve_local(path)?;

    // ── Step 2: Open both views of the document ──────────────────────────
    let pdfium = render::bind_pdfium()?;
    let document = render::open_document(&pdfium, &pdf_path)?;
    let images = ImageSource::open(&pdf_path)?;
    let metadata = render::extract_metadata(&document);
    let total_pages = metadata.page_count;
    if images.page_count() != total_pages {
        warn!(
            "Page tree mismatch: pdfium sees {} pages, lopdf sees {}",
            total_pages,
            images.page_count()
        );
    }

    // ── Step 3: Compute page indices ─────────────────────────────────────
    let resolved = config.pages.resolve(total_pages);
    if !resolved.missing.is_empty() {
        warn!(
            "Document has {} pages; skipping requested pages {}",
            total_pages,
            resolved.describe_missing()
        );
    }
    let page_indices = resolved.indices;
    if page_indices.is_empty() {
        return Err(Pdf2EpubError::PageOutOfRange {
            page: resolved.missing.first().map_or(0, |&(start, _)| start),
            total: total_pages,
        });
    }
    debug!("Selected {} of {} pages", page_indices.len(), total_pages);

    let selected = page_indices.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(selected);
    }

    let mut assembler = BookAssembler::new(BookMetadata {
        identifier: input::book_identifier(path),
        title: config.title.clone(),
        author: config.author.clone(),
        language: LANGUAGE.to_string(),
        modified: chrono::Utc::now(),
    })?;

    // ── Step 4: Walk pages in order ──────────────────────────────────────
    let pages = document.pages();
    let mut summaries = Vec::with_capacity(selected);
    let mut warnings = Vec::new();
    let mut render_duration_ms = 0u64;

    for &idx in &page_indices {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, selected);
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| Pdf2EpubError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let render_start = Instant::now();
        let rendered =
            render::render_page(&page, page_num, config.render_scale(), config.jpeg_quality)?;
        render_duration_ms += render_start.elapsed().as_millis() as u64;

        let page_images = images.page_images(page_num, config.jpeg_quality);
        if let Some(ref cb) = config.progress_callback {
            for w in &page_images.warnings {
                cb.on_image_skipped(w);
            }
        }

        let raw_text = render::page_text(&page, page_num)?;
        let word_count = text::count_words(&raw_text);
        let below_threshold = word_count < config.word_threshold;
        if below_threshold {
            info!(
                "Page {}: {} words (below threshold {}); full-page image kept",
                page_num, word_count, config.word_threshold
            );
        } else {
            info!("Page {}: {} words", page_num, word_count);
        }

        let skipped_images = page_images.warnings.len();
        let added = assembler.add_page(PageContent {
            page_num,
            fullpage_jpeg: rendered.jpeg,
            text: raw_text,
            embedded: page_images.images,
        })?;
        warnings.extend(page_images.warnings);

        let summary = PageSummary {
            page_num,
            word_count,
            below_threshold,
            text_blocks: added.text_blocks,
            embedded_images: added.embedded_images,
            skipped_images,
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(&summary, selected);
        }
        summaries.push(summary);
    }

    // ── Step 5: Serialise the package ────────────────────────────────────
    let (package, counts) = assembler.finish()?;
    let epub = package.to_bytes()?;

    let stats = ConversionStats {
        total_pages,
        processed_pages: summaries.len(),
        fullpage_images: counts.fullpage_images,
        embedded_images: counts.embedded_images,
        skipped_images: warnings.len(),
        text_blocks: counts.text_blocks,
        epub_bytes: epub.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
    };

    info!(
        "Conversion complete: {} pages, {} full-page images, {} embedded images, {}ms",
        stats.processed_pages, stats.fullpage_images, stats.embedded_images, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(counts.fullpage_images, counts.embedded_images);
    }

    Ok(ConversionOutput {
        epub,
        pages: summaries,
        warnings,
        metadata,
        stats,
    })
}
