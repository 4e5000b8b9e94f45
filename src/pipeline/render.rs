//! Full-page rasterisation and text extraction via pdfium.
//!
//! ## Which box gets rendered?
//!
//! PDF pages carry up to five nested boundary boxes. Print-ready files often
//! set a bleed or trim box that differs from the crop box, and the bleed box
//! is the one that shows the page as designed. We pick the first non-empty
//! box in the order bleed → trim → crop → media.
//!
//! pdfium always rasterises the visible (crop) area, so the chosen box is
//! mapped into the rendered bitmap's pixel space and the bitmap is cropped
//! to it. Parts of the box outside the visible area are clipped away.
//!
//! Boxes are defined in unrotated page space while pdfium applies `/Rotate`
//! when rasterising. The region is computed against the unrotated bitmap
//! size and then turned with the page ([`rotate_region`]).

use crate::error::Pdf2EpubError;
use crate::output::DocumentMetadata;
use crate::pipeline::encode;
use crate::pipeline::text::{self, TextRun};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

// ── Binding ──────────────────────────────────────────────────────────────────

/// Bind to a pdfium library.
///
/// Searches, in order:
/// 1. `PDFIUM_LIB_PATH` (a file or a directory containing the library)
/// 2. the current directory
/// 3. system library paths
pub fn bind_pdfium() -> Result<Pdfium, Pdf2EpubError> {
    let from_env = std::env::var("PDFIUM_LIB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(|p| {
            let path = Path::new(&p);
            if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            }
        });

    let local = || Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"));

    let bindings = match from_env {
        Some(path) => Pdfium::bind_to_library(&path).or_else(|_| local()),
        None => local(),
    }
    .or_else(|_| Pdfium::bind_to_system_library())
    .map_err(|e| Pdf2EpubError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF for rendering.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, Pdf2EpubError> {
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Pdf2EpubError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;
    info!("PDF loaded: {} pages", document.pages().len());
    Ok(document)
}

// ── Page boxes ───────────────────────────────────────────────────────────────

/// A page boundary rectangle in PDF points (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl PageBox {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Zero or negative area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    fn from_rect(rect: &PdfRect) -> Self {
        Self::new(
            rect.left().value,
            rect.bottom().value,
            rect.right().value,
            rect.top().value,
        )
    }
}

/// Which boundary box was used for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BoxKind {
    Bleed,
    Trim,
    Crop,
    Media,
}

/// The boundary boxes a page declares. Only the media box is mandatory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBoxes {
    pub bleed: Option<PageBox>,
    pub trim: Option<PageBox>,
    pub crop: Option<PageBox>,
    pub media: PageBox,
}

impl PageBoxes {
    /// Read the boxes from a pdfium page.
    pub fn from_page(page: &PdfPage) -> Self {
        let boundaries = page.boundaries();
        let media = boundaries
            .media()
            .map(|b| PageBox::from_rect(&b.bounds))
            .unwrap_or_else(|_| PageBox::new(0.0, 0.0, page.width().value, page.height().value));

        Self {
            bleed: boundaries.bleed().ok().map(|b| PageBox::from_rect(&b.bounds)),
            trim: boundaries.trim().ok().map(|b| PageBox::from_rect(&b.bounds)),
            crop: boundaries.crop().ok().map(|b| PageBox::from_rect(&b.bounds)),
            media,
        }
    }

    /// First non-empty box in priority order bleed → trim → crop, else media.
    pub fn select(&self) -> (BoxKind, PageBox) {
        [
            (BoxKind::Bleed, self.bleed),
            (BoxKind::Trim, self.trim),
            (BoxKind::Crop, self.crop),
        ]
        .into_iter()
        .find_map(|(kind, b)| b.filter(|b| !b.is_empty()).map(|b| (kind, b)))
        .unwrap_or((BoxKind::Media, self.media))
    }

    /// The area pdfium actually rasterises.
    pub fn visible(&self) -> PageBox {
        self.crop
            .filter(|b| !b.is_empty())
            .unwrap_or(self.media)
    }
}

/// A rectangle in bitmap pixels (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Map `target` (PDF points) into a `img_width × img_height` bitmap that
/// shows exactly `visible`.
///
/// Returns `None` when the intersection with the bitmap is empty.
pub fn pixel_region(
    target: &PageBox,
    visible: &PageBox,
    img_width: u32,
    img_height: u32,
) -> Option<PixelRegion> {
    if visible.is_empty() || img_width == 0 || img_height == 0 {
        return None;
    }
    let sx = img_width as f32 / visible.width();
    let sy = img_height as f32 / visible.height();

    let to_px = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
    let x0 = to_px((target.left - visible.left) * sx, img_width);
    let x1 = to_px((target.right - visible.left) * sx, img_width);
    let y0 = to_px((visible.top - target.top) * sy, img_height);
    let y1 = to_px((visible.top - target.bottom) * sy, img_height);

    (x1 > x0 && y1 > y0).then(|| PixelRegion {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Clockwise page rotation in degrees: 0, 90, 180 or 270.
pub fn rotation_degrees(rotation: &PdfPageRenderRotation) -> u16 {
    match rotation {
        PdfPageRenderRotation::None => 0,
        PdfPageRenderRotation::Degrees90 => 90,
        PdfPageRenderRotation::Degrees180 => 180,
        PdfPageRenderRotation::Degrees270 => 270,
    }
}

/// Move `region`, computed on an unrotated `width × height` bitmap, to where
/// it lands once the bitmap is turned clockwise by `degrees`.
///
/// Any other angle leaves the region as is.
pub fn rotate_region(region: PixelRegion, degrees: u16, width: u32, height: u32) -> PixelRegion {
    let PixelRegion { x, y, width: w, height: h } = region;
    match degrees {
        90 => PixelRegion {
            x: height.saturating_sub(y + h),
            y: x,
            width: h,
            height: w,
        },
        180 => PixelRegion {
            x: width.saturating_sub(x + w),
            y: height.saturating_sub(y + h),
            width: w,
            height: h,
        },
        270 => PixelRegion {
            x: y,
            y: width.saturating_sub(x + w),
            width: h,
            height: w,
        },
        _ => region,
    }
}

/// Crop region for a bitmap of `img_width × img_height` rendered with the
/// page turned clockwise by `degrees`.
pub fn clip_region(
    boxes: &PageBoxes,
    degrees: u16,
    img_width: u32,
    img_height: u32,
) -> Option<PixelRegion> {
    let (_, target) = boxes.select();
    let quarter_turn = degrees == 90 || degrees == 270;
    let (width, height) = if quarter_turn {
        (img_height, img_width)
    } else {
        (img_width, img_height)
    };
    pixel_region(&target, &boxes.visible(), width, height)
        .map(|region| rotate_region(region, degrees, width, height))
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// A rasterised page ready for the package.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub box_kind: BoxKind,
}

/// Rasterise one page at `scale` pixels per point and encode it as JPEG.
///
/// `page_num` is 1-indexed and only used for errors and logs.
pub fn render_page(
    page: &PdfPage,
    page_num: usize,
    scale: f32,
    jpeg_quality: u8,
) -> Result<RenderedPage, Pdf2EpubError> {
    let boxes = PageBoxes::from_page(page);
    let (box_kind, _) = boxes.select();

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| Pdf2EpubError::RasterisationFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;
    let mut image = bitmap.as_image();

    let degrees = page.rotation().map(|r| rotation_degrees(&r)).unwrap_or(0);
    if let Some(region) = clip_region(&boxes, degrees, image.width(), image.height()) {
        if region.width != image.width() || region.height != image.height() {
            image = image.crop_imm(region.x, region.y, region.width, region.height);
        }
    }

    let jpeg = encode::encode_jpeg(&image, jpeg_quality).map_err(|e| {
        Pdf2EpubError::RasterisationFailed {
            page: page_num,
            detail: format!("JPEG encoding failed: {}", e),
        }
    })?;

    debug!(
        "Rendered page {} ({:?} box, {}°) → {}x{} px",
        page_num,
        box_kind,
        degrees,
        image.width(),
        image.height()
    );

    Ok(RenderedPage {
        jpeg,
        width: image.width(),
        height: image.height(),
        box_kind,
    })
}

/// Extract a page's text layer, laid out so that large vertical gaps become
/// blank lines (see [`text::layout_text`]).
pub fn page_text(page: &PdfPage, page_num: usize) -> Result<String, Pdf2EpubError> {
    let page_text = page
        .text()
        .map_err(|e| Pdf2EpubError::TextExtractionFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let runs: Vec<TextRun> = page_text
        .segments()
        .iter()
        .map(|segment| {
            let bounds = segment.bounds();
            TextRun {
                text: segment.text(),
                left: bounds.left().value,
                right: bounds.right().value,
                bottom: bounds.bottom().value,
                top: bounds.top().value,
            }
        })
        .collect();

    if runs.is_empty() {
        return Ok(page_text.all());
    }
    debug!("Page {}: {} text segments", page_num, runs.len());
    Ok(text::layout_text(&runs))
}

/// Document metadata from the info dictionary.
pub fn extract_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> PageBox {
        PageBox::new(0.0, 0.0, 612.0, 792.0)
    }

    #[test]
    fn empty_box_detection() {
        assert!(PageBox::new(0.0, 0.0, 0.0, 0.0).is_empty());
        assert!(PageBox::new(10.0, 10.0, 5.0, 20.0).is_empty());
        assert!(!letter().is_empty());
    }

    #[test]
    fn bleed_wins_when_present() {
        let bleed = PageBox::new(-9.0, -9.0, 621.0, 801.0);
        let boxes = PageBoxes {
            bleed: Some(bleed),
            trim: Some(PageBox::new(9.0, 9.0, 603.0, 783.0)),
            crop: Some(letter()),
            media: letter(),
        };
        assert_eq!(boxes.select(), (BoxKind::Bleed, bleed));
    }

    #[test]
    fn empty_bleed_falls_back_to_trim() {
        let trim = PageBox::new(18.0, 18.0, 594.0, 774.0);
        let boxes = PageBoxes {
            bleed: Some(PageBox::new(0.0, 0.0, 0.0, 0.0)),
            trim: Some(trim),
            crop: Some(letter()),
            media: letter(),
        };
        assert_eq!(boxes.select(), (BoxKind::Trim, trim));
    }

    #[test]
    fn media_is_last_resort() {
        let boxes = PageBoxes {
            bleed: None,
            trim: None,
            crop: Some(PageBox::new(5.0, 5.0, 5.0, 5.0)),
            media: letter(),
        };
        assert_eq!(boxes.select(), (BoxKind::Media, letter()));
        assert_eq!(boxes.visible(), letter());
    }

    #[test]
    fn trim_box_maps_to_inner_pixels() {
        // 612x792 pt rendered at 1 px/pt, trim inset 18 pt on every side.
        let trim = PageBox::new(18.0, 18.0, 594.0, 774.0);
        let region = pixel_region(&trim, &letter(), 612, 792).unwrap();
        assert_eq!(
            region,
            PixelRegion {
                x: 18,
                y: 18,
                width: 576,
                height: 756
            }
        );
    }

    #[test]
    fn region_scales_with_bitmap() {
        let upper_half = PageBox::new(0.0, 396.0, 612.0, 792.0);
        let region = pixel_region(&upper_half, &letter(), 2550, 3300).unwrap();
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 2550);
        assert_eq!(region.height, 1650);
    }

    #[test]
    fn oversized_bleed_clamps_to_bitmap() {
        let bleed = PageBox::new(-9.0, -9.0, 621.0, 801.0);
        let region = pixel_region(&bleed, &letter(), 612, 792).unwrap();
        assert_eq!(
            region,
            PixelRegion {
                x: 0,
                y: 0,
                width: 612,
                height: 792
            }
        );
    }

    #[test]
    fn quarter_turn_moves_region() {
        // 100x200 unrotated bitmap, region hugging the top-left corner.
        let region = PixelRegion { x: 10, y: 20, width: 30, height: 40 };
        assert_eq!(
            rotate_region(region, 90, 100, 200),
            PixelRegion { x: 140, y: 10, width: 40, height: 30 }
        );
    }

    #[test]
    fn half_turn_moves_region() {
        let region = PixelRegion { x: 10, y: 20, width: 30, height: 40 };
        assert_eq!(
            rotate_region(region, 180, 100, 200),
            PixelRegion { x: 60, y: 140, width: 30, height: 40 }
        );
    }

    #[test]
    fn three_quarter_turn_moves_region() {
        let region = PixelRegion { x: 10, y: 20, width: 30, height: 40 };
        assert_eq!(
            rotate_region(region, 270, 100, 200),
            PixelRegion { x: 20, y: 60, width: 40, height: 30 }
        );
    }

    #[test]
    fn no_turn_keeps_region() {
        let region = PixelRegion { x: 1, y: 2, width: 3, height: 4 };
        assert_eq!(rotate_region(region, 0, 10, 10), region);
    }

    #[test]
    fn rotated_bitmap_is_clipped_to_trim_box() {
        // Letter page with a 36 pt trim margin, rotated a quarter turn: the
        // landscape bitmap is 792x612 px at 1 px/pt.
        let boxes = PageBoxes {
            bleed: None,
            trim: Some(PageBox::new(36.0, 36.0, 576.0, 756.0)),
            crop: None,
            media: letter(),
        };
        for degrees in [90, 270] {
            assert_eq!(
                clip_region(&boxes, degrees, 792, 612),
                Some(PixelRegion { x: 36, y: 36, width: 720, height: 540 }),
                "{degrees}°"
            );
        }
        assert_eq!(
            clip_region(&boxes, 180, 612, 792),
            Some(PixelRegion { x: 36, y: 36, width: 540, height: 720 })
        );
    }

    #[test]
    fn rotated_asymmetric_box_follows_the_page() {
        // Bleed box that only trims the left 100 pt of the unrotated page.
        let boxes = PageBoxes {
            bleed: Some(PageBox::new(100.0, 0.0, 612.0, 792.0)),
            trim: None,
            crop: None,
            media: letter(),
        };
        assert_eq!(
            clip_region(&boxes, 0, 612, 792),
            Some(PixelRegion { x: 100, y: 0, width: 512, height: 792 })
        );
        // Turned clockwise, the unrotated left edge becomes the top edge.
        assert_eq!(
            clip_region(&boxes, 90, 792, 612),
            Some(PixelRegion { x: 0, y: 100, width: 792, height: 512 })
        );
        assert_eq!(
            clip_region(&boxes, 180, 612, 792),
            Some(PixelRegion { x: 0, y: 0, width: 512, height: 792 })
        );
        assert_eq!(
            clip_region(&boxes, 270, 792, 612),
            Some(PixelRegion { x: 0, y: 0, width: 792, height: 512 })
        );
    }

    #[test]
    fn disjoint_box_has_no_region() {
        let outside = PageBox::new(700.0, 0.0, 800.0, 100.0);
        assert_eq!(pixel_region(&outside, &letter(), 612, 792), None);
    }
}
