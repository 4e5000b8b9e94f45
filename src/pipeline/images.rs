//! Embedded-image extraction via `lopdf`.
//!
//! pdfium renders pages but does not hand back an image XObject's original
//! stream, so a second, object-level view of the file is opened with `lopdf`.
//! For each page we walk `/Resources /XObject`, keep the entries whose
//! `/Subtype` is `/Image`, and try to decode their raw (still filtered)
//! stream bytes as a standalone image file. That works for the common
//! encodings (`DCTDecode` is a JPEG file, many producers embed PNG/TIFF
//! payloads verbatim). Raw pixel data behind `FlateDecode`, JBIG2, CCITT and
//! the like is not a self-describing file and gets skipped.
//!
//! Extraction is best effort: one bad image never fails the page.

use crate::error::{PageWarning, Pdf2EpubError};
use crate::pipeline::encode;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Guard against `/Parent` cycles in malformed page trees.
const MAX_PARENT_DEPTH: usize = 32;

/// An embedded image re-encoded for the package.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// XObject resource name, e.g. `Im0`.
    pub name: String,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Everything pulled off one page.
#[derive(Debug, Clone, Default)]
pub struct PageImages {
    pub images: Vec<EmbeddedImage>,
    pub warnings: Vec<PageWarning>,
}

/// Object-level view of the source PDF.
pub struct ImageSource {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl ImageSource {
    /// Load `pdf_path` with lopdf.
    pub fn open(pdf_path: &Path) -> Result<Self, Pdf2EpubError> {
        let document = Document::load(pdf_path).map_err(|e| Pdf2EpubError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: Document) -> Self {
        let pages = document.get_pages();
        debug!("lopdf page tree: {} pages", pages.len());
        Self { document, pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Extract and transcode every image on `page_num` (1-indexed).
    ///
    /// A page lopdf cannot find yields no images.
    pub fn page_images(&self, page_num: usize, jpeg_quality: u8) -> PageImages {
        match self.pages.get(&(page_num as u32)) {
            Some(&page_id) => extract_page_images(&self.document, page_id, page_num, jpeg_quality),
            None => {
                debug!("Page {} not in lopdf page tree; no embedded images", page_num);
                PageImages::default()
            }
        }
    }
}

/// Follow a reference to its object; direct objects are returned as-is.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, lopdf::Error> {
    match obj {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}

/// The page's `/Resources`, inherited from ancestors when absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = node.get(b"Resources").ok().and_then(|r| resolve_dict(doc, r)) {
            return Some(resources);
        }
        node = match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => doc.get_dictionary(*parent).ok()?,
            _ => return None,
        };
    }
    None
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Image")
}

/// Walk a page's XObjects and transcode the image ones.
pub fn extract_page_images(
    doc: &Document,
    page_id: ObjectId,
    page_num: usize,
    jpeg_quality: u8,
) -> PageImages {
    let mut out = PageImages::default();

    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"XObject").ok())
        .and_then(|x| resolve_dict(doc, x))
    else {
        return out;
    };

    for (key, value) in xobjects.iter() {
        let name = String::from_utf8_lossy(key).into_owned();

        let stream = match resolve(doc, value) {
            Ok(Object::Stream(stream)) => stream,
            Ok(_) => continue,
            Err(e) => {
                skip(
                    &mut out,
                    PageWarning::ImageUnreadable {
                        page: page_num,
                        name,
                        detail: e.to_string(),
                    },
                );
                continue;
            }
        };

        if !is_image_subtype(&stream.dict) {
            continue;
        }

        if stream.content.is_empty() {
            skip(
                &mut out,
                PageWarning::ImageUnreadable {
                    page: page_num,
                    name,
                    detail: "empty stream".to_string(),
                },
            );
            continue;
        }

        match transcode(&stream.content, jpeg_quality) {
            Ok((jpeg, width, height)) => {
                debug!("Page {}: image '{}' {}x{} px", page_num, name, width, height);
                out.images.push(EmbeddedImage {
                    name,
                    jpeg,
                    width,
                    height,
                });
            }
            Err(e) => skip(
                &mut out,
                PageWarning::ImageUndecodable {
                    page: page_num,
                    name,
                    detail: e.to_string(),
                },
            ),
        }
    }

    out
}

fn skip(out: &mut PageImages, warning: PageWarning) {
    warn!("{}", warning);
    out.warnings.push(warning);
}

/// Decode a self-describing image payload and re-encode it as RGB JPEG.
///
/// Returns the JPEG bytes and the image dimensions.
pub fn transcode(raw: &[u8], jpeg_quality: u8) -> Result<(Vec<u8>, u32, u32), image::ImageError> {
    let img = image::load_from_memory(raw)?;
    let jpeg = encode::encode_jpeg(&img, jpeg_quality)?;
    Ok((jpeg, img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use lopdf::{dictionary, Stream};

    fn sample_jpeg() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([10, 200, 30])));
        encode::encode_jpeg(&img, 90).unwrap()
    }

    fn image_stream(content: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 6,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            content,
        )
    }

    /// One page whose resources live on the parent `/Pages` node.
    fn document_with_xobjects(xobjects: Vec<(&str, Stream)>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut xobject_dict = Dictionary::new();
        for (name, stream) in xobjects {
            let id = doc.add_object(stream);
            xobject_dict.set(name, id);
        }
        let resources_id = doc.add_object(dictionary! { "XObject" => xobject_dict });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn transcodes_jpeg_payload() {
        let (jpeg, w, h) = transcode(&sample_jpeg(), 95).unwrap();
        assert_eq!((w, h), (8, 6));
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    fn encoded(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn assert_rgb_jpeg(raw: &[u8], size: (u32, u32)) {
        let (jpeg, w, h) = transcode(raw, 90).unwrap();
        assert_eq!((w, h), size);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), size);
    }

    #[test]
    fn transcodes_cmyk_jpeg() {
        let raw = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/cmyk_8x8.jpg"));
        assert_rgb_jpeg(raw, (8, 8));
    }

    #[test]
    fn transcodes_palette_images() {
        let png = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/palette_4x2.png"));
        assert_rgb_jpeg(png, (4, 2));

        let gif = encoded(
            DynamicImage::ImageRgba8(image::RgbaImage::from_fn(6, 4, |x, _| {
                image::Rgba([if x % 2 == 0 { 255 } else { 0 }, 0, 0, 255])
            })),
            image::ImageFormat::Gif,
        );
        assert_rgb_jpeg(&gif, (6, 4));
    }

    #[test]
    fn transcodes_grey_alpha_and_sixteen_bit_images() {
        let grey_alpha = encoded(
            DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(5, 3, image::LumaA([90, 40]))),
            image::ImageFormat::Png,
        );
        assert_rgb_jpeg(&grey_alpha, (5, 3));

        let rgba16 = encoded(
            DynamicImage::ImageRgba16(image::ImageBuffer::from_pixel(
                7,
                2,
                image::Rgba([65_535u16, 1_000, 30_000, 20_000]),
            )),
            image::ImageFormat::Png,
        );
        assert_rgb_jpeg(&rgba16, (7, 2));

        let grey_jpeg = encoded(
            DynamicImage::ImageLuma8(image::GrayImage::from_pixel(9, 9, image::Luma([128]))),
            image::ImageFormat::Jpeg,
        );
        assert_rgb_jpeg(&grey_jpeg, (9, 9));
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(transcode(b"definitely not an image", 95).is_err());
    }

    #[test]
    fn extracts_images_and_skips_corrupt_ones() {
        let good = sample_jpeg();
        let truncated = good[..64].to_vec();
        let form = Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            b"q Q".to_vec(),
        );
        let (doc, page_id) = document_with_xobjects(vec![
            ("Im1", image_stream(good.clone())),
            ("Im2", image_stream(truncated)),
            ("Fm1", form),
            ("Im3", image_stream(good)),
        ]);

        let out = extract_page_images(&doc, page_id, 4, 95);

        let names: Vec<&str> = out.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Im1", "Im3"]);
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            &out.warnings[0],
            PageWarning::ImageUndecodable { page: 4, name, .. } if name == "Im2"
        ));
    }

    #[test]
    fn empty_stream_is_reported_unreadable() {
        let (doc, page_id) = document_with_xobjects(vec![("Im0", image_stream(Vec::new()))]);
        let out = extract_page_images(&doc, page_id, 1, 95);
        assert!(out.images.is_empty());
        assert!(matches!(out.warnings[0], PageWarning::ImageUnreadable { .. }));
    }

    #[test]
    fn page_without_resources_has_no_images() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        let out = extract_page_images(&doc, page_id, 1, 95);
        assert!(out.images.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn image_source_maps_page_numbers() {
        let (doc, _) = document_with_xobjects(vec![("Im1", image_stream(sample_jpeg()))]);
        let source = ImageSource::from_document(doc);
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.page_images(1, 95).images.len(), 1);
        assert!(source.page_images(2, 95).images.is_empty());
    }
}
