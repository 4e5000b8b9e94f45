//! In-memory EPUB package and its zip serialisation.
//!
//! Layout of the written container:
//!
//! ```text
//! mimetype                  (first, stored, no extra fields)
//! META-INF/container.xml
//! EPUB/content.opf
//! EPUB/nav.xhtml
//! EPUB/toc.ncx
//! EPUB/<resource href>      (stylesheet, images, chapter, in insertion order)
//! ```

use crate::error::Pdf2EpubError;
use crate::package::markup;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_DIR: &str = "EPUB";
const OPF_FILE: &str = "content.opf";
pub const NAV_ID: &str = "nav";
pub const NAV_FILE: &str = "nav.xhtml";
pub const NCX_ID: &str = "ncx";
pub const NCX_FILE: &str = "toc.ncx";

pub const MEDIA_XHTML: &str = "application/xhtml+xml";
pub const MEDIA_CSS: &str = "text/css";
pub const MEDIA_JPEG: &str = "image/jpeg";
const MEDIA_NCX: &str = "application/x-dtbncx+xml";

/// Package-level metadata written to the OPF.
#[derive(Debug, Clone)]
pub struct BookMetadata {
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub language: String,
    pub modified: DateTime<Utc>,
}

/// One manifest item. `href` is relative to the OPF directory.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub href: String,
    pub media_type: &'static str,
    pub properties: Option<&'static str>,
    pub data: Vec<u8>,
}

/// One table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub id: String,
    pub href: String,
    pub label: String,
}

/// Resources, spine and TOC of a book under construction.
///
/// Identifiers and file names are checked for uniqueness on insertion.
#[derive(Debug, Clone)]
pub struct EpubPackage {
    pub metadata: BookMetadata,
    resources: Vec<Resource>,
    spine: Vec<String>,
    toc: Vec<TocEntry>,
    ids: HashSet<String>,
    hrefs: HashSet<String>,
}

impl EpubPackage {
    pub fn new(metadata: BookMetadata) -> Self {
        let mut ids = HashSet::new();
        let mut hrefs = HashSet::new();
        for (id, href) in [(NAV_ID, NAV_FILE), (NCX_ID, NCX_FILE), ("opf", OPF_FILE)] {
            ids.insert(id.to_string());
            hrefs.insert(href.to_string());
        }
        Self {
            metadata,
            resources: Vec::new(),
            spine: Vec::new(),
            toc: Vec::new(),
            ids,
            hrefs,
        }
    }

    /// Add a manifest item. Fails if the id or href is already taken.
    pub fn add_resource(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: &'static str,
        data: Vec<u8>,
    ) -> Result<(), Pdf2EpubError> {
        let id = id.into();
        let href = href.into();
        if self.ids.contains(&id) {
            return Err(Pdf2EpubError::PackageFailed(format!("duplicate resource id '{id}'")));
        }
        if self.hrefs.contains(&href) {
            return Err(Pdf2EpubError::PackageFailed(format!(
                "duplicate resource file '{href}'"
            )));
        }
        self.ids.insert(id.clone());
        self.hrefs.insert(href.clone());
        self.resources.push(Resource {
            id,
            href,
            media_type,
            properties: None,
            data,
        });
        Ok(())
    }

    /// Append an already-added resource to the reading order.
    pub fn push_spine(&mut self, id: &str) -> Result<(), Pdf2EpubError> {
        if !self.ids.contains(id) {
            return Err(Pdf2EpubError::PackageFailed(format!("unknown spine item '{id}'")));
        }
        self.spine.push(id.to_string());
        Ok(())
    }

    pub fn push_toc(&mut self, entry: TocEntry) {
        self.toc.push(entry);
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Reading order, with the navigation document first.
    pub fn spine(&self) -> Vec<String> {
        std::iter::once(NAV_ID.to_string())
            .chain(self.spine.iter().cloned())
            .collect()
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    /// Manifest including the generated nav and NCX items.
    fn manifest(&self) -> Result<Vec<Resource>, Pdf2EpubError> {
        let mut all = Vec::with_capacity(self.resources.len() + 2);
        all.push(Resource {
            id: NAV_ID.to_string(),
            href: NAV_FILE.to_string(),
            media_type: MEDIA_XHTML,
            properties: Some("nav"),
            data: markup::nav_document(&self.metadata, &self.toc)?,
        });
        all.push(Resource {
            id: NCX_ID.to_string(),
            href: NCX_FILE.to_string(),
            media_type: MEDIA_NCX,
            properties: None,
            data: markup::ncx_document(&self.metadata, &self.toc)?,
        });
        all.extend(self.resources.iter().cloned());
        Ok(all)
    }

    /// Serialise the container to `writer`.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, Pdf2EpubError> {
        let mut zip = ZipWriter::new(writer);
        let io_err = |e: std::io::Error| Pdf2EpubError::PackageFailed(e.to_string());

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip").map_err(io_err)?;

        let opf_path = format!("{CONTENT_DIR}/{OPF_FILE}");
        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(&markup::container_xml(&opf_path)?)
            .map_err(io_err)?;

        let manifest = self.manifest()?;
        let opf = markup::package_opf(&self.metadata, &manifest, &self.spine(), NCX_ID)?;
        zip.start_file(opf_path, deflated)?;
        zip.write_all(&opf).map_err(io_err)?;

        for r in &manifest {
            // JPEG data does not shrink under deflate.
            let options = if r.media_type == MEDIA_JPEG { stored } else { deflated };
            zip.start_file(format!("{CONTENT_DIR}/{}", r.href), options)?;
            zip.write_all(&r.data).map_err(io_err)?;
        }

        Ok(zip.finish()?)
    }

    /// Serialise the container into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Pdf2EpubError> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn metadata() -> BookMetadata {
        BookMetadata {
            identifier: "pdf-sample".into(),
            title: "Sample".into(),
            author: "Someone".into(),
            language: "zh".into(),
            modified: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn sample_package() -> EpubPackage {
        let mut pkg = EpubPackage::new(metadata());
        pkg.add_resource("style_css", "style/style.css", MEDIA_CSS, b"p{}".to_vec())
            .unwrap();
        pkg.add_resource("content", "content.xhtml", MEDIA_XHTML, b"<html/>".to_vec())
            .unwrap();
        pkg.push_spine("content").unwrap();
        pkg.push_toc(TocEntry {
            id: "content".into(),
            href: "content.xhtml".into(),
            label: "Main Content".into(),
        });
        pkg
    }

    #[test]
    fn duplicate_ids_and_files_are_rejected() {
        let mut pkg = EpubPackage::new(metadata());
        pkg.add_resource("a", "a.jpg", MEDIA_JPEG, vec![1]).unwrap();
        assert!(pkg.add_resource("a", "b.jpg", MEDIA_JPEG, vec![2]).is_err());
        assert!(pkg.add_resource("b", "a.jpg", MEDIA_JPEG, vec![3]).is_err());
        assert!(pkg.add_resource(NAV_ID, "other.xhtml", MEDIA_XHTML, vec![]).is_err());
        assert_eq!(pkg.resources().len(), 1);
    }

    #[test]
    fn spine_starts_with_nav() {
        let pkg = sample_package();
        assert_eq!(pkg.spine(), vec!["nav".to_string(), "content".to_string()]);
        assert!(EpubPackage::new(metadata()).push_spine("missing").is_err());
    }

    #[test]
    fn container_layout() {
        let bytes = sample_package().to_bytes().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        {
            let first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);
        }

        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for expected in [
            "META-INF/container.xml",
            "EPUB/content.opf",
            "EPUB/nav.xhtml",
            "EPUB/toc.ncx",
            "EPUB/style/style.css",
            "EPUB/content.xhtml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }

        let mut opf = String::new();
        archive
            .by_name("EPUB/content.opf")
            .unwrap()
            .read_to_string(&mut opf)
            .unwrap();
        assert!(opf.contains("<dc:identifier id=\"id\">pdf-sample</dc:identifier>"));
        assert!(opf.contains("<dc:language>zh</dc:language>"));
        assert!(opf.contains("<dc:creator id=\"creator\">Someone</dc:creator>"));
        assert!(opf.contains("properties=\"nav\""));
        assert!(opf.contains("<spine toc=\"ncx\">"));
        assert!(opf.contains("2023-11-14T22:13:20Z"));

        let mut nav = String::new();
        archive
            .by_name("EPUB/nav.xhtml")
            .unwrap()
            .read_to_string(&mut nav)
            .unwrap();
        assert!(nav.contains("<a href=\"content.xhtml\">Main Content</a>"));
    }

    fn assert_well_formed(xml: &[u8]) {
        let mut reader = quick_xml::Reader::from_reader(xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed at {}: {e}", reader.buffer_position()),
            }
            buf.clear();
        }
    }

    #[test]
    fn hostile_metadata_stays_well_formed() {
        let mut meta = metadata();
        meta.title = "Q&A <draft> \"v2\"\u{1}".into();
        meta.author = String::new();
        let mut pkg = EpubPackage::new(meta);
        pkg.add_resource("content", "content.xhtml", MEDIA_XHTML, b"<html/>".to_vec())
            .unwrap();
        pkg.push_spine("content").unwrap();
        pkg.push_toc(TocEntry {
            id: "content".into(),
            href: "content.xhtml".into(),
            label: "Tom & Jerry".into(),
        });

        let manifest = pkg.manifest().unwrap();
        let opf = markup::package_opf(&pkg.metadata, &manifest, &pkg.spine(), NCX_ID).unwrap();
        assert_well_formed(&opf);
        let opf = String::from_utf8(opf).unwrap();
        assert!(opf.contains("<dc:title>Q&amp;A &lt;draft&gt; "), "{opf}");
        assert!(!opf.contains('\u{1}'));
        assert!(opf.contains("<dc:creator id=\"creator\"/>"));

        for r in manifest.iter().filter(|r| r.id == NAV_ID || r.id == NCX_ID) {
            assert_well_formed(&r.data);
            assert!(String::from_utf8_lossy(&r.data).contains("Tom &amp; Jerry"));
        }
    }
}
