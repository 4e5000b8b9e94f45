//! XML members of the EPUB, written with `quick_xml::Writer`.
//!
//! Callers pass plain text; escaping happens in the writer. Characters that
//! XML cannot carry at all are dropped before they reach it.

use crate::package::epub::{BookMetadata, Resource, TocEntry};
use crate::pipeline::text::{strip_xml_invalid, TextBlock};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

type XmlWriter = Writer<Cursor<Vec<u8>>>;
type XmlResult<T> = Result<T, quick_xml::Error>;

/// Stylesheet shared by the chapter.
pub const STYLESHEET: &str = r#"body { text-align: justify; line-height: 1.8; font-family: serif; }
h1, h2, h3 { text-align: center; page-break-after: avoid; margin: 1em 0; font-weight: bold; }
p { margin: 0; padding: 0; }
p.indent { text-indent: 2em; }
p.noindent { text-indent: 0; }
.fullpage-img {
    display: block;
    max-width: 100%;
    height: auto;
    margin: 2em auto;
    page-break-before: always;
    page-break-after: avoid;
    text-align: center;
}
.inline-img {
    display: block;
    max-width: 95%;
    height: auto;
    margin: 1.5em auto;
    text-align: center;
}
"#;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";

// ── Writer helpers ───────────────────────────────────────────────────────────

fn new_writer() -> XmlWriter {
    Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
}

fn into_bytes(writer: XmlWriter) -> Vec<u8> {
    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    bytes
}

fn declaration(w: &mut XmlWriter) -> XmlResult<()> {
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
}

fn element<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut el = BytesStart::new(name);
    for &(key, value) in attrs {
        let value = strip_xml_invalid(value);
        el.push_attribute((key, &*value));
    }
    el
}

fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> XmlResult<()> {
    w.write_event(Event::Start(element(name, attrs)))
}

fn end(w: &mut XmlWriter, name: &str) -> XmlResult<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> XmlResult<()> {
    w.write_event(Event::Empty(element(name, attrs)))
}

/// `<name attrs>value</name>` on one line, or `<name attrs/>` when empty.
fn text_element(
    w: &mut XmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
    value: &str,
) -> XmlResult<()> {
    let value = strip_xml_invalid(value);
    if value.is_empty() {
        return empty(w, name, attrs);
    }
    start(w, name, attrs)?;
    w.write_event(Event::Text(BytesText::new(&value)))?;
    end(w, name)
}

/// XML declaration, doctype and the opening `<html>` of an XHTML document.
fn xhtml_prologue(w: &mut XmlWriter, language: &str) -> XmlResult<()> {
    declaration(w)?;
    w.write_event(Event::DocType(BytesText::from_escaped("html")))?;
    start(
        w,
        "html",
        &[
            ("xmlns", XHTML_NS),
            ("xmlns:epub", OPS_NS),
            ("lang", language),
            ("xml:lang", language),
        ],
    )
}

// ── Chapter ──────────────────────────────────────────────────────────────────

/// Streams the single content chapter block by block.
pub struct ChapterWriter {
    writer: XmlWriter,
}

impl ChapterWriter {
    /// Write the document head and open `<body>`.
    pub fn new(title: &str, language: &str, stylesheet_href: &str) -> XmlResult<Self> {
        let mut writer = new_writer();
        xhtml_prologue(&mut writer, language)?;
        start(&mut writer, "head", &[])?;
        text_element(&mut writer, "title", &[], title)?;
        empty(
            &mut writer,
            "link",
            &[("href", stylesheet_href), ("rel", "stylesheet"), ("type", "text/css")],
        )?;
        end(&mut writer, "head")?;
        start(&mut writer, "body", &[])?;
        Ok(Self { writer })
    }

    /// The book title as the chapter's `<h1>`.
    pub fn title(&mut self, title: &str) -> XmlResult<()> {
        text_element(&mut self.writer, "h1", &[], title)
    }

    pub fn fullpage_image(&mut self, src: &str, page_num: usize) -> XmlResult<()> {
        self.image("fullpage-img", src, &format!("Full-page image page {page_num}"))
    }

    pub fn embedded_image(&mut self, src: &str, image_num: usize) -> XmlResult<()> {
        self.image("inline-img", src, &format!("Embedded Image {image_num}"))
    }

    pub fn text_block(&mut self, block: &TextBlock) -> XmlResult<()> {
        match block {
            TextBlock::Heading { level, text } => {
                text_element(&mut self.writer, &format!("h{level}"), &[], text)
            }
            TextBlock::Paragraph { indent, text } => {
                let class = if *indent { "indent" } else { "noindent" };
                text_element(&mut self.writer, "p", &[("class", class)], text)
            }
        }
    }

    /// Close `<body>` and `<html>` and return the document.
    pub fn finish(mut self) -> XmlResult<Vec<u8>> {
        end(&mut self.writer, "body")?;
        end(&mut self.writer, "html")?;
        Ok(into_bytes(self.writer))
    }

    fn image(&mut self, class: &str, src: &str, alt: &str) -> XmlResult<()> {
        start(&mut self.writer, "p", &[("class", class)])?;
        empty(&mut self.writer, "img", &[("src", src), ("alt", alt)])?;
        end(&mut self.writer, "p")
    }
}

// ── Container members ────────────────────────────────────────────────────────

pub fn container_xml(opf_path: &str) -> XmlResult<Vec<u8>> {
    let mut w = new_writer();
    declaration(&mut w)?;
    start(
        &mut w,
        "container",
        &[
            ("version", "1.0"),
            ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
        ],
    )?;
    start(&mut w, "rootfiles", &[])?;
    empty(
        &mut w,
        "rootfile",
        &[
            ("full-path", opf_path),
            ("media-type", "application/oebps-package+xml"),
        ],
    )?;
    end(&mut w, "rootfiles")?;
    end(&mut w, "container")?;
    Ok(into_bytes(w))
}

/// EPUB 3 navigation document.
pub fn nav_document(meta: &BookMetadata, toc: &[TocEntry]) -> XmlResult<Vec<u8>> {
    let mut w = new_writer();
    xhtml_prologue(&mut w, &meta.language)?;
    start(&mut w, "head", &[])?;
    text_element(&mut w, "title", &[], &meta.title)?;
    end(&mut w, "head")?;
    start(&mut w, "body", &[])?;
    start(
        &mut w,
        "nav",
        &[("epub:type", "toc"), ("id", "toc"), ("role", "doc-toc")],
    )?;
    text_element(&mut w, "h2", &[], &meta.title)?;
    start(&mut w, "ol", &[])?;
    for entry in toc {
        start(&mut w, "li", &[])?;
        text_element(&mut w, "a", &[("href", entry.href.as_str())], &entry.label)?;
        end(&mut w, "li")?;
    }
    end(&mut w, "ol")?;
    end(&mut w, "nav")?;
    end(&mut w, "body")?;
    end(&mut w, "html")?;
    Ok(into_bytes(w))
}

/// EPUB 2 NCX table of contents, kept for older readers.
pub fn ncx_document(meta: &BookMetadata, toc: &[TocEntry]) -> XmlResult<Vec<u8>> {
    let mut w = new_writer();
    declaration(&mut w)?;
    start(
        &mut w,
        "ncx",
        &[
            ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
            ("version", "2005-1"),
        ],
    )?;
    start(&mut w, "head", &[])?;
    for (name, content) in [
        ("dtb:uid", meta.identifier.as_str()),
        ("dtb:depth", "1"),
        ("dtb:totalPageCount", "0"),
        ("dtb:maxPageNumber", "0"),
    ] {
        empty(&mut w, "meta", &[("name", name), ("content", content)])?;
    }
    end(&mut w, "head")?;
    start(&mut w, "docTitle", &[])?;
    text_element(&mut w, "text", &[], &meta.title)?;
    end(&mut w, "docTitle")?;

    start(&mut w, "navMap", &[])?;
    for (i, entry) in toc.iter().enumerate() {
        let order = (i + 1).to_string();
        start(
            &mut w,
            "navPoint",
            &[("id", entry.id.as_str()), ("playOrder", order.as_str())],
        )?;
        start(&mut w, "navLabel", &[])?;
        text_element(&mut w, "text", &[], &entry.label)?;
        end(&mut w, "navLabel")?;
        empty(&mut w, "content", &[("src", entry.href.as_str())])?;
        end(&mut w, "navPoint")?;
    }
    end(&mut w, "navMap")?;
    end(&mut w, "ncx")?;
    Ok(into_bytes(w))
}

/// The OPF package document.
///
/// `resources` must already include the nav and NCX items; `spine` lists
/// resource ids in reading order.
pub fn package_opf(
    meta: &BookMetadata,
    resources: &[Resource],
    spine: &[String],
    ncx_id: &str,
) -> XmlResult<Vec<u8>> {
    let mut w = new_writer();
    declaration(&mut w)?;
    start(
        &mut w,
        "package",
        &[
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("unique-identifier", "id"),
            ("version", "3.0"),
        ],
    )?;

    start(
        &mut w,
        "metadata",
        &[
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:opf", "http://www.idpf.org/2007/opf"),
        ],
    )?;
    let modified = meta.modified.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    text_element(&mut w, "meta", &[("property", "dcterms:modified")], &modified)?;
    text_element(&mut w, "dc:identifier", &[("id", "id")], &meta.identifier)?;
    text_element(&mut w, "dc:title", &[], &meta.title)?;
    text_element(&mut w, "dc:language", &[], &meta.language)?;
    text_element(&mut w, "dc:creator", &[("id", "creator")], &meta.author)?;
    end(&mut w, "metadata")?;

    start(&mut w, "manifest", &[])?;
    for r in resources {
        let mut attrs = vec![
            ("href", r.href.as_str()),
            ("id", r.id.as_str()),
            ("media-type", r.media_type),
        ];
        if let Some(props) = r.properties {
            attrs.push(("properties", props));
        }
        empty(&mut w, "item", &attrs)?;
    }
    end(&mut w, "manifest")?;

    start(&mut w, "spine", &[("toc", ncx_id)])?;
    for id in spine {
        empty(&mut w, "itemref", &[("idref", id.as_str())])?;
    }
    end(&mut w, "spine")?;
    end(&mut w, "package")?;
    Ok(into_bytes(w))
}
