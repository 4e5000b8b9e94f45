//! Text cleanup and paragraph classification.
//!
//! pdfium hands back positioned text runs. We turn them into a sequence of
//! [`TextBlock`]s:
//!
//! 1. lay the runs out as lines, with a blank line wherever the vertical gap
//!    between two lines is unusually large ([`layout_text`])
//! 2. split on blank lines into paragraphs
//! 3. join each paragraph's lines with single spaces
//! 4. normalise whitespace ([`clean_text`])
//! 5. classify as heading or body paragraph ([`ParagraphClassifier`])

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Paragraphs shorter than this (in characters) may be headings.
pub const HEADING_MAX_CHARS: usize = 150;

/// Headings shorter than this render at level 2, longer ones at level 3.
pub const PROMINENT_HEADING_MAX_CHARS: usize = 80;

/// Baseline distance, in line heights, above which two lines belong to
/// different paragraphs.
pub const PARAGRAPH_GAP_RATIO: f32 = 1.5;

// ── Layout ───────────────────────────────────────────────────────────────────

/// A run of text and its bounding box in PDF points (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl TextRun {
    fn middle(&self) -> f32 {
        (self.bottom + self.top) / 2.0
    }
}

struct Line {
    runs: Vec<TextRun>,
    bottom: f32,
    top: f32,
}

impl Line {
    fn height(&self) -> f32 {
        (self.top - self.bottom).max(f32::EPSILON)
    }

    fn text(mut self) -> String {
        self.runs.sort_by(|a, b| a.left.total_cmp(&b.left));
        let word_gap = self.height() * 0.1;
        let mut out = String::new();
        let mut prev_right: Option<f32> = None;
        for run in &self.runs {
            if let Some(right) = prev_right {
                let spaced = out.ends_with(char::is_whitespace)
                    || run.text.starts_with(char::is_whitespace);
                if !spaced && run.left - right > word_gap {
                    out.push(' ');
                }
            }
            out.push_str(&run.text);
            prev_right = Some(run.right);
        }
        out.trim_end().to_string()
    }
}

/// Lay positioned runs out as plain text.
///
/// Runs whose vertical midpoints fall inside the same band form one line;
/// lines are emitted top to bottom and separated by `\n`. When the baseline
/// distance between two lines exceeds [`PARAGRAPH_GAP_RATIO`] times the
/// taller line's height, a blank line is emitted between them so that
/// [`split_paragraphs`] sees a paragraph boundary.
pub fn layout_text(runs: &[TextRun]) -> String {
    let mut runs: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    runs.sort_by(|a, b| b.middle().total_cmp(&a.middle()));

    let mut lines: Vec<Line> = Vec::new();
    for run in runs {
        match lines.last_mut() {
            Some(line) if run.middle() >= line.bottom && run.middle() <= line.top => {
                line.bottom = line.bottom.min(run.bottom);
                line.top = line.top.max(run.top);
                line.runs.push(run.clone());
            }
            _ => lines.push(Line {
                runs: vec![run.clone()],
                bottom: run.bottom,
                top: run.top,
            }),
        }
    }

    let mut out = String::new();
    let mut prev: Option<(f32, f32)> = None;
    for line in lines {
        let (bottom, height) = (line.bottom, line.height());
        if let Some((prev_bottom, prev_height)) = prev {
            out.push('\n');
            if prev_bottom - bottom > PARAGRAPH_GAP_RATIO * prev_height.max(height) {
                out.push('\n');
            }
        }
        out.push_str(&line.text());
        prev = Some((bottom, height));
    }
    out
}

// ── Normalisation ────────────────────────────────────────────────────────────

/// Characters XML 1.0 does not allow (C0 controls other than tab, LF, CR,
/// plus U+FFFE/U+FFFF). pdfium emits U+0002 for end-of-line hyphens.
static RE_XML_INVALID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x{FFFE}\x{FFFF}]").unwrap());

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static RE_CJK_GAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"([\x{4e00}-\x{9fff}\x{3400}-\x{4dbf}\x{f900}-\x{faff}\x{3000}-\x{303f}\x{ff00}-\x{ffef}])",
        r" +",
        r"([\x{4e00}-\x{9fff}\x{3400}-\x{4dbf}\x{f900}-\x{faff}\x{3000}-\x{303f}\x{ff00}-\x{ffef}])",
    ))
    .unwrap()
});

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Remove characters that cannot appear in an XML document.
pub fn strip_xml_invalid(text: &str) -> Cow<'_, str> {
    RE_XML_INVALID.replace_all(text, "")
}

/// Drop XML-invalid characters, collapse whitespace runs and remove spaces
/// the extractor inserted between CJK characters. The result is trimmed.
///
/// The CJK pass runs twice: matches cannot overlap, so `中 文 字` only loses
/// its first gap on the first pass.
pub fn clean_text(text: &str) -> String {
    let s = strip_xml_invalid(text);
    let s = RE_WHITESPACE_RUN.replace_all(&s, " ");
    let s = RE_CJK_GAP.replace_all(&s, "$1$2");
    let s = RE_CJK_GAP.replace_all(&s, "$1$2");
    s.trim().to_string()
}

/// Number of `\w+` runs in `text`.
pub fn count_words(text: &str) -> usize {
    RE_WORD.find_iter(text).count()
}

/// Split raw page text into cleaned paragraphs.
///
/// Paragraph boundaries are blank lines. Empty paragraphs are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.split("\n\n")
        .filter_map(|para| {
            let lines: Vec<&str> = para
                .split('\n')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            if lines.is_empty() {
                return None;
            }
            let cleaned = clean_text(&lines.join(" "));
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect()
}

/// At least one cased character and no lowercase ones.
fn is_all_caps(text: &str) -> bool {
    let mut has_upper = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_upper = true;
        }
    }
    has_upper
}

// ── Classification ───────────────────────────────────────────────────────────

/// One structural block of chapter text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextBlock {
    /// All-caps short paragraph. `level` is 2 or 3.
    Heading { level: u8, text: String },
    /// Body text. `indent` is false for the first paragraph after a heading.
    Paragraph { indent: bool, text: String },
}

impl TextBlock {
    pub fn text(&self) -> &str {
        match self {
            TextBlock::Heading { text, .. } | TextBlock::Paragraph { text, .. } => text,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, TextBlock::Heading { .. })
    }
}

/// Heading/paragraph classifier.
///
/// Holds the "first paragraph after a heading" flag, which carries over
/// from one page to the next for the whole book.
#[derive(Debug, Clone)]
pub struct ParagraphClassifier {
    first_after_heading: bool,
}

impl Default for ParagraphClassifier {
    fn default() -> Self {
        Self {
            first_after_heading: true,
        }
    }
}

impl ParagraphClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one cleaned paragraph and update the flag.
    pub fn classify(&mut self, paragraph: &str) -> TextBlock {
        let len = paragraph.chars().count();
        if len < HEADING_MAX_CHARS && is_all_caps(paragraph) {
            self.first_after_heading = true;
            let level = if len < PROMINENT_HEADING_MAX_CHARS { 2 } else { 3 };
            return TextBlock::Heading {
                level,
                text: paragraph.to_string(),
            };
        }

        let indent = !self.first_after_heading;
        self.first_after_heading = false;
        TextBlock::Paragraph {
            indent,
            text: paragraph.to_string(),
        }
    }

    /// Split, clean and classify a page's raw text.
    ///
    /// Whitespace-only text yields no blocks and leaves the flag untouched.
    pub fn classify_page(&mut self, raw_text: &str) -> Vec<TextBlock> {
        if raw_text.trim().is_empty() {
            return Vec::new();
        }
        split_paragraphs(raw_text)
            .iter()
            .map(|p| self.classify(p))
            .collect()
    }
}
