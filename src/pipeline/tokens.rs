//! Positioned text tokens: the only input the structural engine sees.
//!
//! Both token sources (pdfium text segments and OCR word boxes) are reduced
//! to [`PositionedToken`] in page space: points, bottom-left origin, y
//! growing upward. The layout analyzer never learns which source produced a
//! token list.

use crate::pipeline::layout;
use serde::{Deserialize, Serialize};

/// Documents whose extracted text is shorter than this are treated as scanned.
pub const MIN_NATIVE_TEXT_CHARS: usize = 100;

/// A positioned unit of recognised text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub text: String,
    /// Left edge of the text origin, in points.
    pub x: f32,
    /// Baseline, in points from the page bottom.
    pub y: f32,
    pub font_size: f32,
    pub width: f32,
}

impl PositionedToken {
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32, width: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size,
            width,
        }
    }
}

/// Where a page's tokens came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    #[default]
    Native,
    Ocr,
}

/// Everything the analyzer needs about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSource {
    /// 0-based page index.
    pub index: usize,
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    pub tokens: Vec<PositionedToken>,
    /// Line-structured page text used for metadata mining and the OCR check.
    pub text: String,
    pub source: TokenSource,
}

impl PageSource {
    /// Build a page from native tokens, deriving its text from the lines.
    pub fn native(index: usize, width: f32, height: f32, tokens: Vec<PositionedToken>) -> Self {
        let text = page_text(&tokens);
        Self {
            index,
            width,
            height,
            tokens,
            text,
            source: TokenSource::Native,
        }
    }
}

/// Rebuild readable text from tokens: tokens of a line joined by a space,
/// lines top-to-bottom joined by `\n`.
pub fn page_text(tokens: &[PositionedToken]) -> String {
    layout::group_lines(tokens)
        .iter()
        .map(|line| {
            line.tokens
                .iter()
                .map(|t| t.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `true` if any character lies in the Devanagari block (U+0900–U+097F).
pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

/// Native extraction is insufficient when the whole document yields under
/// [`MIN_NATIVE_TEXT_CHARS`] characters or no Devanagari at all.
pub fn needs_ocr(document_text: &str) -> bool {
    let trimmed = document_text.trim();
    trimmed.chars().count() < MIN_NATIVE_TEXT_CHARS || !contains_devanagari(trimmed)
}
