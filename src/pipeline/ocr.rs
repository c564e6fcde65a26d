//! OCR adapter: raster page image → positioned word boxes.
//!
//! The pipeline only depends on the [`OcrEngine`] trait. The bundled
//! implementation, [`TesseractCli`], shells out to the `tesseract` binary and
//! parses its TSV word table, so no native OCR bindings are linked into the
//! crate. Engines are synchronous; callers run them inside
//! `tokio::task::spawn_blocking`.
//!
//! Word boxes come back in raster pixels with a top-left origin.
//! [`ocr_word_to_token`] is the single place where they are mapped into page
//! space.

use crate::pipeline::tokens::{PageSource, PositionedToken, TokenSource};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors raised by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary or library could not be found.
    #[error("OCR engine '{0}' is not available")]
    Unavailable(String),

    /// The engine ran and reported failure.
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The engine output could not be understood.
    #[error("Unreadable OCR output: {0}")]
    Parse(String),

    #[error("OCR image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pixel-space box, top-left origin: `(x0, y0)` upper-left, `(x1, y1)`
/// lower-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// One recognised word.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Recognition result for one page image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    /// Recognised text, one line per text line.
    pub text: String,
    pub words: Vec<OcrWord>,
}

/// A synchronous OCR backend.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognise `image` using the `language` model (e.g. `"hin"`).
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<OcrPage, OcrError>;
}

/// Tesseract via its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `true` if `tesseract --version` runs.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<OcrPage, OcrError> {
        let tmp = tempfile::Builder::new()
            .prefix("voterlist-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(tmp.path(), ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("tsv")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::Unavailable(self.binary.display().to_string()),
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let page = parse_tsv(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "tesseract: {} words, {} chars",
            page.words.len(),
            page.text.len()
        );
        Ok(page)
    }
}

/// Parse tesseract's TSV output.
///
/// Columns: `level page block par line word left top width height conf text`.
/// Level-5 rows are words; the text is rebuilt line by line from them.
pub fn parse_tsv(tsv: &str) -> Result<OcrPage, OcrError> {
    let mut page = OcrPage::default();
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(u32, u32, u32, u32)> = None;

    for (n, row) in tsv.lines().enumerate() {
        if n == 0 && row.starts_with("level") {
            continue;
        }
        if row.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 {
            return Err(OcrError::Parse(format!("row {}: {} columns", n + 1, cols.len())));
        }
        let num = |i: usize| -> Result<i64, OcrError> {
            cols[i]
                .trim()
                .parse::<i64>()
                .map_err(|_| OcrError::Parse(format!("row {}: bad number '{}'", n + 1, cols[i])))
        };

        if num(0)? != 5 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);
        page.words.push(OcrWord {
            text: text.to_string(),
            bbox: BoundingBox {
                x0: left as f32,
                y0: top as f32,
                x1: (left + width) as f32,
                y1: (top + height) as f32,
            },
        });

        let key = (num(1)? as u32, num(2)? as u32, num(3)? as u32, num(4)? as u32);
        match lines.last_mut() {
            Some(line) if current_line == Some(key) => {
                line.push(' ');
                line.push_str(text);
            }
            _ => {
                lines.push(text.to_string());
                current_line = Some(key);
            }
        }
    }

    page.text = lines.join("\n");
    Ok(page)
}

/// Map a raster word box into page space.
///
/// `scale` is the raster scale the page was rendered at; `page_height` is
/// the page height in points. The token's y is the baseline (box bottom)
/// measured from the page bottom.
pub fn ocr_word_to_token(word: &OcrWord, scale: f32, page_height: f32) -> PositionedToken {
    let b = word.bbox;
    PositionedToken {
        text: word.text.clone(),
        x: b.x0 / scale,
        y: page_height - b.y1 / scale,
        font_size: (b.y1 - b.y0) / scale,
        width: (b.x1 - b.x0) / scale,
    }
}

/// All words of `page` as page-space tokens.
pub fn ocr_tokens(page: &OcrPage, scale: f32, page_height: f32) -> Vec<PositionedToken> {
    page.words
        .iter()
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| ocr_word_to_token(w, scale, page_height))
        .collect()
}

/// OCR text of at most this many chars (trimmed) does not replace the page
/// text.
pub const MIN_OCR_TEXT_CHARS: usize = 10;

/// Replace a page's tokens (and text) with an OCR result.
///
/// Tokens are replaced only if OCR produced at least one word; the text only
/// if it is longer than [`MIN_OCR_TEXT_CHARS`]. Returns `true` if the tokens
/// were replaced.
pub fn apply_ocr(page: &mut PageSource, result: &OcrPage, scale: f32) -> bool {
    let tokens = ocr_tokens(result, scale, page.height);
    let replaced = !tokens.is_empty();
    if replaced {
        page.tokens = tokens;
        page.source = TokenSource::Ocr;
    }
    if result.text.trim().chars().count() > MIN_OCR_TEXT_CHARS {
        page.text = result.text.clone();
    }
    replaced
}

/// Threshold to black and white: luma `0.299R + 0.587G + 0.114B` above
/// `threshold` becomes white, everything else black.
pub fn binarize(image: &DynamicImage, threshold: u8) -> DynamicImage {
    let rgb = image.to_rgb8();
    let out = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([if luma > threshold as f32 { 255 } else { 0 }])
    });
    DynamicImage::ImageLuma8(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1190\t1684\t-1\t
4\t1\t1\t1\t1\t0\t80\t100\t400\t30\t-1\t
5\t1\t1\t1\t1\t1\t80\t100\t60\t30\t91.2\tनि.सं.
5\t1\t1\t1\t1\t2\t200\t102\t40\t28\t88.0\tनाम
5\t1\t1\t1\t2\t1\t80\t140\t20\t30\t95.5\t1
5\t1\t1\t1\t2\t2\t200\t140\t50\t30\t90.0\tराम
5\t1\t1\t1\t2\t3\t300\t140\t10\t30\t-1\t
";

    #[test]
    fn tsv_words_and_lines() {
        let page = parse_tsv(TSV).unwrap();
        assert_eq!(page.words.len(), 4);
        assert_eq!(page.text, "नि.सं. नाम\n1 राम");
        assert_eq!(
            page.words[1].bbox,
            BoundingBox {
                x0: 200.0,
                y0: 102.0,
                x1: 240.0,
                y1: 130.0
            }
        );
    }

    #[test]
    fn tsv_rejects_truncated_rows() {
        assert!(parse_tsv("level\tpage_num\n5\t1\t1").is_err());
    }

    #[test]
    fn empty_tsv_is_empty_page() {
        assert_eq!(parse_tsv("").unwrap(), OcrPage::default());
    }

    #[test]
    fn word_box_maps_to_page_space() {
        let word = OcrWord {
            text: "राम".into(),
            bbox: BoundingBox {
                x0: 200.0,
                y0: 100.0,
                x1: 260.0,
                y1: 124.0,
            },
        };
        let t = ocr_word_to_token(&word, 2.0, 842.0);
        assert_eq!(t.x, 100.0);
        assert_eq!(t.y, 842.0 - 62.0);
        assert_eq!(t.font_size, 12.0);
        assert_eq!(t.width, 30.0);
    }

    #[test]
    fn ocr_replaces_native_tokens_and_text() {
        let mut page = PageSource::native(1, 595.0, 842.0, vec![PositionedToken::new("?", 1.0, 1.0, 1.0, 1.0)]);
        let result = parse_tsv(TSV).unwrap();
        assert!(apply_ocr(&mut page, &result, 2.0));
        assert_eq!(page.source, TokenSource::Ocr);
        assert_eq!(page.tokens.len(), 4);
        assert_eq!(page.tokens[0].x, 40.0);
        assert_eq!(page.text, "नि.सं. नाम\n1 राम");
    }

    #[test]
    fn empty_ocr_keeps_native_page() {
        let mut page = PageSource::native(1, 595.0, 842.0, vec![PositionedToken::new("नाम", 1.0, 1.0, 1.0, 1.0)]);
        let result = OcrPage {
            text: "  short  ".into(),
            words: Vec::new(),
        };
        assert!(!apply_ocr(&mut page, &result, 2.0));
        assert_eq!(page.source, TokenSource::Native);
        assert_eq!(page.text, "नाम");
    }

    #[test]
    fn binarize_splits_on_threshold() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([200, 200, 200]));
        img.put_pixel(1, 0, Rgb([170, 170, 170]));
        let out = binarize(&DynamicImage::ImageRgb8(img), 180).to_luma8();
        assert_eq!(out.get_pixel(0, 0).0, [255]);
        assert_eq!(out.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractCli::new("/nonexistent/tesseract-binary");
        assert!(!engine.is_available());
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        match engine.recognize(&img, "hin") {
            Err(OcrError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }
}
