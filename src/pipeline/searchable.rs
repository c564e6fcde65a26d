//! Searchable-PDF writer: page image background plus an invisible text layer.
//!
//! Every analysed page becomes one A4 page. The source page is rendered and
//! placed at the top, scaled to the A4 width. Each token is then written as
//! invisible text at its scaled position, so viewers can search and select
//! text that matches the image. Pages whose grid was accepted as a table
//! additionally get one invisible `TableRowN: a | b | …` line per row near
//! the page bottom, which keeps the recovered row structure searchable.

use crate::config::OverlayConfig;
use crate::error::VoterListError;
use crate::output::PageOutcome;
use crate::pipeline::layout::Grid;
use crate::pipeline::render::{bind_pdfium, open_document, render_page_blocking, PdfSource};
use crate::pipeline::tokens::PositionedToken;
use crate::progress::{ProgressReporter, Stage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A4 in points.
pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

/// Baseline of the first table-row line, measured from the page bottom.
const TABLE_ROW_BOTTOM: f32 = 20.0;
/// Vertical step between table-row lines.
const TABLE_ROW_STEP: f32 = 10.0;
const TABLE_ROW_LEFT: f32 = 10.0;

/// Invisible text placement in output-page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

/// Map a source-page token onto an output page of `doc_width × doc_height`.
///
/// The background image is laid from the top edge, so a token keeps its
/// distance from the top: `y' = doc_height − (page_height − y) · k` with
/// `k = doc_width / page_width`.
pub fn overlay_position(
    token: &PositionedToken,
    page_width: f32,
    page_height: f32,
    doc_width: f32,
    doc_height: f32,
) -> Placement {
    let k = doc_width / page_width;
    Placement {
        x: token.x * k,
        y: doc_height - (page_height - token.y) * k,
        font_size: (token.font_size * k).max(1.0),
    }
}

/// Bottom edge and height of the background image when scaled to
/// `doc_width` and pinned to the top of the page.
pub fn background_rect(img_width: u32, img_height: u32, doc_width: f32, doc_height: f32) -> (f32, f32) {
    let h = img_height as f32 * doc_width / img_width.max(1) as f32;
    (doc_height - h, h)
}

/// `TableRow{i}: …` lines for every row with content. `i` is the grid row
/// index, so rows keep their numbering when blank rows are skipped.
pub fn table_row_lines(grid: &Grid) -> Vec<String> {
    grid.rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let cells: Vec<&str> = row
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            (!cells.is_empty()).then(|| format!("TableRow{i}: {}", cells.join(" | ")))
        })
        .collect()
}

/// Write the searchable PDF for `pages` to `out_path`.
///
/// Pages are written in the order given; a cancelled run writes only the
/// pages it analysed.
pub(crate) async fn write_searchable_pdf(
    src: &PdfSource,
    pages: Arc<Vec<PageOutcome>>,
    out_path: &Path,
    overlay: &OverlayConfig,
    progress: &ProgressReporter,
) -> Result<(), VoterListError> {
    let src = src.clone();
    let out_path = out_path.to_path_buf();
    let overlay = overlay.clone();
    let progress = progress.clone();

    tokio::task::spawn_blocking(move || write_blocking(&src, &pages, &out_path, &overlay, &progress))
    .await
    .map_err(|e| VoterListError::Internal(format!("Writer task panicked: {}", e)))?
}

fn write_blocking(
    src: &PdfSource,
    pages: &[PageOutcome],
    out_path: &Path,
    overlay: &OverlayConfig,
    progress: &ProgressReporter,
) -> Result<(), VoterListError> {
    let fail = |detail: String| VoterListError::SearchablePdfFailed {
        path: out_path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium(src.pdfium_lib.as_deref())?;
    let source = open_document(&pdfium, src)?;
    let mut output = pdfium
        .create_new_pdf()
        .map_err(|e| fail(format!("create document: {e:?}")))?;

    if overlay.font_path.is_none() {
        let missing = tokens_beyond_builtin_font(pages);
        if missing > 0 {
            warn!(
                "No overlay font set: {} tokens need glyphs outside Helvetica and will not be \
                 searchable; pass a Devanagari TrueType font",
                missing
            );
        }
    }

    let font = match overlay.font_path {
        Some(ref path) => output
            .fonts_mut()
            .load_true_type_from_file(path, true)
            .map_err(|e| fail(format!("load font {}: {e:?}", path.display())))?,
        None => output.fonts_mut().helvetica(),
    };

    let total = pages.len();
    for (n, outcome) in pages.iter().enumerate() {
        let image = render_page_blocking(&source, outcome.page_index, overlay.render_scale)?;
        let mut page = output
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(|e| fail(format!("add page: {e:?}")))?;

        let (img_y, img_h) = background_rect(image.width(), image.height(), A4_WIDTH, A4_HEIGHT);
        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(img_y),
                &image,
                Some(PdfPoints::new(A4_WIDTH)),
                Some(PdfPoints::new(img_h)),
            )
            .map_err(|e| fail(format!("page {} image: {e:?}", outcome.page_num())))?;

        for token in &outcome.tokens {
            let text = token.text.trim();
            if text.is_empty() {
                continue;
            }
            let at = overlay_position(token, outcome.width, outcome.height, A4_WIDTH, A4_HEIGHT);
            add_invisible_text(&mut page, at, text, font)
                .map_err(|e| fail(format!("page {} text: {e:?}", outcome.page_num())))?;
        }

        let mut rows_written = 0;
        if overlay.include_table_rows {
            if let Some(grid) = outcome.table() {
                for (i, line) in table_row_lines(grid).iter().enumerate() {
                    let at = Placement {
                        x: TABLE_ROW_LEFT,
                        y: TABLE_ROW_BOTTOM + TABLE_ROW_STEP * i as f32,
                        font_size: overlay.table_row_font_size,
                    };
                    add_invisible_text(&mut page, at, line, font)
                        .map_err(|e| fail(format!("page {} table row: {e:?}", outcome.page_num())))?;
                    rows_written += 1;
                }
            }
        }

        debug!(
            "Page {}: {} tokens, {} table rows written",
            outcome.page_num(),
            outcome.tokens.len(),
            rows_written
        );
        progress.page(Stage::Writing, 0.90, 0.10, n + 1, total);
    }

    output
        .save_to_file(out_path)
        .map_err(|e| fail(format!("save: {e:?}")))?;
    info!("Searchable PDF written: {}", out_path.display());
    Ok(())
}

fn add_invisible_text(
    page: &mut PdfPage,
    at: Placement,
    text: &str,
    font: PdfFontToken,
) -> Result<(), PdfiumError> {
    let mut object = page.objects_mut().create_text_object(
        PdfPoints::new(at.x),
        PdfPoints::new(at.y),
        text,
        font,
        PdfPoints::new(at.font_size),
    )?;
    if let Some(text_object) = object.as_text_object_mut() {
        text_object.set_render_mode(PdfPageTextRenderMode::Invisible)?;
    }
    Ok(())
}

/// `<out_dir>/<stem>_searchable_structured.pdf`.
/// Tokens the built-in Helvetica (Latin-1 only) cannot encode.
pub fn tokens_beyond_builtin_font(pages: &[PageOutcome]) -> usize {
    pages
        .iter()
        .flat_map(|p| &p.tokens)
        .filter(|t| t.text.chars().any(|c| c as u32 > 0xFF))
        .count()
}

pub fn searchable_pdf_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{stem}_searchable_structured.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::extract::analyze_page;
    use crate::pipeline::tokens::PageSource;

    #[test]
    fn token_keeps_distance_from_top() {
        let t = PositionedToken::new("राम", 100.0, 800.0, 10.0, 30.0);
        // Source page twice as wide as the output page → k = 0.5.
        let at = overlay_position(&t, 1190.56, 1000.0, A4_WIDTH, A4_HEIGHT);
        assert!((at.x - 50.0).abs() < 1e-3);
        assert!((at.y - (A4_HEIGHT - 100.0)).abs() < 1e-3);
        assert!((at.font_size - 5.0).abs() < 1e-3);
    }

    #[test]
    fn same_size_page_maps_identically() {
        let t = PositionedToken::new("x", 40.0, 700.0, 12.0, 10.0);
        let at = overlay_position(&t, A4_WIDTH, A4_HEIGHT, A4_WIDTH, A4_HEIGHT);
        assert!((at.x - 40.0).abs() < 1e-3);
        assert!((at.y - 700.0).abs() < 1e-3);
        assert!((at.font_size - 12.0).abs() < 1e-3);
    }

    #[test]
    fn background_fills_width_from_top() {
        // 1.5× render of an A4 page.
        let (y, h) = background_rect(893, 1263, A4_WIDTH, A4_HEIGHT);
        assert!((h - 1263.0 * A4_WIDTH / 893.0).abs() < 1e-3);
        assert!((y + h - A4_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn table_rows_skip_blank_cells_and_rows() {
        let grid = Grid {
            rows: vec![
                vec!["1".into(), "".into(), "राम".into()],
                vec!["".into(), " ".into(), "".into()],
                vec!["2".into(), "7".into(), "सीता".into()],
            ],
        };
        assert_eq!(
            table_row_lines(&grid),
            vec!["TableRow0: 1 | राम".to_string(), "TableRow2: 2 | 7 | सीता".to_string()]
        );
    }

    #[test]
    fn devanagari_tokens_need_an_overlay_font() {
        let tokens = vec![
            PositionedToken::new("राम", 100.0, 700.0, 10.0, 20.0),
            PositionedToken::new("ABC1234567", 200.0, 700.0, 10.0, 60.0),
            PositionedToken::new("45", 300.0, 700.0, 10.0, 10.0),
        ];
        let page = PageSource::native(1, 595.0, 842.0, tokens);
        let pages = vec![analyze_page(page, &ExtractionConfig::default())];
        assert_eq!(tokens_beyond_builtin_font(&pages), 1);

        let latin = PageSource::native(2, 595.0, 842.0, vec![PositionedToken::new("Café", 1.0, 1.0, 1.0, 1.0)]);
        let pages = vec![analyze_page(latin, &ExtractionConfig::default())];
        assert_eq!(tokens_beyond_builtin_font(&pages), 0);
    }

    #[test]
    fn output_name_follows_stem() {
        let p = searchable_pdf_path(Path::new("/out"), "roll_106");
        assert_eq!(p, PathBuf::from("/out/roll_106_searchable_structured.pdf"));
    }
}
