//! Eager (full-document) extraction entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for every page, then return
//! the assembled record set. Use [`crate::stream::extract_stream`] instead
//! when you want page outcomes progressively.
//!
//! ## Per-page flow
//!
//! ```text
//! native tokens ──(OCR needed?)──▶ render ▶ binarise ▶ OCR ▶ tokens
//!        │                                                  │
//!        └──────────────────────────┬───────────────────────┘
//!                                   ▼
//!                    layout analyzer ▶ table validator
//! ```
//!
//! The OCR decision is made once for the whole document, from the native
//! text of all pages. Pages are then processed concurrently (bounded by
//! `config.concurrency`) and collected back in page order.

use crate::config::{ExtractionConfig, OcrMode};
use crate::error::{PageError, VoterListError};
use crate::output::{ExtractionOutput, ExtractionStats, PageOutcome, PdfInfo, WrittenArtifacts};
use crate::pipeline::aggregate::DocumentContext;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::layout::analyze_layout;
use crate::pipeline::ocr::{apply_ocr, binarize, OcrPage};
use crate::pipeline::render::{self, PdfSource};
use crate::pipeline::searchable;
use crate::pipeline::tokens::{needs_ocr, PageSource, TokenSource};
use crate::pipeline::validate::validate_table;
use crate::progress::{ProgressReporter, Stage};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract the structured record set from a voter-list PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some pages degraded (check
/// `output.stats.failed_pages`) or the run was cancelled (check
/// `output.stats.cancelled`).
///
/// # Errors
/// Returns `Err(VoterListError)` only for fatal errors: the input cannot be
/// resolved, the document cannot be opened, or pdfium cannot be bound.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, VoterListError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let reporter = ProgressReporter::new(config.progress.clone());

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let output = extract_resolved(&resolved, config, &reporter).await?;

    reporter.stage(Stage::Complete, 1.0, "done");
    Ok(output)
}

/// Extract and write the selected artifacts into `out_dir`.
///
/// Writes `<stem>_extracted.json` and `<stem>_searchable_structured.pdf`
/// (see [`crate::ArtifactConfig`]). Each file is written to a temporary
/// name first and renamed into place, so a crash never leaves a partial
/// artifact behind.
pub async fn extract_to_files(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<WrittenArtifacts, VoterListError> {
    let input_str = input_str.as_ref();
    let out_dir = out_dir.as_ref();
    info!("Starting extraction: {} → {}", input_str, out_dir.display());
    let reporter = ProgressReporter::new(config.progress.clone());

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let output = extract_resolved(&resolved, config, &reporter).await?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| VoterListError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
    let stem = resolved.file_stem();

    // ── JSON ─────────────────────────────────────────────────────────────
    let json = if config.artifacts.json {
        let path = json_path(out_dir, &stem);
        let body = output.document.to_json_pretty()?;
        write_atomic(&path, body.as_bytes()).await?;
        info!("JSON written: {}", path.display());
        Some(path)
    } else {
        None
    };

    // ── Searchable PDF ───────────────────────────────────────────────────
    let searchable_pdf = if config.artifacts.searchable_pdf {
        let path = searchable::searchable_pdf_path(out_dir, &stem);
        let tmp_path = path.with_extension("pdf.tmp");
        let src = PdfSource::new(resolved.path(), config);
        let pages = Arc::new(output.pages);
        if let Err(e) =
            searchable::write_searchable_pdf(&src, pages, &tmp_path, &config.overlay, &reporter)
                .await
        {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| VoterListError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        Some(path)
    } else {
        None
    };

    reporter.stage(Stage::Complete, 1.0, "done");
    Ok(WrittenArtifacts {
        json,
        searchable_pdf,
        document: output.document,
        stats: output.stats,
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, VoterListError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| VoterListError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are staged in a temporary directory that is removed when this
/// call returns. The record set's `pdf_filename` is `document.pdf`.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, VoterListError> {
    let reporter = ProgressReporter::new(config.progress.clone());
    let resolved = input::stage_bytes(bytes, "document.pdf").await?;
    let output = extract_resolved(&resolved, config, &reporter).await?;

    reporter.stage(Stage::Complete, 1.0, "done");
    Ok(output)
}

/// Read the PDF information dictionary without analysing any page.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PdfInfo, VoterListError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    render::pdf_info(&PdfSource::new(resolved.path(), config)).await
}

/// Run the layout analyzer and the table validator over one page.
///
/// Pure: no pdfium, no OCR. `error` is `None`; callers attach one if the
/// token source degraded.
pub fn analyze_page(page: PageSource, config: &ExtractionConfig) -> PageOutcome {
    let layout = analyze_layout(&page.tokens, page.width, &config.layout);
    let verdict = validate_table(&layout.grid, &config.validation);
    debug!(
        "Page {}: {} rows, table={} ({:.2})",
        page.index + 1,
        layout.grid.len(),
        verdict.is_table,
        verdict.valid_ratio
    );
    PageOutcome {
        page_index: page.index,
        width: page.width,
        height: page.height,
        source: page.source,
        text: page.text,
        tokens: page.tokens,
        layout,
        verdict,
        error: None,
    }
}

/// Decide once per document whether pages go through OCR.
pub fn ocr_required(mode: OcrMode, pages: &[PageSource]) -> bool {
    match mode {
        OcrMode::Never => false,
        OcrMode::Always => true,
        OcrMode::Auto => {
            let text = pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            needs_ocr(&text)
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// `<out_dir>/<stem>_extracted.json`.
pub(crate) fn json_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{stem}_extracted.json"))
}

/// Atomic write: write to temp, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VoterListError> {
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| VoterListError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| VoterListError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Load, decide on OCR, analyse every page, aggregate.
pub(crate) async fn extract_resolved(
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
    reporter: &ProgressReporter,
) -> Result<ExtractionOutput, VoterListError> {
    let total_start = Instant::now();

    // ── Step 1: Load native tokens ───────────────────────────────────────
    reporter.stage(Stage::Loading, 0.10, "opening document");
    let load_start = Instant::now();
    let src = PdfSource::new(resolved.path(), config);
    let loaded = render::load_page_sources(&src, &config.cancel, reporter).await?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;
    let total_pages = loaded.total_pages;

    // ── Step 2: OCR decision ─────────────────────────────────────────────
    let run_ocr = ocr_required(config.ocr_mode, &loaded.pages);
    if run_ocr {
        info!(
            "OCR enabled for {} pages ({:?} mode)",
            loaded.pages.len(),
            config.ocr_mode
        );
    } else {
        reporter.stage(Stage::Ocr, 0.70, "native text is usable, OCR skipped");
    }

    // ── Step 3: Per-page OCR + analysis ──────────────────────────────────
    let analysis_start = Instant::now();
    let runner = Arc::new(PageRunner::new(
        src,
        config.clone(),
        run_ocr,
        reporter.clone(),
        total_pages,
    ));
    let outcomes = runner.run_all(loaded.pages).await;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    // ── Step 4: Table detection summary ──────────────────────────────────
    let mut context = DocumentContext::new(resolved.file_name(), total_pages);
    let analysed = outcomes.len();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        reporter.page(Stage::TableDetection, 0.80, 0.10, i + 1, analysed);
        context.insert(outcome);
    }

    // ── Step 5: Aggregate ────────────────────────────────────────────────
    let document = context.to_document(&config.metadata);
    reporter.stage(Stage::RecordExtraction, 0.95, "structuring records");
    let pages = context.into_outcomes();

    let stats = ExtractionStats {
        total_pages,
        analysed_pages: pages.len(),
        ocr_pages: pages.iter().filter(|p| p.source == TokenSource::Ocr).count(),
        failed_pages: pages.iter().filter(|p| p.error.is_some()).count(),
        tables_detected: pages.iter().filter(|p| p.verdict.is_table).count(),
        total_records: document.record_count(),
        cancelled: pages.len() < total_pages,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        load_duration_ms,
        analysis_duration_ms,
    };

    if stats.cancelled {
        warn!(
            "Extraction cancelled: {}/{} pages analysed",
            stats.analysed_pages, total_pages
        );
    }
    info!(
        "Extraction complete: {}/{} pages, {} tables, {} records, {}ms",
        stats.analysed_pages,
        total_pages,
        stats.tables_detected,
        stats.total_records,
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        document,
        pages,
        stats,
    })
}

/// Shared state of the per-page futures.
pub(crate) struct PageRunner {
    src: PdfSource,
    config: ExtractionConfig,
    run_ocr: bool,
    progress: ProgressReporter,
    total_pages: usize,
    ocr_done: AtomicUsize,
}

impl PageRunner {
    pub(crate) fn new(
        src: PdfSource,
        config: ExtractionConfig,
        run_ocr: bool,
        progress: ProgressReporter,
        total_pages: usize,
    ) -> Self {
        Self {
            src,
            config,
            run_ocr,
            progress,
            total_pages,
            ocr_done: AtomicUsize::new(0),
        }
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Process every page, bounded by `concurrency`, in page order.
    async fn run_all(self: &Arc<Self>, pages: Vec<PageSource>) -> Vec<PageOutcome> {
        stream::iter(pages.into_iter().map(|page| Arc::clone(self).run(page)))
            .buffered(self.concurrency())
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await
    }

    /// Process one page. `None` if cancellation was requested before the
    /// page started.
    pub(crate) async fn run(self: Arc<Self>, mut page: PageSource) -> Option<PageOutcome> {
        if self.config.cancel.is_cancelled() {
            return None;
        }

        let mut error = None;
        if self.run_ocr {
            match self.ocr(&page).await {
                Ok(result) => {
                    if !apply_ocr(&mut page, &result, self.config.ocr_scale) {
                        debug!("Page {}: OCR found no words", page.index + 1);
                    }
                }
                Err(e) => {
                    warn!("{}; keeping native tokens", e);
                    error = Some(e);
                }
            }
            let done = self.ocr_done.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress
                .page(Stage::Ocr, 0.40, 0.40, done, self.total_pages);
        }

        let mut outcome = analyze_page(page, &self.config);
        outcome.error = error;
        Some(outcome)
    }

    async fn ocr(&self, page: &PageSource) -> Result<OcrPage, PageError> {
        let page_num = page.index + 1;
        let engine = self
            .config
            .ocr_engine
            .clone()
            .ok_or(PageError::OcrUnavailable { page: page_num })?;

        let image = render::render_page(&self.src, page.index, self.config.ocr_scale)
            .await
            .map_err(|e| PageError::RenderFailed {
                page: page_num,
                detail: e.to_string(),
            })?;

        let threshold = self.config.binarize_threshold;
        let language = self.config.ocr_language.clone();
        tokio::task::spawn_blocking(move || {
            let image = match threshold {
                Some(t) => binarize(&image, t),
                None => image,
            };
            engine.recognize(&image, &language)
        })
        .await
        .map_err(|e| PageError::OcrFailed {
            page: page_num,
            detail: format!("OCR task panicked: {e}"),
        })?
        .map_err(|e| PageError::OcrFailed {
            page: page_num,
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokens::PositionedToken;

    fn page_with_text(text: &str) -> PageSource {
        PageSource::native(0, 595.0, 842.0, vec![PositionedToken::new(text, 10.0, 800.0, 10.0, 50.0)])
    }

    #[test]
    fn ocr_mode_overrides_detection() {
        let hindi = vec![page_with_text(&"निर्वाचक नामावली ".repeat(10))];
        let empty = vec![page_with_text("")];
        assert!(!ocr_required(OcrMode::Auto, &hindi));
        assert!(ocr_required(OcrMode::Auto, &empty));
        assert!(ocr_required(OcrMode::Always, &hindi));
        assert!(!ocr_required(OcrMode::Never, &empty));
    }

    #[test]
    fn text_across_pages_counts_together() {
        let half = "मतदाता सूची भाग ".repeat(4);
        let pages = vec![page_with_text(&half), page_with_text(&half)];
        assert!(!ocr_required(OcrMode::Auto, &pages));
    }

    #[test]
    fn analyze_page_keeps_page_identity() {
        let config = ExtractionConfig::default();
        let outcome = analyze_page(page_with_text("नाम"), &config);
        assert_eq!(outcome.page_num(), 1);
        assert_eq!(outcome.source, TokenSource::Native);
        assert_eq!(outcome.layout.grid.len(), 1);
        assert!(!outcome.verdict.is_table);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn json_artifact_name() {
        assert_eq!(
            json_path(Path::new("out"), "roll"),
            PathBuf::from("out/roll_extracted.json")
        );
    }

    #[tokio::test]
    async fn cancelled_runner_skips_pages() {
        let config = ExtractionConfig::builder().ocr_mode(OcrMode::Never).build().unwrap();
        config.cancel.cancel();
        let src = PdfSource::new("/nonexistent.pdf", &config);
        let runner = Arc::new(PageRunner::new(src, config, false, ProgressReporter::default(), 2));
        let outcomes = runner
            .run_all(vec![page_with_text("a"), page_with_text("b")])
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn runner_without_engine_flags_pages() {
        let config = ExtractionConfig::builder()
            .ocr_mode(OcrMode::Always)
            .without_ocr_engine()
            .build()
            .unwrap();
        let src = PdfSource::new("/nonexistent.pdf", &config);
        let runner = Arc::new(PageRunner::new(src, config, true, ProgressReporter::default(), 1));
        let outcomes = runner.run_all(vec![page_with_text("नाम")]).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].error, Some(PageError::OcrUnavailable { page: 1 }));
        assert_eq!(outcomes[0].source, TokenSource::Native);
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let err = extract("/nonexistent/roll.pdf", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VoterListError::FileNotFound { .. }));
    }
}
