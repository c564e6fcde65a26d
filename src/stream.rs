//! Streaming extraction API: emit page outcomes as they complete.
//!
//! ## Why stream?
//!
//! Scanned rolls run through OCR page by page and take minutes. A stream
//! lets callers show partial results immediately, wire up progress bars, or
//! persist pages incrementally instead of buffering the whole document.
//!
//! Unlike the eager [`crate::extract::extract`], which returns only after all
//! pages finish, [`extract_stream`] yields [`PageOutcome`] items in page
//! order as soon as each one (and every page before it) is ready. The
//! document-level aggregation (cover metadata, record set) needs every page,
//! so it is left to [`crate::pipeline::aggregate::aggregate`] once the
//! stream is drained.
//!
//! Native text is loaded for the whole document before the stream is
//! returned; OCR and layout analysis run lazily as the stream is polled.

use crate::config::ExtractionConfig;
use crate::error::VoterListError;
use crate::extract::{ocr_required, PageRunner};
use crate::output::PageOutcome;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, PdfSource};
use crate::progress::{ProgressReporter, Stage};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page outcomes, in page order.
///
/// Degraded pages (OCR unavailable or failed) still arrive, with
/// [`PageOutcome::error`] set. The stream ends early if the config's cancel
/// token fires.
pub type PageStream = Pin<Box<dyn Stream<Item = PageOutcome> + Send>>;

/// Extract a voter-list PDF, streaming page outcomes as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: the page outcomes
/// - `Err(VoterListError)`: fatal error (file not found, not a PDF, etc.)
///
/// # Example
/// ```rust,no_run
/// use edgequake_voterlist::{extract_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let mut pages = extract_stream("roll.pdf", &config).await?;
/// while let Some(page) = pages.next().await {
///     println!("Page {}: table={}", page.page_num(), page.verdict.is_table);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PageStream, VoterListError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    stream_resolved(resolved, config).await
}

/// Streaming equivalent of [`crate::extract::extract_from_bytes`].
///
/// The bytes are staged in a temporary directory that lives as long as the
/// returned stream, since OCR re-renders pages lazily.
pub async fn extract_stream_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<PageStream, VoterListError> {
    let resolved = input::stage_bytes(bytes, "document.pdf").await?;
    stream_resolved(resolved, config).await
}

async fn stream_resolved(
    resolved: ResolvedInput,
    config: &ExtractionConfig,
) -> Result<PageStream, VoterListError> {
    let reporter = ProgressReporter::new(config.progress.clone());

    // ── Load native tokens ───────────────────────────────────────────────
    reporter.stage(Stage::Loading, 0.10, "opening document");
    let src = PdfSource::new(resolved.path(), config);
    let loaded = render::load_page_sources(&src, &config.cancel, &reporter).await?;

    // ── OCR decision ─────────────────────────────────────────────────────
    let run_ocr = ocr_required(config.ocr_mode, &loaded.pages);
    if !run_ocr {
        reporter.stage(Stage::Ocr, 0.70, "native text is usable, OCR skipped");
    }
    info!(
        "Streaming {} of {} pages (OCR: {})",
        loaded.pages.len(),
        loaded.total_pages,
        run_ocr
    );

    // ── Build the stream ─────────────────────────────────────────────────
    let runner = Arc::new(PageRunner::new(
        src,
        config.clone(),
        run_ocr,
        reporter,
        loaded.total_pages,
    ));
    let concurrency = runner.concurrency();
    // Staged input must outlive every page future.
    let backing = Arc::new(resolved);

    let s = stream::iter(loaded.pages.into_iter().map(move |page| {
        let runner = Arc::clone(&runner);
        let backing = Arc::clone(&backing);
        async move {
            let outcome = runner.run(page).await;
            drop(backing);
            outcome
        }
    }))
    .buffered(concurrency)
    .take_while(|outcome| futures::future::ready(outcome.is_some()))
    .filter_map(futures::future::ready);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_fails_before_streaming() {
        let result = extract_stream("/nonexistent/roll.pdf", &ExtractionConfig::default()).await;
        assert!(matches!(result, Err(VoterListError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn bytes_without_pdf_magic_are_rejected() {
        let result =
            extract_stream_from_bytes(b"not a pdf at all", &ExtractionConfig::default()).await;
        assert!(matches!(result, Err(VoterListError::NotAPdf { .. })));
    }
}
