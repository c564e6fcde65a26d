//! Progress events and cooperative cancellation.
//!
//! The pipeline reports discrete progress fractions and a human-readable
//! stage label at every step. Events travel over an unbounded
//! [`tokio::sync::mpsc`] channel: the recognition call never knows who is
//! listening, and a dropped receiver simply turns reporting into a no-op.
//!
//! Cancellation is the opposite direction: the caller flips a
//! [`CancelToken`] and the pipeline checks it between pages. Pages already
//! analysed stay in the result; pages not yet started are absent.
//!
//! # Example
//!
//! ```rust
//! use edgequake_voterlist::{progress_channel, ExtractionConfig};
//!
//! let (tx, mut rx) = progress_channel();
//! let config = ExtractionConfig::builder()
//!     .progress(tx)
//!     .build()
//!     .unwrap();
//!
//! tokio_test::block_on(async move {
//!     // drive `extract(..., &config)` elsewhere, then:
//!     drop(config);
//!     while let Some(event) = rx.recv().await {
//!         eprintln!("{:>3.0}% {}", event.fraction * 100.0, event.label);
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Pipeline step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Resolving the input and opening the document.
    Loading,
    /// Native text extraction and first layout pass.
    TextExtraction,
    /// Rasterise + OCR + layout re-run.
    Ocr,
    /// Table validation over every page grid.
    TableDetection,
    /// Metadata mining and row → record mapping.
    RecordExtraction,
    /// Writing the searchable PDF / JSON artifacts.
    Writing,
    /// Run finished (possibly cancelled).
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Loading => "loading",
            Stage::TextExtraction => "text extraction",
            Stage::Ocr => "ocr",
            Stage::TableDetection => "table detection",
            Stage::RecordExtraction => "record extraction",
            Stage::Writing => "writing",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Overall completion in `0.0..=1.0`.
    pub fraction: f32,
    pub label: String,
    /// `(page_num, total_pages)` for page-scoped events, 1-indexed.
    pub page: Option<(usize, usize)>,
}

/// Sending half handed to [`crate::config::ExtractionConfigBuilder::progress`].
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Receiving half kept by the caller.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a connected progress channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Thin wrapper the pipeline reports through.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressReporter {
    tx: Option<ProgressSender>,
}

impl ProgressReporter {
    pub(crate) fn new(tx: Option<ProgressSender>) -> Self {
        Self { tx }
    }

    pub(crate) fn stage(&self, stage: Stage, fraction: f32, label: impl Into<String>) {
        self.send(ProgressEvent {
            stage,
            fraction: fraction.clamp(0.0, 1.0),
            label: label.into(),
            page: None,
        });
    }

    /// Page-scoped event; `base + span * page_num / total` mirrors the step
    /// ranges each stage owns (e.g. OCR spans 0.40–0.80).
    pub(crate) fn page(
        &self,
        stage: Stage,
        base: f32,
        span: f32,
        page_num: usize,
        total_pages: usize,
    ) {
        let fraction = if total_pages == 0 {
            base
        } else {
            base + span * page_num as f32 / total_pages as f32
        };
        self.send(ProgressEvent {
            stage,
            fraction: fraction.clamp(0.0, 1.0),
            label: format!("{stage}: page {page_num}/{total_pages}"),
            page: Some((page_num, total_pages)),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(ref tx) = self.tx {
            // Receiver gone means nobody is watching; not an error.
            let _ = tx.send(event);
        }
    }
}

/// Cooperative cancellation flag shared between the caller and the pipeline.
///
/// Cloning shares the flag. Checked between pages only, so a page that has
/// started always finishes and is never torn.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_without_sender_does_not_panic() {
        let r = ProgressReporter::default();
        r.stage(Stage::Loading, 0.1, "loading");
        r.page(Stage::Ocr, 0.4, 0.4, 1, 3);
    }

    #[test]
    fn page_fraction_interpolates_stage_range() {
        let (tx, mut rx) = progress_channel();
        let r = ProgressReporter::new(Some(tx));
        r.page(Stage::Ocr, 0.4, 0.4, 2, 4);
        let ev = rx.try_recv().expect("event queued");
        assert_eq!(ev.stage, Stage::Ocr);
        assert!((ev.fraction - 0.6).abs() < 1e-6);
        assert_eq!(ev.page, Some((2, 4)));
        assert!(ev.label.contains("2/4"));
    }

    #[test]
    fn fraction_is_clamped() {
        let (tx, mut rx) = progress_channel();
        let r = ProgressReporter::new(Some(tx));
        r.stage(Stage::Complete, 1.7, "done");
        assert_eq!(rx.try_recv().unwrap().fraction, 1.0);
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = progress_channel();
        drop(rx);
        ProgressReporter::new(Some(tx)).stage(Stage::Writing, 0.9, "writing");
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
