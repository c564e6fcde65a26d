//! # edgequake-voterlist
//!
//! Recover the row/column structure of Hindi electoral-roll ("voter list")
//! PDFs and turn it into a structured record set plus a searchable PDF.
//!
//! ## Why this crate?
//!
//! Voter lists are printed tables, but the PDFs carry no table structure:
//! native text comes out as loose positioned fragments, and many rolls are
//! plain scans with no text layer at all. This crate reduces both cases to
//! positioned tokens, infers columns from their horizontal distribution,
//! projects the tokens onto a grid, checks that the grid really is a voter
//! table, and maps the cells to named fields.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Tokens    pdfium text segments (spawn_blocking)
//!  ├─ 3. OCR       render + binarise + OCR when native text is unusable
//!  ├─ 4. Layout    lines → column bands → header refinement → grid
//!  ├─ 5. Validate  ≥ 80 % of data rows hold 6–8 filled cells
//!  ├─ 6. Records   cover metadata + per-page voter records
//!  └─ 7. Output    `<stem>_extracted.json` + `<stem>_searchable_structured.pdf`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_voterlist::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract("roll.pdf", &config).await?;
//!     println!("{}", output.document.to_json_pretty()?);
//!     eprintln!(
//!         "{} tables, {} records",
//!         output.stats.tables_detected, output.stats.total_records
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Using only the structural engine
//!
//! The layout analyzer and table validator are pure functions over
//! [`PositionedToken`]s, so tokens from any source can be analysed:
//!
//! ```rust
//! use edgequake_voterlist::{analyze_layout, validate_table, LayoutConfig, PositionedToken, ValidationConfig};
//!
//! let tokens = vec![
//!     PositionedToken::new("1", 40.0, 700.0, 10.0, 8.0),
//!     PositionedToken::new("राम", 120.0, 700.0, 10.0, 30.0),
//! ];
//! let layout = analyze_layout(&tokens, 595.0, &LayoutConfig::default());
//! let verdict = validate_table(&layout.grid, &ValidationConfig::default());
//! assert!(!verdict.is_table);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `voterlist` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-voterlist = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! - a pdfium shared library (see [`pipeline::render`] for the search order)
//! - for scanned rolls, `tesseract` with the `hin` language pack on `PATH`,
//!   or any custom [`OcrEngine`]

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ArtifactConfig, ExtractionConfig, ExtractionConfigBuilder, LayoutConfig, MetadataProfile,
    OcrMode, OverlayConfig, ValidationConfig,
};
pub use error::{PageError, VoterListError};
pub use extract::{
    analyze_page, extract, extract_from_bytes, extract_sync, extract_to_files, inspect,
};
pub use output::{
    DocumentMetadata, ExtractedDocument, ExtractionOutput, ExtractionStats, PageMetadata,
    PageOutcome, PageRecords, PdfInfo, VoterRecord, WrittenArtifacts,
};
pub use pipeline::aggregate::{aggregate, DocumentContext};
pub use pipeline::fields::extract_records;
pub use pipeline::layout::{analyze_layout, ColumnBand, Grid, PageLayout};
pub use pipeline::metadata::{parse_document_metadata, parse_page_metadata};
pub use pipeline::ocr::{
    apply_ocr, parse_tsv, OcrEngine, OcrError, OcrPage, OcrWord, TesseractCli,
};
pub use pipeline::tokens::{PageSource, PositionedToken, TokenSource};
pub use pipeline::validate::{validate_table, TableVerdict};
pub use progress::{progress_channel, CancelToken, ProgressEvent, ProgressReceiver, ProgressSender, Stage};
pub use stream::{extract_stream, extract_stream_from_bytes, PageStream};
