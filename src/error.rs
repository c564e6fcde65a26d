//! Error types for the edgequake-voterlist library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`VoterListError`]: **Fatal**: the document cannot be processed at all
//!   (bad input file, wrong password, pdfium unavailable). Returned as
//!   `Err(VoterListError)` from the top-level `extract*` functions.
//!
//! * [`PageError`]: **Non-fatal**: a single page could not be rasterised or
//!   recognised, but the document as a whole is fine. Stored inside
//!   [`crate::output::PageOutcome`]; the page keeps whatever native tokens it
//!   had and the pipeline moves on to the next page.
//!
//! Missing metadata anchors and pages without a valid table are not errors at
//! all: they degrade to configured fallbacks and empty record lists.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-voterlist library.
#[derive(Debug, Error)]
pub enum VoterListError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The token source could not open the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium refused to hand out a page or its text layer while loading.
    #[error("Failed to read page {page}: {detail}")]
    PageLoadFailed { page: usize, detail: String },

    /// pdfium-render returned an error while rasterising for the overlay.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the searchable PDF failed inside pdfium.
    #[error("Failed to build searchable PDF '{path}': {detail}")]
    SearchablePdfFailed { path: PathBuf, detail: String },

    /// The structured record set could not be serialised.
    #[error("Failed to serialise extracted records: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, then either:\n\
  • put it next to the binary or on the system library path, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageOutcome`] when a page degrades.
/// The document-level run continues regardless.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation for OCR failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR engine failed on this page.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// OCR was required but no engine is configured.
    #[error("Page {page}: OCR needed but no OCR engine is configured")]
    OcrUnavailable { page: usize },
}

impl PageError {
    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::OcrUnavailable { page } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_pdf_display() {
        let e = VoterListError::CorruptPdf {
            path: PathBuf::from("/tmp/roll.pdf"),
            detail: "bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("roll.pdf"), "got: {msg}");
        assert!(msg.contains("bad xref"));
    }

    #[test]
    fn ocr_failed_display_names_page() {
        let e = PageError::OcrFailed {
            page: 4,
            detail: "tesseract exited with status 1".into(),
        };
        assert!(e.to_string().contains("Page 4"));
        assert_eq!(e.page(), 4);
    }

    #[test]
    fn ocr_unavailable_page() {
        assert_eq!(PageError::OcrUnavailable { page: 2 }.page(), 2);
    }

    #[test]
    fn serde_error_converts() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: VoterListError = err.into();
        assert!(e.to_string().starts_with("Failed to serialise"));
    }
}
