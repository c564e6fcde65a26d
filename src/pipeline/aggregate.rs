//! Aggregator: per-page outcomes → one [`ExtractedDocument`].
//!
//! [`DocumentContext`] owns one slot per page of the source document. Each
//! slot is written at most once, when that page's analysis completes; slots
//! of pages never reached (cancellation) stay empty and the page is left out
//! of the record set.

use crate::config::MetadataProfile;
use crate::output::{ExtractedDocument, PageOutcome, PageRecords};
use crate::pipeline::fields::extract_records;
use crate::pipeline::metadata::{parse_document_metadata, parse_page_metadata};
use tracing::{debug, warn};

/// Per-run page store.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pdf_filename: String,
    slots: Vec<Option<PageOutcome>>,
}

impl DocumentContext {
    pub fn new(pdf_filename: impl Into<String>, total_pages: usize) -> Self {
        Self {
            pdf_filename: pdf_filename.into(),
            slots: vec![None; total_pages],
        }
    }

    pub fn total_pages(&self) -> usize {
        self.slots.len()
    }

    pub fn pdf_filename(&self) -> &str {
        &self.pdf_filename
    }

    /// Store a finished page. Returns `false` (and keeps the first value) if
    /// the slot was already filled or lies outside the document.
    pub fn insert(&mut self, outcome: PageOutcome) -> bool {
        let idx = outcome.page_index;
        match self.slots.get_mut(idx) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                true
            }
            Some(_) => {
                warn!("page {} analysed twice; keeping the first result", idx + 1);
                false
            }
            None => {
                warn!(
                    "page index {} outside document of {} pages",
                    idx,
                    self.slots.len()
                );
                false
            }
        }
    }

    pub fn get(&self, idx: usize) -> Option<&PageOutcome> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    /// Filled pages in page order.
    pub fn outcomes(&self) -> impl Iterator<Item = &PageOutcome> {
        self.slots.iter().flatten()
    }

    pub fn into_outcomes(self) -> Vec<PageOutcome> {
        self.slots.into_iter().flatten().collect()
    }

    /// Build the record set from the filled slots.
    pub fn to_document(&self, profile: &MetadataProfile) -> ExtractedDocument {
        aggregate(&self.pdf_filename, self.outcomes(), self.slots.len(), profile)
    }
}

/// Fold page outcomes into the record set.
///
/// Page index 0 is the cover: it feeds document metadata and never yields
/// records. Every later page contributes its section header and, if its grid
/// was accepted as a table, its voter records.
pub fn aggregate<'a>(
    pdf_filename: &str,
    outcomes: impl IntoIterator<Item = &'a PageOutcome>,
    total_pages: usize,
    profile: &MetadataProfile,
) -> ExtractedDocument {
    let mut cover_text = "";
    let mut pages = Vec::new();

    for outcome in outcomes {
        if outcome.page_index == 0 {
            cover_text = &outcome.text;
            continue;
        }
        let voter_records = match outcome.table() {
            Some(grid) => extract_records(grid),
            None => Vec::new(),
        };
        debug!(
            "page {}: {} records",
            outcome.page_num(),
            voter_records.len()
        );
        pages.push(PageRecords {
            page_number: outcome.page_num(),
            page_metadata: parse_page_metadata(&outcome.text),
            voter_records,
        });
    }

    ExtractedDocument {
        pdf_filename: pdf_filename.to_string(),
        document_metadata: parse_document_metadata(cover_text, total_pages, profile),
        pages,
    }
}
