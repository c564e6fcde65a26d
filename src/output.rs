//! Output types: the structured record set and the per-page analysis results.
//!
//! [`ExtractedDocument`] is the artifact exported as JSON; its field names are
//! part of the file format and stay snake_case. [`PageOutcome`] carries
//! everything the pipeline learned about one page (tokens, inferred layout,
//! table verdict) and is what the searchable-PDF writer and the streaming API
//! consume.

use crate::error::PageError;
use crate::pipeline::layout::PageLayout;
use crate::pipeline::tokens::{PositionedToken, TokenSource};
use crate::pipeline::validate::TableVerdict;
use serde::{Deserialize, Serialize};

// ── Record set ───────────────────────────────────────────────────────────

/// One voter, recovered from one grid row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub sl_no_in_part: String,
    pub house_number: String,
    pub voter_name: String,
    pub relation_code: String,
    pub relative_name: String,
    pub gender_code: String,
    pub age: Option<u32>,
    pub photo_id_card_number: String,
}

/// Cover-page metadata. Every field is always present; anchors that were not
/// found carry the profile's fallback value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub voter_list_year: String,
    pub state: String,
    pub assembly_constituency_name: String,
    pub part_number: String,
    pub polling_station_name: String,
    pub total_pages: String,
    pub revision_date: String,
    pub polling_station_type: String,
    pub total_male_voters: u32,
    pub total_female_voters: u32,
    pub total_voters: u32,
}

/// Section header printed above a page's table, when one was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_station_name_on_page: Option<String>,
}

/// Records of one non-cover page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecords {
    /// 1-indexed.
    pub page_number: usize,
    pub page_metadata: PageMetadata,
    pub voter_records: Vec<VoterRecord>,
}

/// Root of the JSON export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub pdf_filename: String,
    pub document_metadata: DocumentMetadata,
    pub pages: Vec<PageRecords>,
}

impl ExtractedDocument {
    /// Total voter records across all pages.
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(|p| p.voter_records.len()).sum()
    }

    /// Pretty-printed JSON, as written to `<stem>_extracted.json`.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── Per-page analysis ────────────────────────────────────────────────────

/// What the pipeline learned about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 0-based page index.
    pub page_index: usize,
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// Which token source the final layout was computed from.
    pub source: TokenSource,
    pub text: String,
    pub tokens: Vec<PositionedToken>,
    pub layout: PageLayout,
    pub verdict: TableVerdict,
    /// Set when OCR was needed and failed; the page then keeps its native
    /// tokens.
    pub error: Option<PageError>,
}

impl PageOutcome {
    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    /// The grid, if the validator accepted it.
    pub fn table(&self) -> Option<&crate::pipeline::layout::Grid> {
        self.verdict.is_table.then_some(&self.layout.grid)
    }
}

/// Result of a complete extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub document: ExtractedDocument,
    /// Analysed pages in page order. Pages skipped by cancellation are absent.
    pub pages: Vec<PageOutcome>,
    pub stats: ExtractionStats,
}

/// Summary statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that made it through analysis.
    pub analysed_pages: usize,
    /// Pages whose final tokens came from OCR.
    pub ocr_pages: usize,
    /// Pages carrying a non-fatal [`PageError`].
    pub failed_pages: usize,
    /// Pages whose grid was accepted as a table.
    pub tables_detected: usize,
    pub total_records: usize,
    /// `true` if the run stopped early on a cancellation request.
    pub cancelled: bool,
    pub total_duration_ms: u64,
    /// Opening the document and native text extraction.
    pub load_duration_ms: u64,
    /// Per-page OCR and layout analysis.
    pub analysis_duration_ms: u64,
}

/// Paths written by [`crate::extract_to_files`].
#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    /// `<stem>_extracted.json`, if JSON output was enabled.
    pub json: Option<std::path::PathBuf>,
    /// `<stem>_searchable_structured.pdf`, if PDF output was enabled.
    pub searchable_pdf: Option<std::path::PathBuf>,
    pub document: ExtractedDocument,
    pub stats: ExtractionStats,
}

/// PDF information-dictionary fields, returned by [`crate::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_uses_snake_case_names() {
        let r = VoterRecord {
            sl_no_in_part: "1".into(),
            voter_name: "राम".into(),
            age: Some(45),
            ..VoterRecord::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["sl_no_in_part"], "1");
        assert_eq!(v["voter_name"], "राम");
        assert_eq!(v["age"], 45);
        assert_eq!(v["photo_id_card_number"], "");
    }

    #[test]
    fn absent_page_metadata_fields_are_omitted() {
        let v = serde_json::to_value(PageMetadata::default()).unwrap();
        assert_eq!(v, serde_json::json!({}));
    }

    #[test]
    fn record_count_sums_pages() {
        let doc = ExtractedDocument {
            pages: vec![
                PageRecords {
                    page_number: 2,
                    voter_records: vec![VoterRecord::default(); 3],
                    ..PageRecords::default()
                },
                PageRecords {
                    page_number: 3,
                    ..PageRecords::default()
                },
            ],
            ..ExtractedDocument::default()
        };
        assert_eq!(doc.record_count(), 3);
        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("\"page_number\": 3"));
    }
}
