//! Field extractor: validated grid rows → [`VoterRecord`]s.
//!
//! Columns are assigned by position (the layout analyzer lays bands out
//! left-to-right in form order). Cells that hold a code or an identifier are
//! narrowed with a pattern; free-text cells are taken as they are.

use crate::output::VoterRecord;
use crate::pipeline::layout::Grid;
use crate::pipeline::validate::{filled_cells, is_header_row};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum non-empty cells for a row to be mapped at all.
pub const MIN_RECORD_CELLS: usize = 6;

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// पि = father, प = husband, मा = mother.
static RE_RELATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"पि|प|मा").unwrap());

/// पु = male, म = female.
static RE_GENDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"पु|म").unwrap());

/// Elector photo identity card (EPIC) number.
static RE_PHOTO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{3}[0-9]{7}").unwrap());

// Column positions of the voter table.
const COL_SERIAL: usize = 0;
const COL_HOUSE: usize = 1;
const COL_NAME: usize = 2;
const COL_RELATION: usize = 3;
const COL_RELATIVE: usize = 4;
const COL_GENDER: usize = 5;
const COL_AGE: usize = 6;
const COL_PHOTO_ID: usize = 7;

/// Replace Devanagari digits (०-९) with their ASCII counterparts.
pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0966}'..='\u{096F}' => {
                char::from(b'0' + (c as u32 - 0x0966) as u8)
            }
            _ => c,
        })
        .collect()
}

/// First run of digits, after digit normalisation.
pub fn first_number(text: &str) -> Option<String> {
    RE_DIGITS
        .find(&normalize_digits(text))
        .map(|m| m.as_str().to_string())
}

/// The photo-ID substring of `text`, or an empty string.
pub fn extract_photo_id(text: &str) -> String {
    RE_PHOTO_ID
        .find(&normalize_digits(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn first_match(re: &Regex, text: &str) -> String {
    re.find(text).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Map one grid row to a record. `None` for rows with too few cells or with
/// neither a name nor an age.
pub fn row_to_record(row: &[String]) -> Option<VoterRecord> {
    if filled_cells(row) < MIN_RECORD_CELLS {
        return None;
    }
    let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");

    let record = VoterRecord {
        sl_no_in_part: first_number(cell(COL_SERIAL)).unwrap_or_default(),
        house_number: cell(COL_HOUSE).to_string(),
        voter_name: cell(COL_NAME).to_string(),
        relation_code: first_match(&RE_RELATION, cell(COL_RELATION)),
        relative_name: cell(COL_RELATIVE).to_string(),
        gender_code: first_match(&RE_GENDER, cell(COL_GENDER)),
        age: first_number(cell(COL_AGE)).and_then(|n| n.parse().ok()),
        photo_id_card_number: extract_photo_id(cell(COL_PHOTO_ID)),
    };

    (!record.voter_name.is_empty() || record.age.is_some()).then_some(record)
}

/// Extract every qualifying record from `grid`, skipping a header row.
pub fn extract_records(grid: &Grid) -> Vec<VoterRecord> {
    let skip = usize::from(grid.row(0).is_some_and(is_header_row));
    grid.rows.iter().skip(skip).filter_map(|r| row_to_record(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn full_row_maps_every_field() {
        let r = row_to_record(&cells(&["1", "12", "राम", "पि", "श्याम", "पु", "45", "ABC1234567"]))
            .unwrap();
        assert_eq!(r.sl_no_in_part, "1");
        assert_eq!(r.house_number, "12");
        assert_eq!(r.voter_name, "राम");
        assert_eq!(r.relation_code, "पि");
        assert_eq!(r.relative_name, "श्याम");
        assert_eq!(r.gender_code, "पु");
        assert_eq!(r.age, Some(45));
        assert_eq!(r.photo_id_card_number, "ABC1234567");
    }

    #[test]
    fn codes_are_narrowed_to_their_alphabet() {
        let r = row_to_record(&cells(&["3.", "7", "सीता", "प0", "राम", "म", "आयु 32", ""])).unwrap();
        assert_eq!(r.sl_no_in_part, "3");
        assert_eq!(r.relation_code, "प");
        assert_eq!(r.gender_code, "म");
        assert_eq!(r.age, Some(32));
        assert_eq!(r.photo_id_card_number, "");
    }

    #[test]
    fn devanagari_digits_are_parsed() {
        let r = row_to_record(&cells(&["१२", "४", "गीता", "मा", "कमला", "म", "६७", ""])).unwrap();
        assert_eq!(r.sl_no_in_part, "12");
        assert_eq!(r.age, Some(67));
        assert_eq!(r.relation_code, "मा");
    }

    #[test]
    fn photo_id_is_exact_substring_or_empty() {
        assert_eq!(extract_photo_id("EPIC: UPX0012345 (new)"), "UPX0012345");
        assert_eq!(extract_photo_id("UP0012345"), "");
        assert_eq!(extract_photo_id("upx0012345"), "");
        assert_eq!(extract_photo_id("ABC123456"), "");
    }

    #[test]
    fn sparse_rows_are_skipped() {
        assert!(row_to_record(&cells(&["1", "", "राम", "", "", "", "45", ""])).is_none());
    }

    #[test]
    fn rows_without_name_or_age_are_dropped() {
        assert!(row_to_record(&cells(&["1", "12", "", "पि", "श्याम", "पु", "", "ABC1234567"])).is_none());
    }

    #[test]
    fn header_row_is_not_a_record() {
        let grid = Grid {
            rows: vec![
                cells(&["नि.सं.", "घर", "नाम", "सम्बन्ध", "सम्बन्धी", "लिंग", "आयु", "फोटो"]),
                cells(&["1", "12", "राम", "पि", "श्याम", "पु", "45", "ABC1234567"]),
            ],
        };
        let records = extract_records(&grid);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].voter_name, "राम");
    }

    #[test]
    fn short_rows_do_not_panic() {
        let grid = Grid {
            rows: vec![cells(&["1", "12", "राम", "पि", "श्याम", "पु"])],
        };
        let records = extract_records(&grid);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].age, None);
        assert_eq!(records[0].photo_id_card_number, "");
    }

    #[test]
    fn normalize_digits_leaves_other_text() {
        assert_eq!(normalize_digits("भाग १०६ - 7"), "भाग 106 - 7");
    }
}
