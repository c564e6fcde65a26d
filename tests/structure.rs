//! Integration tests for the structural engine over the public API.
//!
//! Everything here runs on synthetic positioned tokens or synthetic
//! tesseract output: no pdfium, no OCR engine.

use edgequake_voterlist::{
    aggregate, analyze_layout, analyze_page, apply_ocr, extract_records, parse_tsv,
    validate_table, ExtractionConfig, LayoutConfig, MetadataProfile, PageOutcome, PageSource,
    PositionedToken, TokenSource, ValidationConfig,
};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const XS: [f32; 8] = [40.0, 100.0, 160.0, 220.0, 280.0, 340.0, 400.0, 460.0];
const HEADER: [&str; 8] = ["नि.सं.", "घर", "नाम", "सम्बन्ध", "सम्बन्धी", "लिंग", "आयु", "फोटो"];
const HEADER_Y: f32 = 800.0;
const LINE_PITCH: f32 = 20.0;
const OCR_SCALE: f32 = 2.0;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn line(y: f32, cells: &[&str]) -> Vec<PositionedToken> {
    XS.iter()
        .zip(cells)
        .filter(|(_, text)| !text.is_empty())
        .map(|(&x, text)| PositionedToken::new(*text, x, y, 10.0, 20.0))
        .collect()
}

fn voter(serial: usize, name: &str, photo_id: &str) -> Vec<String> {
    vec![
        serial.to_string(),
        (serial * 3).to_string(),
        name.to_string(),
        "पि".to_string(),
        "मोहन".to_string(),
        "पु".to_string(),
        (20 + serial).to_string(),
        photo_id.to_string(),
    ]
}

/// Header line at the top, then one line per voter, 20pt apart.
fn roll_page(index: usize, voters: &[Vec<String>]) -> PageSource {
    let mut tokens = line(HEADER_Y, &HEADER);
    for (i, v) in voters.iter().enumerate() {
        let cells: Vec<&str> = v.iter().map(String::as_str).collect();
        tokens.extend(line(HEADER_Y - LINE_PITCH * (i + 1) as f32, &cells));
    }
    PageSource::native(index, PAGE_WIDTH, PAGE_HEIGHT, tokens)
}

/// Tesseract TSV for `lines` of cells on the `XS` grid, rendered at
/// `OCR_SCALE`. Pixel rows grow downwards, so the first line has the
/// smallest `top`.
fn tesseract_tsv(lines: &[Vec<String>]) -> String {
    let mut tsv = String::from(
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n",
    );
    for (l, cells) in lines.iter().enumerate() {
        let baseline = HEADER_Y - LINE_PITCH * l as f32;
        let bottom = ((PAGE_HEIGHT - baseline) * OCR_SCALE) as i64;
        for (w, (x, text)) in XS.iter().zip(cells).enumerate() {
            if text.is_empty() {
                continue;
            }
            let left = (x * OCR_SCALE) as i64;
            tsv.push_str(&format!(
                "5\t1\t1\t1\t{}\t{}\t{left}\t{}\t40\t24\t91.5\t{text}\n",
                l + 1,
                w + 1,
                bottom - 24
            ));
        }
    }
    tsv
}

fn cover_page() -> PageSource {
    let mut tokens = vec![
        PositionedToken::new("निर्वाचक नामावली 2024", 100.0, 800.0, 14.0, 200.0),
        PositionedToken::new("उत्तर प्रदेश", 100.0, 780.0, 12.0, 80.0),
        PositionedToken::new("विधान सभा क्षेत्र : बरेली कैण्ट", 100.0, 760.0, 12.0, 200.0),
    ];
    tokens.push(PositionedToken::new("कुल मतदाता 1300", 100.0, 500.0, 12.0, 120.0));
    PageSource::native(0, PAGE_WIDTH, PAGE_HEIGHT, tokens)
}

fn analyse(page: PageSource) -> PageOutcome {
    analyze_page(page, &ExtractionConfig::default())
}

// ── Table acceptance ─────────────────────────────────────────────────────────

#[test]
fn header_with_single_voter_is_not_a_table() {
    let outcome = analyse(roll_page(1, &[voter(1, "राम", "ABC1234567")]));
    assert_eq!(outcome.layout.grid.len(), 2);
    assert!(!outcome.verdict.is_table);
    assert!(outcome.table().is_none());
}

#[test]
fn header_with_three_voters_is_a_table() {
    let voters = [
        voter(1, "राम", "ABC1234567"),
        voter(2, "सीता", ""),
        voter(3, "गीता", ""),
    ];
    let outcome = analyse(roll_page(1, &voters));

    assert!(outcome.verdict.is_table);
    assert!(outcome.verdict.header_detected);
    assert_eq!(outcome.verdict.data_rows, 3);
    assert_eq!(outcome.layout.bands.len(), 8);

    let records = extract_records(outcome.table().unwrap());
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].voter_name, "राम");
    assert_eq!(records[0].photo_id_card_number, "ABC1234567");
    assert_eq!(records[1].photo_id_card_number, "");
    assert_eq!(records[2].age, Some(23));
    assert_eq!(records[2].relation_code, "पि");
    assert_eq!(records[2].gender_code, "पु");
}

#[test]
fn eight_column_grid_round_trips_through_layout() {
    let voters: Vec<Vec<String>> = (1..=12).map(|i| voter(i, "राम", "XYZ7654321")).collect();
    let outcome = analyse(roll_page(1, &voters));
    let grid = &outcome.layout.grid;

    assert_eq!(grid.len(), 13);
    assert!(grid.rows.iter().all(|r| r.len() == 8));
    for (i, v) in voters.iter().enumerate() {
        assert_eq!(grid.row(i + 1).unwrap(), v.as_slice());
    }
}

#[test]
fn devanagari_digits_in_photo_id_are_normalised() {
    let voters = [
        voter(1, "राम", "ABC१२३४५६७"),
        voter(2, "सीता", "पहचान DEF7654321"),
        voter(3, "गीता", "AB12345678"),
    ];
    let outcome = analyse(roll_page(1, &voters));
    let records = extract_records(outcome.table().unwrap());
    assert_eq!(records[0].photo_id_card_number, "ABC1234567");
    assert_eq!(records[1].photo_id_card_number, "DEF7654321");
    assert_eq!(records[2].photo_id_card_number, "");
}

#[test]
fn ocr_words_re_enter_the_analyzer() {
    let mut lines = vec![HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
    lines.push(voter(1, "राम", "ABC1234567"));
    lines.push(voter(2, "सीता", ""));
    lines.push(voter(3, "गीता", ""));

    let ocr = parse_tsv(&tesseract_tsv(&lines)).unwrap();
    assert_eq!(ocr.words.len(), 30);

    // A scanned page: no native tokens at all.
    let mut page = PageSource::native(4, PAGE_WIDTH, PAGE_HEIGHT, Vec::new());
    assert!(apply_ocr(&mut page, &ocr, OCR_SCALE));
    assert_eq!(page.source, TokenSource::Ocr);
    assert_eq!(page.tokens[0].y, HEADER_Y);

    let outcome = analyse(page);
    assert_eq!(outcome.source, TokenSource::Ocr);
    assert_eq!(outcome.layout.bands.len(), 8);
    assert_eq!(outcome.layout.grid.len(), 4);
    // Flipped into page space, the header is the topmost row.
    assert_eq!(outcome.layout.grid.row(0).unwrap(), lines[0].as_slice());
    assert_eq!(outcome.layout.grid.row(3).unwrap(), lines[3].as_slice());
    assert!(outcome.verdict.is_table);
    assert!(outcome.verdict.header_detected);

    let records = extract_records(outcome.table().unwrap());
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].voter_name, "राम");
    assert_eq!(records[0].photo_id_card_number, "ABC1234567");
    assert_eq!(records[2].age, Some(23));
}

#[test]
fn empty_page_has_empty_grid() {
    let outcome = analyse(PageSource::native(3, PAGE_WIDTH, PAGE_HEIGHT, Vec::new()));
    assert!(outcome.layout.grid.is_empty());
    assert!(outcome.layout.bands.is_empty());
    assert!(!outcome.verdict.is_table);
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn rows_are_never_wider_than_the_column_limit() {
    // Sixteen well-separated columns.
    let tokens: Vec<PositionedToken> = (0..16)
        .flat_map(|c| {
            (0..4).map(move |r| {
                PositionedToken::new("क", 20.0 + 35.0 * c as f32, 700.0 - 20.0 * r as f32, 10.0, 10.0)
            })
        })
        .collect();
    let layout = analyze_layout(&tokens, PAGE_WIDTH, &LayoutConfig::default());

    assert_eq!(layout.bands.len(), 8);
    assert!(layout.grid.rows.iter().all(|r| r.len() == 8));
    assert!(layout
        .bands
        .windows(2)
        .all(|w| w[0].center < w[1].center));
}

#[test]
fn layout_is_deterministic() {
    let voters: Vec<Vec<String>> = (1..=5).map(|i| voter(i, "राम", "")).collect();
    let page = roll_page(1, &voters);
    let first = analyze_layout(&page.tokens, PAGE_WIDTH, &LayoutConfig::default());
    let second = analyze_layout(&page.tokens, PAGE_WIDTH, &LayoutConfig::default());
    assert_eq!(first, second);

    let cfg = ValidationConfig::default();
    assert_eq!(validate_table(&first.grid, &cfg), validate_table(&second.grid, &cfg));
}

#[test]
fn token_order_does_not_change_the_grid() {
    let voters: Vec<Vec<String>> = (1..=4).map(|i| voter(i, "राम", "")).collect();
    let page = roll_page(1, &voters);
    let mut reversed = page.tokens.clone();
    reversed.reverse();
    assert_eq!(
        analyze_layout(&page.tokens, PAGE_WIDTH, &LayoutConfig::default()).grid,
        analyze_layout(&reversed, PAGE_WIDTH, &LayoutConfig::default()).grid
    );
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[test]
fn document_aggregates_cover_and_roll_pages() {
    let voters: Vec<Vec<String>> = (1..=4).map(|i| voter(i, "राम", "")).collect();
    let outcomes = vec![
        analyse(cover_page()),
        analyse(roll_page(1, &voters)),
        analyse(roll_page(2, &voters[..1])),
    ];

    let doc = aggregate("roll_106.pdf", &outcomes, 3, &MetadataProfile::default());

    assert_eq!(doc.pdf_filename, "roll_106.pdf");
    assert_eq!(doc.document_metadata.voter_list_year, "2024");
    assert_eq!(doc.document_metadata.state, "उत्तर प्रदेश");
    assert_eq!(
        doc.document_metadata.assembly_constituency_name,
        "विधान सभा क्षेत्र : बरेली कैण्ट"
    );
    assert_eq!(doc.document_metadata.total_voters, 1300);
    assert_eq!(doc.document_metadata.total_male_voters, 617);
    assert_eq!(doc.document_metadata.total_pages, "3");

    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[0].page_number, 2);
    assert_eq!(doc.pages[0].voter_records.len(), 4);
    assert_eq!(doc.pages[1].page_number, 3);
    assert!(doc.pages[1].voter_records.is_empty());
    assert_eq!(doc.record_count(), 4);

    let json: serde_json::Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["pages"][0]["voter_records"][0]["voter_name"], "राम");
    assert_eq!(json["document_metadata"]["total_voters"], 1300);
}
