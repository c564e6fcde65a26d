//! Keyword-anchored metadata mining over free page text.
//!
//! The cover page is searched with a declarative anchor table: each entry
//! names the target field, the pattern that locates it, how the value is
//! cut out of the matching line, and the fallback used when no line matches.
//! Anchors and fallbacks come from the [`MetadataProfile`], so a roll from a
//! different constituency only needs a different profile.

use crate::config::MetadataProfile;
use crate::output::{DocumentMetadata, PageMetadata};
use crate::pipeline::fields::{first_number, normalize_digits};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::debug;

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").unwrap());
static RE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{2}-[0-9]{2}-[0-9]{4}").unwrap());
static RE_SECTION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([0-9]+\)").unwrap());
static RE_SECTION_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static RE_SECTION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^(]+)\(").unwrap());
static RE_PARENTHESISED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

/// Cover-page field an anchor fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    VoterListYear,
    State,
    AssemblyConstituency,
    PartNumber,
    PollingStation,
    RevisionDate,
    MaleVoters,
    FemaleVoters,
    TotalVoters,
}

/// How a value is cut out of the first matching line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The matched text itself.
    Match,
    /// The whole (trimmed) line.
    Line,
    /// The first digit run anywhere in the line.
    FirstNumberInLine,
    /// The first digit run starting at the match.
    NumberFromMatch,
}

/// What an anchor looks for in a line.
#[derive(Debug, Clone)]
pub enum AnchorPattern {
    /// Fixed substring taken from the profile. Empty never matches.
    Literal(String),
    Regex(&'static Regex),
}

impl AnchorPattern {
    /// Byte range of the first occurrence in `line`.
    fn find(&self, line: &str) -> Option<Range<usize>> {
        match self {
            AnchorPattern::Literal(needle) if needle.is_empty() => None,
            AnchorPattern::Literal(needle) => line
                .find(needle.as_str())
                .map(|i| i..i + needle.len()),
            AnchorPattern::Regex(re) => re.find(line).map(|m| m.range()),
        }
    }
}

/// One row of the anchor table.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub field: MetadataField,
    pub pattern: AnchorPattern,
    pub extraction: Extraction,
    pub fallback: String,
}

impl Anchor {
    fn literal(field: MetadataField, needle: &str, extraction: Extraction, fallback: String) -> Self {
        Self {
            field,
            pattern: AnchorPattern::Literal(needle.to_string()),
            extraction,
            fallback,
        }
    }

    fn fixed(
        field: MetadataField,
        re: &'static Regex,
        extraction: Extraction,
        fallback: String,
    ) -> Self {
        Self {
            field,
            pattern: AnchorPattern::Regex(re),
            extraction,
            fallback,
        }
    }

    /// Value from the first line this anchor matches, or `None`.
    pub fn find(&self, lines: &[&str]) -> Option<String> {
        lines.iter().find_map(|line| {
            let span = self.pattern.find(line)?;
            match self.extraction {
                Extraction::Match => Some(line[span].to_string()),
                Extraction::Line => Some(line.to_string()),
                Extraction::FirstNumberInLine => first_number(line),
                Extraction::NumberFromMatch => first_number(&line[span.start..]),
            }
        })
    }

    /// [`Anchor::find`] with the fallback applied.
    pub fn resolve(&self, lines: &[&str]) -> String {
        self.find(lines).unwrap_or_else(|| {
            debug!(field = ?self.field, "metadata anchor not found, using fallback");
            self.fallback.clone()
        })
    }
}

/// Build the cover-page anchor table for `profile`, in lookup order.
pub fn anchor_table(profile: &MetadataProfile) -> Vec<Anchor> {
    use Extraction::*;
    use MetadataField::*;
    vec![
        Anchor::fixed(VoterListYear, &RE_YEAR, Match, profile.default_year.clone()),
        Anchor::literal(State, &profile.state_anchor, Line, profile.default_state.clone()),
        Anchor::literal(
            AssemblyConstituency,
            &profile.constituency_anchor,
            Line,
            profile.default_constituency.clone(),
        ),
        Anchor::literal(
            PartNumber,
            &profile.part_number_anchor,
            NumberFromMatch,
            profile.default_part_number.clone(),
        ),
        Anchor::literal(
            PollingStation,
            &profile.polling_station_anchor,
            Line,
            profile.default_polling_station.clone(),
        ),
        Anchor::fixed(RevisionDate, &RE_DATE, Match, profile.default_revision_date.clone()),
        Anchor::literal(
            MaleVoters,
            &profile.male_count_keyword,
            FirstNumberInLine,
            profile.default_male_voters.to_string(),
        ),
        Anchor::literal(
            FemaleVoters,
            &profile.female_count_keyword,
            FirstNumberInLine,
            profile.default_female_voters.to_string(),
        ),
        Anchor::literal(
            TotalVoters,
            &profile.total_count_keyword,
            FirstNumberInLine,
            profile.default_total_voters.to_string(),
        ),
    ]
}

/// Trimmed, non-empty lines with Devanagari digits made ASCII.
fn clean_lines(text: &str) -> Vec<String> {
    normalize_digits(text)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mine the cover page. Never fails: unmatched anchors take their fallback.
pub fn parse_document_metadata(
    text: &str,
    total_pages: usize,
    profile: &MetadataProfile,
) -> DocumentMetadata {
    let owned = clean_lines(text);
    let lines: Vec<&str> = owned.iter().map(String::as_str).collect();

    let mut meta = DocumentMetadata {
        total_pages: total_pages.to_string(),
        polling_station_type: profile.default_polling_station_type.clone(),
        ..DocumentMetadata::default()
    };

    for anchor in anchor_table(profile) {
        let value = anchor.resolve(&lines);
        let count = value.parse::<u32>().ok();
        match anchor.field {
            MetadataField::VoterListYear => meta.voter_list_year = value,
            MetadataField::State => meta.state = value,
            MetadataField::AssemblyConstituency => meta.assembly_constituency_name = value,
            MetadataField::PartNumber => meta.part_number = value,
            MetadataField::PollingStation => meta.polling_station_name = value,
            MetadataField::RevisionDate => meta.revision_date = value,
            MetadataField::MaleVoters => {
                meta.total_male_voters = count.unwrap_or(profile.default_male_voters)
            }
            MetadataField::FemaleVoters => {
                meta.total_female_voters = count.unwrap_or(profile.default_female_voters)
            }
            MetadataField::TotalVoters => {
                meta.total_voters = count.unwrap_or(profile.default_total_voters)
            }
        }
    }

    meta
}

/// Section header of a roll page: the first line holding `(<digits>)`.
pub fn parse_page_metadata(text: &str) -> PageMetadata {
    let text = normalize_digits(text);
    let Some(line) = text.lines().find(|l| RE_SECTION_LINE.is_match(l)) else {
        return PageMetadata::default();
    };

    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    PageMetadata {
        section_number: RE_SECTION_NUMBER
            .find(line)
            .map(|m| m.as_str().to_string()),
        section_name: RE_SECTION_NAME
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| non_empty(m.as_str())),
        polling_station_name_on_page: RE_PARENTHESISED
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| non_empty(m.as_str())),
    }
}
