//! Table validator: decides whether an inferred grid is dense enough to be
//! trusted as the voter table.
//!
//! A voter row fills six to eight of its cells (photo-ID and sometimes house
//! number may be blank). Scattered page furniture projected onto the same
//! bands fills one or two. The verdict is the share of dense rows, with an
//! optional header row excluded from the count.

use crate::config::ValidationConfig;
use crate::pipeline::layout::{is_header_keyword, Grid};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Serial-number style marker such as `1.` printed in a header cell.
static RE_NUMERIC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.$").unwrap());

/// Outcome of validating one grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableVerdict {
    pub is_table: bool,
    pub total_rows: usize,
    pub header_detected: bool,
    /// Rows counted in the ratio denominator (header excluded).
    pub data_rows: usize,
    pub valid_rows: usize,
    pub valid_ratio: f32,
}

/// Number of cells with non-whitespace content.
pub fn filled_cells(row: &[String]) -> usize {
    row.iter().filter(|c| !c.trim().is_empty()).count()
}

/// A row is a header if any cell holds a column keyword or a bare `N.` marker.
pub fn is_header_row(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let cell = cell.trim();
        is_header_keyword(cell) || RE_NUMERIC_MARKER.is_match(cell)
    })
}

/// Score `grid` against the density rule in `config`.
pub fn validate_table(grid: &Grid, config: &ValidationConfig) -> TableVerdict {
    let total_rows = grid.len();
    if total_rows < config.min_rows {
        return TableVerdict {
            total_rows,
            ..TableVerdict::default()
        };
    }

    let header_detected = grid.row(0).is_some_and(is_header_row);
    let data = if header_detected {
        &grid.rows[1..]
    } else {
        &grid.rows[..]
    };

    let valid_rows = data
        .iter()
        .filter(|row| {
            let n = filled_cells(row);
            n >= config.min_filled_cells && n <= config.max_filled_cells
        })
        .count();

    let valid_ratio = if data.is_empty() {
        0.0
    } else {
        valid_rows as f32 / data.len() as f32
    };

    TableVerdict {
        is_table: !data.is_empty() && valid_ratio >= config.min_valid_ratio,
        total_rows,
        header_detected,
        data_rows: data.len(),
        valid_rows,
        valid_ratio,
    }
}
