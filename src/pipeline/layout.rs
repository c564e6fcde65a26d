//! Layout analyzer: positioned tokens → text lines → column bands → grid.
//!
//! ## Algorithm
//!
//! 1. **Lines**: bucket tokens by `round(y)`. Rounding absorbs sub-point
//!    jitter from extraction/OCR while keeping visually distinct lines apart.
//!    Buckets run top-to-bottom (descending y), tokens left-to-right.
//! 2. **Columns**: walk the distinct `round(x)` values in ascending order and
//!    open a new band whenever the gap to the previous value exceeds
//!    `max(30, page_width / 20)`.
//! 3. **Header weighting**: the topmost line is the header candidate. Every
//!    header token that matches a known column keyword adds
//!    `1 / (|x − center| + 1)` to each band. The heaviest bands (at most 8)
//!    survive; stray marks and page numbers far from any header fall away.
//!    Survivors are laid back out left-to-right so cell `i` is always the
//!    `i`-th column of the form.
//! 4. **Projection**: each line becomes a row with one cell per band; a
//!    token lands in the band whose `[min − 10, max + 10]` holds its `x`.
//!    Rows with no content are dropped.
//!
//! The analyzer is a pure function of its input: the same tokens always give
//! the same grid.

use crate::config::LayoutConfig;
use crate::pipeline::tokens::PositionedToken;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Column-header vocabulary of the form, matched anywhere inside a token.
static RE_HEADER_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"नि\.सं\.|घर|नाम|सम्बन्ध|लिंग|आयु|फोटो").unwrap());

/// `true` if the text contains one of the column-header keywords.
pub fn is_header_keyword(text: &str) -> bool {
    RE_HEADER_KEYWORD.is_match(text)
}

/// Tokens sharing one rounded baseline, ordered left-to-right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Rounded baseline shared by every token of the line.
    pub y: i64,
    pub tokens: Vec<PositionedToken>,
}

/// An inferred table column: a run of x positions plus its header affinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBand {
    pub center: f32,
    pub min: f32,
    pub max: f32,
    pub weight: f32,
}

impl ColumnBand {
    fn from_cluster(xs: &[i64]) -> Self {
        let min = xs.first().copied().unwrap_or_default() as f32;
        let max = xs.last().copied().unwrap_or_default() as f32;
        Self {
            center: (min + max) / 2.0,
            min,
            max,
            weight: 0.0,
        }
    }

    /// Does `x` fall inside the band widened by `tolerance` on both sides?
    pub fn contains(&self, x: f32, tolerance: f32) -> bool {
        x >= self.min - tolerance && x <= self.max + tolerance
    }
}

/// Row/column matrix of cell strings for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }
}

/// Result of one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Bands in left-to-right order; `grid` has one cell per band.
    pub bands: Vec<ColumnBand>,
    pub grid: Grid,
}

/// Run the full analyzer over one page's tokens.
pub fn analyze_layout(
    tokens: &[PositionedToken],
    page_width: f32,
    config: &LayoutConfig,
) -> PageLayout {
    let tokens: Vec<PositionedToken> = tokens
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .cloned()
        .collect();

    let lines = group_lines(&tokens);
    let initial = discover_columns(&tokens, page_width, config);
    let initial_count = initial.len();
    let bands = refine_with_header(initial, lines.first(), config);
    let grid = project_grid(&lines, &bands, config);

    debug!(
        "layout: {} tokens, {} lines, {} → {} bands, {} rows",
        tokens.len(),
        lines.len(),
        initial_count,
        bands.len(),
        grid.len()
    );

    PageLayout { bands, grid }
}

/// Step 1: group tokens into lines by rounded y, top of page first.
pub fn group_lines(tokens: &[PositionedToken]) -> Vec<TextLine> {
    let mut buckets: BTreeMap<i64, Vec<PositionedToken>> = BTreeMap::new();
    for token in tokens {
        buckets
            .entry(token.y.round() as i64)
            .or_default()
            .push(token.clone());
    }

    buckets
        .into_iter()
        .rev()
        .map(|(y, mut line)| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            TextLine { y, tokens: line }
        })
        .collect()
}

/// Step 2: cluster distinct rounded x positions into bands.
pub fn discover_columns(
    tokens: &[PositionedToken],
    page_width: f32,
    config: &LayoutConfig,
) -> Vec<ColumnBand> {
    let mut xs: Vec<i64> = tokens.iter().map(|t| t.x.round() as i64).collect();
    xs.sort_unstable();
    xs.dedup();

    let Some((&first, rest)) = xs.split_first() else {
        return Vec::new();
    };

    let gap = config.column_gap(page_width);
    let mut bands = Vec::new();
    let mut cluster = vec![first];
    for &x in rest {
        let prev = *cluster.last().unwrap_or(&x);
        if (x - prev) as f32 > gap {
            bands.push(ColumnBand::from_cluster(&cluster));
            cluster.clear();
        }
        cluster.push(x);
    }
    bands.push(ColumnBand::from_cluster(&cluster));
    bands
}

/// Step 3: weight bands by header-keyword proximity, keep the heaviest
/// `max_columns`, then restore left-to-right order.
pub fn refine_with_header(
    mut bands: Vec<ColumnBand>,
    header: Option<&TextLine>,
    config: &LayoutConfig,
) -> Vec<ColumnBand> {
    let keywords: Vec<&PositionedToken> = header
        .map(|line| {
            line.tokens
                .iter()
                .filter(|t| is_header_keyword(&t.text))
                .collect()
        })
        .unwrap_or_default();

    for band in &mut bands {
        band.weight = keywords
            .iter()
            .map(|t| 1.0 / ((t.x - band.center).abs() + 1.0))
            .sum();
    }

    // Stable: equal weights keep their left-to-right order, so a header-less
    // page keeps its leftmost bands.
    bands.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    bands.truncate(config.max_columns);
    bands.sort_by(|a, b| a.center.total_cmp(&b.center));
    bands
}

/// Step 4: project every line onto the bands.
pub fn project_grid(lines: &[TextLine], bands: &[ColumnBand], config: &LayoutConfig) -> Grid {
    let mut rows = Vec::with_capacity(lines.len());

    for line in lines {
        let mut row = vec![String::new(); bands.len()];
        for token in &line.tokens {
            let text = token.text.trim();
            if text.is_empty() {
                continue;
            }
            let Some(idx) = bands
                .iter()
                .position(|b| b.contains(token.x, config.band_tolerance))
            else {
                continue;
            };
            let cell = &mut row[idx];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(text);
        }
        if row.iter().any(|c| !c.trim().is_empty()) {
            rows.push(row);
        }
    }

    Grid { rows }
}
