//! Configuration types for voter-list extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The structural thresholds live in
//! [`LayoutConfig`] and [`ValidationConfig`]; the metadata anchors and their
//! fallbacks live in [`MetadataProfile`], which is plain serde data so a
//! different district's roll can be described in a JSON file instead of code.

use crate::error::VoterListError;
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use crate::progress::{CancelToken, ProgressSender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use edgequake_voterlist::{ExtractionConfig, OcrMode};
///
/// let config = ExtractionConfig::builder()
///     .ocr_mode(OcrMode::Never)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.layout.max_columns, 8);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// When to run OCR. Default: [`OcrMode::Auto`].
    pub ocr_mode: OcrMode,

    /// OCR engine used for scanned pages. Default: `tesseract` on `PATH`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Language hint passed to the OCR engine. Default: `"hin"`.
    pub ocr_language: String,

    /// Raster scale for OCR images (page points → pixels). Default: 2.0.
    ///
    /// Also the divisor used to map OCR word boxes back into page space.
    pub ocr_scale: f32,

    /// Grey level above which a pixel becomes white before OCR. Default: 180.
    /// `None` sends the colour render unchanged.
    pub binarize_threshold: Option<u8>,

    /// Pages OCR'd concurrently. Default: 4.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit pdfium shared library. Falls back to `PDFIUM_LIB_PATH`, then
    /// the working directory, then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    pub layout: LayoutConfig,
    pub validation: ValidationConfig,
    pub metadata: MetadataProfile,
    pub overlay: OverlayConfig,
    pub artifacts: ArtifactConfig,

    /// Progress event sink.
    pub progress: Option<ProgressSender>,

    /// Checked between pages.
    pub cancel: CancelToken,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::default(),
            ocr_engine: Some(Arc::new(TesseractCli::default())),
            ocr_language: "hin".to_string(),
            ocr_scale: 2.0,
            binarize_threshold: Some(180),
            concurrency: 4,
            password: None,
            pdfium_lib_path: None,
            download_timeout_secs: 120,
            layout: LayoutConfig::default(),
            validation: ValidationConfig::default(),
            metadata: MetadataProfile::default(),
            overlay: OverlayConfig::default(),
            artifacts: ArtifactConfig::default(),
            progress: None,
            cancel: CancelToken::default(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_mode", &self.ocr_mode)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|e| e.name().to_string()))
            .field("ocr_language", &self.ocr_language)
            .field("ocr_scale", &self.ocr_scale)
            .field("binarize_threshold", &self.binarize_threshold)
            .field("concurrency", &self.concurrency)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("layout", &self.layout)
            .field("validation", &self.validation)
            .field("metadata", &self.metadata)
            .field("overlay", &self.overlay)
            .field("artifacts", &self.artifacts)
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn ocr_mode(mut self, mode: OcrMode) -> Self {
        self.config.ocr_mode = mode;
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    /// Remove the OCR engine; scanned pages then keep their native tokens.
    pub fn without_ocr_engine(mut self) -> Self {
        self.config.ocr_engine = None;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_scale(mut self, scale: f32) -> Self {
        self.config.ocr_scale = scale;
        self
    }

    pub fn binarize_threshold(mut self, threshold: Option<u8>) -> Self {
        self.config.binarize_threshold = threshold;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.config.validation = validation;
        self
    }

    pub fn metadata(mut self, profile: MetadataProfile) -> Self {
        self.config.metadata = profile;
        self
    }

    pub fn overlay(mut self, overlay: OverlayConfig) -> Self {
        self.config.overlay = overlay;
        self
    }

    pub fn artifacts(mut self, artifacts: ArtifactConfig) -> Self {
        self.config.artifacts = artifacts;
        self
    }

    pub fn overlay_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.overlay.font_path = Some(path.into());
        self
    }

    pub fn progress(mut self, tx: ProgressSender) -> Self {
        self.config.progress = Some(tx);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, VoterListError> {
        let c = &self.config;
        if !(0.5..=8.0).contains(&c.ocr_scale) {
            return Err(VoterListError::InvalidConfig(format!(
                "OCR scale must be 0.5–8.0, got {}",
                c.ocr_scale
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(VoterListError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.layout.max_columns == 0 {
            return Err(VoterListError::InvalidConfig(
                "max_columns must be ≥ 1".into(),
            ));
        }
        if !(c.layout.width_gap_divisor > 0.0) {
            return Err(VoterListError::InvalidConfig(format!(
                "width_gap_divisor must be positive, got {}",
                c.layout.width_gap_divisor
            )));
        }
        if !(c.layout.band_tolerance >= 0.0) {
            return Err(VoterListError::InvalidConfig(format!(
                "band_tolerance must not be negative, got {}",
                c.layout.band_tolerance
            )));
        }
        // Split gaps are at least `min_column_gap`; bands stay disjoint after
        // widening by the tolerance on both sides only above this bound.
        if c.layout.min_column_gap <= 2.0 * c.layout.band_tolerance {
            return Err(VoterListError::InvalidConfig(format!(
                "min_column_gap ({}) must exceed twice band_tolerance ({})",
                c.layout.min_column_gap, c.layout.band_tolerance
            )));
        }
        if c.validation.min_filled_cells > c.validation.max_filled_cells {
            return Err(VoterListError::InvalidConfig(format!(
                "min_filled_cells ({}) exceeds max_filled_cells ({})",
                c.validation.min_filled_cells, c.validation.max_filled_cells
            )));
        }
        if !(0.0..=1.0).contains(&c.validation.min_valid_ratio) {
            return Err(VoterListError::InvalidConfig(format!(
                "min_valid_ratio must be within 0–1, got {}",
                c.validation.min_valid_ratio
            )));
        }
        if !(c.overlay.render_scale > 0.0) {
            return Err(VoterListError::InvalidConfig(
                "overlay render_scale must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// When the OCR path is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrMode {
    /// OCR every page when the document's native text is under 100 characters
    /// or has no Devanagari at all (default).
    #[default]
    Auto,
    /// Always OCR, even if native text looks usable.
    Always,
    /// Never OCR; scanned pages yield empty grids.
    Never,
}

// ── Structural thresholds ────────────────────────────────────────────────

/// Knobs of the layout analyzer. Defaults match the target form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Lower bound of the column split gap, in points. Default: 30.
    pub min_column_gap: f32,
    /// The split gap is `max(min_column_gap, page_width / width_gap_divisor)`. Default: 20.
    pub width_gap_divisor: f32,
    /// Bands kept after header weighting. Default: 8.
    pub max_columns: usize,
    /// Slack on each side of a band when projecting tokens. Default: 10.
    pub band_tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_column_gap: 30.0,
            width_gap_divisor: 20.0,
            max_columns: 8,
            band_tolerance: 10.0,
        }
    }
}

impl LayoutConfig {
    /// Width-adaptive gap above which a new column band starts.
    pub fn column_gap(&self, page_width: f32) -> f32 {
        self.min_column_gap.max(page_width / self.width_gap_divisor)
    }
}

/// Knobs of the table validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Grids with fewer rows are never tables. Default: 3.
    pub min_rows: usize,
    /// Inclusive lower bound of non-empty cells in a valid row. Default: 6.
    pub min_filled_cells: usize,
    /// Inclusive upper bound of non-empty cells in a valid row. Default: 8.
    pub max_filled_cells: usize,
    /// Share of non-header rows that must be valid. Default: 0.8.
    pub min_valid_ratio: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rows: 3,
            min_filled_cells: 6,
            max_filled_cells: 8,
            min_valid_ratio: 0.8,
        }
    }
}

// ── Metadata anchors ─────────────────────────────────────────────────────

/// Anchors and fallbacks for front-page metadata.
///
/// The defaults describe the Bareilly Cantt. part 106 roll the heuristics
/// were tuned on. They are sample values: override them per roll with
/// [`MetadataProfile::from_json_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataProfile {
    /// Substring identifying the state line.
    pub state_anchor: String,
    /// Substring identifying the assembly-constituency line.
    pub constituency_anchor: String,
    /// Keyword of the part-number line; the number is the first digit run
    /// from the keyword on.
    pub part_number_anchor: String,
    /// Substring identifying the polling-station line.
    pub polling_station_anchor: String,
    /// Keyword preceding the male voter count.
    pub male_count_keyword: String,
    /// Keyword preceding the female voter count.
    pub female_count_keyword: String,
    /// Keyword preceding the total voter count.
    pub total_count_keyword: String,

    pub default_year: String,
    pub default_state: String,
    pub default_constituency: String,
    pub default_part_number: String,
    pub default_polling_station: String,
    pub default_revision_date: String,
    pub default_polling_station_type: String,
    pub default_male_voters: u32,
    pub default_female_voters: u32,
    pub default_total_voters: u32,
}

impl Default for MetadataProfile {
    fn default() -> Self {
        Self {
            state_anchor: "उत्तर प्रदेश".into(),
            constituency_anchor: "बरेली".into(),
            part_number_anchor: "भाग".into(),
            polling_station_anchor: "स्कूल".into(),
            male_count_keyword: "पुरुष".into(),
            female_count_keyword: "महिला".into(),
            total_count_keyword: "कुल".into(),
            default_year: "2003".into(),
            default_state: "उत्तर प्रदेश".into(),
            default_constituency: "बरेली कैण्ट".into(),
            default_part_number: "106".into(),
            default_polling_station: "बालजती जू० हाई स्कूल".into(),
            default_revision_date: "30-06-2003".into(),
            default_polling_station_type: "मुख्य मतदान स्थल".into(),
            default_male_voters: 617,
            default_female_voters: 514,
            default_total_voters: 1131,
        }
    }
}

impl MetadataProfile {
    /// Load a profile from JSON. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, VoterListError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VoterListError::InvalidConfig(format!(
                "cannot read metadata profile {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, VoterListError> {
        serde_json::from_str(raw)
            .map_err(|e| VoterListError::InvalidConfig(format!("invalid metadata profile: {e}")))
    }
}

// ── Output ───────────────────────────────────────────────────────────────

/// Searchable-PDF writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Scale at which the background page image is rendered. Default: 1.5.
    pub render_scale: f32,
    /// TrueType font embedded for the invisible layer. Devanagari needs one;
    /// without it Helvetica is used and non-Latin glyphs are not searchable.
    pub font_path: Option<PathBuf>,
    /// Append validated grid rows as invisible `TableRowN:` lines. Default: true.
    pub include_table_rows: bool,
    /// Font size of the table-row lines. Default: 8.
    pub table_row_font_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            font_path: None,
            include_table_rows: true,
            table_row_font_size: 8.0,
        }
    }
}

/// Which files [`crate::extract_to_files`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Write `<stem>_extracted.json`. Default: true.
    pub json: bool,
    /// Write `<stem>_searchable_structured.pdf`. Default: true.
    pub searchable_pdf: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            json: true,
            searchable_pdf: true,
        }
    }
}
