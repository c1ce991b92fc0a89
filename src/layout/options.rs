//! Layout thresholds and pipeline configuration.
//!
//! Every threshold is relative to the geometry it is applied to (line height,
//! body size) with a small absolute floor, so the same defaults work for 9pt
//! and 24pt text.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::render::PageSelection;

/// Options for the reconstruction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Line assembly thresholds
    pub line: LineConfig,

    /// Block segmentation thresholds
    pub block: BlockConfig,

    /// Column detection thresholds
    pub column: ColumnConfig,

    /// Structural classification thresholds
    pub classifier: ClassifierConfig,

    /// Table reconstruction thresholds
    pub table: TableConfig,

    /// Upper bound on split iterations of any 1-D clustering run
    pub cluster_iteration_cap: usize,

    /// Whether to process pages on parallel workers
    pub parallel: bool,

    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Page size (width, height in points) for pages that do not report one
    pub default_page_size: (f32, f32),

    /// Page selection (which pages to process)
    #[serde(skip)]
    pub pages: PageSelection,
}

impl LayoutOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Skip unusable pages and continue.
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Abort on the first unusable page.
    pub fn strict(mut self) -> Self {
        self.error_mode = ErrorMode::Strict;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set line assembly thresholds.
    pub fn with_line_config(mut self, config: LineConfig) -> Self {
        self.line = config;
        self
    }

    /// Set block segmentation thresholds.
    pub fn with_block_config(mut self, config: BlockConfig) -> Self {
        self.block = config;
        self
    }

    /// Set column detection thresholds.
    pub fn with_column_config(mut self, config: ColumnConfig) -> Self {
        self.column = config;
        self
    }

    /// Set classifier thresholds.
    pub fn with_classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Set table reconstruction thresholds.
    pub fn with_table_config(mut self, config: TableConfig) -> Self {
        self.table = config;
        self
    }

    /// Set the clustering iteration cap.
    pub fn with_cluster_iteration_cap(mut self, cap: usize) -> Self {
        self.cluster_iteration_cap = cap;
        self
    }

    /// Set the fallback page size in points.
    pub fn with_default_page_size(mut self, width: f32, height: f32) -> Self {
        self.default_page_size = (width, height);
        self
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        let factors = [
            ("line.baseline_floor", self.line.baseline_floor),
            ("line.baseline_factor", self.line.baseline_factor),
            ("line.word_gap_factor", self.line.word_gap_factor),
            ("block.gap_floor", self.block.gap_floor),
            ("block.gap_factor", self.block.gap_factor),
            ("block.size_break_ratio", self.block.size_break_ratio),
            ("column.min_gap_factor", self.column.min_gap_factor),
            ("column.separation_ratio", self.column.separation_ratio),
            ("classifier.heading_ratio", self.classifier.heading_ratio),
            ("classifier.list_indent_step", self.classifier.list_indent_step),
            ("table.row_tolerance_factor", self.table.row_tolerance_factor),
            ("table.max_row_gap_factor", self.table.max_row_gap_factor),
            ("table.min_column_gap_factor", self.table.min_column_gap_factor),
            ("default_page_size.width", self.default_page_size.0),
            ("default_page_size.height", self.default_page_size.1),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("line.abut_epsilon", self.line.abut_epsilon),
            ("classifier.band_tolerance", self.classifier.band_tolerance),
            ("classifier.heading_min_delta", self.classifier.heading_min_delta),
            ("table.span_tolerance", self.table.span_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        if self.cluster_iteration_cap == 0 {
            return Err(Error::InvalidConfig(
                "cluster_iteration_cap must be at least 1".into(),
            ));
        }
        if self.column.max_passes == 0 {
            return Err(Error::InvalidConfig(
                "column.max_passes must be at least 1".into(),
            ));
        }
        if !(1..=9).contains(&self.classifier.max_heading_levels) {
            return Err(Error::InvalidConfig(
                "classifier.max_heading_levels must be between 1 and 9".into(),
            ));
        }
        if self.table.min_rows < 2 || self.table.min_columns < 2 {
            return Err(Error::InvalidConfig(
                "a table needs at least 2 rows and 2 columns".into(),
            ));
        }
        if self.table.max_columns < self.table.min_columns {
            return Err(Error::InvalidConfig(
                "table.max_columns is below table.min_columns".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            line: LineConfig::default(),
            block: BlockConfig::default(),
            column: ColumnConfig::default(),
            classifier: ClassifierConfig::default(),
            table: TableConfig::default(),
            cluster_iteration_cap: 256,
            parallel: true,
            error_mode: ErrorMode::Lenient,
            default_page_size: (612.0, 792.0),
            pages: PageSelection::All,
        }
    }
}

/// Line assembly thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Minimum baseline tolerance in points
    pub baseline_floor: f32,
    /// Baseline tolerance as a fraction of the current line height (`k`)
    pub baseline_factor: f32,
    /// Horizontal gap, either way, within which two fragments abut without a space
    pub abut_epsilon: f32,
    /// Horizontal gap, in line heights, that splits a visual row into separate lines
    pub word_gap_factor: f32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baseline_floor: 2.0,
            baseline_factor: 0.5,
            abut_epsilon: 0.5,
            word_gap_factor: 1.5,
        }
    }
}

/// Block segmentation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Minimum inter-line gap that can start a new block, in points
    pub gap_floor: f32,
    /// Inter-line gap as a fraction of the page's median line height (`k2`)
    pub gap_factor: f32,
    /// Relative font-size change that starts a new block
    pub size_break_ratio: f32,
    /// Start a new block when a line switches between bold and regular
    pub split_on_weight_change: bool,
    /// Start a new block at a line that begins with a list marker
    pub split_on_list_marker: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            gap_floor: 2.0,
            gap_factor: 0.6,
            size_break_ratio: 0.2,
            split_on_weight_change: true,
            split_on_list_marker: true,
        }
    }
}

/// Column detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Minimum gutter between column left edges, in median line heights
    pub min_gap_factor: f32,
    /// Required ratio of the gutter to the spread inside each column
    pub separation_ratio: f32,
    /// Number of full-width removal passes
    pub max_passes: usize,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            min_gap_factor: 3.0,
            separation_ratio: 2.0,
            max_passes: 3,
        }
    }
}

/// Structural classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Sizes closer than this (points) share a palette band
    pub band_tolerance: f32,
    /// Minimum distance above body size for a heading band, in points
    pub heading_min_delta: f32,
    /// Minimum distance above body size for a heading band, as a fraction of body size
    pub heading_ratio: f32,
    /// Maximum number of heading levels
    pub max_heading_levels: u8,
    /// Blocks with more lines than this are never headings
    pub heading_max_lines: usize,
    /// Indentation per list nesting level, in points
    pub list_indent_step: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            band_tolerance: 0.6,
            heading_min_delta: 1.0,
            heading_ratio: 0.08,
            max_heading_levels: 6,
            heading_max_lines: 4,
            list_indent_step: 18.0,
        }
    }
}

/// Table reconstruction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Minimum number of row bands
    pub min_rows: usize,
    /// Minimum number of column bands
    pub min_columns: usize,
    /// Maximum number of column bands
    pub max_columns: usize,
    /// Top-y tolerance for a row band, in line heights
    pub row_tolerance_factor: f32,
    /// Largest vertical gap between consecutive rows, in line heights
    pub max_row_gap_factor: f32,
    /// Minimum gap between column band left edges, in line heights
    pub min_column_gap_factor: f32,
    /// Blocks with more lines than this never join a table
    pub max_cell_lines: usize,
    /// How far (points) a block must cross a band edge to span it
    pub span_tolerance: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 12,
            row_tolerance_factor: 0.5,
            max_row_gap_factor: 3.0,
            min_column_gap_factor: 1.0,
            max_cell_lines: 8,
            span_tolerance: 2.0,
        }
    }
}

/// Error handling mode for unusable pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Fail on the first unusable page
    Strict,
    /// Skip unusable pages and report them
    #[default]
    Lenient,
}
