//! Layout reconstruction pipeline.
//!
//! Turns positioned fragments into classified, ordered blocks and tables:
//!
//! 1. [`fragment`]: provider items are validated and normalised
//! 2. [`line`]: fragments sharing a baseline become lines
//! 3. [`block`]: lines separated by small gaps become blocks
//! 4. [`column`]: blocks are assigned to columns and put in reading order
//! 5. [`classify`]: blocks are labelled heading, list item, paragraph or table candidate
//! 6. [`table_detector`]: aligned candidates become table grids
//! 7. [`builder`]: the page's blocks become document model content
//!
//! [`pipeline`] runs these stages per page, in parallel, after building the
//! document-wide [`StylePalette`](crate::model::StylePalette) in [`palette`].

pub mod block;
pub mod builder;
pub mod classify;
pub mod cluster;
pub mod column;
pub mod fragment;
pub mod line;
pub mod options;
pub mod palette;
pub mod pipeline;
pub mod provider;
pub mod table_detector;

use thiserror::Error;

pub use block::{Block, BlockKind};
pub use fragment::{BBox, Fragment, ImageFragment, IngestedPage, Ingestor, TextFragment};
pub use line::Line;
pub use options::{
    BlockConfig, ClassifierConfig, ColumnConfig, ErrorMode, LayoutOptions, LineConfig,
    TableConfig,
};
pub use palette::PaletteBuilder;
pub use pipeline::{
    analyze_page, Cancellation, ConversionReport, PageLayout, Pipeline, ProgressEvent,
    Reconstruction, SkippedPage,
};
pub use provider::{
    ExtractionProvider, JsonProvider, MemoryProvider, RawItem, RawKind, RawPage, StyleFlags,
};

/// Insufficient structural evidence.
///
/// Never fatal: the stage that raises it falls back to the simpler structure
/// (single column, plain paragraphs, body style) and the occurrence is
/// counted in the conversion report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ambiguity {
    /// Clustering needed more iterations than allowed.
    #[error("clustering exceeded {cap} iterations")]
    IterationCap {
        /// The configured cap
        cap: usize,
    },

    /// Column bands could not be resolved; the page is read as one column.
    #[error("column layout unresolved: {0}")]
    Columns(String),

    /// A candidate table region was rejected.
    #[error("table region rejected: {0}")]
    Table(String),

    /// An ordered list marker had no numbered sibling.
    #[error("list marker without numbered sibling")]
    ListNumbering,
}

impl Ambiguity {
    /// Short category name used for report counts.
    pub fn category(&self) -> &'static str {
        match self {
            Ambiguity::IterationCap { .. } => "iteration_cap",
            Ambiguity::Columns(_) => "columns",
            Ambiguity::Table(_) => "table",
            Ambiguity::ListNumbering => "list_numbering",
        }
    }
}
