//! Document model types for reconstructed content.
//!
//! This module defines the structured representation produced by the layout
//! pipeline and consumed by the renderers. It knows nothing about page
//! geometry; everything here is already in final reading order.

mod document;
mod paragraph;
mod resource;
mod section;
mod style;
mod table;

pub use document::{Document, Metadata};
pub use paragraph::{
    ListInfo, ListStyle, NumberStyle, Paragraph, ParagraphStyle, TextRun, TextStyle,
};
pub use resource::Resource;
pub use section::{Block, Section};
pub use style::{
    heading_style_id, SizeBand, StylePalette, BODY_STYLE_ID, LIST_STYLE_ID, TABLE_STYLE_ID,
};
pub use table::{Table, TableCell, TilingError};
