//! Section-level types.

use super::{Paragraph, Table};
use serde::{Deserialize, Serialize};

/// US Letter width in points.
pub(crate) const LETTER_WIDTH: f32 = 612.0;

/// US Letter height in points.
pub(crate) const LETTER_HEIGHT: f32 = 792.0;

/// A run of pages sharing one page size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Page width in points (1 point = 1/72 inch)
    pub page_width: f32,

    /// Page height in points
    pub page_height: f32,

    /// Content blocks in reading order
    pub blocks: Vec<Block>,
}

impl Section {
    /// Create a new section with the given page dimensions.
    pub fn new(page_width: f32, page_height: f32) -> Self {
        Self {
            page_width,
            page_height,
            blocks: Vec::new(),
        }
    }

    /// Create a new section with standard Letter size (8.5 x 11 inches).
    pub fn letter() -> Self {
        Self::new(LETTER_WIDTH, LETTER_HEIGHT)
    }

    /// Add a block to the section.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Whether a page of the given size can continue this section.
    pub fn fits_page(&self, width: f32, height: f32) -> bool {
        (self.page_width - width).abs() < 0.5 && (self.page_height - height).abs() < 0.5
    }

    /// Get plain text content of the section.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(p) => Some(p.plain_text()),
                Block::Table(t) => Some(t.plain_text()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the section holds no content (page breaks do not count).
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| matches!(b, Block::PageBreak))
    }

    /// Check if the page is in landscape orientation.
    pub fn is_landscape(&self) -> bool {
        self.page_width > self.page_height
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::letter()
    }
}

/// A content block in a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A paragraph of text (body, heading or list item)
    Paragraph(Paragraph),

    /// A reconstructed table
    Table(Table),

    /// An inline image
    Image {
        /// Resource ID for the image
        resource_id: String,
        /// Alternative text
        alt_text: Option<String>,
        /// Display width in points
        width: f32,
        /// Display height in points
        height: f32,
    },

    /// A page break between source pages
    PageBreak,
}

impl Block {
    /// Create an image block with display dimensions.
    pub fn image(resource_id: impl Into<String>, width: f32, height: f32) -> Self {
        Block::Image {
            resource_id: resource_id.into(),
            alt_text: None,
            width,
            height,
        }
    }

    /// Check if this block is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// Check if this block is an image.
    pub fn is_image(&self) -> bool {
        matches!(self, Block::Image { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_new() {
        let section = Section::new(612.0, 792.0);
        assert!(section.is_empty());
        assert!(!section.is_landscape());
        assert!(section.fits_page(612.2, 791.9));
        assert!(!section.fits_page(792.0, 612.0));
    }

    #[test]
    fn test_page_break_is_not_content() {
        let mut section = Section::letter();
        section.add_block(Block::PageBreak);
        assert!(section.is_empty());

        section.add_block(Block::Paragraph(Paragraph::with_text("x")));
        assert!(!section.is_empty());
    }

    #[test]
    fn test_block_variants() {
        let img = Block::image("abc", 100.0, 50.0);
        assert!(img.is_image());
        assert!(!img.is_paragraph());
        assert!(!img.is_table());
    }
}
