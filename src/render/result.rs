//! Conversion statistics.

use serde::{Deserialize, Serialize};

use crate::layout::ConversionReport;
use crate::model::{Block, Document, Paragraph};

/// Counts describing a reconstructed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages analysed into the document
    pub page_count: u32,

    /// Sections (runs of pages sharing a page size)
    pub section_count: u32,

    /// Body paragraphs, including paragraphs inside table cells
    pub paragraph_count: u32,

    /// Heading paragraphs
    pub heading_count: u32,

    /// List item paragraphs
    pub list_item_count: u32,

    /// Tables
    pub table_count: u32,

    /// Image blocks
    pub image_count: u32,

    /// Distinct embedded images
    pub resource_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,

    /// Pages skipped during ingestion
    pub skipped_pages: u32,

    /// Pages cancelled
    pub cancelled_pages: u32,

    /// Structural fallbacks taken
    pub ambiguity_count: u32,
}

impl ConversionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the blocks of a document.
    pub fn from_document(doc: &Document) -> Self {
        let mut stats = Self {
            section_count: doc.sections.len() as u32,
            resource_count: doc.resources.len() as u32,
            ..Self::default()
        };
        for section in &doc.sections {
            if !section.blocks.is_empty() {
                stats.page_count += 1;
            }
            for block in &section.blocks {
                match block {
                    Block::Paragraph(p) => stats.add_paragraph(p),
                    Block::Table(table) => {
                        stats.table_count += 1;
                        for cell in &table.cells {
                            for p in &cell.content {
                                stats.add_paragraph(p);
                            }
                        }
                    }
                    Block::Image { .. } => stats.image_count += 1,
                    Block::PageBreak => stats.page_count += 1,
                }
            }
        }
        stats
    }

    /// Take page and fallback counts from a conversion report.
    pub fn with_report(mut self, report: &ConversionReport) -> Self {
        self.page_count = report.pages_processed as u32;
        self.skipped_pages = report.skipped.len() as u32;
        self.cancelled_pages = report.cancelled.len() as u32;
        self.ambiguity_count = report.ambiguity_count() as u32;
        self
    }

    fn add_paragraph(&mut self, paragraph: &Paragraph) {
        if paragraph.is_heading() {
            self.heading_count += 1;
        } else if paragraph.is_list_item() {
            self.list_item_count += 1;
        } else {
            self.paragraph_count += 1;
        }
        self.count_text(&paragraph.plain_text());
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }
}
