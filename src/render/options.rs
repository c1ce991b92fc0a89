//! Rendering options and page selection.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Options for writing a DOCX package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Emit a page break between source pages of the same section
    pub page_breaks: bool,

    /// Embed images; when off, image blocks are left out of the package
    pub embed_images: bool,

    /// Draw single-line borders around table cells
    pub table_borders: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable page breaks between source pages.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.page_breaks = enabled;
        self
    }

    /// Enable or disable image embedding.
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.embed_images = enabled;
        self
    }

    /// Enable or disable table borders.
    pub fn with_table_borders(mut self, enabled: bool) -> Self {
        self.table_borders = enabled;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_breaks: true,
            embed_images: true,
            table_borders: true,
        }
    }
}

/// Which source pages to process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        // Simple range (e.g., "1-10")
        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start = parse_page(start)?;
                let end = parse_page(end)?;
                if start > end {
                    return Err(format!("Range {}-{} is reversed", start, end));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let (start, end) = (parse_page(start)?, parse_page(end)?);
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

fn parse_page(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err("Page numbers start at 1".to_string()),
        Ok(page) => Ok(page),
        Err(_) => Err(format!("Invalid page number: {:?}", s.trim())),
    }
}
