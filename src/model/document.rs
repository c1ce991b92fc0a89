//! Document-level types.

use super::{Block, Resource, Section, StylePalette};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reconstructed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, author, etc.)
    pub metadata: Metadata,

    /// Sections in reading order
    pub sections: Vec<Section>,

    /// Embedded images, keyed by content hash
    pub resources: BTreeMap<String, Resource>,

    /// Style palette derived from the source font-size histogram
    pub palette: StylePalette,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            metadata: Metadata::default(),
            sections: Vec::new(),
            resources: BTreeMap::new(),
            palette: StylePalette::default(),
        }
    }

    /// Create an empty document that will be styled with `palette`.
    pub fn with_palette(palette: StylePalette) -> Self {
        Self {
            palette,
            ..Self::new()
        }
    }

    /// Add a section to the document.
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Append a block to the current (last) section, opening a default one if needed.
    pub fn push_block(&mut self, block: Block) {
        if self.sections.is_empty() {
            self.sections.push(Section::default());
        }
        if let Some(section) = self.sections.last_mut() {
            section.add_block(block);
        }
    }

    /// Add a resource to the document.
    ///
    /// Resources are content-addressed, so re-adding the same bytes is a no-op.
    pub fn add_resource(&mut self, id: String, resource: Resource) {
        self.resources.entry(id).or_insert(resource);
    }

    /// Store a resource under its content hash and return the id used.
    ///
    /// Identical bytes share one id. A digest collision between different
    /// bytes gets a numbered suffix.
    pub fn intern_resource(&mut self, resource: Resource) -> String {
        let hash = resource.content_hash();
        let mut id = hash.clone();
        let mut suffix = 1;
        loop {
            match self.resources.get(&id) {
                Some(existing) if existing.data == resource.data => return id,
                Some(_) => {
                    id = format!("{}-{}", hash, suffix);
                    suffix += 1;
                }
                None => {
                    self.resources.insert(id.clone(), resource);
                    return id;
                }
            }
        }
    }

    /// Get a resource by ID.
    pub fn get_resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Iterate over every block of every section in reading order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.sections.iter().flat_map(|s| s.blocks.iter())
    }

    /// Check if the document has no content blocks.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.is_empty())
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.plain_text())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Keywords
    pub keywords: Option<String>,

    /// Creator application of the source document
    pub creator: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// Number of pages offered by the extraction provider
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Paragraph;

    #[test]
    fn test_document_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn test_push_block_opens_section() {
        let mut doc = Document::new();
        doc.push_block(Block::Paragraph(Paragraph::with_text("Hello")));
        doc.push_block(Block::Paragraph(Paragraph::with_text("World")));

        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.blocks().count(), 2);
        assert_eq!(doc.plain_text(), "Hello\n\nWorld");
    }

    #[test]
    fn test_resources_are_content_addressed() {
        let mut doc = Document::new();
        let first = Resource::png(vec![1, 2, 3]);
        let id = first.content_hash();
        doc.add_resource(id.clone(), first);
        doc.add_resource(id.clone(), Resource::png(vec![1, 2, 3]));

        assert_eq!(doc.resources.len(), 1);
        assert!(doc.get_resource(&id).is_some());
    }

    #[test]
    fn test_intern_resource() {
        let mut doc = Document::new();
        let a = doc.intern_resource(Resource::png(vec![1, 2, 3]));
        let b = doc.intern_resource(Resource::png(vec![1, 2, 3]));
        let c = doc.intern_resource(Resource::jpeg(vec![4, 5, 6]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(doc.resources.len(), 2);
    }
}
