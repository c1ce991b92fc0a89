//! Extraction provider abstraction.
//!
//! The decoder that turns a source page into positioned items lives outside
//! this crate. It is reached through [`ExtractionProvider`], which hands out
//! one [`RawPage`] per page index without any ordering guarantee on items.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Metadata;

/// Kind of a raw provider item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawKind {
    /// A run of text
    Text,
    /// An embedded raster image
    Image,
}

/// Style flags reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleFlags {
    /// Bold weight
    pub bold: bool,
    /// Italic or oblique
    pub italic: bool,
    /// Underlined
    pub underline: bool,
}

/// One positioned item as reported by the provider.
///
/// Coordinates are in points with y growing downwards: `bbox = [x0, y0, x1, y1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Page index the provider attributes this item to
    #[serde(default)]
    pub page_index: usize,

    /// Text or image
    pub kind: RawKind,

    /// Bounding box
    pub bbox: [f32; 4],

    /// Text content (text items)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Font family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    /// Font size in points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,

    /// Style flags; inferred from the font name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_flags: Option<StyleFlags>,

    /// Encoded image bytes (image items), base64 in JSON
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub image_bytes: Option<Vec<u8>>,

    /// Image width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Image height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl RawItem {
    /// Create a text item.
    pub fn text(bbox: [f32; 4], text: impl Into<String>) -> Self {
        Self {
            page_index: 0,
            kind: RawKind::Text,
            bbox,
            text: Some(text.into()),
            font_family: None,
            font_size: None,
            style_flags: None,
            image_bytes: None,
            width: None,
            height: None,
        }
    }

    /// Create an image item.
    pub fn image(bbox: [f32; 4], bytes: Vec<u8>) -> Self {
        Self {
            kind: RawKind::Image,
            text: None,
            image_bytes: Some(bytes),
            ..Self::text(bbox, "")
        }
    }

    /// Set the font family and size.
    pub fn with_font(mut self, family: impl Into<String>, size: f32) -> Self {
        self.font_family = Some(family.into());
        self.font_size = Some(size);
        self
    }

    /// Set the font size only.
    pub fn with_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Set explicit style flags.
    pub fn with_style(mut self, flags: StyleFlags) -> Self {
        self.style_flags = Some(flags);
        self
    }

    /// Mark the item bold.
    pub fn bold(self) -> Self {
        let flags = StyleFlags {
            bold: true,
            ..self.style_flags.unwrap_or_default()
        };
        self.with_style(flags)
    }
}

/// All items the provider reports for one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPage {
    /// Page index (0-based)
    #[serde(default)]
    pub index: usize,

    /// Page width in points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    /// Page height in points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    /// Items in provider order
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl RawPage {
    /// Create an empty page.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Set the page size.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Add an item, stamping it with this page's index.
    pub fn push(&mut self, mut item: RawItem) {
        item.page_index = self.index;
        self.items.push(item);
    }

    /// Builder form of [`RawPage::push`].
    pub fn with_item(mut self, item: RawItem) -> Self {
        self.push(item);
        self
    }
}

/// Source of positioned page content.
pub trait ExtractionProvider: Sync {
    /// Number of pages available.
    fn page_count(&self) -> usize;

    /// Fetch one page's raw items.
    ///
    /// Most errors skip only this page; [`Error::Provider`] aborts the run.
    fn page(&self, index: usize) -> Result<RawPage>;

    /// Document-level metadata.
    fn metadata(&self) -> Metadata {
        Metadata::default()
    }
}

/// A provider over pages already held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryProvider {
    /// Document metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Pages in index order
    #[serde(default)]
    pub pages: Vec<RawPage>,
}

impl MemoryProvider {
    /// Create a provider over the given pages.
    pub fn new(pages: Vec<RawPage>) -> Self {
        Self {
            metadata: Metadata::default(),
            pages,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl ExtractionProvider for MemoryProvider {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<RawPage> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(Error::PageOutOfRange(index + 1, self.pages.len()))
    }

    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }
}

/// A provider reading a JSON dump of the form `{ "metadata": {...}, "pages": [...] }`.
#[derive(Debug, Clone)]
pub struct JsonProvider {
    inner: MemoryProvider,
}

impl JsonProvider {
    /// Parse a JSON dump from a string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let inner: MemoryProvider = serde_json::from_str(json)?;
        Ok(Self::from_dump(inner))
    }

    /// Parse a JSON dump from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let inner: MemoryProvider = serde_json::from_slice(data)?;
        Ok(Self::from_dump(inner))
    }

    /// Read a JSON dump from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    fn from_dump(mut inner: MemoryProvider) -> Self {
        for (index, page) in inner.pages.iter_mut().enumerate() {
            page.index = index;
        }
        Self { inner }
    }
}

impl ExtractionProvider for JsonProvider {
    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn page(&self, index: usize) -> Result<RawPage> {
        self.inner.page(index)
    }

    fn metadata(&self) -> Metadata {
        self.inner.metadata()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{
        "metadata": {"title": "Quarterly report", "author": "Finance"},
        "pages": [
            {"width": 612, "height": 792, "items": [
                {"kind": "text", "bbox": [72, 72, 200, 84], "text": "Hello",
                 "font_family": "Helvetica-Bold", "font_size": 12},
                {"kind": "image", "bbox": [72, 100, 172, 200], "image_bytes": "iVBORw0KGgo="}
            ]},
            {"items": []}
        ]
    }"#;

    #[test]
    fn test_json_provider() {
        let provider = JsonProvider::from_json_str(DUMP).unwrap();
        assert_eq!(provider.page_count(), 2);
        assert_eq!(provider.metadata().title.as_deref(), Some("Quarterly report"));

        let page = provider.page(0).unwrap();
        assert_eq!(page.width, Some(612.0));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].kind, RawKind::Text);
        assert_eq!(
            page.items[1].image_bytes.as_deref(),
            Some(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A][..])
        );

        let second = provider.page(1).unwrap();
        assert_eq!(second.index, 1);
        assert!(second.items.is_empty());
    }

    #[test]
    fn test_page_out_of_range() {
        let provider = MemoryProvider::new(vec![RawPage::new(0)]);
        assert!(matches!(
            provider.page(3),
            Err(Error::PageOutOfRange(4, 1))
        ));
    }

    #[test]
    fn test_bad_base64_is_a_json_error() {
        let json = r#"{"pages": [{"items": [
            {"kind": "image", "bbox": [0, 0, 1, 1], "image_bytes": "***"}
        ]}]}"#;
        assert!(matches!(
            JsonProvider::from_json_str(json),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_raw_page_builder_stamps_index() {
        let page = RawPage::new(4)
            .with_size(595.0, 842.0)
            .with_item(RawItem::text([0.0, 0.0, 10.0, 10.0], "x").bold());
        assert_eq!(page.items[0].page_index, 4);
        assert_eq!(page.items[0].style_flags.map(|f| f.bold), Some(true));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(&path, DUMP).unwrap();
        let provider = JsonProvider::from_file(&path).unwrap();
        assert_eq!(provider.page_count(), 2);
    }
}
