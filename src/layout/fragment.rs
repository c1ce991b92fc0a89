//! Fragment ingestion.
//!
//! Raw provider items are validated and normalised into [`Fragment`]s: the
//! smallest positioned unit (a run of text or an image) the rest of the
//! pipeline works on.

use std::cmp::Ordering;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::provider::{RawItem, RawKind, RawPage, StyleFlags};
use crate::error::{Error, Result};

/// Font size used when no explicit size has been seen yet.
pub const FALLBACK_FONT_SIZE: f32 = 12.0;

/// An axis-aligned rectangle in page points; y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a box, swapping inverted edges.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Whether every edge is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the horizontal overlap (negative when disjoint).
    pub fn x_overlap(&self, other: &BBox) -> f32 {
        self.x1.min(other.x1) - self.x0.max(other.x0)
    }

    /// Whether the horizontal ranges are disjoint.
    pub fn x_disjoint(&self, other: &BBox) -> bool {
        self.x_overlap(other) <= 0.0
    }

    /// Total order on (top, left, bottom, right).
    pub fn reading_cmp(&self, other: &BBox) -> Ordering {
        self.y0
            .total_cmp(&other.y0)
            .then(self.x0.total_cmp(&other.x0))
            .then(self.y1.total_cmp(&other.y1))
            .then(self.x1.total_cmp(&other.x1))
    }
}

/// A positioned run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Page index (0-based)
    pub page: usize,
    /// Extent on the page
    pub bbox: BBox,
    /// Normalised text, never empty
    pub text: String,
    /// Normalised font family
    pub font_family: Option<String>,
    /// Font size in points
    pub font_size: f32,
    /// Style flags
    pub style: StyleFlags,
}

/// A positioned raster image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFragment {
    /// Page index (0-based)
    pub page: usize,
    /// Extent on the page
    pub bbox: BBox,
    /// Encoded image bytes, never empty
    pub data: Arc<Vec<u8>>,
    /// Pixel width, if reported
    pub pixel_width: Option<u32>,
    /// Pixel height, if reported
    pub pixel_height: Option<u32>,
}

/// Smallest positioned unit of page content.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A run of text
    Text(TextFragment),
    /// An image
    Image(ImageFragment),
}

impl Fragment {
    pub fn bbox(&self) -> &BBox {
        match self {
            Fragment::Text(t) => &t.bbox,
            Fragment::Image(i) => &i.bbox,
        }
    }

    pub fn page(&self) -> usize {
        match self {
            Fragment::Text(t) => t.page,
            Fragment::Image(i) => i.page,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Fragment::Image(_))
    }

    /// Text content, or `None` for images.
    pub fn text(&self) -> Option<&str> {
        match self {
            Fragment::Text(t) => Some(&t.text),
            Fragment::Image(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextFragment> {
        match self {
            Fragment::Text(t) => Some(t),
            Fragment::Image(_) => None,
        }
    }

    /// Deterministic total order: geometry first, then size, text and kind.
    pub fn reading_cmp(&self, other: &Fragment) -> Ordering {
        self.bbox()
            .reading_cmp(other.bbox())
            .then_with(|| match (self, other) {
                (Fragment::Text(a), Fragment::Text(b)) => a
                    .font_size
                    .total_cmp(&b.font_size)
                    .then_with(|| a.text.cmp(&b.text))
                    .then_with(|| a.font_family.cmp(&b.font_family))
                    .then_with(|| style_key(a.style).cmp(&style_key(b.style))),
                (Fragment::Text(_), Fragment::Image(_)) => Ordering::Less,
                (Fragment::Image(_), Fragment::Text(_)) => Ordering::Greater,
                (Fragment::Image(a), Fragment::Image(b)) => a.data.cmp(&b.data),
            })
    }
}

fn style_key(flags: StyleFlags) -> (bool, bool, bool) {
    (flags.bold, flags.italic, flags.underline)
}

/// Sort fragments into the deterministic (top, left) order.
pub fn sort_fragments(fragments: &mut [Fragment]) {
    fragments.sort_by(|a, b| a.reading_cmp(b));
}

/// Result of ingesting one page.
#[derive(Debug, Clone)]
pub struct IngestedPage {
    /// Page index (0-based)
    pub index: usize,
    /// Page width in points, if reported
    pub width: Option<f32>,
    /// Page height in points, if reported
    pub height: Option<f32>,
    /// Valid fragments in deterministic order
    pub fragments: Vec<Fragment>,
    /// Number of raw items dropped as invalid
    pub dropped: usize,
}

/// Sequential page ingester carrying the document's running font-size median.
#[derive(Debug, Default)]
pub struct Ingestor {
    /// Explicit font sizes seen so far, sorted
    sizes: Vec<f32>,
}

impl Ingestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Median of the explicit font sizes seen so far.
    pub fn running_median(&self) -> f32 {
        let n = self.sizes.len();
        if n == 0 {
            return FALLBACK_FONT_SIZE;
        }
        if n % 2 == 1 {
            self.sizes[n / 2]
        } else {
            (self.sizes[n / 2 - 1] + self.sizes[n / 2]) / 2.0
        }
    }

    fn record_size(&mut self, size: f32) {
        let pos = self.sizes.partition_point(|s| s.total_cmp(&size) == Ordering::Less);
        self.sizes.insert(pos, size);
    }

    /// Normalise one page of provider output.
    ///
    /// A page whose items are all invalid has no usable geometry and is an
    /// ingestion error. A page with no items is simply empty.
    pub fn ingest(&mut self, page_index: usize, raw: &RawPage) -> Result<IngestedPage> {
        let mut dropped = 0usize;
        let mut valid: Vec<&RawItem> = Vec::with_capacity(raw.items.len());

        for item in &raw.items {
            match validate_item(item) {
                Ok(()) => valid.push(item),
                Err(reason) => {
                    warn!("Page {}: dropping raw item: {}", page_index + 1, reason);
                    dropped += 1;
                }
            }
        }

        if !raw.items.is_empty() && valid.is_empty() {
            return Err(Error::ingestion(
                page_index,
                format!("no usable geometry ({} items dropped)", dropped),
            ));
        }

        // Explicit sizes on this page count towards the median before any
        // missing size is filled, so the result does not depend on item order.
        for item in &valid {
            if let Some(size) = item.font_size.filter(|s| s.is_finite() && *s > 0.0) {
                self.record_size(size);
            }
        }
        let fallback_size = self.running_median();

        let mut fragments = Vec::with_capacity(valid.len());
        for item in valid {
            let [x0, y0, x1, y1] = item.bbox;
            let bbox = BBox::new(x0, y0, x1, y1);
            match item.kind {
                RawKind::Text => {
                    let text = normalize_text(item.text.as_deref().unwrap_or_default());
                    if text.is_empty() {
                        continue;
                    }
                    let (font_family, inferred) = match item.font_family.as_deref() {
                        Some(name) => {
                            let (family, flags) = normalize_font_name(name);
                            (Some(family), flags)
                        }
                        None => (None, StyleFlags::default()),
                    };
                    let font_size = item
                        .font_size
                        .filter(|s| s.is_finite() && *s > 0.0)
                        .unwrap_or(fallback_size);
                    fragments.push(Fragment::Text(TextFragment {
                        page: page_index,
                        bbox,
                        text,
                        font_family,
                        font_size,
                        style: item.style_flags.unwrap_or(inferred),
                    }));
                }
                RawKind::Image => {
                    let data = item.image_bytes.clone().unwrap_or_default();
                    fragments.push(Fragment::Image(ImageFragment {
                        page: page_index,
                        bbox,
                        data: Arc::new(data),
                        pixel_width: item.width,
                        pixel_height: item.height,
                    }));
                }
            }
        }

        sort_fragments(&mut fragments);
        debug!(
            "Page {}: ingested {} fragments ({} dropped)",
            page_index + 1,
            fragments.len(),
            dropped
        );

        Ok(IngestedPage {
            index: page_index,
            width: raw.width.filter(|w| w.is_finite() && *w > 0.0),
            height: raw.height.filter(|h| h.is_finite() && *h > 0.0),
            fragments,
            dropped,
        })
    }
}

fn validate_item(item: &RawItem) -> std::result::Result<(), &'static str> {
    if item.bbox.iter().any(|v| !v.is_finite()) {
        return Err("non-finite bounding box");
    }
    match item.kind {
        RawKind::Text if item.text.is_none() => Err("text item without text"),
        RawKind::Image if item.image_bytes.as_ref().map_or(true, |b| b.is_empty()) => {
            Err("image item without bytes")
        }
        _ => Ok(()),
    }
}

/// Normalise text: NFC, control and no-break spaces to plain spaces,
/// whitespace runs collapsed, ends trimmed.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.nfc() {
        if c.is_whitespace() || c.is_control() || c == '\u{00A0}' || c == '\u{FEFF}' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

static SUBSET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{6}\+").expect("invalid subset prefix regex"));

static STYLE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[-,]\s*(bold|black|heavy|semibold|demibold|medium|light|regular|roman|book|italic|oblique|it|mt|ps|psmt)+$",
    )
    .expect("invalid style suffix regex")
});

static VENDOR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(PSMT|MT|PS)$").expect("invalid vendor suffix regex"));

/// Strip subset prefixes and weight/slant suffixes from a font name.
///
/// Returns the family and the style flags implied by the name.
pub fn normalize_font_name(name: &str) -> (String, StyleFlags) {
    let lower = name.to_lowercase();
    let flags = StyleFlags {
        bold: lower.contains("bold") || lower.contains("black") || lower.contains("heavy"),
        italic: lower.contains("italic") || lower.contains("oblique"),
        underline: false,
    };

    let mut family = SUBSET_PREFIX.replace(name.trim(), "").into_owned();
    loop {
        let stripped = STYLE_SUFFIX.replace(&family, "");
        let stripped = VENDOR_SUFFIX.replace(&stripped, "").into_owned();
        if stripped == family || stripped.trim().is_empty() {
            break;
        }
        family = stripped;
    }
    let family = family.trim_end_matches(['-', ',', ' ']).to_string();

    (family, flags)
}
