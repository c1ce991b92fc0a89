//! Style palette: the mapping from detected font-size clusters to named output styles.

use serde::{Deserialize, Serialize};

/// Style id of body paragraphs.
pub const BODY_STYLE_ID: &str = "Normal";

/// Style id of list paragraphs.
pub const LIST_STYLE_ID: &str = "ListParagraph";

/// Style id of reconstructed tables.
pub const TABLE_STYLE_ID: &str = "TableGrid";

/// Histogram keys have 0.1pt resolution.
const SIZE_EPSILON: f32 = 0.05;

/// Style id for a heading level.
pub fn heading_style_id(level: u8) -> String {
    format!("Heading{}", level)
}

/// A contiguous band of font sizes observed in the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBand {
    /// Smallest size in the band (points)
    pub min: f32,
    /// Largest size in the band (points)
    pub max: f32,
    /// Representative size: the most frequent size inside the band
    pub size: f32,
    /// Number of fragments whose size falls in the band
    pub fragment_count: usize,
}

impl SizeBand {
    /// Single-size band.
    pub fn single(size: f32, fragment_count: usize) -> Self {
        Self {
            min: size,
            max: size,
            size,
            fragment_count,
        }
    }

    /// Check whether a size belongs to this band, with a tolerance on both edges.
    pub fn contains(&self, size: f32, tolerance: f32) -> bool {
        size >= self.min - tolerance && size <= self.max + tolerance
    }
}

/// Per-document mapping from size/weight clusters to named styles.
///
/// Built once before any page is classified and shared read-only afterwards.
/// `headings[0]` is level 1; sizes strictly descend with the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePalette {
    /// Body text band (highest fragment-count mass)
    pub body: SizeBand,

    /// Heading bands, largest first
    pub headings: Vec<SizeBand>,

    /// Most frequent font family among body fragments
    pub body_font: Option<String>,

    /// Upper bound on heading levels
    pub max_heading_levels: u8,
}

impl StylePalette {
    /// Body font size in points.
    pub fn body_size(&self) -> f32 {
        self.body.size
    }

    /// Number of heading levels the palette distinguishes by size.
    pub fn size_heading_levels(&self) -> u8 {
        self.headings.len().min(self.max_heading_levels as usize) as u8
    }

    /// Heading level implied by a font size alone, if it falls in a band above body.
    pub fn heading_level_for_size(&self, size: f32) -> Option<u8> {
        if size <= self.body.max + SIZE_EPSILON {
            return None;
        }
        for (i, band) in self.headings.iter().enumerate() {
            if band.contains(size, SIZE_EPSILON) || size > band.max {
                return Some(((i + 1) as u8).min(self.max_heading_levels));
            }
        }
        None
    }

    /// Heading level for text that is emphasised by weight only (body-sized bold).
    pub fn weight_heading_level(&self) -> u8 {
        (self.size_heading_levels() + 1).min(self.max_heading_levels.max(1))
    }

    /// Number of distinct heading styles the styles part must declare.
    pub fn heading_style_count(&self) -> u8 {
        self.weight_heading_level()
    }

    /// Font size used for a heading level's named style.
    pub fn heading_size(&self, level: u8) -> f32 {
        let index = level.saturating_sub(1) as usize;
        match self.headings.get(index) {
            Some(band) => band.size,
            None => self.body.size,
        }
    }

    /// Check whether a size is at least body size.
    pub fn at_least_body(&self, size: f32) -> bool {
        size >= self.body.min - SIZE_EPSILON
    }
}

impl Default for StylePalette {
    fn default() -> Self {
        Self {
            body: SizeBand::single(12.0, 0),
            headings: Vec::new(),
            body_font: None,
            max_heading_levels: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> StylePalette {
        StylePalette {
            body: SizeBand::single(11.0, 400),
            headings: vec![SizeBand::single(24.0, 3), SizeBand::single(16.0, 12)],
            ..Default::default()
        }
    }

    #[test]
    fn test_heading_levels_by_size() {
        let p = palette();
        assert_eq!(p.heading_level_for_size(24.0), Some(1));
        assert_eq!(p.heading_level_for_size(16.0), Some(2));
        assert_eq!(p.heading_level_for_size(11.0), None);
        assert_eq!(p.heading_level_for_size(11.4), None);
        assert_eq!(p.heading_level_for_size(30.0), Some(1));
        assert!(p.at_least_body(11.0));
        assert!(!p.at_least_body(9.0));
    }

    #[test]
    fn test_weight_heading_sits_below_size_headings() {
        let p = palette();
        assert_eq!(p.weight_heading_level(), 3);
        assert_eq!(p.heading_style_count(), 3);
        assert_eq!(p.heading_size(1), 24.0);
        assert_eq!(p.heading_size(3), 11.0);
    }

    #[test]
    fn test_weight_heading_level_is_capped() {
        let mut p = palette();
        p.max_heading_levels = 2;
        assert_eq!(p.weight_heading_level(), 2);
    }

    #[test]
    fn test_style_ids() {
        assert_eq!(heading_style_id(2), "Heading2");
        assert_eq!(BODY_STYLE_ID, "Normal");
    }
}
