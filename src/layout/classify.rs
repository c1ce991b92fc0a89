//! Structural classification of blocks.
//!
//! Each block is labelled, in this order of precedence: list item, heading,
//! table candidate, paragraph. List detection runs first so that a bold
//! numbered item is never promoted to a heading.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::block::{Block, BlockKind};
use super::options::ClassifierConfig;
use super::Ambiguity;
use crate::model::{ListInfo, NumberStyle, StylePalette};

static BULLET_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([•●○◦▪■□‣⁃∙·▸►◆◇➤✓\-\*–])\s+\S").expect("invalid bullet marker regex")
});

static ORDERED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\()?(\d{1,3}|[A-Za-z])([.)])\s+\S").expect("invalid ordered marker regex")
});

/// A leading list marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMarker {
    /// A bullet glyph
    Bullet(char),
    /// A numbering token such as `3.`, `b)` or `(iv`-style `(c)`
    Ordered {
        /// Numeric value (letters count from 1)
        number: u32,
        /// Digits or letters
        style: NumberStyle,
        /// Closing delimiter, `.` or `)`
        delimiter: char,
        /// Whether the token opens with `(`
        parenthesized: bool,
    },
}

impl ListMarker {
    fn same_family(&self, other: &ListMarker) -> bool {
        match (self, other) {
            (
                ListMarker::Ordered {
                    style: s1,
                    delimiter: d1,
                    parenthesized: p1,
                    ..
                },
                ListMarker::Ordered {
                    style: s2,
                    delimiter: d2,
                    parenthesized: p2,
                    ..
                },
            ) => s1 == s2 && d1 == d2 && p1 == p2,
            _ => false,
        }
    }

    fn number(&self) -> Option<u32> {
        match self {
            ListMarker::Ordered { number, .. } => Some(*number),
            ListMarker::Bullet(_) => None,
        }
    }
}

/// Parse a leading list marker from a line of text.
pub fn parse_list_marker(text: &str) -> Option<ListMarker> {
    if let Some(caps) = BULLET_MARKER.captures(text) {
        let glyph = caps.get(1)?.as_str().chars().next()?;
        return Some(ListMarker::Bullet(glyph));
    }

    let caps = ORDERED_MARKER.captures(text)?;
    let parenthesized = caps.get(1).is_some();
    let token = caps.get(2)?.as_str();
    let delimiter = caps.get(3)?.as_str().chars().next()?;
    if parenthesized && delimiter != ')' {
        return None;
    }

    let (number, style) = if let Ok(n) = token.parse::<u32>() {
        (n, NumberStyle::Decimal)
    } else {
        let c = token.chars().next()?;
        let style = if c.is_ascii_lowercase() {
            NumberStyle::LowerAlpha
        } else {
            NumberStyle::UpperAlpha
        };
        (c.to_ascii_lowercase() as u32 - 'a' as u32 + 1, style)
    };

    Some(ListMarker::Ordered {
        number,
        style,
        delimiter,
        parenthesized,
    })
}

/// Label every block of a page.
///
/// `blocks` must be in reading order. Labels depend only on geometry, text
/// and the palette, so classifying an already classified page yields the
/// same labels. `row_tolerance` is the top-y distance within which two
/// blocks count as sharing a row.
pub fn classify_blocks(
    blocks: &mut [Block],
    palette: &StylePalette,
    config: &ClassifierConfig,
    row_tolerance: f32,
) -> Vec<Ambiguity> {
    let mut ambiguities = Vec::new();

    for block in blocks.iter_mut() {
        if !block.is_image() {
            block.kind = BlockKind::Paragraph;
        }
    }

    let markers: Vec<Option<ListMarker>> = blocks
        .iter()
        .map(|b| {
            if b.is_image() {
                None
            } else {
                parse_list_marker(b.first_line_text())
            }
        })
        .collect();
    let column_lefts = column_lefts(blocks);

    for i in 0..blocks.len() {
        if blocks[i].is_image() {
            continue;
        }

        if let Some(marker) = &markers[i] {
            let level = list_level(&blocks[i], &column_lefts, config.list_indent_step);
            match marker {
                ListMarker::Bullet(glyph) => {
                    blocks[i].kind = BlockKind::ListItem(ListInfo::bullet(level, *glyph));
                    continue;
                }
                ListMarker::Ordered { number, style, .. } => {
                    if has_numbered_sibling(&markers, i) {
                        blocks[i].kind =
                            BlockKind::ListItem(ListInfo::numbered(level, *number, *style));
                        continue;
                    }
                    debug!(
                        "Ordered marker without sibling: {:?}",
                        blocks[i].first_line_text()
                    );
                    ambiguities.push(Ambiguity::ListNumbering);
                }
            }
        }

        let aligned = is_row_aligned(blocks, i, row_tolerance);
        let block = &blocks[i];

        if block.line_count() <= config.heading_max_lines {
            if let Some(level) = palette.heading_level_for_size(block.font_size) {
                blocks[i].kind = BlockKind::Heading { level };
                continue;
            }
            if block.bold && palette.at_least_body(block.font_size) && !aligned {
                blocks[i].kind = BlockKind::Heading {
                    level: palette.weight_heading_level(),
                };
                continue;
            }
        }

        if aligned {
            blocks[i].kind = BlockKind::TableCandidate;
        }
    }

    ambiguities
}

/// Whether another text block shares this block's row without overlapping it.
fn is_row_aligned(blocks: &[Block], i: usize, row_tolerance: f32) -> bool {
    let block = &blocks[i];
    blocks.iter().enumerate().any(|(j, other)| {
        j != i
            && !other.is_image()
            && (other.bbox.y0 - block.bbox.y0).abs() <= row_tolerance
            && other.bbox.x_disjoint(&block.bbox)
    })
}

/// Left edge of each column, indexed by column id.
fn column_lefts(blocks: &[Block]) -> Vec<f32> {
    let columns = blocks.iter().map(|b| b.column + 1).max().unwrap_or(0);
    let mut lefts = vec![f32::INFINITY; columns];
    for block in blocks.iter().filter(|b| !b.full_width) {
        lefts[block.column] = lefts[block.column].min(block.bbox.x0);
    }
    let page_left = blocks
        .iter()
        .map(|b| b.bbox.x0)
        .fold(f32::INFINITY, f32::min);
    for left in lefts.iter_mut() {
        if !left.is_finite() {
            *left = page_left;
        }
    }
    lefts
}

fn list_level(block: &Block, column_lefts: &[f32], step: f32) -> u8 {
    let left = if block.full_width {
        column_lefts.iter().copied().fold(f32::INFINITY, f32::min)
    } else {
        column_lefts
            .get(block.column)
            .copied()
            .unwrap_or(block.bbox.x0)
    };
    let indent = (block.bbox.x0 - left).max(0.0);
    ((indent / step).round() as u8).min(8)
}

/// Whether the nearest same-style marker before (after) this one in the
/// surrounding run of marked blocks is numbered one less (more).
fn has_numbered_sibling(markers: &[Option<ListMarker>], i: usize) -> bool {
    let Some(marker) = &markers[i] else {
        return false;
    };
    let Some(number) = marker.number() else {
        return true;
    };

    let previous = markers[..i]
        .iter()
        .rev()
        .map_while(|m| m.as_ref())
        .find(|m| m.same_family(marker));
    if previous.and_then(ListMarker::number) == Some(number.wrapping_sub(1)) {
        return true;
    }

    let next = markers[i + 1..]
        .iter()
        .map_while(|m| m.as_ref())
        .find(|m| m.same_family(marker));
    next.and_then(ListMarker::number) == Some(number + 1)
}
