//! Block segmentation: lines separated by small vertical gaps become blocks.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::debug;

use super::classify::parse_list_marker;
use super::fragment::{BBox, ImageFragment};
use super::line::{dominant_size, is_spaceless_script_char, median_line_height, Line};
use super::options::BlockConfig;
use crate::model::ListInfo;

/// Structural label of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Body text
    Paragraph,
    /// Heading of the given level (1 = largest)
    Heading {
        /// Heading level
        level: u8,
    },
    /// List item; the marker stays in the text
    ListItem(ListInfo),
    /// Possibly part of a table; resolved by table reconstruction
    TableCandidate,
    /// An image
    Image,
}

impl BlockKind {
    /// Whether this is an unconfirmed table candidate.
    pub fn is_table_candidate(&self) -> bool {
        matches!(self, BlockKind::TableCandidate)
    }
}

/// A structural unit of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Structural label
    pub kind: BlockKind,
    /// Source lines, top to bottom
    pub lines: Vec<Line>,
    /// Union of line boxes
    pub bbox: BBox,
    /// Column index on the page
    pub column: usize,
    /// Whether the block spans several columns
    pub full_width: bool,
    /// Position in the page's reading order
    pub order: usize,
    /// Plurality font size of the block's fragments
    pub font_size: f32,
    /// Whether more than half of the characters are bold
    pub bold: bool,
}

impl Block {
    /// Build a paragraph block from lines; `None` when there are no lines.
    pub fn from_lines(lines: Vec<Line>) -> Option<Self> {
        let first = lines.first()?;
        let mut block = Self {
            kind: if first.is_image() {
                BlockKind::Image
            } else {
                BlockKind::Paragraph
            },
            bbox: first.bbox,
            lines,
            column: 0,
            full_width: false,
            order: 0,
            font_size: 0.0,
            bold: false,
        };
        block.refresh();
        Some(block)
    }

    fn push_line(&mut self, line: Line) {
        self.lines.push(line);
        self.refresh();
    }

    fn refresh(&mut self) {
        let mut bbox = self.lines[0].bbox;
        for line in &self.lines[1..] {
            bbox = bbox.union(&line.bbox);
        }
        self.bbox = bbox;
        self.font_size = dominant_size(
            self.lines
                .iter()
                .flat_map(|l| l.text_fragments())
                .map(|f| f.font_size),
        )
        .unwrap_or(self.bbox.height());

        let (bold, total) = self
            .lines
            .iter()
            .flat_map(|l| l.text_fragments())
            .fold((0usize, 0usize), |(b, t), f| {
                let n = f.text.chars().count();
                (if f.style.bold { b + n } else { b }, t + n)
            });
        self.bold = total > 0 && bold * 2 > total;
    }

    /// Whether this block is an image.
    pub fn is_image(&self) -> bool {
        matches!(self.kind, BlockKind::Image)
    }

    /// The image fragment of an image block.
    pub fn image(&self) -> Option<&ImageFragment> {
        self.lines
            .first()
            .and_then(|l| l.fragments.first())
            .and_then(|f| match f {
                super::fragment::Fragment::Image(image) => Some(image),
                super::fragment::Fragment::Text(_) => None,
            })
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of the first line.
    pub fn first_line_text(&self) -> &str {
        self.lines.first().map(|l| l.text.as_str()).unwrap_or_default()
    }

    /// Full text with lines joined.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 && joins_with_space(&self.lines[i - 1], line) {
                text.push(' ');
            }
            text.push_str(&line.text);
        }
        text
    }

    /// Most common font family by character count.
    pub fn font_family(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for fragment in self.lines.iter().flat_map(|l| l.text_fragments()) {
            if let Some(family) = fragment.font_family.as_deref() {
                *counts.entry(family).or_insert(0) += fragment.text.chars().count();
            }
        }
        counts
            .into_iter()
            .max_by(|(fa, ca), (fb, cb)| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(family, _)| family)
    }

    /// Deterministic total order: geometry, then text.
    pub fn reading_cmp(&self, other: &Block) -> Ordering {
        self.bbox
            .reading_cmp(&other.bbox)
            .then_with(|| self.first_line_text().cmp(other.first_line_text()))
            .then_with(|| self.lines.len().cmp(&other.lines.len()))
    }
}

/// Whether consecutive lines of one block are joined with a space.
pub(crate) fn joins_with_space(prev: &Line, next: &Line) -> bool {
    let prev_last = prev.text.chars().last();
    let next_first = next.text.chars().next();
    match (prev_last, next_first) {
        (Some(a), Some(b)) => !(is_spaceless_script_char(a) && is_spaceless_script_char(b)),
        _ => false,
    }
}

/// Group one page's lines into blocks.
///
/// A line joins an open block when their horizontal ranges overlap and the
/// vertical gap is at most `max(gap_floor, gap_factor × median line height)`.
/// Font-size jumps, weight flips and leading list markers always start a new
/// block. Image lines are blocks of their own.
pub fn segment_blocks(lines: Vec<Line>, config: &BlockConfig) -> Vec<Block> {
    let median = median_line_height(lines.iter(), 12.0);
    let max_gap = config.gap_floor.max(config.gap_factor * median);

    let mut blocks: Vec<Block> = Vec::new();

    for line in lines {
        if line.is_image() {
            blocks.extend(Block::from_lines(vec![line]));
            continue;
        }

        let min_gap = -0.5 * line.height();
        let mut best: Option<(usize, f32, f32)> = None;
        for (idx, block) in blocks.iter().enumerate() {
            if block.is_image() {
                continue;
            }
            let overlap = block.bbox.x_overlap(&line.bbox);
            if overlap <= 0.0 {
                continue;
            }
            let gap = line.bbox.y0 - block.bbox.y1;
            if gap < min_gap || gap > max_gap {
                continue;
            }
            let Some(last) = block.lines.last() else {
                continue;
            };
            if breaks_between(last, &line, config) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_overlap, best_gap)) => {
                    overlap > best_overlap || (overlap == best_overlap && gap < best_gap)
                }
            };
            if better {
                best = Some((idx, overlap, gap));
            }
        }

        match best {
            Some((idx, _, _)) => blocks[idx].push_line(line),
            None => blocks.extend(Block::from_lines(vec![line])),
        }
    }

    blocks.sort_by(|a, b| a.reading_cmp(b));
    debug!(
        "Segmented {} blocks (median line height {:.1}, max gap {:.1})",
        blocks.len(),
        median,
        max_gap
    );
    blocks
}

fn breaks_between(prev: &Line, curr: &Line, config: &BlockConfig) -> bool {
    let smaller = prev.font_size.min(curr.font_size);
    if smaller > 0.0 && (prev.font_size - curr.font_size).abs() / smaller > config.size_break_ratio
    {
        return true;
    }
    if config.split_on_weight_change && prev.is_bold() != curr.is_bold() {
        return true;
    }
    if config.split_on_list_marker && parse_list_marker(&curr.text).is_some() {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fragment::{Fragment, TextFragment};
    use crate::layout::line::assemble_lines;
    use crate::layout::options::LineConfig;
    use crate::layout::provider::StyleFlags;

    fn line(x0: f32, top: f32, x1: f32, height: f32, text: &str, bold: bool) -> Fragment {
        Fragment::Text(TextFragment {
            page: 0,
            bbox: BBox::new(x0, top, x1, top + height),
            text: text.to_string(),
            font_family: Some("Helvetica".into()),
            font_size: height,
            style: StyleFlags {
                bold,
                ..Default::default()
            },
        })
    }

    fn blocks(fragments: Vec<Fragment>) -> Vec<Block> {
        let lines = assemble_lines(&fragments, &LineConfig::default());
        segment_blocks(lines, &BlockConfig::default())
    }

    #[test]
    fn test_close_lines_form_one_block() {
        // 10pt lines with 2pt leading gaps, then a line after a wide gap.
        let result = blocks(vec![
            line(72.0, 10.0, 400.0, 10.0, "one", false),
            line(72.0, 22.0, 400.0, 10.0, "two", false),
            line(72.0, 34.0, 400.0, 10.0, "three", false),
            line(72.0, 84.0, 400.0, 10.0, "four", false),
        ]);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text(), "one two three");
        assert_eq!(result[0].line_count(), 3);
        assert_eq!(result[1].text(), "four");
    }

    #[test]
    fn test_size_change_breaks_block() {
        let result = blocks(vec![
            line(72.0, 10.0, 300.0, 18.0, "Title", false),
            line(72.0, 30.0, 400.0, 10.0, "body", false),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].font_size, 18.0);
    }

    #[test]
    fn test_weight_change_breaks_block() {
        let result = blocks(vec![
            line(72.0, 10.0, 300.0, 10.0, "Bold lead", true),
            line(72.0, 22.0, 400.0, 10.0, "regular text", false),
        ]);
        assert_eq!(result.len(), 2);
        assert!(result[0].bold);
        assert!(!result[1].bold);
    }

    #[test]
    fn test_list_marker_breaks_block() {
        let result = blocks(vec![
            line(72.0, 10.0, 300.0, 10.0, "• first item", false),
            line(72.0, 22.0, 300.0, 10.0, "• second item", false),
        ]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_columns_do_not_merge() {
        let result = blocks(vec![
            line(40.0, 10.0, 250.0, 10.0, "left a", false),
            line(340.0, 10.0, 550.0, 10.0, "right a", false),
            line(40.0, 22.0, 250.0, 10.0, "left b", false),
            line(340.0, 22.0, 550.0, 10.0, "right b", false),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text(), "left a left b");
        assert_eq!(result[1].text(), "right a right b");
    }

    #[test]
    fn test_dominant_size_is_plurality() {
        let result = blocks(vec![
            line(72.0, 10.0, 100.0, 10.0, "a", false),
            line(105.0, 10.0, 130.0, 10.0, "b", false),
            line(135.0, 9.0, 160.0, 11.0, "C", false),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].font_size, 10.0);
    }
}
