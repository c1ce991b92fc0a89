//! Document model construction for one page.
//!
//! Walks the page's blocks in reading order and emits model blocks. A table
//! is emitted once, at the position of its first block in reading order;
//! images become inline image blocks backed by a content-addressed resource.

use std::collections::BTreeMap;

use super::block::{joins_with_space, Block, BlockKind};
use super::fragment::{Fragment, TextFragment};
use super::table_detector::TableRegion;
use crate::model::{self, Paragraph, ParagraphStyle, Resource, StylePalette, TextRun, TextStyle};

/// Size difference below which a run inherits its paragraph style's size.
const SIZE_EPSILON: f32 = 0.05;

/// Model content of one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Blocks in reading order
    pub blocks: Vec<model::Block>,
    /// Images referenced by the blocks, keyed by the id the blocks use
    pub resources: Vec<(String, Resource)>,
}

/// Build a page's model content from classified, ordered blocks.
pub fn build_page(blocks: &[Block], tables: &[TableRegion], palette: &StylePalette) -> PageContent {
    let mut content = PageContent::default();

    let mut table_of: BTreeMap<usize, usize> = BTreeMap::new();
    for (t, region) in tables.iter().enumerate() {
        for &b in &region.blocks {
            table_of.insert(b, t);
        }
    }
    let mut emitted = vec![false; tables.len()];

    for (index, block) in blocks.iter().enumerate() {
        if let Some(&t) = table_of.get(&index) {
            if !emitted[t] {
                emitted[t] = true;
                content
                    .blocks
                    .push(model::Block::Table(build_table(blocks, &tables[t], palette)));
            }
            continue;
        }

        if let Some(image) = block.image() {
            let mut resource = Resource::from_image_bytes(image.data.to_vec());
            if let (Some(w), Some(h)) = (image.pixel_width, image.pixel_height) {
                resource = resource.with_dimensions(w, h);
            }
            let id = resource.content_hash();
            content.blocks.push(model::Block::image(
                id.clone(),
                image.bbox.width(),
                image.bbox.height(),
            ));
            if !content.resources.iter().any(|(existing, _)| *existing == id) {
                content.resources.push((id, resource));
            }
            continue;
        }

        content
            .blocks
            .push(model::Block::Paragraph(build_paragraph(block, palette)));
    }

    content
}

/// Convert one text block into a styled paragraph.
pub fn build_paragraph(block: &Block, palette: &StylePalette) -> Paragraph {
    let style = match &block.kind {
        BlockKind::Heading { level } => ParagraphStyle::heading(*level),
        BlockKind::ListItem(info) => ParagraphStyle::list(info.clone()),
        _ => ParagraphStyle::body(),
    };
    let style_size = match style.heading_level {
        Some(level) => palette.heading_size(level),
        None => palette.body_size(),
    };

    let mut paragraph = Paragraph {
        content: Vec::new(),
        style,
    };

    for (l, line) in block.lines.iter().enumerate() {
        let line_space = l > 0 && joins_with_space(&block.lines[l - 1], line);
        for (f, fragment) in line.fragments.iter().enumerate() {
            let Fragment::Text(text) = fragment else {
                continue;
            };
            let space = if f == 0 {
                line_space
            } else {
                line.space_before.get(f).copied().unwrap_or(false)
            };
            let run_text = if space {
                format!(" {}", text.text)
            } else {
                text.text.clone()
            };
            paragraph.add_run(TextRun::styled(run_text, run_style(text, style_size, palette)));
        }
    }

    paragraph
}

fn run_style(fragment: &TextFragment, style_size: f32, palette: &StylePalette) -> TextStyle {
    let font_size =
        ((fragment.font_size - style_size).abs() > SIZE_EPSILON).then_some(fragment.font_size);
    let font_name = fragment
        .font_family
        .as_ref()
        .filter(|family| palette.body_font.as_ref() != Some(*family))
        .cloned();
    TextStyle {
        bold: fragment.style.bold,
        italic: fragment.style.italic,
        underline: fragment.style.underline,
        font_name,
        font_size,
    }
}

fn build_table(blocks: &[Block], region: &TableRegion, palette: &StylePalette) -> model::Table {
    let mut table = region.table.clone();
    for (cell, members) in table.cells.iter_mut().zip(&region.cell_blocks) {
        cell.content = members
            .iter()
            .map(|&b| {
                let mut paragraph = build_paragraph(&blocks[b], palette);
                // Cell text keeps run formatting but not heading or list styles.
                paragraph.style = ParagraphStyle::body();
                paragraph
            })
            .collect();
    }
    table
}
