//! Table grid reconstruction from aligned blocks.
//!
//! Works on whole blocks rather than graphical rules: blocks whose tops line
//! up form row bands, runs of such bands form a candidate region, and the
//! region's left edges are clustered into column bands. Each block anchors a
//! cell at (row band, column band) and may span further bands when its box
//! reaches across them uncontested.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::block::{Block, BlockKind};
use super::cluster::GapClustering;
use super::fragment::BBox;
use super::line::median_line_height;
use super::options::{LayoutOptions, TableConfig};
use super::Ambiguity;
use crate::model::{Table, TableCell};

/// An accepted table and the page blocks it was built from.
#[derive(Debug, Clone)]
pub struct TableRegion {
    /// Grid shape, spans and column widths; cell content is filled by the builder
    pub table: Table,
    /// Block indices per cell, parallel to `table.cells`, in reading order
    pub cell_blocks: Vec<Vec<usize>>,
    /// Every block index consumed by the table, ascending
    pub blocks: Vec<usize>,
    /// Union of the member boxes
    pub bbox: BBox,
}

/// Result of table detection on one page.
#[derive(Debug, Clone, Default)]
pub struct TableDetection {
    /// Accepted tables, top to bottom
    pub regions: Vec<TableRegion>,
    /// Rejected regions
    pub ambiguities: Vec<Ambiguity>,
}

/// A set of participant blocks sharing a top edge.
#[derive(Debug, Clone)]
struct RowBand {
    top: f32,
    bottom: f32,
    /// Block indices, left to right
    members: Vec<usize>,
}

#[derive(Debug)]
struct Anchor {
    block: usize,
    row: usize,
    col: usize,
    row_span: usize,
    col_span: usize,
}

/// Reconstruct tables on a page.
///
/// `blocks` must be classified. Table candidates that end up in no accepted
/// table are downgraded to paragraphs.
pub fn detect_tables(blocks: &mut [Block], options: &LayoutOptions) -> TableDetection {
    let config = &options.table;
    let mut detection = TableDetection::default();

    if blocks.iter().any(|b| b.kind.is_table_candidate()) {
        let line_height = median_line_height(blocks.iter().flat_map(|b| b.lines.iter()), 12.0);

        let mut participants: Vec<usize> = (0..blocks.len())
            .filter(|&i| is_participant(&blocks[i], config))
            .collect();
        participants.sort_by(|&a, &b| blocks[a].reading_cmp(&blocks[b]));

        // Step 1: Group participants into row bands by top edge
        let bands = row_bands(blocks, &participants, row_tolerance(blocks, config));
        debug!("TableDetector: {} row bands", bands.len());

        // Step 2: Find runs of consecutive tabular bands
        let regions = candidate_regions(blocks, &bands, config, line_height);
        debug!("TableDetector: {} candidate regions", regions.len());

        // Step 3: Build and validate a grid per region
        for region in regions {
            match build_region(blocks, &region, options, line_height) {
                Ok(table) => {
                    debug!(
                        "TableDetector: accepted {}x{} table at y={:.1}",
                        table.table.row_count, table.table.column_count, table.bbox.y0
                    );
                    detection.regions.push(table);
                }
                Err(ambiguity) => {
                    debug!("TableDetector: {}", ambiguity);
                    detection.ambiguities.push(ambiguity);
                }
            }
        }
    }

    let claimed: BTreeSet<usize> = detection
        .regions
        .iter()
        .flat_map(|r| r.blocks.iter().copied())
        .collect();
    for (i, block) in blocks.iter_mut().enumerate() {
        if block.kind.is_table_candidate() && !claimed.contains(&i) {
            block.kind = BlockKind::Paragraph;
        }
    }

    detection
}

/// Top-edge distance within which two blocks share a row.
pub fn row_tolerance(blocks: &[Block], config: &TableConfig) -> f32 {
    let line_height = median_line_height(blocks.iter().flat_map(|b| b.lines.iter()), 12.0);
    config.row_tolerance_factor * line_height
}

fn is_participant(block: &Block, config: &TableConfig) -> bool {
    matches!(block.kind, BlockKind::Paragraph | BlockKind::TableCandidate)
        && block.line_count() <= config.max_cell_lines
}

fn row_bands(blocks: &[Block], participants: &[usize], tolerance: f32) -> Vec<RowBand> {
    let mut bands: Vec<RowBand> = Vec::new();
    for &i in participants {
        let bbox = blocks[i].bbox;
        match bands.last_mut() {
            Some(band) if bbox.y0 - band.top <= tolerance => {
                band.bottom = band.bottom.max(bbox.y1);
                band.members.push(i);
            }
            _ => bands.push(RowBand {
                top: bbox.y0,
                bottom: bbox.y1,
                members: vec![i],
            }),
        }
    }
    for band in bands.iter_mut() {
        band.members.sort_by(|&a, &b| {
            blocks[a]
                .bbox
                .x0
                .total_cmp(&blocks[b].bbox.x0)
                .then(a.cmp(&b))
        });
    }
    bands
}

/// Whether boxes can sit side by side in one row.
fn pairwise_disjoint(mut boxes: Vec<BBox>) -> bool {
    boxes.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    boxes.windows(2).all(|w| w[0].x_disjoint(&w[1]))
}

fn candidate_regions(
    blocks: &[Block],
    bands: &[RowBand],
    config: &TableConfig,
    line_height: f32,
) -> Vec<Vec<RowBand>> {
    let max_gap = config.max_row_gap_factor * line_height;
    let mut regions = Vec::new();
    let mut current: Vec<RowBand> = Vec::new();
    // Bands in `current` that are tabular without help from earlier rows
    let mut tabular = 0usize;

    let tabular_alone =
        |band: &RowBand| band.members.len() >= 2 && pairwise_disjoint(member_boxes(blocks, band));

    for band in bands {
        let continues = match current.last() {
            Some(prev) => {
                band.top - prev.bottom <= max_gap
                    && !interrupted(blocks, &current, band)
                    && continues_region(blocks, &current, band, config.span_tolerance)
            }
            None => false,
        };

        if continues {
            if tabular_alone(band) {
                tabular += 1;
            }
            current.push(band.clone());
            continue;
        }

        let finished = std::mem::take(&mut current);
        if tabular >= config.min_rows {
            regions.push(finished);
        }
        tabular = 0;
        if tabular_alone(band) {
            tabular = 1;
            current.push(band.clone());
        }
    }
    if tabular >= config.min_rows {
        regions.push(current);
    }
    regions
}

fn member_boxes(blocks: &[Block], band: &RowBand) -> Vec<BBox> {
    band.members.iter().map(|&i| blocks[i].bbox).collect()
}

/// A band continues a region when its own blocks, together with region
/// blocks reaching down into it, are at least two side-by-side boxes.
///
/// Such spillover rows extend a region but never count toward `min_rows`.
fn continues_region(blocks: &[Block], region: &[RowBand], band: &RowBand, tolerance: f32) -> bool {
    let mut boxes = member_boxes(blocks, band);
    for prev in region {
        for &i in &prev.members {
            if blocks[i].bbox.y1 > band.top + tolerance {
                boxes.push(blocks[i].bbox);
            }
        }
    }
    boxes.len() >= 2 && pairwise_disjoint(boxes)
}

/// Whether a non-participant block sits between the region and the band.
fn interrupted(blocks: &[Block], region: &[RowBand], band: &RowBand) -> bool {
    let Some(prev) = region.last() else {
        return false;
    };
    let Some(extent) = region
        .iter()
        .flat_map(|b| b.members.iter())
        .map(|&i| blocks[i].bbox)
        .reduce(|a, b| a.union(&b))
    else {
        return false;
    };

    let members: BTreeSet<usize> = region
        .iter()
        .chain(std::iter::once(band))
        .flat_map(|b| b.members.iter().copied())
        .collect();
    blocks.iter().enumerate().any(|(i, block)| {
        !members.contains(&i)
            && block.bbox.y0 > prev.top
            && block.bbox.y0 < band.top
            && block.bbox.x_overlap(&extent) > 0.0
    })
}

fn build_region(
    blocks: &[Block],
    bands: &[RowBand],
    options: &LayoutOptions,
    line_height: f32,
) -> Result<TableRegion, Ambiguity> {
    let config = &options.table;
    let members: Vec<(usize, usize)> = bands
        .iter()
        .enumerate()
        .flat_map(|(row, band)| band.members.iter().map(move |&i| (row, i)))
        .collect();

    // Column bands from the left edges inside the region
    let lefts: Vec<f32> = members.iter().map(|&(_, i)| blocks[i].bbox.x0).collect();
    let clustering = GapClustering {
        min_gap: config.min_column_gap_factor * line_height,
        separation_ratio: options.column.separation_ratio,
        iteration_cap: options.cluster_iteration_cap,
    };
    let clusters = clustering.cluster(&lefts)?;

    let column_count = clusters.len();
    let row_count = bands.len();
    if column_count < config.min_columns || column_count > config.max_columns {
        return Err(Ambiguity::Table(format!(
            "{} column bands outside {}..={}",
            column_count, config.min_columns, config.max_columns
        )));
    }

    let mut column_of = vec![0usize; members.len()];
    for (col, cluster) in clusters.iter().enumerate() {
        for &m in &cluster.members {
            column_of[m] = col;
        }
    }
    let column_lefts: Vec<f32> = clusters.iter().map(|c| c.min).collect();
    let row_tops: Vec<f32> = bands.iter().map(|b| b.top).collect();
    let tolerance = config.span_tolerance;

    let mut anchors: Vec<Anchor> = members
        .iter()
        .enumerate()
        .map(|(pos, &(row, block))| {
            let bbox = blocks[block].bbox;
            let col = column_of[pos];
            let col_span = 1 + column_lefts[col + 1..]
                .iter()
                .take_while(|&&left| left < bbox.x1 - tolerance)
                .count();
            let row_span = 1 + row_tops[row + 1..]
                .iter()
                .take_while(|&&top| top < bbox.y1 - tolerance)
                .count();
            Anchor {
                block,
                row,
                col,
                row_span,
                col_span,
            }
        })
        .collect();

    // A span stops at the first band another block is anchored in.
    let anchored: BTreeSet<(usize, usize)> = anchors.iter().map(|a| (a.row, a.col)).collect();
    for anchor in anchors.iter_mut() {
        for col in anchor.col + 1..anchor.col + anchor.col_span {
            if (anchor.row..anchor.row + anchor.row_span).any(|r| anchored.contains(&(r, col))) {
                anchor.col_span = col - anchor.col;
                break;
            }
        }
        for row in anchor.row + 1..anchor.row + anchor.row_span {
            if (anchor.col..anchor.col + anchor.col_span).any(|c| anchored.contains(&(row, c))) {
                anchor.row_span = row - anchor.row;
                break;
            }
        }
    }

    // Blocks sharing an anchor share the cell.
    let mut cells: BTreeMap<(usize, usize), Anchor> = BTreeMap::new();
    let mut cell_members: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for anchor in anchors {
        let key = (anchor.row, anchor.col);
        cell_members.entry(key).or_default().push(anchor.block);
        match cells.get_mut(&key) {
            Some(existing) => {
                existing.row_span = existing.row_span.min(anchor.row_span);
                existing.col_span = existing.col_span.min(anchor.col_span);
            }
            None => {
                cells.insert(key, anchor);
            }
        }
    }

    for row in 0..row_count {
        let populated = cells
            .values()
            .any(|a| row >= a.row && row < a.row + a.row_span);
        if !populated {
            return Err(Ambiguity::Table(format!("row {} has no populated cells", row)));
        }
    }

    let mut table = Table::new(row_count, column_count);
    for anchor in cells.values() {
        table.add_cell(
            TableCell::new(anchor.row, anchor.col, Vec::new())
                .span(anchor.row_span, anchor.col_span),
        );
    }
    table.fill_empty();
    table
        .verify_tiling()
        .map_err(|err| Ambiguity::Table(err.to_string()))?;

    let mut bbox = blocks[members[0].1].bbox;
    for &(_, i) in &members[1..] {
        bbox = bbox.union(&blocks[i].bbox);
    }
    table.column_widths = column_lefts
        .iter()
        .enumerate()
        .map(|(col, &left)| {
            let right = column_lefts.get(col + 1).copied().unwrap_or(bbox.x1);
            (right - left).max(1.0)
        })
        .collect();

    let cell_blocks = table
        .cells
        .iter()
        .map(|cell| {
            let mut indices = cell_members
                .get(&(cell.row, cell.col))
                .cloned()
                .unwrap_or_default();
            indices.sort_by(|&a, &b| blocks[a].reading_cmp(&blocks[b]));
            indices
        })
        .collect();

    let mut region_blocks: Vec<usize> = members.iter().map(|&(_, i)| i).collect();
    region_blocks.sort_unstable();

    Ok(TableRegion {
        table,
        cell_blocks,
        blocks: region_blocks,
        bbox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fragment::{Fragment, TextFragment};
    use crate::layout::line::Line;
    use crate::layout::provider::StyleFlags;

    fn block(x0: f32, top: f32, x1: f32, bottom: f32, text: &str) -> Block {
        let bbox = BBox::new(x0, top, x1, bottom);
        let line = Line {
            fragments: vec![Fragment::Text(TextFragment {
                page: 0,
                bbox,
                text: text.to_string(),
                font_family: None,
                font_size: 10.0,
                style: StyleFlags::default(),
            })],
            space_before: vec![false],
            bbox,
            text: text.to_string(),
            font_size: 10.0,
        };
        let mut block = Block::from_lines(vec![line]).unwrap();
        block.kind = BlockKind::TableCandidate;
        block
    }

    fn cell(x0: f32, top: f32, x1: f32, text: &str) -> Block {
        block(x0, top, x1, top + 10.0, text)
    }

    #[test]
    fn test_two_by_two_grid() {
        let mut blocks = vec![
            cell(40.0, 100.0, 200.0, "a"),
            cell(340.0, 100.0, 500.0, "b"),
            cell(40.0, 120.0, 200.0, "c"),
            cell(340.0, 120.0, 500.0, "d"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());

        assert_eq!(detection.regions.len(), 1);
        let region = &detection.regions[0];
        assert_eq!(region.table.row_count, 2);
        assert_eq!(region.table.column_count, 2);
        assert_eq!(region.table.cells.len(), 4);
        assert!(region.table.cells.iter().all(|c| !c.is_merged()));
        assert!(region.table.verify_tiling().is_ok());
        assert_eq!(region.cell_blocks, vec![vec![0], vec![1], vec![2], vec![3]]);
        assert_eq!(region.table.column_widths, vec![300.0, 160.0]);
    }

    #[test]
    fn test_single_row_is_not_a_table() {
        let mut blocks = vec![
            cell(40.0, 100.0, 200.0, "left"),
            cell(340.0, 100.0, 500.0, "right"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());
        assert!(detection.regions.is_empty());
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn test_column_span() {
        let mut blocks = vec![
            cell(40.0, 100.0, 180.0, "A"),
            cell(200.0, 100.0, 340.0, "B"),
            cell(360.0, 100.0, 500.0, "C"),
            cell(40.0, 120.0, 180.0, "D"),
            cell(200.0, 120.0, 500.0, "E spans two"),
            cell(40.0, 140.0, 180.0, "F"),
            cell(200.0, 140.0, 340.0, "G"),
            cell(360.0, 140.0, 500.0, "H"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());
        let table = &detection.regions[0].table;

        assert_eq!((table.row_count, table.column_count), (3, 3));
        assert_eq!(table.cells.len(), 8);
        let merged = table.cell_anchored_at(1, 1).unwrap();
        assert_eq!((merged.row_span, merged.col_span), (1, 2));
        assert!(table.verify_tiling().is_ok());
    }

    #[test]
    fn test_row_span() {
        let mut blocks = vec![
            block(40.0, 100.0, 200.0, 140.0, "tall"),
            cell(340.0, 100.0, 500.0, "first"),
            cell(340.0, 125.0, 500.0, "second"),
            cell(40.0, 150.0, 200.0, "left"),
            cell(340.0, 150.0, 500.0, "right"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());
        let table = &detection.regions[0].table;

        assert_eq!((table.row_count, table.column_count), (3, 2));
        let tall = table.cell_anchored_at(0, 0).unwrap();
        assert_eq!(tall.row_span, 2);
        assert_eq!(table.cells.len(), 5);
        assert!(table.verify_tiling().is_ok());
    }

    #[test]
    fn test_spillover_rows_alone_do_not_make_a_table() {
        // Two paragraphs per column: the right one runs past the left one's start
        let mut blocks = vec![
            block(72.0, 100.0, 290.0, 134.0, "left one"),
            block(320.0, 100.0, 540.0, 170.0, "right one"),
            block(72.0, 150.0, 290.0, 184.0, "left two"),
            block(320.0, 190.0, 540.0, 224.0, "right two"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());

        assert!(detection.regions.is_empty());
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn test_too_many_columns_is_rejected() {
        let mut blocks = vec![
            cell(40.0, 100.0, 180.0, "A"),
            cell(200.0, 100.0, 340.0, "B"),
            cell(360.0, 100.0, 500.0, "C"),
            cell(40.0, 120.0, 180.0, "D"),
            cell(200.0, 120.0, 340.0, "E"),
            cell(360.0, 120.0, 500.0, "F"),
        ];
        let mut options = LayoutOptions::default();
        options.table.max_columns = 2;
        let detection = detect_tables(&mut blocks, &options);

        assert!(detection.regions.is_empty());
        assert!(matches!(detection.ambiguities[0], Ambiguity::Table(_)));
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn test_heading_between_rows_splits_regions() {
        let mut heading = cell(40.0, 140.0, 500.0, "Heading");
        heading.kind = BlockKind::Heading { level: 2 };
        let mut blocks = vec![
            cell(40.0, 100.0, 200.0, "a"),
            cell(340.0, 100.0, 500.0, "b"),
            cell(40.0, 120.0, 200.0, "c"),
            cell(340.0, 120.0, 500.0, "d"),
            heading,
            cell(40.0, 160.0, 200.0, "e"),
            cell(340.0, 160.0, 500.0, "f"),
            cell(40.0, 180.0, 200.0, "g"),
            cell(340.0, 180.0, 500.0, "h"),
        ];
        let detection = detect_tables(&mut blocks, &LayoutOptions::default());
        assert_eq!(detection.regions.len(), 2);
        assert_eq!(detection.regions[1].blocks, vec![5, 6, 7, 8]);
        assert_eq!(blocks[4].kind, BlockKind::Heading { level: 2 });
    }
}
