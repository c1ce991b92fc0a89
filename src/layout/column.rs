//! Column resolution and reading order.
//!
//! Left edges of a page's blocks are clustered into column bands. A block
//! whose right edge reaches into the next band spans columns and is taken
//! out as full-width before the bands are recomputed. Reading order then
//! walks horizontal strips separated by full-width blocks, column by column
//! inside each strip.

use log::debug;

use super::block::Block;
use super::cluster::GapClustering;
use super::line::median_line_height;
use super::options::ColumnConfig;
use super::Ambiguity;

/// A vertical band of the page holding one column of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Smallest left edge of the member blocks
    pub left: f32,
    /// Median right edge of the member blocks
    pub right: f32,
    /// Column index, left to right
    pub index: usize,
    members: Vec<usize>,
}

/// Blocks of one page in reading order.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    /// Blocks sorted by reading order, with `column`, `full_width` and `order` set
    pub blocks: Vec<Block>,
    /// Detected columns, left to right (at least one unless the page is empty)
    pub columns: Vec<Column>,
    /// Set when the page fell back to a single column
    pub ambiguity: Option<Ambiguity>,
}

impl ColumnLayout {
    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Assign columns and reading order to a page's blocks.
pub fn resolve_columns(
    mut blocks: Vec<Block>,
    config: &ColumnConfig,
    iteration_cap: usize,
) -> ColumnLayout {
    if blocks.is_empty() {
        return ColumnLayout {
            blocks,
            columns: Vec::new(),
            ambiguity: None,
        };
    }

    let line_height = median_line_height(blocks.iter().flat_map(|b| b.lines.iter()), 12.0);
    let clustering = GapClustering {
        min_gap: config.min_gap_factor * line_height,
        separation_ratio: config.separation_ratio,
        iteration_cap,
    };

    for block in blocks.iter_mut() {
        block.column = 0;
        block.full_width = false;
    }

    let mut active: Vec<usize> = (0..blocks.len()).collect();
    let mut passes = 0;
    let columns = loop {
        let columns = match column_bands(&blocks, &active, &clustering) {
            Ok(columns) => columns,
            Err(ambiguity) => return single_column(blocks, Some(ambiguity)),
        };
        if columns.len() <= 1 {
            break columns;
        }

        let wide: Vec<usize> = columns
            .iter()
            .flat_map(|c| c.members.iter().map(move |&i| (i, c.index)))
            .filter(|&(i, index)| {
                columns
                    .get(index + 1)
                    .is_some_and(|next| blocks[i].bbox.x1 > next.left)
            })
            .map(|(i, _)| i)
            .collect();
        if wide.is_empty() {
            break columns;
        }
        if passes >= config.max_passes {
            let reason = format!(
                "blocks still span columns after {} passes",
                config.max_passes
            );
            return single_column(blocks, Some(Ambiguity::Columns(reason)));
        }

        for &i in &wide {
            blocks[i].full_width = true;
        }
        active.retain(|i| !wide.contains(i));
        passes += 1;
    };

    if columns.len() <= 1 {
        return single_column(blocks, None);
    }

    for column in &columns {
        for &i in &column.members {
            blocks[i].column = column.index;
        }
    }

    debug!(
        "Resolved {} columns at {:?} ({} full-width blocks)",
        columns.len(),
        columns.iter().map(|c| c.left).collect::<Vec<_>>(),
        blocks.iter().filter(|b| b.full_width).count()
    );

    let mut full_width_tops: Vec<f32> = blocks
        .iter()
        .filter(|b| b.full_width)
        .map(|b| b.bbox.y0)
        .collect();
    full_width_tops.sort_by(|a, b| a.total_cmp(b));

    // Strip k holds the column blocks below the k-th full-width block; the
    // full-width block itself opens its strip.
    let strip_of =
        |block: &Block| full_width_tops.partition_point(|&top| top <= block.bbox.y0);

    blocks.sort_by(|a, b| {
        strip_of(a)
            .cmp(&strip_of(b))
            .then_with(|| b.full_width.cmp(&a.full_width))
            .then_with(|| a.column.cmp(&b.column))
            .then_with(|| a.reading_cmp(b))
    });
    for (order, block) in blocks.iter_mut().enumerate() {
        block.order = order;
    }

    ColumnLayout {
        blocks,
        columns,
        ambiguity: None,
    }
}

fn column_bands(
    blocks: &[Block],
    active: &[usize],
    clustering: &GapClustering,
) -> Result<Vec<Column>, Ambiguity> {
    let lefts: Vec<f32> = active.iter().map(|&i| blocks[i].bbox.x0).collect();
    let clusters = clustering.cluster(&lefts)?;

    let mut columns: Vec<Column> = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let members: Vec<usize> = cluster.members.iter().map(|&m| active[m]).collect();
        match columns.last_mut() {
            // A band starting inside the previous column's text is an indent
            // or a centred line, not a new column.
            Some(prev) if cluster.min < prev.right => {
                prev.members.extend(members);
                prev.right = robust_right(blocks, &prev.members);
            }
            _ => columns.push(Column {
                left: cluster.min,
                right: robust_right(blocks, &members),
                index: columns.len(),
                members,
            }),
        }
    }
    Ok(columns)
}

fn robust_right(blocks: &[Block], members: &[usize]) -> f32 {
    let mut rights: Vec<f32> = members.iter().map(|&i| blocks[i].bbox.x1).collect();
    rights.sort_by(|a, b| a.total_cmp(b));
    match rights.len() {
        0 => 0.0,
        n if n % 2 == 1 => rights[n / 2],
        n => (rights[n / 2 - 1] + rights[n / 2]) / 2.0,
    }
}

fn single_column(mut blocks: Vec<Block>, ambiguity: Option<Ambiguity>) -> ColumnLayout {
    if let Some(ambiguity) = &ambiguity {
        debug!("Falling back to a single column: {}", ambiguity);
    }
    for block in blocks.iter_mut() {
        block.column = 0;
        block.full_width = false;
    }
    blocks.sort_by(|a, b| a.reading_cmp(b));
    for (order, block) in blocks.iter_mut().enumerate() {
        block.order = order;
    }

    let left = blocks
        .iter()
        .map(|b| b.bbox.x0)
        .fold(f32::INFINITY, f32::min);
    let members: Vec<usize> = (0..blocks.len()).collect();
    let right = robust_right(&blocks, &members);
    ColumnLayout {
        blocks,
        columns: vec![Column {
            left,
            right,
            index: 0,
            members,
        }],
        ambiguity,
    }
}
