//! Table types.

use super::Paragraph;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reconstructed table grid.
///
/// Cells are stored anchored at their top-left grid position; a merged cell
/// covers `row_span × col_span` positions starting there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Number of grid rows
    pub row_count: usize,

    /// Number of grid columns
    pub column_count: usize,

    /// Cells in row-major order of their anchor position
    pub cells: Vec<TableCell>,

    /// Column widths in points
    pub column_widths: Vec<f32>,
}

impl Table {
    /// Create an empty grid of the given shape.
    pub fn new(row_count: usize, column_count: usize) -> Self {
        Self {
            row_count,
            column_count,
            cells: Vec::new(),
            column_widths: Vec::new(),
        }
    }

    /// Build a table of singleton text cells from rows of strings.
    pub fn from_rows<S: Into<String>>(rows: Vec<Vec<S>>) -> Self {
        let row_count = rows.len();
        let column_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut table = Self::new(row_count, column_count);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                table.add_cell(TableCell::text(r, c, value));
            }
        }
        table.fill_empty();
        table
    }

    /// Add a cell.
    pub fn add_cell(&mut self, cell: TableCell) {
        self.cells.push(cell);
        self.sort_cells();
    }

    /// Check if the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Find the cell covering a grid position.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| c.covers(row, col))
    }

    /// Find the cell anchored at a grid position.
    pub fn cell_anchored_at(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Cells anchored in a given row, left to right.
    pub fn row_cells(&self, row: usize) -> impl Iterator<Item = &TableCell> {
        self.cells.iter().filter(move |c| c.row == row)
    }

    /// Fill every uncovered grid position with an empty singleton cell.
    pub fn fill_empty(&mut self) {
        let mut missing = Vec::new();
        for row in 0..self.row_count {
            for col in 0..self.column_count {
                if self.cell_at(row, col).is_none() {
                    missing.push(TableCell::empty(row, col));
                }
            }
        }
        if !missing.is_empty() {
            self.cells.extend(missing);
            self.sort_cells();
        }
    }

    /// Check that every grid position is covered by exactly one cell.
    pub fn verify_tiling(&self) -> Result<(), TilingError> {
        let mut coverage = vec![0u8; self.row_count * self.column_count];
        for cell in &self.cells {
            if cell.row_span == 0 || cell.col_span == 0 {
                return Err(TilingError::ZeroSpan {
                    row: cell.row,
                    col: cell.col,
                });
            }
            if cell.row + cell.row_span > self.row_count
                || cell.col + cell.col_span > self.column_count
            {
                return Err(TilingError::OutOfBounds {
                    row: cell.row,
                    col: cell.col,
                });
            }
            for r in cell.row..cell.row + cell.row_span {
                for c in cell.col..cell.col + cell.col_span {
                    let slot = &mut coverage[r * self.column_count + c];
                    if *slot > 0 {
                        return Err(TilingError::Overlap { row: r, col: c });
                    }
                    *slot = 1;
                }
            }
        }
        if let Some(idx) = coverage.iter().position(|&n| n == 0) {
            return Err(TilingError::Uncovered {
                row: idx / self.column_count.max(1),
                col: idx % self.column_count.max(1),
            });
        }
        Ok(())
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        (0..self.row_count)
            .map(|row| {
                self.row_cells(row)
                    .map(|c| c.plain_text())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the table has merged cells.
    pub fn has_merged_cells(&self) -> bool {
        self.cells.iter().any(|c| c.is_merged())
    }

    fn sort_cells(&mut self) {
        self.cells.sort_by_key(|c| (c.row, c.col));
    }
}

/// One grid position (or merged range of positions) of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    /// Anchor row
    pub row: usize,

    /// Anchor column
    pub col: usize,

    /// Number of rows this cell spans
    pub row_span: usize,

    /// Number of columns this cell spans
    pub col_span: usize,

    /// Cell content (paragraphs)
    pub content: Vec<Paragraph>,
}

impl TableCell {
    /// Create a cell with paragraph content.
    pub fn new(row: usize, col: usize, content: Vec<Paragraph>) -> Self {
        Self {
            row,
            col,
            row_span: 1,
            col_span: 1,
            content,
        }
    }

    /// Create a cell with text content.
    pub fn text(row: usize, col: usize, text: impl Into<String>) -> Self {
        Self::new(row, col, vec![Paragraph::with_text(text)])
    }

    /// Create an empty cell.
    pub fn empty(row: usize, col: usize) -> Self {
        Self::new(row, col, Vec::new())
    }

    /// Set the span and return self.
    pub fn span(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span;
        self.col_span = col_span;
        self
    }

    /// Whether this cell covers a grid position.
    pub fn covers(&self, row: usize, col: usize) -> bool {
        row >= self.row
            && row < self.row + self.row_span
            && col >= self.col
            && col < self.col + self.col_span
    }

    /// Get plain text content.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|p| p.is_empty())
    }

    /// Check if this cell spans multiple rows or columns.
    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

/// A violation of the one-cell-per-position rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilingError {
    /// A position is covered by no cell.
    #[error("grid position ({row}, {col}) is not covered")]
    Uncovered { row: usize, col: usize },

    /// A position is covered by more than one cell.
    #[error("grid position ({row}, {col}) is covered twice")]
    Overlap { row: usize, col: usize },

    /// A cell extends past the grid.
    #[error("cell at ({row}, {col}) extends past the grid")]
    OutOfBounds { row: usize, col: usize },

    /// A cell spans nothing.
    #[error("cell at ({row}, {col}) has a zero span")]
    ZeroSpan { row: usize, col: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_rows() {
        let table = Table::from_rows(vec![vec!["Name", "Age"], vec!["Alice", "30"]]);

        assert_eq!(table.row_count, 2);
        assert_eq!(table.column_count, 2);
        assert_eq!(table.cells.len(), 4);
        assert!(table.verify_tiling().is_ok());
        assert_eq!(table.plain_text(), "Name\tAge\nAlice\t30");
    }

    #[test]
    fn test_ragged_rows_are_filled() {
        let table = Table::from_rows(vec![vec!["a", "b", "c"], vec!["d"]]);
        assert_eq!(table.cells.len(), 6);
        assert!(table.cell_at(1, 2).is_some_and(|c| c.is_empty()));
        assert!(table.verify_tiling().is_ok());
    }

    #[test]
    fn test_merged_cell_tiling() {
        let mut table = Table::new(2, 2);
        table.add_cell(TableCell::text(0, 0, "Header").span(1, 2));
        table.add_cell(TableCell::text(1, 0, "a"));
        table.add_cell(TableCell::text(1, 1, "b"));

        assert!(table.has_merged_cells());
        assert!(table.verify_tiling().is_ok());
        assert_eq!(table.cell_at(0, 1).map(|c| c.col), Some(0));
    }

    #[test]
    fn test_tiling_detects_overlap_and_gap() {
        let mut table = Table::new(2, 2);
        table.add_cell(TableCell::text(0, 0, "x").span(2, 1));
        table.add_cell(TableCell::text(1, 0, "y"));
        assert_eq!(
            table.verify_tiling(),
            Err(TilingError::Overlap { row: 1, col: 0 })
        );

        let mut table = Table::new(1, 2);
        table.add_cell(TableCell::text(0, 0, "x"));
        assert_eq!(
            table.verify_tiling(),
            Err(TilingError::Uncovered { row: 0, col: 1 })
        );
    }

    #[test]
    fn test_tiling_detects_out_of_bounds() {
        let mut table = Table::new(1, 1);
        table.add_cell(TableCell::text(0, 0, "x").span(1, 2));
        assert!(matches!(
            table.verify_tiling(),
            Err(TilingError::OutOfBounds { .. })
        ));
    }
}
