//! Table structure.

use serde::{Deserialize, Serialize};

use super::BoundingBox;

/// Largest row or column span a cell may claim.
pub const MAX_SPAN: usize = 1000;

/// A table cell positioned on the row/column grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Cell text
    pub text: String,
    /// Number of rows this cell spans
    pub row_span: usize,
    /// Number of columns this cell spans
    pub col_span: usize,
    /// First row covered (inclusive)
    pub start_row_offset_idx: usize,
    /// Last row covered (exclusive)
    pub end_row_offset_idx: usize,
    /// First column covered (inclusive)
    pub start_col_offset_idx: usize,
    /// Last column covered (exclusive)
    pub end_col_offset_idx: usize,
    /// Cell belongs to a column header
    pub column_header: bool,
    /// Cell is a row header
    pub row_header: bool,
    /// Location on the page, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl TableCell {
    /// Create a 1x1 cell at `(row, col)`.
    pub fn new(text: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            text: text.into(),
            row_span: 1,
            col_span: 1,
            start_row_offset_idx: row,
            end_row_offset_idx: row + 1,
            start_col_offset_idx: col,
            end_col_offset_idx: col + 1,
            column_header: false,
            row_header: false,
            bbox: None,
        }
    }

    /// Set the spans, keeping the start offsets. Spans are clamped to
    /// `1..=MAX_SPAN`.
    pub fn with_span(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span.clamp(1, MAX_SPAN);
        self.col_span = col_span.clamp(1, MAX_SPAN);
        self.end_row_offset_idx = self.start_row_offset_idx.saturating_add(self.row_span);
        self.end_col_offset_idx = self.start_col_offset_idx.saturating_add(self.col_span);
        self
    }

    /// Mark as a column header cell.
    pub fn column_header(mut self) -> Self {
        self.column_header = true;
        self
    }

    /// Mark as a row header cell.
    pub fn row_header(mut self) -> Self {
        self.row_header = true;
        self
    }

    /// Attach a bounding box.
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    fn empty_at(row: usize, col: usize) -> Self {
        Self::new(String::new(), row, col)
    }
}

/// Grid description of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Number of rows in the grid
    pub num_rows: usize,
    /// Number of columns in the grid
    pub num_cols: usize,
    /// Cells, each appearing once even when spanning
    pub table_cells: Vec<TableCell>,
}

impl TableData {
    /// Create an empty grid.
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            table_cells: Vec::new(),
        }
    }

    /// Build from rows of strings; the first `header_rows` rows are column headers.
    ///
    /// Ragged rows are padded to the widest row.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>], header_rows: usize) -> Self {
        let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut data = Self::new(rows.len(), num_cols);
        for (r, row) in rows.iter().enumerate() {
            for c in 0..num_cols {
                let text = row.get(c).map(|s| s.as_ref()).unwrap_or_default();
                let mut cell = TableCell::new(text, r, c);
                cell.column_header = r < header_rows;
                data.table_cells.push(cell);
            }
        }
        data
    }

    /// Add a cell, growing the grid if needed.
    pub fn add_cell(&mut self, cell: TableCell) {
        self.num_rows = self.num_rows.max(cell.end_row_offset_idx);
        self.num_cols = self.num_cols.max(cell.end_col_offset_idx);
        self.table_cells.push(cell);
    }

    /// Whether the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.table_cells.is_empty() || self.num_rows == 0 || self.num_cols == 0
    }

    /// Whether any cell spans more than one row or column.
    pub fn has_merged_cells(&self) -> bool {
        self.table_cells
            .iter()
            .any(|c| c.row_span > 1 || c.col_span > 1)
    }

    /// Number of leading rows that consist of column-header cells.
    pub fn header_row_count(&self) -> usize {
        let grid = self.grid();
        grid.iter()
            .take_while(|row| !row.is_empty() && row.iter().all(|c| c.column_header))
            .count()
    }

    /// Dense `num_rows x num_cols` grid. Spanning cells repeat in every slot
    /// they cover; uncovered slots are empty cells.
    pub fn grid(&self) -> Vec<Vec<TableCell>> {
        let mut grid: Vec<Vec<TableCell>> = (0..self.num_rows)
            .map(|r| (0..self.num_cols).map(|c| TableCell::empty_at(r, c)).collect())
            .collect();

        for cell in &self.table_cells {
            let rows = cell.start_row_offset_idx..cell.end_row_offset_idx.min(self.num_rows);
            for r in rows {
                let cols = cell.start_col_offset_idx..cell.end_col_offset_idx.min(self.num_cols);
                for c in cols {
                    grid[r][c] = cell.clone();
                }
            }
        }
        grid
    }

    /// Tab-separated plain text, one line per row.
    pub fn plain_text(&self) -> String {
        self.grid()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| c.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_span_clamped() {
        let cell = TableCell::new("x", 2, usize::MAX - 1).with_span(0, usize::MAX);
        assert_eq!((cell.row_span, cell.col_span), (1, MAX_SPAN));
        assert_eq!(cell.end_row_offset_idx, 3);
        assert_eq!(cell.end_col_offset_idx, usize::MAX);
    }

    #[test]
    fn test_from_rows_pads_ragged() {
        let rows = vec![
            vec!["Name", "Age", "City"],
            vec!["Ada", "36"],
        ];
        let data = TableData::from_rows(&rows, 1);
        assert_eq!(data.num_rows, 2);
        assert_eq!(data.num_cols, 3);
        assert_eq!(data.table_cells.len(), 6);
        assert_eq!(data.header_row_count(), 1);
        assert_eq!(data.grid()[1][2].text, "");
    }

    #[test]
    fn test_grid_repeats_spans() {
        let mut data = TableData::new(2, 3);
        data.add_cell(TableCell::new("Wide", 0, 0).with_span(1, 2).column_header());
        data.add_cell(TableCell::new("Tall", 0, 2).with_span(2, 1).column_header());
        data.add_cell(TableCell::new("a", 1, 0));
        data.add_cell(TableCell::new("b", 1, 1));

        let grid = data.grid();
        assert_eq!(grid[0][1].text, "Wide");
        assert_eq!(grid[1][2].text, "Tall");
        assert!(data.has_merged_cells());
        assert_eq!(data.plain_text(), "Wide\tWide\tTall\na\tb\tTall");
    }

    #[test]
    fn test_add_cell_grows_grid() {
        let mut data = TableData::default();
        assert!(data.is_empty());
        data.add_cell(TableCell::new("x", 2, 4));
        assert_eq!((data.num_rows, data.num_cols), (3, 5));
    }
}
