//! Table detection from text alignment.
//!
//! Tables without ruling lines still show up as runs of consecutive rows
//! whose cells start at the same x positions. The detector groups cells into
//! rows, finds recurring left edges, and keeps contiguous row regions that
//! align with them. Lists with a marker column look the same, so regions
//! whose first column holds bullets or numbers are rejected.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::layout::{is_bullet_marker, is_number_marker};
use crate::backend::TextCell;
use crate::model::{BoundingBox, TableCell, TableData};

/// Left edges are bucketed at this resolution.
const EDGE_BUCKET: f32 = 5.0;
/// A row cell within this distance of a column edge counts as aligned.
const ALIGN_TOLERANCE: f32 = 5.0;

/// A detected table region.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Region bounds, top-left origin
    pub bbox: BoundingBox,
    /// Left edges of the columns
    pub columns: Vec<f32>,
    /// Rows, top to bottom
    pub rows: Vec<TableRow>,
}

/// Cells sharing a baseline.
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Average baseline (bottom) of the row
    pub y: f32,
    /// Cells sorted by x
    pub cells: Vec<TextCell>,
    /// Indices of the input cells merged into this row
    pub sources: Vec<usize>,
}

/// Table detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping cells into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// Detects tables in a set of text cells.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables among `cells`.
    ///
    /// Returns the tables and the cells that were not used by any of them.
    pub fn detect(&self, cells: Vec<TextCell>) -> (Vec<DetectedTable>, Vec<TextCell>) {
        if cells.len() < self.config.min_rows * self.config.min_columns {
            return (vec![], cells);
        }

        let rows = self.group_into_rows(&cells);
        if rows.len() < self.config.min_rows {
            return (vec![], cells);
        }

        let columns = self.detect_columns(&rows);
        log::trace!("table columns: {:?}", columns);
        if columns.len() < self.config.min_columns {
            return (vec![], cells);
        }

        let mut tables = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();

        for (start, end) in self.find_table_regions(&rows, &columns) {
            let table_rows = rows[start..=end].to_vec();
            let table_columns = self.detect_columns(&table_rows);

            if table_columns.len() < self.config.min_columns {
                continue;
            }
            if table_columns.len() > self.config.max_columns {
                log::debug!(
                    "skipping table region: {} columns > {}",
                    table_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(&table_rows, &table_columns) {
                log::debug!("skipping table region: list pattern");
                continue;
            }

            let Some(bbox) = table_rows
                .iter()
                .flat_map(|r| r.cells.iter())
                .map(|c| c.bbox)
                .reduce(|a, b| a.union(&b))
            else {
                continue;
            };
            for row in &table_rows {
                used.extend(row.sources.iter().copied());
            }
            tables.push(DetectedTable {
                bbox,
                columns: table_columns,
                rows: table_rows,
            });
        }

        let remaining = cells
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, c)| c)
            .collect();
        (tables, remaining)
    }

    /// Group cells into rows by baseline, merging word-level cells that are
    /// closer than a column gap.
    fn group_into_rows(&self, cells: &[TextCell]) -> Vec<TableRow> {
        let mut order: Vec<usize> = (0..cells.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&cells[a].bbox, &cells[b].bbox);
            a.b.total_cmp(&b.b).then(a.l.total_cmp(&b.l))
        });

        let mut rows: Vec<TableRow> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_y: Option<f32> = None;

        for i in order {
            let cell = &cells[i];
            let tolerance = cell.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (cell.bbox.b - y).abs() <= tolerance => current.push(i),
                _ => {
                    if !current.is_empty() {
                        rows.push(self.make_row(cells, std::mem::take(&mut current)));
                    }
                    current_y = Some(cell.bbox.b);
                    current.push(i);
                }
            }
        }
        if !current.is_empty() {
            rows.push(self.make_row(cells, current));
        }
        rows
    }

    fn make_row(&self, cells: &[TextCell], mut sources: Vec<usize>) -> TableRow {
        sources.sort_by(|&a, &b| cells[a].bbox.l.total_cmp(&cells[b].bbox.l));
        let y = sources.iter().map(|&i| cells[i].bbox.b).sum::<f32>() / sources.len() as f32;

        // Word boxes (pdftotext, OCR) separated by a plain space belong to one cell.
        let mut merged: Vec<TextCell> = Vec::with_capacity(sources.len());
        for &i in &sources {
            let cell = &cells[i];
            match merged.last_mut() {
                Some(prev) if self.is_word_gap(prev, cell) => {
                    prev.text.push(' ');
                    prev.text.push_str(cell.text.trim());
                    prev.bbox = prev.bbox.union(&cell.bbox);
                }
                _ => merged.push(cell.clone()),
            }
        }
        TableRow {
            y,
            cells: merged,
            sources,
        }
    }

    fn is_word_gap(&self, prev: &TextCell, next: &TextCell) -> bool {
        let gap = next.bbox.l - prev.bbox.r;
        let limit = (prev.font_size * 0.6).min(self.config.min_column_gap * 0.5);
        gap < limit
    }

    /// Detect column boundaries from recurring left edges.
    fn detect_columns(&self, rows: &[TableRow]) -> Vec<f32> {
        let multi_cell_rows: Vec<&TableRow> = rows.iter().filter(|r| r.cells.len() >= 2).collect();
        if multi_cell_rows.len() < self.config.min_rows {
            return self.detect_columns_simple(rows);
        }

        // each bucket counts once per row
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &multi_cell_rows {
            let buckets: HashSet<i32> = row
                .cells
                .iter()
                .map(|c| (c.bbox.l / EDGE_BUCKET).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((multi_cell_rows.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);
        self.merge_edges(edge_counts, min_occurrences)
    }

    /// Column detection over every cell, for regions with few multi-cell rows.
    fn detect_columns_simple(&self, rows: &[TableRow]) -> Vec<f32> {
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for cell in rows.iter().flat_map(|r| r.cells.iter()) {
            *edge_counts
                .entry((cell.bbox.l / EDGE_BUCKET).round() as i32)
                .or_insert(0) += 1;
        }
        let min_occurrences =
            ((rows.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);
        self.merge_edges(edge_counts, min_occurrences)
    }

    fn merge_edges(&self, edge_counts: HashMap<i32, usize>, min_occurrences: usize) -> Vec<f32> {
        let mut edges: Vec<f32> = edge_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(bucket, _)| bucket as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Contiguous row ranges (inclusive) that align with `columns`.
    fn find_table_regions(&self, rows: &[TableRow], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = row.cells.len() >= 2
                && alignment_score(row, columns) >= self.config.min_alignment_ratio;
            match (aligned, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        regions.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    /// Whether the region is a bulleted or numbered list rather than a table.
    fn is_list_pattern(&self, rows: &[TableRow], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullets = 0;
        let mut numbers = 0;
        for row in rows {
            if let Some(first) = row.cells.first() {
                let text = first.text.trim();
                if is_bullet_marker(text) {
                    bullets += 1;
                } else if is_number_marker(text) {
                    numbers += 1;
                }
            }
        }

        let bullet_ratio = bullets as f32 / rows.len() as f32;
        let total_ratio = (bullets + numbers) as f32 / rows.len() as f32;
        // numbered first columns are common in real tables; only reject two-column ones
        bullet_ratio >= 0.5 || (columns.len() == 2 && total_ratio >= 0.5)
    }
}

fn alignment_score(row: &TableRow, columns: &[f32]) -> f32 {
    if row.cells.is_empty() || columns.is_empty() {
        return 0.0;
    }
    let aligned = row
        .cells
        .iter()
        .filter(|c| columns.iter().any(|col| (c.bbox.l - col).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / row.cells.len() as f32
}

impl DetectedTable {
    /// Build the table grid. The first row is the column header when the
    /// table has more than one row.
    pub fn to_table_data(&self) -> TableData {
        let num_cols = self.columns.len();
        let mut data = TableData::new(self.rows.len(), num_cols);
        let header = self.rows.len() > 1;

        for (r, row) in self.rows.iter().enumerate() {
            let mut slots: Vec<Option<(Vec<&str>, BoundingBox)>> = vec![None; num_cols];
            for cell in &row.cells {
                let c = self.column_for(cell.bbox.l);
                let slot = slots[c].get_or_insert_with(|| (Vec::new(), cell.bbox));
                slot.0.push(cell.text.trim());
                slot.1 = slot.1.union(&cell.bbox);
            }
            for (c, slot) in slots.into_iter().enumerate() {
                let mut cell = match slot {
                    Some((texts, bbox)) => TableCell::new(texts.join(" "), r, c).with_bbox(bbox),
                    None => TableCell::new("", r, c),
                };
                if header && r == 0 {
                    cell = cell.column_header();
                }
                data.add_cell(cell);
            }
        }
        data
    }

    /// Column index for a cell starting at `x`.
    fn column_for(&self, x: f32) -> usize {
        let right = self.bbox.r;
        for (i, &start) in self.columns.iter().enumerate() {
            let end = self.columns.get(i + 1).copied().unwrap_or(right + 100.0);
            if x >= start - 10.0 && x < end - 10.0 {
                return i;
            }
        }
        self.columns
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cell(text: &str, x: f32, y: f32) -> TextCell {
        let bbox = BoundingBox::new(x, y - 10.0, x + text.chars().count() as f32 * 6.0, y);
        TextCell::new(text, bbox, 12.0, "Helvetica")
    }

    #[test]
    fn test_group_into_rows() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("A1", 10.0, 100.0),
            make_cell("B1", 60.0, 100.0),
            make_cell("A2", 10.0, 115.0),
            make_cell("B2", 60.0, 115.0),
        ];

        let rows = detector.group_into_rows(&cells);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(rows[0].cells[0].text, "A1");
        assert_eq!(rows[1].cells.len(), 2);
    }

    #[test]
    fn test_word_cells_are_merged() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("Alice", 10.0, 100.0),
            make_cell("Smith", 43.0, 100.0),
            make_cell("30", 120.0, 100.0),
        ];
        let rows = detector.group_into_rows(&cells);
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(rows[0].cells[0].text, "Alice Smith");
    }

    #[test]
    fn test_detect_simple_table() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("Name", 10.0, 100.0),
            make_cell("Age", 60.0, 100.0),
            make_cell("Alice", 10.0, 115.0),
            make_cell("30", 60.0, 115.0),
            make_cell("Bob", 10.0, 130.0),
            make_cell("25", 60.0, 130.0),
        ];

        let (tables, remaining) = detector.detect(cells);
        assert_eq!(tables.len(), 1);
        assert!(remaining.is_empty());

        let table = &tables[0];
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.columns.len(), 2);

        let data = table.to_table_data();
        assert_eq!((data.num_rows, data.num_cols), (3, 2));
        let grid = data.grid();
        assert_eq!(grid[0][0].text, "Name");
        assert!(grid[0][1].column_header);
        assert_eq!(grid[2][1].text, "25");
        assert!(!grid[2][1].column_header);
        assert!(grid[1][0].bbox.is_some());
    }

    #[test]
    fn test_no_table_single_column() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("Line 1", 10.0, 100.0),
            make_cell("Line 2", 10.0, 115.0),
            make_cell("Line 3", 10.0, 130.0),
            make_cell("Line 4", 10.0, 145.0),
        ];

        let (tables, remaining) = detector.detect(cells);
        assert!(tables.is_empty());
        assert_eq!(remaining.len(), 4);
    }

    #[test]
    fn test_table_keeps_surrounding_text() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("Results are summarized below.", 10.0, 70.0),
            make_cell("Name", 10.0, 100.0),
            make_cell("Age", 90.0, 100.0),
            make_cell("Alice", 10.0, 115.0),
            make_cell("30", 90.0, 115.0),
            make_cell("That is all.", 10.0, 160.0),
        ];

        let (tables, remaining) = detector.detect(cells);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 2);
        let texts: Vec<&str> = remaining.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Results are summarized below.", "That is all."]);
    }

    #[test]
    fn test_numbered_list_not_detected_as_table() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("1.", 50.0, 400.0),
            make_cell("장비관리설정", 80.0, 400.0),
            make_cell("2.", 50.0, 430.0),
            make_cell("Object관리", 80.0, 430.0),
            make_cell("3.", 50.0, 460.0),
            make_cell("정책관리 및 라우팅", 80.0, 460.0),
            make_cell("4.", 50.0, 490.0),
            make_cell("VPN", 80.0, 490.0),
        ];

        let (tables, remaining) = detector.detect(cells);
        assert!(tables.is_empty(), "numbered list detected as a table");
        assert_eq!(remaining.len(), 8);
    }

    #[test]
    fn test_bullet_list_not_detected_as_table() {
        let detector = TableDetector::new();
        let cells = vec![
            make_cell("-", 50.0, 400.0),
            make_cell("Management", 80.0, 400.0),
            make_cell("-", 50.0, 430.0),
            make_cell("Interface/Service Option", 80.0, 430.0),
            make_cell("-", 50.0, 460.0),
            make_cell("Firmware", 80.0, 460.0),
        ];

        let (tables, remaining) = detector.detect(cells);
        assert!(tables.is_empty(), "bullet list detected as a table");
        assert_eq!(remaining.len(), 6);
    }
}
