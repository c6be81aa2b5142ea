//! In-memory [`GridSink`] implementation for tests and local runs.
//!
//! Holds the grid in a `Vec<Vec<String>>` behind `std::sync::RwLock`.
//! Append and sort follow spreadsheet behaviour closely enough to exercise
//! the engine end to end: appends land under the contiguous block that
//! includes the anchor, and sorts keep blank keys at the bottom.

use std::cmp::Ordering;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::GridSink;
use crate::grid::{CellRef, Grid, GridBounds, RangeWrite, SortRange};
use crate::record::cell_text;
use crate::sort::compare_cells;

/// In-memory grid.
pub struct MemorySink {
    cells: RwLock<Vec<Vec<String>>>,
    bounds: GridBounds,
}

impl MemorySink {
    pub fn new(bounds: GridBounds) -> Self {
        Self::from_grid(Grid::default(), bounds)
    }

    pub fn from_grid(grid: Grid, bounds: GridBounds) -> Self {
        let mut cells = grid.into_rows();
        normalize(&mut cells);
        Self {
            cells: RwLock::new(cells),
            bounds,
        }
    }

    /// Every stored cell, including any outside [`bounds`](GridSink::bounds).
    pub fn snapshot(&self) -> Result<Grid> {
        Ok(Grid::new(self.read()?.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Vec<String>>>> {
        self.cells.read().map_err(|_| anyhow!("grid lock poisoned"))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Vec<Vec<String>>>> {
        self.cells.write().map_err(|_| anyhow!("grid lock poisoned"))
    }

    fn check_fits(&self, start: CellRef, rows: &[Vec<Value>]) -> Result<()> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if start.row + rows.len() > self.bounds.max_row || start.col + width > self.bounds.max_col
        {
            bail!(
                "write at {} ({} rows x {} cols) exceeds grid limits {}",
                start.to_a1(),
                rows.len(),
                width,
                self.bounds.a1_range()
            );
        }
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(GridBounds::default())
    }
}

fn set_cell(cells: &mut Vec<Vec<String>>, row: usize, col: usize, text: String) {
    if cells.len() <= row {
        cells.resize_with(row + 1, Vec::new);
    }
    let r = &mut cells[row];
    if r.len() <= col {
        r.resize(col + 1, String::new());
    }
    r[col] = text;
}

fn paste(cells: &mut Vec<Vec<String>>, start: CellRef, rows: &[Vec<Value>]) {
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            set_cell(cells, start.row + i, start.col + j, cell_text(value));
        }
    }
}

/// Drops trailing empty cells and rows, the shape a sheets API returns.
fn normalize(cells: &mut Vec<Vec<String>>) {
    for row in cells.iter_mut() {
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
    }
    while cells.last().is_some_and(|r| r.is_empty()) {
        cells.pop();
    }
}

fn row_has_data(cells: &[Vec<String>], row: usize, start_col: usize, end_col: usize) -> bool {
    cells
        .get(row)
        .map(|r| {
            r.iter()
                .skip(start_col)
                .take(end_col - start_col)
                .any(|c| !c.is_empty())
        })
        .unwrap_or(false)
}

#[async_trait]
impl GridSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn bounds(&self) -> GridBounds {
        self.bounds
    }

    async fn fetch(&self) -> Result<Grid> {
        let cells = self.read()?;
        let mut rows: Vec<Vec<String>> = cells
            .iter()
            .take(self.bounds.max_row)
            .map(|row| row.iter().take(self.bounds.max_col).cloned().collect())
            .collect();
        normalize(&mut rows);
        if rows.is_empty() {
            bail!("range {} is empty", self.bounds.a1_range());
        }
        Ok(Grid::new(rows))
    }

    async fn batch_write(&self, writes: &[RangeWrite]) -> Result<()> {
        for w in writes {
            self.check_fits(w.start, &w.rows)?;
        }
        let mut cells = self.write_guard()?;
        for w in writes {
            paste(&mut cells, w.start, &w.rows);
        }
        normalize(&mut cells);
        Ok(())
    }

    async fn append(&self, anchor: CellRef, rows: &[Vec<Value>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut cells = self.write_guard()?;

        let mut target = anchor.row;
        while row_has_data(&cells, target, anchor.col, anchor.col + width) {
            target += 1;
        }
        paste(&mut cells, CellRef::new(target, anchor.col), rows);
        normalize(&mut cells);
        Ok(())
    }

    async fn sort(&self, range: SortRange, column: usize, ascending: bool) -> Result<()> {
        if column < range.start_col || column >= range.end_col {
            bail!(
                "sort column {} is outside columns {}..{}",
                column,
                range.start_col,
                range.end_col
            );
        }
        let mut cells = self.write_guard()?;
        let end_row = range.end_row.min(cells.len());
        if range.start_row >= end_row {
            return Ok(());
        }

        let key = column - range.start_col;
        let mut block: Vec<Vec<String>> = (range.start_row..end_row)
            .map(|r| {
                (range.start_col..range.end_col)
                    .map(|c| {
                        cells
                            .get(r)
                            .and_then(|row| row.get(c))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        block.sort_by(|a, b| match (a[key].is_empty(), b[key].is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let order = compare_cells(&a[key], &b[key]);
                if ascending {
                    order
                } else {
                    order.reverse()
                }
            }
        });

        for (i, row) in block.into_iter().enumerate() {
            for (j, text) in row.into_iter().enumerate() {
                set_cell(&mut cells, range.start_row + i, range.start_col + j, text);
            }
        }
        normalize(&mut cells);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sink(rows: Vec<Vec<&str>>) -> MemorySink {
        MemorySink::from_grid(Grid::from(rows), GridBounds::new(20, 6))
    }

    #[tokio::test]
    async fn test_fetch_trims_and_clips() {
        let sink = MemorySink::from_grid(
            Grid::from(vec![vec!["a", "", ""], vec![], vec!["", "b", "c", "d"], vec![""]]),
            GridBounds::new(10, 3),
        );
        let grid = sink.fetch().await.unwrap();
        assert_eq!(grid, Grid::from(vec![vec!["a"], vec![], vec!["", "b", "c"]]));
    }

    #[tokio::test]
    async fn test_fetch_empty_fails() {
        let sink = MemorySink::default();
        assert!(sink.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_batch_write_cells() {
        let sink = sink(vec![vec!["id", "v"], vec!["1", "a"]]);
        sink.batch_write(&[
            RangeWrite::cell(1, 1, json!("b")),
            RangeWrite::cell(3, 2, json!(7)),
        ])
        .await
        .unwrap();
        assert_eq!(
            sink.snapshot().unwrap(),
            Grid::from(vec![vec!["id", "v"], vec!["1", "b"], vec![], vec!["", "", "7"]])
        );
    }

    #[tokio::test]
    async fn test_batch_write_out_of_bounds_writes_nothing() {
        let sink = sink(vec![vec!["id"]]);
        let err = sink
            .batch_write(&[
                RangeWrite::cell(1, 0, json!("ok")),
                RangeWrite::cell(0, 9, json!("too far")),
            ])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds grid limits"));
        assert_eq!(sink.snapshot().unwrap(), Grid::from(vec![vec!["id"]]));
    }

    #[tokio::test]
    async fn test_append_below_contiguous_block() {
        let sink = sink(vec![
            vec!["id", "v"],
            vec!["1", "a"],
            vec!["", "b"],
            vec![],
            vec!["note below the table"],
        ]);
        sink.append(CellRef::new(1, 0), &[vec![json!("3"), json!("c")]])
            .await
            .unwrap();
        let grid = sink.snapshot().unwrap();
        assert_eq!(grid.row(3).unwrap(), &["3".to_string(), "c".to_string()]);
        assert_eq!(grid.cell(4, 0), Some("note below the table"));
    }

    #[tokio::test]
    async fn test_append_into_empty_anchor() {
        let sink = sink(vec![vec!["id", "v"]]);
        sink.append(CellRef::new(1, 0), &[vec![json!(1)], vec![json!(2)]])
            .await
            .unwrap();
        assert_eq!(
            sink.snapshot().unwrap(),
            Grid::from(vec![vec!["id", "v"], vec!["1"], vec!["2"]])
        );
    }

    #[tokio::test]
    async fn test_sort_keeps_blanks_last() {
        let sink = sink(vec![
            vec!["id", "score"],
            vec!["a", "10"],
            vec!["b"],
            vec!["c", "90"],
            vec!["d", "35"],
        ]);
        let range = SortRange {
            start_row: 1,
            end_row: 20,
            start_col: 0,
            end_col: 6,
        };
        sink.sort(range, 1, false).await.unwrap();
        assert_eq!(
            sink.snapshot().unwrap(),
            Grid::from(vec![
                vec!["id", "score"],
                vec!["c", "90"],
                vec!["d", "35"],
                vec!["a", "10"],
                vec!["b"],
            ])
        );

        sink.sort(range, 1, true).await.unwrap();
        let ids: Vec<String> = (1..5).map(|r| sink_cell(&sink, r, 0)).collect();
        assert_eq!(ids, vec!["a", "d", "c", "b"]);
    }

    fn sink_cell(sink: &MemorySink, row: usize, col: usize) -> String {
        sink.snapshot()
            .unwrap()
            .cell(row, col)
            .unwrap_or_default()
            .to_string()
    }
}
