//! Raw grid snapshots and A1 coordinates.
//!
//! A [`Grid`] is exactly what the sink returned: rows top to bottom, each a
//! ragged list of cell strings. Nothing is padded. Reads past the end of a
//! row return `None` instead of failing, because sheets APIs drop trailing
//! empty cells and people leave half-filled rows around.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One fetched snapshot of the sink's cell contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|c| c.is_empty()))
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    /// Bounds-checked cell read. Missing rows and short rows yield `None`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(|c| c.as_str())
    }

    /// JSON rendering used in error messages and logs.
    pub fn dump(&self) -> String {
        serde_json::to_string(&self.rows).unwrap_or_default()
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }
}

impl From<Vec<Vec<String>>> for Grid {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self::new(rows)
    }
}

impl From<Vec<Vec<&str>>> for Grid {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// A 0-based cell coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// A1 notation, e.g. `(0, 0)` → `A1`, `(6, 27)` → `AB7`.
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row + 1)
    }
}

/// Sheet limits the engine operates inside. Fetches cover
/// `A1:<max_col><max_row>` and sorts extend down to `max_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub max_row: usize,
    pub max_col: usize,
}

impl GridBounds {
    pub fn new(max_row: usize, max_col: usize) -> Self {
        Self { max_row, max_col }
    }

    /// The full range in A1 notation, e.g. `A1:Z999`.
    pub fn a1_range(&self) -> String {
        format!(
            "A1:{}{}",
            column_letters(self.max_col.saturating_sub(1)),
            self.max_row
        )
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self::new(999, 26)
    }
}

/// A half-open block of rows × columns, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortRange {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

/// Rows of values written verbatim starting at `start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeWrite {
    pub start: CellRef,
    pub rows: Vec<Vec<Value>>,
}

impl RangeWrite {
    pub fn new(start: CellRef, rows: Vec<Vec<Value>>) -> Self {
        Self { start, rows }
    }

    /// A single-cell write.
    pub fn cell(row: usize, col: usize, value: Value) -> Self {
        Self::new(CellRef::new(row, col), vec![vec![value]])
    }
}

/// Spreadsheet column letters for a 0-based index: 0 → `A`, 25 → `Z`,
/// 26 → `AA`.
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
