//! Keyed rows and the primary-key index.
//!
//! [`smart_get`] turns the data rows under the header into [`SinkRow`]s
//! keyed by sanitized column name. [`KeyIndex`] maps each row's
//! [`PrimaryKey`] to its absolute row number so incoming records can be
//! matched to the row they should update.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::grid::Grid;
use crate::header::{sanitize_header, HeaderMap};
use crate::record::Record;

/// One existing data row in keyed form.
///
/// Only non-empty cells are present in `cells`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRow {
    /// Absolute 0-based row index in the grid.
    pub row: usize,
    pub cells: Record,
}

impl SinkRow {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cells.get(name).and_then(Value::as_str)
    }
}

/// Reads every row below the header into keyed form.
///
/// Cells outside a short row are treated as absent. Rows with no non-empty
/// cell under any header are filler and are dropped.
pub fn smart_get(grid: &Grid, headers: &HeaderMap) -> Vec<SinkRow> {
    let mut rows = Vec::new();
    for i in (headers.row() + 1)..grid.len() {
        let mut cells = Record::new();
        for (name, col) in headers.iter() {
            if let Some(value) = grid.cell(i, col).filter(|v| !v.is_empty()) {
                cells.insert(name, value);
            }
        }
        if !cells.is_empty() {
            rows.push(SinkRow { row: i, cells });
        }
    }
    rows
}

/// Identity used to match a record to a row: one slot per key field, in
/// configured order. A missing field is an explicit `None` slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PrimaryKey(Vec<Option<String>>);

impl PrimaryKey {
    pub fn new(slots: Vec<Option<String>>) -> Self {
        Self(slots)
    }

    /// The key of a canonical record, or `None` if it sets no key field.
    pub fn from_record(record: &Record, fields: &[String]) -> Option<Self> {
        Self::build(fields, |field| record.text(field))
    }

    /// The key of an existing row, or `None` if it sets no key field.
    pub fn from_row(row: &SinkRow, fields: &[String]) -> Option<Self> {
        Self::build(fields, |field| row.get(field).map(str::to_string))
    }

    fn build(fields: &[String], lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let slots: Vec<Option<String>> = fields
            .iter()
            .map(|f| lookup(&sanitize_header(f)))
            .collect();
        if slots.iter().all(Option::is_none) {
            return None;
        }
        Some(Self(slots))
    }

    pub fn slots(&self) -> &[Option<String>] {
        &self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|slot| slot.as_deref().unwrap_or("<missing>"))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Primary key → absolute row number for the existing data rows.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    rows: HashMap<PrimaryKey, usize>,
}

impl KeyIndex {
    /// Indexes every row that sets at least one key field. When two rows
    /// share a key the later row wins.
    pub fn build(rows: &[SinkRow], fields: &[String]) -> Self {
        let mut index: HashMap<PrimaryKey, usize> = HashMap::new();
        for row in rows {
            let Some(key) = PrimaryKey::from_row(row, fields) else {
                continue;
            };
            if let Some(previous) = index.insert(key.clone(), row.row) {
                warn!(
                    %key,
                    first = previous,
                    second = row.row,
                    "duplicate primary key in sheet, using the later row"
                );
            }
        }
        Self { rows: index }
    }

    pub fn get(&self, key: &PrimaryKey) -> Option<usize> {
        self.rows.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::locate_header;

    fn fields(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn listings_grid() -> Grid {
        Grid::from(vec![
            vec!["Housing bot"],
            vec!["Unit", "Address", "Zipcode", "Score", "Notes"],
            vec!["1", "9 Pine", "98103", "70"],
            vec![],
            vec!["", "", "", "", ""],
            vec!["", "4 Oak", "98107", "", "call back"],
            vec!["2", "9 Pine", "98103"],
        ])
    }

    #[test]
    fn test_smart_get_keys_and_drops_blank_rows() {
        let grid = listings_grid();
        let headers = locate_header(&grid, &fields(&["unit"])).unwrap();
        let rows = smart_get(&grid, &headers);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].get("score"), Some("70"));
        assert_eq!(rows[0].get("notes"), None);
        assert_eq!(rows[1].row, 5);
        assert_eq!(rows[1].get("unit"), None);
        assert_eq!(rows[1].get("notes"), Some("call back"));
        assert_eq!(rows[2].row, 6);
        assert_eq!(rows[2].cells.len(), 3);
    }

    #[test]
    fn test_key_index_uses_absolute_rows() {
        let grid = listings_grid();
        let headers = locate_header(&grid, &fields(&["unit"])).unwrap();
        let rows = smart_get(&grid, &headers);
        let keys = fields(&["unit", "address", "zipcode"]);
        let index = KeyIndex::build(&rows, &keys);

        assert_eq!(index.len(), 3);
        let key = PrimaryKey::new(vec![
            None,
            Some("4 Oak".to_string()),
            Some("98107".to_string()),
        ]);
        assert_eq!(index.get(&key), Some(5));
        let key = PrimaryKey::new(vec![
            Some("2".to_string()),
            Some("9 Pine".to_string()),
            Some("98103".to_string()),
        ]);
        assert_eq!(index.get(&key), Some(6));
    }

    #[test]
    fn test_rows_without_key_fields_are_not_indexed() {
        let grid = Grid::from(vec![vec!["id", "note"], vec!["", "orphan"], vec!["7", ""]]);
        let headers = locate_header(&grid, &fields(&["id"])).unwrap();
        let rows = smart_get(&grid, &headers);
        let index = KeyIndex::build(&rows, &fields(&["id"]));
        assert_eq!(rows.len(), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_duplicate_key_later_row_wins() {
        let grid = Grid::from(vec![vec!["id", "v"], vec!["1", "a"], vec!["1", "b"]]);
        let headers = locate_header(&grid, &fields(&["id"])).unwrap();
        let rows = smart_get(&grid, &headers);
        let index = KeyIndex::build(&rows, &fields(&["id"]));
        let key = PrimaryKey::new(vec![Some("1".to_string())]);
        assert_eq!(index.get(&key), Some(2));
    }

    #[test]
    fn test_missing_slot_is_part_of_identity() {
        let keys = fields(&["unit", "address"]);
        let with_unit = Record::new().with("unit", "1").with("address", "9 Pine");
        let without_unit = Record::new().with("address", "9 Pine");
        let a = PrimaryKey::from_record(&with_unit, &keys).unwrap();
        let b = PrimaryKey::from_record(&without_unit, &keys).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.slots()[0], None);
    }

    #[test]
    fn test_record_without_keys_has_no_primary_key() {
        let record = Record::new().with("score", 10).with("unit", "");
        assert!(PrimaryKey::from_record(&record, &fields(&["unit"])).is_none());
    }

    #[test]
    fn test_numeric_record_key_matches_cell_text() {
        let row = SinkRow {
            row: 3,
            cells: Record::new().with("unit", "5"),
        };
        let record = Record::new().with("unit", 5);
        let keys = fields(&["unit"]);
        assert_eq!(
            PrimaryKey::from_row(&row, &keys),
            PrimaryKey::from_record(&record, &keys)
        );
    }
}
