//! Header-aligned row construction for appends.
//!
//! New rows span the header's column band, `min_col..=max_col`, with each
//! record value placed under its header and everything else left empty.
//! The rows are appended in one call anchored at the first data row of the
//! band's leftmost column; the sink places them below the existing block.

use serde_json::Value;

use crate::error::SyncError;
use crate::grid::CellRef;
use crate::header::HeaderMap;
use crate::record::{is_blank, Record};

/// Where appended rows are anchored: the row under the header, in the
/// header's leftmost column.
pub fn append_anchor(headers: &HeaderMap) -> CellRef {
    CellRef::new(headers.row() + 1, headers.min_col().unwrap_or(0))
}

/// Builds the row for one record.
///
/// `position` is the record's index in the input batch, which is what
/// errors report.
///
/// # Errors
///
/// [`SyncError::NoMatchingColumns`] if the row would have no populated
/// cell.
pub fn build_append_row(
    headers: &HeaderMap,
    position: usize,
    record: &Record,
) -> Result<Vec<Value>, SyncError> {
    let no_match = || SyncError::NoMatchingColumns {
        record: position,
        headers: headers.names(),
    };
    let (Some(min_col), Some(max_col)) = (headers.min_col(), headers.max_col()) else {
        return Err(no_match());
    };

    let mut row = vec![Value::String(String::new()); max_col - min_col + 1];
    let mut populated = 0;
    for (name, col) in headers.iter() {
        if let Some(value) = record.get_sanitized(name).filter(|v| !is_blank(v)) {
            row[col - min_col] = value.clone();
            populated += 1;
        }
    }
    if populated == 0 {
        return Err(no_match());
    }
    Ok(row)
}
