//! Post-write re-sorting.
//!
//! Appended rows always land at the physical bottom of the data block, and
//! a sheet's own sort does not persist across appends, so the data region is
//! re-sorted explicitly after each write batch.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::error::{Phase, SyncError};
use crate::grid::{GridBounds, SortRange};
use crate::header::{sanitize_header, HeaderMap};
use crate::session::Session;
use crate::sink::GridSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        self == SortDirection::Ascending
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("ascending"),
            SortDirection::Descending => f.write_str("descending"),
        }
    }
}

/// Which column to sort by, and which way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Descending)
    }
}

/// A sort resolved against a concrete header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortRequest {
    pub range: SortRange,
    pub column: usize,
    pub direction: SortDirection,
}

/// Resolves the sort column and the region to sort: every row from the one
/// under the header down to `max_row`, across all columns.
///
/// # Errors
///
/// [`SyncError::UnknownSortColumn`] if the column is not a header.
pub fn resolve_sort(
    headers: &HeaderMap,
    bounds: GridBounds,
    spec: &SortSpec,
) -> Result<SortRequest, SyncError> {
    let column = headers
        .column(&sanitize_header(&spec.column))
        .ok_or_else(|| SyncError::UnknownSortColumn {
            column: spec.column.clone(),
        })?;
    Ok(SortRequest {
        range: SortRange {
            start_row: headers.row() + 1,
            end_row: bounds.max_row,
            start_col: 0,
            end_col: bounds.max_col,
        },
        column,
        direction: spec.direction,
    })
}

pub(crate) async fn issue_sort(sink: &dyn GridSink, request: &SortRequest) -> Result<(), SyncError> {
    sink.sort(
        request.range,
        request.column,
        request.direction.is_ascending(),
    )
    .await
    .map_err(SyncError::sink(Phase::Sort))?;
    info!(
        column = request.column,
        direction = %request.direction,
        "sorted data rows"
    );
    Ok(())
}

/// Re-sorts the session's data rows by `spec` in one sink call.
pub async fn sort_by_column(
    sink: &dyn GridSink,
    session: &Session,
    spec: &SortSpec,
) -> Result<SortRequest, SyncError> {
    let request = resolve_sort(session.headers(), session.bounds(), spec)?;
    issue_sort(sink, &request).await?;
    Ok(request)
}

/// Orders two non-blank cells the way a spreadsheet does: numbers before
/// text, numbers by value, text case-insensitively.
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}
