//! Header row discovery.
//!
//! The header row is found heuristically: the first row containing *any*
//! cell that matches *any* expected header name. The whole row then becomes
//! the column layout, so columns people added by hand (notes, manual
//! scores) can be read and updated like the ones the producer knows about.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::grid::Grid;

/// Normalizes a header for comparison: lowercase, trimmed, spaces to
/// underscores. `" Current Price "` → `"current_price"`.
pub fn sanitize_header(raw: &str) -> String {
    raw.to_lowercase().trim().replace(' ', "_")
}

/// The discovered column layout of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMap {
    row: usize,
    columns: Vec<(String, usize)>,
}

impl HeaderMap {
    /// Builds a map from the cells of a header row. Empty cells are skipped.
    /// When two cells sanitize to the same name the later column wins and
    /// keeps the earlier entry's position.
    pub fn from_row(row: usize, cells: &[String]) -> Self {
        let mut columns: Vec<(String, usize)> = Vec::new();
        for (col, cell) in cells.iter().enumerate() {
            let name = sanitize_header(cell);
            if name.is_empty() {
                continue;
            }
            match columns.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => {
                    warn!(
                        header = %name,
                        first = entry.1,
                        second = col,
                        "duplicate sheet header, using the later column"
                    );
                    entry.1 = col;
                }
                None => columns.push((name, col)),
            }
        }
        Self { row, columns }
    }

    /// Index of the header row in the grid.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, col)| *col)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// `(name, column)` pairs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), *c))
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn min_col(&self) -> Option<usize> {
        self.columns.iter().map(|(_, c)| *c).min()
    }

    pub fn max_col(&self) -> Option<usize> {
        self.columns.iter().map(|(_, c)| *c).max()
    }
}

/// Scans `grid` top to bottom for the header row.
///
/// `expected` holds the header names the producer can emit; they are
/// sanitized before comparison.
///
/// # Errors
///
/// [`SyncError::HeaderNotFound`] if no cell anywhere matches.
pub fn locate_header(grid: &Grid, expected: &[String]) -> Result<HeaderMap, SyncError> {
    let wanted: Vec<String> = expected.iter().map(|h| sanitize_header(h)).collect();

    for (i, row) in grid.rows().iter().enumerate() {
        let hit = row
            .iter()
            .map(|cell| sanitize_header(cell))
            .any(|cell| !cell.is_empty() && wanted.contains(&cell));
        if hit {
            let headers = HeaderMap::from_row(i, row);
            debug!(row = i, headers = ?headers.names(), "located header row");
            return Ok(headers);
        }
    }

    Err(SyncError::HeaderNotFound {
        expected: expected.to_vec(),
        grid: grid.dump(),
    })
}
