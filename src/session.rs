//! One-run snapshot of the sink.
//!
//! A [`Session`] is opened with a single fetch and holds the grid and its
//! header layout for exactly one reconciliation run. Every decision in the
//! run is made against this snapshot; nothing is cached across runs.

use tracing::info;

use crate::error::{Phase, SyncError};
use crate::grid::{Grid, GridBounds};
use crate::header::{locate_header, HeaderMap};
use crate::index::{smart_get, KeyIndex, SinkRow};
use crate::sink::GridSink;

#[derive(Debug, Clone)]
pub struct Session {
    grid: Grid,
    headers: HeaderMap,
    bounds: GridBounds,
}

impl Session {
    /// Fetches the sink and locates its header row.
    pub async fn open(sink: &dyn GridSink, expected: &[String]) -> Result<Self, SyncError> {
        let grid = sink.fetch().await.map_err(SyncError::sink(Phase::Fetch))?;
        let session = Self::from_grid(grid, expected, sink.bounds())?;
        info!(
            sink = sink.name(),
            rows = session.grid.len(),
            header_row = session.headers.row(),
            columns = session.headers.len(),
            "opened session"
        );
        Ok(session)
    }

    /// Builds a session over an already-fetched grid.
    pub fn from_grid(
        grid: Grid,
        expected: &[String],
        bounds: GridBounds,
    ) -> Result<Self, SyncError> {
        let headers = locate_header(&grid, expected)?;
        Ok(Self {
            grid,
            headers,
            bounds,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// The data rows below the header, keyed by column name.
    pub fn rows(&self) -> Vec<SinkRow> {
        smart_get(&self.grid, &self.headers)
    }

    pub fn key_index(&self, key_fields: &[String]) -> KeyIndex {
        KeyIndex::build(&self.rows(), key_fields)
    }
}
