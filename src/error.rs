//! Error taxonomy for a reconciliation run.
//!
//! Every variant is fatal to the run. Record-level errors are raised while
//! planning, before anything is written. [`SyncError::Sink`] carries the
//! write phase it failed in, so callers can tell which earlier phases were
//! already applied to the sink.

use std::fmt;

use thiserror::Error;

use crate::index::PrimaryKey;

/// The sink operation a transport error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Update,
    Append,
    Sort,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Update => "update",
            Phase::Append => "append",
            Phase::Sort => "sort",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// No expected header name matched any cell of the fetched grid.
    #[error("could not find any of these headers {expected:?} in existing sheet: {grid}")]
    HeaderNotFound { expected: Vec<String>, grid: String },

    /// A record supplied none of the configured primary-key fields.
    #[error("record {record} sets none of the primary key fields {fields:?}")]
    MissingPrimaryKey { record: usize, fields: Vec<String> },

    /// Upsert is disabled and the record's key matches no existing row.
    #[error("record {record} with key {key} matches no existing row and upsert is disabled")]
    UnknownRecord { record: usize, key: PrimaryKey },

    /// Update path: no non-key field of the record is a sheet column.
    #[error("record {record} has no non-key fields matching the sheet headers")]
    NoUpdatableColumns { record: usize },

    /// Append path: the record populates none of the sheet columns.
    #[error("did not find any of the sheet's headers {headers:?} populated in record {record}")]
    NoMatchingColumns { record: usize, headers: Vec<String> },

    #[error("sort column '{column}' is not one of the sheet headers")]
    UnknownSortColumn { column: String },

    /// Transport or sink failure, passed through unchanged.
    #[error("sink {phase} failed: {source}")]
    Sink {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub(crate) fn sink(phase: Phase) -> impl FnOnce(anyhow::Error) -> SyncError {
        move |source| SyncError::Sink { phase, source }
    }
}
