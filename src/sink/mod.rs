//! Grid access backends.
//!
//! The [`GridSink`] trait is the thin layer between the reconciliation
//! engine and the spreadsheet it writes into. It knows nothing about
//! headers or keys; it fetches cells, writes rectangles, appends rows and
//! sorts ranges.
//!
//! Implementations:
//! - **[`SheetsSink`]**: Google Sheets v4 REST API with retry and backoff.
//! - **[`FileSink`]**: a grid persisted as JSON on disk, for local runs.
//! - **[`MemorySink`]**: an in-process grid with sheet-like append and
//!   sort behaviour, used by tests and as the engine behind `FileSink`.
//!
//! # Provider Selection
//!
//! Use [`create_sink`] to instantiate the backend named by `sink.kind`.

mod file;
mod memory;
mod sheets;

pub use file::FileSink;
pub use memory::MemorySink;
pub use sheets::SheetsSink;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::SinkConfig;
use crate::grid::{CellRef, Grid, GridBounds, RangeWrite, SortRange};

/// An external, human-editable grid.
///
/// No call is retried or made atomic by the engine; whatever guarantees a
/// single request gets are the backend's own.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`fetch`](GridSink::fetch) | Read all non-empty cells within [`bounds`](GridSink::bounds) |
/// | [`batch_write`](GridSink::batch_write) | Overwrite several regions in one request |
/// | [`append`](GridSink::append) | Add rows below the data block containing an anchor |
/// | [`sort`](GridSink::sort) | Reorder rows of a range by one column |
#[async_trait]
pub trait GridSink: Send + Sync {
    /// Short backend label for logs (e.g. `"sheets"`).
    fn name(&self) -> &str;

    /// The region this sink fetches and sorts within.
    fn bounds(&self) -> GridBounds;

    /// Returns every row of the bounded region. Trailing empty cells and
    /// rows may be omitted, so rows are ragged.
    ///
    /// Fails if the region holds no data at all.
    async fn fetch(&self) -> Result<Grid>;

    /// Overwrites each region starting at its top-left cell. Values are
    /// written verbatim; formulas are interpreted by the sheet.
    async fn batch_write(&self, writes: &[RangeWrite]) -> Result<()>;

    /// Appends `rows` beneath the contiguous block of data that includes
    /// `anchor`, starting in `anchor`'s column. If `anchor` is empty the
    /// rows start there.
    async fn append(&self, anchor: CellRef, rows: &[Vec<Value>]) -> Result<()>;

    /// Reorders the rows of `range` by the cells in `column` (an absolute
    /// column index). Blank cells sort last in either direction.
    async fn sort(&self, range: SortRange, column: usize, ascending: bool) -> Result<()>;
}

/// Creates the sink described by `config`.
pub fn create_sink(config: &SinkConfig) -> Result<Box<dyn GridSink>> {
    match config.kind.as_str() {
        "sheets" => Ok(Box::new(SheetsSink::new(config)?)),
        "file" => {
            let Some(path) = config.path.as_ref() else {
                bail!("sink.path required for file sink");
            };
            Ok(Box::new(FileSink::open(path, config.bounds())?))
        }
        other => bail!("Unknown sink kind: {}", other),
    }
}
