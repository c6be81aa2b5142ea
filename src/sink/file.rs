//! A grid persisted as JSON on disk.
//!
//! The file holds a JSON array of rows, each an array of cell strings.
//! Operations run against a [`MemorySink`] and the whole grid is written
//! back after every mutating call.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{GridSink, MemorySink};
use crate::grid::{CellRef, Grid, GridBounds, RangeWrite, SortRange};

pub struct FileSink {
    path: PathBuf,
    inner: MemorySink,
}

impl FileSink {
    /// Loads the grid at `path`. A missing file is an empty grid.
    pub fn open(path: &Path, bounds: GridBounds) -> Result<Self> {
        let grid = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read grid file: {}", path.display()))?;
            serde_json::from_str::<Grid>(&content)
                .with_context(|| format!("Failed to parse grid file: {}", path.display()))?
        } else {
            Grid::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemorySink::from_grid(grid, bounds),
        })
    }

    fn persist(&self) -> Result<()> {
        let grid = self.inner.snapshot()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&grid)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write grid file: {}", self.path.display()))
    }
}

#[async_trait]
impl GridSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn bounds(&self) -> GridBounds {
        self.inner.bounds()
    }

    async fn fetch(&self) -> Result<Grid> {
        self.inner
            .fetch()
            .await
            .with_context(|| format!("grid file {}", self.path.display()))
    }

    async fn batch_write(&self, writes: &[RangeWrite]) -> Result<()> {
        self.inner.batch_write(writes).await?;
        self.persist()
    }

    async fn append(&self, anchor: CellRef, rows: &[Vec<Value>]) -> Result<()> {
        self.inner.append(anchor, rows).await?;
        self.persist()
    }

    async fn sort(&self, range: SortRange, column: usize, ascending: bool) -> Result<()> {
        self.inner.sort(range, column, ascending).await?;
        self.persist()
    }
}
