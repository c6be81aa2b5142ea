use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::grid::GridBounds;
use crate::reconcile::SyncOptions;
use crate::sort::{SortDirection, SortSpec};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sink: SinkConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// `"sheets"` or `"file"`.
    pub kind: String,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_row")]
    pub max_row: usize,
    #[serde(default = "default_max_col")]
    pub max_col: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_token_env() -> String {
    "SHEETS_TOKEN".to_string()
}
fn default_max_row() -> usize {
    999
}
fn default_max_col() -> usize {
    26
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl SinkConfig {
    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.max_row, self.max_col)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub possible_headers: Vec<String>,
    #[serde(default = "default_upsert")]
    pub upsert: bool,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default = "default_sort_descending")]
    pub sort_descending: bool,
}

fn default_upsert() -> bool {
    true
}
fn default_sort_descending() -> bool {
    true
}

impl SyncConfig {
    pub fn sort_spec(&self) -> Option<SortSpec> {
        let direction = if self.sort_descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.sort_column
            .as_ref()
            .map(|column| SortSpec::new(column.clone(), direction))
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            key_fields: self.primary_keys.clone(),
            possible_headers: self.possible_headers.clone(),
            upsert: self.upsert,
            sort: self.sort_spec(),
        }
    }
}

/// Column limit of the A1 scheme we render (`ZZZ`).
const MAX_COLUMNS: usize = 18_278;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate bounds
    if config.sink.max_row == 0 {
        anyhow::bail!("sink.max_row must be > 0");
    }
    if config.sink.max_col == 0 || config.sink.max_col > MAX_COLUMNS {
        anyhow::bail!("sink.max_col must be in [1, {}]", MAX_COLUMNS);
    }

    match config.sink.kind.as_str() {
        "sheets" => {
            if config
                .sink
                .spreadsheet_id
                .as_deref()
                .map_or(true, str::is_empty)
            {
                anyhow::bail!("sink.spreadsheet_id must be specified when kind is 'sheets'");
            }
        }
        "file" => {
            if config.sink.path.is_none() {
                anyhow::bail!("sink.path must be specified when kind is 'file'");
            }
        }
        other => anyhow::bail!("Unknown sink kind: '{}'. Must be sheets or file.", other),
    }

    // Validate sync
    if config.sync.primary_keys.is_empty() {
        anyhow::bail!("sync.primary_keys must list at least one field");
    }
    if config.sync.primary_keys.iter().any(|k| k.trim().is_empty()) {
        anyhow::bail!("sync.primary_keys must not contain empty names");
    }

    Ok(())
}
