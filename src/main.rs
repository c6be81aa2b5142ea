//! # Sheet Sync CLI (`sheetsync`)
//!
//! Reconciles batches of keyed records into a human-edited spreadsheet:
//! existing rows are updated cell by cell, new records are appended below
//! the table, and the data rows are optionally re-sorted.
//!
//! ## Usage
//!
//! ```bash
//! sheetsync --config ./config/sheetsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sheetsync headers` | Show the located header row and its columns |
//! | `sheetsync get` | Print the data rows as JSON or TSV |
//! | `sheetsync sync <records.json>` | Update and append records |
//! | `sheetsync sort <column>` | Re-sort the data rows by a header |
//!
//! ## Examples
//!
//! ```bash
//! # Preview what a batch would change
//! sheetsync sync listings.json --dry-run
//!
//! # Apply it, newest first by score
//! sheetsync sync listings.json --sort score
//!
//! # Update existing rows only
//! sheetsync sync listings.json --no-upsert
//! ```
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sheet_sync::commands::{self, GetFormat, SyncArgs};
use sheet_sync::config;

/// Keyed record reconciliation into a spreadsheet.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sheetsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sheetsync",
    about = "Reconcile keyed records into a human-edited spreadsheet",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sheetsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the located header row.
    ///
    /// Uses `sync.possible_headers`, or `sync.primary_keys` when that is
    /// empty, to find the row.
    Headers,

    /// Print every non-blank data row.
    Get {
        /// Output format: `json` or `tsv`.
        #[arg(long, default_value = "json")]
        format: GetFormat,
    },

    /// Reconcile a JSON array of records into the sheet.
    ///
    /// Matching rows are updated in place, only in columns the record
    /// carries. Unmatched records are appended unless `--no-upsert` is set,
    /// in which case they fail the whole batch before anything is written.
    Sync {
        /// Records file (JSON array of objects), or `-` for stdin.
        records: PathBuf,

        /// Print the planned writes and exit without touching the sheet.
        #[arg(long)]
        dry_run: bool,

        /// Fail on records with no matching row instead of appending them.
        #[arg(long)]
        no_upsert: bool,

        /// Sort data rows by this header afterwards (overrides config).
        #[arg(long)]
        sort: Option<String>,

        /// Sort ascending instead of descending.
        #[arg(long, requires = "sort")]
        ascending: bool,
    },

    /// Sort the data rows by a header column.
    Sort {
        /// Header name to sort by.
        column: String,

        /// Sort ascending instead of descending.
        #[arg(long)]
        ascending: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Headers => {
            commands::run_headers(&cfg).await?;
        }
        Commands::Get { format } => {
            commands::run_get(&cfg, format).await?;
        }
        Commands::Sync {
            records,
            dry_run,
            no_upsert,
            sort,
            ascending,
        } => {
            let args = SyncArgs {
                dry_run,
                no_upsert,
                sort,
                ascending,
            };
            commands::run_sync(&cfg, &records, args).await?;
        }
        Commands::Sort { column, ascending } => {
            commands::run_sort(&cfg, &column, ascending).await?;
        }
    }

    Ok(())
}
