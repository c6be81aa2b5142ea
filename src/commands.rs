//! CLI command implementations.
//!
//! Each `run_*` function backs one `sheetsync` subcommand. Machine-readable
//! output (JSON, TSV) goes to stdout; progress goes to the log on stderr.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

use crate::config::Config;
use crate::grid::column_letters;
use crate::reconcile::{prepare, reconcile};
use crate::record::Record;
use crate::session::Session;
use crate::sink::create_sink;
use crate::sort::{sort_by_column, SortDirection, SortSpec};

/// Output format for `sheetsync get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetFormat {
    Json,
    Tsv,
}

impl std::str::FromStr for GetFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(GetFormat::Json),
            "tsv" => Ok(GetFormat::Tsv),
            other => bail!("Unknown format: '{}'. Must be json or tsv.", other),
        }
    }
}

/// Overrides for `sheetsync sync` on top of the `[sync]` config table.
#[derive(Debug, Default)]
pub struct SyncArgs {
    pub dry_run: bool,
    pub no_upsert: bool,
    pub sort: Option<String>,
    pub ascending: bool,
}

fn header_seed(config: &Config) -> Vec<String> {
    if config.sync.possible_headers.is_empty() {
        config.sync.primary_keys.clone()
    } else {
        config.sync.possible_headers.clone()
    }
}

/// Reads a JSON array of records from a file, or stdin for `-`.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read records from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {}", path.display()))?
    };
    serde_json::from_str(&content).context("Records must be a JSON array of objects")
}

/// Prints the located header row and its column layout.
pub async fn run_headers(config: &Config) -> Result<()> {
    let sink = create_sink(&config.sink)?;
    let session = Session::open(sink.as_ref(), &header_seed(config)).await?;
    let headers = session.headers();

    println!("Header row: {}", headers.row() + 1);
    for (name, col) in headers.iter() {
        println!("  {:<4} {}", column_letters(col), name);
    }
    Ok(())
}

/// Reads the data rows back in keyed form.
pub async fn run_get(config: &Config, format: GetFormat) -> Result<()> {
    let sink = create_sink(&config.sink)?;
    let session = Session::open(sink.as_ref(), &header_seed(config)).await?;
    let rows = session.rows();

    match format {
        GetFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        GetFormat::Tsv => {
            let names = session.headers().names();
            println!("{}", names.join("\t"));
            for row in &rows {
                let line: Vec<&str> = names
                    .iter()
                    .map(|n| row.get(n).unwrap_or(""))
                    .collect();
                println!("{}", line.join("\t"));
            }
        }
    }
    eprintln!("{} rows", rows.len());
    Ok(())
}

/// Reconciles a batch of records into the sink, or prints the plan with
/// `--dry-run`.
pub async fn run_sync(config: &Config, records_path: &Path, args: SyncArgs) -> Result<()> {
    let records = load_records(records_path)?;
    let mut options = config.sync.options();
    if args.no_upsert {
        options.upsert = false;
    }
    if let Some(column) = args.sort {
        let direction = if args.ascending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        options.sort = Some(SortSpec::new(column, direction));
    }

    let sink = create_sink(&config.sink)?;

    if args.dry_run {
        let plan = prepare(sink.as_ref(), &records, &options).await?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        eprintln!(
            "Dry run: {} cell updates across {} rows, {} appends",
            plan.updates.len(),
            plan.updated_rows(),
            plan.appends.len()
        );
        return Ok(());
    }

    let report = reconcile(sink.as_ref(), &records, &options).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Re-sorts the data rows without writing anything else.
pub async fn run_sort(config: &Config, column: &str, ascending: bool) -> Result<()> {
    let direction = if ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };
    let spec = SortSpec::new(column, direction);

    let sink = create_sink(&config.sink)?;
    let mut seed = header_seed(config);
    seed.push(column.to_string());
    let session = Session::open(sink.as_ref(), &seed).await?;
    let request = sort_by_column(sink.as_ref(), &session, &spec).await?;
    eprintln!(
        "Sorted rows {}..{} by column {} ({})",
        request.range.start_row + 1,
        request.range.end_row,
        column_letters(request.column),
        direction
    );
    Ok(())
}
