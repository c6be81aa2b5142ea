//! # Sheet Sync
//!
//! Reconcile canonical records into a human-edited spreadsheet.
//!
//! The sink is a grid the writer does not own: the header row may move,
//! columns may be reordered, and people add their own annotation columns.
//! Sheet Sync discovers the current layout on every run, matches records to
//! existing rows by a composite primary key, writes only the cells a record
//! mentions, appends the rest, and re-sorts the data block afterwards.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────────┐   ┌───────────┐
//! │ Records  │──▶│ Session (one fetch per run)   │──▶│ GridSink  │
//! │ (JSON)   │   │ header ─▶ index ─▶ plan        │   │ Sheets/   │
//! └──────────┘   └──────────────┬────────────────┘   │ File/Mem  │
//!                               ▼                    └───────────┘
//!                 batch_write ─▶ append ─▶ sort
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sheetsync headers                        # show the discovered layout
//! sheetsync get                            # read rows back as JSON
//! sheetsync sync listings.json --dry-run   # print the write plan
//! sheetsync sync listings.json --sort score
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`grid`] | Raw grid snapshots and A1 coordinates |
//! | [`record`] | Canonical records and cell values |
//! | [`header`] | Header row discovery |
//! | [`index`] | Keyed rows and primary-key index |
//! | [`session`] | One-run snapshot of the sink |
//! | [`reconcile`] | Update-or-append planning and execution |
//! | [`append`] | Header-aligned row construction |
//! | [`sort`] | Post-write re-sorting |
//! | [`sink`] | Grid access backends |
//! | [`error`] | Reconciliation error taxonomy |
//! | [`commands`] | `sheetsync` subcommand implementations |

pub mod append;
pub mod commands;
pub mod config;
pub mod error;
pub mod grid;
pub mod header;
pub mod index;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod sink;
pub mod sort;
