//! Update-or-append reconciliation.
//!
//! A run has two halves. [`plan`] decides, against one [`Session`]
//! snapshot, what every record becomes: a set of single-cell writes on the
//! row it matches, or a new appended row. Every record-level error is
//! raised here, before the sink is touched. [`apply`] then issues at most
//! three calls in order: one batched cell update, one append, one sort.
//!
//! Only the cells a record mentions are written. Columns people fill in by
//! hand (manual scores, notes) survive every run untouched unless a record
//! explicitly sets them.
//!
//! There is no transaction across the three calls. If the append fails the
//! updates already issued stay applied; the [`SyncError::Sink`] phase says
//! how far the run got.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::append::{append_anchor, build_append_row};
use crate::error::{Phase, SyncError};
use crate::grid::{CellRef, RangeWrite};
use crate::header::sanitize_header;
use crate::index::PrimaryKey;
use crate::record::Record;
use crate::session::Session;
use crate::sink::GridSink;
use crate::sort::{issue_sort, resolve_sort, SortRequest, SortSpec};

/// Per-run settings supplied by the record producer.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Fields forming the composite primary key, in order.
    pub key_fields: Vec<String>,
    /// Every header name the producer can emit; seeds header discovery.
    /// When empty, the field names of the records are used instead.
    pub possible_headers: Vec<String>,
    /// Append records that match no row. When false such a record fails
    /// the run with [`SyncError::UnknownRecord`].
    pub upsert: bool,
    pub sort: Option<SortSpec>,
}

impl SyncOptions {
    pub fn new(key_fields: &[&str]) -> Self {
        Self {
            key_fields: key_fields.iter().map(|k| k.to_string()).collect(),
            possible_headers: Vec::new(),
            upsert: true,
            sort: None,
        }
    }

    pub fn with_possible_headers(mut self, headers: &[&str]) -> Self {
        self.possible_headers = headers.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Header names to search for: the configured set, else every field
    /// name across the batch, else the sort column.
    pub fn expected_headers(&self, records: &[Record]) -> Vec<String> {
        if !self.possible_headers.is_empty() {
            return self.possible_headers.clone();
        }
        let mut names: Vec<String> = Vec::new();
        for name in records.iter().flat_map(Record::keys) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        if names.is_empty() {
            if let Some(sort) = &self.sort {
                names.push(sort.column.clone());
            }
        }
        names
    }
}

/// One planned single-cell write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWrite {
    pub row: usize,
    pub col: usize,
    pub value: Value,
}

/// What a record turned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Matched the existing row `row`; `cells` cells were written.
    Updated { row: usize, cells: usize },
    /// Queued as the `position`-th appended row.
    Appended { position: usize },
}

/// Everything a run will write, decided before any write happens.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPlan {
    pub updates: Vec<CellWrite>,
    pub append_anchor: CellRef,
    pub appends: Vec<Vec<Value>>,
    pub sort: Option<SortRequest>,
    /// One entry per input record, in input order.
    pub outcomes: Vec<RecordOutcome>,
}

impl SyncPlan {
    pub fn updated_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Updated { .. }))
            .count()
    }
}

/// Classifies every record against the session snapshot.
///
/// # Errors
///
/// Fails on the first offending record, in input order:
/// - [`SyncError::MissingPrimaryKey`]: the record sets no key field.
/// - [`SyncError::UnknownRecord`]: no matching row and `upsert` is off.
/// - [`SyncError::NoUpdatableColumns`]: matched, but no non-key field is
///   a sheet column.
/// - [`SyncError::NoMatchingColumns`]: unmatched, and no field is a sheet
///   column.
///
/// A requested sort column is resolved here too, so
/// [`SyncError::UnknownSortColumn`] also fails before any write.
pub fn plan(
    session: &Session,
    records: &[Record],
    options: &SyncOptions,
) -> Result<SyncPlan, SyncError> {
    let headers = session.headers();
    let index = session.key_index(&options.key_fields);
    let key_names: Vec<String> = options
        .key_fields
        .iter()
        .map(|k| sanitize_header(k))
        .collect();

    let mut updates = Vec::new();
    let mut appends = Vec::new();
    let mut outcomes = Vec::with_capacity(records.len());

    for (position, record) in records.iter().enumerate() {
        let key = PrimaryKey::from_record(record, &options.key_fields).ok_or_else(|| {
            SyncError::MissingPrimaryKey {
                record: position,
                fields: options.key_fields.clone(),
            }
        })?;

        match index.get(&key) {
            Some(row) => {
                let before = updates.len();
                for (field, value) in record.iter() {
                    let name = sanitize_header(field);
                    if key_names.contains(&name) {
                        continue;
                    }
                    if let Some(col) = headers.column(&name) {
                        updates.push(CellWrite {
                            row,
                            col,
                            value: value.clone(),
                        });
                    }
                }
                let cells = updates.len() - before;
                if cells == 0 {
                    return Err(SyncError::NoUpdatableColumns { record: position });
                }
                outcomes.push(RecordOutcome::Updated { row, cells });
            }
            None if !options.upsert => {
                return Err(SyncError::UnknownRecord {
                    record: position,
                    key,
                });
            }
            None => {
                appends.push(build_append_row(headers, position, record)?);
                outcomes.push(RecordOutcome::Appended {
                    position: appends.len() - 1,
                });
            }
        }
    }

    let sort = options
        .sort
        .as_ref()
        .map(|spec| resolve_sort(headers, session.bounds(), spec))
        .transpose()?;

    Ok(SyncPlan {
        updates,
        append_anchor: append_anchor(headers),
        appends,
        sort,
        outcomes,
    })
}

/// Issues a plan: batched cell update, then append, then sort. Empty
/// phases are skipped.
pub async fn apply(sink: &dyn GridSink, plan: &SyncPlan) -> Result<(), SyncError> {
    if !plan.updates.is_empty() {
        let writes: Vec<RangeWrite> = plan
            .updates
            .iter()
            .map(|w| RangeWrite::cell(w.row, w.col, w.value.clone()))
            .collect();
        sink.batch_write(&writes)
            .await
            .map_err(SyncError::sink(Phase::Update))?;
        info!(
            rows = plan.updated_rows(),
            cells = writes.len(),
            "updated existing rows"
        );
    }

    if !plan.appends.is_empty() {
        sink.append(plan.append_anchor, &plan.appends)
            .await
            .map_err(SyncError::sink(Phase::Append))?;
        info!(
            rows = plan.appends.len(),
            anchor = %plan.append_anchor.to_a1(),
            "appended new rows"
        );
    }

    if let Some(request) = &plan.sort {
        issue_sort(sink, request).await?;
    }

    Ok(())
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: usize,
    pub updated_rows: usize,
    pub cells_written: usize,
    pub appended_rows: usize,
    pub sorted: bool,
    pub outcomes: Vec<RecordOutcome>,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>, plan: &SyncPlan) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            records: plan.outcomes.len(),
            updated_rows: plan.updated_rows(),
            cells_written: plan.updates.len(),
            appended_rows: plan.appends.len(),
            sorted: plan.sort.is_some(),
            outcomes: plan.outcomes.clone(),
        }
    }
}

/// Opens a session on the sink and plans `records` against it without
/// writing anything.
///
/// An empty batch with no sort has nothing to look for, so the sink is not
/// fetched and the plan is empty.
pub async fn prepare(
    sink: &dyn GridSink,
    records: &[Record],
    options: &SyncOptions,
) -> Result<SyncPlan, SyncError> {
    let expected = options.expected_headers(records);
    if expected.is_empty() {
        info!("no records and nothing to sort; skipping run");
        return Ok(SyncPlan::default());
    }

    let session = Session::open(sink, &expected).await?;
    let plan = plan(&session, records, options)?;
    info!(
        records = records.len(),
        updates = plan.updated_rows(),
        appends = plan.appends.len(),
        "planned sync"
    );
    Ok(plan)
}

/// Synchronizes `records` into the sink: opens a session, plans, applies.
pub async fn reconcile(
    sink: &dyn GridSink,
    records: &[Record],
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let started_at = Utc::now();
    let plan = prepare(sink, records, options).await?;
    apply(sink, &plan).await?;
    Ok(SyncReport::new(started_at, &plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, GridBounds};
    use serde_json::json;

    fn session(rows: Vec<Vec<&str>>, expected: &str) -> Session {
        Session::from_grid(
            Grid::from(rows),
            &[expected.to_string()],
            GridBounds::default(),
        )
        .unwrap()
    }

    fn base() -> Session {
        session(
            vec![vec!["primary_key", "colA", "colB"], vec!["1", "x"]],
            "primary_key",
        )
    }

    #[test]
    fn test_update_touches_only_mentioned_cell() {
        let records = vec![Record::new().with("primary_key", "1").with("colB", "y")];
        let plan = plan(&base(), &records, &SyncOptions::new(&["primary_key"])).unwrap();
        assert_eq!(
            plan.updates,
            vec![CellWrite {
                row: 1,
                col: 2,
                value: json!("y"),
            }]
        );
        assert!(plan.appends.is_empty());
        assert_eq!(plan.outcomes, vec![RecordOutcome::Updated { row: 1, cells: 1 }]);
    }

    #[test]
    fn test_null_clears_existing_cell() {
        let records = vec![Record::new()
            .with("primary_key", "1")
            .with("colA", Value::Null)];
        let plan = plan(&base(), &records, &SyncOptions::new(&["primary_key"])).unwrap();
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].col, 1);
        assert!(plan.updates[0].value.is_null());
    }

    #[test]
    fn test_unknown_key_appends_with_upsert() {
        let records = vec![Record::new().with("primary_key", "9").with("colB", "z")];
        let plan = plan(&base(), &records, &SyncOptions::new(&["primary_key"])).unwrap();
        assert!(plan.updates.is_empty());
        assert_eq!(plan.appends, vec![vec![json!("9"), json!(""), json!("z")]]);
        assert_eq!(plan.append_anchor, CellRef::new(1, 0));
        assert_eq!(plan.outcomes, vec![RecordOutcome::Appended { position: 0 }]);
    }

    #[test]
    fn test_unknown_key_fails_without_upsert() {
        let records = vec![Record::new().with("primary_key", "9").with("colB", "z")];
        let options = SyncOptions::new(&["primary_key"]).with_upsert(false);
        let err = plan(&base(), &records, &options).unwrap_err();
        match err {
            SyncError::UnknownRecord { record, key } => {
                assert_eq!(record, 0);
                assert_eq!(key, PrimaryKey::new(vec![Some("9".to_string())]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_key_fails_regardless_of_upsert() {
        let records = vec![
            Record::new().with("primary_key", "1").with("colA", "ok"),
            Record::new().with("colA", "no key"),
        ];
        for upsert in [true, false] {
            let options = SyncOptions::new(&["primary_key"]).with_upsert(upsert);
            let err = plan(&base(), &records, &options).unwrap_err();
            assert!(matches!(err, SyncError::MissingPrimaryKey { record: 1, .. }));
        }
    }

    #[test]
    fn test_key_only_update_has_no_updatable_columns() {
        let records = vec![Record::new()
            .with("primary_key", "1")
            .with("unrelated", "v")];
        let err = plan(&base(), &records, &SyncOptions::new(&["primary_key"])).unwrap_err();
        assert!(matches!(err, SyncError::NoUpdatableColumns { record: 0 }));
    }

    #[test]
    fn test_errors_follow_input_order() {
        // The key column is not in the sheet, so the first record cannot be
        // placed anywhere; the second has no key at all.
        let records = vec![
            Record::new().with("unit", "7").with("elsewhere", "v"),
            Record::new().with("colA", "no key"),
        ];
        let err = plan(&base(), &records, &SyncOptions::new(&["unit"])).unwrap_err();
        assert!(matches!(err, SyncError::NoMatchingColumns { record: 0, .. }));
    }

    #[test]
    fn test_composite_key_with_missing_slot() {
        let s = session(
            vec![
                vec!["unit", "address", "zipcode", "price"],
                vec!["", "4 Oak", "98107", "1800"],
                vec!["2", "4 Oak", "98107", "2100"],
            ],
            "address",
        );
        let options = SyncOptions::new(&["unit", "address", "zipcode"]);
        let records = vec![Record::new()
            .with("address", "4 Oak")
            .with("zipcode", "98107")
            .with("price", 1750)];
        let plan = plan(&s, &records, &options).unwrap();
        assert_eq!(
            plan.updates,
            vec![CellWrite {
                row: 1,
                col: 3,
                value: json!(1750),
            }]
        );
    }

    #[tokio::test]
    async fn test_prepare_empty_batch_skips_fetch() {
        // An empty sink fails any fetch
        let sink = crate::sink::MemorySink::default();
        let plan = prepare(&sink, &[], &SyncOptions::new(&["primary_key"]))
            .await
            .unwrap();
        assert_eq!(plan, SyncPlan::default());
        assert!(plan.outcomes.is_empty());
    }

    #[test]
    fn test_sort_resolved_before_writes() {
        let options = SyncOptions::new(&["primary_key"]).with_sort(SortSpec::descending("rating"));
        let records = vec![Record::new().with("primary_key", "1").with("colA", "v")];
        let err = plan(&base(), &records, &options).unwrap_err();
        assert!(matches!(err, SyncError::UnknownSortColumn { .. }));
    }

    #[test]
    fn test_expected_headers_fallback() {
        let records = vec![
            Record::new().with("unit", 1).with("score", 3),
            Record::new().with("unit", 2).with("notes", "x"),
        ];
        let options = SyncOptions::new(&["unit"]);
        assert_eq!(
            options.expected_headers(&records),
            vec!["unit", "score", "notes"]
        );
        let options = options.with_possible_headers(&["unit", "address"]);
        assert_eq!(options.expected_headers(&records), vec!["unit", "address"]);
        let options = SyncOptions::new(&["unit"]).with_sort(SortSpec::descending("score"));
        assert_eq!(options.expected_headers(&[]), vec!["score"]);
    }
}
