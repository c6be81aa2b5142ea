//! Google Sheets v4 REST backend.
//!
//! Talks to `https://sheets.googleapis.com/v4/spreadsheets/{id}` with a
//! bearer token read from the environment variable named by
//! `sink.token_env`. Obtaining and refreshing that token is left to the
//! caller (e.g. `gcloud auth print-access-token` or a service account
//! helper).
//!
//! Values are sent with `valueInputOption=USER_ENTERED`, so formulas such
//! as `=HYPERLINK("url", "text")` are interpreted by the sheet.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) → retry
//! - HTTP 5xx (server error) and network errors → retry, except for
//!   `values:append`, which may already have been applied
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use tracing::debug;

use super::GridSink;
use crate::config::SinkConfig;
use crate::grid::{CellRef, Grid, GridBounds, RangeWrite, SortRange};
use crate::record::cell_text;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

pub struct SheetsSink {
    client: reqwest::Client,
    spreadsheet_id: String,
    sheet_name: Option<String>,
    sheet_id: i64,
    token: String,
    bounds: GridBounds,
    max_retries: u32,
}

impl SheetsSink {
    /// Creates a sink from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `spreadsheet_id` is not set or the token
    /// environment variable is missing.
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| anyhow!("sink.spreadsheet_id required for sheets sink"))?;
        let token = std::env::var(&config.token_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.token_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            spreadsheet_id,
            sheet_name: config.sheet_name.clone(),
            sheet_id: config.sheet_id,
            token,
            bounds: config.bounds(),
            max_retries: config.max_retries,
        })
    }

    fn qualified(&self, a1: &str) -> String {
        qualify_range(self.sheet_name.as_deref(), a1)
    }

    /// `{base}/{id}/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid API base URL"))?
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        idempotent: bool,
    ) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if should_retry(Some(status), idempotent) {
                        debug!(%status, attempt, "sheets API transient error");
                        last_err = Some(anyhow!("Sheets API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("Sheets API error {}: {}", status, body_text);
                }
                Err(e) => {
                    if !should_retry(None, idempotent) {
                        return Err(e.into());
                    }
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Sheets request failed after retries")))
    }
}

#[async_trait]
impl GridSink for SheetsSink {
    fn name(&self) -> &str {
        "sheets"
    }

    fn bounds(&self) -> GridBounds {
        self.bounds
    }

    async fn fetch(&self) -> Result<Grid> {
        let range = self.qualified(&self.bounds.a1_range());
        let url = self.url(&["values", range.as_str()])?;
        let json = self
            .send(
                Method::GET,
                url,
                &[
                    ("valueRenderOption", "FORMATTED_VALUE"),
                    ("majorDimension", "ROWS"),
                ],
                None,
                true,
            )
            .await?;
        parse_values_response(&json, &range)
    }

    async fn batch_write(&self, writes: &[RangeWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let body = batch_update_body(self.sheet_name.as_deref(), writes);
        let url = self.url(&["values:batchUpdate"])?;
        self.send(Method::POST, url, &[], Some(&body), true).await?;
        Ok(())
    }

    async fn append(&self, anchor: CellRef, rows: &[Vec<Value>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = self.qualified(&anchor.to_a1());
        let segment = format!("{}:append", range);
        let url = self.url(&["values", segment.as_str()])?;
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        self.send(
            Method::POST,
            url,
            &[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", "OVERWRITE"),
            ],
            Some(&body),
            false,
        )
        .await?;
        Ok(())
    }

    async fn sort(&self, range: SortRange, column: usize, ascending: bool) -> Result<()> {
        // The spreadsheet-level batchUpdate lives at `{id}:batchUpdate`,
        // which is part of the id segment rather than a new one.
        let mut url = self.url(&[])?;
        let path = format!("{}:batchUpdate", url.path());
        url.set_path(&path);
        let body = sort_request_body(self.sheet_id, range, column, ascending);
        self.send(Method::POST, url, &[], Some(&body), true).await?;
        Ok(())
    }
}

/// Whether a failed request may be sent again. `status` is `None` for a
/// network error. A 429 was rejected before any work, so it is always safe;
/// otherwise the request may have been applied and only idempotent calls
/// are repeated.
pub(crate) fn should_retry(status: Option<StatusCode>, idempotent: bool) -> bool {
    match status {
        Some(status) if status == StatusCode::TOO_MANY_REQUESTS => true,
        Some(status) => status.is_server_error() && idempotent,
        None => idempotent,
    }
}

/// Prefixes an A1 range with a quoted sheet name: `'My Sheet'!A1:Z999`.
pub(crate) fn qualify_range(sheet_name: Option<&str>, a1: &str) -> String {
    match sheet_name {
        Some(name) if !name.is_empty() => format!("'{}'!{}", name.replace('\'', "''"), a1),
        _ => a1.to_string(),
    }
}

/// Parses a `values.get` response. A response without `values` means the
/// range is empty.
pub(crate) fn parse_values_response(json: &Value, range: &str) -> Result<Grid> {
    let Some(values) = json.get("values").and_then(Value::as_array) else {
        bail!("range {} is empty", range);
    };
    let rows: Vec<Vec<String>> = values
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect())
                .unwrap_or_default()
        })
        .collect();
    let grid = Grid::new(rows);
    if grid.is_empty() {
        bail!("range {} is empty", range);
    }
    Ok(grid)
}

/// The API skips `null` inputs and leaves the cell as it was; `""` clears it.
fn clearing_nulls(rows: &[Vec<Value>]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|v| match v {
                    Value::Null => Value::String(String::new()),
                    other => other.clone(),
                })
                .collect()
        })
        .collect()
}

pub(crate) fn batch_update_body(sheet_name: Option<&str>, writes: &[RangeWrite]) -> Value {
    let data: Vec<Value> = writes
        .iter()
        .map(|w| {
            json!({
                "range": qualify_range(sheet_name, &w.start.to_a1()),
                "majorDimension": "ROWS",
                "values": clearing_nulls(&w.rows),
            })
        })
        .collect();
    json!({
        "valueInputOption": VALUE_INPUT_OPTION,
        "data": data,
    })
}

pub(crate) fn sort_request_body(
    sheet_id: i64,
    range: SortRange,
    column: usize,
    ascending: bool,
) -> Value {
    json!({
        "requests": [{
            "sortRange": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": range.start_row,
                    "endRowIndex": range.end_row,
                    "startColumnIndex": range.start_col,
                    "endColumnIndex": range.end_col,
                },
                "sortSpecs": [{
                    "dimensionIndex": column,
                    "sortOrder": if ascending { "ASCENDING" } else { "DESCENDING" },
                }],
            }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        assert!(should_retry(Some(StatusCode::TOO_MANY_REQUESTS), true));
        assert!(should_retry(Some(StatusCode::TOO_MANY_REQUESTS), false));
        assert!(should_retry(Some(StatusCode::SERVICE_UNAVAILABLE), true));
        assert!(!should_retry(Some(StatusCode::SERVICE_UNAVAILABLE), false));
        assert!(!should_retry(Some(StatusCode::BAD_REQUEST), true));
        assert!(should_retry(None, true));
        assert!(!should_retry(None, false));
    }

    #[test]
    fn test_qualify_range() {
        assert_eq!(qualify_range(None, "A1:Z999"), "A1:Z999");
        assert_eq!(qualify_range(Some("Listings"), "B7"), "'Listings'!B7");
        assert_eq!(qualify_range(Some("Mark's"), "A1"), "'Mark''s'!A1");
        assert_eq!(qualify_range(Some(""), "A1"), "A1");
    }

    #[test]
    fn test_parse_values_response() {
        let json = json!({
            "range": "Sheet1!A1:Z999",
            "majorDimension": "ROWS",
            "values": [["Unit", "Score"], [], ["1", "70"]]
        });
        let grid = parse_values_response(&json, "A1:Z999").unwrap();
        assert_eq!(
            grid,
            Grid::from(vec![vec!["Unit", "Score"], vec![], vec!["1", "70"]])
        );
    }

    #[test]
    fn test_parse_values_response_empty() {
        let json = json!({ "range": "Sheet1!A1:Z999", "majorDimension": "ROWS" });
        let err = parse_values_response(&json, "A1:Z999").unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_batch_update_body() {
        let writes = vec![
            RangeWrite::cell(4, 2, json!("y")),
            RangeWrite::cell(7, 27, json!(12)),
        ];
        let body = batch_update_body(Some("Listings"), &writes);
        assert_eq!(body["valueInputOption"], "USER_ENTERED");
        assert_eq!(body["data"][0]["range"], "'Listings'!C5");
        assert_eq!(body["data"][0]["values"], json!([["y"]]));
        assert_eq!(body["data"][1]["range"], "'Listings'!AB8");
    }

    #[test]
    fn test_batch_update_body_clears_nulls() {
        let writes = vec![RangeWrite::cell(1, 1, Value::Null)];
        let body = batch_update_body(None, &writes);
        assert_eq!(body["data"][0]["values"], json!([[""]]));
    }

    #[test]
    fn test_sort_request_body() {
        let range = SortRange {
            start_row: 2,
            end_row: 999,
            start_col: 0,
            end_col: 26,
        };
        let body = sort_request_body(7, range, 4, false);
        let sort = &body["requests"][0]["sortRange"];
        assert_eq!(sort["range"]["sheetId"], 7);
        assert_eq!(sort["range"]["startRowIndex"], 2);
        assert_eq!(sort["range"]["endColumnIndex"], 26);
        assert_eq!(sort["sortSpecs"][0]["dimensionIndex"], 4);
        assert_eq!(sort["sortSpecs"][0]["sortOrder"], "DESCENDING");
    }
}
