//! Canonical records and cell values.
//!
//! A [`Record`] is one logical entity to sync, e.g. a scored listing. Field
//! names are the sanitized sheet headers they belong under; values are
//! already formatted exactly as they should appear in a cell (strings,
//! numbers, or opaque formulas such as `=HYPERLINK("url", "text")`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::header::sanitize_header;

/// An ordered field name → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Looks a field up by sanitized name, so `"Current Price"` and
    /// `"current_price"` both answer for `current_price`. The last matching
    /// field wins.
    pub fn get_sanitized(&self, sanitized: &str) -> Option<&Value> {
        self.fields
            .iter()
            .filter(|(name, _)| sanitize_header(name) == sanitized)
            .map(|(_, value)| value)
            .last()
    }

    /// Like [`get_sanitized`](Record::get_sanitized), but only non-blank
    /// values, rendered as cell text.
    pub fn text(&self, sanitized: &str) -> Option<String> {
        self.get_sanitized(sanitized)
            .filter(|v| !is_blank(v))
            .map(cell_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// A value that should leave its cell empty: `null` or `""`.
///
/// `0` and `false` are real values and do get written.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Renders a value the way the sheet displays it. Integral floats lose
/// their fraction (`5.0` → `5`) so record keys compare equal to fetched
/// cell text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        return format!("{}", f as i64);
                    }
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}
