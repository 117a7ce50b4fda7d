//! Tabular results
//!
//! `TabularResult` is the one in-memory shape every source produces and every
//! transform consumes: ordered column metadata plus rows keyed by column name.

use super::datetime::parse_datetime;
use super::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single row, keyed by column name
pub type Row = HashMap<String, Value>;

/// Number of sample values kept per column
const SAMPLE_SIZE: usize = 3;

/// Inferred column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Datetime,
}

impl ColumnType {
    /// Infer a type from a column's values
    ///
    /// All non-null values numeric -> `Numeric`; all non-null values strings
    /// that parse as datetimes -> `Datetime`; everything else, including an
    /// empty or all-null column, is `Categorical`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut seen = 0usize;
        let mut numeric = true;
        let mut datetime = true;

        for value in values {
            match value {
                Value::Null => continue,
                Value::Number(_) => datetime = false,
                Value::String(s) => {
                    numeric = false;
                    if datetime && parse_datetime(s).is_none() {
                        datetime = false;
                    }
                }
                _ => {
                    numeric = false;
                    datetime = false;
                }
            }
            seen += 1;
            if !numeric && !datetime {
                return ColumnType::Categorical;
            }
        }

        match (seen, numeric, datetime) {
            (0, _, _) => ColumnType::Categorical,
            (_, true, _) => ColumnType::Numeric,
            (_, _, true) => ColumnType::Datetime,
            _ => ColumnType::Categorical,
        }
    }

    /// Map a declared database type name to a column type
    ///
    /// Returns `None` when the declaration says nothing useful (SQLite allows
    /// untyped columns).
    pub fn from_declared(declared: &str) -> Option<Self> {
        let lower = declared.to_lowercase();
        if lower.trim().is_empty() {
            return None;
        }
        if ["date", "time"].iter().any(|t| lower.contains(t)) {
            return Some(ColumnType::Datetime);
        }
        if ["int", "float", "double", "decimal", "numeric", "real", "money"]
            .iter()
            .any(|t| lower.contains(t))
        {
            return Some(ColumnType::Numeric);
        }
        Some(ColumnType::Categorical)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// First few non-null values, for display
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<Value>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            sample_values: Vec::new(),
        }
    }
}

/// Rows plus column metadata, independent of the backend that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    /// Name of the source the rows came from
    pub source: String,

    /// Ordered column metadata
    pub columns: Vec<ColumnInfo>,

    /// Result rows
    pub rows: Vec<Row>,
}

impl TabularResult {
    /// Build a result, inferring each column's type from the rows
    pub fn from_rows(source: impl Into<String>, column_names: Vec<String>, rows: Vec<Row>) -> Self {
        let columns = column_names
            .into_iter()
            .map(|name| {
                let column_type = ColumnType::infer(rows.iter().filter_map(|r| r.get(&name)));
                let sample_values = sample_values(&rows, &name);
                ColumnInfo {
                    name,
                    column_type,
                    sample_values,
                }
            })
            .collect();

        Self {
            source: source.into(),
            columns,
            rows,
        }
    }

    /// Build a result with known column types
    pub fn with_types(
        source: impl Into<String>,
        columns: Vec<(String, ColumnType)>,
        rows: Vec<Row>,
    ) -> Self {
        let columns = columns
            .into_iter()
            .map(|(name, column_type)| {
                let sample_values = sample_values(&rows, &name);
                ColumnInfo {
                    name,
                    column_type,
                    sample_values,
                }
            })
            .collect();

        Self {
            source: source.into(),
            columns,
            rows,
        }
    }

    /// Column names derived from the keys of the rows, in first-seen order
    ///
    /// Used for record-shaped inputs (JSON documents) that carry no header.
    pub fn column_order(records: &[serde_json::Map<String, serde_json::Value>]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.column_type)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order (missing cells read as `Null`)
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&Value::Null))
    }
}

fn sample_values(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter()
        .filter_map(|r| r.get(name))
        .filter(|v| !v.is_null())
        .take(SAMPLE_SIZE)
        .cloned()
        .collect()
}
