//! File-backed sources (CSV and JSON)
//!
//! The file is read on every fetch, so edits are picked up without
//! re-registering. Filtering, ordering and projection run in memory.

use super::config::{ConfigMap, FileConfig, SourceType};
use super::query::{apply_locally, QueryParams};
use super::DataSource;
use async_trait::async_trait;
use quarry_core::{ColumnInfo, ConfigError, Error, Result, Row, TabularResult, Value};

/// Keys that may wrap the record array of a JSON document
const JSON_WRAPPER_KEYS: [&str; 3] = ["data", "results", "items"];

/// On-disk format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

/// CSV or JSON file source
#[derive(Debug)]
pub struct FileSource {
    name: String,
    format: FileFormat,
    config: FileConfig,
}

impl FileSource {
    pub fn new(name: impl Into<String>, format: FileFormat, config: FileConfig) -> Self {
        Self {
            name: name.into(),
            format,
            config,
        }
    }

    /// Validate a raw config map for a CSV or JSON source
    pub fn validate_config(
        source_type: SourceType,
        config: &ConfigMap,
    ) -> std::result::Result<FileConfig, ConfigError> {
        FileConfig::from_map(source_type, config)
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Read the file, stopping after `limit` records when given
    async fn read_records(&self, limit: Option<usize>) -> Result<(Vec<String>, Vec<Row>)> {
        let path = &self.config.path;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::fetch(format!("Failed to read {}: {}", path.display(), e)))?;

        match self.format {
            FileFormat::Csv => self.parse_csv(&bytes, limit),
            FileFormat::Json => self.parse_json(&bytes, limit),
        }
    }

    fn parse_csv(&self, bytes: &[u8], limit: Option<usize>) -> Result<(Vec<String>, Vec<Row>)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| self.parse_error(e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records().take(limit.unwrap_or(usize::MAX)) {
            let record = record.map_err(|e| self.parse_error(e))?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.clone(), parse_cell(cell)))
                .collect();
            rows.push(row);
        }

        Ok((headers, rows))
    }

    fn parse_json(&self, bytes: &[u8], limit: Option<usize>) -> Result<(Vec<String>, Vec<Row>)> {
        let document: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| self.parse_error(e))?;

        let mut records = extract_records(document)
            .ok_or_else(|| self.parse_error("expected an array of objects"))?;
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        let columns = TabularResult::column_order(&records);
        let rows = records
            .into_iter()
            .map(|record| record.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            .collect();
        Ok((columns, rows))
    }

    fn parse_error(&self, reason: impl std::fmt::Display) -> Error {
        Error::fetch(format!(
            "Failed to parse {}: {}",
            self.config.path.display(),
            reason
        ))
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, params: &QueryParams) -> Result<TabularResult> {
        let (columns, rows) = self.read_records(None).await?;
        tracing::debug!(
            "Read {} rows from {} for source '{}'",
            rows.len(),
            self.config.path.display(),
            self.name
        );
        apply_locally(&self.name, columns, rows, params, self.config.max_rows)
    }

    async fn get_schema(&self) -> Result<Vec<ColumnInfo>> {
        let (columns, rows) = self.read_records(Some(self.config.sample_rows)).await?;
        Ok(TabularResult::from_rows(&self.name, columns, rows).columns)
    }
}

/// Records of a JSON document: a top-level array, an array under one of the
/// wrapper keys, or a single object
fn extract_records(
    document: serde_json::Value,
) -> Option<Vec<serde_json::Map<String, serde_json::Value>>> {
    let items = match document {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => {
            let wrapped = JSON_WRAPPER_KEYS
                .iter()
                .find(|key| map.get(**key).map_or(false, |v| v.is_array()))
                .and_then(|key| map.remove(*key));
            match wrapped {
                Some(serde_json::Value::Array(items)) => items,
                _ => return Some(vec![map]),
            }
        }
        _ => return None,
    };

    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// Type a raw CSV cell: empty -> null, numbers, booleans, otherwise text
fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
