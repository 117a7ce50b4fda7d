//! REST API sources
//!
//! Equality filters are forwarded to the endpoint, as query parameters for
//! GET or body fields for POST. Every other filter, the ordering, the
//! projection and the row limit are applied to the returned records.

use super::config::{ConfigMap, RestConfig, RestMethod};
use super::query::{apply_locally, FilterOperator, QueryParams};
use super::DataSource;
use async_trait::async_trait;
use quarry_core::{ColumnInfo, ConfigError, Error, Result, Row, TabularResult, Value};
use std::time::Duration;

/// Rows requested when inferring a schema
const SCHEMA_SAMPLE_ROWS: usize = 10;

/// HTTP endpoint source
#[derive(Debug)]
pub struct RestSource {
    name: String,
    config: RestConfig,
    client: reqwest::Client,
}

impl RestSource {
    /// Build the source and its HTTP client
    pub fn new(
        name: impl Into<String>,
        config: RestConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::InvalidField {
                field: "timeout_ms".to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            name: name.into(),
            config,
            client,
        })
    }

    /// Validate a raw config map for a REST source
    pub fn validate_config(config: &ConfigMap) -> std::result::Result<RestConfig, ConfigError> {
        RestConfig::from_map(config)
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Fixed params merged with forwarded equality filters
    fn request_params(&self, params: &QueryParams) -> ConfigMap {
        let mut merged = self.config.params.clone();
        for filter in &params.filters {
            if filter.operator != FilterOperator::Eq {
                continue;
            }
            let value = match serde_json::to_value(&filter.value) {
                Ok(value) if !value.is_object() && !value.is_array() => value,
                _ => continue,
            };
            merged.insert(filter.field.clone(), value);
        }
        merged
    }

    async fn request(&self, params: &QueryParams) -> Result<serde_json::Value> {
        let url = &self.config.url;
        let merged = self.request_params(params);

        let mut request = match self.config.method {
            RestMethod::Get => {
                let pairs: Vec<(String, String)> = merged
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone()).display_string()))
                    .collect();
                self.client.get(url).query(&pairs)
            }
            RestMethod::Post => self.client.post(url).json(&merged),
        };

        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("Calling REST source '{}': {:?} {}", self.name, self.config.method, url);

        let response = request
            .send()
            .await
            .map_err(|e| Error::fetch(format!("HTTP request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!(
                "HTTP request to {} failed with status: {}",
                url, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::fetch(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    /// Local part of the query: everything except the forwarded equality filters
    fn local_params(params: &QueryParams) -> QueryParams {
        let mut local = params.clone();
        local.filters.retain(|f| f.operator != FilterOperator::Eq);
        local
    }
}

#[async_trait]
impl DataSource for RestSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, params: &QueryParams) -> Result<TabularResult> {
        let body = self.request(params).await?;
        let records = extract_records(body, self.config.data_path.as_deref());
        let columns = TabularResult::column_order(&records);
        let rows: Vec<Row> = records
            .into_iter()
            .map(|record| record.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            .collect();

        tracing::debug!("REST source '{}' returned {} records", self.name, rows.len());
        apply_locally(
            &self.name,
            columns,
            rows,
            &Self::local_params(params),
            self.config.max_rows,
        )
    }

    async fn get_schema(&self) -> Result<Vec<ColumnInfo>> {
        let sample = self
            .fetch(&QueryParams::new().with_limit(SCHEMA_SAMPLE_ROWS))
            .await?;
        Ok(sample.columns)
    }
}

/// Envelope keys unwrapped, in order, when no `data_path` is configured
const WRAPPER_KEYS: [&str; 2] = ["data", "results"];

/// Walk `data_path` (dot separated) and collect the records found there
///
/// A path that does not resolve yields no records. Without a path, a `data`
/// or `results` envelope is unwrapped. Scalars are wrapped as
/// `{"value": ...}` so every record is an object.
fn extract_records(
    body: serde_json::Value,
    data_path: Option<&str>,
) -> Vec<serde_json::Map<String, serde_json::Value>> {
    let mut current = body;
    if data_path.is_none() {
        if let serde_json::Value::Object(map) = &mut current {
            if let Some(inner) = WRAPPER_KEYS.iter().find_map(|key| map.remove(*key)) {
                current = inner;
            }
        }
    }
    if let Some(path) = data_path {
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let next = match current {
                serde_json::Value::Object(mut map) => map.remove(segment),
                serde_json::Value::Array(mut items) => segment
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < items.len())
                    .map(|i| items.swap_remove(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Vec::new(),
            }
        }
    }

    let items = match current {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        })
        .collect()
}
