//! Data Source Configuration
//!
//! A [`SourceConfig`] carries an untyped `config` map, as written in YAML or
//! received over an API. Validation turns that map into one of the typed
//! settings structs below, checking required, optional and unknown keys
//! against a per-type field list before any value is deserialized.

use quarry_core::ConfigError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

/// Raw configuration map of a source
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Source definition as supplied by a caller or a sources file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source name
    pub name: String,

    /// Backend variant
    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Variant-specific settings
    #[serde(default)]
    pub config: ConfigMap,

    /// Optional human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, source_type: SourceType, config: ConfigMap) -> Self {
        Self {
            name: name.into(),
            source_type,
            config,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Supported backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Csv,
    Json,
    RestApi,
    Sql,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Csv => "csv",
            SourceType::Json => "json",
            SourceType::RestApi => "rest_api",
            SourceType::Sql => "sql",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(SourceType::Csv),
            "json" => Ok(SourceType::Json),
            "rest_api" | "rest" | "api" => Ok(SourceType::RestApi),
            "sql" => Ok(SourceType::Sql),
            other => Err(ConfigError::UnsupportedType(other.to_string())),
        }
    }
}

/// Validated, typed settings for one source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSettings {
    File(FileConfig),
    Rest(RestConfig),
    Sql(SqlConfig),
}

fn default_max_rows() -> usize {
    10_000
}

fn default_sample_rows() -> usize {
    100
}

fn default_delimiter() -> char {
    ','
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_pool_size() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_schema() -> String {
    "public".to_string()
}

/// Check key presence, then deserialize the map into `T`
fn parse_map<T: DeserializeOwned + FieldCheck>(
    source_type: SourceType,
    config: &ConfigMap,
    required: &[&str],
    optional: &[&str],
) -> Result<T, ConfigError> {
    for key in config.keys() {
        if !required.contains(&key.as_str()) && !optional.contains(&key.as_str()) {
            return Err(ConfigError::UnknownField {
                source_type: source_type.to_string(),
                field: key.clone(),
            });
        }
    }

    for field in required {
        let present = match config.get(*field) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(ConfigError::MissingField {
                source_type: source_type.to_string(),
                field: field.to_string(),
            });
        }
    }

    // Deserialize field by field so a type error names the offending key
    for (key, value) in config {
        if let Err(e) = T::deserialize_field_check(key, value) {
            return Err(ConfigError::InvalidField {
                field: key.clone(),
                reason: e,
            });
        }
    }

    serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(|e| {
        ConfigError::InvalidField {
            field: "config".to_string(),
            reason: e.to_string(),
        }
    })
}

/// Per-field deserialization check, so type errors point at the key
trait FieldCheck {
    fn deserialize_field_check(key: &str, value: &serde_json::Value) -> Result<(), String>;
}

fn try_as<T: DeserializeOwned>(value: &serde_json::Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Numeric field check that also takes the string form
fn try_number<T>(value: &serde_json::Value) -> Result<(), String>
where
    T: DeserializeOwned + FromStr,
    T::Err: fmt::Display,
{
    match value {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<T>()
            .map(|_| ())
            .map_err(|e| format!("'{}' is not a valid number: {}", s, e)),
        other => try_as::<T>(other),
    }
}

/// Accept `8` as well as `"8"`; values substituted from `${VAR}` are strings
fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// CSV and JSON file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Path to the file
    pub path: PathBuf,

    /// Field delimiter (CSV only)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Rows read when inferring the schema
    #[serde(default = "default_sample_rows", deserialize_with = "number_or_string")]
    pub sample_rows: usize,

    /// Upper bound on rows returned by a fetch
    #[serde(default = "default_max_rows", deserialize_with = "number_or_string")]
    pub max_rows: usize,
}

impl FieldCheck for FileConfig {
    fn deserialize_field_check(key: &str, value: &serde_json::Value) -> Result<(), String> {
        match key {
            "path" => try_as::<PathBuf>(value),
            "delimiter" => try_as::<char>(value),
            "sample_rows" | "max_rows" => try_number::<usize>(value),
            _ => Ok(()),
        }
    }
}

impl FileConfig {
    pub fn from_map(source_type: SourceType, config: &ConfigMap) -> Result<Self, ConfigError> {
        let optional: &[&str] = match source_type {
            SourceType::Csv => &["delimiter", "sample_rows", "max_rows"],
            _ => &["sample_rows", "max_rows"],
        };
        let parsed: FileConfig = parse_map(source_type, config, &["path"], optional)?;

        if !parsed.delimiter.is_ascii() {
            return Err(ConfigError::InvalidField {
                field: "delimiter".to_string(),
                reason: "must be a single ASCII character".to_string(),
            });
        }
        positive("sample_rows", parsed.sample_rows as u64)?;
        positive("max_rows", parsed.max_rows as u64)?;
        Ok(parsed)
    }
}

/// HTTP method used by REST sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

/// REST API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    /// Absolute http(s) URL of the endpoint
    pub url: String,

    #[serde(default)]
    pub method: RestMethod,

    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Fixed query parameters (GET) or body fields (POST)
    #[serde(default)]
    pub params: ConfigMap,

    /// Dotted path to the record array inside the response body
    #[serde(default)]
    pub data_path: Option<String>,

    /// Bearer token sent in the Authorization header
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_timeout_ms", deserialize_with = "number_or_string")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_rows", deserialize_with = "number_or_string")]
    pub max_rows: usize,
}

impl FieldCheck for RestConfig {
    fn deserialize_field_check(key: &str, value: &serde_json::Value) -> Result<(), String> {
        match key {
            "url" => try_as::<String>(value),
            "method" => try_as::<RestMethod>(value),
            "headers" => try_as::<HashMap<String, String>>(value),
            "params" => try_as::<ConfigMap>(value),
            "data_path" | "auth_token" => try_as::<Option<String>>(value),
            "timeout_ms" => try_number::<u64>(value),
            "max_rows" => try_number::<usize>(value),
            _ => Ok(()),
        }
    }
}

impl RestConfig {
    pub fn from_map(config: &ConfigMap) -> Result<Self, ConfigError> {
        let parsed: RestConfig = parse_map(
            SourceType::RestApi,
            config,
            &["url"],
            &[
                "method",
                "headers",
                "params",
                "data_path",
                "auth_token",
                "timeout_ms",
                "max_rows",
            ],
        )?;

        let url = reqwest::Url::parse(&parsed.url).map_err(|e| ConfigError::InvalidField {
            field: "url".to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidField {
                field: "url".to_string(),
                reason: format!("scheme '{}' is not http or https", url.scheme()),
            });
        }

        for (key, value) in &parsed.params {
            if value.is_object() || value.is_array() {
                return Err(ConfigError::InvalidField {
                    field: "params".to_string(),
                    reason: format!("parameter '{}' must be a scalar", key),
                });
            }
        }

        positive("timeout_ms", parsed.timeout_ms)?;
        positive("max_rows", parsed.max_rows as u64)?;
        Ok(parsed)
    }
}

/// SQL database providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlProvider {
    #[serde(alias = "postgres")]
    PostgreSQL,
    SQLite,
}

impl SqlProvider {
    /// Infer the provider from a connection string scheme
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(SqlProvider::PostgreSQL)
        } else if lower.starts_with("sqlite:") {
            Some(SqlProvider::SQLite)
        } else {
            None
        }
    }
}

/// SQL table settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConfig {
    pub connection_string: String,

    /// Table the source reads from
    pub table: String,

    /// Resolved after validation; inferred from the connection string when omitted
    #[serde(default)]
    pub provider: Option<SqlProvider>,

    /// Schema searched for `table` (PostgreSQL only)
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_pool_size", deserialize_with = "number_or_string")]
    pub pool_size: u32,

    #[serde(default = "default_acquire_timeout_ms", deserialize_with = "number_or_string")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_max_rows", deserialize_with = "number_or_string")]
    pub max_rows: usize,
}

impl FieldCheck for SqlConfig {
    fn deserialize_field_check(key: &str, value: &serde_json::Value) -> Result<(), String> {
        match key {
            "connection_string" | "table" | "schema" => try_as::<String>(value),
            "provider" => try_as::<Option<SqlProvider>>(value),
            "pool_size" => try_number::<u32>(value),
            "acquire_timeout_ms" => try_number::<u64>(value),
            "max_rows" => try_number::<usize>(value),
            _ => Ok(()),
        }
    }
}

impl SqlConfig {
    pub fn from_map(config: &ConfigMap) -> Result<Self, ConfigError> {
        let mut parsed: SqlConfig = parse_map(
            SourceType::Sql,
            config,
            &["connection_string", "table"],
            &[
                "provider",
                "schema",
                "pool_size",
                "acquire_timeout_ms",
                "max_rows",
            ],
        )?;

        for (field, value) in [("table", &parsed.table), ("schema", &parsed.schema)] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidField {
                    field: field.to_string(),
                    reason: format!("'{}' is not a plain SQL identifier", value),
                });
            }
        }

        if parsed.provider.is_none() {
            parsed.provider = SqlProvider::from_connection_string(&parsed.connection_string);
        }
        if parsed.provider.is_none() {
            return Err(ConfigError::InvalidField {
                field: "connection_string".to_string(),
                reason: "cannot infer provider; use a postgres:// or sqlite: URL or set 'provider'"
                    .to_string(),
            });
        }

        positive("pool_size", parsed.pool_size as u64)?;
        positive("acquire_timeout_ms", parsed.acquire_timeout_ms)?;
        positive("max_rows", parsed.max_rows as u64)?;
        Ok(parsed)
    }

    /// Provider resolved during validation
    pub fn resolved_provider(&self) -> Option<SqlProvider> {
        self.provider
            .or_else(|| SqlProvider::from_connection_string(&self.connection_string))
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
}

/// Plain SQL identifier, safe to quote and interpolate
pub(crate) fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}
