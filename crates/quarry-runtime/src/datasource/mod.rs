//! Data Source Layer
//!
//! A uniform read interface over heterogeneous backends:
//! - CSV and JSON files
//! - REST APIs returning JSON
//! - PostgreSQL and SQLite tables
//!
//! The set of backends is closed, so [`Source`] is an enum that delegates to
//! the concrete implementation of each variant.

pub mod config;
pub mod file;
pub mod query;
pub mod rest;
pub mod sql;

pub use config::{
    ConfigMap, FileConfig, RestConfig, RestMethod, SourceConfig, SourceSettings, SourceType,
    SqlConfig, SqlProvider,
};
pub use file::{FileFormat, FileSource};
pub use query::{apply_locally, Filter, FilterOperator, QueryParams, SortDirection};
pub use rest::RestSource;
pub use sql::SqlSource;

use async_trait::async_trait;
use quarry_core::{ColumnInfo, ConfigError, Result, TabularResult};

/// Read interface shared by every backend
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Registered name of the source
    fn name(&self) -> &str;

    /// Fetch rows matching `params`, capped at the source's `max_rows`
    async fn fetch(&self, params: &QueryParams) -> Result<TabularResult>;

    /// Column names and types
    async fn get_schema(&self) -> Result<Vec<ColumnInfo>>;
}

/// A constructed source of one of the supported variants
#[derive(Debug)]
pub enum Source {
    File(FileSource),
    Rest(RestSource),
    Sql(SqlSource),
}

impl Source {
    /// Validate a raw config map for `source_type` without touching the backend
    pub fn validate_config(
        source_type: SourceType,
        config: &ConfigMap,
    ) -> std::result::Result<SourceSettings, ConfigError> {
        match source_type {
            SourceType::Csv | SourceType::Json => {
                FileSource::validate_config(source_type, config).map(SourceSettings::File)
            }
            SourceType::RestApi => RestSource::validate_config(config).map(SourceSettings::Rest),
            SourceType::Sql => SqlSource::validate_config(config).map(SourceSettings::Sql),
        }
    }

    /// Validate and construct a source from its definition
    ///
    /// Construction never performs I/O; connections are opened on first fetch.
    pub fn from_config(config: &SourceConfig) -> std::result::Result<Self, ConfigError> {
        let settings = Self::validate_config(config.source_type, &config.config)?;
        let name = config.name.clone();

        match settings {
            SourceSettings::File(file) => {
                let format = match config.source_type {
                    SourceType::Json => FileFormat::Json,
                    _ => FileFormat::Csv,
                };
                Ok(Source::File(FileSource::new(name, format, file)))
            }
            SourceSettings::Rest(rest) => RestSource::new(name, rest).map(Source::Rest),
            SourceSettings::Sql(sql) => SqlSource::new(name, sql).map(Source::Sql),
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Source::File(file) => match file.format() {
                FileFormat::Csv => SourceType::Csv,
                FileFormat::Json => SourceType::Json,
            },
            Source::Rest(_) => SourceType::RestApi,
            Source::Sql(_) => SourceType::Sql,
        }
    }
}

#[async_trait]
impl DataSource for Source {
    fn name(&self) -> &str {
        match self {
            Source::File(s) => s.name(),
            Source::Rest(s) => s.name(),
            Source::Sql(s) => s.name(),
        }
    }

    async fn fetch(&self, params: &QueryParams) -> Result<TabularResult> {
        match self {
            Source::File(s) => s.fetch(params).await,
            Source::Rest(s) => s.fetch(params).await,
            Source::Sql(s) => s.fetch(params).await,
        }
    }

    async fn get_schema(&self) -> Result<Vec<ColumnInfo>> {
        match self {
            Source::File(s) => s.get_schema().await,
            Source::Rest(s) => s.get_schema().await,
            Source::Sql(s) => s.get_schema().await,
        }
    }
}
