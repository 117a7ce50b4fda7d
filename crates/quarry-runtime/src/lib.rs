//! Quarry runtime
//!
//! Data sources, the source registry, the transform pipeline, chart rendering
//! and the tools that tie them together.

pub mod chart;
pub mod datasource;
pub mod registry;
pub mod tools;
pub mod transform;

pub use chart::{
    ChartArtifact, ChartLabels, ChartRenderer, ChartSpec, ChartType, VegaLiteRenderer, XAxisKind,
};
pub use datasource::{
    DataSource, Filter, FilterOperator, QueryParams, Source, SourceConfig, SourceType,
};
pub use registry::{SourceRegistry, SourceSummary};
pub use tools::{ChartArgs, FetchArgs, Toolbox};
pub use transform::{Pipeline, TransformSpec, TransformStep};

pub use quarry_core::{
    ColumnInfo, ColumnType, ConfigError, Error, RegistrationError, Result, Row, TabularResult,
    Value,
};
