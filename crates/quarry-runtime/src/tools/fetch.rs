use crate::datasource::{DataSource, QueryParams};
use crate::registry::SourceRegistry;
use crate::transform::{Pipeline, TransformSpec};
use quarry_core::{Result, TabularResult};
use serde::{Deserialize, Serialize};

/// Arguments of the fetch tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchArgs {
    pub source: String,

    #[serde(default)]
    pub query: QueryParams,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
}

impl FetchArgs {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Resolve the source, fetch, then apply the optional transform
///
/// The transform is compiled before the fetch, so a bad spec costs no I/O.
pub async fn fetch(registry: &SourceRegistry, args: &FetchArgs) -> Result<TabularResult> {
    let source = registry.resolve(&args.source).await?;
    let pipeline = match &args.transform {
        Some(spec) => Pipeline::compile(spec)?,
        None => Pipeline::default(),
    };

    let data = source.fetch(&args.query).await?;
    tracing::debug!(
        "Fetched {} rows from '{}', applying {} transform steps",
        data.row_count(),
        args.source,
        pipeline.len()
    );
    pipeline.apply(data)
}
