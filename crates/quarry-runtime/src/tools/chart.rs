use super::fetch::{fetch, FetchArgs};
use crate::chart::{ChartArtifact, ChartLabels, ChartRenderer, ChartSpec, ChartType};
use crate::datasource::QueryParams;
use crate::registry::SourceRegistry;
use crate::transform::TransformSpec;
use quarry_core::Result;
use serde::{Deserialize, Serialize};

/// Arguments of the chart tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartArgs {
    pub source: String,

    pub chart_type: ChartType,

    pub x_column: String,

    pub y_columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,

    #[serde(default)]
    pub query: QueryParams,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
}

impl ChartArgs {
    pub fn new(
        source: impl Into<String>,
        chart_type: ChartType,
        x_column: impl Into<String>,
        y_columns: Vec<String>,
    ) -> Self {
        Self {
            source: source.into(),
            chart_type,
            x_column: x_column.into(),
            y_columns,
            title: None,
            x_label: None,
            y_label: None,
            query: QueryParams::default(),
            transform: None,
        }
    }
}

/// Fetch (and transform) data, validate the chart request, then render
///
/// The renderer is only called once every column check has passed.
pub async fn chart(
    registry: &SourceRegistry,
    renderer: &dyn ChartRenderer,
    args: &ChartArgs,
) -> Result<ChartArtifact> {
    let fetch_args = FetchArgs {
        source: args.source.clone(),
        query: args.query.clone(),
        transform: args.transform.clone(),
    };
    let data = fetch(registry, &fetch_args).await?;

    let labels = ChartLabels {
        title: args.title.clone(),
        x_label: args.x_label.clone(),
        y_label: args.y_label.clone(),
    };
    let spec = ChartSpec::build(args.chart_type, &args.x_column, &args.y_columns, labels, &data)?;

    tracing::info!(
        "Rendering {} chart of '{}' ({} rows)",
        spec.chart_type,
        args.source,
        data.row_count()
    );
    renderer.render(&spec, &data)
}
