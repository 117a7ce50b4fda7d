//! Vega-Lite output

use super::{ChartArtifact, ChartRenderer, ChartSpec, ChartType, XAxisKind};
use quarry_core::{Result, TabularResult, Value};
use serde_json::json;

const SCHEMA_URL: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Renders charts as Vega-Lite v5 documents
///
/// Multiple y columns are folded into `series`/`value` pairs and coloured by
/// series. Bars for several series are placed side by side.
#[derive(Debug, Clone)]
pub struct VegaLiteRenderer {
    width: u32,
    height: u32,
}

impl Default for VegaLiteRenderer {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
        }
    }
}

impl VegaLiteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn mark(chart_type: ChartType) -> serde_json::Value {
        match chart_type {
            ChartType::Line => json!({"type": "line", "point": true}),
            ChartType::Bar => json!({"type": "bar"}),
            ChartType::Scatter => json!({"type": "point", "filled": true}),
            ChartType::Area => json!({"type": "area", "line": true, "opacity": 0.6}),
        }
    }

    fn x_encoding(spec: &ChartSpec) -> serde_json::Value {
        match spec.x_axis {
            XAxisKind::Temporal => json!({
                "field": spec.x_column,
                "type": "temporal",
                "title": spec.x_label,
            }),
            XAxisKind::Quantitative => json!({
                "field": spec.x_column,
                "type": "quantitative",
                "title": spec.x_label,
            }),
            // Keep the order rows arrived in
            XAxisKind::Categorical => json!({
                "field": spec.x_column,
                "type": "ordinal",
                "sort": null,
                "title": spec.x_label,
            }),
        }
    }
}

impl ChartRenderer for VegaLiteRenderer {
    fn render(&self, spec: &ChartSpec, data: &TabularResult) -> Result<ChartArtifact> {
        let values: Vec<serde_json::Map<String, serde_json::Value>> = data
            .rows
            .iter()
            .map(|row| {
                std::iter::once(&spec.x_column)
                    .chain(spec.y_columns.iter())
                    .map(|column| {
                        let value = row.get(column).unwrap_or(&Value::Null);
                        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (column.clone(), json)
                    })
                    .collect()
            })
            .collect();

        let mut encoding = json!({
            "x": Self::x_encoding(spec),
            "y": {"field": "value", "type": "quantitative", "title": spec.y_label},
            "color": {"field": "series", "type": "nominal", "title": null},
            "tooltip": [
                {"field": spec.x_column, "title": spec.x_label},
                {"field": "series", "type": "nominal"},
                {"field": "value", "type": "quantitative"}
            ],
        });
        if spec.chart_type == ChartType::Bar && spec.y_columns.len() > 1 {
            encoding["xOffset"] = json!({"field": "series"});
        }

        let document = json!({
            "$schema": SCHEMA_URL,
            "title": spec.title,
            "width": self.width,
            "height": self.height,
            "data": {"values": values},
            "transform": [{"fold": spec.y_columns, "as": ["series", "value"]}],
            "mark": Self::mark(spec.chart_type),
            "encoding": encoding,
        });

        tracing::debug!(
            "Rendered {} chart '{}' with {} points",
            spec.chart_type,
            spec.title,
            data.row_count()
        );

        Ok(ChartArtifact {
            chart_type: spec.chart_type,
            title: spec.title.clone(),
            data_points: data.row_count(),
            x_axis: spec.x_axis,
            spec: document,
        })
    }
}
