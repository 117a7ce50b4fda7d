//! Chart specification and rendering
//!
//! [`ChartSpec::build`] checks a chart request against fetched data and
//! decides the x-axis kind. Rendering sits behind [`ChartRenderer`] so the
//! output format can be swapped; [`VegaLiteRenderer`] emits Vega-Lite v5.

mod vega;

pub use vega::VegaLiteRenderer;

use quarry_core::{ColumnType, Error, Result, TabularResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported chart kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Scatter,
    Area,
}

impl ChartType {
    /// Line and area charts plot a series over time
    pub fn is_time_series(&self) -> bool {
        matches!(self, ChartType::Line | ChartType::Area)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Scatter => "scatter",
            ChartType::Area => "area",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChartType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(ChartType::Line),
            "bar" => Ok(ChartType::Bar),
            "scatter" => Ok(ChartType::Scatter),
            "area" => Ok(ChartType::Area),
            other => Err(Error::chart(format!(
                "unsupported chart type '{}'; expected line, bar, scatter or area",
                other
            ))),
        }
    }
}

/// How the x column is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XAxisKind {
    Temporal,
    Quantitative,
    Categorical,
}

/// A validated chart request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub x_column: String,
    pub y_columns: Vec<String>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_axis: XAxisKind,
}

/// Labels a caller may override
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartLabels {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
}

impl ChartSpec {
    /// Validate a chart request against the data it will plot
    ///
    /// Fails when `y_columns` is empty, when any named column is missing, or
    /// when there are no rows. A time-series chart whose x column is not a
    /// datetime falls back to a categorical axis.
    pub fn build(
        chart_type: ChartType,
        x_column: &str,
        y_columns: &[String],
        labels: ChartLabels,
        data: &TabularResult,
    ) -> Result<Self> {
        if y_columns.is_empty() {
            return Err(Error::chart("at least one y column is required"));
        }

        for column in std::iter::once(x_column).chain(y_columns.iter().map(String::as_str)) {
            if !data.has_column(column) {
                return Err(Error::chart(format!(
                    "column '{}' not found in data from '{}'. Available: {}",
                    column,
                    data.source,
                    data.column_names().join(", ")
                )));
            }
        }

        if data.is_empty() {
            return Err(Error::chart(format!(
                "no data returned from '{}' to plot",
                data.source
            )));
        }

        let x_type = data.column_type(x_column).unwrap_or(ColumnType::Categorical);
        let x_axis = match (chart_type, x_type) {
            (_, ColumnType::Datetime) => XAxisKind::Temporal,
            (ChartType::Line | ChartType::Area, _) => {
                tracing::warn!(
                    "x column '{}' is not a datetime; plotting {} chart on a categorical axis",
                    x_column,
                    chart_type
                );
                XAxisKind::Categorical
            }
            (ChartType::Scatter, ColumnType::Numeric) => XAxisKind::Quantitative,
            _ => XAxisKind::Categorical,
        };

        for column in y_columns {
            if data.column_type(column) != Some(ColumnType::Numeric) {
                tracing::warn!("y column '{}' is not numeric", column);
            }
        }

        let title = labels
            .title
            .unwrap_or_else(|| format!("{} over {}", y_columns.join(", "), x_column));
        let y_label = labels.y_label.unwrap_or_else(|| {
            if y_columns.len() == 1 {
                y_columns[0].clone()
            } else {
                "value".to_string()
            }
        });

        Ok(Self {
            chart_type,
            x_column: x_column.to_string(),
            y_columns: y_columns.to_vec(),
            title,
            x_label: labels.x_label.unwrap_or_else(|| x_column.to_string()),
            y_label,
            x_axis,
        })
    }
}

/// Rendered chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub chart_type: ChartType,
    pub title: String,
    pub data_points: usize,
    pub x_axis: XAxisKind,

    /// Renderer output (a Vega-Lite document for [`VegaLiteRenderer`])
    pub spec: serde_json::Value,
}

/// Turns a validated spec plus data into an artifact
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: &ChartSpec, data: &TabularResult) -> Result<ChartArtifact>;
}
