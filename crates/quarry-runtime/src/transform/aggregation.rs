//! Aggregation functions shared by groupby, resample and aggregate

use quarry_core::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Aggregation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    #[serde(alias = "avg", alias = "average")]
    Mean,
    Count,
    Min,
    Max,
    Std,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Std => "std",
        }
    }

    /// Whether the input column must be numeric
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Aggregation::Sum | Aggregation::Mean | Aggregation::Std)
    }

    /// Whether the result is always a number, whatever the input type
    pub fn numeric_output(&self) -> bool {
        !matches!(self, Aggregation::Min | Aggregation::Max)
    }

    /// Apply the function to a column slice; nulls are ignored
    pub fn compute<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> Value {
        let present: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();

        match self {
            Aggregation::Count => Value::Number(present.len() as f64),
            Aggregation::Sum => Value::Number(numbers(&present).sum()),
            Aggregation::Mean => mean(&numbers(&present).collect::<Vec<_>>())
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Aggregation::Std => sample_std(&numbers(&present).collect::<Vec<_>>())
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Aggregation::Min => extreme(&present, Ordering::Less),
            Aggregation::Max => extreme(&present, Ordering::Greater),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn numbers<'a>(values: &'a [&'a Value]) -> impl Iterator<Item = f64> + 'a {
    values.iter().filter_map(|v| v.as_f64())
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); undefined below two values
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn extreme(values: &[&Value], wanted: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for &value in values {
        best = match best {
            None => Some(value),
            Some(current) if value.compare(current) == Some(wanted) => Some(value),
            keep => keep,
        };
    }
    best.cloned().unwrap_or(Value::Null)
}
