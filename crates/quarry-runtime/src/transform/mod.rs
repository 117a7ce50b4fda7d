//! Transform pipeline
//!
//! A transform spec is an ordered list of `{op, params}` steps. The whole
//! spec is compiled up front, so an unknown operation or a bad parameter is
//! reported before any data is fetched. Applying a compiled [`Pipeline`]
//! folds the steps left to right over a [`TabularResult`].

pub mod aggregation;
pub mod ops;

pub use aggregation::Aggregation;
pub use ops::{Aggregate, Frequency, GroupBy, Resample, RollingAverage};

use quarry_core::{Error, Result, TabularResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One step of a transform spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    pub op: String,

    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl TransformStep {
    pub fn new(op: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            op: op.into(),
            params,
        }
    }
}

/// Ordered list of steps
pub type TransformSpec = Vec<TransformStep>;

/// A validated operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GroupBy(GroupBy),
    Resample(Resample),
    RollingAverage(RollingAverage),
    Aggregate(Aggregate),
}

fn params<T: DeserializeOwned>(step: &TransformStep) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(step.params.clone()))
        .map_err(|e| format!("invalid params: {}", e))
}

impl Operation {
    /// Parse and statically check one step
    pub fn parse(step: &TransformStep) -> std::result::Result<Self, String> {
        match step.op.as_str() {
            "groupby" | "group_by" => {
                let op: GroupBy = params(step)?;
                op.check()?;
                Ok(Operation::GroupBy(op))
            }
            "resample" => params(step).map(Operation::Resample),
            "rolling_average" | "rolling" => {
                let op: RollingAverage = params(step)?;
                op.check()?;
                Ok(Operation::RollingAverage(op))
            }
            "aggregate" => params(step).map(Operation::Aggregate),
            other => Err(format!(
                "unknown operation '{}'; expected groupby, resample, rolling_average or aggregate",
                other
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::GroupBy(_) => "groupby",
            Operation::Resample(_) => "resample",
            Operation::RollingAverage(_) => "rolling_average",
            Operation::Aggregate(_) => "aggregate",
        }
    }

    pub fn apply(&self, input: TabularResult) -> std::result::Result<TabularResult, String> {
        match self {
            Operation::GroupBy(op) => op.apply(input),
            Operation::Resample(op) => op.apply(input),
            Operation::RollingAverage(op) => op.apply(input),
            Operation::Aggregate(op) => op.apply(input),
        }
    }
}

/// Compiled transform spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<Operation>,
}

impl Pipeline {
    /// Validate every step; errors carry the failing step's index
    pub fn compile(spec: &[TransformStep]) -> Result<Self> {
        let steps = spec
            .iter()
            .enumerate()
            .map(|(index, step)| {
                Operation::parse(step).map_err(|reason| Error::transform(index, &step.op, reason))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Operation] {
        &self.steps
    }

    /// Run the steps in order; an empty pipeline returns the input unchanged
    pub fn apply(&self, input: TabularResult) -> Result<TabularResult> {
        self.steps
            .iter()
            .enumerate()
            .try_fold(input, |current, (index, op)| {
                tracing::debug!("Applying transform step {} ({})", index, op.name());
                op.apply(current)
                    .map_err(|reason| Error::transform(index, op.name(), reason))
            })
    }
}

/// Compile and apply a spec in one call
pub fn apply(spec: &[TransformStep], input: TabularResult) -> Result<TabularResult> {
    Pipeline::compile(spec)?.apply(input)
}
