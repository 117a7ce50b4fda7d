//! Transform operations
//!
//! Each operation is a pure function from one [`TabularResult`] to another.
//! Parameters are deserialized and checked when the pipeline is compiled;
//! column existence and types are checked against the actual input.

use super::aggregation::{mean, Aggregation};
use chrono::{Datelike, Days, NaiveDate};
use quarry_core::types::parse_datetime;
use quarry_core::{ColumnType, Row, TabularResult, Value};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

type OpResult = std::result::Result<TabularResult, String>;

/// Accept either `"region"` or `["region", "product"]`
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ColumnList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match ColumnList::deserialize(deserializer)? {
        ColumnList::One(column) => vec![column],
        ColumnList::Many(columns) => columns,
    })
}

fn column_type(input: &TabularResult, name: &str) -> std::result::Result<ColumnType, String> {
    input.column_type(name).ok_or_else(|| {
        format!(
            "column '{}' not found. Available: {}",
            name,
            input.column_names().join(", ")
        )
    })
}

/// A column with no values, or only nulls, is accepted as numeric
fn numeric_column(input: &TabularResult, name: &str) -> std::result::Result<(), String> {
    let ty = column_type(input, name)?;
    if ty == ColumnType::Numeric {
        return Ok(());
    }
    match input
        .values(name)
        .find(|v| !matches!(v, Value::Null | Value::Number(_)))
    {
        None => Ok(()),
        Some(_) => Err(format!(
            "column '{}' is not numeric (found {:?})",
            name, ty
        )),
    }
}

/// Column type of an aggregated column
fn aggregated_type(agg: Aggregation, input_type: ColumnType) -> ColumnType {
    if agg.numeric_output() {
        ColumnType::Numeric
    } else {
        input_type
    }
}

/// Hashable identity of a grouping value; `1` and `"1"` stay distinct
fn group_key(value: &Value) -> String {
    match value {
        Value::Null => "\u{0}".to_string(),
        Value::Bool(b) => format!("b{}", b),
        Value::Number(n) => format!("n{}", n),
        Value::String(s) => format!("s{}", s),
        other => format!("o{}", other.display_string()),
    }
}

/// Group rows and aggregate one target column per group
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupBy {
    #[serde(deserialize_with = "one_or_many")]
    pub by: Vec<String>,
    pub agg: Aggregation,
    pub target: String,
}

impl GroupBy {
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        if self.by.is_empty() {
            return Err("'by' must name at least one column".to_string());
        }
        if self.by.contains(&self.target) {
            return Err(format!(
                "target '{}' cannot also be a grouping column",
                self.target
            ));
        }
        Ok(())
    }

    /// Groups appear in first-seen order; columns are `by...` then `target`
    pub fn apply(&self, input: TabularResult) -> OpResult {
        let mut key_types = Vec::with_capacity(self.by.len());
        for column in &self.by {
            key_types.push((column.clone(), column_type(&input, column)?));
        }
        let target_type = column_type(&input, &self.target)?;
        if self.agg.requires_numeric() {
            numeric_column(&input, &self.target)?;
        }

        let mut groups: Vec<(Vec<Value>, Vec<&Value>)> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();

        for row in &input.rows {
            let key_values: Vec<Value> = self
                .by
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            let key: Vec<String> = key_values.iter().map(group_key).collect();

            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    groups.push((key_values, Vec::new()));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot]
                .1
                .push(row.get(&self.target).unwrap_or(&Value::Null));
        }

        let rows: Vec<Row> = groups
            .into_iter()
            .map(|(key_values, targets)| {
                let mut row: Row = self.by.iter().cloned().zip(key_values).collect();
                row.insert(self.target.clone(), self.agg.compute(targets));
                row
            })
            .collect();

        let mut columns = key_types;
        columns.push((self.target.clone(), aggregated_type(self.agg, target_type)));
        Ok(TabularResult::with_types(input.source, columns, rows))
    }
}

/// Resampling frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Frequency {
    #[serde(rename = "D", alias = "d")]
    Day,
    #[serde(rename = "W", alias = "w")]
    Week,
    #[serde(rename = "M", alias = "m")]
    Month,
    #[serde(rename = "Q", alias = "q")]
    Quarter,
    #[serde(rename = "Y", alias = "y", alias = "A")]
    Year,
}

impl Frequency {
    /// Start of the period containing `date`; weeks start on Monday
    pub fn period_start(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Day => Some(date),
            Frequency::Week => date.checked_sub_days(Days::new(
                u64::from(date.weekday().num_days_from_monday()),
            )),
            Frequency::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Frequency::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), ((date.month() - 1) / 3) * 3 + 1, 1)
            }
            Frequency::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }
}

fn default_resample_agg() -> Aggregation {
    Aggregation::Sum
}

/// Bucket rows by a datetime column and aggregate each bucket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resample {
    pub freq: Frequency,
    pub on: String,
    #[serde(default = "default_resample_agg")]
    pub agg: Aggregation,
    #[serde(default, alias = "column")]
    pub target: Option<String>,
}

impl Resample {
    /// Columns aggregated per bucket: `target`, or every eligible column but `on`
    fn targets(
        &self,
        input: &TabularResult,
    ) -> std::result::Result<Vec<(String, ColumnType)>, String> {
        if let Some(target) = &self.target {
            let ty = column_type(input, target)?;
            if self.agg.requires_numeric() {
                numeric_column(input, target)?;
            }
            return Ok(vec![(target.clone(), ty)]);
        }

        let targets: Vec<(String, ColumnType)> = input
            .columns
            .iter()
            .filter(|c| c.name != self.on)
            .filter(|c| {
                self.agg == Aggregation::Count
                    || c.column_type == ColumnType::Numeric
                    || input.rows.is_empty()
            })
            .map(|c| (c.name.clone(), c.column_type))
            .collect();

        if targets.is_empty() {
            return Err("no numeric columns to aggregate".to_string());
        }
        Ok(targets)
    }

    /// Buckets are labelled by period start (`YYYY-MM-DD`), sorted ascending;
    /// empty buckets are omitted and rows with a null `on` are skipped
    pub fn apply(&self, input: TabularResult) -> OpResult {
        column_type(&input, &self.on)?;
        let targets = self.targets(&input)?;

        let mut buckets: BTreeMap<NaiveDate, Vec<&Row>> = BTreeMap::new();
        for row in &input.rows {
            let raw = match row.get(&self.on) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            let parsed = raw.as_str().and_then(parse_datetime).ok_or_else(|| {
                format!(
                    "value '{}' in column '{}' is not a datetime",
                    raw.display_string(),
                    self.on
                )
            })?;
            let bucket = self
                .freq
                .period_start(parsed.date())
                .ok_or_else(|| format!("cannot compute period for {}", parsed))?;
            buckets.entry(bucket).or_default().push(row);
        }

        let rows: Vec<Row> = buckets
            .into_iter()
            .map(|(bucket, members)| {
                let mut row = Row::new();
                row.insert(
                    self.on.clone(),
                    Value::String(bucket.format("%Y-%m-%d").to_string()),
                );
                for (name, _) in &targets {
                    let values = members.iter().map(|r| r.get(name).unwrap_or(&Value::Null));
                    row.insert(name.clone(), self.agg.compute(values));
                }
                row
            })
            .collect();

        let mut columns = vec![(self.on.clone(), ColumnType::Datetime)];
        columns.extend(
            targets
                .into_iter()
                .map(|(name, ty)| (name, aggregated_type(self.agg, ty))),
        );
        Ok(TabularResult::with_types(input.source, columns, rows))
    }
}

/// Trailing mean over a fixed number of rows
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollingAverage {
    pub window: usize,
    #[serde(alias = "column")]
    pub on: String,
}

impl RollingAverage {
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        if self.window == 0 {
            return Err("'window' must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Name of the appended column
    pub fn output_column(&self) -> String {
        format!("{}_rolling_{}", self.on, self.window)
    }

    /// Appends `<on>_rolling_<window>`; the first rows average over a partial
    /// window and nulls inside a window are skipped
    pub fn apply(&self, input: TabularResult) -> OpResult {
        numeric_column(&input, &self.on)?;
        let output = self.output_column();

        let series: Vec<Option<f64>> = input.values(&self.on).map(Value::as_f64).collect();
        let averages: Vec<Value> = (0..series.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(self.window);
                let window: Vec<f64> = series[start..=i].iter().flatten().copied().collect();
                mean(&window).map(Value::Number).unwrap_or(Value::Null)
            })
            .collect();

        let mut columns: Vec<(String, ColumnType)> = input
            .columns
            .iter()
            .filter(|c| c.name != output)
            .map(|c| (c.name.clone(), c.column_type))
            .collect();
        columns.push((output.clone(), ColumnType::Numeric));

        let rows: Vec<Row> = input
            .rows
            .into_iter()
            .zip(averages)
            .map(|(mut row, average)| {
                row.insert(output.clone(), average);
                row
            })
            .collect();

        Ok(TabularResult::with_types(input.source, columns, rows))
    }
}

/// Collapse one column to a single statistic
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aggregate {
    #[serde(alias = "agg")]
    pub op: Aggregation,
    #[serde(alias = "target")]
    pub column: String,
}

impl Aggregate {
    /// One row, one column named after the statistic
    pub fn apply(&self, input: TabularResult) -> OpResult {
        let input_type = column_type(&input, &self.column)?;
        if self.op.requires_numeric() {
            numeric_column(&input, &self.column)?;
        }

        let name = self.op.as_str().to_string();
        let mut row = Row::new();
        row.insert(name.clone(), self.op.compute(input.values(&self.column)));

        Ok(TabularResult::with_types(
            input.source,
            vec![(name, aggregated_type(self.op, input_type))],
            vec![row],
        ))
    }
}
