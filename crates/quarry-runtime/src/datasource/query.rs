//! Query parameters
//!
//! Backend-neutral description of what a caller wants from a source:
//! projection, filters, ordering and a row limit. SQL sources translate it
//! into a parameterized statement; file and REST sources evaluate it in
//! memory with [`apply_locally`].

use quarry_core::{Error, Result, Row, TabularResult, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Query parameters for a fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Columns to return; all columns when absent
    pub columns: Option<Vec<String>>,

    /// Conjunction of filters
    pub filters: Vec<Filter>,

    /// Requested row limit, capped by the source's `max_rows`
    pub limit: Option<usize>,

    /// Column to sort by; a leading `-` sorts descending
    pub order_by: Option<String>,
}

/// Sort direction parsed from `order_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Rows a source may return: `min(limit, max_rows)`
    pub fn effective_limit(&self, max_rows: usize) -> usize {
        self.limit.map_or(max_rows, |limit| limit.min(max_rows))
    }

    /// Ordering column and direction, if any
    pub fn order(&self) -> Option<(&str, SortDirection)> {
        let raw = self.order_by.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix('-') {
            Some(column) => Some((column.trim(), SortDirection::Desc)),
            None => Some((raw, SortDirection::Asc)),
        }
    }

    /// Every column name the query mentions
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        if let Some(columns) = &self.columns {
            names.extend(columns.iter().map(String::as_str));
        }
        names.extend(self.filters.iter().map(|f| f.field.as_str()));
        if let Some((column, _)) = self.order() {
            names.push(column);
        }
        names
    }
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    #[serde(alias = "ge")]
    Gte,
    Lt,
    #[serde(alias = "le")]
    Lte,
    In,
    Contains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Contains => "contains",
        }
    }
}

/// A single `field <op> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,

    #[serde(default)]
    pub operator: FilterOperator,

    pub value: Value,
}

/// Textual operators accepted by [`Filter::parse`], longest first
const OPERATOR_TOKENS: [(&str, FilterOperator); 7] = [
    (">=", FilterOperator::Gte),
    ("<=", FilterOperator::Lte),
    ("!=", FilterOperator::Ne),
    ("~=", FilterOperator::Contains),
    ("=", FilterOperator::Eq),
    (">", FilterOperator::Gt),
    ("<", FilterOperator::Lt),
];

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Parse a filter expression such as `amount>=10`, `region=east`,
    /// `name~=acme` or `region:in=east,west`
    pub fn parse(expr: &str) -> Option<Self> {
        if let Some((field, rest)) = expr.split_once(":in=") {
            let field = field.trim();
            if field.is_empty() {
                return None;
            }
            let values = rest.split(',').map(|v| parse_literal(v.trim())).collect();
            return Some(Self::new(field, FilterOperator::In, Value::Array(values)));
        }

        // Earliest operator position wins; at equal positions the longer token
        let (pos, token, operator) = OPERATOR_TOKENS
            .iter()
            .filter_map(|(token, op)| expr.find(token).map(|pos| (pos, *token, *op)))
            .min_by_key(|(pos, token, _)| (*pos, std::cmp::Reverse(token.len())))?;

        let field = expr[..pos].trim();
        if field.is_empty() {
            return None;
        }
        let value = parse_literal(expr[pos + token.len()..].trim());
        Some(Self::new(field, operator, value))
    }

    /// Evaluate the filter against a row; missing cells read as null
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            FilterOperator::Eq => cell.loosely_equals(&self.value),
            FilterOperator::Ne => !cell.loosely_equals(&self.value),
            FilterOperator::Gt => cell.compare(&self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                cell.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => cell.compare(&self.value) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                cell.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| cell.loosely_equals(item)),
                other => cell.loosely_equals(other),
            },
            FilterOperator::Contains => {
                if cell.is_null() {
                    return false;
                }
                cell.display_string()
                    .to_lowercase()
                    .contains(&self.value.display_string().to_lowercase())
            }
        }
    }
}

fn parse_literal(raw: &str) -> Value {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return Value::String(s.to_string());
    }
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::String(raw.to_string()),
    }
}

/// Order two cells ascending, nulls last
pub(crate) fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

/// Evaluate query parameters over rows that are already in memory
///
/// Column references are checked against `column_names` first; an unknown
/// column fails the fetch instead of silently matching nothing.
pub fn apply_locally(
    source: &str,
    column_names: Vec<String>,
    rows: Vec<Row>,
    params: &QueryParams,
    max_rows: usize,
) -> Result<TabularResult> {
    for name in params.referenced_columns() {
        if !column_names.iter().any(|c| c == name) {
            return Err(Error::fetch(format!(
                "Unknown column '{}' in source '{}'. Available: {}",
                name,
                source,
                column_names.join(", ")
            )));
        }
    }

    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| params.filters.iter().all(|f| f.matches(row)))
        .collect();

    if let Some((column, direction)) = params.order() {
        rows.sort_by(|a, b| {
            let left = a.get(column).unwrap_or(&Value::Null);
            let right = b.get(column).unwrap_or(&Value::Null);
            match direction {
                SortDirection::Asc => compare_cells(left, right),
                SortDirection::Desc => match (left.is_null(), right.is_null()) {
                    (false, false) => compare_cells(right, left),
                    _ => compare_cells(left, right),
                },
            }
        });
    }

    rows.truncate(params.effective_limit(max_rows));

    let selected = match &params.columns {
        Some(columns) => {
            for row in rows.iter_mut() {
                row.retain(|key, _| columns.contains(key));
            }
            columns.clone()
        }
        None => column_names,
    };

    Ok(TabularResult::from_rows(source, selected, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> (Vec<String>, Vec<Row>) {
        let data = [("east", 10.0), ("west", 5.0), ("east", 3.0), ("north", 7.0)];
        let rows = data
            .iter()
            .map(|(region, sales)| {
                let mut row = Row::new();
                row.insert("region".to_string(), Value::from(*region));
                row.insert("sales".to_string(), Value::Number(*sales));
                row
            })
            .collect();
        (vec!["region".to_string(), "sales".to_string()], rows)
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(QueryParams::new().effective_limit(100), 100);
        assert_eq!(QueryParams::new().with_limit(10).effective_limit(100), 10);
        assert_eq!(QueryParams::new().with_limit(500).effective_limit(100), 100);
    }

    #[test]
    fn test_order_parsing() {
        let params = QueryParams::new().with_order_by("-sales");
        assert_eq!(params.order(), Some(("sales", SortDirection::Desc)));
        let params = QueryParams::new().with_order_by("region");
        assert_eq!(params.order(), Some(("region", SortDirection::Asc)));
    }

    #[test]
    fn test_filter_parse() {
        let f = Filter::parse("amount>=10").unwrap();
        assert_eq!(f.field, "amount");
        assert_eq!(f.operator, FilterOperator::Gte);
        assert_eq!(f.value, Value::Number(10.0));

        let f = Filter::parse("region=east").unwrap();
        assert_eq!(f.operator, FilterOperator::Eq);
        assert_eq!(f.value, Value::from("east"));

        let f = Filter::parse("name ~= Acme").unwrap();
        assert_eq!(f.operator, FilterOperator::Contains);
        assert_eq!(f.field, "name");

        let f = Filter::parse("region:in=east,west").unwrap();
        assert_eq!(f.operator, FilterOperator::In);
        assert_eq!(
            f.value,
            Value::Array(vec![Value::from("east"), Value::from("west")])
        );

        let f = Filter::parse("code='007'").unwrap();
        assert_eq!(f.value, Value::from("007"));

        assert!(Filter::parse("no operator").is_none());
        assert!(Filter::parse("=5").is_none());
    }

    #[test]
    fn test_filter_deserialize_aliases() {
        let f: Filter =
            serde_json::from_str(r#"{"field": "a", "operator": "ge", "value": 1}"#).unwrap();
        assert_eq!(f.operator, FilterOperator::Gte);

        let f: Filter = serde_json::from_str(r#"{"field": "a", "value": "x"}"#).unwrap();
        assert_eq!(f.operator, FilterOperator::Eq);
    }

    #[test]
    fn test_apply_filters_order_limit() {
        let (columns, rows) = rows();
        let params = QueryParams::new()
            .with_filter(Filter::new("sales", FilterOperator::Gt, 4.0))
            .with_order_by("-sales")
            .with_limit(2);
        let result = apply_locally("s", columns, rows, &params, 100).unwrap();

        let sales: Vec<f64> = result.values("sales").filter_map(Value::as_f64).collect();
        assert_eq!(sales, vec![10.0, 7.0]);
    }

    #[test]
    fn test_apply_projection_and_in_filter() {
        let (columns, rows) = rows();
        let params = QueryParams::new()
            .with_columns(["region"])
            .with_filter(Filter::new(
                "region",
                FilterOperator::In,
                Value::Array(vec![Value::from("west"), Value::from("north")]),
            ));
        let result = apply_locally("s", columns, rows, &params, 100).unwrap();

        assert_eq!(result.column_names(), vec!["region"]);
        assert_eq!(result.row_count(), 2);
        assert!(result.rows.iter().all(|r| !r.contains_key("sales")));
    }

    #[test]
    fn test_max_rows_caps_result() {
        let (columns, rows) = rows();
        let result = apply_locally("s", columns, rows, &QueryParams::new(), 3).unwrap();
        assert_eq!(result.row_count(), 3);
    }

    #[test]
    fn test_unknown_column_is_fetch_error() {
        let (columns, rows) = rows();
        let params = QueryParams::new().with_filter(Filter::eq("profit", 1.0));
        let err = apply_locally("s", columns, rows, &params, 100).unwrap_err();
        assert!(matches!(err, Error::Fetch(ref msg) if msg.contains("profit")));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let mut row = Row::new();
        row.insert("name".to_string(), Value::from("Acme Corp"));
        assert!(Filter::new("name", FilterOperator::Contains, "acme").matches(&row));
        assert!(!Filter::new("name", FilterOperator::Contains, "globex").matches(&row));
    }
}
