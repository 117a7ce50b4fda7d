//! Transform pipeline behaviour on realistic tables

use quarry_runtime::transform::{apply, Pipeline};
use quarry_runtime::{ColumnType, Error, Row, TabularResult, TransformStep, Value};
use serde_json::json;

fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> TabularResult {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rows = rows
        .into_iter()
        .map(|values| names.iter().cloned().zip(values).collect::<Row>())
        .collect();
    TabularResult::from_rows("test", names, rows)
}

fn numbers(values: &[f64]) -> TabularResult {
    table(
        &["v"],
        values.iter().map(|v| vec![Value::Number(*v)]).collect(),
    )
}

fn regional_sales() -> TabularResult {
    table(
        &["region", "sales"],
        vec![
            vec![Value::from("east"), Value::Number(10.0)],
            vec![Value::from("west"), Value::Number(5.0)],
            vec![Value::from("east"), Value::Number(3.0)],
        ],
    )
}

fn daily() -> TabularResult {
    table(
        &["date", "amount"],
        vec![
            vec![Value::from("2024-01-01"), Value::Number(1.0)],
            vec![Value::from("2024-01-03"), Value::Number(2.0)],
            vec![Value::from("2024-01-08"), Value::Number(4.0)],
            vec![Value::from("2024-02-10"), Value::Number(8.0)],
            vec![Value::Null, Value::Number(100.0)],
        ],
    )
}

#[test]
fn test_rolling_average_partial_windows() {
    let spec = vec![TransformStep::new(
        "rolling_average",
        json!({"window": 3, "on": "v"}),
    )];
    let output = apply(&spec, numbers(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();

    let averages: Vec<f64> = output.values("v_rolling_3").filter_map(Value::as_f64).collect();
    assert_eq!(averages, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
    assert_eq!(output.column_names(), vec!["v", "v_rolling_3"]);
    assert_eq!(output.column_type("v_rolling_3"), Some(ColumnType::Numeric));
}

#[test]
fn test_rolling_average_window_larger_than_input() {
    let spec = vec![TransformStep::new(
        "rolling_average",
        json!({"window": 10, "column": "v"}),
    )];
    let output = apply(&spec, numbers(&[2.0, 4.0])).unwrap();
    let averages: Vec<f64> = output
        .values("v_rolling_10")
        .filter_map(Value::as_f64)
        .collect();
    assert_eq!(averages, vec![2.0, 3.0]);
}

#[test]
fn test_groupby_sum_first_seen_order() {
    let spec = vec![TransformStep::new(
        "groupby",
        json!({"by": "region", "agg": "sum", "target": "sales"}),
    )];
    let output = apply(&spec, regional_sales()).unwrap();

    let pairs: Vec<(String, f64)> = output
        .rows
        .iter()
        .map(|row| {
            (
                row["region"].display_string(),
                row["sales"].as_f64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![("east".to_string(), 13.0), ("west".to_string(), 5.0)]
    );
    assert_eq!(output.column_names(), vec!["region", "sales"]);
}

#[test]
fn test_groupby_count_on_categorical_target() {
    let data = table(
        &["region", "rep"],
        vec![
            vec![Value::from("east"), Value::from("ann")],
            vec![Value::from("east"), Value::from("bob")],
            vec![Value::from("west"), Value::Null],
        ],
    );
    let spec = vec![TransformStep::new(
        "groupby",
        json!({"by": ["region"], "agg": "count", "target": "rep"}),
    )];
    let output = apply(&spec, data).unwrap();

    assert_eq!(output.rows[0]["rep"], Value::Number(2.0));
    assert_eq!(output.rows[1]["rep"], Value::Number(0.0));
    assert_eq!(output.column_type("rep"), Some(ColumnType::Numeric));
}

#[test]
fn test_groupby_mean_on_text_fails() {
    let spec = vec![TransformStep::new(
        "groupby",
        json!({"by": "sales", "agg": "mean", "target": "region"}),
    )];
    let err = apply(&spec, regional_sales()).unwrap_err();
    assert!(matches!(err, Error::Transform { index: 0, ref reason, .. } if reason.contains("not numeric")));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn test_groupby_target_in_by_rejected_at_compile() {
    let spec = vec![TransformStep::new(
        "groupby",
        json!({"by": ["region"], "agg": "count", "target": "region"}),
    )];
    let err = Pipeline::compile(&spec).unwrap_err();
    assert!(matches!(err, Error::Transform { index: 0, ref op, .. } if op == "groupby"));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn test_numeric_ops_accept_empty_input() {
    let empty = TabularResult::with_types(
        "test",
        vec![
            ("region".to_string(), ColumnType::Categorical),
            ("sales".to_string(), ColumnType::Categorical),
        ],
        Vec::new(),
    );

    let sum = apply(
        &[TransformStep::new("aggregate", json!({"op": "sum", "column": "sales"}))],
        empty.clone(),
    )
    .unwrap();
    assert_eq!(sum.rows[0]["sum"], Value::Number(0.0));

    let mean = apply(
        &[TransformStep::new("aggregate", json!({"op": "mean", "column": "sales"}))],
        empty.clone(),
    )
    .unwrap();
    assert_eq!(mean.rows[0]["mean"], Value::Null);

    let grouped = apply(
        &[TransformStep::new(
            "groupby",
            json!({"by": "region", "agg": "mean", "target": "sales"}),
        )],
        empty.clone(),
    )
    .unwrap();
    assert!(grouped.is_empty());

    let rolling = apply(
        &[TransformStep::new("rolling_average", json!({"window": 3, "on": "sales"}))],
        empty,
    )
    .unwrap();
    assert_eq!(rolling.column_names(), vec!["region", "sales", "sales_rolling_3"]);
}

#[test]
fn test_resample_weekly_sum() {
    let spec = vec![TransformStep::new(
        "resample",
        json!({"freq": "W", "on": "date", "agg": "sum"}),
    )];
    let output = apply(&spec, daily()).unwrap();

    let buckets: Vec<(String, f64)> = output
        .rows
        .iter()
        .map(|row| {
            (
                row["date"].display_string(),
                row["amount"].as_f64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        buckets,
        vec![
            ("2024-01-01".to_string(), 3.0),
            ("2024-01-08".to_string(), 4.0),
            ("2024-02-05".to_string(), 8.0),
        ]
    );
    assert_eq!(output.column_type("date"), Some(ColumnType::Datetime));
}

#[test]
fn test_resample_monthly_mean_with_target() {
    let spec = vec![TransformStep::new(
        "resample",
        json!({"freq": "M", "on": "date", "agg": "mean", "target": "amount"}),
    )];
    let output = apply(&spec, daily()).unwrap();

    assert_eq!(output.row_count(), 2);
    assert_eq!(output.rows[0]["date"], Value::from("2024-01-01"));
    let january = output.rows[0]["amount"].as_f64().unwrap();
    assert!((january - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(output.rows[1]["amount"], Value::Number(8.0));
}

#[test]
fn test_resample_rejects_unparseable_dates() {
    let data = table(
        &["date", "amount"],
        vec![vec![Value::from("yesterday"), Value::Number(1.0)]],
    );
    let spec = vec![TransformStep::new(
        "resample",
        json!({"freq": "D", "on": "date"}),
    )];
    let err = apply(&spec, data).unwrap_err();
    assert!(matches!(err, Error::Transform { ref op, .. } if op == "resample"));
}

#[test]
fn test_aggregate_statistics() {
    let data = numbers(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);

    let cases = [
        ("sum", 40.0),
        ("mean", 5.0),
        ("count", 8.0),
        ("min", 2.0),
        ("max", 9.0),
    ];
    for (op, expected) in cases {
        let spec = vec![TransformStep::new("aggregate", json!({"op": op, "column": "v"}))];
        let output = apply(&spec, data.clone()).unwrap();
        assert_eq!(output.row_count(), 1);
        assert_eq!(output.rows[0][op], Value::Number(expected), "op {}", op);
    }

    let spec = vec![TransformStep::new("aggregate", json!({"op": "std", "column": "v"}))];
    let output = apply(&spec, data).unwrap();
    let std = output.rows[0]["std"].as_f64().unwrap();
    assert!((std - 2.138_089_935_299_395).abs() < 1e-9);
}

#[test]
fn test_aggregate_std_of_single_value_is_null() {
    let spec = vec![TransformStep::new("aggregate", json!({"op": "std", "column": "v"}))];
    let output = apply(&spec, numbers(&[3.0])).unwrap();
    assert_eq!(output.rows[0]["std"], Value::Null);
}

#[test]
fn test_multi_step_pipeline() {
    let spec = vec![
        TransformStep::new("groupby", json!({"by": "region", "agg": "sum", "target": "sales"})),
        TransformStep::new("aggregate", json!({"op": "max", "column": "sales"})),
    ];
    let pipeline = Pipeline::compile(&spec).unwrap();
    assert_eq!(pipeline.len(), 2);

    let output = pipeline.apply(regional_sales()).unwrap();
    assert_eq!(output.rows[0]["max"], Value::Number(13.0));
}

#[test]
fn test_failure_reports_second_step() {
    let spec = vec![
        TransformStep::new("groupby", json!({"by": "region", "agg": "sum", "target": "sales"})),
        TransformStep::new("rolling_average", json!({"window": 2, "on": "missing"})),
    ];
    let err = apply(&spec, regional_sales()).unwrap_err();
    assert!(matches!(err, Error::Transform { index: 1, ref op, .. } if op == "rolling_average"));
}
