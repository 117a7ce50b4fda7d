//! SQL sources against a real SQLite database file

use quarry_runtime::datasource::ConfigMap;
use quarry_runtime::{
    ColumnType, DataSource, Error, Filter, FilterOperator, QueryParams, Source, SourceConfig,
    SourceType, Value,
};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use tempfile::TempDir;

async fn seed_database(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE sales (id INTEGER PRIMARY KEY, day DATE, region TEXT, amount REAL, note)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let rows: [(i64, &str, &str, Option<f64>, Option<&str>); 5] = [
        (1, "2024-01-01", "east", Some(10.0), Some("first")),
        (2, "2024-01-02", "west", Some(5.5), None),
        (3, "2024-01-03", "east", Some(3.0), Some("100% organic")),
        (4, "2024-01-04", "north", None, Some("late")),
        (5, "2024-01-05", "west", Some(7.25), Some("O'Brien")),
    ];
    for (id, day, region, amount, note) in rows {
        sqlx::query("INSERT INTO sales (id, day, region, amount, note) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(id)
            .bind(day)
            .bind(region)
            .bind(amount)
            .bind(note)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}

struct Fixture {
    _dir: TempDir,
    connection_string: String,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shop.db");
    seed_database(&path).await;
    Fixture {
        connection_string: format!("sqlite://{}", path.display()),
        _dir: dir,
    }
}

fn source(fixture: &Fixture, extra: serde_json::Value) -> Source {
    let mut config: ConfigMap = json!({
        "connection_string": fixture.connection_string,
        "table": "sales",
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    if let Some(extra) = extra.as_object() {
        config.extend(extra.clone());
    }
    Source::from_config(&SourceConfig::new("shop", SourceType::Sql, config)).unwrap()
}

fn ids(result: &quarry_runtime::TabularResult) -> Vec<f64> {
    result.values("id").filter_map(Value::as_f64).collect()
}

#[tokio::test]
async fn test_fetch_all_rows_in_declaration_order() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source.fetch(&QueryParams::new()).await.unwrap();

    assert_eq!(result.source, "shop");
    assert_eq!(result.row_count(), 5);
    assert_eq!(
        result.column_names(),
        vec!["id", "day", "region", "amount", "note"]
    );
    assert_eq!(result.rows[3]["amount"], Value::Null);
    assert_eq!(result.rows[4]["note"], Value::from("O'Brien"));
}

#[tokio::test]
async fn test_filters_order_and_limit() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let params = QueryParams::new()
        .with_filter(Filter::new("amount", FilterOperator::Gte, Value::Number(5.0)))
        .with_order_by("-amount")
        .with_limit(2);
    let result = source.fetch(&params).await.unwrap();
    assert_eq!(ids(&result), vec![1.0, 5.0]);

    let params = QueryParams::new()
        .with_filter(Filter::new(
            "region",
            FilterOperator::In,
            Value::Array(vec![Value::from("east"), Value::from("north")]),
        ))
        .with_order_by("id");
    let result = source.fetch(&params).await.unwrap();
    assert_eq!(ids(&result), vec![1.0, 3.0, 4.0]);
}

#[tokio::test]
async fn test_ordering_puts_nulls_last() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source
        .fetch(&QueryParams::new().with_order_by("amount"))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec![3.0, 2.0, 5.0, 1.0, 4.0]);
}

#[tokio::test]
async fn test_null_and_not_equal_filters() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source
        .fetch(&QueryParams::new().with_filter(Filter::eq("note", Value::Null)))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec![2.0]);

    // Null notes still match `!=`
    let params = QueryParams::new()
        .with_filter(Filter::new("note", FilterOperator::Ne, Value::from("late")))
        .with_order_by("id");
    let result = source.fetch(&params).await.unwrap();
    assert_eq!(ids(&result), vec![1.0, 2.0, 3.0, 5.0]);
}

#[tokio::test]
async fn test_contains_is_case_insensitive_and_escaped() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source
        .fetch(&QueryParams::new().with_filter(Filter::new(
            "note",
            FilterOperator::Contains,
            Value::from("FIRST"),
        )))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec![1.0]);

    // `%` is matched literally
    let result = source
        .fetch(&QueryParams::new().with_filter(Filter::new(
            "note",
            FilterOperator::Contains,
            Value::from("0%"),
        )))
        .await
        .unwrap();
    assert_eq!(ids(&result), vec![3.0]);
}

#[tokio::test]
async fn test_injection_in_value_is_bound() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source
        .fetch(&QueryParams::new().with_filter(Filter::eq(
            "region",
            Value::from("east' OR '1'='1"),
        )))
        .await
        .unwrap();
    assert!(result.is_empty());

    // The table is still intact
    let result = source.fetch(&QueryParams::new()).await.unwrap();
    assert_eq!(result.row_count(), 5);
}

#[tokio::test]
async fn test_unknown_column_is_fetch_error() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let err = source
        .fetch(&QueryParams::new().with_filter(Filter::eq(
            "region; DROP TABLE sales",
            Value::from("east"),
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Fetch(ref msg) if msg.contains("Unknown column")));
    assert_eq!(err.status_code(), 502);

    let err = source
        .fetch(&QueryParams::new().with_columns(vec!["id".to_string(), "secret".to_string()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
}

#[tokio::test]
async fn test_missing_table_is_fetch_error() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({"table": "ghosts"}));

    let err = source.fetch(&QueryParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(ref msg) if msg.contains("ghosts")));
}

#[tokio::test]
async fn test_missing_database_file_is_fetch_error() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture {
        connection_string: format!("sqlite://{}", dir.path().join("absent.db").display()),
        _dir: dir,
    };
    let source = source(&fixture, json!({}));

    let err = source.fetch(&QueryParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
}

#[tokio::test]
async fn test_max_rows_caps_result() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({"max_rows": 2}));

    let result = source
        .fetch(&QueryParams::new().with_limit(50))
        .await
        .unwrap();
    assert_eq!(result.row_count(), 2);
}

#[tokio::test]
async fn test_projection_keeps_requested_order() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let result = source
        .fetch(&QueryParams::new().with_columns(vec!["region".to_string(), "id".to_string()]))
        .await
        .unwrap();
    assert_eq!(result.column_names(), vec!["region", "id"]);
    assert_eq!(result.rows[0].len(), 2);
}

#[tokio::test]
async fn test_schema_uses_declared_types() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));

    let schema = source.get_schema().await.unwrap();
    let types: Vec<(&str, ColumnType)> = schema
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();

    assert_eq!(
        types,
        vec![
            ("id", ColumnType::Numeric),
            ("day", ColumnType::Datetime),
            ("region", ColumnType::Categorical),
            ("amount", ColumnType::Numeric),
            // Untyped column falls back to inference over sampled values
            ("note", ColumnType::Categorical),
        ]
    );
    // Declared columns are described from the catalog alone
    assert!(schema[..4].iter().all(|c| c.sample_values.is_empty()));
    assert_eq!(schema[4].sample_values.len(), 3);
    assert!(schema[4].sample_values.contains(&Value::from("first")));
}

#[tokio::test]
async fn test_schema_of_empty_table_comes_from_catalog() {
    let fixture = fixture().await;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&fixture.connection_string)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE returns (id INTEGER, returned_at TIMESTAMP, reason TEXT, refund NUMERIC)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let config: ConfigMap = json!({
        "connection_string": fixture.connection_string,
        "table": "returns",
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    let source =
        Source::from_config(&SourceConfig::new("returns", SourceType::Sql, config)).unwrap();

    let schema = source.get_schema().await.unwrap();
    let types: Vec<(&str, ColumnType)> = schema
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();
    assert_eq!(
        types,
        vec![
            ("id", ColumnType::Numeric),
            ("returned_at", ColumnType::Datetime),
            ("reason", ColumnType::Categorical),
            ("refund", ColumnType::Numeric),
        ]
    );
}

#[tokio::test]
async fn test_pool_is_reused_across_fetches() {
    let fixture = fixture().await;
    let source = source(&fixture, json!({}));
    source.fetch(&QueryParams::new().with_limit(1)).await.unwrap();

    let result = source.fetch(&QueryParams::new()).await.unwrap();
    assert_eq!(result.row_count(), 5);
}
