//! SQL table sources (PostgreSQL and SQLite)
//!
//! Every fetch introspects the table through the database catalog first.
//! Projected, filtered and ordered columns must appear in that catalog, and
//! only catalog-provided names are ever spliced into the statement (double
//! quoted). Values and the row limit are always bound as parameters.

use super::config::{ConfigMap, SqlConfig, SqlProvider};
use super::query::{FilterOperator, QueryParams, SortDirection};
use super::DataSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quarry_core::{ColumnInfo, ColumnType, ConfigError, Error, Result, Row, TabularResult, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row as _;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Rows sampled by `get_schema` for untyped SQLite columns
const SCHEMA_SAMPLE_ROWS: usize = 10;

/// Connection pool for one of the supported providers
enum SqlPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// A column as reported by the database catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogColumn {
    pub name: String,
    /// Declared type; empty for untyped SQLite columns
    pub declared_type: String,
}

/// Value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A parameterized SELECT ready to execute
#[derive(Debug)]
struct SelectStatement {
    sql: String,
    binds: Vec<BindValue>,
    columns: Vec<CatalogColumn>,
}

/// Bind every value in `$binds` onto an sqlx query, in order
macro_rules! bind_all {
    ($query:expr, $binds:expr) => {{
        let mut query = $query;
        for bind in $binds {
            query = match bind {
                BindValue::Null => query.bind(Option::<String>::None),
                BindValue::Bool(b) => query.bind(*b),
                BindValue::Int(n) => query.bind(*n),
                BindValue::Float(n) => query.bind(*n),
                BindValue::Text(s) => query.bind(s.as_str()),
            };
        }
        query
    }};
}

/// Table in a PostgreSQL or SQLite database
pub struct SqlSource {
    name: String,
    config: SqlConfig,
    provider: SqlProvider,
    pool: OnceCell<SqlPool>,
}

impl std::fmt::Debug for SqlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSource")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("table", &self.config.table)
            .field("connected", &self.pool.initialized())
            .finish()
    }
}

impl SqlSource {
    /// Create the source; the pool is opened on first use
    pub fn new(
        name: impl Into<String>,
        config: SqlConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let provider = config
            .resolved_provider()
            .ok_or_else(|| ConfigError::InvalidField {
                field: "connection_string".to_string(),
                reason: "cannot infer provider".to_string(),
            })?;

        Ok(Self {
            name: name.into(),
            config,
            provider,
            pool: OnceCell::new(),
        })
    }

    /// Validate a raw config map for a SQL source
    pub fn validate_config(config: &ConfigMap) -> std::result::Result<SqlConfig, ConfigError> {
        SqlConfig::from_map(config)
    }

    pub fn config(&self) -> &SqlConfig {
        &self.config
    }

    pub fn provider(&self) -> SqlProvider {
        self.provider
    }

    async fn pool(&self) -> Result<&SqlPool> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<SqlPool> {
        let acquire_timeout = Duration::from_millis(self.config.acquire_timeout_ms);

        match self.provider {
            SqlProvider::PostgreSQL => {
                tracing::info!("Creating PostgreSQL connection pool for source '{}'", self.name);
                let pool = PgPoolOptions::new()
                    .max_connections(self.config.pool_size)
                    .acquire_timeout(acquire_timeout)
                    .connect(&self.config.connection_string)
                    .await
                    .map_err(|e| Error::fetch(format!("Failed to connect to PostgreSQL: {}", e)))?;
                tracing::info!(
                    "PostgreSQL connection pool created (max_connections: {})",
                    self.config.pool_size
                );
                Ok(SqlPool::Postgres(pool))
            }
            SqlProvider::SQLite => {
                tracing::info!("Creating SQLite connection pool for source '{}'", self.name);
                let connection_string = &self.config.connection_string;
                let options = if connection_string.starts_with("sqlite:") {
                    SqliteConnectOptions::from_str(connection_string).map_err(|e| {
                        Error::fetch(format!("Invalid SQLite connection string: {}", e))
                    })?
                } else {
                    SqliteConnectOptions::new().filename(connection_string)
                };

                let pool = SqlitePoolOptions::new()
                    .max_connections(self.config.pool_size)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options.read_only(true))
                    .await
                    .map_err(|e| Error::fetch(format!("Failed to connect to SQLite: {}", e)))?;
                tracing::info!(
                    "SQLite connection pool created (max_connections: {})",
                    self.config.pool_size
                );
                Ok(SqlPool::Sqlite(pool))
            }
        }
    }

    /// Columns of the configured table, in declaration order
    async fn introspect(&self, pool: &SqlPool) -> Result<Vec<CatalogColumn>> {
        let columns: Vec<CatalogColumn> = match pool {
            SqlPool::Sqlite(pool) => {
                sqlx::query("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
                    .bind(&self.config.table)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| Error::fetch(format!("Failed to introspect table: {}", e)))?
                    .iter()
                    .map(|row| -> std::result::Result<CatalogColumn, sqlx::Error> {
                        Ok(CatalogColumn {
                            name: row.try_get::<String, _>(0)?,
                            declared_type: row
                                .try_get::<Option<String>, _>(1)?
                                .unwrap_or_default(),
                        })
                    })
                    .collect::<std::result::Result<_, sqlx::Error>>()
                    .map_err(|e| Error::fetch(format!("Failed to read catalog: {}", e)))?
            }
            SqlPool::Postgres(pool) => sqlx::query(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
            )
            .bind(&self.config.schema)
            .bind(&self.config.table)
            .fetch_all(pool)
            .await
            .map_err(|e| Error::fetch(format!("Failed to introspect table: {}", e)))?
            .iter()
            .map(|row| -> std::result::Result<CatalogColumn, sqlx::Error> {
                Ok(CatalogColumn {
                    name: row.try_get::<String, _>(0)?,
                    declared_type: row.try_get::<String, _>(1)?,
                })
            })
            .collect::<std::result::Result<_, sqlx::Error>>()
            .map_err(|e| Error::fetch(format!("Failed to read catalog: {}", e)))?,
        };

        if columns.is_empty() {
            return Err(Error::fetch(format!(
                "Table '{}' does not exist or has no columns",
                self.config.table
            )));
        }
        Ok(columns)
    }

    fn placeholder(&self, index: usize, column: Option<&CatalogColumn>) -> String {
        match self.provider {
            SqlProvider::SQLite => format!("?{}", index),
            SqlProvider::PostgreSQL => match column.filter(|c| is_castable(&c.declared_type)) {
                Some(c) => format!("CAST(${} AS {})", index, c.declared_type),
                None => format!("${}", index),
            },
        }
    }

    fn table_reference(&self) -> String {
        match self.provider {
            SqlProvider::SQLite => quote_identifier(&self.config.table),
            SqlProvider::PostgreSQL => format!(
                "{}.{}",
                quote_identifier(&self.config.schema),
                quote_identifier(&self.config.table)
            ),
        }
    }

    fn lookup<'c>(&self, catalog: &'c [CatalogColumn], name: &str) -> Result<&'c CatalogColumn> {
        catalog.iter().find(|c| c.name == name).ok_or_else(|| {
            Error::fetch(format!(
                "Unknown column '{}' in table '{}'. Available: {}",
                name,
                self.config.table,
                catalog
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Build the SELECT for `params`, rejecting names absent from `catalog`
    fn build_select(
        &self,
        catalog: &[CatalogColumn],
        params: &QueryParams,
    ) -> Result<SelectStatement> {
        let columns: Vec<CatalogColumn> = match &params.columns {
            Some(names) => names
                .iter()
                .map(|n| self.lookup(catalog, n).cloned())
                .collect::<Result<_>>()?,
            None => catalog.to_vec(),
        };

        let mut binds: Vec<BindValue> = Vec::new();
        let mut conditions: Vec<String> = Vec::new();

        for filter in &params.filters {
            let column = self.lookup(catalog, &filter.field)?;
            let quoted = quote_identifier(&column.name);

            let condition = match (filter.operator, &filter.value) {
                (FilterOperator::Eq, Value::Null) => format!("{} IS NULL", quoted),
                (FilterOperator::Ne, Value::Null) => format!("{} IS NOT NULL", quoted),
                (FilterOperator::In, Value::Array(items)) => {
                    if items.is_empty() {
                        "1 = 0".to_string()
                    } else {
                        let mut placeholders = Vec::with_capacity(items.len());
                        for item in items {
                            binds.push(to_bind(item, &filter.field)?);
                            placeholders.push(self.placeholder(binds.len(), Some(column)));
                        }
                        format!("{} IN ({})", quoted, placeholders.join(", "))
                    }
                }
                (FilterOperator::Contains, value) => {
                    let needle = escape_like(&value.display_string().to_lowercase());
                    binds.push(BindValue::Text(format!("%{}%", needle)));
                    format!(
                        "LOWER(CAST({} AS TEXT)) LIKE {} ESCAPE '\\'",
                        quoted,
                        self.placeholder(binds.len(), None)
                    )
                }
                (operator, value) => {
                    binds.push(to_bind(value, &filter.field)?);
                    let placeholder = self.placeholder(binds.len(), Some(column));
                    match operator {
                        FilterOperator::Ne => {
                            format!("({} <> {} OR {} IS NULL)", quoted, placeholder, quoted)
                        }
                        _ => format!("{} {} {}", quoted, comparison(operator), placeholder),
                    }
                }
            };
            conditions.push(condition);
        }

        let projection = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {} FROM {}", projection, self.table_reference());

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some((name, direction)) = params.order() {
            let column = self.lookup(catalog, name)?;
            let direction = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY {} {} NULLS LAST",
                quote_identifier(&column.name),
                direction
            ));
        }

        let limit = params.effective_limit(self.config.max_rows);
        binds.push(BindValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT {}", self.placeholder(binds.len(), None)));

        Ok(SelectStatement {
            sql,
            binds,
            columns,
        })
    }

    async fn execute(&self, pool: &SqlPool, statement: &SelectStatement) -> Result<Vec<Row>> {
        let names: Vec<&str> = statement.columns.iter().map(|c| c.name.as_str()).collect();

        let rows: Vec<Row> = match pool {
            SqlPool::Sqlite(pool) => bind_all!(sqlx::query(&statement.sql), &statement.binds)
                .fetch_all(pool)
                .await
                .map_err(|e| Error::fetch(format!("Query failed: {}", e)))?
                .iter()
                .map(|row| decode_row(&names, |idx| decode_sqlite(row, idx)))
                .collect(),
            SqlPool::Postgres(pool) => bind_all!(sqlx::query(&statement.sql), &statement.binds)
                .fetch_all(pool)
                .await
                .map_err(|e| Error::fetch(format!("Query failed: {}", e)))?
                .iter()
                .map(|row| decode_row(&names, |idx| decode_postgres(row, idx)))
                .collect(),
        };
        Ok(rows)
    }
}

#[async_trait]
impl DataSource for SqlSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, params: &QueryParams) -> Result<TabularResult> {
        let pool = self.pool().await?;
        let catalog = self.introspect(pool).await?;
        let statement = self.build_select(&catalog, params)?;

        tracing::debug!("Executing SQL for source '{}': {}", self.name, statement.sql);
        let rows = self.execute(pool, &statement).await?;

        let columns = statement
            .columns
            .iter()
            .map(|c| {
                let column_type = ColumnType::from_declared(&c.declared_type).unwrap_or_else(|| {
                    ColumnType::infer(rows.iter().filter_map(|r| r.get(&c.name)))
                });
                (c.name.clone(), column_type)
            })
            .collect();

        Ok(TabularResult::with_types(&self.name, columns, rows))
    }

    /// Types come from the catalog; rows are read only to type SQLite
    /// columns declared without a type
    async fn get_schema(&self) -> Result<Vec<ColumnInfo>> {
        let pool = self.pool().await?;
        let catalog = self.introspect(pool).await?;

        let untyped: Vec<&str> = catalog
            .iter()
            .filter(|c| ColumnType::from_declared(&c.declared_type).is_none())
            .map(|c| c.name.as_str())
            .collect();

        let sampled = if untyped.is_empty() {
            Vec::new()
        } else {
            let params = QueryParams::new()
                .with_columns(untyped.iter().copied())
                .with_limit(SCHEMA_SAMPLE_ROWS);
            let statement = self.build_select(&catalog, &params)?;
            let rows = self.execute(pool, &statement).await?;
            let columns = untyped
                .iter()
                .map(|name| {
                    let column_type =
                        ColumnType::infer(rows.iter().filter_map(|r| r.get(*name)));
                    (name.to_string(), column_type)
                })
                .collect();
            TabularResult::with_types(&self.name, columns, rows).columns
        };

        Ok(catalog
            .iter()
            .map(|c| match ColumnType::from_declared(&c.declared_type) {
                Some(column_type) => ColumnInfo::new(&c.name, column_type),
                None => sampled
                    .iter()
                    .find(|info| info.name == c.name)
                    .cloned()
                    .unwrap_or_else(|| ColumnInfo::new(&c.name, ColumnType::Categorical)),
            })
            .collect())
    }
}

fn decode_row(names: &[&str], decode: impl Fn(usize) -> Value) -> Row {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.to_string(), decode(idx)))
        .collect()
}

fn decode_sqlite(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        v.map(|n| Value::Number(n as f64)).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        v.map(Value::Number).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        v.map(Value::Bool).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        v.map(Value::String).unwrap_or(Value::Null)
    } else {
        tracing::warn!("Unsupported SQLite value in column {}, returning null", idx);
        Value::Null
    }
}

fn decode_postgres(row: &PgRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        v.map(|n| Value::Number(n as f64)).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        v.map(|n| Value::Number(n as f64)).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        v.map(|n| Value::Number(n as f64)).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        v.map(Value::Number).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        v.map(|n| Value::Number(n as f64)).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<bigdecimal::BigDecimal>, _>(idx) {
        v.and_then(|bd| bd.to_string().parse::<f64>().ok())
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        v.map(Value::Bool).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        v.map(Value::String).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        v.map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        v.map(|dt| Value::String(dt.to_rfc3339())).unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null)
    } else {
        tracing::warn!("Unsupported PostgreSQL type in column {}, returning null", idx);
        Value::Null
    }
}

fn to_bind(value: &Value, field: &str) -> Result<BindValue> {
    match value {
        Value::Null => Ok(BindValue::Null),
        Value::Bool(b) => Ok(BindValue::Bool(*b)),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(BindValue::Int(*n as i64)),
        Value::Number(n) => Ok(BindValue::Float(*n)),
        Value::String(s) => Ok(BindValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(Error::fetch(format!(
            "Filter on '{}' needs a scalar value",
            field
        ))),
    }
}

fn comparison(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Eq | FilterOperator::In => "=",
        FilterOperator::Ne => "<>",
        FilterOperator::Gt => ">",
        FilterOperator::Gte => ">=",
        FilterOperator::Lt => "<",
        FilterOperator::Lte => "<=",
        FilterOperator::Contains => "LIKE",
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Catalog type names safe to use in a CAST (e.g. `timestamp without time zone`)
fn is_castable(declared: &str) -> bool {
    !declared.is_empty() && declared.chars().all(|c| c.is_ascii_lowercase() || c == ' ')
}
