//! Type definitions
//!
//! - `value`: cell values
//! - `table`: tabular results and column metadata
//! - `datetime`: datetime parsing used for type inference

pub mod datetime;
pub mod table;
pub mod value;

pub use datetime::parse_datetime;
pub use table::{ColumnInfo, ColumnType, Row, TabularResult};
pub use value::Value;
