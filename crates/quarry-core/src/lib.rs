//! Quarry Core - Shared types for the Quarry data access layer
//!
//! This crate provides the fundamental types used across Quarry:
//! - Value types for cell data
//! - `TabularResult`, the uniform shape every source produces
//! - Column type inference and datetime parsing
//! - Error types

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, Error, RegistrationError, Result};
pub use types::{ColumnInfo, ColumnType, Row, TabularResult, Value};
