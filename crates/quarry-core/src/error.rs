//! Error types for Quarry
//!
//! Every failure the core raises is one of the kinds below. Backend-native
//! errors (I/O, HTTP, SQL drivers) are converted to [`Error::Fetch`] at the
//! source boundary and never leak through the public API.

use thiserror::Error;

/// Invalid source definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unsupported source type: {0}")]
    UnsupportedType(String),

    #[error("{source_type} source requires '{field}' in config")]
    MissingField { source_type: String, field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown field '{field}' for {source_type} source")]
    UnknownField { source_type: String, field: String },
}

/// Failure at the registry boundary
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Data source '{name}' is already registered")]
    Duplicate { name: String },

    #[error("Invalid configuration for data source '{name}': {source}")]
    InvalidConfig { name: String, source: ConfigError },

    #[error("Failed to load sources from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Data source '{name}' references unresolved variable ${{{variable}}}")]
    UnresolvedVariable { name: String, variable: String },
}

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Data source '{name}' not found. Available: {available}")]
    NotFound { name: String, available: String },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Transform step {index} ({op}) failed: {reason}")]
    Transform {
        index: usize,
        op: String,
        reason: String,
    },

    #[error("Chart error: {0}")]
    Chart(String),
}

impl Error {
    pub fn fetch(reason: impl Into<String>) -> Self {
        Error::Fetch(reason.into())
    }

    pub fn chart(reason: impl Into<String>) -> Self {
        Error::Chart(reason.into())
    }

    pub fn transform(index: usize, op: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Transform {
            index,
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Build a not-found error listing the names that do exist
    pub fn not_found(name: impl Into<String>, available: &[String]) -> Self {
        let available = if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        };
        Error::NotFound {
            name: name.into(),
            available,
        }
    }

    /// Status code a boundary layer should surface to its caller
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 400,
            Error::Registration(RegistrationError::Duplicate { .. }) => 409,
            Error::Registration(RegistrationError::Load { .. }) => 500,
            Error::Registration(_) => 400,
            Error::NotFound { .. } => 404,
            Error::Fetch(_) => 502,
            Error::Transform { .. } => 400,
            Error::Chart(_) => 400,
        }
    }
}

/// Result type for Quarry operations
pub type Result<T> = std::result::Result<T, Error>;
