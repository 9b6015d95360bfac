//! Error types for gastos-etl
//!
//! Only infrastructure failures and configuration mismatches are errors.
//! Per-page fetch problems and unreadable raw documents are reported as
//! outcomes and counters instead, so a single bad page never aborts a run.

use thiserror::Error;

/// The main error type for gastos-etl
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ============================================================================
    // Raw Store Errors
    // ============================================================================
    #[error("Raw store error at '{path}': {message}")]
    Store { path: String, message: String },

    // ============================================================================
    // Consolidation Errors
    // ============================================================================
    #[error("Missing partition columns {expected:?}; available columns: {available:?}")]
    MissingPartitionColumns {
        expected: Vec<String>,
        available: Vec<String>,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a raw store error
    pub fn store(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether this error stems from configuration rather than data or I/O
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::InvalidConfigValue { .. }
                | Error::YamlParse(_)
                | Error::InvalidUrl(_)
                | Error::MissingPartitionColumns { .. }
        )
    }
}

/// Result type alias for gastos-etl
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::invalid_value("start_page", "must be >= 1");
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'start_page': must be >= 1"
        );

        let err = Error::store("/tmp/raw/gastos_pagina_1.json", "disk full");
        assert_eq!(
            err.to_string(),
            "Raw store error at '/tmp/raw/gastos_pagina_1.json': disk full"
        );
    }

    #[test]
    fn test_missing_partition_columns_lists_available() {
        let err = Error::MissingPartitionColumns {
            expected: vec!["ano".to_string(), "mes".to_string()],
            available: vec!["ano".to_string(), "valor".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"mes\""));
        assert!(msg.contains("\"valor\""));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_is_configuration() {
        assert!(Error::config("x").is_configuration());
        assert!(!Error::output("x").is_configuration());
        assert!(!Error::Other("x".to_string()).is_configuration());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
