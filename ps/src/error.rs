//! Store error types

use std::path::PathBuf;
use thiserror::Error;

use crate::import::PayloadFormat;

/// Errors that can occur while loading, editing, importing or saving a store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template not found: {id}")]
    NotFound { id: String },

    #[error("Export to {0} is not supported")]
    UnsupportedExport(PayloadFormat),
}

impl StoreError {
    /// Wrap an I/O error with the path it happened on
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a malformed payload or file (FormatError class)
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            StoreError::Json(_) | StoreError::Yaml(_) | StoreError::Csv(_) | StoreError::InvalidStructure(_)
        )
    }

    /// Check if this is an input validation failure
    pub fn is_validation_error(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    /// Check if this is an underlying I/O failure
    pub fn is_storage_error(&self) -> bool {
        matches!(self, StoreError::Storage { .. })
    }
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
