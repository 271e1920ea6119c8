//! Error taxonomy for the persistence layer.
//!
//! Callers branch on the variant: `load_or_default` only recovers from
//! [`Error::NotFound`], everything else aborts the operation.

use std::io;

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A file, folder or installation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The tree does not have the shape the target type declares.
    #[error("{path}: {message}")]
    Schema { path: String, message: String },

    /// The migration chain is broken or a stored version cannot be resolved.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// No unambiguous version marker exists for the running product.
    #[error("cannot determine product version: {0}")]
    SingleSourceVersion(String),

    /// The stored payload was written by a newer schema than this build knows.
    #[error("{file}: stored version {stored} is newer than supported version {current}")]
    UnsupportedDowngrade {
        file: String,
        stored: u64,
        current: u32,
    },

    /// The filename extension does not map to a known format.
    #[error("unknown extension: {0}")]
    UnknownFormat(String),

    #[error("invalid upgrade script {id}: {message}")]
    InvalidUpgrade { id: String, message: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// SchemaError at `path` (dotted field path, empty for the root).
    pub fn schema(path: impl ToString, message: impl Into<String>) -> Self {
        let path = path.to_string();
        Error::Schema {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path
            },
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_root_when_path_empty() {
        let err = Error::schema("", "expected mapping");
        assert_eq!(err.to_string(), "<root>: expected mapping");
    }

    #[test]
    fn not_found_is_detectable() {
        assert!(Error::NotFound("config.yml".to_string()).is_not_found());
        assert!(!Error::IllegalState("x".to_string()).is_not_found());
    }
}
