use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum GadgetError {
    #[error("Invalid gadget name: {0:?}")]
    InvalidName(String),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate binding {name} in config {config}")]
    DuplicateBinding { config: String, name: String },

    #[error("Duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gadget {0} has been torn down")]
    TornDown(String),

    #[error("Config {config} applied with {} failure(s)", .errors.len())]
    Apply {
        config: String,
        errors: Vec<GadgetError>,
    },

    #[error("Teardown finished with {} failure(s)", .errors.len())]
    Teardown { errors: Vec<GadgetError> },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GadgetError {
    /// Wrap an I/O failure with the path it happened on
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Failures collected by an aggregate error, or just `self`
    pub fn failures(&self) -> &[GadgetError] {
        match self {
            Self::Apply { errors, .. } | Self::Teardown { errors } => errors,
            other => std::slice::from_ref(other),
        }
    }
}

/// Result type alias for gadget operations
pub type Result<T> = std::result::Result<T, GadgetError>;
