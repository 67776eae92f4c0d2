//! Error types for colorspace configuration and transforms.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for color operations.
pub type ColorResult<T> = Result<T, ColorError>;

/// Errors that can occur while loading configs or building transforms.
#[derive(Debug, Error)]
pub enum ColorError {
    /// I/O error reading a config file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Colorspace absent from the active configuration.
    #[error("colorspace not found in configuration: {name}")]
    ColorSpaceNotFound {
        /// Name that failed to resolve.
        name: String,
    },

    /// Structurally invalid configuration.
    #[error("invalid color configuration: {0}")]
    InvalidConfig(String),

    /// Context already holds the maximum number of keys.
    #[error("context holds at most {max} keys")]
    ContextFull {
        /// Maximum number of keys.
        max: usize,
    },
}

impl ColorError {
    /// Creates a [`ColorSpaceNotFound`](ColorError::ColorSpaceNotFound) error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ColorSpaceNotFound { name: name.into() }
    }
}
