//! Error types for sequence reading and writing.
//!
//! Every failed render or write call surfaces one of these. Only
//! [`IoError::Config`] is recoverable: the previous colorspace stays in
//! place and the message is kept for display.

use seqio_color::ColorError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reader/writer pipeline error.
#[derive(Debug, Error)]
pub enum IoError {
    /// Missing, unreadable or unrecognized file.
    #[error("cannot open {}: {reason}", path.display())]
    FileOpen {
        /// Offending file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Requested plane or component layout is not one the codec handles.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// Time outside the sequence under an `Error` policy, or no usable frame range.
    #[error("sequence range: {0}")]
    SequenceRange(String),

    /// Output structure the target format cannot store. Raised before any write.
    #[error("{0}")]
    Capability(String),

    /// Colorspace lookup failure.
    #[error("colorspace: {0}")]
    Config(#[from] ColorError),

    /// Codec failed while reading pixels or headers.
    #[error("decode error: {0}")]
    Decode(String),

    /// Codec failed while writing.
    #[error("encode error: {0}")]
    Encode(String),

    /// Bad filename pattern.
    #[error("parse error: {0}")]
    Parse(String),

    /// Persisted parameter document could not be read or written.
    #[error("parameters: {0}")]
    Params(#[from] serde_yaml::Error),

    /// Inconsistent pixel layout.
    #[error("pixel layout: {0}")]
    Layout(#[from] seqio_core::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IoError {
    /// Builds a [`IoError::FileOpen`].
    pub fn file_open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::FileOpen {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// False for errors that leave the pipeline usable with its previous settings.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IoError::Config(_))
    }
}

/// Result type for pipeline operations.
pub type IoResult<T> = Result<T, IoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_recoverable() {
        let err: IoError = ColorError::not_found("sRGB").into();
        assert!(!err.is_fatal());
        assert!(IoError::SequenceRange("x".into()).is_fatal());
        let msg = IoError::file_open("/tmp/a.0001.exr", "no such file").to_string();
        assert!(msg.contains("a.0001.exr"));
    }
}
