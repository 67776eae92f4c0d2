//! Error types for seqio-core operations.
//!
//! Pixel views validate their layout when constructed; everything that can
//! go wrong at that point is reported through [`Error`]. Region violations
//! inside the transfer engine are programming errors and panic instead.
//!
//! # Usage
//!
//! ```rust
//! use seqio_core::{DataFormat, Error, PixelView, Rect};
//!
//! let data = vec![0u8; 16];
//! // 4x4 RGBA f32 does not fit in 16 bytes
//! let err = PixelView::new(&data, Rect::from_size(4, 4), 4, DataFormat::F32, 64).unwrap_err();
//! assert!(matches!(err, Error::ViewOutOfRange { .. }));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while describing pixel memory.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid image dimensions.
    ///
    /// Returned when a dimension is negative or the buffer size would
    /// overflow.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: i64,
        /// Requested height
        height: i64,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Row stride is too small for the row length.
    ///
    /// Rows may be stored top-down or bottom-up, so only the magnitude
    /// of the stride is checked.
    #[error("stride {stride} is less than minimum {min_stride} bytes per row")]
    InvalidStride {
        /// Provided stride
        stride: isize,
        /// Minimum required stride magnitude
        min_stride: usize,
    },

    /// The described layout reaches outside the backing slice.
    #[error("view needs bytes {first}..{end} but buffer holds {len}")]
    ViewOutOfRange {
        /// First byte touched
        first: isize,
        /// One past the last byte touched
        end: isize,
        /// Backing slice length
        len: usize,
    },

    /// Channel selection does not exist in the view.
    #[error("channels {first}..{end} out of range for {channels}-channel view")]
    ChannelRange {
        /// First channel requested
        first: usize,
        /// One past the last channel requested
        end: usize,
        /// Channels present
        channels: usize,
    },

    /// Buffer data length does not match its declared layout.
    #[error("buffer holds {got} samples, layout needs {expected}")]
    SampleCount {
        /// Samples required by the layout
        expected: usize,
        /// Samples provided
        got: usize,
    },
}

impl Error {
    /// Creates an [`InvalidDimensions`](Error::InvalidDimensions) error.
    pub fn invalid_dimensions(width: i64, height: i64, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_dimensions(-1, 4, "negative width");
        assert_eq!(err.to_string(), "invalid dimensions: -1x4 (negative width)");

        let err = Error::InvalidStride {
            stride: -8,
            min_stride: 16,
        };
        assert!(err.to_string().contains("-8"));
        assert!(err.to_string().contains("16"));
    }
}
