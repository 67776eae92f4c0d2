//! # seqio-core
//!
//! Core types for image-sequence I/O.
//!
//! - [`Rect`] - Half-open rectangles in host (y-up) space
//! - [`BitDepth`], [`DataFormat`] - Stored precision and in-memory sample type
//! - [`Components`], [`Premult`] - What a buffer carries and how alpha relates to color
//! - [`PixelView`], [`PixelViewMut`] - Borrowed views with signed row strides
//! - [`PixelBuffer`] - Scoped `f32` staging memory
//! - [`ImageSpec`] - Per-sub-image description and metadata
//! - [`transfer`] - Copy, premultiply, scale and fill over views
//!
//! ## Crate Structure
//!
//! ```text
//! seqio-core (this crate)
//!    ^
//!    +-- seqio-color (colorspace adapter)
//!    +-- seqio-io (codecs, sequences, pipelines)
//!    +-- seqio-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod buffer;
pub mod error;
pub mod format;
pub mod pixel;
pub mod rect;
pub mod spec;
pub mod transfer;
pub mod view;

pub use buffer::{PixelBuffer, RowOrder};
pub use error::{Error, Result};
pub use format::{BitDepth, DataFormat};
pub use pixel::{Components, Premult};
pub use rect::Rect;
pub use spec::{attr, AttrValue, ImageSpec};
pub use transfer::SingleChannelRole;
pub use view::{Layout, PixelView, PixelViewMut};

/// Prelude module for convenient imports.
///
/// ```
/// use seqio_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::buffer::{PixelBuffer, RowOrder};
    pub use crate::error::{Error, Result};
    pub use crate::format::{BitDepth, DataFormat};
    pub use crate::pixel::{Components, Premult};
    pub use crate::rect::Rect;
    pub use crate::spec::{attr, AttrValue, ImageSpec};
    pub use crate::view::{PixelView, PixelViewMut};
}
