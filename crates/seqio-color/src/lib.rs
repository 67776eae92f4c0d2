//! # seqio-color
//!
//! Colorspace handling for image-sequence readers and writers.
//!
//! - [`ColorEngine`] - Capability interface over a color-management engine
//! - [`ColorConfig`] - Built-in engine loaded from YAML (or one of the bundled configs)
//! - [`Context`] - Up to four `$KEY` substitutions
//! - [`Processor`] - Immutable transform applied to working buffers
//! - [`ColorConcept`] - Static alias tables per abstract encoding
//! - [`detect`] - Metadata-driven inference of the input encoding
//! - [`ColorTransformAdapter`] - Per-instance state tying it together
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use seqio_color::{ColorConfig, ColorTransformAdapter, Direction};
//!
//! let mut adapter = ColorTransformAdapter::new(Arc::new(ColorConfig::nuke_default()));
//! adapter.set_colorspace(Direction::Input, "sRGB").unwrap();
//! assert!(!adapter.is_identity());
//! ```

#![warn(missing_docs)]

pub mod adapter;
pub mod aliases;
pub mod config;
pub mod context;
pub mod curve;
pub mod detect;
pub mod engine;
pub mod error;
pub mod processor;

pub use adapter::{ColorTransformAdapter, ColorspaceState, Direction};
pub use aliases::ColorConcept;
pub use config::{roles, ColorConfig, ColorSpaceDef};
pub use context::Context;
pub use curve::{Curve, CurveKind};
pub use engine::ColorEngine;
pub use error::{ColorError, ColorResult};
pub use processor::{Processor, ProcessorOp};
