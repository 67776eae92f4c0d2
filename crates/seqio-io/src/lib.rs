//! # seqio-io
//!
//! Reading and writing image sequences for compositing hosts.
//!
//! - [`SequenceResolver`] - Host time to file path, with boundary and missing-frame policies
//! - [`channels`] - Channel menus, layer grouping and default channel mapping
//! - [`ReaderPipeline`] - Decode a region of a frame into a host buffer
//! - [`WriterPipeline`] - Encode host planes into single or multi-part files
//! - [`Decoder`] / [`Encoder`] - Per-format capability interfaces
//! - [`CodecRegistry`] - Extension lookup over the registered codecs
//! - [`SpecCache`] - Header cache shared between pipelines
//!
//! # Formats
//!
//! | Format | Read | Write | Bit Depths | Parts / Views |
//! |--------|------|-------|------------|---------------|
//! | EXR | Yes | Yes | 16f, 32f, 32u | Yes |
//! | PNG | Yes | Yes | 8, 16 | No |
//! | Memory | Yes | Yes | all | Yes |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seqio_color::ColorConfig;
//! use seqio_io::{CodecRegistry, ReaderPipeline, SpecCache, WriterPipeline};
//!
//! let registry = Arc::new(CodecRegistry::with_builtin());
//! let cache = Arc::new(SpecCache::new());
//! let config = Arc::new(ColorConfig::nuke_default());
//!
//! let mut reader = ReaderPipeline::new(registry.clone(), cache.clone(), config.clone());
//! reader.set_file("plates/shot.####.exr").unwrap();
//!
//! let mut writer = WriterPipeline::new(registry, cache, config);
//! writer.set_file("out/shot.####.png").unwrap();
//! for frame in reader.time_domain().unwrap() {
//!     writer.write_frame(&reader, frame as f64).unwrap();
//! }
//! ```

pub mod cache;
pub mod channels;
pub mod codec;
mod error;
pub mod exr;
pub mod memory;
pub mod params;
pub mod png;
pub mod reader;
pub mod registry;
pub mod resolver;
pub mod sequence;
pub mod writer;

pub use cache::SpecCache;
pub use channels::{ChannelMapping, ChannelMenus, Plane};
pub use codec::{Decoder, Encoder, FormatCaps, ImageInput, ImageOutput};
pub use error::{IoError, IoResult};
pub use params::{Persist, ReaderParams, WriterParams};
pub use reader::{PipelineState, ReaderPipeline, RenderRequest};
pub use registry::CodecRegistry;
pub use resolver::{BoundaryPolicy, MissingFramePolicy, SequenceResolver, TimeMapping, TimeMode};
pub use sequence::{FrameRange, FrameSet, Sequence};
pub use writer::{PlaneSource, WriterPipeline};
