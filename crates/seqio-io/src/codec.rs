//! Codec capability interfaces.
//!
//! The pipelines never depend on a concrete format. They ask a
//! [`CodecRegistry`](crate::registry::CodecRegistry) for a [`Decoder`] or
//! [`Encoder`] and talk to the handles those return.
//!
//! # Coordinates
//!
//! Codecs work in file coordinates: rows counted down from the top of the
//! display window. Views handed to [`ImageInput::read_region`] and
//! [`ImageOutput::write_image`] are addressed that way, whatever their
//! memory layout.

use std::cmp::Reverse;
use std::ops::Range;
use std::path::Path;

use seqio_core::{BitDepth, ImageSpec, PixelView, PixelViewMut, Rect};

use crate::sequence::{FrameRange, FrameSet, Sequence};
use crate::IoResult;

/// An open file being read. Dropping it closes the file.
pub trait ImageInput: Send {
    /// Sub-image descriptions, in file order.
    fn specs(&self) -> &[ImageSpec];

    /// Reads `region` of channels `channels` of `sub_image` into `dst`.
    ///
    /// `dst` must have exactly `channels.len()` channels and bounds equal to
    /// `region`. Pixels of `region` outside the data window are left as they are.
    fn read_region(
        &mut self,
        sub_image: usize,
        region: Rect,
        channels: Range<usize>,
        dst: &mut PixelViewMut<'_>,
    ) -> IoResult<()>;
}

/// Read side of a format.
pub trait Decoder: Send + Sync {
    /// Human-readable format name.
    fn format_name(&self) -> &'static str;

    /// Lowercase extensions without dots.
    fn extensions(&self) -> &'static [&'static str];

    /// Opens a file for reading.
    fn open(&self, path: &Path) -> IoResult<Box<dyn ImageInput>>;

    /// Sub-image descriptions of `path`. Formats that can read headers
    /// without decoding pixels override this.
    fn read_specs(&self, path: &Path) -> IoResult<Vec<ImageSpec>> {
        Ok(self.open(path)?.specs().to_vec())
    }

    /// Opens one frame of a multi-frame stream file.
    fn open_frame(&self, path: &Path, _frame: i32) -> IoResult<Box<dyn ImageInput>> {
        self.open(path)
    }

    /// Native frame range when `path` is a single-file stream.
    fn stream_frame_range(&self, _path: &Path) -> IoResult<Option<FrameRange>> {
        Ok(None)
    }

    /// Frames of `sequence` that are present.
    fn list_frames(&self, sequence: &Sequence) -> IoResult<FrameSet> {
        sequence.discover_frames()
    }
}

/// What an encoder can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCaps {
    /// Several independent parts per file.
    pub multi_image: bool,
    /// Several views inside one part.
    pub multi_view: bool,
    /// Tiled storage.
    pub tiles: bool,
    /// Any channel count; otherwise 1 to 4 channels.
    pub arbitrary_channels: bool,
    /// Color is stored premultiplied by alpha.
    pub associated_alpha: bool,
    /// Supported precisions, preferred last.
    pub bit_depths: &'static [BitDepth],
}

impl FormatCaps {
    /// True if `depth` can be stored as is.
    pub fn supports_depth(&self, depth: BitDepth) -> bool {
        self.bit_depths.contains(&depth)
    }

    /// `depth` or the closest depth this format stores.
    pub fn closest_depth(&self, depth: BitDepth) -> BitDepth {
        if self.supports_depth(depth) {
            return depth;
        }
        self.bit_depths
            .iter()
            .copied()
            .filter(|d| d.is_float() == depth.is_float())
            .min_by_key(|d| (d.bits().abs_diff(depth.bits()), Reverse(d.bits())))
            .or_else(|| self.bit_depths.last().copied())
            .unwrap_or(depth)
    }

    /// True if a part with `channels` channels can be written.
    pub fn supports_channels(&self, channels: usize) -> bool {
        channels > 0 && (self.arbitrary_channels || channels <= 4)
    }
}

/// An open file being written.
pub trait ImageOutput: Send {
    /// Writes all pixels of part `part`. `pixels` covers the part's data window.
    fn write_image(&mut self, part: usize, pixels: &PixelView<'_>) -> IoResult<()>;

    /// Finishes the file.
    fn close(self: Box<Self>) -> IoResult<()>;
}

/// Write side of a format.
pub trait Encoder: Send + Sync {
    /// Human-readable format name.
    fn format_name(&self) -> &'static str;

    /// Lowercase extensions without dots.
    fn extensions(&self) -> &'static [&'static str];

    /// What this format can store.
    fn capabilities(&self) -> FormatCaps;

    /// Creates `path` with one part per spec.
    fn create(&self, path: &Path, parts: &[ImageSpec]) -> IoResult<Box<dyn ImageOutput>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPS: FormatCaps = FormatCaps {
        multi_image: false,
        multi_view: false,
        tiles: false,
        arbitrary_channels: false,
        associated_alpha: false,
        bit_depths: &[BitDepth::U8, BitDepth::U16],
    };

    #[test]
    fn test_closest_depth() {
        assert_eq!(CAPS.closest_depth(BitDepth::U8), BitDepth::U8);
        assert_eq!(CAPS.closest_depth(BitDepth::U10), BitDepth::U8);
        assert_eq!(CAPS.closest_depth(BitDepth::U12), BitDepth::U16);
        assert_eq!(CAPS.closest_depth(BitDepth::F32), BitDepth::U16);
    }

    #[test]
    fn test_channel_limits() {
        assert!(CAPS.supports_channels(2));
        assert!(!CAPS.supports_channels(5));
        assert!(!CAPS.supports_channels(0));
    }
}
