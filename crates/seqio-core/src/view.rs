//! Borrowed views over pixel memory.
//!
//! A view describes where the pixels of a rectangle live inside a byte
//! slice it does not own. Rows are addressed through a signed byte stride:
//! a negative stride walks upward in memory, which is how top-down file
//! rows are presented to bottom-up host code without copying.
//!
//! Addressing, for pixel `(x, y)` and channel `c`:
//!
//! ```text
//! origin + (y - y1) * row_stride + (x - x1) * pixel_stride + c * sample_size
//! ```
//!
//! When a view is built with a negative stride the slice is assumed to
//! start with the top row (`y2 - 1`), so `origin` points at the last row in
//! memory. Every layout is checked against the slice length on construction;
//! accessors afterwards only `debug_assert!` their coordinates.
//!
//! # Example
//!
//! ```rust
//! use seqio_core::{DataFormat, PixelView, Rect};
//!
//! // Two rows of one RGB u8 pixel, stored top row first.
//! let data = [10u8, 10, 10, 200, 200, 200];
//! let view = PixelView::new(&data, Rect::from_size(1, 2), 3, DataFormat::U8, -3).unwrap();
//! // y = 0 is the bottom row, which is the second row in memory.
//! assert_eq!(view.sample(0, 0, 0), 200.0 / 255.0);
//! ```

use crate::error::{Error, Result};
use crate::format::DataFormat;
use crate::rect::Rect;
use std::ops::Range;

/// Geometry shared by [`PixelView`] and [`PixelViewMut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    bounds: Rect,
    channels: usize,
    format: DataFormat,
    pixel_stride: usize,
    row_stride: isize,
    origin: usize,
}

impl Layout {
    /// Packed pixels (`pixel_stride == channels * sample_size`).
    pub fn packed(bounds: Rect, channels: usize, format: DataFormat, row_stride: isize) -> Result<Self> {
        let pixel_stride = channels * format.bytes_per_channel();
        let origin = if row_stride < 0 {
            (bounds.height().max(1) as usize - 1) * row_stride.unsigned_abs()
        } else {
            0
        };
        Self::new(origin, bounds, channels, format, pixel_stride, row_stride)
    }

    /// Fully explicit layout.
    pub fn new(
        origin: usize,
        bounds: Rect,
        channels: usize,
        format: DataFormat,
        pixel_stride: usize,
        row_stride: isize,
    ) -> Result<Self> {
        if bounds.x2 < bounds.x1 || bounds.y2 < bounds.y1 {
            return Err(Error::invalid_dimensions(
                bounds.x2 as i64 - bounds.x1 as i64,
                bounds.y2 as i64 - bounds.y1 as i64,
                "inverted bounds",
            ));
        }
        if channels == 0 {
            return Err(Error::invalid_dimensions(
                bounds.width() as i64,
                bounds.height() as i64,
                "no channels",
            ));
        }
        let sample = format.bytes_per_channel();
        if pixel_stride < channels * sample {
            return Err(Error::InvalidStride {
                stride: pixel_stride as isize,
                min_stride: channels * sample,
            });
        }
        let row_len = bounds.width() as usize * pixel_stride;
        if bounds.height() > 1 && row_stride.unsigned_abs() < row_len {
            return Err(Error::InvalidStride {
                stride: row_stride,
                min_stride: row_len,
            });
        }
        Ok(Self {
            bounds,
            channels,
            format,
            pixel_stride,
            row_stride,
            origin,
        })
    }

    /// Byte range touched by this layout.
    fn footprint(&self) -> (isize, isize) {
        let origin = self.origin as isize;
        if self.bounds.is_empty() {
            return (origin, origin);
        }
        let last_row = (self.bounds.height() as isize - 1) * self.row_stride;
        let row_end = (self.bounds.width() as usize - 1) * self.pixel_stride
            + self.channels * self.format.bytes_per_channel();
        (origin + last_row.min(0), origin + last_row.max(0) + row_end as isize)
    }

    fn validate(&self, len: usize) -> Result<()> {
        let (first, end) = self.footprint();
        if first < 0 || end > len as isize {
            return Err(Error::ViewOutOfRange { first, end, len });
        }
        Ok(())
    }

    #[inline]
    fn offset(&self, x: i32, y: i32, c: usize) -> usize {
        debug_assert!(self.bounds.contains(x, y), "({x}, {y}) outside {}", self.bounds);
        debug_assert!(c < self.channels);
        let dy = (y - self.bounds.y1) as isize;
        let dx = (x - self.bounds.x1) as usize;
        (self.origin as isize + dy * self.row_stride) as usize
            + dx * self.pixel_stride
            + c * self.format.bytes_per_channel()
    }

    fn flipped(&self) -> Self {
        let h = self.bounds.height();
        if h == 0 {
            return *self;
        }
        let origin = self.origin as isize + (h as isize - 1) * self.row_stride;
        Self {
            origin: origin as usize,
            row_stride: -self.row_stride,
            ..*self
        }
    }

    fn components(&self, first: usize, count: usize) -> Result<Self> {
        if count == 0 || first + count > self.channels {
            return Err(Error::ChannelRange {
                first,
                end: first + count,
                channels: self.channels,
            });
        }
        Ok(Self {
            origin: self.origin + first * self.format.bytes_per_channel(),
            channels: count,
            ..*self
        })
    }

    /// True when the pixels of a row are adjacent in memory.
    #[inline]
    pub fn is_packed(&self) -> bool {
        self.pixel_stride == self.channels * self.format.bytes_per_channel()
    }

    /// Bytes of row `y` between `x1` and `x2`. Only meaningful for packed layouts.
    #[inline]
    fn row_range(&self, y: i32, x1: i32, x2: i32) -> Range<usize> {
        debug_assert!(self.is_packed());
        let start = self.offset(x1, y, 0);
        start..start + (x2 - x1) as usize * self.pixel_stride
    }

    /// Declared bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sample format.
    #[inline]
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Signed distance in bytes between row `y` and row `y + 1`.
    #[inline]
    pub fn row_stride(&self) -> isize {
        self.row_stride
    }

    /// Distance in bytes between horizontally adjacent pixels.
    #[inline]
    pub fn pixel_stride(&self) -> usize {
        self.pixel_stride
    }
}

/// Read-only view over pixel memory.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    data: &'a [u8],
    layout: Layout,
}

impl<'a> PixelView<'a> {
    /// Packed view; see the module docs for the meaning of a negative stride.
    pub fn new(
        data: &'a [u8],
        bounds: Rect,
        channels: usize,
        format: DataFormat,
        row_stride: isize,
    ) -> Result<Self> {
        Self::with_layout(data, Layout::packed(bounds, channels, format, row_stride)?)
    }

    /// View with an explicit layout.
    pub fn with_layout(data: &'a [u8], layout: Layout) -> Result<Self> {
        layout.validate(data.len())?;
        Ok(Self { data, layout })
    }

    /// Geometry of this view.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Declared bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.layout.bounds
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    /// Sample format.
    #[inline]
    pub fn format(&self) -> DataFormat {
        self.layout.format
    }

    /// Same memory with rows addressed in the opposite vertical order.
    pub fn flipped(self) -> Self {
        Self {
            data: self.data,
            layout: self.layout.flipped(),
        }
    }

    /// View of channels `first..first + count` of every pixel.
    pub fn component_view(&self, first: usize, count: usize) -> Result<PixelView<'a>> {
        Ok(Self {
            data: self.data,
            layout: self.layout.components(first, count)?,
        })
    }

    /// Normalized sample at `(x, y)`, channel `c`.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, c: usize) -> f32 {
        let at = self.layout.offset(x, y, c);
        self.layout.format.read_sample(&self.data[at..])
    }

    /// Reads all channels of one pixel into `out`.
    #[inline]
    pub fn read_pixel(&self, x: i32, y: i32, out: &mut [f32]) {
        for (c, v) in out.iter_mut().enumerate().take(self.layout.channels) {
            *v = self.sample(x, y, c);
        }
    }

    /// Raw bytes of a packed row span.
    #[inline]
    pub fn row_bytes(&self, y: i32, x1: i32, x2: i32) -> &'a [u8] {
        &self.data[self.layout.row_range(y, x1, x2)]
    }
}

/// Mutable view over pixel memory.
#[derive(Debug)]
pub struct PixelViewMut<'a> {
    data: &'a mut [u8],
    layout: Layout,
}

impl<'a> PixelViewMut<'a> {
    /// Packed view; see the module docs for the meaning of a negative stride.
    pub fn new(
        data: &'a mut [u8],
        bounds: Rect,
        channels: usize,
        format: DataFormat,
        row_stride: isize,
    ) -> Result<Self> {
        let layout = Layout::packed(bounds, channels, format, row_stride)?;
        Self::with_layout(data, layout)
    }

    /// View with an explicit layout.
    pub fn with_layout(data: &'a mut [u8], layout: Layout) -> Result<Self> {
        layout.validate(data.len())?;
        Ok(Self { data, layout })
    }

    /// Geometry of this view.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Declared bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.layout.bounds
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    /// Sample format.
    #[inline]
    pub fn format(&self) -> DataFormat {
        self.layout.format
    }

    /// Same memory with rows addressed in the opposite vertical order.
    pub fn flipped(self) -> Self {
        Self {
            layout: self.layout.flipped(),
            data: self.data,
        }
    }

    /// Shorter-lived mutable view of the same memory.
    pub fn reborrow(&mut self) -> PixelViewMut<'_> {
        PixelViewMut {
            data: &mut *self.data,
            layout: self.layout,
        }
    }

    /// Read-only view of the same memory.
    pub fn as_view(&self) -> PixelView<'_> {
        PixelView {
            data: &*self.data,
            layout: self.layout,
        }
    }

    /// Mutable view of channels `first..first + count` of every pixel.
    pub fn component_view(&mut self, first: usize, count: usize) -> Result<PixelViewMut<'_>> {
        Ok(PixelViewMut {
            layout: self.layout.components(first, count)?,
            data: &mut *self.data,
        })
    }

    /// Normalized sample at `(x, y)`, channel `c`.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, c: usize) -> f32 {
        let at = self.layout.offset(x, y, c);
        self.layout.format.read_sample(&self.data[at..])
    }

    /// Stores a normalized sample.
    #[inline]
    pub fn set_sample(&mut self, x: i32, y: i32, c: usize, value: f32) {
        let at = self.layout.offset(x, y, c);
        self.layout.format.write_sample(&mut self.data[at..], value);
    }

    /// Reads all channels of one pixel into `out`.
    #[inline]
    pub fn read_pixel(&self, x: i32, y: i32, out: &mut [f32]) {
        for (c, v) in out.iter_mut().enumerate().take(self.layout.channels) {
            *v = self.sample(x, y, c);
        }
    }

    /// Writes all channels of one pixel from `values`.
    #[inline]
    pub fn write_pixel(&mut self, x: i32, y: i32, values: &[f32]) {
        for (c, v) in values.iter().enumerate().take(self.layout.channels) {
            self.set_sample(x, y, c, *v);
        }
    }

    /// Raw bytes of a packed row span.
    #[inline]
    pub fn row_bytes_mut(&mut self, y: i32, x1: i32, x2: i32) -> &mut [u8] {
        let range = self.layout.row_range(y, x1, x2);
        &mut self.data[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_stride() {
        let data: Vec<u8> = (0..12).collect();
        let v = PixelView::new(&data, Rect::from_size(2, 2), 3, DataFormat::U8, 6).unwrap();
        assert_eq!(v.sample(0, 0, 0), 0.0);
        assert_eq!(v.sample(1, 1, 2), 11.0 / 255.0);
    }

    #[test]
    fn test_negative_stride_is_flip() {
        let data: Vec<u8> = (0..12).collect();
        let up = PixelView::new(&data, Rect::from_size(2, 2), 3, DataFormat::U8, 6).unwrap();
        let down = PixelView::new(&data, Rect::from_size(2, 2), 3, DataFormat::U8, -6).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                for c in 0..3 {
                    assert_eq!(up.sample(x, y, c), down.sample(x, 1 - y, c));
                }
            }
        }
        let back = down.flipped();
        assert_eq!(back.sample(1, 1, 2), up.sample(1, 1, 2));
    }

    #[test]
    fn test_offset_bounds() {
        let data = vec![0u8; 4 * 3 * 2];
        let v = PixelView::new(&data, Rect::new(10, 20, 12, 23), 1, DataFormat::F32, 8).unwrap();
        assert_eq!(v.bounds().width(), 2);
        assert_eq!(v.sample(11, 22, 0), 0.0);
    }

    #[test]
    fn test_validation() {
        let data = vec![0u8; 10];
        assert!(matches!(
            PixelView::new(&data, Rect::from_size(2, 2), 3, DataFormat::U8, 6),
            Err(Error::ViewOutOfRange { .. })
        ));
        assert!(matches!(
            PixelView::new(&data, Rect::from_size(2, 2), 3, DataFormat::U8, 4),
            Err(Error::InvalidStride { .. })
        ));
        assert!(PixelView::new(&data, Rect::new(0, 0, 0, 0), 3, DataFormat::U8, 0).is_ok());
    }

    #[test]
    fn test_component_view() {
        let mut data = vec![0u8; 2 * 4];
        let mut v = PixelViewMut::new(&mut data, Rect::from_size(2, 1), 4, DataFormat::U8, 8).unwrap();
        {
            let mut alpha = v.component_view(3, 1).unwrap();
            assert_eq!(alpha.channels(), 1);
            alpha.set_sample(1, 0, 0, 1.0);
        }
        assert_eq!(v.sample(1, 0, 3), 1.0);
        assert_eq!(data[7], 255);
        assert!(PixelView::new(&data, Rect::from_size(2, 1), 4, DataFormat::U8, 8)
            .unwrap()
            .component_view(3, 2)
            .is_err());
    }
}
