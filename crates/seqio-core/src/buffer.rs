//! Owned `f32` working buffers.
//!
//! [`PixelBuffer`] is the scoped staging memory used between codecs, the
//! color engine and host buffers. It always stores packed `f32` samples and
//! remembers whether its first row is the bottom (host order) or the top
//! (file order) of its bounds, so the views it hands out address pixels in
//! host coordinates either way.

use crate::error::{Error, Result};
use crate::format::DataFormat;
use crate::rect::Rect;
use crate::view::{PixelView, PixelViewMut};

/// Vertical order of rows in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// First row is `y1` (host convention).
    #[default]
    BottomUp,
    /// First row is `y2 - 1` (file convention).
    TopDown,
}

/// Packed `f32` pixels covering a rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    data: Vec<f32>,
    bounds: Rect,
    channels: usize,
    order: RowOrder,
}

impl PixelBuffer {
    /// Zero-filled buffer.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero or `bounds` is inverted.
    pub fn new(bounds: Rect, channels: usize, order: RowOrder) -> Self {
        assert!(channels > 0, "pixel buffer needs at least one channel");
        assert!(bounds.x2 >= bounds.x1 && bounds.y2 >= bounds.y1, "inverted bounds {bounds}");
        let len = bounds.area() as usize * channels;
        Self {
            data: vec![0.0; len],
            bounds,
            channels,
            order,
        }
    }

    /// Wraps existing samples, checking the length against the layout.
    pub fn from_vec(data: Vec<f32>, bounds: Rect, channels: usize, order: RowOrder) -> Result<Self> {
        if channels == 0 || bounds.x2 < bounds.x1 || bounds.y2 < bounds.y1 {
            return Err(Error::invalid_dimensions(
                bounds.x2 as i64 - bounds.x1 as i64,
                bounds.y2 as i64 - bounds.y1 as i64,
                "empty channel list or inverted bounds",
            ));
        }
        let expected = bounds.area() as usize * channels;
        if data.len() != expected {
            return Err(Error::SampleCount {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            bounds,
            channels,
            order,
        })
    }

    /// Covered rectangle.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row order in memory.
    #[inline]
    pub fn order(&self) -> RowOrder {
        self.order
    }

    /// All samples in memory order.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// All samples in memory order, mutable.
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Samples per memory row.
    #[inline]
    pub fn row_len(&self) -> usize {
        self.bounds.width() as usize * self.channels
    }

    /// Consumes the buffer, returning samples in memory order.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    fn row_stride(&self) -> isize {
        let stride = (self.row_len() * DataFormat::F32.bytes_per_channel()) as isize;
        match self.order {
            RowOrder::BottomUp => stride,
            RowOrder::TopDown => -stride,
        }
    }

    /// View addressing pixels in host coordinates.
    pub fn view(&self) -> PixelView<'_> {
        let stride = self.row_stride();
        PixelView::new(
            bytemuck::cast_slice(&self.data),
            self.bounds,
            self.channels,
            DataFormat::F32,
            stride,
        )
        .unwrap_or_else(|e| unreachable!("buffer layout is consistent by construction: {e}"))
    }

    /// Mutable view addressing pixels in host coordinates.
    pub fn view_mut(&mut self) -> PixelViewMut<'_> {
        let stride = self.row_stride();
        PixelViewMut::new(
            bytemuck::cast_slice_mut(&mut self.data),
            self.bounds,
            self.channels,
            DataFormat::F32,
            stride,
        )
        .unwrap_or_else(|e| unreachable!("buffer layout is consistent by construction: {e}"))
    }

    /// View in storage order: the first memory row is `bounds.y1`.
    ///
    /// `bounds` must have the buffer's size; it renames coordinates only.
    /// Codecs use this with file coordinates on [`RowOrder::TopDown`] buffers.
    pub fn memory_view(&self, bounds: Rect) -> Result<PixelView<'_>> {
        self.check_same_size(bounds)?;
        let stride = self.row_stride().abs();
        PixelView::new(bytemuck::cast_slice(&self.data), bounds, self.channels, DataFormat::F32, stride)
    }

    /// Mutable variant of [`PixelBuffer::memory_view`].
    pub fn memory_view_mut(&mut self, bounds: Rect) -> Result<PixelViewMut<'_>> {
        self.check_same_size(bounds)?;
        let stride = self.row_stride().abs();
        PixelViewMut::new(
            bytemuck::cast_slice_mut(&mut self.data),
            bounds,
            self.channels,
            DataFormat::F32,
            stride,
        )
    }

    fn check_same_size(&self, bounds: Rect) -> Result<()> {
        if bounds.width() != self.bounds.width() || bounds.height() != self.bounds.height() {
            return Err(Error::invalid_dimensions(
                bounds.width() as i64,
                bounds.height() as i64,
                format!("expected {}x{}", self.bounds.width(), self.bounds.height()),
            ));
        }
        Ok(())
    }

    /// Raw bytes in memory order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}
