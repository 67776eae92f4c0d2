//! Compiled colorspace transforms.
//!
//! A [`Processor`] is the chain of curve operations between two
//! colorspaces: decode the source to linear, then encode to the
//! destination. It is immutable and shared behind an `Arc`, so many render
//! threads can apply the same processor at once.

use crate::curve::Curve;
use rayon::prelude::*;
use seqio_core::{PixelBuffer, PixelViewMut, Rect};

/// One step of a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessorOp {
    /// Decode with the curve.
    ToLinear(Curve),
    /// Encode with the curve.
    FromLinear(Curve),
}

/// Transform between two colorspaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Processor {
    ops: Vec<ProcessorOp>,
}

impl Processor {
    /// Processor that changes nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Processor decoding with `src` and encoding with `dst`.
    ///
    /// `None` stands for non-color data: if either side is data the
    /// result is an identity.
    pub fn between(src: Option<Curve>, dst: Option<Curve>) -> Self {
        let (Some(src), Some(dst)) = (src, dst) else {
            return Self::identity();
        };
        if src == dst {
            return Self::identity();
        }
        let mut ops = Vec::with_capacity(2);
        if src != Curve::Linear {
            ops.push(ProcessorOp::ToLinear(src));
        }
        if dst != Curve::Linear {
            ops.push(ProcessorOp::FromLinear(dst));
        }
        Self { ops }
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[ProcessorOp] {
        &self.ops
    }

    /// True when applying would change nothing.
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }

    /// Transforms one sample.
    #[inline]
    pub fn apply_value(&self, mut v: f32) -> f32 {
        for op in &self.ops {
            v = match op {
                ProcessorOp::ToLinear(c) => c.to_linear(v),
                ProcessorOp::FromLinear(c) => c.from_linear(v),
            };
        }
        v
    }

    /// Transforms the first `color_channels` channels of every pixel.
    ///
    /// Rows are processed in parallel.
    pub fn apply(&self, buf: &mut PixelBuffer, color_channels: usize) {
        let channels = buf.channels();
        let n = color_channels.min(channels);
        let row_len = buf.row_len();
        if self.is_noop() || n == 0 || row_len == 0 {
            return;
        }
        buf.samples_mut().par_chunks_mut(row_len).for_each(|row| {
            for px in row.chunks_exact_mut(channels) {
                for v in &mut px[..n] {
                    *v = self.apply_value(*v);
                }
            }
        });
    }

    /// Transforms `region` of an arbitrary view in place.
    pub fn apply_view(&self, view: &mut PixelViewMut<'_>, region: Rect, color_channels: usize) {
        assert!(
            view.bounds().contains_rect(&region),
            "color region {region} outside bounds {}",
            view.bounds()
        );
        let n = color_channels.min(view.channels());
        if self.is_noop() || n == 0 {
            return;
        }
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                for c in 0..n {
                    let v = view.sample(x, y, c);
                    view.set_sample(x, y, c, self.apply_value(v));
                }
            }
        }
    }
}
