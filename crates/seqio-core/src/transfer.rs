//! Bounded pixel transfer between views.
//!
//! Every operation works on a `region` that must lie inside the bounds of
//! each view it touches; a violation is a caller bug and panics. Views may
//! have negative row strides, so the same calls serve top-down file buffers
//! and bottom-up host buffers.
//!
//! # Component-count mismatches
//!
//! [`copy`] reconciles differing channel counts:
//!
//! - 1 channel into many: the [`SingleChannelRole`] decides whether the value
//!   is luminance (duplicated into color, alpha opaque) or alpha (color black).
//! - RGB into RGBA: alpha is filled with 1.
//! - RGBA into RGB: alpha is dropped.
//! - anything into a single channel: the source alpha, or 1 without one.
//!   Under [`copy_as`] a luminance source counts as having no alpha.
//!
//! # Example
//!
//! ```rust
//! use seqio_core::{transfer, DataFormat, PixelViewMut, PixelView, Rect};
//!
//! let src = [128u8; 4];
//! let mut dst = [0u8; 16 * 4];
//! let region = Rect::from_size(2, 2);
//! let src = PixelView::new(&src, region, 1, DataFormat::U8, 2).unwrap();
//! let mut dst = PixelViewMut::new(&mut dst, region, 4, DataFormat::F32, 32).unwrap();
//! transfer::copy(&src, &mut dst, region);
//! assert_eq!(dst.sample(1, 1, 3), 1.0);
//! ```

use crate::rect::Rect;
use crate::view::{PixelView, PixelViewMut};

/// Alpha magnitude at or below which premultiplication leaves pixels untouched.
pub const ALPHA_EPSILON: f32 = f32::EPSILON;

/// Meaning of a single-channel source when expanded into more channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleChannelRole {
    /// Duplicate into color, alpha opaque.
    #[default]
    Luminance,
    /// Value goes to alpha, color is black.
    Alpha,
}

#[track_caller]
fn check_region(region: Rect, bounds: Rect, what: &str) {
    assert!(
        bounds.contains_rect(&region),
        "{what} region {region} outside bounds {bounds}"
    );
}

/// Copies `region` from `src` to `dst`.
///
/// Equal channel counts copy as is; a single source channel expanding into
/// more channels is treated as luminance.
#[track_caller]
pub fn copy(src: &PixelView<'_>, dst: &mut PixelViewMut<'_>, region: Rect) {
    transfer(src, dst, region, None);
}

/// Copies `region` from `src` to `dst` with an explicit single-channel role.
///
/// Unlike [`copy`], the role also holds for a single channel into a single
/// channel: alpha passes through, luminance yields opaque alpha.
#[track_caller]
pub fn copy_as(src: &PixelView<'_>, dst: &mut PixelViewMut<'_>, region: Rect, role: SingleChannelRole) {
    transfer(src, dst, region, Some(role));
}

#[track_caller]
fn transfer(src: &PixelView<'_>, dst: &mut PixelViewMut<'_>, region: Rect, role: Option<SingleChannelRole>) {
    check_region(region, src.bounds(), "source");
    check_region(region, dst.bounds(), "destination");
    if region.is_empty() {
        return;
    }

    let (n, m) = (src.channels(), dst.channels());
    let opaque = n == 1 && m == 1 && role == Some(SingleChannelRole::Luminance);
    if opaque {
        fill_constant(dst, region, 1.0, &[0]);
        return;
    }
    if n == m
        && src.format() == dst.format()
        && src.layout().is_packed()
        && dst.layout().is_packed()
    {
        for y in region.y1..region.y2 {
            let row = src.row_bytes(y, region.x1, region.x2);
            dst.row_bytes_mut(y, region.x1, region.x2).copy_from_slice(row);
        }
        return;
    }

    let mut sp = vec![0.0f32; n];
    let mut dp = vec![0.0f32; m];
    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            src.read_pixel(x, y, &mut sp);
            remap(&sp, &mut dp, role.unwrap_or_default());
            dst.write_pixel(x, y, &dp);
        }
    }
}

fn remap(src: &[f32], dst: &mut [f32], role: SingleChannelRole) {
    let (n, m) = (src.len(), dst.len());
    if n == m {
        dst.copy_from_slice(src);
        return;
    }
    if n == 1 {
        let v = src[0];
        match role {
            SingleChannelRole::Luminance => {
                for (c, d) in dst.iter_mut().enumerate() {
                    *d = if m == 4 && c == 3 { 1.0 } else { v };
                }
            }
            SingleChannelRole::Alpha => {
                dst.fill(0.0);
                if m == 4 {
                    dst[3] = v;
                }
            }
        }
        return;
    }

    let src_alpha = if n == 4 { src[3] } else { 1.0 };
    let src_color = if n == 4 { 3 } else { n };
    for (c, d) in dst.iter_mut().enumerate() {
        *d = if m == 1 || (m == 4 && c == 3) {
            src_alpha
        } else if c < src_color {
            src[c]
        } else {
            0.0
        };
    }
}

/// Multiplies color by alpha inside `region`.
///
/// `alpha` is the alpha channel index; `None` means the buffer is opaque
/// and nothing happens. Pixels with alpha at or below [`ALPHA_EPSILON`]
/// keep their values.
#[track_caller]
pub fn premultiply(view: &mut PixelViewMut<'_>, region: Rect, alpha: Option<usize>) {
    scale_by_alpha(view, region, alpha, |v, a| v * a);
}

/// Divides color by alpha inside `region`. See [`premultiply`] for the rules.
#[track_caller]
pub fn unpremultiply(view: &mut PixelViewMut<'_>, region: Rect, alpha: Option<usize>) {
    scale_by_alpha(view, region, alpha, |v, a| v / a);
}

#[track_caller]
fn scale_by_alpha(view: &mut PixelViewMut<'_>, region: Rect, alpha: Option<usize>, op: impl Fn(f32, f32) -> f32) {
    let Some(ai) = alpha else {
        return;
    };
    check_region(region, view.bounds(), "premultiply");
    let channels = view.channels();
    assert!(ai < channels, "alpha index {ai} out of range for {channels} channels");
    if channels == 1 {
        return;
    }
    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            let a = view.sample(x, y, ai);
            if a.abs() <= ALPHA_EPSILON {
                continue;
            }
            for c in (0..channels).filter(|&c| c != ai) {
                let v = view.sample(x, y, c);
                view.set_sample(x, y, c, op(v, a));
            }
        }
    }
}

/// Resamples `src_region` of `src` into `dst_region` of `dst` by a power of two.
///
/// `levels > 0` shrinks by `2^levels` with a box filter, `levels < 0`
/// enlarges by `2^-levels` with pixel replication, `0` copies. Destination
/// pixels whose footprint misses `src_region` are set to zero. Panics when
/// `|levels|` is 31 or more.
#[track_caller]
pub fn scale(
    src: &PixelView<'_>,
    src_region: Rect,
    dst: &mut PixelViewMut<'_>,
    dst_region: Rect,
    levels: i32,
) {
    check_region(src_region, src.bounds(), "source");
    check_region(dst_region, dst.bounds(), "destination");
    let channels = src.channels();
    assert_eq!(channels, dst.channels(), "scale needs matching channel counts");

    let shift = levels.unsigned_abs();
    assert!(shift < 31, "scale by 2^{shift} out of range");
    let f = 1i32 << shift;
    let mut acc = vec![0.0f32; channels];
    let mut px = vec![0.0f32; channels];
    for y in dst_region.y1..dst_region.y2 {
        for x in dst_region.x1..dst_region.x2 {
            acc.fill(0.0);
            if levels > 0 {
                let footprint = Rect::new(x * f, y * f, (x + 1) * f, (y + 1) * f);
                if let Some(b) = footprint.intersect(&src_region) {
                    for sy in b.y1..b.y2 {
                        for sx in b.x1..b.x2 {
                            src.read_pixel(sx, sy, &mut px);
                            acc.iter_mut().zip(&px).for_each(|(a, v)| *a += v);
                        }
                    }
                    let inv = 1.0 / b.area() as f32;
                    acc.iter_mut().for_each(|a| *a *= inv);
                }
            } else {
                let (sx, sy) = (x.div_euclid(f), y.div_euclid(f));
                if src_region.contains(sx, sy) {
                    src.read_pixel(sx, sy, &mut acc);
                }
            }
            dst.write_pixel(x, y, &acc);
        }
    }
}

/// Sets the listed channels to `value` inside `region`.
#[track_caller]
pub fn fill_constant(view: &mut PixelViewMut<'_>, region: Rect, value: f32, components: &[usize]) {
    check_region(region, view.bounds(), "fill");
    let channels = view.channels();
    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            for &c in components.iter().filter(|&&c| c < channels) {
                view.set_sample(x, y, c, value);
            }
        }
    }
}
