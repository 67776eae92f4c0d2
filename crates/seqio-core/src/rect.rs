//! Integer rectangles in host pixel space.
//!
//! [`Rect`] is half-open: it covers `x1..x2` by `y1..y2`. Host space has y
//! pointing up, so `y1` is the bottom row. Files store rows top-down;
//! [`Rect::flip_y`] converts between the two conventions.
//!
//! # Example
//!
//! ```rust
//! use seqio_core::Rect;
//!
//! let a = Rect::new(0, 0, 100, 50);
//! let b = Rect::new(50, 25, 150, 75);
//! assert_eq!(a.intersect(&b), Some(Rect::new(50, 25, 100, 50)));
//! assert_eq!(a.width(), 100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open integer rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x1: i32,
    /// Bottom edge (inclusive).
    pub y1: i32,
    /// Right edge (exclusive).
    pub x2: i32,
    /// Top edge (exclusive).
    pub y2: i32,
}

impl Rect {
    /// Creates a rectangle from its edges.
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rectangle anchored at the origin.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Width in pixels, zero for inverted rectangles.
    #[inline]
    pub const fn width(&self) -> i32 {
        if self.x2 > self.x1 { self.x2 - self.x1 } else { 0 }
    }

    /// Height in pixels, zero for inverted rectangles.
    #[inline]
    pub const fn height(&self) -> i32 {
        if self.y2 > self.y1 { self.y2 - self.y1 } else { 0 }
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// True when the rectangle covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when the pixel `(x, y)` lies inside.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// True when `other` lies entirely inside. Empty rectangles are
    /// contained everywhere.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.x1 >= self.x1 && other.x2 <= self.x2 && other.y1 >= self.y1 && other.y2 <= self.y2)
    }

    /// Overlap of two rectangles, `None` when they do not touch.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Rectangle at `1 / 2^levels` resolution, rounded outwards.
    pub fn downscale(&self, levels: u32) -> Rect {
        if levels == 0 {
            return *self;
        }
        let f = 1i32 << levels;
        Rect::new(
            self.x1.div_euclid(f),
            self.y1.div_euclid(f),
            ceil_div(self.x2, f),
            ceil_div(self.y2, f),
        )
    }

    /// Rectangle at `2^levels` times the resolution.
    pub fn upscale(&self, levels: u32) -> Rect {
        let f = 1i32 << levels;
        Rect::new(self.x1 * f, self.y1 * f, self.x2 * f, self.y2 * f)
    }

    /// Mirrors the rectangle vertically inside a frame of `height` rows.
    ///
    /// Converts file rows (top-down) to host rows (bottom-up) and back.
    #[inline]
    pub const fn flip_y(&self, height: i32) -> Rect {
        Rect::new(self.x1, height - self.y2, self.x2, height - self.y1)
    }
}

fn ceil_div(v: i32, f: i32) -> i32 {
    -((-v).div_euclid(f))
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}
