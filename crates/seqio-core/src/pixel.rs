//! Component sets and premultiplication states.

use serde::{Deserialize, Serialize};

/// Which logical components a buffer carries.
///
/// Slot numbering is RGBA: slot 0 is red, slot 3 is alpha. [`slots`](Self::slots)
/// lists the slots a buffer of this kind stores, in memory order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Components {
    /// Alpha only.
    Alpha,
    /// Two-channel data (motion vectors, UV).
    Xy,
    /// Color without alpha.
    Rgb,
    /// Color with alpha.
    #[default]
    Rgba,
}

impl Components {
    /// Channels stored per pixel.
    #[inline]
    pub const fn count(&self) -> usize {
        match self {
            Self::Alpha => 1,
            Self::Xy => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Position of alpha inside a pixel, if any.
    #[inline]
    pub const fn alpha_index(&self) -> Option<usize> {
        match self {
            Self::Alpha => Some(0),
            Self::Rgba => Some(3),
            Self::Xy | Self::Rgb => None,
        }
    }

    /// RGBA slots stored by this kind, in memory order.
    pub const fn slots(&self) -> &'static [usize] {
        match self {
            Self::Alpha => &[3],
            Self::Xy => &[0, 1],
            Self::Rgb => &[0, 1, 2],
            Self::Rgba => &[0, 1, 2, 3],
        }
    }

    /// Kind matching a channel count. A single channel is taken as alpha.
    pub const fn from_count(n: usize) -> Option<Self> {
        match n {
            1 => Some(Self::Alpha),
            2 => Some(Self::Xy),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Name as shown in menus.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Alpha => "Alpha",
            Self::Xy => "XY",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }
}

impl std::fmt::Display for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Relationship between color and alpha in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Premult {
    /// No alpha; treated as alpha 1 everywhere.
    Opaque,
    /// Color already multiplied by alpha (associated).
    #[default]
    Premultiplied,
    /// Color not multiplied by alpha (unassociated).
    Unpremultiplied,
}

impl Premult {
    /// State a buffer of `components` can actually be in.
    ///
    /// Buffers without alpha are always opaque.
    pub const fn for_components(self, components: Components) -> Premult {
        match components.alpha_index() {
            None => Premult::Opaque,
            Some(_) => self,
        }
    }
}
