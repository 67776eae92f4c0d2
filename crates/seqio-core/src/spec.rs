//! Image specification and metadata.
//!
//! [`ImageSpec`] describes one sub-image of a file: its size, data and
//! display windows, channel names, stored bit depth and free-form
//! attributes. Codecs produce one spec per sub-image on read and consume
//! one spec per part on write.
//!
//! Windows follow file conventions: `(x, y)` is the top-left corner of the
//! data window inside a display window of `full_width x full_height`, rows
//! counted downward. [`ImageSpec::host_data_window`] converts to host space.
//!
//! # Usage
//!
//! ```rust
//! use seqio_core::{attr, BitDepth, ImageSpec, Rect};
//!
//! let mut spec = ImageSpec::rgba(1920, 1080, BitDepth::F16);
//! spec.set_attr(attr::COLORSPACE, "Linear");
//! assert_eq!(spec.alpha_channel, Some(3));
//! assert_eq!(spec.host_data_window(), Rect::from_size(1920, 1080));
//! ```

use crate::format::BitDepth;
use crate::rect::Rect;
use std::collections::BTreeMap;

/// Well-known attribute keys.
pub mod attr {
    /// Colorspace tag declared by the file.
    pub const COLORSPACE: &str = "oiio:ColorSpace";
    /// Gamma accompanying a `GammaCorrected` colorspace tag.
    pub const GAMMA: &str = "oiio:Gamma";
    /// Non-zero when color is stored unassociated from alpha.
    pub const UNASSOCIATED_ALPHA: &str = "oiio:UnassociatedAlpha";
    /// Description of an embedded ICC profile.
    pub const ICC_PROFILE_NAME: &str = "ICCProfileName";
    /// Bits actually used per sample when the storage type is wider.
    pub const BITS_PER_SAMPLE: &str = "oiio:BitsPerSample";
    /// Name of a sub-image (part name in multi-part files).
    pub const SUBIMAGE_NAME: &str = "oiio:subimagename";
    /// View a part belongs to.
    pub const VIEW: &str = "view";
    /// Views carried by a single-part multi-view file.
    pub const MULTI_VIEW: &str = "multiView";
    /// Compression method name.
    pub const COMPRESSION: &str = "compression";
    /// Lossy compression quality, 0-100.
    pub const QUALITY: &str = "CompressionQuality";
    /// Exif orientation, 1-8.
    pub const ORIENTATION: &str = "Orientation";
    /// Pixel aspect ratio.
    pub const PIXEL_ASPECT: &str = "PixelAspectRatio";
    /// Native frame rate of a stream.
    pub const FRAMES_PER_SECOND: &str = "FramesPerSecond";
}

/// Attribute value that can be stored in image metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// List of strings
    StringArray(Vec<String>),
}

impl AttrValue {
    /// Returns this value as an integer, if applicable.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns this value as a float, if applicable.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as a string, if applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::StringArray(list) => write!(f, "[{}]", list.join(", ")),
        }
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}

/// Description of one sub-image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// Data window width.
    pub width: u32,
    /// Data window height.
    pub height: u32,
    /// Data window left edge inside the display window.
    pub x: i32,
    /// Data window top edge inside the display window (rows counted down).
    pub y: i32,
    /// Display window width.
    pub full_width: u32,
    /// Display window height.
    pub full_height: u32,
    /// Precision the file stores.
    pub format: BitDepth,
    /// Channel names in file order.
    pub channel_names: Vec<String>,
    /// Index of the channel the file declares as alpha.
    pub alpha_channel: Option<usize>,
    /// Tile width, 0 for scanline images.
    pub tile_width: u32,
    /// Tile height, 0 for scanline images.
    pub tile_height: u32,
    /// Free-form metadata, ordered by key.
    pub attributes: BTreeMap<String, AttrValue>,
}

impl ImageSpec {
    /// Creates a spec whose data and display windows coincide.
    ///
    /// The alpha channel is taken from a channel named `A` or `alpha`.
    pub fn new(width: u32, height: u32, channel_names: Vec<String>, format: BitDepth) -> Self {
        let alpha_channel = channel_names
            .iter()
            .position(|n| n == "A" || n == "a" || n.eq_ignore_ascii_case("alpha"));
        Self {
            width,
            height,
            x: 0,
            y: 0,
            full_width: width,
            full_height: height,
            format,
            channel_names,
            alpha_channel,
            tile_width: 0,
            tile_height: 0,
            attributes: BTreeMap::new(),
        }
    }

    /// RGBA spec.
    pub fn rgba(width: u32, height: u32, format: BitDepth) -> Self {
        Self::new(width, height, names(&["R", "G", "B", "A"]), format)
    }

    /// RGB spec.
    pub fn rgb(width: u32, height: u32, format: BitDepth) -> Self {
        Self::new(width, height, names(&["R", "G", "B"]), format)
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channel_names.len()
    }

    /// Data window in file coordinates (rows counted down).
    pub fn data_window(&self) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.x + self.width as i32,
            self.y + self.height as i32,
        )
    }

    /// Display window in file coordinates.
    pub fn display_window(&self) -> Rect {
        Rect::from_size(self.full_width, self.full_height)
    }

    /// Data window in host coordinates (rows counted up from the display bottom).
    pub fn host_data_window(&self) -> Rect {
        self.data_window().flip_y(self.full_height as i32)
    }

    /// True for tiled storage.
    pub fn is_tiled(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Sets an attribute value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Gets an attribute value by key.
    pub fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Gets an attribute as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get_attr(key).and_then(|v| v.as_str())
    }

    /// Gets an attribute as an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_attr(key).and_then(|v| v.as_int())
    }

    /// Gets an attribute as a float.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get_attr(key).and_then(|v| v.as_float())
    }

    /// Pixel aspect ratio, 1.0 when unset.
    pub fn pixel_aspect(&self) -> f64 {
        self.get_float(attr::PIXEL_ASPECT).unwrap_or(1.0)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_detection() {
        let spec = ImageSpec::new(4, 4, names(&["Y", "alpha"]), BitDepth::U8);
        assert_eq!(spec.alpha_channel, Some(1));
        let spec = ImageSpec::new(4, 4, names(&["diffuse.A"]), BitDepth::U8);
        assert_eq!(spec.alpha_channel, None);
    }

    #[test]
    fn test_host_window() {
        let mut spec = ImageSpec::rgb(10, 4, BitDepth::F32);
        spec.full_width = 20;
        spec.full_height = 10;
        spec.x = 2;
        spec.y = 1;
        // rows 1..5 from the top are rows 5..9 from the bottom
        assert_eq!(spec.host_data_window(), Rect::new(2, 5, 12, 9));
    }

    #[test]
    fn test_attributes() {
        let mut spec = ImageSpec::rgba(1, 1, BitDepth::U8);
        spec.set_attr(attr::COLORSPACE, "sRGB");
        spec.set_attr(attr::GAMMA, 2.2f32);
        assert_eq!(spec.get_string(attr::COLORSPACE), Some("sRGB"));
        assert!((spec.get_float(attr::GAMMA).unwrap() - 2.2).abs() < 1e-6);
        assert_eq!(spec.pixel_aspect(), 1.0);
    }
}
