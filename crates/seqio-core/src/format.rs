//! Bit depths and in-memory sample formats.
//!
//! # Types
//!
//! - [`BitDepth`] - Precision a file stores (includes packed 10/12-bit)
//! - [`DataFormat`] - Byte-aligned type of samples in memory
//!
//! Samples are exchanged as normalized `f32`: integer formats map their
//! full range to `[0, 1]`, float formats pass through.
//!
//! ```rust
//! use seqio_core::format::{BitDepth, DataFormat};
//!
//! let mut raw = [0u8; 2];
//! DataFormat::U16.write_sample(&mut raw, 1.0);
//! assert_eq!(u16::from_ne_bytes(raw), 65535);
//! assert_eq!(BitDepth::U10.storage_format(), DataFormat::U16);
//! ```

use half::f16;
use serde::{Deserialize, Serialize};

/// Bit depth of the data stored in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 10-bit unsigned integer (DPX, broadcast).
    U10,
    /// 12-bit unsigned integer (cinema cameras).
    U12,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    #[default]
    F32,
}

impl BitDepth {
    /// Number of bits per channel.
    #[inline]
    pub const fn bits(&self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U10 => 10,
            Self::U12 => 12,
            Self::U16 | Self::F16 => 16,
            Self::U32 | Self::F32 => 32,
        }
    }

    /// Whether this is a floating-point depth.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Whether this is an integer depth.
    #[inline]
    pub const fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// Smallest [`DataFormat`] that holds this depth.
    #[inline]
    pub const fn storage_format(&self) -> DataFormat {
        match self {
            Self::U8 => DataFormat::U8,
            Self::U10 | Self::U12 | Self::U16 => DataFormat::U16,
            Self::U32 => DataFormat::U32,
            Self::F16 => DataFormat::F16,
            Self::F32 => DataFormat::F32,
        }
    }

    /// Short label used in parameter files (`"8"`, `"16f"`, `"32f"` ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::U8 => "8",
            Self::U10 => "10",
            Self::U12 => "12",
            Self::U16 => "16",
            Self::U32 => "32",
            Self::F16 => "16f",
            Self::F32 => "32f",
        }
    }

    /// Parses a label written by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "8" => Some(Self::U8),
            "10" => Some(Self::U10),
            "12" => Some(Self::U12),
            "16" => Some(Self::U16),
            "32" => Some(Self::U32),
            "16f" | "half" => Some(Self::F16),
            "32f" | "float" => Some(Self::F32),
            _ => None,
        }
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of samples held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataFormat {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    #[default]
    F32,
}

impl DataFormat {
    /// Number of bytes per sample.
    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// Whether this is a floating-point format.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Short name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::F16 => "f16",
            Self::F32 => "f32",
        }
    }

    /// Decodes one native-endian sample into a normalized float.
    ///
    /// `bytes` must hold at least [`bytes_per_channel`](Self::bytes_per_channel) bytes.
    #[inline]
    pub fn read_sample(&self, bytes: &[u8]) -> f32 {
        match self {
            Self::U8 => bytes[0] as f32 / 255.0,
            Self::U16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 65535.0,
            Self::U32 => {
                let v = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (v as f64 / u32::MAX as f64) as f32
            }
            Self::F16 => f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]])).to_f32(),
            Self::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encodes a normalized float. Integer formats clamp to `[0, 1]` and round.
    #[inline]
    pub fn write_sample(&self, bytes: &mut [u8], value: f32) {
        match self {
            Self::U8 => bytes[0] = quantize(value, 255.0) as u8,
            Self::U16 => {
                let v = quantize(value, 65535.0) as u16;
                bytes[..2].copy_from_slice(&v.to_ne_bytes());
            }
            Self::U32 => {
                let v = (value.clamp(0.0, 1.0) as f64 * u32::MAX as f64).round() as u32;
                bytes[..4].copy_from_slice(&v.to_ne_bytes());
            }
            Self::F16 => bytes[..2].copy_from_slice(&f16::from_f32(value).to_bits().to_ne_bytes()),
            Self::F32 => bytes[..4].copy_from_slice(&value.to_ne_bytes()),
        }
    }
}

#[inline]
fn quantize(value: f32, max: f32) -> f32 {
    // NaN clamps to 0
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (v * max).round()
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<DataFormat> for BitDepth {
    fn from(fmt: DataFormat) -> Self {
        match fmt {
            DataFormat::U8 => BitDepth::U8,
            DataFormat::U16 => BitDepth::U16,
            DataFormat::U32 => BitDepth::U32,
            DataFormat::F16 => BitDepth::F16,
            DataFormat::F32 => BitDepth::F32,
        }
    }
}

impl From<BitDepth> for DataFormat {
    fn from(depth: BitDepth) -> Self {
        depth.storage_format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bit_depth_labels() {
        for depth in [
            BitDepth::U8,
            BitDepth::U10,
            BitDepth::U12,
            BitDepth::U16,
            BitDepth::U32,
            BitDepth::F16,
            BitDepth::F32,
        ] {
            assert_eq!(BitDepth::parse(depth.as_str()), Some(depth));
        }
        assert_eq!(BitDepth::parse("float"), Some(BitDepth::F32));
        assert_eq!(BitDepth::parse("7"), None);
    }

    #[test]
    fn test_sample_u8() {
        let mut b = [0u8; 1];
        DataFormat::U8.write_sample(&mut b, 64.0 / 255.0);
        assert_eq!(b[0], 64);
        assert_relative_eq!(DataFormat::U8.read_sample(&[128]), 0.50196, epsilon = 1e-4);
        DataFormat::U8.write_sample(&mut b, 2.0);
        assert_eq!(b[0], 255);
        DataFormat::U8.write_sample(&mut b, f32::NAN);
        assert_eq!(b[0], 0);
    }

    #[test]
    fn test_sample_float() {
        let mut b = [0u8; 4];
        DataFormat::F32.write_sample(&mut b, -2.5);
        assert_eq!(DataFormat::F32.read_sample(&b), -2.5);

        let mut h = [0u8; 2];
        DataFormat::F16.write_sample(&mut h, 0.5);
        assert_eq!(DataFormat::F16.read_sample(&h), 0.5);
    }

    #[test]
    fn test_storage_format() {
        assert_eq!(BitDepth::U12.storage_format(), DataFormat::U16);
        assert_eq!(DataFormat::F16.bytes_per_channel(), 2);
        assert_eq!(BitDepth::from(DataFormat::U8), BitDepth::U8);
    }
}
