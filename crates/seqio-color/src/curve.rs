//! Per-channel transfer curves between encoded values and scene-linear.
//!
//! | Curve | Encoding |
//! |-------|----------|
//! | `Linear` | identity |
//! | `Srgb` | IEC 61966-2-1 piecewise |
//! | `Rec709` | BT.709 OETF |
//! | `Gamma` | pure power (exponent from the colorspace) |
//! | `Cineon` | Kodak printing density, 10-bit code values 95..685 |
//! | `Data` | never transformed |

use serde::{Deserialize, Serialize};

/// Kind of transfer curve a colorspace uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    /// Already linear.
    #[default]
    Linear,
    /// sRGB piecewise curve.
    Srgb,
    /// Rec.709 OETF.
    Rec709,
    /// Pure power function.
    Gamma,
    /// Kodak Cineon log.
    Cineon,
    /// Non-color data.
    Data,
}

/// A concrete curve with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    /// Identity.
    Linear,
    /// sRGB piecewise curve.
    Srgb,
    /// Rec.709 OETF.
    Rec709,
    /// Pure power with the given exponent.
    Gamma(f32),
    /// Kodak Cineon log.
    Cineon,
}

const CINEON_BLACK: f32 = 95.0;
const CINEON_WHITE: f32 = 685.0;
const CINEON_GAMMA: f32 = 300.0;

fn cineon_black_offset() -> f32 {
    10f32.powf((CINEON_BLACK - CINEON_WHITE) / CINEON_GAMMA)
}

impl Curve {
    /// Builds a curve from a kind and optional gamma. `Data` has no curve.
    pub fn from_kind(kind: CurveKind, gamma: Option<f32>) -> Option<Curve> {
        match kind {
            CurveKind::Linear => Some(Curve::Linear),
            CurveKind::Srgb => Some(Curve::Srgb),
            CurveKind::Rec709 => Some(Curve::Rec709),
            CurveKind::Gamma => Some(Curve::Gamma(gamma.unwrap_or(2.2))),
            CurveKind::Cineon => Some(Curve::Cineon),
            CurveKind::Data => None,
        }
    }

    /// Encoded value to scene-linear.
    #[inline]
    pub fn to_linear(&self, v: f32) -> f32 {
        match *self {
            Curve::Linear => v,
            Curve::Srgb => {
                if v <= 0.04045 {
                    v / 12.92
                } else {
                    ((v + 0.055) / 1.055).powf(2.4)
                }
            }
            Curve::Rec709 => {
                if v < 0.081 {
                    v / 4.5
                } else {
                    ((v + 0.099) / 1.099).powf(1.0 / 0.45)
                }
            }
            Curve::Gamma(g) => v.max(0.0).powf(g),
            Curve::Cineon => {
                let black = cineon_black_offset();
                let code = v * 1023.0;
                (10f32.powf((code - CINEON_WHITE) / CINEON_GAMMA) - black) / (1.0 - black)
            }
        }
    }

    /// Scene-linear to encoded value.
    #[inline]
    pub fn from_linear(&self, l: f32) -> f32 {
        match *self {
            Curve::Linear => l,
            Curve::Srgb => {
                if l <= 0.003_130_8 {
                    l * 12.92
                } else {
                    1.055 * l.powf(1.0 / 2.4) - 0.055
                }
            }
            Curve::Rec709 => {
                if l < 0.018 {
                    4.5 * l
                } else {
                    1.099 * l.powf(0.45) - 0.099
                }
            }
            Curve::Gamma(g) => l.max(0.0).powf(1.0 / g),
            Curve::Cineon => {
                let black = cineon_black_offset();
                let d = (l * (1.0 - black) + black).max(1e-10);
                (CINEON_WHITE + CINEON_GAMMA * d.log10()) / 1023.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trips() {
        for curve in [Curve::Srgb, Curve::Rec709, Curve::Gamma(1.8), Curve::Cineon] {
            for i in 1..=20 {
                let v = i as f32 / 20.0;
                let back = curve.from_linear(curve.to_linear(v));
                assert_relative_eq!(v, back, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_anchor_points() {
        assert_relative_eq!(Curve::Srgb.to_linear(1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(Curve::Cineon.to_linear(685.0 / 1023.0), 1.0, epsilon = 1e-5);
        assert_relative_eq!(Curve::Cineon.to_linear(95.0 / 1023.0), 0.0, epsilon = 1e-5);
        assert_eq!(Curve::from_kind(CurveKind::Data, None), None);
        assert_eq!(Curve::from_kind(CurveKind::Gamma, None), Some(Curve::Gamma(2.2)));
    }
}
