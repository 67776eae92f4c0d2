//! Colorspace inference from file metadata.
//!
//! Order of evidence on the read side:
//!
//! 1. an explicit `oiio:ColorSpace` tag (with `oiio:Gamma` for `GammaCorrected`)
//! 2. the ICC profile description
//! 3. the stored bit depth: 8-bit integer is sRGB, 10/12/16-bit integer is
//!    Rec.709 (log for Cineon/DPX files), anything else is scene-linear
//!
//! The write side picks a default output encoding from the chosen bit depth
//! and extension with the same table.

use crate::aliases::{concept_from_icc_profile, ColorConcept};
use seqio_core::{attr, BitDepth, ImageSpec};

/// Extensions whose integer data is conventionally log encoded.
const LOG_EXTENSIONS: &[&str] = &["cin", "dpx"];

fn is_log_extension(extension: &str) -> bool {
    LOG_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(extension))
}

/// Concept declared by the colorspace tag alone.
pub fn concept_from_tag(spec: &ImageSpec) -> Option<ColorConcept> {
    let tag = spec.get_string(attr::COLORSPACE)?;
    ColorConcept::from_file_tag(tag, spec.get_float(attr::GAMMA))
}

/// Concept for integer or float data of the given depth.
pub fn concept_from_bit_depth(depth: BitDepth, extension: &str) -> ColorConcept {
    match depth {
        BitDepth::U8 => ColorConcept::Srgb,
        BitDepth::U10 | BitDepth::U12 | BitDepth::U16 if is_log_extension(extension) => ColorConcept::KodakLog,
        BitDepth::U10 | BitDepth::U12 | BitDepth::U16 => ColorConcept::Rec709,
        _ => ColorConcept::Linear,
    }
}

/// Effective stored depth, honouring `oiio:BitsPerSample` for packed data.
fn effective_depth(spec: &ImageSpec) -> BitDepth {
    if spec.format.is_integer() {
        match spec.get_int(attr::BITS_PER_SAMPLE) {
            Some(8) => return BitDepth::U8,
            Some(10) => return BitDepth::U10,
            Some(12) => return BitDepth::U12,
            Some(16) => return BitDepth::U16,
            _ => {}
        }
    }
    spec.format
}

/// Best guess at the concept a file is encoded in.
pub fn detect_concept(spec: &ImageSpec, extension: &str) -> ColorConcept {
    if let Some(concept) = concept_from_tag(spec) {
        return concept;
    }
    if let Some(concept) = spec
        .get_string(attr::ICC_PROFILE_NAME)
        .and_then(concept_from_icc_profile)
    {
        return concept;
    }
    concept_from_bit_depth(effective_depth(spec), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(depth: BitDepth) -> ImageSpec {
        ImageSpec::rgb(2, 2, depth)
    }

    #[test]
    fn test_tag_wins() {
        let mut s = spec(BitDepth::U8);
        s.set_attr(attr::COLORSPACE, "KodakLog");
        s.set_attr(attr::ICC_PROFILE_NAME, "sRGB IEC61966-2.1");
        assert_eq!(detect_concept(&s, "png"), ColorConcept::KodakLog);
    }

    #[test]
    fn test_gamma_tag() {
        let mut s = spec(BitDepth::U16);
        s.set_attr(attr::COLORSPACE, "GammaCorrected");
        s.set_attr(attr::GAMMA, 1.8f32);
        assert_eq!(detect_concept(&s, "tif"), ColorConcept::Gamma18);
    }

    #[test]
    fn test_icc_before_depth() {
        let mut s = spec(BitDepth::U16);
        s.set_attr(attr::ICC_PROFILE_NAME, "sRGB built-in");
        assert_eq!(detect_concept(&s, "tif"), ColorConcept::Srgb);
    }

    #[test]
    fn test_depth_fallback() {
        assert_eq!(detect_concept(&spec(BitDepth::U8), "png"), ColorConcept::Srgb);
        assert_eq!(detect_concept(&spec(BitDepth::U16), "png"), ColorConcept::Rec709);
        assert_eq!(detect_concept(&spec(BitDepth::U10), "DPX"), ColorConcept::KodakLog);
        assert_eq!(detect_concept(&spec(BitDepth::F16), "exr"), ColorConcept::Linear);
        assert_eq!(detect_concept(&spec(BitDepth::U32), "tif"), ColorConcept::Linear);

        let mut packed = spec(BitDepth::U16);
        packed.set_attr(attr::BITS_PER_SAMPLE, 8);
        assert_eq!(detect_concept(&packed, "tif"), ColorConcept::Srgb);
    }
}
