//! Static alias tables per colorspace concept.
//!
//! Industry configurations name the same encoding differently (`sRGB`,
//! `rrt_srgb`, `srgb8` ...). Each [`ColorConcept`] carries two ordered lists:
//!
//! - [`preferred`](ColorConcept::preferred): candidates tried in order when
//!   assigning the concept to a parameter; the first one the active
//!   configuration knows wins.
//! - [`recognized`](ColorConcept::recognized): every name that identifies
//!   the concept when mapping a chosen colorspace back to a file tag.
//!
//! Role names (`scene_linear`, `compositing_log`) appear in the lists as
//! plain strings; engines resolve roles like any other name.

use crate::config::roles;

/// Abstract colorspace, independent of any configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorConcept {
    /// Pure power 1.8.
    Gamma18,
    /// Pure power 2.2.
    Gamma22,
    /// sRGB display encoding.
    Srgb,
    /// Rec.709 video encoding.
    Rec709,
    /// Kodak Cineon style log.
    KodakLog,
    /// Scene-referred linear.
    Linear,
    /// Adobe RGB (1998). No configuration alias is assigned for it.
    AdobeRgb,
    /// Non-color data.
    Raw,
}

const GAMMA18: &[&str] = &["Gamma1.8"];
const GAMMA22_PREFERRED: &[&str] = &["Gamma2.2", "vd16"];
const GAMMA22_RECOGNIZED: &[&str] = &["Gamma2.2", "vd8", "vd10", "vd16", "VD16"];
const SRGB_PREFERRED: &[&str] = &["sRGB", "rrt_srgb", "srgb8"];
const SRGB_RECOGNIZED: &[&str] = &["sRGB", "sRGB (D60 sim.)", "out_srgbd60sim", "rrt_srgb", "srgb8"];
const REC709: &[&str] = &[
    "Rec709",
    "nuke_rec709",
    "Rec.709 - Full",
    "out_rec709full",
    "rrt_rec709_full_100nits",
    "rrt_rec709",
    "hd10",
];
const KODAK_LOG_PREFERRED: &[&str] = &[
    "Cineon",
    "REDlogFilm",
    "cineon",
    "adx10",
    "lg10",
    "lm10",
    roles::COMPOSITING_LOG,
];
const KODAK_LOG_RECOGNIZED: &[&str] = &["KodakLog", "Cineon", "REDlogFilm", "cineon", "adx10", "lg10", "lm10"];
const LINEAR_PREFERRED: &[&str] = &[roles::SCENE_LINEAR, "Linear", "linear"];
const LINEAR_RECOGNIZED: &[&str] = &["Linear", "linear", "ACES2065-1", "aces", "lnf", "ln16"];
const RAW: &[&str] = &["raw", "Raw", "ncf"];

impl ColorConcept {
    /// Candidates for assignment, most preferred first.
    pub const fn preferred(&self) -> &'static [&'static str] {
        match self {
            Self::Gamma18 => GAMMA18,
            Self::Gamma22 => GAMMA22_PREFERRED,
            Self::Srgb => SRGB_PREFERRED,
            Self::Rec709 => REC709,
            Self::KodakLog => KODAK_LOG_PREFERRED,
            Self::Linear => LINEAR_PREFERRED,
            Self::AdobeRgb => &[],
            Self::Raw => RAW,
        }
    }

    /// Names identifying this concept when seen as a chosen colorspace.
    pub const fn recognized(&self) -> &'static [&'static str] {
        match self {
            Self::Gamma18 => GAMMA18,
            Self::Gamma22 => GAMMA22_RECOGNIZED,
            Self::Srgb => SRGB_RECOGNIZED,
            Self::Rec709 => REC709,
            Self::KodakLog => KODAK_LOG_RECOGNIZED,
            Self::Linear => LINEAR_RECOGNIZED,
            Self::AdobeRgb => &[],
            Self::Raw => RAW,
        }
    }

    /// File metadata tag and gamma written for this concept.
    ///
    /// Non-color data carries no tag.
    pub const fn file_tag(&self) -> Option<(&'static str, Option<f32>)> {
        match self {
            Self::Gamma18 => Some(("GammaCorrected", Some(1.8))),
            Self::Gamma22 => Some(("GammaCorrected", Some(2.2))),
            Self::Srgb => Some(("sRGB", None)),
            Self::Rec709 => Some(("Rec709", None)),
            Self::KodakLog => Some(("KodakLog", None)),
            Self::Linear => Some(("Linear", None)),
            Self::AdobeRgb => Some(("AdobeRGB", None)),
            Self::Raw => None,
        }
    }

    /// Concept named by a file metadata tag.
    ///
    /// `GammaCorrected` needs the accompanying gamma; values other than
    /// 1.8 and 2.2 are not recognized.
    pub fn from_file_tag(tag: &str, gamma: Option<f64>) -> Option<Self> {
        match tag {
            "GammaCorrected" => match gamma {
                Some(g) if (g - 1.8).abs() < 1e-3 => Some(Self::Gamma18),
                Some(g) if (g - 2.2).abs() < 1e-3 => Some(Self::Gamma22),
                _ => None,
            },
            "sRGB" => Some(Self::Srgb),
            "Rec709" => Some(Self::Rec709),
            "KodakLog" => Some(Self::KodakLog),
            "Linear" => Some(Self::Linear),
            "AdobeRGB" => Some(Self::AdobeRgb),
            _ => None,
        }
    }

    /// Concept a colorspace name belongs to, by the recognized tables.
    pub fn from_colorspace_name(name: &str) -> Option<Self> {
        [
            Self::Gamma18,
            Self::Gamma22,
            Self::Srgb,
            Self::Rec709,
            Self::KodakLog,
            Self::Linear,
            Self::Raw,
        ]
        .into_iter()
        .find(|c| c.recognized().contains(&name))
    }
}

/// Profile description fragments and the concept they imply, checked in order.
const ICC_PROFILES: &[(&str, ColorConcept)] = &[
    ("sRGB IEC61966-2.1", ColorConcept::Srgb),
    ("sRGB built-in", ColorConcept::Srgb),
    ("sRGB", ColorConcept::Srgb),
    ("ITU-R BT.709", ColorConcept::Rec709),
    ("Rec. 709", ColorConcept::Rec709),
    ("Rec709", ColorConcept::Rec709),
    ("Kodak", ColorConcept::KodakLog),
    ("Cineon", ColorConcept::KodakLog),
];

/// Concept implied by an ICC profile description.
pub fn concept_from_icc_profile(description: &str) -> Option<ColorConcept> {
    ICC_PROFILES
        .iter()
        .find(|(fragment, _)| description.contains(fragment))
        .map(|&(_, concept)| concept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for concept in [
            ColorConcept::Gamma18,
            ColorConcept::Gamma22,
            ColorConcept::Srgb,
            ColorConcept::Rec709,
            ColorConcept::KodakLog,
            ColorConcept::Linear,
            ColorConcept::AdobeRgb,
        ] {
            let (tag, gamma) = concept.file_tag().unwrap();
            assert_eq!(
                ColorConcept::from_file_tag(tag, gamma.map(f64::from)),
                Some(concept)
            );
        }
        assert_eq!(ColorConcept::Raw.file_tag(), None);
        assert_eq!(ColorConcept::from_file_tag("GammaCorrected", Some(2.4)), None);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(ColorConcept::from_colorspace_name("rrt_srgb"), Some(ColorConcept::Srgb));
        assert_eq!(ColorConcept::from_colorspace_name("out_srgbd60sim"), Some(ColorConcept::Srgb));
        assert_eq!(ColorConcept::from_colorspace_name("hd10"), Some(ColorConcept::Rec709));
        assert_eq!(ColorConcept::from_colorspace_name("VD16"), Some(ColorConcept::Gamma22));
        assert_eq!(ColorConcept::from_colorspace_name("ncf"), Some(ColorConcept::Raw));
        assert_eq!(ColorConcept::from_colorspace_name("ACEScg"), None);
    }

    #[test]
    fn test_preferred_order() {
        assert_eq!(ColorConcept::Srgb.preferred()[0], "sRGB");
        assert_eq!(ColorConcept::Linear.preferred()[0], "scene_linear");
        assert_eq!(
            ColorConcept::KodakLog.preferred().last(),
            Some(&"compositing_log")
        );
        assert!(ColorConcept::AdobeRgb.preferred().is_empty());
    }

    #[test]
    fn test_icc_heuristic() {
        assert_eq!(concept_from_icc_profile("sRGB IEC61966-2.1"), Some(ColorConcept::Srgb));
        assert_eq!(concept_from_icc_profile("HDTV ITU-R BT.709"), Some(ColorConcept::Rec709));
        assert_eq!(concept_from_icc_profile("Kodak 5218"), Some(ColorConcept::KodakLog));
        assert_eq!(concept_from_icc_profile("Adobe RGB (1998)"), None);
    }
}
