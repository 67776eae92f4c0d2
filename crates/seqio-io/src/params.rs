//! Persisted reader and writer parameters.
//!
//! Hosts keep these between sessions. Everything that refers to a file's
//! contents (channels, colorspaces, output layer) is stored by name, and
//! values the pipelines derive from the file carry a `*_user_set` flag so a
//! reload never overwrites a user's choice.
//!
//! ```rust
//! use seqio_io::params::{Persist, ReaderParams};
//!
//! let params = ReaderParams {
//!     file: "plates/shot.####.exr".into(),
//!     ..Default::default()
//! };
//! let yaml = params.to_yaml().unwrap();
//! assert_eq!(ReaderParams::from_yaml(&yaml).unwrap(), params);
//! ```

use std::fs;
use std::path::Path;

use seqio_color::ColorspaceState;
use seqio_core::{BitDepth, Components, Premult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::resolver::{MissingFramePolicy, TimeMapping};
use crate::sequence::FrameRange;
use crate::IoResult;

/// YAML persistence shared by both parameter sets.
pub trait Persist: Serialize + DeserializeOwned {
    /// Serializes to YAML.
    fn to_yaml(&self) -> IoResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parses YAML; missing keys take their defaults.
    fn from_yaml(yaml: &str) -> IoResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Writes to `path`.
    fn save(&self, path: &Path) -> IoResult<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Reads from `path`.
    fn load(path: &Path) -> IoResult<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }
}

/// Reader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderParams {
    /// File or sequence pattern.
    pub file: String,
    /// Lower resolution stand-in pattern.
    pub proxy_file: Option<String>,
    /// Render scale at or below which the proxy is used.
    pub proxy_threshold: [f64; 2],
    /// Use `original_proxy_scale` instead of the detected ratio.
    pub custom_proxy_scale: bool,
    /// Proxy to original resolution ratio.
    pub original_proxy_scale: [f64; 2],
    pub first_frame: i32,
    pub last_frame: i32,
    pub frame_range_user_set: bool,
    /// Range found on disk when the file was set.
    pub original_frame_range: Option<FrameRange>,
    pub time: TimeMapping,
    pub missing_frame: MissingFramePolicy,
    pub output_components: Components,
    pub premult: Premult,
    pub premult_user_set: bool,
    /// Full channel names per RGBA slot, "0" and "1" for constants.
    pub channel_names: [String; 4],
    /// Menu indices per slot, used when a name is not in the file.
    pub channel_indices: [usize; 4],
    /// "RGBA", "RGB", "Alpha" or a layer name.
    pub output_layer: String,
    pub colorspace: ColorspaceState,
    pub colorspace_user_set: bool,
    pub custom_fps: bool,
    pub fps: f64,
}

impl Default for ReaderParams {
    fn default() -> Self {
        Self {
            file: String::new(),
            proxy_file: None,
            proxy_threshold: [0.5, 0.5],
            custom_proxy_scale: false,
            original_proxy_scale: [1.0, 1.0],
            first_frame: 1,
            last_frame: 1,
            frame_range_user_set: false,
            original_frame_range: None,
            time: TimeMapping::default(),
            missing_frame: MissingFramePolicy::default(),
            output_components: Components::Rgba,
            premult: Premult::Premultiplied,
            premult_user_set: false,
            channel_names: Default::default(),
            channel_indices: [0; 4],
            output_layer: "RGBA".into(),
            colorspace: ColorspaceState::default(),
            colorspace_user_set: false,
            custom_fps: false,
            fps: 24.0,
        }
    }
}

impl Persist for ReaderParams {}

impl ReaderParams {
    /// User frame range, if one was set.
    pub fn user_frame_range(&self) -> Option<FrameRange> {
        self.frame_range_user_set
            .then(|| FrameRange::new(self.first_frame, self.last_frame))
    }
}

/// How planes and views are spread over output parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartsSplitting {
    /// Everything in one part; views are channel prefixes.
    #[default]
    SinglePart,
    /// One part per view.
    SplitViews,
    /// One part per view and plane.
    SplitViewsLayers,
}

/// Frames the writer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRangeChoice {
    /// Union of the inputs' ranges.
    #[default]
    Union,
    /// Explicit range.
    Manual { first: i32, last: i32 },
}

/// Writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterParams {
    /// Output file or pattern, may contain `%V`/`%v`.
    pub file: String,
    pub frame_range: FrameRangeChoice,
    pub bit_depth: BitDepth,
    pub bit_depth_user_set: bool,
    pub compression: Option<String>,
    /// Lossy quality, 0-100.
    pub quality: Option<i32>,
    /// Tile edge, 0 for scanlines.
    pub tile_size: u32,
    /// EXIF orientation, 1 is top-left.
    pub orientation: i32,
    /// Premultiplication state of the incoming host buffers.
    pub input_premult: Premult,
    pub parts_splitting: PartsSplitting,
    /// Views to write, in order. Empty writes the main view only.
    pub views: Vec<String>,
    /// "All", "RGBA", "RGB", "Alpha" or a layer name.
    pub output_layer: String,
    pub colorspace: ColorspaceState,
    pub output_colorspace_user_set: bool,
}

impl Default for WriterParams {
    fn default() -> Self {
        Self {
            file: String::new(),
            frame_range: FrameRangeChoice::Union,
            bit_depth: BitDepth::F16,
            bit_depth_user_set: false,
            compression: None,
            quality: None,
            tile_size: 0,
            orientation: 1,
            input_premult: Premult::Premultiplied,
            parts_splitting: PartsSplitting::SinglePart,
            views: Vec::new(),
            output_layer: "RGBA".into(),
            colorspace: ColorspaceState::default(),
            output_colorspace_user_set: false,
        }
    }
}

impl Persist for WriterParams {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{BoundaryPolicy, TimeMode};

    #[test]
    fn test_missing_keys_take_defaults() {
        let params = ReaderParams::from_yaml("file: a.####.exr\nfirst_frame: 5\n").unwrap();
        assert_eq!(params.file, "a.####.exr");
        assert_eq!(params.first_frame, 5);
        assert_eq!(params.output_layer, "RGBA");
        assert_eq!(params.time.after, BoundaryPolicy::Hold);
        assert!(params.user_frame_range().is_none());
    }

    #[test]
    fn test_reader_round_trip() {
        let mut params = ReaderParams {
            file: "plates/shot.%04d.exr".into(),
            frame_range_user_set: true,
            first_frame: 10,
            last_frame: 20,
            channel_names: ["diffuse.R".into(), "diffuse.G".into(), "diffuse.B".into(), "0".into()],
            ..Default::default()
        };
        params.time.mode = TimeMode::Offset;
        params.time.before = BoundaryPolicy::Loop;
        params.colorspace.context.set("SHOT", "sh010").unwrap();

        let yaml = params.to_yaml().unwrap();
        assert!(yaml.contains("mode: offset"));
        let back = ReaderParams::from_yaml(&yaml).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.user_frame_range(), Some(FrameRange::new(10, 20)));
    }

    #[test]
    fn test_writer_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.yaml");
        let params = WriterParams {
            file: "out/%V/beauty.####.exr".into(),
            frame_range: FrameRangeChoice::Manual { first: 1, last: 48 },
            parts_splitting: PartsSplitting::SplitViewsLayers,
            views: vec!["left".into(), "right".into()],
            ..Default::default()
        };
        params.save(&path).unwrap();
        assert_eq!(WriterParams::load(&path).unwrap(), params);
    }

    #[test]
    fn test_bad_yaml_is_params_error() {
        let err = WriterParams::from_yaml("parts_splitting: [").unwrap_err();
        assert!(matches!(err, crate::IoError::Params(_)));
    }
}
