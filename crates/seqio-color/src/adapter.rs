//! Colorspace state of one reader or writer instance.
//!
//! [`ColorTransformAdapter`] owns the persisted [`ColorspaceState`] (input
//! and output names plus context) and talks to a shared [`ColorEngine`].
//! Names are stored as strings, never indices: the available list comes
//! from an external configuration that may change between sessions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use seqio_color::{ColorConcept, ColorConfig, ColorTransformAdapter, Direction};
//!
//! let mut adapter = ColorTransformAdapter::new(Arc::new(ColorConfig::aces_legacy()));
//! // the config has no "sRGB", the next alias is used
//! assert_eq!(adapter.assign(Direction::Input, ColorConcept::Srgb).as_deref(), Some("rrt_srgb"));
//! assert_eq!(adapter.input(), "rrt_srgb");
//! ```

use crate::aliases::ColorConcept;
use crate::config::roles;
use crate::context::Context;
use crate::detect::{concept_from_bit_depth, concept_from_tag, detect_concept};
use crate::engine::ColorEngine;
use crate::error::{ColorError, ColorResult};
use crate::processor::Processor;
use seqio_core::{attr, BitDepth, ImageSpec, PixelBuffer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which side of the transform a name applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Space the data arrives in.
    Input,
    /// Space the data leaves in.
    Output,
}

/// Persisted colorspace parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorspaceState {
    /// Input colorspace name.
    pub input: String,
    /// Output colorspace name.
    pub output: String,
    /// Up to four context pairs.
    #[serde(default)]
    pub context: Context,
}

/// Resolves, validates and applies colorspace conversions.
#[derive(Debug, Clone)]
pub struct ColorTransformAdapter {
    engine: Arc<dyn ColorEngine>,
    state: ColorspaceState,
    message: Option<String>,
}

impl ColorTransformAdapter {
    /// Adapter with both sides set to scene-linear (or the first space).
    pub fn new(engine: Arc<dyn ColorEngine>) -> Self {
        let default = ColorConcept::Linear
            .preferred()
            .iter()
            .find(|name| engine.has_colorspace(name))
            .map(|name| name.to_string())
            .or_else(|| engine.colorspace_names().into_iter().next())
            .unwrap_or_default();
        let state = ColorspaceState {
            input: default.clone(),
            output: default,
            context: Context::new(),
        };
        Self {
            engine,
            state,
            message: None,
        }
    }

    /// Adapter restored from persisted state. Names are not validated here;
    /// call [`validate`](Self::validate) to surface stale names.
    pub fn with_state(engine: Arc<dyn ColorEngine>, state: ColorspaceState) -> Self {
        Self {
            engine,
            state,
            message: None,
        }
    }

    /// Shared engine.
    pub fn engine(&self) -> &Arc<dyn ColorEngine> {
        &self.engine
    }

    /// Persisted state.
    pub fn state(&self) -> &ColorspaceState {
        &self.state
    }

    /// Input colorspace name.
    pub fn input(&self) -> &str {
        &self.state.input
    }

    /// Output colorspace name.
    pub fn output(&self) -> &str {
        &self.state.output
    }

    /// Context pairs.
    pub fn context(&self) -> &Context {
        &self.state.context
    }

    /// Sets a context pair.
    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) -> ColorResult<()> {
        self.state.context.set(key, value)
    }

    /// Persistent user-visible message left by the last failed change.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// True when the active configuration knows `name`.
    pub fn has_colorspace(&self, name: &str) -> bool {
        self.engine.has_colorspace(&self.state.context.resolve(name))
    }

    /// Sets one side. An unknown name leaves the state untouched.
    pub fn set_colorspace(&mut self, direction: Direction, name: &str) -> ColorResult<()> {
        if !self.has_colorspace(name) {
            let err = ColorError::not_found(name);
            warn!(engine = self.engine.name(), "{err}");
            self.message = Some(err.to_string());
            return Err(err);
        }
        match direction {
            Direction::Input => self.state.input = name.to_string(),
            Direction::Output => self.state.output = name.to_string(),
        }
        self.message = None;
        Ok(())
    }

    /// Checks both persisted names against the configuration.
    pub fn validate(&mut self) -> ColorResult<()> {
        for name in [&self.state.input, &self.state.output] {
            if !self.engine.has_colorspace(&self.state.context.resolve(name)) {
                let err = ColorError::not_found(name.as_str());
                self.message = Some(err.to_string());
                return Err(err);
            }
        }
        self.message = None;
        Ok(())
    }

    /// Transform between two explicit spaces under this adapter's context.
    pub fn get_processor(&self, input: &str, output: &str) -> ColorResult<Arc<Processor>> {
        self.engine.processor(input, output, &self.state.context)
    }

    /// Transform between the configured input and output.
    pub fn processor(&self) -> ColorResult<Arc<Processor>> {
        self.get_processor(&self.state.input, &self.state.output)
    }

    /// True when both sides resolve to the same space and no context is active.
    pub fn is_identity(&self) -> bool {
        if self.state.context.is_active() {
            return false;
        }
        let ctx = &self.state.context;
        match (
            self.engine.canonical_name(&self.state.input, ctx),
            self.engine.canonical_name(&self.state.output, ctx),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Converts the first `color_channels` channels of `buf`, unless identity.
    pub fn apply(&self, buf: &mut PixelBuffer, color_channels: usize) -> ColorResult<()> {
        if self.is_identity() {
            return Ok(());
        }
        self.processor()?.apply(buf, color_channels);
        Ok(())
    }

    /// Assigns the first alias of `concept` the configuration knows.
    ///
    /// Returns the chosen name, or `None` with the state untouched.
    pub fn assign(&mut self, direction: Direction, concept: ColorConcept) -> Option<String> {
        let name = concept
            .preferred()
            .iter()
            .find(|name| self.engine.has_colorspace(name))?
            .to_string();
        debug!(?concept, ?direction, %name, "assigned colorspace alias");
        match direction {
            Direction::Input => self.state.input = name.clone(),
            Direction::Output => self.state.output = name.clone(),
        }
        self.message = None;
        Some(name)
    }

    /// Picks the input space for a newly opened file.
    ///
    /// A colorspace named in the file name wins; otherwise the metadata tag,
    /// ICC profile and bit depth are consulted in that order. Returns the
    /// name assigned, if any.
    pub fn auto_detect_input(&mut self, spec: &ImageSpec, path: &Path) -> Option<String> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if let Some(name) = self.engine.colorspace_from_string(file_name) {
            debug!(%name, "colorspace from file name");
            self.state.input = name.clone();
            return Some(name);
        }

        if concept_from_tag(spec).is_none() {
            // a tag that is itself a colorspace name of this configuration
            if let Some(tag) = spec.get_string(attr::COLORSPACE) {
                if self.engine.has_colorspace(tag) {
                    self.state.input = tag.to_string();
                    return Some(tag.to_string());
                }
            }
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let concept = detect_concept(spec, extension);
        let assigned = self.assign(Direction::Input, concept);
        if assigned.is_none() {
            warn!(?concept, engine = self.engine.name(), "no matching colorspace, input left unchanged");
        }
        assigned
    }

    /// Picks the output space for a file written at `depth` with `extension`.
    pub fn assign_output_default(&mut self, depth: BitDepth, extension: &str) -> Option<String> {
        let concept = concept_from_bit_depth(depth, extension);
        let assigned = self.assign(Direction::Output, concept);
        if assigned.is_none() && concept != ColorConcept::Linear {
            return self.assign(Direction::Output, ColorConcept::Linear);
        }
        assigned
    }

    /// Concept the output space belongs to.
    pub fn output_concept(&self) -> Option<ColorConcept> {
        let output = &self.state.output;
        if let Some(concept) = ColorConcept::from_colorspace_name(output) {
            return Some(concept);
        }
        let ctx = &self.state.context;
        let canonical = self.engine.canonical_name(output, ctx)?;
        if let Some(concept) = ColorConcept::from_colorspace_name(&canonical) {
            return Some(concept);
        }
        let linear = self.engine.canonical_name(roles::SCENE_LINEAR, ctx);
        (linear.as_deref() == Some(canonical.as_str())).then_some(ColorConcept::Linear)
    }

    /// Metadata tag and gamma to write for the output space.
    pub fn output_file_tag(&self) -> Option<(&'static str, Option<f32>)> {
        self.output_concept().and_then(|c| c.file_tag())
    }

    /// Drops cached transforms.
    pub fn purge_cache(&self) {
        self.engine.purge_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorConfig;
    use approx::assert_relative_eq;
    use seqio_core::{Rect, RowOrder};

    fn nuke() -> ColorTransformAdapter {
        ColorTransformAdapter::new(Arc::new(ColorConfig::nuke_default()))
    }

    #[test]
    fn test_defaults_to_scene_linear() {
        let a = nuke();
        assert_eq!(a.input(), "scene_linear");
        assert!(a.is_identity());
    }

    #[test]
    fn test_unknown_name_keeps_state() {
        let mut a = nuke();
        a.set_colorspace(Direction::Input, "sRGB").unwrap();
        let err = a.set_colorspace(Direction::Input, "ACEScg").unwrap_err();
        assert!(matches!(err, ColorError::ColorSpaceNotFound { .. }));
        assert_eq!(a.input(), "sRGB");
        assert!(a.message().unwrap().contains("ACEScg"));
        a.set_colorspace(Direction::Input, "Cineon").unwrap();
        assert!(a.message().is_none());
    }

    #[test]
    fn test_identity_through_roles() {
        let mut a = nuke();
        a.set_colorspace(Direction::Input, "linear").unwrap();
        a.set_colorspace(Direction::Output, "scene_linear").unwrap();
        assert!(a.is_identity());
        a.set_context("SHOT", "sh010").unwrap();
        assert!(!a.is_identity());
    }

    #[test]
    fn test_apply_skips_identity_and_converts() {
        let region = Rect::from_size(1, 1);
        let mut buf = PixelBuffer::from_vec(vec![0.5, 0.5, 0.5, 0.5], region, 4, RowOrder::TopDown).unwrap();
        let mut a = nuke();
        a.apply(&mut buf, 3).unwrap();
        assert_eq!(buf.samples(), &[0.5, 0.5, 0.5, 0.5]);

        a.set_colorspace(Direction::Input, "sRGB").unwrap();
        a.apply(&mut buf, 3).unwrap();
        assert_relative_eq!(buf.samples()[1], 0.214_041, epsilon = 1e-5);
        assert_eq!(buf.samples()[3], 0.5);
    }

    #[test]
    fn test_stale_name_fails_processor() {
        let state = ColorspaceState {
            input: "gone".into(),
            output: "linear".into(),
            context: Context::new(),
        };
        let mut a = ColorTransformAdapter::with_state(Arc::new(ColorConfig::nuke_default()), state);
        assert!(!a.is_identity());
        assert!(a.processor().is_err());
        assert!(a.validate().is_err());
        assert!(a.message().is_some());
    }

    #[test]
    fn test_assign_miss_leaves_state() {
        let mut a = ColorTransformAdapter::new(Arc::new(ColorConfig::spi_vfx()));
        a.set_colorspace(Direction::Input, "lg10").unwrap();
        assert_eq!(a.assign(Direction::Input, ColorConcept::Gamma18), None);
        assert_eq!(a.assign(Direction::Input, ColorConcept::AdobeRgb), None);
        assert_eq!(a.input(), "lg10");
    }

    #[test]
    fn test_output_tag() {
        let mut a = ColorTransformAdapter::new(Arc::new(ColorConfig::spi_vfx()));
        a.set_colorspace(Direction::Output, "vd16").unwrap();
        assert_eq!(a.output_file_tag(), Some(("GammaCorrected", Some(2.2))));
        a.set_colorspace(Direction::Output, "scene_linear").unwrap();
        assert_eq!(a.output_file_tag(), Some(("Linear", None)));
        a.set_colorspace(Direction::Output, "ncf").unwrap();
        assert_eq!(a.output_file_tag(), None);
    }

    #[test]
    fn test_output_default_by_depth() {
        let mut a = ColorTransformAdapter::new(Arc::new(ColorConfig::nuke_default()));
        assert_eq!(a.assign_output_default(BitDepth::U8, "png").as_deref(), Some("sRGB"));
        assert_eq!(a.assign_output_default(BitDepth::U10, "dpx").as_deref(), Some("Cineon"));
        assert_eq!(a.assign_output_default(BitDepth::U16, "tif").as_deref(), Some("Rec709"));
        assert_eq!(a.assign_output_default(BitDepth::F16, "exr").as_deref(), Some("scene_linear"));
    }
}
