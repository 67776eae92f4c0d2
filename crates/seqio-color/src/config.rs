//! Color configuration loaded from YAML.
//!
//! The document lists colorspaces with their transfer curve and optional
//! aliases, plus a role table mapping role names to colorspaces:
//!
//! ```yaml
//! name: studio
//! roles:
//!   scene_linear: linear
//!   compositing_log: Cineon
//! colorspaces:
//!   - name: linear
//!     aliases: [Linear]
//!   - name: sRGB
//!     curve: srgb
//!   - name: Gamma2.2
//!     curve: gamma
//!     gamma: 2.2
//!   - name: raw
//!     curve: data
//! ```
//!
//! Lookups try the exact name, then roles, then aliases, then a
//! case-insensitive match on names and aliases.
//!
//! # Example
//!
//! ```
//! use seqio_color::{ColorConfig, ColorEngine, Context};
//!
//! let config = ColorConfig::nuke_default();
//! assert!(config.has_colorspace("scene_linear"));
//! let p = config.processor("sRGB", "linear", &Context::new()).unwrap();
//! assert!(!p.is_noop());
//! ```

use crate::context::Context;
use crate::curve::{Curve, CurveKind};
use crate::engine::ColorEngine;
use crate::error::{ColorError, ColorResult};
use crate::processor::Processor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Role names the adapter relies on.
pub mod roles {
    /// Scene-referred linear working space.
    pub const SCENE_LINEAR: &str = "scene_linear";
    /// Log space used for compositing log data.
    pub const COMPOSITING_LOG: &str = "compositing_log";
    /// Reference space.
    pub const REFERENCE: &str = "reference";
    /// Non-color data.
    pub const DATA: &str = "data";
    /// Default input space.
    pub const DEFAULT: &str = "default";
}

/// One colorspace entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSpaceDef {
    /// Unique name.
    pub name: String,
    /// Grouping shown in menus.
    #[serde(default)]
    pub family: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Alternative names.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Transfer curve to linear.
    #[serde(default)]
    pub curve: CurveKind,
    /// Exponent for `gamma` curves.
    #[serde(default)]
    pub gamma: Option<f32>,
}

impl ColorSpaceDef {
    fn new(name: &str, curve: CurveKind) -> Self {
        Self {
            name: name.to_string(),
            family: String::new(),
            description: String::new(),
            aliases: Vec::new(),
            curve,
            gamma: None,
        }
    }

    fn gamma(mut self, g: f32) -> Self {
        self.gamma = Some(g);
        self
    }

    fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Curve of this space, `None` for data.
    pub fn curve(&self) -> Option<Curve> {
        Curve::from_kind(self.curve, self.gamma)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: BTreeMap<String, String>,
    colorspaces: Vec<ColorSpaceDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProcessorKey {
    input: String,
    output: String,
    context: Context,
}

/// In-process color engine backed by a parsed configuration.
#[derive(Debug)]
pub struct ColorConfig {
    name: String,
    spaces: Vec<ColorSpaceDef>,
    roles: BTreeMap<String, String>,
    processors: RwLock<HashMap<ProcessorKey, Arc<Processor>>>,
}

impl ColorConfig {
    /// Builds a config from parts, validating names and roles.
    pub fn new(
        name: impl Into<String>,
        spaces: Vec<ColorSpaceDef>,
        roles: BTreeMap<String, String>,
    ) -> ColorResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for cs in &spaces {
            if !seen.insert(cs.name.as_str()) {
                return Err(ColorError::InvalidConfig(format!("duplicate colorspace '{}'", cs.name)));
            }
        }
        for (role, target) in &roles {
            if !spaces.iter().any(|cs| &cs.name == target) {
                return Err(ColorError::InvalidConfig(format!(
                    "role '{role}' refers to unknown colorspace '{target}'"
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            spaces,
            roles,
            processors: RwLock::new(HashMap::new()),
        })
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ColorResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::new(file.name.unwrap_or_default(), file.colorspaces, file.roles)
    }

    /// Loads a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> ColorResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ColorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        if config.name.is_empty() {
            config.name = path.display().to_string();
        }
        Ok(config)
    }

    /// Colorspace definitions in order.
    pub fn colorspaces(&self) -> &[ColorSpaceDef] {
        &self.spaces
    }

    /// Colorspace a role points to.
    pub fn role(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(|s| s.as_str())
    }

    /// Looks up a colorspace by name, role or alias.
    pub fn find(&self, name: &str) -> Option<&ColorSpaceDef> {
        if let Some(cs) = self.spaces.iter().find(|cs| cs.name == name) {
            return Some(cs);
        }
        if let Some(target) = self.roles.get(name) {
            return self.spaces.iter().find(|cs| &cs.name == target);
        }
        if let Some(cs) = self.spaces.iter().find(|cs| cs.aliases.iter().any(|a| a == name)) {
            return Some(cs);
        }
        self.spaces.iter().find(|cs| {
            cs.name.eq_ignore_ascii_case(name) || cs.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }

    fn find_in_context(&self, name: &str, context: &Context) -> ColorResult<&ColorSpaceDef> {
        let resolved = context.resolve(name);
        self.find(&resolved).ok_or(ColorError::not_found(resolved))
    }

    /// Number of cached processors.
    pub fn cached_processors(&self) -> usize {
        self.processors.read().unwrap().len()
    }

    /// Config modelled on Nuke's default naming.
    pub fn nuke_default() -> Self {
        let spaces = vec![
            ColorSpaceDef::new("linear", CurveKind::Linear).alias("Linear"),
            ColorSpaceDef::new("sRGB", CurveKind::Srgb),
            ColorSpaceDef::new("rec709", CurveKind::Rec709),
            ColorSpaceDef::new("Cineon", CurveKind::Cineon),
            ColorSpaceDef::new("Gamma1.8", CurveKind::Gamma).gamma(1.8),
            ColorSpaceDef::new("Gamma2.2", CurveKind::Gamma).gamma(2.2),
            ColorSpaceDef::new("raw", CurveKind::Data),
        ];
        let roles = role_table(&[
            (roles::SCENE_LINEAR, "linear"),
            (roles::REFERENCE, "linear"),
            (roles::COMPOSITING_LOG, "Cineon"),
            (roles::DATA, "raw"),
            (roles::DEFAULT, "raw"),
        ]);
        builtin("nuke-default", spaces, roles)
    }

    /// Config modelled on the early ACES naming (`aces`, `rrt_srgb`, ...).
    pub fn aces_legacy() -> Self {
        let spaces = vec![
            ColorSpaceDef::new("aces", CurveKind::Linear).alias("ACES2065-1"),
            ColorSpaceDef::new("acescg", CurveKind::Linear),
            ColorSpaceDef::new("adx10", CurveKind::Cineon),
            ColorSpaceDef::new("rrt_srgb", CurveKind::Srgb),
            ColorSpaceDef::new("rrt_rec709", CurveKind::Rec709),
            ColorSpaceDef::new("rrt_rec709_full_100nits", CurveKind::Rec709),
            ColorSpaceDef::new("raw", CurveKind::Data),
        ];
        let roles = role_table(&[
            (roles::SCENE_LINEAR, "aces"),
            (roles::REFERENCE, "aces"),
            (roles::COMPOSITING_LOG, "adx10"),
            (roles::DATA, "raw"),
        ]);
        builtin("aces-legacy", spaces, roles)
    }

    /// Config modelled on the Imageworks VFX naming (`lnf`, `srgb8`, ...).
    pub fn spi_vfx() -> Self {
        let spaces = vec![
            ColorSpaceDef::new("lnf", CurveKind::Linear),
            ColorSpaceDef::new("ln16", CurveKind::Linear),
            ColorSpaceDef::new("lg10", CurveKind::Cineon),
            ColorSpaceDef::new("srgb8", CurveKind::Srgb),
            ColorSpaceDef::new("hd10", CurveKind::Rec709),
            ColorSpaceDef::new("vd16", CurveKind::Gamma).gamma(2.2),
            ColorSpaceDef::new("ncf", CurveKind::Data),
        ];
        let roles = role_table(&[
            (roles::SCENE_LINEAR, "lnf"),
            (roles::REFERENCE, "lnf"),
            (roles::COMPOSITING_LOG, "lg10"),
            (roles::DATA, "ncf"),
        ]);
        builtin("spi-vfx", spaces, roles)
    }
}

fn role_table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(r, c)| (r.to_string(), c.to_string()))
        .collect()
}

fn builtin(name: &str, spaces: Vec<ColorSpaceDef>, roles: BTreeMap<String, String>) -> ColorConfig {
    ColorConfig::new(name, spaces, roles)
        .unwrap_or_else(|e| unreachable!("built-in config '{name}' is valid: {e}"))
}

/// Whole-word, case-insensitive occurrence of `needle` in `haystack`.
fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    hay.match_indices(&needle).any(|(i, m)| {
        let before = hay[..i].chars().next_back();
        let after = hay[i + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

impl ColorEngine for ColorConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn colorspace_names(&self) -> Vec<String> {
        self.spaces.iter().map(|cs| cs.name.clone()).collect()
    }

    fn has_colorspace(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn canonical_name(&self, name: &str, context: &Context) -> Option<String> {
        self.find_in_context(name, context).ok().map(|cs| cs.name.clone())
    }

    fn processor(&self, input: &str, output: &str, context: &Context) -> ColorResult<Arc<Processor>> {
        let key = ProcessorKey {
            input: input.to_string(),
            output: output.to_string(),
            context: context.clone(),
        };
        if let Some(p) = self.processors.read().unwrap().get(&key) {
            return Ok(Arc::clone(p));
        }

        let src = self.find_in_context(input, context)?;
        let dst = self.find_in_context(output, context)?;
        let processor = Arc::new(Processor::between(src.curve(), dst.curve()));
        debug!(input = %src.name, output = %dst.name, ops = processor.ops().len(), "built color processor");

        self.processors
            .write()
            .unwrap()
            .insert(key, Arc::clone(&processor));
        Ok(processor)
    }

    fn colorspace_from_string(&self, text: &str) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for cs in &self.spaces {
            for candidate in std::iter::once(&cs.name).chain(cs.aliases.iter()) {
                if contains_token(text, candidate) && best.is_none_or(|(_, len)| candidate.len() > len) {
                    best = Some((cs.name.as_str(), candidate.len()));
                }
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    fn purge_cache(&self) {
        self.processors.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let config = ColorConfig::nuke_default();
        assert_eq!(config.find("linear").unwrap().name, "linear");
        assert_eq!(config.find("scene_linear").unwrap().name, "linear");
        assert_eq!(config.find("Linear").unwrap().name, "linear");
        // case-insensitive fallback
        assert_eq!(config.find("Rec709").unwrap().name, "rec709");
        assert!(config.find("ACEScg").is_none());
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
name: test
roles:
  scene_linear: lin
colorspaces:
  - name: lin
  - name: log
    curve: cineon
  - name: g24
    curve: gamma
    gamma: 2.4
"#;
        let config = ColorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.name(), "test");
        assert_eq!(config.colorspace_names(), vec!["lin", "log", "g24"]);
        assert_eq!(config.find("g24").unwrap().curve(), Some(Curve::Gamma(2.4)));
    }

    #[test]
    fn test_invalid_role() {
        let yaml = "roles: {scene_linear: nope}\ncolorspaces: [{name: lin}]\n";
        assert!(matches!(
            ColorConfig::from_yaml_str(yaml),
            Err(ColorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_processor_cache_and_purge() {
        let config = ColorConfig::nuke_default();
        let ctx = Context::new();
        let a = config.processor("sRGB", "linear", &ctx).unwrap();
        let b = config.processor("sRGB", "linear", &ctx).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(config.cached_processors(), 1);
        config.purge_cache();
        assert_eq!(config.cached_processors(), 0);
    }

    #[test]
    fn test_missing_space_is_config_error() {
        let config = ColorConfig::spi_vfx();
        let err = config.processor("sRGB", "lnf", &Context::new()).unwrap_err();
        assert!(matches!(err, ColorError::ColorSpaceNotFound { ref name } if name == "sRGB"));
    }

    #[test]
    fn test_context_substitution() {
        let config = ColorConfig::spi_vfx();
        let mut ctx = Context::new();
        ctx.set("LOG", "lg10").unwrap();
        assert_eq!(config.canonical_name("$LOG", &ctx).as_deref(), Some("lg10"));
        assert!(config.processor("$LOG", "lnf", &ctx).is_ok());
    }

    #[test]
    fn test_colorspace_from_string() {
        let config = ColorConfig::spi_vfx();
        assert_eq!(
            config.colorspace_from_string("plate_lg10.0001.dpx").as_deref(),
            Some("lg10")
        );
        assert_eq!(config.colorspace_from_string("plate.0001.dpx"), None);
        // substring inside a word does not count
        assert_eq!(config.colorspace_from_string("xlnfx.exr"), None);
    }
}
