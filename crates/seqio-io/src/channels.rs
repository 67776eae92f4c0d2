//! Channel discovery, layer grouping and RGBA mapping.
//!
//! A file exposes channels per sub-image. This module flattens them into
//! full names, groups them into layers by the text before the last `.`,
//! and decides which physical channel backs each RGBA slot of a requested
//! plane.
//!
//! # Default mapping
//!
//! 1. Look for a channel literally named `R`, `r` or `red` in sub-image
//!    order, then for one ending in `.R`, `.r` or `.red`.
//! 2. Green, blue and alpha are the same name with the suffix replaced,
//!    exact matches in the same sub-image only. Missing green or blue is
//!    constant 0.
//! 3. Missing alpha is the sub-image's declared alpha; otherwise, for a
//!    layer without exactly four channels, constant 0 with the mapping
//!    downgraded to RGB; otherwise the remaining unclaimed channel.
//! 4. Without any red: three or more channels map to 0/1/2 of the first
//!    sub-image; one channel is luminance (or alpha when declared as such);
//!    two channels are luminance plus alpha; none is opaque black.
//!
//! Mappings are persisted as full channel names. Indices only exist for
//! the menus built from the file at hand.

use std::fmt;

use seqio_core::{Components, ImageSpec, SingleChannelRole};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{IoError, IoResult};

/// Menu entries preceding the channels.
pub const CONSTANT_OPTIONS: [&str; 2] = ["0", "1"];

/// One physical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Full name, prefixed with the sub-image name past the first sub-image.
    pub name: String,
    pub sub_image: usize,
    /// Index inside the sub-image.
    pub index: usize,
}

/// Channels sharing a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGroup {
    pub name: String,
    pub channels: Vec<ChannelSpec>,
    /// True for the implicit color layer of undotted R, G, B, A channels.
    pub is_color: bool,
}

/// Where a slot's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSource {
    Zero,
    One,
    Channel { sub_image: usize, index: usize },
}

/// Requested logical plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Plane {
    #[default]
    Rgba,
    Rgb,
    Alpha,
    /// Named layer.
    Custom(String),
}

impl Plane {
    /// Name as shown in menus and persisted.
    pub fn name(&self) -> &str {
        match self {
            Self::Rgba => "RGBA",
            Self::Rgb => "RGB",
            Self::Alpha => "Alpha",
            Self::Custom(name) => name,
        }
    }

    /// Plane named `name`; unknown names are custom layers.
    pub fn from_name(name: &str) -> Self {
        match name {
            "RGBA" => Self::Rgba,
            "RGB" => Self::Rgb,
            "Alpha" | "A" => Self::Alpha,
            other => Self::Custom(other.to_string()),
        }
    }

    /// True for RGBA, RGB and Alpha.
    pub fn is_color(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical sources of a plane's RGBA slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMapping {
    pub plane: Plane,
    /// Sources of R, G, B and A.
    pub sources: [ChannelSource; 4],
    /// Components the file provides for this plane.
    pub components: Components,
    /// Set when one channel backs the whole plane.
    pub single: Option<SingleChannelRole>,
}

impl ChannelMapping {
    /// RGBA slots to read, in working-buffer order.
    pub fn working_slots(&self) -> &'static [usize] {
        match self.single {
            Some(SingleChannelRole::Luminance) => &[0],
            Some(SingleChannelRole::Alpha) => &[3],
            None => self.components.slots(),
        }
    }

    /// How a one-channel working buffer expands.
    pub fn role(&self) -> SingleChannelRole {
        match self.working_slots() {
            [3] => SingleChannelRole::Alpha,
            _ => SingleChannelRole::Luminance,
        }
    }

    /// Leading working channels that hold color.
    pub fn color_channels(&self) -> usize {
        match (self.single, self.components) {
            (Some(SingleChannelRole::Luminance), _) => 1,
            (Some(SingleChannelRole::Alpha), _) => 0,
            (None, Components::Rgb | Components::Rgba) => 3,
            (None, Components::Alpha | Components::Xy) => 0,
        }
    }

    /// Opaque black; the fallback when nothing can be inferred.
    pub fn black() -> Self {
        use ChannelSource::{One, Zero};
        Self {
            plane: Plane::Rgba,
            sources: [Zero, Zero, Zero, One],
            components: Components::Rgb,
            single: None,
        }
    }
}

fn full_name(specs: &[ImageSpec], sub_image: usize, raw: &str) -> String {
    if sub_image == 0 {
        return raw.to_string();
    }
    let prefix = specs[sub_image]
        .get_string(seqio_core::attr::SUBIMAGE_NAME)
        .map(str::to_string)
        .unwrap_or_else(|| format!("subimage{sub_image}"));
    if raw.starts_with(&format!("{prefix}.")) {
        raw.to_string()
    } else {
        format!("{prefix}.{raw}")
    }
}

/// All channels of all sub-images, in file order.
pub fn channel_list(specs: &[ImageSpec]) -> Vec<ChannelSpec> {
    specs
        .iter()
        .enumerate()
        .flat_map(|(s, spec)| {
            spec.channel_names.iter().enumerate().map(move |(i, raw)| ChannelSpec {
                name: full_name(specs, s, raw),
                sub_image: s,
                index: i,
            })
        })
        .collect()
}

pub(crate) fn split_layer(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => ("", name),
    }
}

fn is_canonical(name: &str) -> bool {
    matches!(
        name,
        "R" | "G" | "B" | "A" | "r" | "g" | "b" | "a" | "red" | "green" | "blue" | "alpha"
    )
}

fn slot_of(suffix: &str) -> Option<usize> {
    match suffix {
        "R" | "r" | "red" => Some(0),
        "G" | "g" | "green" => Some(1),
        "B" | "b" | "blue" => Some(2),
        "A" | "a" | "alpha" => Some(3),
        _ => None,
    }
}

/// Groups channels into layers, in order of first appearance.
///
/// Undotted canonical color names form the color layer; other undotted
/// names become layers of their own.
pub fn group_layers(channels: &[ChannelSpec]) -> Vec<LayerGroup> {
    let mut groups: Vec<LayerGroup> = Vec::new();
    for ch in channels {
        let (prefix, _) = split_layer(&ch.name);
        let (name, is_color) = if !prefix.is_empty() {
            (prefix, false)
        } else if is_canonical(&ch.name) {
            ("", true)
        } else {
            (ch.name.as_str(), false)
        };
        match groups.iter_mut().find(|g| g.name == name && g.is_color == is_color) {
            Some(group) => group.channels.push(ch.clone()),
            None => groups.push(LayerGroup {
                name: name.to_string(),
                channels: vec![ch.clone()],
                is_color,
            }),
        }
    }
    groups
}

/// Selectable options for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMenus {
    options: Vec<String>,
    channels: Vec<ChannelSpec>,
    layers: Vec<LayerGroup>,
}

/// Builds the channel menus of `specs`. Same input, same menus.
pub fn build_menus(specs: &[ImageSpec]) -> ChannelMenus {
    let channels = channel_list(specs);
    let layers = group_layers(&channels);
    let options = CONSTANT_OPTIONS
        .iter()
        .map(|s| s.to_string())
        .chain(channels.iter().map(|c| c.name.clone()))
        .collect();
    ChannelMenus {
        options,
        channels,
        layers,
    }
}

impl ChannelMenus {
    /// "0", "1", then every channel's full name.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    pub fn layers(&self) -> &[LayerGroup] {
        &self.layers
    }

    /// Names of the layers offered besides the color planes.
    pub fn custom_layers(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|g| !g.is_color)
            .map(|g| g.name.as_str())
            .collect()
    }

    /// True when the file has undotted R, G, B or A channels.
    pub fn has_color_layer(&self) -> bool {
        self.layers.iter().any(|g| g.is_color)
    }

    /// Option index of `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|o| o == name)
    }

    /// Source behind option `index`; out-of-range indices read as zero.
    pub fn source(&self, index: usize) -> ChannelSource {
        match index {
            0 => ChannelSource::Zero,
            1 => ChannelSource::One,
            i => self
                .channels
                .get(i - CONSTANT_OPTIONS.len())
                .map(|c| ChannelSource::Channel {
                    sub_image: c.sub_image,
                    index: c.index,
                })
                .unwrap_or(ChannelSource::Zero),
        }
    }

    /// Option index of `source`.
    pub fn index_of_source(&self, source: ChannelSource) -> usize {
        match source {
            ChannelSource::Zero => 0,
            ChannelSource::One => 1,
            ChannelSource::Channel { sub_image, index } => self
                .channels
                .iter()
                .position(|c| c.sub_image == sub_image && c.index == index)
                .map_or(0, |p| p + CONSTANT_OPTIONS.len()),
        }
    }

    /// Option name of `index`.
    pub fn name_of(&self, index: usize) -> &str {
        self.options.get(index).map_or(CONSTANT_OPTIONS[0], String::as_str)
    }

    /// Option indices of a mapping's slots.
    pub fn selection_for(&self, mapping: &ChannelMapping) -> [usize; 4] {
        mapping.sources.map(|s| self.index_of_source(s))
    }

    /// Restores persisted slot choices.
    ///
    /// A persisted name present among the options wins. Otherwise the
    /// current index is kept, clamped to the menu.
    pub fn restore(&self, names: &[String; 4], current: [usize; 4]) -> [usize; 4] {
        let last = self.options.len().saturating_sub(1);
        std::array::from_fn(|slot| match self.index_of(&names[slot]) {
            Some(index) => index,
            None => {
                let index = current[slot].min(last);
                if !names[slot].is_empty() {
                    warn!(
                        name = %names[slot],
                        fallback = self.name_of(index),
                        "persisted channel not in file, keeping current choice"
                    );
                }
                index
            }
        })
    }

    /// Mapping for explicit slot choices.
    pub fn mapping_from_selection(&self, selection: [usize; 4]) -> ChannelMapping {
        let sources = selection.map(|i| self.source(i));
        let components = if sources[3] == ChannelSource::Zero {
            Components::Rgb
        } else {
            Components::Rgba
        };
        ChannelMapping {
            plane: Plane::Rgba,
            sources,
            components,
            single: None,
        }
    }

    /// Persistable names of a selection.
    pub fn names_of(&self, selection: [usize; 4]) -> [String; 4] {
        selection.map(|i| self.name_of(i).to_string())
    }
}

fn find_red(specs: &[ImageSpec]) -> Option<(usize, usize, &str)> {
    const LITERAL: [&str; 3] = ["R", "r", "red"];
    const SUFFIX: [&str; 3] = [".R", ".r", ".red"];
    let find = |matches: &dyn Fn(&str) -> bool| {
        specs.iter().enumerate().find_map(|(s, spec)| {
            spec.channel_names
                .iter()
                .position(|n| matches(n))
                .map(|i| (s, i, spec.channel_names[i].as_str()))
        })
    };
    find(&|n| LITERAL.contains(&n)).or_else(|| find(&|n| SUFFIX.iter().any(|s| n.ends_with(s))))
}

fn companions(red_suffix: &str) -> [&'static str; 3] {
    match red_suffix {
        "r" => ["g", "b", "a"],
        "red" => ["green", "blue", "alpha"],
        _ => ["G", "B", "A"],
    }
}

/// Best-guess RGBA mapping of a file.
pub fn default_mapping(specs: &[ImageSpec]) -> ChannelMapping {
    use ChannelSource::{Channel, Zero};

    if let Some((s, red, red_name)) = find_red(specs) {
        let spec = &specs[s];
        let (prefix, suffix) = split_layer(red_name);
        let layer_name = |suffix: &str| {
            if prefix.is_empty() {
                suffix.to_string()
            } else {
                format!("{prefix}.{suffix}")
            }
        };
        let lookup = |suffix: &str| {
            let name = layer_name(suffix);
            spec.channel_names.iter().position(|n| *n == name)
        };
        let [g, b, a] = companions(suffix).map(lookup);
        let at = |index: usize| Channel { sub_image: s, index };

        let mut components = Components::Rgba;
        let alpha = match a.or(spec.alpha_channel) {
            Some(index) => at(index),
            None => {
                let in_layer: Vec<usize> = spec
                    .channel_names
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| split_layer(n).0 == prefix)
                    .map(|(i, _)| i)
                    .collect();
                let claimed = [Some(red), g, b];
                match in_layer.iter().find(|i| !claimed.contains(&Some(**i))) {
                    Some(&index) if in_layer.len() == 4 => at(index),
                    _ => {
                        components = Components::Rgb;
                        Zero
                    }
                }
            }
        };
        let mapping = ChannelMapping {
            plane: Plane::Rgba,
            sources: [at(red), g.map_or(Zero, at), b.map_or(Zero, at), alpha],
            components,
            single: None,
        };
        debug!(red = red_name, sub_image = s, components = ?mapping.components, "default channel mapping");
        return mapping;
    }

    let Some(spec) = specs.first() else {
        return ChannelMapping::black();
    };
    let at = |index: usize| Channel { sub_image: 0, index };
    let declared = spec.alpha_channel;
    match spec.channels() {
        0 => ChannelMapping::black(),
        1 => {
            let (components, role) = if declared == Some(0) {
                (Components::Alpha, SingleChannelRole::Alpha)
            } else {
                (Components::Rgb, SingleChannelRole::Luminance)
            };
            ChannelMapping {
                plane: Plane::Rgba,
                sources: [at(0); 4],
                components,
                single: Some(role),
            }
        }
        2 => {
            let (lum, alpha) = if declared == Some(0) { (1, 0) } else { (0, 1) };
            ChannelMapping {
                plane: Plane::Rgba,
                sources: [at(lum), at(lum), at(lum), at(alpha)],
                components: Components::Rgba,
                single: None,
            }
        }
        n => {
            let (alpha, components) = match declared {
                Some(a) if a > 2 => (at(a), Components::Rgba),
                _ if n == 4 => (at(3), Components::Rgba),
                _ => (Zero, Components::Rgb),
            };
            ChannelMapping {
                plane: Plane::Rgba,
                sources: [at(0), at(1), at(2), alpha],
                components,
                single: None,
            }
        }
    }
}

/// Mapping of the custom layer `layer`.
///
/// Channels are placed by their R/G/B/A suffix when they have one,
/// otherwise by position.
pub fn layer_mapping(specs: &[ImageSpec], layer: &str) -> IoResult<ChannelMapping> {
    use ChannelSource::{Channel, Zero};

    let channels = channel_list(specs);
    let group = group_layers(&channels)
        .into_iter()
        .find(|g| !g.is_color && g.name == layer)
        .ok_or_else(|| IoError::FormatMismatch(format!("no layer named '{layer}'")))?;
    let source = |c: &ChannelSpec| Channel {
        sub_image: c.sub_image,
        index: c.index,
    };
    let plane = Plane::Custom(layer.to_string());

    let mut sources = [Zero; 4];
    let mut matched = [false; 4];
    for ch in &group.channels {
        if let Some(slot) = slot_of(split_layer(&ch.name).1) {
            if !matched[slot] {
                sources[slot] = source(ch);
                matched[slot] = true;
            }
        }
    }

    let mapping = if matched.iter().any(|&m| m) {
        if matched == [false, false, false, true] {
            ChannelMapping {
                plane,
                sources: [sources[3]; 4],
                components: Components::Alpha,
                single: Some(SingleChannelRole::Alpha),
            }
        } else {
            let components = if matched[3] { Components::Rgba } else { Components::Rgb };
            ChannelMapping {
                plane,
                sources,
                components,
                single: None,
            }
        }
    } else {
        let list: Vec<ChannelSource> = group.channels.iter().take(4).map(source).collect();
        match list.as_slice() {
            [only] => ChannelMapping {
                plane,
                sources: [*only; 4],
                components: Components::Rgb,
                single: Some(SingleChannelRole::Luminance),
            },
            [x, y] => ChannelMapping {
                plane,
                sources: [*x, *y, Zero, Zero],
                components: Components::Xy,
                single: None,
            },
            [r, g, b] => ChannelMapping {
                plane,
                sources: [*r, *g, *b, Zero],
                components: Components::Rgb,
                single: None,
            },
            [r, g, b, a, ..] => ChannelMapping {
                plane,
                sources: [*r, *g, *b, *a],
                components: Components::Rgba,
                single: None,
            },
            [] => ChannelMapping::black(),
        }
    };
    Ok(mapping)
}

/// Mapping for `plane`: the default mapping for color planes, the layer's
/// own channels for custom ones.
pub fn mapping_for_plane(specs: &[ImageSpec], plane: &Plane) -> IoResult<ChannelMapping> {
    match plane {
        Plane::Custom(layer) => layer_mapping(specs, layer),
        color => Ok(ChannelMapping {
            plane: color.clone(),
            ..default_mapping(specs)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::ChannelSource::{Channel, One, Zero};
    use seqio_core::{attr, BitDepth};

    fn spec(names: &[&str]) -> ImageSpec {
        ImageSpec::new(4, 4, names.iter().map(|s| s.to_string()).collect(), BitDepth::F16)
    }

    fn ch(sub_image: usize, index: usize) -> ChannelSource {
        Channel { sub_image, index }
    }

    #[test]
    fn test_literal_rgba() {
        let m = default_mapping(&[spec(&["R", "G", "B", "A"])]);
        assert_eq!(m.sources, [ch(0, 0), ch(0, 1), ch(0, 2), ch(0, 3)]);
        assert_eq!(m.components, Components::Rgba);
    }

    #[test]
    fn test_top_level_r_beats_layer() {
        let names = ["diffuse.R", "diffuse.G", "diffuse.B", "diffuse.A", "R", "G", "B", "A"];
        let specs = [spec(&names)];
        let m = default_mapping(&specs);
        assert_eq!(m.sources, [ch(0, 4), ch(0, 5), ch(0, 6), ch(0, 7)]);

        let diffuse = layer_mapping(&specs, "diffuse").unwrap();
        assert_eq!(diffuse.sources, [ch(0, 0), ch(0, 1), ch(0, 2), ch(0, 3)]);
        assert_eq!(diffuse.components, Components::Rgba);
    }

    #[test]
    fn test_suffix_search_keeps_prefix() {
        let specs = [spec(&["Z", "left.beauty.red", "left.beauty.green", "left.beauty.blue"])];
        let m = default_mapping(&specs);
        assert_eq!(m.sources, [ch(0, 1), ch(0, 2), ch(0, 3), Zero]);
        assert_eq!(m.components, Components::Rgb);
    }

    #[test]
    fn test_red_in_later_sub_image() {
        let specs = [spec(&["Z"]), spec(&["R", "G", "B"])];
        let m = default_mapping(&specs);
        assert_eq!(m.sources, [ch(1, 0), ch(1, 1), ch(1, 2), Zero]);
        assert_eq!(m.components, Components::Rgb);
    }

    #[test]
    fn test_alpha_fallbacks() {
        // declared alpha under another name
        let mut s = spec(&["R", "G", "B", "matte"]);
        s.alpha_channel = Some(3);
        assert_eq!(default_mapping(&[s]).sources[3], ch(0, 3));

        // four-channel layer: the unclaimed one
        let m = default_mapping(&[spec(&["R", "G", "B", "mask"])]);
        assert_eq!(m.sources[3], ch(0, 3));
        assert_eq!(m.components, Components::Rgba);

        // five channels: none, downgraded to RGB
        let m = default_mapping(&[spec(&["R", "G", "B", "mask", "Z"])]);
        assert_eq!(m.sources[3], Zero);
        assert_eq!(m.components, Components::Rgb);

        // missing green is zero
        let m = default_mapping(&[spec(&["R", "B", "A"])]);
        assert_eq!(m.sources, [ch(0, 0), Zero, ch(0, 1), ch(0, 2)]);
    }

    #[test]
    fn test_no_red() {
        let m = default_mapping(&[spec(&["X", "Y", "Z"])]);
        assert_eq!(m.sources, [ch(0, 0), ch(0, 1), ch(0, 2), Zero]);
        assert_eq!(m.components, Components::Rgb);

        let m = default_mapping(&[spec(&["X", "Y", "Z", "W"])]);
        assert_eq!(m.sources[3], ch(0, 3));

        let m = default_mapping(&[spec(&["Y"])]);
        assert_eq!(m.sources, [ch(0, 0); 4]);
        assert_eq!(m.single, Some(SingleChannelRole::Luminance));
        assert_eq!(m.working_slots(), &[0]);

        let m = default_mapping(&[spec(&["A"])]);
        assert_eq!(m.single, Some(SingleChannelRole::Alpha));
        assert_eq!(m.components, Components::Alpha);
        assert_eq!(m.color_channels(), 0);

        let m = default_mapping(&[spec(&[])]);
        assert_eq!(m.sources, [Zero, Zero, Zero, One]);
        assert_eq!(default_mapping(&[]), ChannelMapping::black());
    }

    #[test]
    fn test_two_channels_luminance_alpha() {
        let m = default_mapping(&[spec(&["Y", "mask"])]);
        assert_eq!(m.sources, [ch(0, 0), ch(0, 0), ch(0, 0), ch(0, 1)]);
        assert_eq!(m.components, Components::Rgba);

        let m = default_mapping(&[spec(&["A", "Y"])]);
        assert_eq!(m.sources, [ch(0, 1), ch(0, 1), ch(0, 1), ch(0, 0)]);
    }

    #[test]
    fn test_layer_grouping() {
        let mut second = spec(&["R", "G"]);
        second.set_attr(attr::SUBIMAGE_NAME, "motion");
        let specs = [spec(&["R", "G", "B", "A", "Z", "diffuse.R", "diffuse.G", "diffuse.B"]), second];
        let menus = build_menus(&specs);
        assert_eq!(menus.custom_layers(), vec!["Z", "diffuse", "motion"]);
        assert!(menus.has_color_layer());
        assert_eq!(menus.options()[..3], ["0".to_string(), "1".into(), "R".into()]);
        assert_eq!(menus.options().last().map(String::as_str), Some("motion.G"));

        let motion = layer_mapping(&specs, "motion").unwrap();
        assert_eq!(motion.sources, [ch(1, 0), ch(1, 1), Zero, Zero]);
        assert_eq!(motion.components, Components::Rgb);

        let z = layer_mapping(&specs, "Z").unwrap();
        assert_eq!(z.single, Some(SingleChannelRole::Luminance));
        assert!(layer_mapping(&specs, "specular").is_err());
    }

    #[test]
    fn test_build_menus_idempotent() {
        let specs = [spec(&["R", "G", "B", "A", "depth.Z", "N.x", "N.y", "N.z"])];
        let a = build_menus(&specs);
        let b = build_menus(&specs);
        assert_eq!(a, b);
        assert_eq!(a.options(), b.options());
    }

    #[test]
    fn test_restore_prefers_names() {
        let menus = build_menus(&[spec(&["R", "G", "B", "A"])]);
        let names = ["G".to_string(), "nope".into(), "1".into(), String::new()];
        let restored = menus.restore(&names, [2, 3, 4, 40]);
        assert_eq!(restored, [3, 3, 1, 5]);

        let mapping = menus.mapping_from_selection(restored);
        assert_eq!(mapping.sources[2], One);
        assert_eq!(menus.names_of(menus.selection_for(&mapping))[0], "G");
    }

    #[test]
    fn test_positional_layer() {
        let specs = [spec(&["N.x", "N.y", "N.z", "uv.u", "uv.v"])];
        let n = layer_mapping(&specs, "N").unwrap();
        assert_eq!(n.components, Components::Rgb);
        let uv = layer_mapping(&specs, "uv").unwrap();
        assert_eq!(uv.components, Components::Xy);
        assert_eq!(uv.color_channels(), 0);
    }
}
