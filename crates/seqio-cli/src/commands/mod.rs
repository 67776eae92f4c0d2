//! CLI command implementations

pub mod convert;
pub mod info;
pub mod layers;
pub mod resolve;

use anyhow::{Context, Result};
use seqio_color::{ColorConfig, ColorEngine};
use seqio_io::{
    BoundaryPolicy, CodecRegistry, FrameRange, MissingFramePolicy, ReaderPipeline, SpecCache, TimeMapping, TimeMode,
};
use std::sync::Arc;

use crate::{BoundaryArg, MissingArg, TimeArgs};

/// Environment variable naming the color configuration.
pub const COLOR_CONFIG_ENV: &str = "SEQIO_COLOR_CONFIG";

/// Shared registry, header cache and color engine.
pub struct Session {
    pub registry: Arc<CodecRegistry>,
    pub cache: Arc<SpecCache>,
    pub engine: Arc<dyn ColorEngine>,
}

impl Session {
    pub fn new() -> Result<Self> {
        let config = std::env::var(COLOR_CONFIG_ENV).ok();
        Ok(Self {
            registry: Arc::new(CodecRegistry::with_builtin()),
            cache: Arc::new(SpecCache::new()),
            engine: load_config(config.as_deref())?,
        })
    }

    pub fn reader(&self) -> ReaderPipeline {
        ReaderPipeline::new(self.registry.clone(), self.cache.clone(), self.engine.clone())
    }

    /// Reader for `input` with the time options applied.
    pub fn open(&self, input: &str, time: &TimeArgs) -> Result<ReaderPipeline> {
        let mut reader = self.reader();
        reader
            .set_file(input)
            .with_context(|| format!("Failed to open: {input}"))?;
        apply_time_args(&mut reader, time)?;
        Ok(reader)
    }
}

/// Color config from a built-in name or a YAML path. `None` is nuke-default.
pub fn load_config(name: Option<&str>) -> Result<Arc<dyn ColorEngine>> {
    let config = match name {
        None | Some("") | Some("nuke-default") => ColorConfig::nuke_default(),
        Some("aces") => ColorConfig::aces_legacy(),
        Some("spi") => ColorConfig::spi_vfx(),
        Some(path) => {
            ColorConfig::from_file(path).with_context(|| format!("Failed to load color config: {path}"))?
        }
    };
    Ok(Arc::new(config))
}

/// Parses "first-last" or a single frame.
pub fn parse_frames(s: &str) -> Result<FrameRange> {
    let s = s.trim();
    // Skip a leading sign so "-5" is one frame.
    let split = s
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-')
        .map(|(i, _)| (&s[..i], &s[i + 1..]));
    let range = match split {
        Some((first, last)) => {
            let first: i32 = first.trim().parse().with_context(|| format!("Bad frame range: {s}"))?;
            let last: i32 = last.trim().parse().with_context(|| format!("Bad frame range: {s}"))?;
            FrameRange::checked(first, last)?
        }
        None => FrameRange::single(s.parse().with_context(|| format!("Bad frame: {s}"))?),
    };
    Ok(range)
}

/// Applies the time options over the reader's current mapping.
pub fn apply_time_args(reader: &mut ReaderPipeline, args: &TimeArgs) -> Result<()> {
    let mut mapping: TimeMapping = reader.params().time;
    if let Some(offset) = args.offset {
        mapping.mode = TimeMode::Offset;
        mapping.offset = offset;
    }
    if let Some(start) = args.starting_time {
        mapping.mode = TimeMode::StartingTime;
        mapping.starting_time = start;
    }
    if let Some(before) = args.before {
        mapping.before = before.into();
    }
    if let Some(after) = args.after {
        mapping.after = after.into();
    }
    reader.set_time_mapping(mapping);

    if let Some(missing) = args.missing {
        reader.set_missing_frame_policy(missing.into());
    }
    if let Some(frames) = &args.frames {
        reader.set_frame_range(Some(parse_frames(frames)?))?;
    }
    Ok(())
}

impl From<BoundaryArg> for BoundaryPolicy {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Hold => Self::Hold,
            BoundaryArg::Loop => Self::Loop,
            BoundaryArg::Black => Self::Black,
            BoundaryArg::Error => Self::Error,
        }
    }
}

impl From<MissingArg> for MissingFramePolicy {
    fn from(arg: MissingArg) -> Self {
        match arg {
            MissingArg::Previous => Self::LoadPrevious,
            MissingArg::Next => Self::LoadNext,
            MissingArg::Nearest => Self::LoadNearest,
            MissingArg::Error => Self::Error,
            MissingArg::Black => Self::Black,
        }
    }
}
