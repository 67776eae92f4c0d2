//! Host time to file resolution.
//!
//! [`SequenceResolver`] turns a render time into the file (or stream
//! frame) to decode. The frame range is probed from disk once per source
//! and memoized; changing the source is the only way to re-probe.
//!
//! # Example
//!
//! ```rust
//! use seqio_io::resolver::{map_time, BoundaryPolicy, FrameStatus, TimeMapping, TimeMode};
//! use seqio_io::sequence::FrameRange;
//!
//! let mapping = TimeMapping {
//!     mode: TimeMode::StartingTime,
//!     starting_time: 1,
//!     after: BoundaryPolicy::Hold,
//!     ..Default::default()
//! };
//! let (frame, status) = map_time(12.0, FrameRange::new(1, 10), &mapping);
//! assert_eq!((frame, status), (10, FrameStatus::AfterSequence));
//! ```

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::CodecRegistry;
use crate::sequence::{has_frame_token, FrameRange, FrameSet, Sequence};
use crate::{IoError, IoResult};

/// How host time relates to frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// The first frame plays at `starting_time`.
    #[default]
    StartingTime,
    /// Frame = time - `offset`.
    Offset,
}

/// What to do with times outside the frame range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Clamp to the nearest bound.
    #[default]
    Hold,
    /// Wrap around the range.
    Loop,
    /// Render zeros.
    Black,
    /// Fail the render.
    Error,
}

/// What to do when an in-range frame file is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFramePolicy {
    /// Closest present frame before.
    LoadPrevious,
    /// Closest present frame after.
    LoadNext,
    /// Closest present frame, earlier on ties.
    #[default]
    LoadNearest,
    /// Fail the render.
    Error,
    /// Render zeros.
    Black,
}

/// Time mapping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeMapping {
    pub mode: TimeMode,
    pub offset: i32,
    pub starting_time: i32,
    pub before: BoundaryPolicy,
    pub after: BoundaryPolicy,
}

impl TimeMapping {
    /// Sequence time of host time `time`.
    pub fn sequence_time(&self, time: f64, range: FrameRange) -> f64 {
        match self.mode {
            TimeMode::Offset => time - self.offset as f64,
            TimeMode::StartingTime => time - self.starting_time as f64 + range.first() as f64,
        }
    }

    /// Host time range covered by `range`.
    pub fn time_domain(&self, range: FrameRange) -> FrameRange {
        match self.mode {
            TimeMode::Offset => range.shifted(self.offset),
            TimeMode::StartingTime => range.shifted(self.starting_time - range.first()),
        }
    }
}

/// Where a requested time fell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    WithinSequence,
    /// Before the range; the frame was adjusted by the before policy.
    BeforeSequence,
    /// After the range; the frame was adjusted by the after policy.
    AfterSequence,
    /// Zeros must be rendered.
    Black,
    /// The policy forbids this time.
    Error,
}

/// Maps host `time` to a frame of `range`.
///
/// Pure; the frame is meaningless for `Black` and `Error`.
pub fn map_time(time: f64, range: FrameRange, mapping: &TimeMapping) -> (i32, FrameStatus) {
    let frame = (mapping.sequence_time(time, range) + 0.5).floor() as i32;
    let (policy, status) = if frame < range.first() {
        (mapping.before, FrameStatus::BeforeSequence)
    } else if frame > range.last() {
        (mapping.after, FrameStatus::AfterSequence)
    } else {
        return (frame, FrameStatus::WithinSequence);
    };
    match policy {
        BoundaryPolicy::Hold => (frame.clamp(range.first(), range.last()), status),
        BoundaryPolicy::Loop => {
            let len = range.len() as i64;
            let wrapped = (frame as i64 - range.first() as i64).rem_euclid(len);
            (range.first() + wrapped as i32, status)
        }
        BoundaryPolicy::Black => (frame, FrameStatus::Black),
        BoundaryPolicy::Error => (frame, FrameStatus::Error),
    }
}

/// Kind of file set a path names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// One image used at every time.
    Still(PathBuf),
    /// Numbered files.
    Sequence(Sequence),
    /// One file holding many frames.
    Stream(PathBuf),
}

impl Source {
    /// Path of `frame`.
    pub fn frame_path(&self, frame: i32) -> PathBuf {
        match self {
            Self::Still(p) | Self::Stream(p) => p.clone(),
            Self::Sequence(seq) => seq.frame_path(frame),
        }
    }

    /// Lowercased file extension.
    pub fn extension(&self) -> String {
        match self {
            Self::Still(p) | Self::Stream(p) => crate::registry::extension(p),
            Self::Sequence(seq) => seq.extension(),
        }
    }
}

#[derive(Debug, Clone)]
enum Probe {
    Still,
    Frames(FrameSet),
    Stream(FrameRange),
}

/// Result of [`SequenceResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// File to decode, `None` when zeros must be rendered.
    pub path: Option<PathBuf>,
    /// Matching proxy file, when a proxy source is set.
    pub proxy_path: Option<PathBuf>,
    /// Sequence frame.
    pub frame: i32,
    pub status: FrameStatus,
    /// Frame to request from a stream decoder.
    pub stream_frame: Option<i32>,
}

impl Resolved {
    fn black(frame: i32) -> Self {
        Self {
            path: None,
            proxy_path: None,
            frame,
            status: FrameStatus::Black,
            stream_frame: None,
        }
    }
}

/// Resolves render times to files.
pub struct SequenceResolver {
    registry: Arc<CodecRegistry>,
    source: Option<Source>,
    proxy: Option<Source>,
    user_range: Option<FrameRange>,
    mapping: TimeMapping,
    missing: MissingFramePolicy,
    probe: OnceLock<Probe>,
}

impl SequenceResolver {
    /// Resolver with no source.
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self {
            registry,
            source: None,
            proxy: None,
            user_range: None,
            mapping: TimeMapping::default(),
            missing: MissingFramePolicy::default(),
            probe: OnceLock::new(),
        }
    }

    fn classify(&self, path: &str) -> IoResult<Source> {
        if has_frame_token(path) {
            return Ok(Source::Sequence(Sequence::from_pattern(path)?));
        }
        let path = PathBuf::from(path);
        let decoder = self.registry.decoder_for(&path)?;
        Ok(match decoder.stream_frame_range(&path)? {
            Some(_) => Source::Stream(path),
            None => Source::Still(path),
        })
    }

    /// Sets the source pattern or file and forgets the probed range.
    pub fn set_file(&mut self, path: &str) -> IoResult<()> {
        let source = self.classify(path)?;
        debug!(?source, "resolver source");
        self.source = Some(source);
        self.probe = OnceLock::new();
        Ok(())
    }

    /// Sets or clears the proxy pattern.
    pub fn set_proxy_file(&mut self, path: Option<&str>) -> IoResult<()> {
        self.proxy = match path {
            Some(p) if !p.is_empty() => Some(self.classify(p)?),
            _ => None,
        };
        Ok(())
    }

    /// Current source.
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Current proxy source.
    pub fn proxy(&self) -> Option<&Source> {
        self.proxy.as_ref()
    }

    /// Overrides the probed range, or restores it with `None`.
    pub fn set_frame_range(&mut self, range: Option<FrameRange>) {
        self.user_range = range;
    }

    /// Time mapping in use.
    pub fn mapping(&self) -> &TimeMapping {
        &self.mapping
    }

    pub fn set_mapping(&mut self, mapping: TimeMapping) {
        self.mapping = mapping;
    }

    pub fn set_missing_frame_policy(&mut self, policy: MissingFramePolicy) {
        self.missing = policy;
    }

    /// Drops the memoized probe; the next query reads the disk again.
    pub fn invalidate(&mut self) {
        self.probe = OnceLock::new();
    }

    fn source_or_err(&self) -> IoResult<&Source> {
        self.source
            .as_ref()
            .ok_or_else(|| IoError::SequenceRange("no file set".into()))
    }

    fn probe(&self) -> IoResult<&Probe> {
        if let Some(probe) = self.probe.get() {
            return Ok(probe);
        }
        let probe = match self.source_or_err()? {
            Source::Still(_) => Probe::Still,
            Source::Sequence(seq) => {
                let decoder = self.registry.decoder_for(&seq.frame_path(0))?;
                Probe::Frames(decoder.list_frames(seq)?)
            }
            Source::Stream(path) => {
                let decoder = self.registry.decoder_for(path)?;
                let range = decoder
                    .stream_frame_range(path)?
                    .ok_or_else(|| IoError::SequenceRange(format!("{} reports no frames", path.display())))?;
                Probe::Stream(range)
            }
        };
        // A concurrent probe may have won; both saw the same disk.
        Ok(self.probe.get_or_init(|| probe))
    }

    /// Frames present on disk, for sequences.
    pub fn discovered_frames(&self) -> IoResult<Option<FrameSet>> {
        Ok(match self.probe()? {
            Probe::Frames(set) => Some(set.clone()),
            _ => None,
        })
    }

    /// Range as found on disk, before any user override.
    pub fn original_range(&self) -> IoResult<FrameRange> {
        match self.probe()? {
            Probe::Still => Ok(FrameRange::single(1)),
            Probe::Stream(range) => Ok(*range),
            Probe::Frames(set) => set.range().ok_or_else(|| {
                IoError::SequenceRange(format!("no frames found for {}", self.describe()))
            }),
        }
    }

    /// Effective range: the user override or the probed one.
    pub fn frame_range(&self) -> IoResult<FrameRange> {
        match self.user_range {
            Some(range) => Ok(range),
            None => self.original_range(),
        }
    }

    /// Host time range the source covers.
    pub fn time_domain(&self) -> IoResult<FrameRange> {
        Ok(self.mapping.time_domain(self.frame_range()?))
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(Source::Sequence(seq)) => seq.to_string(),
            Some(Source::Still(p) | Source::Stream(p)) => p.display().to_string(),
            None => String::new(),
        }
    }

    fn present(&self, frame: i32) -> IoResult<bool> {
        Ok(match self.probe()? {
            Probe::Frames(set) => set.contains(frame),
            Probe::Stream(range) => range.contains(frame),
            Probe::Still => true,
        })
    }

    fn substitute(&self, frame: i32) -> IoResult<Option<i32>> {
        let Probe::Frames(set) = self.probe()? else {
            return Ok(None);
        };
        Ok(match self.missing {
            MissingFramePolicy::LoadPrevious => set.previous(frame),
            MissingFramePolicy::LoadNext => set.next(frame),
            MissingFramePolicy::LoadNearest => set.nearest(frame),
            MissingFramePolicy::Error | MissingFramePolicy::Black => None,
        })
    }

    /// Resolves host `time`.
    ///
    /// `Error` statuses and missing frames under the `Error` policy fail with
    /// [`IoError::SequenceRange`]; `Black` resolves without a path.
    pub fn resolve(&self, time: f64) -> IoResult<Resolved> {
        let source = self.source_or_err()?;
        if let Source::Still(path) = source {
            return Ok(Resolved {
                path: Some(path.clone()),
                proxy_path: self.proxy.as_ref().map(|p| p.frame_path(1)),
                frame: 1,
                status: FrameStatus::WithinSequence,
                stream_frame: None,
            });
        }

        let range = self.frame_range()?;
        let (mut frame, status) = map_time(time, range, &self.mapping);
        match status {
            FrameStatus::Black => return Ok(Resolved::black(frame)),
            FrameStatus::Error => {
                return Err(IoError::SequenceRange(format!(
                    "time {time} is outside frames {range} of {}",
                    self.describe()
                )));
            }
            _ => {}
        }

        if !self.present(frame)? {
            if self.missing == MissingFramePolicy::Black {
                return Ok(Resolved::black(frame));
            }
            let substitute = self.substitute(frame)?.ok_or_else(|| {
                IoError::SequenceRange(format!("frame {frame} of {} is missing", self.describe()))
            })?;
            debug!(frame, substitute, policy = ?self.missing, "missing frame");
            frame = substitute;
        }

        let stream_frame = matches!(source, Source::Stream(_)).then_some(frame);
        Ok(Resolved {
            path: Some(source.frame_path(frame)),
            proxy_path: self.proxy.as_ref().map(|p| p.frame_path(frame)),
            frame,
            status,
            stream_frame,
        })
    }

    /// Path of `frame` without policies, for tools.
    pub fn frame_path(&self, frame: i32) -> IoResult<PathBuf> {
        Ok(self.source_or_err()?.frame_path(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCodec, MemoryImage, MemoryStore};
    use seqio_core::{BitDepth, ImageSpec};
    use std::collections::BTreeMap;

    fn hold() -> TimeMapping {
        TimeMapping {
            mode: TimeMode::Offset,
            ..Default::default()
        }
    }

    fn store_with(frames: &[i32]) -> (Arc<MemoryStore>, Arc<CodecRegistry>) {
        let store = Arc::new(MemoryStore::new());
        let seq = Sequence::from_pattern("plates/shot.####.mem").unwrap();
        for &f in frames {
            store.insert(seq.frame_path(f), MemoryImage::new(vec![ImageSpec::rgb(1, 1, BitDepth::U8)]));
        }
        let codec = Arc::new(MemoryCodec::new(Arc::clone(&store)));
        let mut registry = CodecRegistry::new();
        registry.register_decoder(codec.clone());
        registry.register_encoder(codec);
        (store, Arc::new(registry))
    }

    #[test]
    fn test_hold_clamps() {
        let range = FrameRange::new(1, 10);
        assert_eq!(map_time(-5.0, range, &hold()), (1, FrameStatus::BeforeSequence));
        assert_eq!(map_time(12.0, range, &hold()), (10, FrameStatus::AfterSequence));
        assert_eq!(map_time(4.4, range, &hold()), (4, FrameStatus::WithinSequence));
        assert_eq!(map_time(4.5, range, &hold()), (5, FrameStatus::WithinSequence));
    }

    #[test]
    fn test_loop_wraps() {
        let mapping = TimeMapping {
            mode: TimeMode::Offset,
            offset: 3,
            before: BoundaryPolicy::Loop,
            after: BoundaryPolicy::Loop,
            ..Default::default()
        };
        let range = FrameRange::new(1, 10);
        for t in -30..40 {
            let expected = 1 + (t - 3 - 1i32).rem_euclid(10);
            assert_eq!(map_time(t as f64, range, &mapping).0, expected, "time {t}");
        }
    }

    #[test]
    fn test_black_and_error_policies() {
        let mapping = TimeMapping {
            mode: TimeMode::Offset,
            before: BoundaryPolicy::Black,
            after: BoundaryPolicy::Error,
            ..Default::default()
        };
        let range = FrameRange::new(1, 10);
        assert_eq!(map_time(0.0, range, &mapping).1, FrameStatus::Black);
        assert_eq!(map_time(11.0, range, &mapping).1, FrameStatus::Error);
    }

    #[test]
    fn test_time_domain() {
        let mapping = TimeMapping {
            mode: TimeMode::StartingTime,
            starting_time: 101,
            ..Default::default()
        };
        assert_eq!(mapping.time_domain(FrameRange::new(1, 10)), FrameRange::new(101, 110));
        assert_eq!(hold().time_domain(FrameRange::new(1, 10)), FrameRange::new(1, 10));
    }

    #[test]
    fn test_resolve_probes_once_and_handles_gaps() {
        let (store, registry) = store_with(&[1, 2, 4, 5]);
        let mut resolver = SequenceResolver::new(registry);
        resolver.set_file("plates/shot.####.mem").unwrap();
        resolver.set_mapping(hold());
        assert_eq!(resolver.frame_range().unwrap(), FrameRange::new(1, 5));

        // later files are not seen until the source changes
        store.insert("plates/shot.0006.mem", MemoryImage::new(vec![ImageSpec::rgb(1, 1, BitDepth::U8)]));
        assert_eq!(resolver.frame_range().unwrap(), FrameRange::new(1, 5));

        let r = resolver.resolve(3.0).unwrap();
        assert_eq!(r.frame, 2);
        assert_eq!(r.path, Some(PathBuf::from("plates/shot.0002.mem")));

        resolver.set_missing_frame_policy(MissingFramePolicy::LoadNext);
        assert_eq!(resolver.resolve(3.0).unwrap().frame, 4);

        resolver.set_missing_frame_policy(MissingFramePolicy::Black);
        let r = resolver.resolve(3.0).unwrap();
        assert_eq!((r.status, r.path), (FrameStatus::Black, None));

        resolver.set_missing_frame_policy(MissingFramePolicy::Error);
        assert!(matches!(resolver.resolve(3.0), Err(IoError::SequenceRange(_))));

        resolver.set_file("plates/shot.####.mem").unwrap();
        assert_eq!(resolver.frame_range().unwrap(), FrameRange::new(1, 6));

        store.insert("plates/shot.0007.mem", MemoryImage::new(vec![ImageSpec::rgb(1, 1, BitDepth::U8)]));
        resolver.invalidate();
        assert_eq!(resolver.frame_range().unwrap(), FrameRange::new(1, 7));
    }

    #[test]
    fn test_error_policy_fails() {
        let (_store, registry) = store_with(&[1, 2]);
        let mut resolver = SequenceResolver::new(registry);
        resolver.set_file("plates/shot.####.mem").unwrap();
        resolver.set_mapping(TimeMapping {
            mode: TimeMode::Offset,
            after: BoundaryPolicy::Error,
            ..Default::default()
        });
        assert!(matches!(resolver.resolve(3.0), Err(IoError::SequenceRange(_))));
        assert_eq!(resolver.resolve(2.0).unwrap().status, FrameStatus::WithinSequence);
    }

    #[test]
    fn test_empty_sequence_is_range_error() {
        let (_store, registry) = store_with(&[]);
        let mut resolver = SequenceResolver::new(registry);
        resolver.set_file("plates/shot.####.mem").unwrap();
        assert!(matches!(resolver.frame_range(), Err(IoError::SequenceRange(_))));
    }

    #[test]
    fn test_stream_source() {
        let (store, registry) = store_with(&[]);
        let frames: BTreeMap<i32, MemoryImage> = (0..24)
            .map(|f| (f, MemoryImage::new(vec![ImageSpec::rgb(1, 1, BitDepth::U8)])))
            .collect();
        store.insert_stream("clip.mem", frames);

        let mut resolver = SequenceResolver::new(registry);
        resolver.set_file("clip.mem").unwrap();
        assert!(matches!(resolver.source(), Some(Source::Stream(_))));
        assert_eq!(resolver.frame_range().unwrap(), FrameRange::new(0, 23));
        resolver.set_mapping(hold());
        let r = resolver.resolve(30.0).unwrap();
        assert_eq!(r.stream_frame, Some(23));
        assert_eq!(r.path, Some(PathBuf::from("clip.mem")));
    }

    #[test]
    fn test_proxy_follows_frame() {
        let (_store, registry) = store_with(&[7]);
        let mut resolver = SequenceResolver::new(registry);
        resolver.set_file("plates/shot.####.mem").unwrap();
        resolver.set_proxy_file(Some("proxy/shot.####.mem")).unwrap();
        let r = resolver.resolve(1.0).unwrap();
        assert_eq!(r.proxy_path, Some(PathBuf::from("proxy/shot.0007.mem")));
    }
}
