//! Numbered file sequences.
//!
//! A sequence is a directory plus a filename pattern with one frame token:
//!
//! - `shot.%04d.exr` - printf style, `%d` for no padding
//! - `shot.####.exr` - one `#` per digit
//! - `shot.@@@@.exr` - Nuke style
//!
//! Stereo patterns may also carry `%V` (view name) or `%v` (first letter of
//! the view), expanded with [`expand_view`] before the pattern is parsed.
//!
//! # Example
//!
//! ```rust
//! use seqio_io::sequence::{FrameRange, Sequence};
//!
//! let seq = Sequence::from_pattern("plates/shot.%04d.exr").unwrap();
//! assert_eq!(seq.prefix(), "shot.");
//! assert_eq!(seq.frame_path(42).to_str().unwrap(), "plates/shot.0042.exr");
//!
//! let range = FrameRange::new(1001, 1100);
//! assert_eq!(range.len(), 100);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{IoError, IoResult};

/// Inclusive range of frame numbers, `first <= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    first: i32,
    last: i32,
}

impl FrameRange {
    /// Creates a range, swapping the bounds if they are reversed.
    pub fn new(first: i32, last: i32) -> Self {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        Self { first, last }
    }

    /// Range holding one frame.
    pub fn single(frame: i32) -> Self {
        Self::new(frame, frame)
    }

    /// Validated constructor for user-entered bounds.
    pub fn checked(first: i32, last: i32) -> IoResult<Self> {
        if first > last {
            return Err(IoError::SequenceRange(format!(
                "first frame {first} is after last frame {last}"
            )));
        }
        Ok(Self { first, last })
    }

    /// First frame.
    pub fn first(&self) -> i32 {
        self.first
    }

    /// Last frame.
    pub fn last(&self) -> i32 {
        self.last
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        (self.last as i64 - self.first as i64 + 1) as usize
    }

    /// Always false: a range holds at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if `frame` lies inside the range.
    pub fn contains(&self, frame: i32) -> bool {
        frame >= self.first && frame <= self.last
    }

    /// Frames in order.
    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.first..=self.last
    }

    /// Moves both bounds by `delta`.
    pub fn shifted(&self, delta: i32) -> Self {
        Self::new(self.first + delta, self.last + delta)
    }

    /// Grows the range to include `frame`.
    pub fn extend(&mut self, frame: i32) {
        self.first = self.first.min(frame);
        self.last = self.last.max(frame);
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &FrameRange) -> FrameRange {
        FrameRange::new(self.first.min(other.first), self.last.max(other.last))
    }

    /// Merges with another range if they overlap or touch.
    pub fn merge(&self, other: &FrameRange) -> Option<FrameRange> {
        if self.last + 1 >= other.first && other.last + 1 >= self.first {
            Some(self.union(other))
        } else {
            None
        }
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

impl IntoIterator for FrameRange {
    type Item = i32;
    type IntoIter = std::ops::RangeInclusive<i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.first..=self.last
    }
}

/// Frame numbers found on disk, possibly with holes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    frames: BTreeSet<i32>,
}

impl FrameSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame.
    pub fn add(&mut self, frame: i32) {
        self.frames.insert(frame);
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame was found.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True if `frame` is present.
    pub fn contains(&self, frame: i32) -> bool {
        self.frames.contains(&frame)
    }

    /// Lowest frame.
    pub fn first(&self) -> Option<i32> {
        self.frames.first().copied()
    }

    /// Highest frame.
    pub fn last(&self) -> Option<i32> {
        self.frames.last().copied()
    }

    /// Overall range, holes included.
    pub fn range(&self) -> Option<FrameRange> {
        Some(FrameRange::new(self.first()?, self.last()?))
    }

    /// Closest present frame strictly before `frame`.
    pub fn previous(&self, frame: i32) -> Option<i32> {
        self.frames.range(..frame).next_back().copied()
    }

    /// Closest present frame strictly after `frame`.
    pub fn next(&self, frame: i32) -> Option<i32> {
        self.frames.range(frame + 1..).next().copied()
    }

    /// Closest present frame; ties go to the earlier one.
    pub fn nearest(&self, frame: i32) -> Option<i32> {
        if self.contains(frame) {
            return Some(frame);
        }
        match (self.previous(frame), self.next(frame)) {
            (Some(p), Some(n)) => Some(if frame - p <= n - frame { p } else { n }),
            (p, n) => p.or(n),
        }
    }

    /// Frames in order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.frames.iter().copied()
    }

    /// Contiguous runs.
    pub fn ranges(&self) -> Vec<FrameRange> {
        let mut result = Vec::new();
        let mut current: Option<FrameRange> = None;
        for &frame in &self.frames {
            match current {
                None => current = Some(FrameRange::single(frame)),
                Some(ref mut r) if frame == r.last() + 1 => r.extend(frame),
                Some(r) => {
                    result.push(r);
                    current = Some(FrameRange::single(frame));
                }
            }
        }
        result.extend(current);
        result
    }
}

impl fmt::Display for FrameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges().iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

fn frame_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%0?(\d*)d|#+|@+").unwrap_or_else(|e| unreachable!("{e}")))
}

fn frame_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d+)$").unwrap_or_else(|e| unreachable!("{e}")))
}

/// True if `pattern` contains a frame token.
pub fn has_frame_token(pattern: &str) -> bool {
    frame_token().is_match(pattern)
}

/// True if `pattern` contains `%V` or `%v`.
pub fn has_view_token(pattern: &str) -> bool {
    pattern.contains("%V") || pattern.contains("%v")
}

/// Replaces `%V` with `view` and `%v` with its first letter.
pub fn expand_view(pattern: &str, view: &str) -> String {
    let initial: String = view.chars().take(1).collect();
    pattern.replace("%V", view).replace("%v", &initial)
}

/// A numbered file sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    padding: usize,
}

impl Sequence {
    /// Sequence from pattern parts; `padding` is the minimum digit count.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, padding: usize) -> Self {
        Self {
            dir: PathBuf::new(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            padding: padding.max(1),
        }
    }

    /// Parses a pattern such as `dir/shot.%04d.exr` or `dir/shot.####.exr`.
    pub fn from_pattern(pattern: impl AsRef<Path>) -> IoResult<Self> {
        let path = pattern.as_ref();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| IoError::Parse(format!("invalid pattern {}", path.display())))?;
        let caps = frame_token()
            .captures(filename)
            .ok_or_else(|| IoError::Parse(format!("no frame token in {filename}")))?;
        let whole = caps
            .get(0)
            .ok_or_else(|| IoError::Parse(format!("no frame token in {filename}")))?;
        let padding = match caps.get(1) {
            Some(digits) if !digits.as_str().is_empty() => digits
                .as_str()
                .parse()
                .map_err(|_| IoError::Parse(format!("bad padding in {filename}")))?,
            Some(_) => 1,
            None => whole.as_str().len(),
        };
        let mut seq = Self::new(&filename[..whole.start()], &filename[whole.end()..], padding);
        seq.dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(seq)
    }

    /// Directory holding the frames.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filename part before the frame number.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Filename part after the frame number.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Minimum number of digits.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Lowercased extension of the frame files.
    pub fn extension(&self) -> String {
        Path::new(&self.suffix)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Path of `frame`.
    pub fn frame_path(&self, frame: i32) -> PathBuf {
        let filename = format!("{}{:0width$}{}", self.prefix, frame, self.suffix, width = self.padding);
        self.dir.join(filename)
    }

    /// Frame number encoded in `path`, if it belongs to this sequence.
    pub fn frame_of(&self, path: &Path) -> Option<i32> {
        let name = path.file_name()?.to_str()?;
        let middle = name.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        let digits = frame_digits().captures(middle)?.get(1)?.as_str();
        // Padding counts the sign. Longer numbers are fine, shorter or
        // over-padded ones belong to a different sequence.
        if middle.len() < self.padding || (middle.len() > self.padding && digits.starts_with('0')) {
            return None;
        }
        middle.parse().ok()
    }

    /// printf form, `shot.%04d.exr`.
    pub fn printf_pattern(&self) -> String {
        format!("{}%0{}d{}", self.prefix, self.padding, self.suffix)
    }

    /// Hash form, `shot.####.exr`.
    pub fn hash_pattern(&self) -> String {
        format!("{}{}{}", self.prefix, "#".repeat(self.padding), self.suffix)
    }

    /// Lists the frames present on disk.
    pub fn discover_frames(&self) -> IoResult<FrameSet> {
        let mut pattern = String::new();
        if !self.dir.as_os_str().is_empty() {
            let dir = self
                .dir
                .to_str()
                .ok_or_else(|| IoError::Parse(format!("non UTF-8 directory {}", self.dir.display())))?;
            pattern.push_str(&glob::Pattern::escape(dir));
            pattern.push('/');
        }
        pattern.push_str(&glob::Pattern::escape(&self.prefix));
        pattern.push('*');
        pattern.push_str(&glob::Pattern::escape(&self.suffix));

        let entries = glob::glob(&pattern).map_err(|e| IoError::Parse(e.to_string()))?;
        let mut frames = FrameSet::new();
        for path in entries.flatten() {
            if let Some(frame) = self.frame_of(&path) {
                frames.add(frame);
            }
        }
        debug!(pattern = %self, found = %frames, "probed sequence");
        Ok(frames)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dir.as_os_str().is_empty() {
            write!(f, "{}", self.printf_pattern())
        } else {
            write!(f, "{}/{}", self.dir.display(), self.printf_pattern())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_range() {
        let range = FrameRange::new(1001, 1100);
        assert_eq!(range.first(), 1001);
        assert_eq!(range.last(), 1100);
        assert_eq!(range.len(), 100);
        assert!(range.contains(1050));
        assert!(!range.contains(1000));
        assert_eq!(FrameRange::new(10, 1), FrameRange::new(1, 10));
        assert!(FrameRange::checked(10, 1).is_err());
    }

    #[test]
    fn test_frame_range_merge() {
        let r1 = FrameRange::new(1, 10);
        assert!(r1.merge(&FrameRange::new(11, 20)).is_some());
        assert!(r1.merge(&FrameRange::new(30, 40)).is_none());
        assert_eq!(r1.union(&FrameRange::new(30, 40)), FrameRange::new(1, 40));
    }

    #[test]
    fn test_frame_set_neighbours() {
        let mut set = FrameSet::new();
        for f in [1, 2, 5, 9] {
            set.add(f);
        }
        assert_eq!(set.previous(5), Some(2));
        assert_eq!(set.next(5), Some(9));
        assert_eq!(set.nearest(3), Some(2));
        assert_eq!(set.nearest(4), Some(5));
        assert_eq!(set.nearest(7), Some(5));
        assert_eq!(set.previous(1), None);
        assert_eq!(set.to_string(), "1-2,5,9");
    }

    #[test]
    fn test_patterns() {
        let seq = Sequence::from_pattern("shot.%04d.exr").unwrap();
        assert_eq!((seq.prefix(), seq.suffix(), seq.padding()), ("shot.", ".exr", 4));

        let seq = Sequence::from_pattern("/a/b/shot_####.png").unwrap();
        assert_eq!(seq.dir(), Path::new("/a/b"));
        assert_eq!(seq.padding(), 4);
        assert_eq!(seq.frame_path(7), PathBuf::from("/a/b/shot_0007.png"));

        let seq = Sequence::from_pattern("shot.%d.dpx").unwrap();
        assert_eq!(seq.frame_path(12345).to_str(), Some("shot.12345.dpx"));
        assert_eq!(seq.extension(), "dpx");

        assert!(Sequence::from_pattern("still.exr").is_err());
        assert_eq!(Sequence::new("a.", ".exr", 3).hash_pattern(), "a.###.exr");
    }

    #[test]
    fn test_view_tokens() {
        let p = "out/%V/shot.%v.%04d.exr";
        assert!(has_view_token(p));
        assert_eq!(expand_view(p, "left"), "out/left/shot.l.%04d.exr");
        let seq = Sequence::from_pattern(expand_view(p, "right")).unwrap();
        assert_eq!(seq.prefix(), "shot.r.");
    }

    #[test]
    fn test_frame_of_respects_padding() {
        let seq = Sequence::new("shot.", ".exr", 4);
        assert_eq!(seq.frame_of(Path::new("shot.0012.exr")), Some(12));
        assert_eq!(seq.frame_of(Path::new("shot.12345.exr")), Some(12345));
        assert_eq!(seq.frame_of(Path::new("shot.12.exr")), None);
        assert_eq!(seq.frame_of(Path::new("shot.00012.exr")), None);
        assert_eq!(seq.frame_of(Path::new("shot.-001.exr")), Some(-1));
        assert_eq!(seq.frame_of(Path::new("shot.abcd.exr")), None);
    }

    #[test]
    fn test_discover_frames() {
        let dir = tempfile::tempdir().unwrap();
        for f in [1, 2, 3, 7] {
            std::fs::write(dir.path().join(format!("plate.{f:04}.exr")), b"").unwrap();
        }
        std::fs::write(dir.path().join("plate.01.exr"), b"").unwrap();
        std::fs::write(dir.path().join("other.0004.exr"), b"").unwrap();

        let seq = Sequence::from_pattern(dir.path().join("plate.####.exr")).unwrap();
        let frames = seq.discover_frames().unwrap();
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![1, 2, 3, 7]);
        assert_eq!(frames.range(), Some(FrameRange::new(1, 7)));
    }
}
