//! In-memory codec.
//!
//! Stores images in a shared [`MemoryStore`] keyed by path instead of on
//! disk. Capabilities and extensions are configurable, which makes it the
//! stand-in for arbitrary formats in pipeline tests and a scratch target
//! for tools that post-process decoded frames.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use seqio_core::{BitDepth, DataFormat, ImageSpec, PixelView, PixelViewMut, Rect};

use crate::codec::{Decoder, Encoder, FormatCaps, ImageInput, ImageOutput};
use crate::sequence::{FrameRange, FrameSet, Sequence};
use crate::{IoError, IoResult};

/// Sub-images and their samples.
///
/// Samples are packed per sub-image over its data window, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryImage {
    specs: Vec<ImageSpec>,
    pixels: Vec<Vec<f32>>,
}

impl MemoryImage {
    /// Zero-filled image.
    pub fn new(specs: Vec<ImageSpec>) -> Self {
        let pixels = specs
            .iter()
            .map(|s| vec![0.0; s.width as usize * s.height as usize * s.channels()])
            .collect();
        Self { specs, pixels }
    }

    /// Single sub-image from samples, top row first.
    pub fn from_samples(spec: ImageSpec, samples: Vec<f32>) -> IoResult<Self> {
        let expected = spec.width as usize * spec.height as usize * spec.channels();
        if samples.len() != expected {
            return Err(IoError::FormatMismatch(format!(
                "expected {expected} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            specs: vec![spec],
            pixels: vec![samples],
        })
    }

    /// Adds a sub-image.
    pub fn with_sub_image(mut self, spec: ImageSpec, samples: Vec<f32>) -> IoResult<Self> {
        let other = Self::from_samples(spec, samples)?;
        self.specs.extend(other.specs);
        self.pixels.extend(other.pixels);
        Ok(self)
    }

    /// Sub-image descriptions.
    pub fn specs(&self) -> &[ImageSpec] {
        &self.specs
    }

    /// Samples of `sub_image`, top row first.
    pub fn samples(&self, sub_image: usize) -> &[f32] {
        &self.pixels[sub_image]
    }

    fn index(&self, sub_image: usize, x: i32, y: i32, c: usize) -> Option<usize> {
        let spec = &self.specs[sub_image];
        let dw = spec.data_window();
        if !dw.contains(x, y) || c >= spec.channels() {
            return None;
        }
        let px = (y - dw.y1) as usize * spec.width as usize + (x - dw.x1) as usize;
        Some(px * spec.channels() + c)
    }

    /// Sample at file coordinates, `None` outside the data window.
    pub fn sample(&self, sub_image: usize, x: i32, y: i32, c: usize) -> Option<f32> {
        self.index(sub_image, x, y, c).map(|i| self.pixels[sub_image][i])
    }
}

#[derive(Debug, Clone)]
enum MemoryFile {
    Image(Arc<MemoryImage>),
    Stream(BTreeMap<i32, Arc<MemoryImage>>),
}

/// Shared path-keyed storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<PathBuf, MemoryFile>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an image at `path`, replacing what was there.
    pub fn insert(&self, path: impl Into<PathBuf>, image: MemoryImage) {
        self.files
            .write()
            .unwrap()
            .insert(path.into(), MemoryFile::Image(Arc::new(image)));
    }

    /// Stores a multi-frame stream at `path`.
    pub fn insert_stream(&self, path: impl Into<PathBuf>, frames: BTreeMap<i32, MemoryImage>) {
        let frames = frames.into_iter().map(|(f, i)| (f, Arc::new(i))).collect();
        self.files
            .write()
            .unwrap()
            .insert(path.into(), MemoryFile::Stream(frames));
    }

    /// Image stored at `path`; the first frame for streams.
    pub fn get(&self, path: &Path) -> Option<Arc<MemoryImage>> {
        match self.files.read().unwrap().get(path)? {
            MemoryFile::Image(image) => Some(Arc::clone(image)),
            MemoryFile::Stream(frames) => frames.values().next().cloned(),
        }
    }

    /// Removes `path`.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().unwrap().remove(path).is_some()
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().unwrap().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&self, path: &Path, frame: i32) -> IoResult<Arc<MemoryImage>> {
        match self.files.read().unwrap().get(path) {
            Some(MemoryFile::Stream(frames)) => frames
                .get(&frame)
                .cloned()
                .ok_or_else(|| IoError::Decode(format!("frame {frame} not in {}", path.display()))),
            Some(MemoryFile::Image(image)) => Ok(Arc::clone(image)),
            None => Err(IoError::file_open(path, "no such file")),
        }
    }
}

const ALL_DEPTHS: &[BitDepth] = &[
    BitDepth::U8,
    BitDepth::U10,
    BitDepth::U12,
    BitDepth::U16,
    BitDepth::U32,
    BitDepth::F16,
    BitDepth::F32,
];

/// Codec over a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryCodec {
    store: Arc<MemoryStore>,
    caps: FormatCaps,
    extensions: &'static [&'static str],
}

impl MemoryCodec {
    /// Codec for `.mem` files that can store anything.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            caps: FormatCaps {
                multi_image: true,
                multi_view: true,
                tiles: true,
                arbitrary_channels: true,
                associated_alpha: true,
                bit_depths: ALL_DEPTHS,
            },
            extensions: &["mem"],
        }
    }

    /// Replaces the advertised capabilities.
    pub fn with_caps(mut self, caps: FormatCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Replaces the handled extensions.
    pub fn with_extensions(mut self, extensions: &'static [&'static str]) -> Self {
        self.extensions = extensions;
        self
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

/// Input over a fully decoded image. File codecs that cannot read
/// regions decode once and serve reads from here.
pub(crate) struct BufferedInput {
    image: Arc<MemoryImage>,
}

impl BufferedInput {
    pub(crate) fn new(image: MemoryImage) -> Self {
        Self { image: Arc::new(image) }
    }
}

impl ImageInput for BufferedInput {
    fn specs(&self) -> &[ImageSpec] {
        &self.image.specs
    }

    fn read_region(
        &mut self,
        sub_image: usize,
        region: Rect,
        channels: Range<usize>,
        dst: &mut PixelViewMut<'_>,
    ) -> IoResult<()> {
        let spec = self
            .image
            .specs
            .get(sub_image)
            .ok_or_else(|| IoError::Decode(format!("no sub-image {sub_image}")))?;
        if channels.end > spec.channels() || dst.channels() != channels.len() || dst.bounds() != region {
            return Err(IoError::FormatMismatch(format!(
                "cannot read channels {channels:?} of {} into {} channels",
                spec.channels(),
                dst.channels()
            )));
        }
        let Some(area) = region.intersect(&spec.data_window()) else {
            return Ok(());
        };
        for y in area.y1..area.y2 {
            for x in area.x1..area.x2 {
                for (k, c) in channels.clone().enumerate() {
                    if let Some(v) = self.image.sample(sub_image, x, y, c) {
                        dst.set_sample(x, y, k, v);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Decoder for MemoryCodec {
    fn format_name(&self) -> &'static str {
        "Memory"
    }

    fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn open(&self, path: &Path) -> IoResult<Box<dyn ImageInput>> {
        let image = self
            .store
            .get(path)
            .ok_or_else(|| IoError::file_open(path, "no such file"))?;
        Ok(Box::new(BufferedInput { image }))
    }

    fn open_frame(&self, path: &Path, frame: i32) -> IoResult<Box<dyn ImageInput>> {
        let image = self.store.frame(path, frame)?;
        Ok(Box::new(BufferedInput { image }))
    }

    fn stream_frame_range(&self, path: &Path) -> IoResult<Option<FrameRange>> {
        match self.store.files.read().unwrap().get(path) {
            Some(MemoryFile::Stream(frames)) => {
                let first = frames.keys().next().copied();
                let last = frames.keys().next_back().copied();
                Ok(first.zip(last).map(|(f, l)| FrameRange::new(f, l)))
            }
            Some(MemoryFile::Image(_)) => Ok(None),
            None => Err(IoError::file_open(path, "no such file")),
        }
    }

    fn list_frames(&self, sequence: &Sequence) -> IoResult<FrameSet> {
        let mut frames = FrameSet::new();
        for path in self.store.files.read().unwrap().keys() {
            if path.parent().unwrap_or(Path::new("")) != sequence.dir() {
                continue;
            }
            if let Some(frame) = sequence.frame_of(path) {
                frames.add(frame);
            }
        }
        Ok(frames)
    }
}

struct MemoryOutput {
    store: Arc<MemoryStore>,
    path: PathBuf,
    image: MemoryImage,
}

impl ImageOutput for MemoryOutput {
    fn write_image(&mut self, part: usize, pixels: &PixelView<'_>) -> IoResult<()> {
        let spec = self
            .image
            .specs
            .get(part)
            .ok_or_else(|| IoError::Encode(format!("no part {part}")))?
            .clone();
        if pixels.bounds() != spec.data_window() || pixels.channels() != spec.channels() {
            return Err(IoError::Encode(format!(
                "part {part} expects {} channels over {}, got {} over {}",
                spec.channels(),
                spec.data_window(),
                pixels.channels(),
                pixels.bounds()
            )));
        }
        let format = DataFormat::from(spec.format);
        let mut scratch = [0u8; 4];
        let dw = spec.data_window();
        for y in dw.y1..dw.y2 {
            for x in dw.x1..dw.x2 {
                for c in 0..spec.channels() {
                    // Round-trip through the stored precision.
                    format.write_sample(&mut scratch, pixels.sample(x, y, c));
                    let v = format.read_sample(&scratch);
                    if let Some(i) = self.image.index(part, x, y, c) {
                        self.image.pixels[part][i] = v;
                    }
                }
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        let MemoryOutput { store, path, image } = *self;
        store.insert(path, image);
        Ok(())
    }
}

impl Encoder for MemoryCodec {
    fn format_name(&self) -> &'static str {
        "Memory"
    }

    fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn capabilities(&self) -> FormatCaps {
        self.caps
    }

    fn create(&self, path: &Path, parts: &[ImageSpec]) -> IoResult<Box<dyn ImageOutput>> {
        if parts.is_empty() {
            return Err(IoError::Encode(format!("no parts for {}", path.display())));
        }
        Ok(Box::new(MemoryOutput {
            store: Arc::clone(&self.store),
            path: path.to_path_buf(),
            image: MemoryImage::new(parts.to_vec()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqio_core::{PixelBuffer, RowOrder};

    #[test]
    fn test_write_then_read_quantizes() {
        let store = Arc::new(MemoryStore::new());
        let codec = MemoryCodec::new(Arc::clone(&store));
        let spec = ImageSpec::new(2, 1, vec!["Y".into()], BitDepth::U8);
        let path = Path::new("mem/a.0001.mem");

        let buf = PixelBuffer::from_vec(vec![0.3, 1.5], Rect::from_size(2, 1), 1, RowOrder::TopDown).unwrap();
        let mut out = codec.create(path, &[spec]).unwrap();
        out.write_image(0, &buf.memory_view(Rect::from_size(2, 1)).unwrap())
            .unwrap();
        out.close().unwrap();

        let image = store.get(path).unwrap();
        assert_eq!(image.samples(0), &[77.0 / 255.0, 1.0]);
    }

    #[test]
    fn test_stream_frames() {
        let store = Arc::new(MemoryStore::new());
        let codec = MemoryCodec::new(Arc::clone(&store));
        let spec = ImageSpec::new(1, 1, vec!["Y".into()], BitDepth::F32);
        let frames = (5..=8)
            .map(|f| (f, MemoryImage::from_samples(spec.clone(), vec![f as f32]).unwrap()))
            .collect();
        store.insert_stream("clip.mem", frames);

        let path = Path::new("clip.mem");
        assert_eq!(codec.stream_frame_range(path).unwrap(), Some(FrameRange::new(5, 8)));
        let mut input = codec.open_frame(path, 7).unwrap();
        let mut buf = PixelBuffer::new(Rect::from_size(1, 1), 1, RowOrder::TopDown);
        let mut view = buf.memory_view_mut(Rect::from_size(1, 1)).unwrap();
        input.read_region(0, Rect::from_size(1, 1), 0..1, &mut view).unwrap();
        assert_eq!(buf.samples(), &[7.0]);
        assert!(codec.open_frame(path, 9).is_err());
    }

    #[test]
    fn test_list_frames() {
        let store = Arc::new(MemoryStore::new());
        let codec = MemoryCodec::new(Arc::clone(&store));
        let spec = ImageSpec::rgb(1, 1, BitDepth::F32);
        for f in [3, 4, 9] {
            store.insert(format!("seq/a.{f:04}.mem"), MemoryImage::new(vec![spec.clone()]));
        }
        store.insert("other/a.0005.mem", MemoryImage::new(vec![spec]));
        let seq = Sequence::from_pattern("seq/a.####.mem").unwrap();
        let frames = codec.list_frames(&seq).unwrap();
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![3, 4, 9]);
    }
}
