//! Reader and writer pipelines end to end.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_abs_diff_eq;
use seqio_color::{ColorConfig, Direction};
use seqio_core::{attr, BitDepth, ImageSpec, PixelBuffer, Premult, Rect, RowOrder};
use seqio_io::codec::FormatCaps;
use seqio_io::memory::{MemoryCodec, MemoryStore};
use seqio_io::params::PartsSplitting;
use seqio_io::png::PngCodec;
use seqio_io::writer::{PlaneSource, ALL_LAYERS};
use seqio_io::{
    CodecRegistry, Encoder, FrameRange, IoError, IoResult, Plane, ReaderPipeline, RenderRequest, SpecCache,
    WriterPipeline,
};

fn nuke() -> Arc<ColorConfig> {
    Arc::new(ColorConfig::nuke_default())
}

#[test]
fn single_channel_u8_reads_as_rgba() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray.png");
    let row = [0.0, 64.0 / 255.0, 128.0 / 255.0, 1.0];
    let values: Vec<f32> = (0..4).flat_map(|_| row).collect();

    let spec = ImageSpec::new(4, 4, vec!["Y".into()], BitDepth::U8);
    let bounds = Rect::from_size(4, 4);
    let buf = PixelBuffer::from_vec(values, bounds, 1, RowOrder::TopDown).unwrap();
    let mut out = PngCodec.create(&path, &[spec]).unwrap();
    out.write_image(0, &buf.memory_view(bounds).unwrap()).unwrap();
    out.close().unwrap();

    let mut reader = ReaderPipeline::new(Arc::new(CodecRegistry::with_builtin()), Arc::new(SpecCache::new()), nuke());
    reader.set_file(path.to_str().unwrap()).unwrap();
    assert_eq!(reader.params().premult, Premult::Opaque);
    let working = reader.adapter().output().to_string();
    reader.set_colorspace(Direction::Input, &working).unwrap();

    let mut host = PixelBuffer::new(bounds, 4, RowOrder::BottomUp);
    let request = RenderRequest {
        time: 1.0,
        plane: Plane::Rgba,
        region: bounds,
        levels: 0,
        premult: Premult::Premultiplied,
    };
    reader.render(&request, &mut host.view_mut()).unwrap();

    let expected = [0.0, 0.251, 0.502, 1.0];
    let view = host.view();
    for y in 0..4 {
        for (x, want) in expected.iter().enumerate() {
            let x = x as i32;
            for c in 0..3 {
                assert_abs_diff_eq!(view.sample(x, y, c), *want, epsilon = 1e-3);
            }
            assert_eq!(view.sample(x, y, 3), 1.0);
        }
    }
}

#[test]
fn srgb_png_detects_rrt_srgb_with_aces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plate.png");
    let spec = ImageSpec::rgb(1, 1, BitDepth::U8);
    let bounds = Rect::from_size(1, 1);
    let buf = PixelBuffer::from_vec(vec![0.5; 3], bounds, 3, RowOrder::TopDown).unwrap();
    let mut out = PngCodec.create(&path, &[spec]).unwrap();
    out.write_image(0, &buf.memory_view(bounds).unwrap()).unwrap();
    out.close().unwrap();

    let mut reader = ReaderPipeline::new(
        Arc::new(CodecRegistry::with_builtin()),
        Arc::new(SpecCache::new()),
        Arc::new(ColorConfig::aces_legacy()),
    );
    reader.set_file(path.to_str().unwrap()).unwrap();
    assert_eq!(reader.adapter().input(), "rrt_srgb");
}

/// Two views of an RGBA plane and a three-channel "diffuse" layer.
struct Stereo {
    fetches: AtomicUsize,
}

impl Stereo {
    fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
        }
    }
}

impl PlaneSource for Stereo {
    fn views(&self) -> Vec<String> {
        vec!["left".into(), "right".into()]
    }

    fn planes(&self) -> Vec<Plane> {
        vec![Plane::Rgba, Plane::Custom("diffuse".into())]
    }

    fn plane_channels(&self, plane: &Plane) -> IoResult<Vec<String>> {
        let names: &[&str] = match plane {
            Plane::Custom(_) => &["R", "G", "B"],
            _ => &["R", "G", "B", "A"],
        };
        Ok(names.iter().map(|n| n.to_string()).collect())
    }

    fn frame_range(&self) -> Option<FrameRange> {
        Some(FrameRange::new(1, 1))
    }

    fn display_size(&self, _time: f64) -> IoResult<(u32, u32)> {
        Ok((4, 2))
    }

    fn fetch(&self, _time: f64, view: &str, plane: &Plane, _premult: Premult) -> IoResult<PixelBuffer> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let channels = self.plane_channels(plane)?.len();
        let mut buf = PixelBuffer::new(Rect::from_size(4, 2), channels, RowOrder::BottomUp);
        let value = if view == "left" { 0.25 } else { 0.75 };
        buf.samples_mut().fill(value);
        if channels == 4 {
            let bounds = buf.bounds();
            seqio_core::transfer::fill_constant(&mut buf.view_mut(), bounds, 1.0, &[3]);
        }
        Ok(buf)
    }
}

fn memory_writer(store: &Arc<MemoryStore>, caps: Option<FormatCaps>) -> WriterPipeline {
    let mut codec = MemoryCodec::new(store.clone());
    if let Some(caps) = caps {
        codec = codec.with_caps(caps);
    }
    let mut registry = CodecRegistry::new();
    registry.register_encoder(Arc::new(codec));
    let mut writer = WriterPipeline::new(Arc::new(registry), Arc::new(SpecCache::new()), nuke());
    writer.set_file("render.####.mem").unwrap();
    writer.set_colorspace(Direction::Output, "linear").unwrap();
    writer.set_views(vec!["left".into(), "right".into()]);
    writer.set_output_layer(ALL_LAYERS);
    writer
}

#[test]
fn split_views_layers_writes_four_parts() {
    let store = Arc::new(MemoryStore::new());
    let mut writer = memory_writer(&store, None);
    writer.set_parts_splitting(PartsSplitting::SplitViewsLayers);
    let source = Stereo::new();

    let written = writer.write_frame(&source, 1.0).unwrap();
    assert_eq!(written, vec![Path::new("render.0001.mem").to_path_buf()]);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 4);

    let image = store.get(Path::new("render.0001.mem")).unwrap();
    let specs = image.specs();
    assert_eq!(specs.len(), 4);

    let tags: Vec<(Option<&str>, Option<&str>)> = specs
        .iter()
        .map(|s| (s.get_string(attr::VIEW), s.get_string(attr::SUBIMAGE_NAME)))
        .collect();
    assert_eq!(
        tags,
        vec![
            (Some("left"), Some("left.RGBA")),
            (Some("left"), Some("left.diffuse")),
            (Some("right"), Some("right.RGBA")),
            (Some("right"), Some("right.diffuse")),
        ]
    );
    assert_eq!(specs[0].channel_names, vec!["R", "G", "B", "A"]);
    assert_eq!(specs[1].channel_names, vec!["diffuse.R", "diffuse.G", "diffuse.B"]);
    assert_eq!(specs[3].channel_names, vec!["diffuse.R", "diffuse.G", "diffuse.B"]);

    // Stored at 16 bits.
    assert_abs_diff_eq!(image.sample(1, 0, 0, 0).unwrap(), 0.25, epsilon = 1e-4);
    assert_abs_diff_eq!(image.sample(3, 0, 0, 0).unwrap(), 0.75, epsilon = 1e-4);
}

#[test]
fn multi_part_rejected_before_fetch() {
    let store = Arc::new(MemoryStore::new());
    let caps = FormatCaps {
        multi_image: false,
        multi_view: false,
        tiles: false,
        arbitrary_channels: true,
        associated_alpha: true,
        bit_depths: &[BitDepth::F16],
    };
    let mut writer = memory_writer(&store, Some(caps));
    writer.set_parts_splitting(PartsSplitting::SplitViewsLayers);
    let source = Stereo::new();

    let err = writer.write_frame(&source, 1.0).unwrap_err();
    assert!(matches!(err, IoError::Capability(_)), "{err}");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
}

#[test]
fn exr_layers_round_trip_through_reader() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("beauty.####.exr");
    let registry = Arc::new(CodecRegistry::with_builtin());
    let cache = Arc::new(SpecCache::new());

    let mut writer = WriterPipeline::new(registry.clone(), cache.clone(), nuke());
    writer.set_file(pattern.to_str().unwrap()).unwrap();
    writer.set_views(vec!["left".into()]);
    writer.set_output_layer(ALL_LAYERS);
    writer.set_parts_splitting(PartsSplitting::SinglePart);
    let written = writer.write_frame(&Stereo::new(), 1.0).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("beauty.0001.exr"));

    let mut reader = ReaderPipeline::new(registry, cache, nuke());
    reader.set_file(pattern.to_str().unwrap()).unwrap();
    assert_eq!(reader.time_domain().unwrap(), FrameRange::new(1, 1));
    assert_eq!(reader.menus().custom_layers(), vec!["diffuse"]);

    let region = reader.frame_bounds(1.0, 0).unwrap().unwrap();
    assert_eq!(region, Rect::from_size(4, 2));
    let mut host = PixelBuffer::new(region, 3, RowOrder::BottomUp);
    let request = RenderRequest {
        time: 1.0,
        plane: Plane::Custom("diffuse".into()),
        region,
        levels: 0,
        premult: Premult::Premultiplied,
    };
    reader.render(&request, &mut host.view_mut()).unwrap();
    assert_abs_diff_eq!(host.view().sample(2, 1, 1), 0.25, epsilon = 1e-3);
}
