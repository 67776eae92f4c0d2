//! OpenEXR codec.
//!
//! Every layer (part) of a file becomes one sub-image. Spec queries read
//! the headers only; channels are decoded to f32 once per open and served
//! from memory. On write, one
//! layer is created per part; views and layer names travel through the
//! `view` and `oiio:subimagename` attributes.
//!
//! Channel order follows the usual convention: within each layer prefix
//! `R`, `G`, `B`, `A` come first, the rest alphabetically.

use std::path::{Path, PathBuf};

use exr::image::Blocks;
use exr::meta::BlockDescription;
use exr::prelude::*;
use half::f16;
use seqio_core::{attr, AttrValue, BitDepth, ImageSpec, PixelView};
use smallvec::SmallVec;
use tracing::debug;

use crate::codec::{Decoder, Encoder, FormatCaps, ImageInput, ImageOutput};
use crate::memory::{BufferedInput, MemoryImage};
use crate::{IoError, IoResult};

/// OpenEXR reader and writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExrCodec;

const EXTENSIONS: &[&str] = &["exr", "sxr", "mxr"];

/// Default compression when the spec carries none.
pub const DEFAULT_COMPRESSION: &str = "zip";

impl Decoder for ExrCodec {
    fn format_name(&self) -> &'static str {
        "OpenEXR"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn open(&self, path: &Path) -> IoResult<Box<dyn ImageInput>> {
        Ok(Box::new(BufferedInput::new(read(path)?)))
    }

    fn read_specs(&self, path: &Path) -> IoResult<Vec<ImageSpec>> {
        read_specs(path)
    }
}

/// Rank of a channel suffix in display order.
fn channel_rank(name: &str) -> (usize, &str) {
    let (prefix, suffix) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => ("", name),
    };
    let rank = match suffix {
        "R" | "r" => 0,
        "G" | "g" => 1,
        "B" | "b" => 2,
        "A" | "a" => 3,
        _ => 4,
    };
    (rank, prefix)
}

/// Indices of `names` in display order.
fn display_order(names: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, pa) = channel_rank(&names[a]);
        let (rb, pb) = channel_rank(&names[b]);
        (!pa.is_empty(), pa, ra, &names[a]).cmp(&(!pb.is_empty(), pb, rb, &names[b]))
    });
    order
}

fn compression_name(compression: Compression) -> &'static str {
    match compression {
        Compression::Uncompressed => "none",
        Compression::RLE => "rle",
        Compression::ZIP1 => "zips",
        Compression::ZIP16 => "zip",
        Compression::PIZ => "piz",
        Compression::PXR24 => "pxr24",
        Compression::B44 => "b44",
        Compression::B44A => "b44a",
        _ => "dwaa",
    }
}

fn parse_compression(name: &str) -> IoResult<Compression> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "none" => Compression::Uncompressed,
        "rle" => Compression::RLE,
        "zips" => Compression::ZIP1,
        "zip" => Compression::ZIP16,
        "piz" => Compression::PIZ,
        "pxr24" => Compression::PXR24,
        "b44" => Compression::B44,
        "b44a" => Compression::B44A,
        other => return Err(IoError::Encode(format!("unsupported EXR compression '{other}'"))),
    })
}

fn attr_value(value: &AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Text(t) => Some(AttrValue::String(t.to_string())),
        AttributeValue::TextVector(list) => {
            Some(AttrValue::StringArray(list.iter().map(|t| t.to_string()).collect()))
        }
        AttributeValue::F32(v) => Some(AttrValue::Float(*v as f64)),
        AttributeValue::F64(v) => Some(AttrValue::Float(*v)),
        AttributeValue::I32(v) => Some(AttrValue::Int(*v as i64)),
        _ => None,
    }
}

fn text(value: &str) -> IoResult<Text> {
    Text::new_or_none(value)
        .ok_or_else(|| IoError::Encode(format!("'{value}' is not a valid EXR string")))
}

/// What one layer header contributes to its [`ImageSpec`].
struct LayerInfo<'a> {
    shared: &'a ImageAttributes,
    own: &'a LayerAttributes,
    size: Vec2<usize>,
    names: &'a [String],
    depth: BitDepth,
    tiles: Option<Vec2<usize>>,
    compression: Compression,
}

impl LayerInfo<'_> {
    fn spec(&self) -> ImageSpec {
        let display = self.shared.display_window;
        let names: Vec<String> = display_order(self.names)
            .into_iter()
            .map(|i| self.names[i].clone())
            .collect();
        let mut spec = ImageSpec::new(self.size.x() as u32, self.size.y() as u32, names, self.depth);
        spec.x = self.own.layer_position.x() - display.position.x();
        spec.y = self.own.layer_position.y() - display.position.y();
        spec.full_width = display.size.x() as u32;
        spec.full_height = display.size.y() as u32;
        if let Some(size) = self.tiles {
            spec.tile_width = size.x() as u32;
            spec.tile_height = size.y() as u32;
        }

        for (key, value) in self.shared.other.iter().chain(self.own.other.iter()) {
            if let Some(value) = attr_value(value) {
                spec.set_attr(key.to_string(), value);
            }
        }
        if let Some(name) = &self.own.layer_name {
            spec.set_attr(attr::SUBIMAGE_NAME, name.to_string());
        }
        if let Some(view) = &self.own.view_name {
            spec.set_attr(attr::VIEW, view.to_string());
        }
        if let Some(views) = &self.own.multi_view_names {
            let views: Vec<String> = views.iter().map(|t| t.to_string()).collect();
            spec.set_attr(attr::MULTI_VIEW, views);
        }
        spec.set_attr(attr::COMPRESSION, compression_name(self.compression));
        spec.set_attr(attr::PIXEL_ASPECT, self.shared.pixel_aspect);
        if spec.get_attr(attr::COLORSPACE).is_none() {
            spec.set_attr(attr::COLORSPACE, "Linear");
        }
        spec
    }
}

/// Widest sample type of a layer.
fn depth_of(types: impl Iterator<Item = SampleType>) -> BitDepth {
    let (mut has_f32, mut has_f16) = (false, false);
    for t in types {
        match t {
            SampleType::F32 => has_f32 = true,
            SampleType::F16 => has_f16 = true,
            SampleType::U32 => {}
        }
    }
    if has_f32 {
        BitDepth::F32
    } else if has_f16 {
        BitDepth::F16
    } else {
        BitDepth::U32
    }
}

/// Sub-image specs from the headers, without decoding pixels.
pub fn read_specs(path: &Path) -> IoResult<Vec<ImageSpec>> {
    let meta = MetaData::read_from_file(path, false).map_err(|e| IoError::file_open(path, e.to_string()))?;
    let specs: Vec<ImageSpec> = meta
        .headers
        .iter()
        .filter(|h| !h.deep)
        .map(|header| {
            let names: Vec<String> = header.channels.list.iter().map(|c| c.name.to_string()).collect();
            let tiles = match &header.blocks {
                BlockDescription::Tiles(tile) => Some(tile.tile_size),
                BlockDescription::ScanLines => None,
            };
            LayerInfo {
                shared: &header.shared_attributes,
                own: &header.own_attributes,
                size: header.layer_size,
                names: &names,
                depth: depth_of(header.channels.list.iter().map(|c| c.sample_type)),
                tiles,
                compression: header.compression,
            }
            .spec()
        })
        .collect();
    if specs.is_empty() {
        return Err(IoError::Decode(format!("{} has no layers", path.display())));
    }
    debug!(path = %path.display(), layers = specs.len(), "read exr headers");
    Ok(specs)
}

/// Decodes all layers of an EXR file.
pub fn read(path: &Path) -> IoResult<MemoryImage> {
    let image = exr::prelude::read()
        .no_deep_data()
        .largest_resolution_level()
        .all_channels()
        .all_layers()
        .all_attributes()
        .from_file(path)
        .map_err(|e| IoError::file_open(path, e.to_string()))?;

    let mut specs = Vec::new();
    let mut pixels = Vec::new();
    for (index, layer) in image.layer_data.iter().enumerate() {
        let (width, height) = (layer.size.x(), layer.size.y());
        let raw_names: Vec<String> = layer
            .channel_data
            .list
            .iter()
            .map(|c| c.name.to_string())
            .collect();
        let order = display_order(&raw_names);

        let nch = order.len();
        let mut samples = vec![0.0f32; width * height * nch];
        for (k, &i) in order.iter().enumerate() {
            match &layer.channel_data.list[i].sample_data {
                FlatSamples::F16(v) => {
                    for (p, s) in v.iter().enumerate() {
                        samples[p * nch + k] = s.to_f32();
                    }
                }
                FlatSamples::F32(v) => {
                    for (p, s) in v.iter().enumerate() {
                        samples[p * nch + k] = *s;
                    }
                }
                FlatSamples::U32(v) => {
                    for (p, s) in v.iter().enumerate() {
                        samples[p * nch + k] = *s as f32;
                    }
                }
            }
        }

        let depth = depth_of(layer.channel_data.list.iter().map(|c| match c.sample_data {
            FlatSamples::F16(_) => SampleType::F16,
            FlatSamples::F32(_) => SampleType::F32,
            FlatSamples::U32(_) => SampleType::U32,
        }));
        let tiles = match &layer.encoding.blocks {
            Blocks::Tiles(size) => Some(*size),
            Blocks::ScanLines => None,
        };
        let spec = LayerInfo {
            shared: &image.attributes,
            own: &layer.attributes,
            size: layer.size,
            names: &raw_names,
            depth,
            tiles,
            compression: layer.encoding.compression,
        }
        .spec();

        debug!(path = %path.display(), layer = index, width, height, channels = nch, "decoded exr layer");
        specs.push(spec);
        pixels.push(samples);
    }

    let mut parts = specs.into_iter().zip(pixels);
    let (spec, samples) = parts
        .next()
        .ok_or_else(|| IoError::Decode(format!("{} has no layers", path.display())))?;
    let mut image = MemoryImage::from_samples(spec, samples)?;
    for (spec, samples) in parts {
        image = image.with_sub_image(spec, samples)?;
    }
    Ok(image)
}

struct ExrOutput {
    path: PathBuf,
    specs: Vec<ImageSpec>,
    layers: Vec<Option<Layer<AnyChannels<FlatSamples>>>>,
}

impl ExrOutput {
    fn build_layer(
        &self,
        part: usize,
        pixels: &PixelView<'_>,
    ) -> IoResult<Layer<AnyChannels<FlatSamples>>> {
        let spec = &self.specs[part];
        let dw = spec.data_window();
        let count = dw.area() as usize;

        let mut list: SmallVec<[AnyChannel<FlatSamples>; 4]> = SmallVec::new();
        for (c, name) in spec.channel_names.iter().enumerate() {
            let values = (dw.y1..dw.y2).flat_map(|y| (dw.x1..dw.x2).map(move |x| (x, y)));
            let data = match spec.format {
                BitDepth::F32 => {
                    let mut v = Vec::with_capacity(count);
                    v.extend(values.map(|(x, y)| pixels.sample(x, y, c)));
                    FlatSamples::F32(v)
                }
                BitDepth::U32 => {
                    let mut v = Vec::with_capacity(count);
                    v.extend(values.map(|(x, y)| pixels.sample(x, y, c).max(0.0).round() as u32));
                    FlatSamples::U32(v)
                }
                _ => {
                    let mut v = Vec::with_capacity(count);
                    v.extend(values.map(|(x, y)| f16::from_f32(pixels.sample(x, y, c))));
                    FlatSamples::F16(v)
                }
            };
            list.push(AnyChannel::new(text(name)?, data));
        }

        let mut attributes = match spec.get_string(attr::SUBIMAGE_NAME) {
            Some(name) => LayerAttributes::named(text(name)?),
            None if self.specs.len() > 1 => LayerAttributes::named(text(&format!("part{part}"))?),
            None => LayerAttributes::default(),
        };
        attributes.layer_position = Vec2(spec.x, spec.y);
        if let Some(view) = spec.get_string(attr::VIEW) {
            attributes.view_name = Some(text(view)?);
        }
        if let Some(AttrValue::StringArray(views)) = spec.get_attr(attr::MULTI_VIEW) {
            attributes.multi_view_names =
                Some(views.iter().map(|v| text(v)).collect::<IoResult<Vec<_>>>()?);
        }
        for key in [attr::COLORSPACE, attr::GAMMA] {
            if let Some(value) = spec.get_attr(key) {
                let value = match value {
                    AttrValue::Float(v) => AttributeValue::F32(*v as f32),
                    AttrValue::Int(v) => AttributeValue::I32(*v as i32),
                    other => AttributeValue::Text(text(other.as_str().unwrap_or_default())?),
                };
                attributes.other.insert(text(key)?, value);
            }
        }

        let compression =
            parse_compression(spec.get_string(attr::COMPRESSION).unwrap_or(DEFAULT_COMPRESSION))?;
        let blocks = if spec.is_tiled() {
            Blocks::Tiles(Vec2(spec.tile_width as usize, spec.tile_height as usize))
        } else {
            Blocks::ScanLines
        };
        let encoding = Encoding {
            compression,
            blocks,
            line_order: LineOrder::Increasing,
        };

        Ok(Layer::new(
            (spec.width as usize, spec.height as usize),
            attributes,
            encoding,
            AnyChannels::sort(list),
        ))
    }
}

impl ImageOutput for ExrOutput {
    fn write_image(&mut self, part: usize, pixels: &PixelView<'_>) -> IoResult<()> {
        if part >= self.specs.len() {
            return Err(IoError::Encode(format!("no part {part} in {}", self.path.display())));
        }
        let layer = self.build_layer(part, pixels)?;
        self.layers[part] = Some(layer);
        Ok(())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        let Self { path, specs, layers } = *self;
        let layers = layers
            .into_iter()
            .enumerate()
            .map(|(i, l)| l.ok_or_else(|| IoError::Encode(format!("part {i} was never written"))))
            .collect::<IoResult<Vec<_>>>()?;

        let first = &specs[0];
        let mut attributes = ImageAttributes::new(IntegerBounds::from_dimensions((
            first.full_width as usize,
            first.full_height as usize,
        )));
        attributes.pixel_aspect = first.pixel_aspect() as f32;

        let image = Image::from_layers(attributes, layers);
        image
            .write()
            .to_file(&path)
            .map_err(|e| IoError::Encode(e.to_string()))?;
        debug!(path = %path.display(), parts = specs.len(), "wrote exr");
        Ok(())
    }
}

impl Encoder for ExrCodec {
    fn format_name(&self) -> &'static str {
        "OpenEXR"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn capabilities(&self) -> FormatCaps {
        FormatCaps {
            multi_image: true,
            multi_view: true,
            tiles: true,
            arbitrary_channels: true,
            associated_alpha: true,
            bit_depths: &[BitDepth::U32, BitDepth::F16, BitDepth::F32],
        }
    }

    fn create(&self, path: &Path, parts: &[ImageSpec]) -> IoResult<Box<dyn ImageOutput>> {
        if parts.is_empty() {
            return Err(IoError::Encode("an EXR file needs at least one part".into()));
        }
        for spec in parts {
            if let Some(name) = spec.get_string(attr::COMPRESSION) {
                parse_compression(name)?;
            }
        }
        Ok(Box::new(ExrOutput {
            path: path.to_path_buf(),
            specs: parts.to_vec(),
            layers: parts.iter().map(|_| None).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use seqio_core::{PixelBuffer, Rect, RowOrder};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_display_order() {
        let raw = names(&["A", "B", "G", "R", "Z", "diffuse.B", "diffuse.G", "diffuse.R"]);
        let ordered: Vec<&str> = display_order(&raw).iter().map(|&i| raw[i].as_str()).collect();
        assert_eq!(
            ordered,
            vec!["R", "G", "B", "A", "Z", "diffuse.R", "diffuse.G", "diffuse.B"]
        );
    }

    #[test]
    fn test_compression_names() {
        assert_eq!(parse_compression("PIZ").unwrap(), Compression::PIZ);
        assert_eq!(compression_name(Compression::ZIP16), DEFAULT_COMPRESSION);
        assert!(parse_compression("jpeg").is_err());
    }

    #[test]
    fn test_two_part_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.exr");

        let mut left = ImageSpec::rgba(2, 1, BitDepth::F16);
        left.set_attr(attr::SUBIMAGE_NAME, "left");
        left.set_attr(attr::VIEW, "left");
        let mut right = ImageSpec::new(2, 1, names(&["Z"]), BitDepth::F32);
        right.set_attr(attr::SUBIMAGE_NAME, "depth");
        right.set_attr(attr::VIEW, "right");

        let bounds = Rect::from_size(2, 1);
        let rgba = PixelBuffer::from_vec(
            vec![0.5, 0.25, 1.0, 1.0, 2.0, 0.0, 0.125, 0.5],
            bounds,
            4,
            RowOrder::TopDown,
        )
        .unwrap();
        let depth = PixelBuffer::from_vec(vec![10.5, 20.25], bounds, 1, RowOrder::TopDown).unwrap();

        let mut out = ExrCodec.create(&path, &[left, right]).unwrap();
        out.write_image(0, &rgba.memory_view(bounds).unwrap()).unwrap();
        out.write_image(1, &depth.memory_view(bounds).unwrap()).unwrap();
        out.close().unwrap();

        let image = read(&path).unwrap();
        assert_eq!(image.specs().len(), 2);
        let first = &image.specs()[0];
        assert_eq!(first.channel_names, names(&["R", "G", "B", "A"]));
        assert_eq!(first.format, BitDepth::F16);
        assert_eq!(first.alpha_channel, Some(3));
        assert_eq!(first.get_string(attr::SUBIMAGE_NAME), Some("left"));
        assert_eq!(first.get_string(attr::VIEW), Some("left"));
        assert_eq!(first.get_string(attr::COLORSPACE), Some("Linear"));
        assert_relative_eq!(image.sample(0, 1, 0, 0).unwrap(), 2.0);
        assert_relative_eq!(image.sample(0, 0, 0, 1).unwrap(), 0.25);

        let second = &image.specs()[1];
        assert_eq!(second.format, BitDepth::F32);
        assert_eq!(second.get_string(attr::VIEW), Some("right"));
        assert_relative_eq!(image.sample(1, 1, 0, 0).unwrap(), 20.25);

        // headers alone describe the same parts
        let headers = ExrCodec.read_specs(&path).unwrap();
        assert_eq!(headers.as_slice(), image.specs());
    }

    #[test]
    fn test_unwritten_part_fails_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let out = ExrCodec
            .create(&dir.path().join("a.exr"), &[ImageSpec::rgb(1, 1, BitDepth::F16)])
            .unwrap();
        assert!(out.close().is_err());
    }
}
