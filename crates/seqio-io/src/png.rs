//! PNG codec.
//!
//! 8- and 16-bit gray, gray+alpha, RGB and RGBA. Palette and sub-byte
//! images are expanded on read. PNG stores unassociated alpha and is
//! treated as sRGB encoded.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use seqio_core::{attr, BitDepth, ImageSpec, PixelView};
use tracing::debug;

use crate::codec::{Decoder, Encoder, FormatCaps, ImageInput, ImageOutput};
use crate::memory::{BufferedInput, MemoryImage};
use crate::{IoError, IoResult};

/// PNG reader and writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

const EXTENSIONS: &[&str] = &["png"];

impl Decoder for PngCodec {
    fn format_name(&self) -> &'static str {
        "PNG"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn open(&self, path: &Path) -> IoResult<Box<dyn ImageInput>> {
        let image = read(path)?;
        Ok(Box::new(BufferedInput::new(image)))
    }
}

/// Decodes a whole PNG file.
pub fn read(path: &Path) -> IoResult<MemoryImage> {
    let file = File::open(path).map_err(|e| IoError::file_open(path, e.to_string()))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e: png::DecodingError| IoError::file_open(path, e.to_string()))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::Decode("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::Decode(e.to_string()))?;
    let bytes = &buf[..info.buffer_size()];

    let names: &[&str] = match info.color_type {
        png::ColorType::Grayscale => &["Y"],
        png::ColorType::GrayscaleAlpha => &["Y", "A"],
        png::ColorType::Rgb => &["R", "G", "B"],
        png::ColorType::Rgba => &["R", "G", "B", "A"],
        other => {
            return Err(IoError::Decode(format!("unexpected color type {other:?} after expansion")));
        }
    };
    let (depth, samples) = match info.bit_depth {
        png::BitDepth::Eight => (BitDepth::U8, bytes.iter().map(|&b| b as f32 / 255.0).collect()),
        png::BitDepth::Sixteen => (
            BitDepth::U16,
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]) as f32 / 65535.0)
                .collect(),
        ),
        other => return Err(IoError::Decode(format!("unsupported bit depth {other:?}"))),
    };

    let mut spec = ImageSpec::new(
        info.width,
        info.height,
        names.iter().map(|n| n.to_string()).collect(),
        depth,
    );
    spec.set_attr(attr::COLORSPACE, "sRGB");
    if spec.alpha_channel.is_some() {
        spec.set_attr(attr::UNASSOCIATED_ALPHA, 1);
    }
    debug!(path = %path.display(), width = info.width, height = info.height, channels = names.len(), "read png");
    MemoryImage::from_samples(spec, samples)
}

struct PngOutput {
    path: PathBuf,
    spec: ImageSpec,
    written: bool,
}

impl ImageOutput for PngOutput {
    fn write_image(&mut self, part: usize, pixels: &PixelView<'_>) -> IoResult<()> {
        if part != 0 {
            return Err(IoError::Capability("PNG stores a single image per file".into()));
        }
        let spec = &self.spec;
        let color_type = match spec.channels() {
            1 => png::ColorType::Grayscale,
            2 => png::ColorType::GrayscaleAlpha,
            3 => png::ColorType::Rgb,
            4 => png::ColorType::Rgba,
            n => return Err(IoError::FormatMismatch(format!("PNG cannot store {n} channels"))),
        };
        let sixteen = spec.format == BitDepth::U16;

        let dw = spec.data_window();
        let mut data = Vec::with_capacity(dw.area() as usize * spec.channels() * if sixteen { 2 } else { 1 });
        for y in dw.y1..dw.y2 {
            for x in dw.x1..dw.x2 {
                for c in 0..spec.channels() {
                    let v = pixels.sample(x, y, c).clamp(0.0, 1.0);
                    if sixteen {
                        data.extend_from_slice(&((v * 65535.0).round() as u16).to_be_bytes());
                    } else {
                        data.push((v * 255.0).round() as u8);
                    }
                }
            }
        }

        let file = File::create(&self.path)?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), spec.width, spec.height);
        encoder.set_color(color_type);
        encoder.set_depth(if sixteen { png::BitDepth::Sixteen } else { png::BitDepth::Eight });
        encoder.set_compression(png::Compression::default());
        if spec.get_string(attr::COLORSPACE) == Some("sRGB") {
            encoder.set_source_srgb(png::SrgbRenderingIntent::Perceptual);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| IoError::Encode(e.to_string()))?;
        writer
            .write_image_data(&data)
            .map_err(|e| IoError::Encode(e.to_string()))?;
        self.written = true;
        Ok(())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        if !self.written {
            return Err(IoError::Encode(format!("{} was never written", self.path.display())));
        }
        Ok(())
    }
}

impl Encoder for PngCodec {
    fn format_name(&self) -> &'static str {
        "PNG"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn capabilities(&self) -> FormatCaps {
        FormatCaps {
            multi_image: false,
            multi_view: false,
            tiles: false,
            arbitrary_channels: false,
            associated_alpha: false,
            bit_depths: &[BitDepth::U8, BitDepth::U16],
        }
    }

    fn create(&self, path: &Path, parts: &[ImageSpec]) -> IoResult<Box<dyn ImageOutput>> {
        let [spec] = parts else {
            return Err(IoError::Capability(format!(
                "PNG cannot store {} parts in one file",
                parts.len()
            )));
        };
        Ok(Box::new(PngOutput {
            path: path.to_path_buf(),
            spec: spec.clone(),
            written: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqio_core::{PixelBuffer, Rect, RowOrder};

    fn write_gray(path: &Path, values: &[f32], w: u32, h: u32) {
        let spec = ImageSpec::new(w, h, vec!["Y".into()], BitDepth::U8);
        let bounds = Rect::from_size(w, h);
        let buf = PixelBuffer::from_vec(values.to_vec(), bounds, 1, RowOrder::TopDown).unwrap();
        let mut out = PngCodec.create(path, &[spec]).unwrap();
        out.write_image(0, &buf.memory_view(bounds).unwrap()).unwrap();
        out.close().unwrap();
    }

    #[test]
    fn test_gray_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        let values = [0.0, 64.0 / 255.0, 128.0 / 255.0, 1.0];
        write_gray(&path, &values, 2, 2);

        let image = read(&path).unwrap();
        let spec = &image.specs()[0];
        assert_eq!(spec.channel_names, vec!["Y".to_string()]);
        assert_eq!(spec.format, BitDepth::U8);
        assert_eq!(spec.alpha_channel, None);
        assert_eq!(spec.get_string(attr::COLORSPACE), Some("sRGB"));
        assert_eq!(image.samples(0), &values);
    }

    #[test]
    fn test_rgba_marks_unassociated_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        let spec = ImageSpec::rgba(1, 1, BitDepth::U16);
        let bounds = Rect::from_size(1, 1);
        let buf = PixelBuffer::from_vec(vec![1.0, 0.5, 0.0, 1.0], bounds, 4, RowOrder::TopDown).unwrap();
        let mut out = PngCodec.create(&path, &[spec]).unwrap();
        out.write_image(0, &buf.memory_view(bounds).unwrap()).unwrap();
        out.close().unwrap();

        let image = read(&path).unwrap();
        assert_eq!(image.specs()[0].alpha_channel, Some(3));
        assert_eq!(image.specs()[0].get_int(attr::UNASSOCIATED_ALPHA), Some(1));
        assert_eq!(image.specs()[0].format, BitDepth::U16);
    }

    #[test]
    fn test_rejects_multiple_parts() {
        let spec = ImageSpec::rgb(1, 1, BitDepth::U8);
        let err = PngCodec
            .create(Path::new("x.png"), &[spec.clone(), spec])
            .err()
            .unwrap();
        assert!(matches!(err, IoError::Capability(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PngCodec.open(Path::new("/nonexistent/a.png")).err().unwrap();
        assert!(matches!(err, IoError::FileOpen { .. }));
    }
}
