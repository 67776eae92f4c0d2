//! Writer pipeline.
//!
//! Pulls planes from a [`PlaneSource`], converts them to the file's
//! premultiplication state and colorspace, groups them into parts and
//! hands them to an [`Encoder`]. Everything that can make the target
//! format refuse the output is checked before the first plane is fetched.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use seqio_color::{ColorEngine, ColorTransformAdapter, Direction};
use seqio_core::transfer;
use seqio_core::{attr, BitDepth, Components, ImageSpec, PixelBuffer, Premult, Rect, RowOrder};
use tracing::{debug, info, warn};

use crate::cache::SpecCache;
use crate::channels::{split_layer, Plane};
use crate::codec::{Encoder, FormatCaps};
use crate::params::{FrameRangeChoice, PartsSplitting, WriterParams};
use crate::reader::{InFlight, PipelineState, ReaderPipeline};
use crate::registry::{extension, CodecRegistry};
use crate::sequence::{expand_view, has_frame_token, has_view_token, FrameRange, Sequence};
use crate::{IoError, IoResult};

/// View written when none is selected.
pub const MAIN_VIEW: &str = "main";

/// Output-layer entry that writes every plane.
pub const ALL_LAYERS: &str = "All";

/// Provides host planes to write.
pub trait PlaneSource: Sync {
    /// Views the source can render. The first one is the main view.
    fn views(&self) -> Vec<String> {
        vec![MAIN_VIEW.to_string()]
    }

    /// Planes available, color plane first.
    fn planes(&self) -> Vec<Plane>;

    /// Channel names of `plane`, without any layer prefix.
    fn plane_channels(&self, plane: &Plane) -> IoResult<Vec<String>>;

    /// Host frames the source covers.
    fn frame_range(&self) -> Option<FrameRange>;

    /// Full image size at `time`.
    fn display_size(&self, time: f64) -> IoResult<(u32, u32)>;

    fn pixel_aspect(&self) -> f64 {
        1.0
    }

    /// Host buffer of `plane` for `view` at `time`, in `premult` state.
    ///
    /// The buffer has one channel per entry of
    /// [`plane_channels`](Self::plane_channels) and covers the plane's data window.
    fn fetch(&self, time: f64, view: &str, plane: &Plane, premult: Premult) -> IoResult<PixelBuffer>;
}

/// One plane of one view inside a part.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSlot {
    pub view: String,
    pub plane: Plane,
    /// First channel of the plane in the part.
    pub first: usize,
    pub count: usize,
}

/// One output part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartPlan {
    /// Part name, when the file has several.
    pub name: Option<String>,
    /// `view` attribute.
    pub view: Option<String>,
    /// Full channel names.
    pub channels: Vec<String>,
    pub planes: Vec<PlaneSlot>,
}

/// One output file.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePlan {
    pub path: PathBuf,
    /// Views stored in this file.
    pub views: Vec<String>,
    pub parts: Vec<PartPlan>,
}

/// Default bit depth for a file extension.
pub fn default_bit_depth(ext: &str) -> BitDepth {
    match ext.to_ascii_lowercase().as_str() {
        "exr" | "sxr" | "mxr" | "hdr" | "rgbe" => BitDepth::F32,
        "jpg" | "jpeg" | "bmp" | "dds" | "ico" | "jfi" | "pgm" | "pnm" | "ppm" | "pbm" | "pic" => BitDepth::U8,
        _ => BitDepth::U16,
    }
}

/// Writes host planes to files.
pub struct WriterPipeline {
    registry: Arc<CodecRegistry>,
    cache: Arc<SpecCache>,
    adapter: ColorTransformAdapter,
    params: WriterParams,
    encoder: Option<Arc<dyn Encoder>>,
    state: PipelineState,
    in_flight: AtomicUsize,
}

impl WriterPipeline {
    /// Pipeline with no output file.
    pub fn new(registry: Arc<CodecRegistry>, cache: Arc<SpecCache>, engine: Arc<dyn ColorEngine>) -> Self {
        let adapter = ColorTransformAdapter::new(engine);
        let params = WriterParams {
            colorspace: adapter.state().clone(),
            ..Default::default()
        };
        Self {
            registry,
            cache,
            adapter,
            params,
            encoder: None,
            state: PipelineState::Uninitialized,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Pipeline restored from persisted parameters.
    pub fn from_params(
        registry: Arc<CodecRegistry>,
        cache: Arc<SpecCache>,
        engine: Arc<dyn ColorEngine>,
        params: WriterParams,
    ) -> IoResult<Self> {
        let mut writer = Self::new(registry, cache, engine);
        writer.adapter = ColorTransformAdapter::with_state(writer.adapter.engine().clone(), params.colorspace.clone());
        if let Err(e) = writer.adapter.validate() {
            warn!(error = %e, "persisted colorspace not in config");
        }
        writer.params = params;
        if !writer.params.file.is_empty() {
            let file = writer.params.file.clone();
            writer.set_file(&file)?;
        }
        Ok(writer)
    }

    pub fn state(&self) -> PipelineState {
        match self.state {
            PipelineState::Ready if self.in_flight.load(std::sync::atomic::Ordering::Acquire) > 0 => {
                PipelineState::Rendering
            }
            state => state,
        }
    }

    /// Current parameters, for persistence.
    pub fn params(&self) -> WriterParams {
        let mut params = self.params.clone();
        params.colorspace = self.adapter.state().clone();
        params
    }

    pub fn adapter(&self) -> &ColorTransformAdapter {
        &self.adapter
    }

    /// Sets the output pattern, picks the encoder and derives defaults.
    pub fn set_file(&mut self, file: &str) -> IoResult<()> {
        let probe = PathBuf::from(expand_view(file, MAIN_VIEW));
        let encoder = self.registry.encoder_for(&probe)?;
        let ext = extension(&probe);
        let caps = encoder.capabilities();

        self.params.file = file.to_string();
        self.state = PipelineState::Configured;
        if !self.params.bit_depth_user_set {
            self.params.bit_depth = caps.closest_depth(default_bit_depth(&ext));
        }
        if !self.params.output_colorspace_user_set {
            if let Some(name) = self.adapter.assign_output_default(self.params.bit_depth, &ext) {
                debug!(colorspace = %name, "default output colorspace");
            }
        }
        self.params.colorspace = self.adapter.state().clone();
        info!(
            file,
            format = encoder.format_name(),
            depth = %self.params.bit_depth,
            colorspace = %self.adapter.output(),
            "writer configured"
        );
        self.encoder = Some(encoder);
        self.state = PipelineState::Ready;
        Ok(())
    }

    pub fn set_bit_depth(&mut self, depth: BitDepth) {
        self.params.bit_depth = depth;
        self.params.bit_depth_user_set = true;
    }

    /// Sets a colorspace by name. An unknown name keeps the previous one.
    pub fn set_colorspace(&mut self, direction: Direction, name: &str) -> IoResult<()> {
        self.adapter.set_colorspace(direction, name)?;
        if direction == Direction::Output {
            self.params.output_colorspace_user_set = true;
        }
        self.params.colorspace = self.adapter.state().clone();
        Ok(())
    }

    pub fn set_context(&mut self, key: &str, value: &str) -> IoResult<()> {
        self.adapter.set_context(key, value)?;
        self.params.colorspace = self.adapter.state().clone();
        Ok(())
    }

    pub fn set_parts_splitting(&mut self, splitting: PartsSplitting) {
        self.params.parts_splitting = splitting;
    }

    pub fn set_views(&mut self, views: Vec<String>) {
        self.params.views = views;
    }

    pub fn set_frame_range(&mut self, choice: FrameRangeChoice) {
        self.params.frame_range = choice;
    }

    /// Premultiplication state of the buffers the source hands over.
    pub fn set_input_premult(&mut self, premult: Premult) {
        self.params.input_premult = premult;
    }

    pub fn set_compression(&mut self, compression: Option<String>) {
        self.params.compression = compression;
    }

    pub fn set_quality(&mut self, quality: Option<i32>) {
        self.params.quality = quality;
    }

    pub fn set_tile_size(&mut self, size: u32) {
        self.params.tile_size = size;
    }

    pub fn set_orientation(&mut self, orientation: i32) {
        self.params.orientation = orientation;
    }

    fn encoder(&self) -> IoResult<&Arc<dyn Encoder>> {
        self.encoder
            .as_ref()
            .ok_or_else(|| IoError::SequenceRange("no output file set".into()))
    }

    /// Output-layer menu for `source`.
    ///
    /// "All" comes first when the format takes any channel count, then the
    /// color entries the source has (RGBA when it has none), then its custom
    /// layers.
    pub fn output_layer_options(&self, source: &dyn PlaneSource) -> Vec<String> {
        let arbitrary = self
            .encoder
            .as_ref()
            .is_some_and(|e| e.capabilities().arbitrary_channels);
        let planes = source.planes();
        let mut options = Vec::new();
        if arbitrary {
            options.push(ALL_LAYERS.to_string());
        }
        let color: Vec<&Plane> = planes.iter().filter(|p| p.is_color()).collect();
        if color.is_empty() {
            options.push(Plane::Rgba.name().to_string());
        } else {
            options.extend(color.iter().map(|p| p.name().to_string()));
        }
        options.extend(
            planes
                .iter()
                .filter(|p| matches!(p, Plane::Custom(_)))
                .map(|p| p.name().to_string()),
        );
        options
    }

    /// Selects the output layer by name.
    pub fn set_output_layer(&mut self, name: &str) {
        self.params.output_layer = name.to_string();
    }

    /// Re-matches the persisted output layer against a rebuilt menu,
    /// falling back to the first color entry.
    pub fn restore_output_layer(&mut self, source: &dyn PlaneSource) -> String {
        let options = self.output_layer_options(source);
        if !options.contains(&self.params.output_layer) {
            let fallback = options
                .iter()
                .find(|o| o.as_str() != ALL_LAYERS)
                .cloned()
                .unwrap_or_else(|| Plane::Rgba.name().to_string());
            warn!(layer = %self.params.output_layer, %fallback, "output layer not available");
            self.params.output_layer = fallback;
        }
        self.params.output_layer.clone()
    }

    /// Planes the output layer selects.
    pub fn selected_planes(&self, source: &dyn PlaneSource) -> Vec<Plane> {
        if self.params.output_layer == ALL_LAYERS {
            source.planes()
        } else {
            vec![Plane::from_name(&self.params.output_layer)]
        }
    }

    /// Views to write, in order.
    pub fn selected_views(&self, source: &dyn PlaneSource) -> Vec<String> {
        if self.params.views.is_empty() {
            let main = source.views().into_iter().next();
            vec![main.unwrap_or_else(|| MAIN_VIEW.to_string())]
        } else {
            self.params.views.clone()
        }
    }

    /// Frames this writer renders, given the source's range.
    pub fn frame_range(&self, source: &dyn PlaneSource) -> Option<FrameRange> {
        match self.params.frame_range {
            FrameRangeChoice::Manual { first, last } => Some(FrameRange::new(first, last)),
            FrameRangeChoice::Union => source.frame_range(),
        }
    }

    /// Frame range covering all `sources`.
    pub fn union_range(sources: &[&dyn PlaneSource]) -> Option<FrameRange> {
        sources
            .iter()
            .filter_map(|s| s.frame_range())
            .reduce(|a, b| a.union(&b))
    }

    fn output_path(&self, views: &[String], frame: i32) -> IoResult<PathBuf> {
        let pattern = match views.first() {
            Some(view) if has_view_token(&self.params.file) => expand_view(&self.params.file, view),
            _ => self.params.file.clone(),
        };
        if has_frame_token(&pattern) {
            Ok(Sequence::from_pattern(&pattern)?.frame_path(frame))
        } else {
            Ok(PathBuf::from(pattern))
        }
    }

    fn full_channel_names(source: &dyn PlaneSource, plane: &Plane) -> IoResult<Vec<String>> {
        let names = source.plane_channels(plane)?;
        Ok(match plane {
            Plane::Custom(layer) => names.iter().map(|n| format!("{layer}.{n}")).collect(),
            _ => names,
        })
    }

    /// Splits the selected views and planes of `frame` into files and parts.
    pub fn plan(&self, source: &dyn PlaneSource, frame: i32) -> IoResult<Vec<FilePlan>> {
        let views = self.selected_views(source);
        let planes = self.selected_planes(source);
        let groups: Vec<Vec<String>> = if has_view_token(&self.params.file) {
            views.iter().map(|v| vec![v.clone()]).collect()
        } else {
            vec![views]
        };

        let mut files = Vec::with_capacity(groups.len());
        for group in groups {
            let multi = group.len() > 1;
            let mut parts = Vec::new();
            match self.params.parts_splitting {
                PartsSplitting::SinglePart => {
                    let mut part = PartPlan::default();
                    for (i, view) in group.iter().enumerate() {
                        for plane in &planes {
                            let names = Self::full_channel_names(source, plane)?;
                            let prefix = if i > 0 { format!("{view}.") } else { String::new() };
                            push_slot(&mut part, view, plane, names.iter().map(|n| format!("{prefix}{n}")));
                        }
                    }
                    parts.push(part);
                }
                PartsSplitting::SplitViews => {
                    for view in &group {
                        let mut part = PartPlan {
                            name: multi.then(|| view.clone()),
                            view: Some(view.clone()),
                            ..Default::default()
                        };
                        for plane in &planes {
                            let names = Self::full_channel_names(source, plane)?;
                            push_slot(&mut part, view, plane, names.into_iter());
                        }
                        parts.push(part);
                    }
                }
                PartsSplitting::SplitViewsLayers => {
                    for view in &group {
                        for plane in &planes {
                            let name = if multi {
                                format!("{view}.{}", plane.name())
                            } else {
                                plane.name().to_string()
                            };
                            let mut part = PartPlan {
                                name: Some(name),
                                view: Some(view.clone()),
                                ..Default::default()
                            };
                            let names = Self::full_channel_names(source, plane)?;
                            push_slot(&mut part, view, plane, names.into_iter());
                            parts.push(part);
                        }
                    }
                }
            }
            files.push(FilePlan {
                path: self.output_path(&group, frame)?,
                views: group,
                parts,
            });
        }
        Ok(files)
    }

    /// Fails when the encoder cannot store `files` as planned.
    pub fn check_capabilities(&self, files: &[FilePlan]) -> IoResult<()> {
        let encoder = self.encoder()?;
        check_plan(encoder.format_name(), &encoder.capabilities(), files)
    }

    /// Writes host time `time` of `source`. Returns the files written,
    /// empty when the frame is outside the frame range.
    pub fn write_frame(&self, source: &dyn PlaneSource, time: f64) -> IoResult<Vec<PathBuf>> {
        let _guard = InFlight::enter(&self.in_flight);
        let encoder = self.encoder()?;
        let frame = (time + 0.5).floor() as i32;
        if let Some(range) = self.frame_range(source) {
            if !range.contains(frame) {
                debug!(frame, range = %range, "frame outside output range");
                return Ok(Vec::new());
            }
        }

        let caps = encoder.capabilities();
        let files = self.plan(source, frame)?;
        check_plan(encoder.format_name(), &caps, &files)?;

        let (full_width, full_height) = source.display_size(time)?;
        let depth = caps.closest_depth(self.params.bit_depth);
        let file_premult = if caps.associated_alpha {
            Premult::Premultiplied
        } else {
            Premult::Unpremultiplied
        };

        let mut written = Vec::with_capacity(files.len());
        for file in &files {
            let mut planes: Vec<Vec<PixelBuffer>> = Vec::with_capacity(file.parts.len());
            for part in &file.parts {
                let mut fetched = Vec::with_capacity(part.planes.len());
                for slot in &part.planes {
                    let mut buf = source.fetch(time, &slot.view, &slot.plane, self.params.input_premult)?;
                    if buf.channels() != slot.count {
                        return Err(IoError::FormatMismatch(format!(
                            "plane {} of view {} has {} channels, expected {}",
                            slot.plane,
                            slot.view,
                            buf.channels(),
                            slot.count
                        )));
                    }
                    let names = &part.channels[slot.first..slot.first + slot.count];
                    self.prepare(&mut buf, color_channels(&slot.plane, names), file_premult)?;
                    fetched.push(buf);
                }
                planes.push(fetched);
            }

            let display = Rect::from_size(full_width, full_height);
            let windows: Vec<Rect> = planes
                .iter()
                .map(|bufs| {
                    bufs.iter()
                        .map(PixelBuffer::bounds)
                        .filter(|b| !b.is_empty())
                        .reduce(|a, b| a.union(&b))
                        .unwrap_or(display)
                })
                .collect();
            let specs: Vec<ImageSpec> = file
                .parts
                .iter()
                .zip(&windows)
                .map(|(part, window)| {
                    self.part_spec(file, part, *window, (full_width, full_height), depth, &caps, file_premult, source)
                })
                .collect();

            let mut out = encoder.create(&file.path, &specs)?;
            for (i, ((part, bufs), window)) in file.parts.iter().zip(&planes).zip(&windows).enumerate() {
                let mut part_buf = PixelBuffer::new(*window, part.channels.len(), RowOrder::TopDown);
                {
                    let mut view = part_buf.view_mut();
                    for (slot, buf) in part.planes.iter().zip(bufs) {
                        let mut dst = view.component_view(slot.first, slot.count)?;
                        transfer::copy(&buf.view(), &mut dst, buf.bounds());
                    }
                }
                let file_window = window.flip_y(full_height as i32);
                out.write_image(i, &part_buf.memory_view(file_window)?)?;
            }
            out.close()?;
            self.cache.invalidate(&file.path);
            info!(
                path = %file.path.display(),
                frame,
                parts = file.parts.len(),
                views = ?file.views,
                "wrote frame"
            );
            written.push(file.path.clone());
        }
        Ok(written)
    }

    /// Converts a fetched plane to the file's premultiplication and colorspace.
    fn prepare(&self, buf: &mut PixelBuffer, color_channels: usize, file_premult: Premult) -> IoResult<()> {
        let channels = buf.channels();
        let alpha = Components::from_count(channels)
            .and_then(|c| c.alpha_index())
            .filter(|_| channels > 1);
        let bounds = buf.bounds();
        let mut state = match alpha {
            Some(_) => self.params.input_premult,
            None => Premult::Opaque,
        };
        if color_channels > 0 && !self.adapter.is_identity() {
            if state == Premult::Premultiplied {
                transfer::unpremultiply(&mut buf.view_mut(), bounds, alpha);
                state = Premult::Unpremultiplied;
            }
            self.adapter.apply(buf, color_channels)?;
        }
        let target = match alpha {
            Some(_) => file_premult,
            None => Premult::Opaque,
        };
        match (state, target) {
            (Premult::Premultiplied, Premult::Unpremultiplied) => {
                transfer::unpremultiply(&mut buf.view_mut(), bounds, alpha);
            }
            (Premult::Unpremultiplied, Premult::Premultiplied) => {
                transfer::premultiply(&mut buf.view_mut(), bounds, alpha);
            }
            _ => {}
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn part_spec(
        &self,
        file: &FilePlan,
        part: &PartPlan,
        host_window: Rect,
        (full_width, full_height): (u32, u32),
        depth: BitDepth,
        caps: &FormatCaps,
        file_premult: Premult,
        source: &dyn PlaneSource,
    ) -> ImageSpec {
        let window = host_window.flip_y(full_height as i32);
        let mut spec = ImageSpec::new(window.width() as u32, window.height() as u32, part.channels.clone(), depth);
        spec.x = window.x1;
        spec.y = window.y1;
        spec.full_width = full_width;
        spec.full_height = full_height;
        if spec.alpha_channel.is_none() {
            spec.alpha_channel = part.channels.iter().position(|n| n.ends_with(".A"));
        }

        if let Some((tag, gamma)) = self.adapter.output_file_tag() {
            spec.set_attr(attr::COLORSPACE, tag);
            if let Some(gamma) = gamma {
                spec.set_attr(attr::GAMMA, gamma);
            }
        }
        if let Some(compression) = &self.params.compression {
            spec.set_attr(attr::COMPRESSION, compression.as_str());
        }
        if let Some(quality) = self.params.quality {
            spec.set_attr(attr::QUALITY, quality);
        }
        if self.params.tile_size > 0 && caps.tiles {
            spec.tile_width = self.params.tile_size;
            spec.tile_height = self.params.tile_size;
        }
        if self.params.orientation != 1 {
            spec.set_attr(attr::ORIENTATION, self.params.orientation);
        }
        spec.set_attr(attr::BITS_PER_SAMPLE, depth.bits() as i64);
        let aspect = source.pixel_aspect();
        if aspect != 1.0 {
            spec.set_attr(attr::PIXEL_ASPECT, aspect);
        }
        if let Some(name) = &part.name {
            spec.set_attr(attr::SUBIMAGE_NAME, name.as_str());
        }
        if let Some(view) = &part.view {
            spec.set_attr(attr::VIEW, view.as_str());
        }
        if file.parts.len() == 1 && file.views.len() > 1 {
            spec.set_attr(attr::MULTI_VIEW, file.views.clone());
        }
        if spec.alpha_channel.is_some() && file_premult == Premult::Unpremultiplied {
            spec.set_attr(attr::UNASSOCIATED_ALPHA, 1);
        }
        spec
    }

    /// Drops cached headers and color processors.
    pub fn purge_caches(&self) {
        self.cache.clear();
        self.adapter.purge_cache();
        debug!("purged writer caches");
    }
}

/// Leading channels of a plane that carry color.
///
/// Custom layers count as color only when they start with R, G and B;
/// data layers such as normals or motion vectors are written untouched.
fn color_channels(plane: &Plane, names: &[String]) -> usize {
    let rgb = names.len() >= 3
        && names
            .iter()
            .zip(["R", "G", "B"])
            .all(|(name, c)| split_layer(name).1.eq_ignore_ascii_case(c));
    match plane {
        Plane::Alpha => 0,
        Plane::Custom(_) if rgb => 3,
        Plane::Custom(_) => 0,
        _ if names.len() >= 3 => 3,
        _ => 0,
    }
}

impl std::fmt::Debug for WriterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterPipeline")
            .field("file", &self.params.file)
            .field("state", &self.state())
            .finish()
    }
}

fn push_slot(part: &mut PartPlan, view: &str, plane: &Plane, names: impl Iterator<Item = String>) {
    let first = part.channels.len();
    part.channels.extend(names);
    part.planes.push(PlaneSlot {
        view: view.to_string(),
        plane: plane.clone(),
        first,
        count: part.channels.len() - first,
    });
}

fn check_plan(format: &str, caps: &FormatCaps, files: &[FilePlan]) -> IoResult<()> {
    for file in files {
        if file.parts.len() > 1 && !caps.multi_image {
            return Err(IoError::Capability(format!(
                "{format} does not support writing multiple views/layers into a single file"
            )));
        }
        if file.parts.len() == 1 && file.views.len() > 1 && !caps.multi_view {
            return Err(IoError::Capability(format!(
                "{format} does not support several views in one image"
            )));
        }
        for part in &file.parts {
            if !caps.supports_channels(part.channels.len()) {
                return Err(IoError::FormatMismatch(format!(
                    "{format} cannot store {} channels in {}",
                    part.channels.len(),
                    file.path.display()
                )));
            }
        }
    }
    Ok(())
}

impl PlaneSource for ReaderPipeline {
    fn planes(&self) -> Vec<Plane> {
        let color = match self.params().output_components {
            Components::Rgba => Plane::Rgba,
            Components::Rgb | Components::Xy => Plane::Rgb,
            Components::Alpha => Plane::Alpha,
        };
        let mut planes = vec![color];
        planes.extend(
            self.menus()
                .custom_layers()
                .into_iter()
                .map(|layer| Plane::Custom(layer.to_string())),
        );
        planes
    }

    fn plane_channels(&self, plane: &Plane) -> IoResult<Vec<String>> {
        self.plane_channel_names(plane)
    }

    fn frame_range(&self) -> Option<FrameRange> {
        self.time_domain().ok()
    }

    fn display_size(&self, _time: f64) -> IoResult<(u32, u32)> {
        ReaderPipeline::display_size(self).ok_or_else(|| IoError::SequenceRange("no file set".into()))
    }

    fn pixel_aspect(&self) -> f64 {
        self.specs().first().map_or(1.0, ImageSpec::pixel_aspect)
    }

    fn fetch(&self, time: f64, _view: &str, plane: &Plane, premult: Premult) -> IoResult<PixelBuffer> {
        let channels = self.plane_channel_names(plane)?.len();
        let region = match self.frame_bounds(time, 0)? {
            Some(bounds) => bounds,
            None => {
                let (w, h) = PlaneSource::display_size(self, time)?;
                return Ok(PixelBuffer::new(Rect::from_size(w, h), channels, RowOrder::BottomUp));
            }
        };
        let mut buf = PixelBuffer::new(region, channels, RowOrder::BottomUp);
        let request = crate::reader::RenderRequest {
            time,
            plane: plane.clone(),
            region,
            levels: 0,
            premult,
        };
        self.render(&request, &mut buf.view_mut())?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCodec, MemoryStore};
    use seqio_color::ColorConfig;

    struct Flat {
        views: Vec<String>,
    }

    impl PlaneSource for Flat {
        fn views(&self) -> Vec<String> {
            self.views.clone()
        }

        fn planes(&self) -> Vec<Plane> {
            vec![Plane::Rgba, Plane::Custom("diffuse".into())]
        }

        fn plane_channels(&self, plane: &Plane) -> IoResult<Vec<String>> {
            Ok(match plane {
                Plane::Custom(_) => vec!["R".into(), "G".into(), "B".into()],
                _ => vec!["R".into(), "G".into(), "B".into(), "A".into()],
            })
        }

        fn frame_range(&self) -> Option<FrameRange> {
            Some(FrameRange::new(1, 3))
        }

        fn display_size(&self, _time: f64) -> IoResult<(u32, u32)> {
            Ok((2, 2))
        }

        fn fetch(&self, _time: f64, _view: &str, plane: &Plane, _premult: Premult) -> IoResult<PixelBuffer> {
            let channels = self.plane_channels(plane)?.len();
            let mut buf = PixelBuffer::new(Rect::from_size(2, 2), channels, RowOrder::BottomUp);
            buf.samples_mut().fill(0.5);
            Ok(buf)
        }
    }

    fn writer(store: &Arc<MemoryStore>) -> WriterPipeline {
        let mut registry = CodecRegistry::new();
        registry.register_encoder(Arc::new(MemoryCodec::new(store.clone())));
        WriterPipeline::new(
            Arc::new(registry),
            Arc::new(SpecCache::new()),
            Arc::new(ColorConfig::nuke_default()),
        )
    }

    #[test]
    fn test_default_bit_depth() {
        assert_eq!(default_bit_depth("EXR"), BitDepth::F32);
        assert_eq!(default_bit_depth("jpg"), BitDepth::U8);
        assert_eq!(default_bit_depth("dpx"), BitDepth::U16);
    }

    #[test]
    fn test_output_layer_menu() {
        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("out.####.mem").unwrap();
        let source = Flat { views: vec![MAIN_VIEW.into()] };
        assert_eq!(w.output_layer_options(&source), vec!["All", "RGBA", "diffuse"]);

        w.set_output_layer("specular");
        assert_eq!(w.restore_output_layer(&source), "RGBA");
        w.set_output_layer("diffuse");
        assert_eq!(w.restore_output_layer(&source), "diffuse");
    }

    #[test]
    fn test_single_part_prefixes_other_views() {
        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("out.####.mem").unwrap();
        w.set_views(vec!["left".into(), "right".into()]);
        let source = Flat { views: vec!["left".into(), "right".into()] };

        let files = w.plan(&source, 2).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("out.0002.mem"));
        let part = &files[0].parts[0];
        assert_eq!(part.channels, vec!["R", "G", "B", "A", "right.R", "right.G", "right.B", "right.A"]);
        assert_eq!(part.planes[1].first, 4);
    }

    #[test]
    fn test_view_token_splits_files() {
        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("%V/out.####.mem").unwrap();
        w.set_views(vec!["left".into(), "right".into()]);
        let source = Flat { views: vec!["left".into(), "right".into()] };

        let files = w.plan(&source, 1).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("left/out.0001.mem"), PathBuf::from("right/out.0001.mem")]);
    }

    #[test]
    fn test_frames_outside_range_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("out.####.mem").unwrap();
        w.set_frame_range(FrameRangeChoice::Manual { first: 2, last: 2 });
        let source = Flat { views: vec![MAIN_VIEW.into()] };
        assert!(w.write_frame(&source, 1.0).unwrap().is_empty());
        assert_eq!(w.write_frame(&source, 2.0).unwrap(), vec![PathBuf::from("out.0002.mem")]);
        assert!(store.get(std::path::Path::new("out.0002.mem")).is_some());
    }

    #[test]
    fn test_color_only_on_color_layers() {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(color_channels(&Plane::Rgba, &names(&["R", "G", "B", "A"])), 3);
        assert_eq!(color_channels(&Plane::Alpha, &names(&["A"])), 0);
        let diffuse = Plane::Custom("diffuse".into());
        assert_eq!(color_channels(&diffuse, &names(&["diffuse.R", "diffuse.G", "diffuse.B"])), 3);
        let normals = Plane::Custom("N".into());
        assert_eq!(color_channels(&normals, &names(&["N.X", "N.Y", "N.Z"])), 0);
        let motion = Plane::Custom("motion".into());
        assert_eq!(color_channels(&motion, &names(&["motion.u", "motion.v", "motion.w"])), 0);
    }

    #[test]
    fn test_data_layer_written_untouched() {
        struct Normals;

        impl PlaneSource for Normals {
            fn planes(&self) -> Vec<Plane> {
                vec![Plane::Custom("N".into())]
            }

            fn plane_channels(&self, _plane: &Plane) -> IoResult<Vec<String>> {
                Ok(vec!["X".into(), "Y".into(), "Z".into()])
            }

            fn frame_range(&self) -> Option<FrameRange> {
                Some(FrameRange::single(1))
            }

            fn display_size(&self, _time: f64) -> IoResult<(u32, u32)> {
                Ok((1, 1))
            }

            fn fetch(&self, _time: f64, _view: &str, _plane: &Plane, _premult: Premult) -> IoResult<PixelBuffer> {
                PixelBuffer::from_vec(vec![0.5, -0.25, 1.0], Rect::from_size(1, 1), 3, RowOrder::BottomUp)
                    .map_err(Into::into)
            }
        }

        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("normals.mem").unwrap();
        w.set_bit_depth(BitDepth::F32);
        w.set_output_layer("N");
        assert!(!w.adapter().is_identity());
        w.write_frame(&Normals, 1.0).unwrap();

        let image = store.get(std::path::Path::new("normals.mem")).unwrap();
        assert_eq!(image.samples(0), &[0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_written_spec_tags() {
        let store = Arc::new(MemoryStore::new());
        let mut w = writer(&store);
        w.set_file("tagged.mem").unwrap();
        w.set_compression(Some("piz".into()));
        let source = Flat { views: vec![MAIN_VIEW.into()] };
        w.write_frame(&source, 1.0).unwrap();

        let image = store.get(std::path::Path::new("tagged.mem")).unwrap();
        let spec = &image.specs()[0];
        assert_eq!(spec.get_string(attr::COMPRESSION), Some("piz"));
        // 16 bits by default for an unknown extension, encoded as Rec709.
        assert_eq!(spec.format, BitDepth::U16);
        assert_eq!(spec.get_int(attr::BITS_PER_SAMPLE), Some(16));
        assert_eq!(spec.get_string(attr::COLORSPACE), Some("Rec709"));
        assert_eq!(spec.channel_names, vec!["R", "G", "B", "A"]);
    }
}
