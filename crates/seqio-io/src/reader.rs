//! Reader pipeline.
//!
//! Ties the resolver, the channel mapper, the color adapter and the
//! transfer functions together. Configuration (`set_*`) takes `&mut self`
//! and happens on one controlling thread; [`ReaderPipeline::render`] takes
//! `&self`, only reads that state, and may run on many threads at once.
//!
//! A render goes through these steps:
//!
//! 1. resolve the host time to a file (or to black)
//! 2. pick the proxy when the render scale is small enough
//! 3. read the mapped channels of the region into a top-down working buffer
//! 4. convert the color channels from the input to the output colorspace
//! 5. expand into the host's channel layout and premultiplication state
//! 6. resample to the render scale into the host buffer
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seqio_color::ColorConfig;
//! use seqio_core::{PixelBuffer, Premult, Rect, RowOrder};
//! use seqio_io::channels::Plane;
//! use seqio_io::reader::{ReaderPipeline, RenderRequest};
//! use seqio_io::{CodecRegistry, SpecCache};
//!
//! let mut reader = ReaderPipeline::new(
//!     Arc::new(CodecRegistry::with_builtin()),
//!     Arc::new(SpecCache::new()),
//!     Arc::new(ColorConfig::nuke_default()),
//! );
//! reader.set_file("plates/shot.####.exr").unwrap();
//!
//! let region = reader.frame_bounds(1001.0, 0).unwrap().unwrap();
//! let mut out = PixelBuffer::new(region, 4, RowOrder::BottomUp);
//! let request = RenderRequest {
//!     time: 1001.0,
//!     plane: Plane::Rgba,
//!     region,
//!     levels: 0,
//!     premult: Premult::Premultiplied,
//! };
//! reader.render(&request, &mut out.view_mut()).unwrap();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use seqio_color::{ColorEngine, ColorTransformAdapter, Direction};
use seqio_core::transfer::{self, SingleChannelRole};
use seqio_core::{attr, Components, ImageSpec, PixelBuffer, PixelViewMut, Premult, Rect, RowOrder};
use tracing::{debug, info, trace, warn};

use crate::cache::{InputCache, SpecCache};
use crate::channels::{
    build_menus, default_mapping, mapping_for_plane, ChannelMapping, ChannelMenus, ChannelSource, Plane,
};
use crate::codec::ImageInput;
use crate::params::ReaderParams;
use crate::registry::CodecRegistry;
use crate::resolver::{FrameStatus, MissingFramePolicy, Resolved, SequenceResolver, TimeMapping, TimeMode};
use crate::sequence::FrameRange;
use crate::{IoError, IoResult};

/// Lifecycle of a [`ReaderPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No file set.
    Uninitialized,
    /// File set, metadata not derived yet.
    Configured,
    /// Ready to render.
    Ready,
    /// At least one render in flight.
    Rendering,
}

/// One render call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Host time.
    pub time: f64,
    /// Plane to produce.
    pub plane: Plane,
    /// Host-space region at render scale.
    pub region: Rect,
    /// Render scale is `1 / 2^levels`.
    pub levels: u32,
    /// Premultiplication state the host wants.
    pub premult: Premult,
}

/// Counts a call in flight for as long as it lives.
pub(crate) struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    pub(crate) fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Reads image files and sequences into host buffers.
pub struct ReaderPipeline {
    registry: Arc<CodecRegistry>,
    cache: Arc<SpecCache>,
    adapter: ColorTransformAdapter,
    params: ReaderParams,
    resolver: SequenceResolver,
    specs: Arc<[ImageSpec]>,
    menus: ChannelMenus,
    selection: [usize; 4],
    default_mapping: ChannelMapping,
    mapping: ChannelMapping,
    file_fps: Option<f64>,
    state: PipelineState,
    in_flight: AtomicUsize,
    inputs: InputCache,
}

impl ReaderPipeline {
    /// Pipeline with no file.
    pub fn new(registry: Arc<CodecRegistry>, cache: Arc<SpecCache>, engine: Arc<dyn ColorEngine>) -> Self {
        let adapter = ColorTransformAdapter::new(engine);
        let params = ReaderParams {
            colorspace: adapter.state().clone(),
            ..Default::default()
        };
        Self {
            resolver: SequenceResolver::new(registry.clone()),
            registry,
            cache,
            adapter,
            params,
            specs: Arc::from(Vec::new()),
            menus: ChannelMenus::default(),
            selection: [0; 4],
            default_mapping: ChannelMapping::black(),
            mapping: ChannelMapping::black(),
            file_fps: None,
            state: PipelineState::Uninitialized,
            in_flight: AtomicUsize::new(0),
            inputs: InputCache::default(),
        }
    }

    /// Pipeline restored from persisted parameters.
    ///
    /// Channel selections are matched by name against the file; values the
    /// user set are kept, the rest are derived again.
    pub fn from_params(
        registry: Arc<CodecRegistry>,
        cache: Arc<SpecCache>,
        engine: Arc<dyn ColorEngine>,
        params: ReaderParams,
    ) -> IoResult<Self> {
        let mut reader = Self::new(registry, cache, engine);
        reader.adapter = ColorTransformAdapter::with_state(reader.adapter.engine().clone(), params.colorspace.clone());
        if let Err(e) = reader.adapter.validate() {
            warn!(error = %e, "persisted colorspace not in config");
        }
        reader.params = params;
        reader.apply_time_settings();
        if !reader.params.file.is_empty() {
            let file = reader.params.file.clone();
            reader.resolver.set_file(&file)?;
            reader.state = PipelineState::Configured;
            if let Some(proxy) = reader.params.proxy_file.clone() {
                reader.resolver.set_proxy_file(Some(&proxy))?;
            }
            reader.configure(true)?;
        }
        Ok(reader)
    }

    pub fn state(&self) -> PipelineState {
        match self.state {
            PipelineState::Ready if self.in_flight.load(Ordering::Acquire) > 0 => PipelineState::Rendering,
            state => state,
        }
    }

    /// Current parameters, for persistence.
    pub fn params(&self) -> ReaderParams {
        let mut params = self.params.clone();
        params.colorspace = self.adapter.state().clone();
        params
    }

    pub fn adapter(&self) -> &ColorTransformAdapter {
        &self.adapter
    }

    pub fn resolver(&self) -> &SequenceResolver {
        &self.resolver
    }

    pub fn menus(&self) -> &ChannelMenus {
        &self.menus
    }

    /// Mapping used for the color planes.
    pub fn mapping(&self) -> &ChannelMapping {
        &self.mapping
    }

    /// Sub-images of the frame the menus were built from.
    pub fn specs(&self) -> &[ImageSpec] {
        &self.specs
    }

    /// Full size of the image, from the first sub-image.
    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.specs.first().map(|s| (s.full_width, s.full_height))
    }

    /// Channel names a render of `plane` produces, in order.
    ///
    /// Color planes use the canonical names; custom layers keep the
    /// suffixes of the file's channels.
    pub fn plane_channel_names(&self, plane: &Plane) -> IoResult<Vec<String>> {
        let canonical = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Ok(match plane {
            Plane::Rgba => canonical(&["R", "G", "B", "A"]),
            Plane::Rgb => canonical(&["R", "G", "B"]),
            Plane::Alpha => canonical(&["A"]),
            Plane::Custom(_) => {
                let mapping = mapping_for_plane(&self.specs, plane)?;
                let suffix = |source: ChannelSource| match source {
                    ChannelSource::Channel { sub_image, index } => self.specs[sub_image].channel_names[index]
                        .rsplit('.')
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    ChannelSource::Zero | ChannelSource::One => String::new(),
                };
                match mapping.single {
                    Some(SingleChannelRole::Luminance) => vec![suffix(mapping.sources[0])],
                    Some(SingleChannelRole::Alpha) => vec![suffix(mapping.sources[3])],
                    None => mapping
                        .components
                        .slots()
                        .iter()
                        .map(|&slot| suffix(mapping.sources[slot]))
                        .collect(),
                }
            }
        })
    }

    /// Sets the file or sequence pattern and derives everything from it.
    pub fn set_file(&mut self, file: &str) -> IoResult<()> {
        self.resolver.set_file(file)?;
        self.params.file = file.to_string();
        self.state = PipelineState::Configured;
        self.configure(false)
    }

    /// Sets or clears the proxy pattern.
    pub fn set_proxy_file(&mut self, file: Option<&str>) -> IoResult<()> {
        self.resolver.set_proxy_file(file)?;
        self.params.proxy_file = file.map(str::to_string);
        if file.is_some() && self.state != PipelineState::Uninitialized && !self.params.custom_proxy_scale {
            self.detect_proxy_scale()?;
        }
        Ok(())
    }

    /// Overrides the proxy to original ratio.
    pub fn set_proxy_scale(&mut self, scale: Option<[f64; 2]>) -> IoResult<()> {
        match scale {
            Some(s) => {
                self.params.custom_proxy_scale = true;
                self.params.original_proxy_scale = s;
            }
            None => {
                self.params.custom_proxy_scale = false;
                if self.params.proxy_file.is_some() && self.state != PipelineState::Uninitialized {
                    self.detect_proxy_scale()?;
                }
            }
        }
        Ok(())
    }

    pub fn set_proxy_threshold(&mut self, threshold: [f64; 2]) {
        self.params.proxy_threshold = threshold;
    }

    /// Sets a user frame range, or returns to the one found on disk.
    pub fn set_frame_range(&mut self, range: Option<FrameRange>) -> IoResult<()> {
        match range {
            Some(r) => {
                self.params.frame_range_user_set = true;
                self.params.first_frame = r.first();
                self.params.last_frame = r.last();
                self.resolver.set_frame_range(Some(r));
            }
            None => {
                self.params.frame_range_user_set = false;
                self.resolver.set_frame_range(None);
                if self.state != PipelineState::Uninitialized {
                    let original = self.resolver.original_range()?;
                    self.params.first_frame = original.first();
                    self.params.last_frame = original.last();
                }
            }
        }
        Ok(())
    }

    pub fn set_time_mapping(&mut self, mapping: TimeMapping) {
        self.params.time = mapping;
        self.resolver.set_mapping(mapping);
    }

    pub fn set_missing_frame_policy(&mut self, policy: MissingFramePolicy) {
        self.params.missing_frame = policy;
        self.resolver.set_missing_frame_policy(policy);
    }

    /// Selects menu option `option` for RGBA slot `slot`.
    pub fn set_channel(&mut self, slot: usize, option: &str) -> IoResult<()> {
        if slot > 3 {
            return Err(IoError::FormatMismatch(format!("no channel slot {slot}")));
        }
        let index = self
            .menus
            .index_of(option)
            .ok_or_else(|| IoError::FormatMismatch(format!("no channel {option:?} in {}", self.params.file)))?;
        self.selection[slot] = index;
        self.update_mapping();
        Ok(())
    }

    /// Sets the plane shown by default.
    pub fn set_output_layer(&mut self, plane: &Plane) -> IoResult<()> {
        if let Plane::Custom(layer) = plane {
            if !self.menus.custom_layers().contains(&layer.as_str()) {
                return Err(IoError::FormatMismatch(format!("no layer {layer:?} in {}", self.params.file)));
            }
        }
        self.params.output_layer = plane.name().to_string();
        Ok(())
    }

    /// Plane named by the output layer setting.
    pub fn output_layer(&self) -> Plane {
        Plane::from_name(&self.params.output_layer)
    }

    /// Sets a colorspace by name. An unknown name keeps the previous one.
    pub fn set_colorspace(&mut self, direction: Direction, name: &str) -> IoResult<()> {
        self.adapter.set_colorspace(direction, name)?;
        if direction == Direction::Input {
            self.params.colorspace_user_set = true;
        }
        self.params.colorspace = self.adapter.state().clone();
        Ok(())
    }

    pub fn set_context(&mut self, key: &str, value: &str) -> IoResult<()> {
        self.adapter.set_context(key, value)?;
        self.params.colorspace = self.adapter.state().clone();
        Ok(())
    }

    /// Sets the file's premultiplication state explicitly.
    pub fn set_premult(&mut self, premult: Premult) {
        self.params.premult = premult;
        self.params.premult_user_set = true;
    }

    /// Returns premult handling to metadata detection.
    pub fn reset_premult(&mut self) -> IoResult<()> {
        self.params.premult_user_set = false;
        if self.state != PipelineState::Uninitialized {
            self.configure(true)?;
        }
        Ok(())
    }

    /// Frame rate: the custom one, the file's, or the default.
    pub fn frame_rate(&self) -> f64 {
        match (self.params.custom_fps, self.file_fps) {
            (false, Some(fps)) => fps,
            _ => self.params.fps,
        }
    }

    pub fn set_frame_rate(&mut self, fps: Option<f64>) {
        self.params.custom_fps = fps.is_some();
        if let Some(fps) = fps {
            self.params.fps = fps;
        }
    }

    /// Resolves host `time` to a file.
    pub fn resolve(&self, time: f64) -> IoResult<Resolved> {
        self.resolver.resolve(time)
    }

    /// Host time range the source covers.
    pub fn time_domain(&self) -> IoResult<FrameRange> {
        self.resolver.time_domain()
    }

    /// Host-space data window of the frame at `time`, at render scale.
    ///
    /// `None` when the time resolves to black.
    pub fn frame_bounds(&self, time: f64, levels: u32) -> IoResult<Option<Rect>> {
        let resolved = self.resolver.resolve(time)?;
        let Some((path, file_levels)) = self.pick_file(&resolved, levels) else {
            return Ok(None);
        };
        let specs = self.load_specs(&path, resolved.stream_frame)?;
        let window = specs
            .iter()
            .map(ImageSpec::host_data_window)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Ok(Some(rescale(window, file_levels as i32 - levels as i32)))
    }

    /// Drops cached headers, open files, color processors and the probed
    /// frame list, so frames added or removed on disk are seen again.
    pub fn purge_caches(&mut self) {
        self.cache.clear();
        self.inputs.clear();
        self.adapter.purge_cache();
        self.resolver.invalidate();
        if self.state != PipelineState::Uninitialized {
            match self.resolver.original_range() {
                Ok(original) => {
                    self.params.original_frame_range = Some(original);
                    if !self.params.frame_range_user_set {
                        self.params.first_frame = original.first();
                        self.params.last_frame = original.last();
                    }
                }
                Err(e) => warn!(error = %e, "sequence no longer readable"),
            }
        }
        debug!("purged reader caches");
    }

    /// Renders `request` into `dst`.
    ///
    /// `dst` is in host coordinates at render scale and must contain
    /// `request.region`. Pixels of the region outside the file's data window
    /// become zero. A color plane of one channel receives alpha, opaque when
    /// the file has none; a custom layer of one channel is copied as is.
    pub fn render(&self, request: &RenderRequest, dst: &mut PixelViewMut<'_>) -> IoResult<()> {
        let _guard = InFlight::enter(&self.in_flight);
        if self.state == PipelineState::Uninitialized {
            return Err(IoError::SequenceRange("no file set".into()));
        }
        let region = request.region;
        if !dst.bounds().contains_rect(&region) {
            return Err(IoError::FormatMismatch(format!(
                "render region {region} outside destination {}",
                dst.bounds()
            )));
        }
        let all: Vec<usize> = (0..dst.channels()).collect();
        transfer::fill_constant(dst, region, 0.0, &all);

        let resolved = self.resolver.resolve(request.time)?;
        let Some((path, file_levels)) = self.pick_file(&resolved, request.levels) else {
            trace!(time = request.time, "black frame");
            return Ok(());
        };
        let shared = self.inputs.get_or_open(&path, resolved.stream_frame, |p| {
            let decoder = self.registry.decoder_for(p)?;
            match resolved.stream_frame {
                Some(frame) => decoder.open_frame(p, frame),
                None => decoder.open(p),
            }
        })?;
        let delta = request.levels as i32 - file_levels as i32;
        let (mapping, mut working) = {
            let mut input = shared.lock().unwrap();
            let mapping = self.mapping_for(input.specs(), &request.plane)?;
            let window = data_window_of(input.specs(), &mapping);
            let Some(read_region) = rescale(region, -delta).intersect(&window) else {
                return Ok(());
            };
            let full_height = input.specs()[0].full_height as i32;
            let file_rect = read_region.flip_y(full_height);

            let slots = mapping.working_slots();
            let mut working = PixelBuffer::new(read_region, slots.len(), RowOrder::TopDown);
            read_working(&mut **input, &mapping, file_rect, &mut working)?;
            (mapping, working)
        };
        let read_region = working.bounds();
        let slots = mapping.working_slots();

        let working_alpha = slots.iter().position(|&s| s == 3);
        let mut premult = match working_alpha {
            Some(_) => self.params.premult,
            None => Premult::Opaque,
        };
        let color_channels = mapping.color_channels();
        if color_channels > 0 && !self.adapter.is_identity() {
            if premult == Premult::Premultiplied {
                transfer::unpremultiply(&mut working.view_mut(), read_region, working_alpha);
                premult = Premult::Unpremultiplied;
            }
            self.adapter.apply(&mut working, color_channels)?;
        }

        let mut host = PixelBuffer::new(read_region, dst.channels(), RowOrder::BottomUp);
        if dst.channels() == 1 && !request.plane.is_color() {
            transfer::copy(&working.view(), &mut host.view_mut(), read_region);
        } else {
            transfer::copy_as(&working.view(), &mut host.view_mut(), read_region, mapping.role());
        }
        let host_components = Components::from_count(dst.channels()).unwrap_or(Components::Rgba);
        let target = request.premult.for_components(host_components);
        let host_alpha = host_components.alpha_index().filter(|_| dst.channels() > 1);
        match (premult, target) {
            (Premult::Premultiplied, Premult::Unpremultiplied) => {
                transfer::unpremultiply(&mut host.view_mut(), read_region, host_alpha);
            }
            (Premult::Unpremultiplied, Premult::Premultiplied) => {
                transfer::premultiply(&mut host.view_mut(), read_region, host_alpha);
            }
            _ => {}
        }

        if delta == 0 {
            transfer::copy(&host.view(), dst, read_region);
        } else {
            let target_region = rescale(read_region, delta)
                .intersect(&region)
                .unwrap_or(region);
            transfer::scale(&host.view(), read_region, dst, target_region, delta);
        }
        trace!(
            path = %path.display(),
            frame = resolved.frame,
            status = ?resolved.status,
            region = %region,
            levels = request.levels,
            "rendered"
        );
        Ok(())
    }

    fn configure(&mut self, restore: bool) -> IoResult<()> {
        let original = self.resolver.original_range()?;
        self.params.original_frame_range = Some(original);
        if self.params.frame_range_user_set {
            self.resolver.set_frame_range(self.params.user_frame_range());
        } else {
            self.params.first_frame = original.first();
            self.params.last_frame = original.last();
            self.resolver.set_frame_range(None);
            if !restore && self.params.time.mode == TimeMode::StartingTime {
                self.params.time.starting_time = original.first();
            }
        }
        self.apply_time_settings();

        let range = self.resolver.frame_range()?;
        let probe = self.resolver.resolve(range.first() as f64);
        let resolved = match probe {
            Ok(r) if r.path.is_some() => r,
            _ => self.resolver.resolve(original.first() as f64)?,
        };
        let path = resolved
            .path
            .clone()
            .ok_or_else(|| IoError::SequenceRange(format!("no readable frame in {}", self.params.file)))?;
        let specs = self.load_specs(&path, resolved.stream_frame)?;
        let first = specs
            .first()
            .ok_or_else(|| IoError::FormatMismatch(format!("{} has no images", path.display())))?;

        self.menus = build_menus(&specs);
        self.specs = specs.clone();
        self.default_mapping = default_mapping(&specs);
        let default_selection = self.menus.selection_for(&self.default_mapping);
        self.selection = if restore && self.params.channel_names.iter().any(|n| !n.is_empty()) {
            self.menus.restore(&self.params.channel_names, self.params.channel_indices)
        } else {
            default_selection
        };
        self.update_mapping();
        self.params.output_components = match self.mapping.single {
            Some(SingleChannelRole::Alpha) => Components::Alpha,
            _ if self.mapping.components == Components::Xy => Components::Rgb,
            _ => self.mapping.components,
        };
        if let Plane::Custom(layer) = Plane::from_name(&self.params.output_layer) {
            if !self.menus.custom_layers().contains(&layer.as_str()) {
                warn!(%layer, "output layer not in file, using RGBA");
                self.params.output_layer = Plane::Rgba.name().to_string();
            }
        }

        if !self.params.colorspace_user_set {
            if let Some(name) = self.adapter.auto_detect_input(first, &path) {
                debug!(colorspace = %name, "detected input colorspace");
            }
        }
        self.params.colorspace = self.adapter.state().clone();

        if !self.params.premult_user_set {
            self.params.premult = premult_from_metadata(first, &self.mapping);
        }
        self.file_fps = first.get_float(attr::FRAMES_PER_SECOND);

        if self.params.proxy_file.is_some() && !self.params.custom_proxy_scale {
            self.detect_proxy_scale()?;
        }

        self.state = PipelineState::Ready;
        info!(
            file = %self.params.file,
            frames = %original,
            channels = first.channels(),
            components = %self.params.output_components,
            premult = ?self.params.premult,
            colorspace = %self.adapter.input(),
            "reader configured"
        );
        Ok(())
    }

    fn apply_time_settings(&mut self) {
        self.resolver.set_mapping(self.params.time);
        self.resolver.set_missing_frame_policy(self.params.missing_frame);
    }

    /// Keeps the default mapping (and its single-channel role) while the
    /// selection matches it.
    fn update_mapping(&mut self) {
        self.mapping = if self.selection == self.menus.selection_for(&self.default_mapping) {
            self.default_mapping.clone()
        } else {
            self.menus.mapping_from_selection(self.selection)
        };
        self.params.channel_names = self.menus.names_of(self.selection);
        self.params.channel_indices = self.selection;
    }

    fn detect_proxy_scale(&mut self) -> IoResult<()> {
        let range = self.resolver.frame_range()?;
        let resolved = self.resolver.resolve(range.first() as f64)?;
        let (Some(path), Some(proxy)) = (resolved.path, resolved.proxy_path) else {
            return Ok(());
        };
        let original = self.load_specs(&path, resolved.stream_frame)?;
        let small = self.load_specs(&proxy, resolved.stream_frame)?;
        let (Some(o), Some(p)) = (original.first(), small.first()) else {
            return Ok(());
        };
        if o.full_width == 0 || o.full_height == 0 {
            return Ok(());
        }
        self.params.original_proxy_scale = [
            p.full_width as f64 / o.full_width as f64,
            p.full_height as f64 / o.full_height as f64,
        ];
        debug!(scale = ?self.params.original_proxy_scale, "proxy scale");
        Ok(())
    }

    fn load_specs(&self, path: &Path, stream_frame: Option<i32>) -> IoResult<Arc<[ImageSpec]>> {
        self.cache.get_or_load(path, |p| {
            let decoder = self.registry.decoder_for(p)?;
            match stream_frame {
                Some(frame) => Ok(decoder.open_frame(p, frame)?.specs().to_vec()),
                None => decoder.read_specs(p),
            }
        })
    }

    /// File to read and its resolution level, `None` for black.
    fn pick_file(&self, resolved: &Resolved, levels: u32) -> Option<(PathBuf, u32)> {
        if resolved.status == FrameStatus::Black {
            return None;
        }
        let path = resolved.path.clone()?;
        let render_scale = 0.5f64.powi(levels as i32);
        let [tx, ty] = self.params.proxy_threshold;
        match &resolved.proxy_path {
            Some(proxy) if render_scale <= tx && render_scale <= ty => {
                let scale = self.params.original_proxy_scale[0].max(f64::MIN_POSITIVE);
                let proxy_levels = (-scale.log2()).round().max(0.0) as u32;
                Some((proxy.clone(), proxy_levels))
            }
            _ => Some((path, 0)),
        }
    }

    fn mapping_for(&self, specs: &[ImageSpec], plane: &Plane) -> IoResult<ChannelMapping> {
        let mapping = match plane {
            Plane::Custom(_) => mapping_for_plane(specs, plane)?,
            color => ChannelMapping {
                plane: color.clone(),
                ..self.mapping.clone()
            },
        };
        for source in &mapping.sources {
            if let ChannelSource::Channel { sub_image, index } = *source {
                let present = specs.get(sub_image).is_some_and(|s| index < s.channels());
                if !present {
                    return Err(IoError::FormatMismatch(format!(
                        "channel {index} of sub-image {sub_image} not in frame"
                    )));
                }
            }
        }
        Ok(mapping)
    }
}

/// Premultiplication state a file's metadata implies.
fn premult_from_metadata(spec: &ImageSpec, mapping: &ChannelMapping) -> Premult {
    let has_alpha = mapping.working_slots().contains(&3)
        && !matches!(mapping.sources[3], ChannelSource::One | ChannelSource::Zero);
    if !has_alpha {
        Premult::Opaque
    } else if spec.get_int(attr::UNASSOCIATED_ALPHA).unwrap_or(0) != 0 {
        Premult::Unpremultiplied
    } else {
        Premult::Premultiplied
    }
}

/// Union of the host data windows of the sub-images `mapping` reads.
fn data_window_of(specs: &[ImageSpec], mapping: &ChannelMapping) -> Rect {
    let mut window: Option<Rect> = None;
    for source in &mapping.sources {
        if let ChannelSource::Channel { sub_image, .. } = *source {
            if let Some(spec) = specs.get(sub_image) {
                let w = spec.host_data_window();
                window = Some(window.map_or(w, |acc| acc.union(&w)));
            }
        }
    }
    window.unwrap_or_else(|| specs.first().map(ImageSpec::host_data_window).unwrap_or_default())
}

/// `rect` moved `levels` resolution levels down (positive) or up (negative).
fn rescale(rect: Rect, levels: i32) -> Rect {
    if levels >= 0 {
        rect.downscale(levels as u32)
    } else {
        rect.upscale(levels.unsigned_abs())
    }
}

/// Reads the mapped channels of `file_rect` into `working`.
///
/// Consecutive channels of one sub-image go through a single read.
fn read_working(
    input: &mut dyn ImageInput,
    mapping: &ChannelMapping,
    file_rect: Rect,
    working: &mut PixelBuffer,
) -> IoResult<()> {
    let slots = mapping.working_slots();
    let mut view = working.memory_view_mut(file_rect)?;
    let mut k = 0;
    while k < slots.len() {
        match mapping.sources[slots[k]] {
            ChannelSource::Channel { sub_image, index } => {
                let mut run = 1;
                while k + run < slots.len()
                    && mapping.sources[slots[k + run]]
                        == (ChannelSource::Channel {
                            sub_image,
                            index: index + run,
                        })
                {
                    run += 1;
                }
                let mut dst = view.component_view(k, run)?;
                input.read_region(sub_image, file_rect, index..index + run, &mut dst)?;
                k += run;
            }
            ChannelSource::One => {
                transfer::fill_constant(&mut view, file_rect, 1.0, &[k]);
                k += 1;
            }
            ChannelSource::Zero => k += 1,
        }
    }
    Ok(())
}

impl std::fmt::Debug for ReaderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPipeline")
            .field("file", &self.params.file)
            .field("state", &self.state())
            .field("mapping", &self.mapping)
            .finish()
    }
}
