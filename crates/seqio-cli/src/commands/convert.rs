//! Sequence conversion.
//!
//! Feeds a [`ReaderPipeline`] into a [`WriterPipeline`] frame by frame. Frames
//! are written in parallel; both pipelines are shared read-only between the
//! worker threads.

use crate::{ConvertArgs, SplitArg};
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use seqio_color::Direction;
use seqio_core::BitDepth;
use seqio_io::params::PartsSplitting;
use seqio_io::{Persist, ReaderParams, ReaderPipeline, WriterParams, WriterPipeline};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use super::{apply_time_args, Session};

pub fn run(args: ConvertArgs, verbose: u8) -> Result<()> {
    let session = Session::new()?;
    let reader = open_reader(&session, &args)?;
    let writer = open_writer(&session, &args, &reader)?;

    let range = writer
        .frame_range(&reader)
        .with_context(|| format!("No frames to write from {}", args.input))?;
    let frames: Vec<i32> = range.iter().collect();
    info!(frames = %range, output = %args.output, "converting");

    let start = Instant::now();
    let written: Vec<Vec<PathBuf>> = frames
        .par_iter()
        .map(|&frame| {
            writer
                .write_frame(&reader, frame as f64)
                .with_context(|| format!("Failed to write frame {frame}"))
        })
        .collect::<Result<_>>()?;

    let files: Vec<&PathBuf> = written.iter().flatten().collect();
    if verbose > 0 {
        for path in &files {
            println!("{}", path.display());
        }
    }
    println!(
        "Wrote {} file(s) for frames {} in {:.2}s",
        files.len(),
        range,
        start.elapsed().as_secs_f64()
    );

    if let Some(dir) = &args.save_params {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create: {}", dir.display()))?;
        reader.params().save(&dir.join("reader.yaml"))?;
        writer.params().save(&dir.join("writer.yaml"))?;
    }
    Ok(())
}

fn open_reader(session: &Session, args: &ConvertArgs) -> Result<ReaderPipeline> {
    let mut reader = match &args.reader_params {
        Some(path) => {
            let mut params = ReaderParams::load(path)
                .with_context(|| format!("Failed to load reader params: {}", path.display()))?;
            params.file = args.input.clone();
            ReaderPipeline::from_params(
                session.registry.clone(),
                session.cache.clone(),
                session.engine.clone(),
                params,
            )
            .with_context(|| format!("Failed to open: {}", args.input))?
        }
        None => {
            let mut reader = session.reader();
            reader
                .set_file(&args.input)
                .with_context(|| format!("Failed to open: {}", args.input))?;
            reader
        }
    };
    apply_time_args(&mut reader, &args.time)?;
    if let Some(from) = &args.from {
        reader.set_colorspace(Direction::Input, from)?;
    }
    Ok(reader)
}

fn open_writer(session: &Session, args: &ConvertArgs, reader: &ReaderPipeline) -> Result<WriterPipeline> {
    let mut writer = match &args.writer_params {
        Some(path) => {
            let params = WriterParams::load(path)
                .with_context(|| format!("Failed to load writer params: {}", path.display()))?;
            WriterPipeline::from_params(
                session.registry.clone(),
                session.cache.clone(),
                session.engine.clone(),
                params,
            )?
        }
        None => WriterPipeline::new(session.registry.clone(), session.cache.clone(), session.engine.clone()),
    };
    if let Some(depth) = &args.depth {
        let Some(depth) = BitDepth::parse(depth) else {
            bail!("Unknown bit depth: {depth}");
        };
        writer.set_bit_depth(depth);
    }
    if let Some(to) = &args.to {
        writer.set_colorspace(Direction::Output, to)?;
    }
    writer
        .set_file(&args.output)
        .with_context(|| format!("Failed to set output: {}", args.output))?;

    if args.compression.is_some() {
        writer.set_compression(args.compression.clone());
    }
    if args.quality.is_some() {
        writer.set_quality(args.quality);
    }
    if args.tile > 0 {
        writer.set_tile_size(args.tile);
    }
    if args.writer_params.is_none() || args.split != SplitArg::Single {
        writer.set_parts_splitting(args.split.into());
    }
    if !args.views.is_empty() {
        writer.set_views(args.views.clone());
    }

    match &args.layer {
        Some(layer) => {
            let options = writer.output_layer_options(reader);
            if !options.contains(layer) {
                bail!("Layer {layer} not available, choose from: {}", options.join(", "));
            }
            writer.set_output_layer(layer);
        }
        None => {
            writer.restore_output_layer(reader);
        }
    }
    Ok(writer)
}

impl From<SplitArg> for PartsSplitting {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Single => Self::SinglePart,
            SplitArg::Views => Self::SplitViews,
            SplitArg::ViewsLayers => Self::SplitViewsLayers,
        }
    }
}
