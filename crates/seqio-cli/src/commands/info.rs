//! Sequence info command.
//!
//! Prints the frame range, the sub-image headers of the first frame and the
//! color settings the reader derived from them.

use crate::{InfoArgs, TimeArgs};
use anyhow::Result;
use seqio_core::ImageSpec;
use seqio_io::ReaderPipeline;

use super::Session;

pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    let session = Session::new()?;
    for (i, input) in args.input.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let reader = session.open(input, &TimeArgs::default())?;
        print_text(&reader, input, args.all || verbose > 0);
    }
    Ok(())
}

fn print_text(reader: &ReaderPipeline, input: &str, all: bool) {
    let params = reader.params();
    println!("{input}");
    if let Ok(range) = reader.resolver().original_range() {
        println!("  Frames:      {range}");
    }
    if let Ok(Some(frames)) = reader.resolver().discovered_frames() {
        let expected = frames.range().map(|r| r.len()).unwrap_or(0);
        if frames.len() < expected {
            println!("  On disk:     {frames}");
        }
    }
    println!("  Frame rate:  {}", reader.frame_rate());
    println!("  Colorspace:  {}", reader.adapter().input());
    println!("  Premult:     {:?}", params.premult);
    if let Some(message) = reader.adapter().message() {
        println!("  Color note:  {message}");
    }

    for (index, spec) in reader.specs().iter().enumerate() {
        print_spec(index, spec, all);
    }
}

fn print_spec(index: usize, spec: &ImageSpec, all: bool) {
    let name = spec
        .get_string(seqio_core::attr::SUBIMAGE_NAME)
        .unwrap_or("(unnamed)");
    println!("  Part {index}: {name}");
    println!("    Resolution:  {}x{}", spec.full_width, spec.full_height);
    if spec.data_window() != spec.display_window() {
        println!("    Data window: {}", spec.data_window());
    }
    println!("    Format:      {}", spec.format);
    println!("    Channels:    {}", spec.channel_names.join(", "));
    if spec.is_tiled() {
        println!("    Tiles:       {}x{}", spec.tile_width, spec.tile_height);
    }
    if all {
        for (key, value) in &spec.attributes {
            println!("    {key}: {value}");
        }
    }
}
