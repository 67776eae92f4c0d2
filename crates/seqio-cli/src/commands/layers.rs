//! Channel menu listing.
//!
//! Shows what a host would offer for each RGBA slot and which layers can be
//! requested as planes of their own.

use crate::{LayersArgs, TimeArgs};
use anyhow::Result;
use seqio_io::{Plane, ReaderPipeline};

use super::Session;

pub fn run(args: LayersArgs) -> Result<()> {
    let session = Session::new()?;
    for (i, input) in args.input.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let reader = session.open(input, &TimeArgs::default())?;
        print_layers(&reader, input)?;
    }
    Ok(())
}

fn print_layers(reader: &ReaderPipeline, input: &str) -> Result<()> {
    let menus = reader.menus();
    println!("{input}");

    let selection = menus.selection_for(reader.mapping());
    let names = menus.names_of(selection);
    println!("  Default mapping: R={} G={} B={} A={}", names[0], names[1], names[2], names[3]);

    println!("  Channels:");
    for option in menus.options() {
        println!("    {option}");
    }

    let layers = menus.custom_layers();
    if !layers.is_empty() {
        println!("  Layers:");
        for layer in layers {
            let channels = reader.plane_channel_names(&Plane::Custom(layer.to_string()))?;
            println!("    {layer} ({})", channels.join(", "));
        }
    }
    Ok(())
}
