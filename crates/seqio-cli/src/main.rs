//! seqio - image sequence inspection and conversion
//!
//! Drives the reader and writer pipelines from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "seqio")]
#[command(author, version, about = "Image sequence inspection and conversion")]
#[command(long_about = "
Reads and writes numbered image sequences the way a compositing host does:
frame mapping with boundary policies, channel and layer selection, color
management and multi-part output.

The color configuration comes from SEQIO_COLOR_CONFIG: a YAML file path or
one of the built-in names nuke-default, aces, spi. Defaults to nuke-default.

Examples:
  seqio info plate.####.exr             # Headers, frame range, colorspace
  seqio layers render.0001.exr          # Channel menu and custom layers
  seqio resolve plate.####.exr 0 50 --offset 10 --after loop
  seqio convert plate.####.exr out.####.png -d 16
  seqio convert beauty.%V.####.exr stereo.####.exr --views left,right --split views
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for debug logging)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show headers, frame range and detected color settings
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// List the channel menu and custom layers
    #[command(visible_alias = "l")]
    Layers(LayersArgs),

    /// Map host times to frame files
    #[command(visible_alias = "r")]
    Resolve(ResolveArgs),

    /// Read a sequence and write it in another format
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),
}

/// Frame mapping options shared by the reading commands.
#[derive(Args, Clone, Default)]
struct TimeArgs {
    /// Host time = frame + OFFSET
    #[arg(long, allow_hyphen_values = true, conflicts_with = "starting_time")]
    offset: Option<i32>,

    /// Host time at which the first frame plays
    #[arg(long, allow_hyphen_values = true)]
    starting_time: Option<i32>,

    /// Policy for times before the range
    #[arg(long, value_enum)]
    before: Option<BoundaryArg>,

    /// Policy for times after the range
    #[arg(long, value_enum)]
    after: Option<BoundaryArg>,

    /// Policy for absent frames inside the range
    #[arg(long, value_enum)]
    missing: Option<MissingArg>,

    /// Override the frame range ("first-last" or a single frame)
    #[arg(long)]
    frames: Option<String>,
}

#[derive(Args)]
struct InfoArgs {
    /// File or sequence pattern(s)
    #[arg(required = true)]
    input: Vec<String>,

    /// Show all attributes
    #[arg(short, long)]
    all: bool,
}

#[derive(Args)]
struct LayersArgs {
    /// File or sequence pattern(s)
    #[arg(required = true)]
    input: Vec<String>,
}

#[derive(Args)]
struct ResolveArgs {
    /// File or sequence pattern
    input: String,

    /// Host times to resolve
    #[arg(required = true, allow_hyphen_values = true)]
    times: Vec<f64>,

    /// Proxy file or pattern
    #[arg(long)]
    proxy: Option<String>,

    #[command(flatten)]
    time: TimeArgs,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input file or sequence pattern
    input: String,

    /// Output file or pattern (may contain %V for views)
    output: String,

    /// Output bit depth (8, 10, 12, 16, 32, half, float)
    #[arg(short = 'd', long)]
    depth: Option<String>,

    /// Compression name passed to the encoder
    #[arg(short = 'c', long)]
    compression: Option<String>,

    /// Lossy quality (0-100)
    #[arg(short = 'q', long)]
    quality: Option<i32>,

    /// Tile edge in pixels (0 = scanlines)
    #[arg(long, default_value = "0")]
    tile: u32,

    /// Input colorspace (default: detected)
    #[arg(long)]
    from: Option<String>,

    /// Output colorspace (default: derived from the output format)
    #[arg(long)]
    to: Option<String>,

    /// Layer to write: All, RGBA, RGB, Alpha or a layer name
    #[arg(short = 'l', long)]
    layer: Option<String>,

    /// Comma-separated views to write
    #[arg(long, value_delimiter = ',')]
    views: Vec<String>,

    /// How views and layers are spread over parts
    #[arg(long, value_enum, default_value = "single")]
    split: SplitArg,

    /// Reader parameters to start from (YAML)
    #[arg(long)]
    reader_params: Option<PathBuf>,

    /// Writer parameters to start from (YAML)
    #[arg(long)]
    writer_params: Option<PathBuf>,

    /// Directory to save the final reader.yaml and writer.yaml into
    #[arg(long)]
    save_params: Option<PathBuf>,

    #[command(flatten)]
    time: TimeArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Hold,
    Loop,
    Black,
    Error,
}

#[derive(Clone, Copy, ValueEnum)]
enum MissingArg {
    Previous,
    Next,
    Nearest,
    Error,
    Black,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SplitArg {
    Single,
    Views,
    ViewsLayers,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Layers(args) => commands::layers::run(args),
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Convert(args) => commands::convert::run(args, cli.verbose),
    }
}
