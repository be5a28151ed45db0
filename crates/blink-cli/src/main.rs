//! blink - inspect, recut, permute and play raw image cubes
//!
//! A cube is a file of consecutive coded slices described by a small JSON
//! descriptor (see `commands::CubeDescriptor`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(name = "blink")]
#[command(author, version, about = "Blink and cube browsing for astronomical image stacks")]
#[command(long_about = "
Operates on raw cube files described by a JSON descriptor:

  {\"path\": \"m31.raw\", \"width\": 512, \"height\": 512, \"depth\": 40, \"bitpix\": 16}

Examples:
  blink info m31.json                         # Dimensions, encoding, calibration
  blink recut m31.json -o out/ --autocut      # Render every frame to PNG
  blink recut m31.json -o f3.png --frame 3 --min 100 --max 900 -t asinh
  blink permute m31.json width-depth -o out/  # Transpose and render
  blink extract m31.json 10 10 0 4 4 2        # Print physical values
  blink blink m31.json --cycles 3             # Cycle frames like the viewer
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// RAM budget for original pixels in MB (default: from environment)
    #[arg(long, global = true)]
    mem_mb: Option<u64>,

    /// Directory for the scratch cache file
    #[arg(long, global = true)]
    scratch: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cube information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Recompute display pixels and write PNGs
    #[command(visible_alias = "r")]
    Recut(RecutArgs),

    /// Swap an image axis with the frame axis
    #[command(visible_alias = "p")]
    Permute(PermuteArgs),

    /// Print physical values of a box of voxels
    #[command(visible_alias = "x")]
    Extract(ExtractArgs),

    /// Cycle through frames
    Blink(BlinkArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Cube descriptor(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Show header keywords
    #[arg(short, long)]
    all: bool,
}

/// Contrast options shared by rendering commands.
#[derive(Args, Clone)]
struct ContrastArgs {
    /// Lower cut (physical units)
    #[arg(long, default_value = "0")]
    min: f64,

    /// Upper cut (physical units)
    #[arg(long, default_value = "1")]
    max: f64,

    /// Compute cuts from the data
    #[arg(short, long)]
    autocut: bool,

    /// Transfer function: linear, log, sqrt, squared, asinh, histeq
    #[arg(short, long, default_value = "linear")]
    transfer: String,

    /// Color table name, or path to a custom table
    #[arg(short, long, default_value = "gray")]
    lut: String,

    /// Reverse video
    #[arg(long)]
    reverse: bool,
}

#[derive(Args)]
struct RecutArgs {
    /// Cube descriptor
    input: PathBuf,

    /// Output PNG (with --frame) or directory
    #[arg(short, long)]
    output: PathBuf,

    /// Recut a single frame with its own cuts
    #[arg(short, long)]
    frame: Option<usize>,

    #[command(flatten)]
    contrast: ContrastArgs,
}

#[derive(Args)]
struct PermuteArgs {
    /// Cube descriptor
    input: PathBuf,

    /// Target layout: natural, width-depth, height-depth
    layout: String,

    /// Output directory for the permuted frames
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    contrast: ContrastArgs,
}

#[derive(Args)]
struct ExtractArgs {
    /// Cube descriptor
    input: PathBuf,
    /// Box origin x (from the left)
    x: usize,
    /// Box origin y (from the top)
    y: usize,
    /// First frame
    z: usize,
    /// Box width
    #[arg(default_value = "1")]
    w: usize,
    /// Box height
    #[arg(default_value = "1")]
    h: usize,
    /// Number of frames
    #[arg(default_value = "1")]
    d: usize,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BlinkArgs {
    /// Cube descriptor
    input: PathBuf,

    /// Delay between frames in milliseconds
    #[arg(short, long, default_value = "400")]
    delay_ms: u64,

    /// Number of full cycles
    #[arg(short, long, default_value = "1")]
    cycles: usize,

    /// Write each displayed frame as PNG into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let registry = commands::registry(cli.mem_mb, cli.scratch.as_deref())?;
    debug!(threads = rayon::current_num_threads(), budget = %registry.report(), "registry ready");

    match cli.command {
        Commands::Info(args) => commands::info::run(args, &registry, cli.verbose),
        Commands::Recut(args) => commands::recut::run(args, &registry, cli.verbose),
        Commands::Permute(args) => commands::permute::run(args, &registry, cli.verbose),
        Commands::Extract(args) => commands::extract::run(args, &registry),
        Commands::Blink(args) => commands::play::run(args, &registry, cli.verbose),
    }
}
