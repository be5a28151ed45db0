//! CLI command implementations

pub mod extract;
pub mod info;
pub mod permute;
pub mod play;
pub mod recut;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result, bail};
use blink_cache::BudgetConfig;
use blink_core::{BitDepth, Header, PixelCoding};
use blink_cube::{BlinkRegistry, ContrastState, CubeSource, MultiFrameStack, RegistryConfig, StackEvent};
use blink_lut::{ColorTable, ColorTableId, ColorTableSet};
use blink_transfer::TransferFunction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::ContrastArgs;

/// JSON description of a raw cube file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeDescriptor {
    /// Data file, relative to the descriptor.
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    /// FITS BITPIX code.
    pub bitpix: i32,
    #[serde(default = "unit_scale")]
    pub bscale: f64,
    #[serde(default)]
    pub bzero: f64,
    #[serde(default)]
    pub blank: Option<i64>,
    #[serde(default)]
    pub data_offset: u64,
    /// Extra keywords, e.g. CTYPE1/CRVAL1 for calibration.
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default)]
    pub label: Option<String>,
}

fn unit_scale() -> f64 {
    1.0
}

impl CubeDescriptor {
    /// Loads a descriptor from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("Invalid cube descriptor: {}", path.display()))
    }

    /// Converts into a cube source, resolving the data path.
    pub fn into_source(self, descriptor: &Path) -> Result<CubeSource> {
        let bit_depth = BitDepth::from_bitpix(self.bitpix)?;
        let coding = PixelCoding::new(bit_depth)
            .with_scale(self.bscale, self.bzero)
            .with_blank(self.blank);
        let path = match descriptor.parent() {
            Some(dir) if self.path.is_relative() => dir.join(&self.path),
            _ => self.path.clone(),
        };
        let label = self.label.clone().unwrap_or_else(|| {
            descriptor
                .file_stem()
                .map_or_else(|| "cube".to_string(), |s| s.to_string_lossy().into_owned())
        });
        Ok(CubeSource {
            path,
            width: self.width,
            height: self.height,
            depth: self.depth,
            coding,
            data_offset: self.data_offset,
            header: Header::from_pairs(self.header),
            label,
        })
    }
}

/// Installs the log subscriber: `RUST_LOG` wins, otherwise warn (debug with -v).
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the registry from global options.
pub fn registry(mem_mb: Option<u64>, scratch: Option<&Path>) -> Result<BlinkRegistry> {
    let budget = match mem_mb {
        Some(mb) => BudgetConfig::with_limit(mb.saturating_mul(1024 * 1024)),
        None => BudgetConfig::from_env(),
    };
    let mut config = RegistryConfig::with_budget(budget);
    if let Some(dir) = scratch {
        config = config.scratch_dir(dir);
    }
    BlinkRegistry::new(config).context("Failed to set up cache")
}

/// Opens the cube a descriptor points at.
pub fn open(registry: &BlinkRegistry, descriptor: &Path) -> Result<MultiFrameStack> {
    let source = CubeDescriptor::load(descriptor)?.into_source(descriptor)?;
    let data = source.path.clone();
    let stack = registry
        .open_cube(source)
        .with_context(|| format!("Failed to open cube: {}", data.display()))?;
    info!(descriptor = %descriptor.display(), dims = ?stack.dims(), "cube opened");
    Ok(stack)
}

/// Resolves contrast options into a state and a color table.
pub fn contrast(args: &ContrastArgs) -> Result<(ContrastState, ColorTable)> {
    let transfer: TransferFunction = args.transfer.parse()?;
    let mut tables = ColorTableSet::new();
    let id = if Path::new(&args.lut).is_file() {
        tables.register(blink_lut::custom::read(&args.lut)?)
    } else {
        ColorTableId::from_name(&args.lut)
    };
    let state = ContrastState::new(args.min, args.max)
        .with_transfer(transfer)
        .with_color_table(id, args.reverse);
    let table = state.table(&tables)?;
    Ok((state, table))
}

/// Writes RGBA pixels as PNG.
pub fn write_png(path: &Path, width: usize, height: usize, rgba: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer
        .write_image_data(rgba)
        .with_context(|| format!("Failed to save: {}", path.display()))?;
    Ok(())
}

/// Renders every frame into `dir` as `frame_NNNN.png`.
pub fn write_frames(stack: &MultiFrameStack, table: &ColorTable, dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create: {}", dir.display()))?;
    let (width, height, depth) = stack.dims();
    for i in 0..depth {
        let path = dir.join(format!("frame_{i:04}.png"));
        write_png(&path, width, height, &stack.render_rgba(i, table)?)?;
        debug!(frame = i, path = %path.display(), "frame written");
        if verbose {
            println!("  {} -> {}", stack.frame_label(i)?, path.display());
        }
    }
    Ok(())
}

/// Prints queued stack events; fails on a failed or cancelled task.
pub fn drain_events(events: &Receiver<StackEvent>) -> Result<()> {
    for event in events.try_iter() {
        match event {
            StackEvent::Warning(message) => eprintln!("warning: {message}"),
            StackEvent::Failed { kind, error } => bail!("{kind} failed: {error}"),
            StackEvent::Cancelled { kind } => bail!("{kind} was cancelled"),
            StackEvent::Repaint { kind } => debug!(%kind, "repaint"),
        }
    }
    Ok(())
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    blink_cache::format_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults() {
        let desc: CubeDescriptor =
            serde_json::from_str(r#"{"path": "c.raw", "width": 2, "height": 3, "depth": 4, "bitpix": -32}"#).unwrap();
        assert_eq!(desc.bscale, 1.0);
        assert_eq!(desc.data_offset, 0);

        let source = desc.into_source(Path::new("/data/m31.json")).unwrap();
        assert_eq!(source.path, PathBuf::from("/data/c.raw"));
        assert_eq!(source.label, "m31");
        assert_eq!(source.coding.bit_depth, BitDepth::F32);
    }

    #[test]
    fn png_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.png");
        write_png(&path, 2, 1, &[0, 0, 0, 255, 255, 255, 255, 255]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn bad_bitpix_is_rejected() {
        let desc: CubeDescriptor =
            serde_json::from_str(r#"{"path": "c.raw", "width": 1, "height": 1, "depth": 1, "bitpix": 12}"#).unwrap();
        assert!(desc.into_source(Path::new("c.json")).is_err());
    }
}
