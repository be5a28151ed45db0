//! Permute command: swap an image axis with the frame axis.

use anyhow::{Context, Result};
use blink_cube::{AxisPermutation, BlinkRegistry, TaskRequest};

use crate::PermuteArgs;

/// Runs the permute command.
pub fn run(args: PermuteArgs, registry: &BlinkRegistry, verbose: bool) -> Result<()> {
    let target: AxisPermutation = args
        .layout
        .parse()
        .with_context(|| format!("Invalid layout: {}", args.layout))?;
    let stack = super::open(registry, &args.input)?;
    let (state, table) = super::contrast(&args.contrast)?;
    stack.set_contrast(state);
    let events = stack.subscribe();

    let c = &args.contrast;
    stack.recut_stack(c.min, c.max, c.autocut)?;
    let before = stack.dims();

    stack.submit(TaskRequest::PermuteAxes(target))?;
    stack.wait_task();
    super::drain_events(&events)?;

    let (width, height, depth) = stack.dims();
    println!(
        "{}: {}x{}x{} -> {width}x{height}x{depth} ({})",
        stack.label(),
        before.0,
        before.1,
        before.2,
        stack.permutation()
    );
    if stack.is_degraded() {
        println!("  original pixels dropped, display pixels only");
    }
    if verbose {
        println!("  calibration: {}", if stack.wcs().is_some() { "kept" } else { "none" });
    }

    if let Some(dir) = &args.output {
        super::write_frames(&stack, &table, dir, verbose)?;
        println!("{depth} frames -> {}", dir.display());
    }
    Ok(())
}
