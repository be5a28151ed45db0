//! Recut command: recompute display pixels and render them.

use anyhow::Result;
use blink_cube::{BlinkRegistry, TaskRequest};

use crate::RecutArgs;

/// Runs the recut command.
///
/// With `--frame` only that frame is recut and written to `--output`;
/// otherwise the whole stack is recut in the background and every frame is
/// written into the `--output` directory.
pub fn run(args: RecutArgs, registry: &BlinkRegistry, verbose: bool) -> Result<()> {
    let stack = super::open(registry, &args.input)?;
    let (state, table) = super::contrast(&args.contrast)?;
    stack.set_contrast(state);
    let events = stack.subscribe();
    let c = &args.contrast;

    match args.frame {
        Some(index) => {
            let display = stack.recut_frame(index, c.min, c.max, c.autocut)?;
            super::write_png(&args.output, stack.width(), stack.height(), &table.to_rgba(&display))?;
            super::drain_events(&events)?;
            println!("{} -> {}", stack.frame_label(index)?, args.output.display());
        }
        None => {
            stack.submit(TaskRequest::RecutStack {
                min: c.min,
                max: c.max,
                autocut: c.autocut,
            })?;
            stack.wait_task();
            super::drain_events(&events)?;
            super::write_frames(&stack, &table, &args.output, verbose)?;
            println!("{} frames -> {}", stack.depth(), args.output.display());
        }
    }

    let applied = stack.contrast();
    println!(
        "Cuts: {:.6} .. {:.6} ({})",
        applied.cut_min, applied.cut_max, applied.transfer
    );
    Ok(())
}
