//! Blink command: cycle frames the way the viewer does.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use blink_cube::{BlinkRegistry, PlaybackMode};
use blink_lut::{ColorTableId, ColorTableSet};

use crate::BlinkArgs;

/// Runs the blink command.
pub fn run(args: BlinkArgs, registry: &BlinkRegistry, verbose: bool) -> Result<()> {
    let stack = super::open(registry, &args.input)?;
    let delay = Duration::from_millis(args.delay_ms);
    stack.set_playback_mode(PlaybackMode::Blinking { delay });
    let table = ColorTableSet::new().resolve(&ColorTableId::Gray, false)?;
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }

    let depth = stack.depth();
    let mut shown = 0usize;
    for _ in 0..args.cycles {
        for _ in 0..depth {
            let index = stack.active_frame();
            stack.activate_frame(index)?;
            let display = stack.active_display();
            let mean = display.iter().map(|&b| b as f64).sum::<f64>() / display.len().max(1) as f64;
            println!("[{index:>4}] {:<32} mean {mean:6.1}", stack.frame_label(index)?);
            if let Some(dir) = &args.output {
                let path = dir.join(format!("blink_{shown:05}.png"));
                super::write_png(&path, stack.width(), stack.height(), &table.to_rgba(&display))?;
            }
            shown += 1;
            stack.next_frame();
            thread::sleep(delay);
        }
    }

    stack.set_playback_mode(PlaybackMode::Paused);
    if verbose {
        let stats = stack.stats();
        println!(
            "{shown} frames shown, {} loads, {} resident",
            stats.loads,
            super::format_size(stats.resident_bytes)
        );
    }
    Ok(())
}
