//! Cube info command.
//!
//! Shows dimensions, encoding, calibration and the default cut levels.

use std::path::Path;

use anyhow::Result;
use blink_cube::{BlinkRegistry, MultiFrameStack};
use serde_json::json;

use crate::InfoArgs;

/// Runs the info command.
pub fn run(args: InfoArgs, registry: &BlinkRegistry, verbose: bool) -> Result<()> {
    for path in &args.input {
        let stack = super::open(registry, path)?;
        if args.json {
            print_json(&args, path, &stack)?;
        } else {
            print_text(&args, path, &stack, verbose);
        }
        if args.input.len() > 1 {
            println!();
        }
    }
    if verbose {
        println!("Budget: {}", registry.report());
    }
    Ok(())
}

fn print_text(args: &InfoArgs, path: &Path, stack: &MultiFrameStack, verbose: bool) {
    let (width, height, depth) = stack.dims();
    let coding = stack.coding();
    let contrast = stack.contrast();
    let slice = (width * height * coding.bytes_per_pixel()) as u64;

    println!("{}", path.display());
    println!("  Label:      {}", stack.label());
    println!("  Dimensions: {width}x{height}x{depth}");
    println!("  Encoding:   {} (BITPIX {})", coding.bit_depth, coding.bit_depth.bitpix());
    println!("  Slice size: {}", super::format_size(slice));
    if coding.bscale != 1.0 || coding.bzero != 0.0 {
        println!("  Scaling:    BSCALE={} BZERO={}", coding.bscale, coding.bzero);
    }
    if let Some(blank) = coding.blank {
        println!("  Blank:      {blank}");
    }
    println!("  Autocut:    {:.6} .. {:.6}", contrast.cut_min, contrast.cut_max);
    match stack.wcs() {
        Some(wcs) => println!(
            "  WCS:        RA={:.6} Dec={:.6}, {:.3}\"/px",
            wcs.crval.0,
            wcs.crval.1,
            wcs.pixel_scale_arcsec()
        ),
        None => println!("  WCS:        none"),
    }

    if args.all || verbose {
        println!("  Header:");
        for (key, value) in stack.header().iter() {
            println!("    {key:<8} = {value}");
        }
    }
}

fn print_json(args: &InfoArgs, path: &Path, stack: &MultiFrameStack) -> Result<()> {
    let (width, height, depth) = stack.dims();
    let mut info = json!({
        "file": path.display().to_string(),
        "label": stack.label(),
        "width": width,
        "height": height,
        "depth": depth,
        "coding": stack.coding(),
        "contrast": stack.contrast(),
        "wcs": stack.wcs(),
    });
    if args.all {
        let header: serde_json::Map<String, serde_json::Value> = stack
            .header()
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        info["header"] = serde_json::Value::Object(header);
    }
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
