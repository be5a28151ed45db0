//! Extract command: print physical voxel values.

use anyhow::Result;
use blink_cube::BlinkRegistry;

use crate::ExtractArgs;

/// Runs the extract command.
pub fn run(args: ExtractArgs, registry: &BlinkRegistry) -> Result<()> {
    let stack = super::open(registry, &args.input)?;
    let cube = stack.extract_subvolume(args.x, args.y, args.z, args.w, args.h, args.d)?;

    if args.json {
        let frames: Vec<Vec<Vec<f64>>> = cube
            .values
            .chunks(cube.width * cube.height)
            .map(|plane| plane.chunks(cube.width).map(<[f64]>::to_vec).collect())
            .collect();
        println!("{}", serde_json::to_string(&frames)?);
        return Ok(());
    }

    for (k, plane) in cube.values.chunks(cube.width * cube.height).enumerate() {
        println!("frame {} ({})", args.z + k, stack.frame_label(args.z + k)?);
        for row in plane.chunks(cube.width) {
            let line: Vec<String> = row.iter().map(|v| format!("{v:>12.4}")).collect();
            println!("{}", line.join(" "));
        }
    }
    Ok(())
}
