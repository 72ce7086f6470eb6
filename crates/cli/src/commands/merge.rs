//! `merge` command implementation.

use anyhow::{Context, Result};
use container::{ImuMerge, SensorData};
use tracing::info;

use crate::cli::MergeArgs;

/// Execute the `merge` command
pub fn run_merge(args: &MergeArgs) -> Result<()> {
    let imu = if args.with_imu {
        ImuMerge::Merge
    } else {
        ImuMerge::Skip
    };

    let (first, rest) = args
        .inputs
        .split_first()
        .context("At least one input container is required")?;

    let mut merged = SensorData::open(first)
        .with_context(|| format!("Failed to load container from {}", first.display()))?;

    for path in rest {
        let other = SensorData::open(path)
            .with_context(|| format!("Failed to load container from {}", path.display()))?;
        merged
            .append(&other, imu)
            .with_context(|| format!("Cannot merge {}", path.display()))?;
        info!(
            file = %path.display(),
            frames = merged.num_frames(),
            "Container appended"
        );
    }

    merged
        .save_to_file(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;

    println!(
        "Merged {} containers into {} ({} frames, {} IMU samples)",
        args.inputs.len(),
        args.output.display(),
        merged.num_frames(),
        merged.num_imu_frames()
    );
    Ok(())
}
