//! `point-cloud` command implementation.

use anyhow::{Context, Result};
use container::point_cloud::save_point_cloud;
use container::SensorData;
use tracing::info;

use crate::cli::PointCloudArgs;

/// Execute the `point-cloud` command
pub fn run_point_cloud(args: &PointCloudArgs) -> Result<()> {
    let data = SensorData::open(&args.file)
        .with_context(|| format!("Failed to load container from {}", args.file.display()))?;

    // a single frame unless --to is given
    let to = args.to.unwrap_or(args.from + 1);
    let points = save_point_cloud(&data, &args.output, args.from..to)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(frames = to.saturating_sub(args.from), points, "Point cloud written");
    println!(
        "Wrote {} points from frames {}..{} to {}",
        points,
        args.from,
        to,
        args.output.display()
    );
    Ok(())
}
