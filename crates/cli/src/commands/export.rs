//! `export` command implementation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use container::export::{export_images_until, ExportOptions};
use container::SensorData;
use tracing::{info, warn};

use crate::cli::ExportArgs;
use crate::shutdown::stop_on_signal;

/// Execute the `export` command
///
/// Export runs on a blocking task; Ctrl+C stops it between frames.
pub async fn run_export(args: ExportArgs) -> Result<()> {
    info!(
        file = %args.file.display(),
        out_dir = %args.out_dir.display(),
        "Exporting container"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let signal = stop_on_signal(Arc::clone(&stop));

    let task_args = args.clone();
    let result = tokio::task::spawn_blocking(move || {
        let data = SensorData::open(&task_args.file).with_context(|| {
            format!("Failed to load container from {}", task_args.file.display())
        })?;
        let options = ExportOptions {
            basename: task_args.basename.clone(),
        };
        export_images_until(&data, &task_args.out_dir, &options, &stop).with_context(|| {
            format!("Failed to export into {}", task_args.out_dir.display())
        })
    })
    .await
    .context("Export task failed")?;
    signal.abort();

    let summary = result?;
    if summary.completed {
        info!(
            frames = summary.frames_written,
            bytes = summary.bytes_written,
            "Export completed"
        );
    } else {
        warn!(
            frames = summary.frames_written,
            "Export interrupted, remaining frames were not written"
        );
    }
    println!(
        "Exported {} frames ({} bytes) to {}",
        summary.frames_written,
        summary.bytes_written,
        args.out_dir.display()
    );
    Ok(())
}
