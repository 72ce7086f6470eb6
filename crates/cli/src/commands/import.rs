//! `import` command implementation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use cache::resolve_output_path;
use container::import::{import_images_until, ImportOptions};
use tracing::{info, warn};

use crate::cli::ImportArgs;
use crate::shutdown::stop_on_signal;

/// Execute the `import` command
///
/// Ctrl+C stops reading between frames; the frames read so far are saved.
pub async fn run_import(args: ImportArgs) -> Result<()> {
    info!(
        in_dir = %args.in_dir.display(),
        output = %args.output.display(),
        "Importing images"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let signal = stop_on_signal(Arc::clone(&stop));

    let task_args = args.clone();
    let result = tokio::task::spawn_blocking(move || {
        let options = ImportOptions {
            basename: task_args.basename.clone(),
            depth_compression: task_args.depth.into(),
        };
        let (data, summary) = import_images_until(&task_args.in_dir, &options, &stop)
            .with_context(|| format!("Failed to import from {}", task_args.in_dir.display()))?;

        let output = resolve_output_path(&task_args.output, task_args.overwrite);
        data.save_to_file(&output)
            .with_context(|| format!("Failed to save {}", output.display()))?;
        anyhow::Ok((output, summary))
    })
    .await
    .context("Import task failed")?;
    signal.abort();

    let (output, summary) = result?;
    if summary.completed {
        info!(
            frames = summary.frames_read,
            bytes = summary.bytes_read,
            "Import completed"
        );
    } else {
        warn!(
            frames = summary.frames_read,
            "Import interrupted, remaining frames were not read"
        );
    }
    println!(
        "Imported {} frames from {} into {}",
        summary.frames_read,
        args.in_dir.display(),
        output.display()
    );
    Ok(())
}
