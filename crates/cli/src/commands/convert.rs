//! `convert` command implementation.
//!
//! Frames are decoded by a `ReadCache` and handed straight to a
//! `StreamingWriter`, so decoding, re-encoding and file output overlap.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cache::{ReadCache, StreamingWriter};
use config_loader::{CaptureProfile, ConfigLoader};
use container::{ContainerHeader, SensorData};
use observability::{CompressionAggregator, CompressionSummary};
use tracing::{debug, info, warn};

use crate::cli::ConvertArgs;
use crate::shutdown::stop_on_signal;

/// Statistics from a conversion run
#[derive(Debug, Clone)]
pub struct ConvertStats {
    pub output: PathBuf,
    pub frames_written: u64,
    pub bytes_written: u64,
    /// False if the run was stopped early
    pub completed: bool,
    pub duration: Duration,
    pub compression: CompressionSummary,
}

impl ConvertStats {
    /// Frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_written as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Conversion ===");
        println!("Output: {}", self.output.display());
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Frames written: {}", self.frames_written);
        println!("Bytes written: {}", self.bytes_written);
        println!("FPS: {:.2}", self.fps());
        if !self.completed {
            println!("Interrupted: remaining frames were not converted");
        }
        println!();
        print!("{}", self.compression);
    }
}

/// Execute the `convert` command
pub async fn run_convert(args: ConvertArgs) -> Result<()> {
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "Converting container"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let signal = stop_on_signal(Arc::clone(&stop));

    let result = tokio::task::spawn_blocking(move || convert(&args, &stop))
        .await
        .context("Convert task failed")?;
    signal.abort();

    let stats = result?;
    info!(
        frames = stats.frames_written,
        bytes = stats.bytes_written,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Conversion finished"
    );
    stats.print_summary();
    Ok(())
}

/// Re-encode `args.input` into `args.output`, checking `stop` between frames
pub fn convert(args: &ConvertArgs, stop: &AtomicBool) -> Result<ConvertStats> {
    let started = Instant::now();

    let input = SensorData::open(&args.input)
        .with_context(|| format!("Failed to load container from {}", args.input.display()))?;
    let profile = output_profile(args, input.header()?)?;
    let template = profile
        .to_sensor_data()
        .context("Invalid output configuration")?;

    if input.num_imu_frames() > 0 {
        warn!(
            imu_frames = input.num_imu_frames(),
            "IMU samples are not carried over by the streaming writer"
        );
    }

    let mut reader = ReadCache::spawn(&input, profile.cache.read_capacity)
        .context("Failed to start read cache")?;
    let mut writer = StreamingWriter::create(
        &template,
        &args.output,
        profile.cache.write_capacity,
        args.overwrite,
    )
    .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let mut completed = true;
    while let Some(frame) = reader.get_next().context("Failed to decode frame")? {
        if stop.load(Ordering::Relaxed) {
            completed = false;
            break;
        }
        debug!(index = frame.index, "frame decoded");
        writer
            .write_next_and_free(
                frame.color,
                frame.depth,
                frame.camera_to_world,
                frame.timestamp_color,
                frame.timestamp_depth,
            )
            .with_context(|| format!("Failed to write frame {}", frame.index))?;
    }
    reader.close().context("Failed to stop read cache")?;

    let summary = writer.close().context("Failed to finalize output")?;
    let compression = compression_summary(&summary.path)?;

    Ok(ConvertStats {
        output: summary.path,
        frames_written: summary.frames,
        bytes_written: summary.bytes,
        completed,
        duration: started.elapsed(),
        compression,
    })
}

/// Output profile: the input's own parameters unless a profile file is
/// given, then command-line overrides on top
fn output_profile(args: &ConvertArgs, input: &ContainerHeader) -> Result<CaptureProfile> {
    let mut profile = match &args.profile {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("Failed to load profile from {}", path.display()))?,
        None => CaptureProfile::from_header(input),
    };

    if let Some(color) = args.color {
        profile.color.compression = color.into();
    }
    if let Some(depth) = args.depth {
        profile.depth.compression = depth.into();
    }
    if let Some(capacity) = args.read_cache {
        profile.cache.read_capacity = capacity;
    }
    if let Some(capacity) = args.write_cache {
        profile.cache.write_capacity = capacity;
    }
    ConfigLoader::validate(&profile).context("Invalid output configuration")?;

    if let Some(diff) = profile.format().mismatch(&input.format) {
        let dims_differ = (profile.color.width, profile.color.height)
            != (input.format.color_width, input.format.color_height)
            || (profile.depth.width, profile.depth.height)
                != (input.format.depth_width, input.format.depth_height);
        if dims_differ {
            bail!("Output dimensions must match the input, frames are not resized: {diff}");
        }
        info!(changes = %diff, "Re-encoding with new codecs");
    }
    Ok(profile)
}

/// Compression ratios of a finished container
fn compression_summary(path: &std::path::Path) -> Result<CompressionSummary> {
    let output = SensorData::open(path)
        .with_context(|| format!("Failed to reload {}", path.display()))?;
    let format = output.format()?;
    let raw_color = format.color_pixels() * 3;
    let raw_depth = format.depth_pixels() * 2;

    let mut aggregator = CompressionAggregator::new();
    for frame in output.frames() {
        aggregator.update(
            (raw_color, frame.color_bytes().len()),
            (raw_depth, frame.depth_bytes().len()),
        );
    }
    Ok(aggregator.summary())
}
