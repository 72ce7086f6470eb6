//! `info` command implementation.

use anyhow::{Context, Result};
use container::SensorData;
use contracts::{mat4_to_row_major, Mat4};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Container info for JSON output
#[derive(Serialize)]
struct ContainerInfo {
    path: String,
    version: u32,
    sensor_name: String,
    color: StreamInfo,
    depth: StreamInfo,
    depth_shift: f32,
    frame_count: usize,
    imu_frame_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    imu_time_range: Option<(u64, u64)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    frames: Vec<FrameInfo>,
}

#[derive(Serialize)]
struct StreamInfo {
    width: u32,
    height: u32,
    compression: String,
    intrinsic: [f32; 16],
    extrinsic: [f32; 16],
}

#[derive(Serialize)]
struct FrameInfo {
    index: usize,
    color_bytes: u64,
    depth_bytes: u64,
    timestamp_color: u64,
    timestamp_depth: u64,
    has_pose: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(file = %args.file.display(), "Loading container info");

    let data = SensorData::open(&args.file)
        .with_context(|| format!("Failed to load container from {}", args.file.display()))?;

    if args.json {
        let info = build_container_info(&data, args)?;
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize container info")?;
        println!("{}", json);
    } else {
        print!("{data}");
        if args.frames {
            print_frames(&data);
        }
    }

    Ok(())
}

fn build_container_info(data: &SensorData, args: &InfoArgs) -> Result<ContainerInfo> {
    let header = data.header()?;
    let format = &header.format;

    let frames = if args.frames {
        data.frames()
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameInfo {
                index,
                color_bytes: frame.color_size_bytes(),
                depth_bytes: frame.depth_size_bytes(),
                timestamp_color: frame.timestamp_color(),
                timestamp_depth: frame.timestamp_depth(),
                has_pose: frame.has_pose(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let imu = data.imu_frames();
    let imu_time_range = imu
        .first()
        .zip(imu.last())
        .map(|(first, last)| (first.timestamp, last.timestamp));

    Ok(ContainerInfo {
        path: args.file.display().to_string(),
        version: header.version,
        sensor_name: header.sensor_name.clone(),
        color: stream_info(
            format.color_width,
            format.color_height,
            format.color_compression.name(),
            &header.calibration_color.intrinsic,
            &header.calibration_color.extrinsic,
        ),
        depth: stream_info(
            format.depth_width,
            format.depth_height,
            format.depth_compression.name(),
            &header.calibration_depth.intrinsic,
            &header.calibration_depth.extrinsic,
        ),
        depth_shift: header.depth_shift,
        frame_count: data.num_frames(),
        imu_frame_count: data.num_imu_frames(),
        imu_time_range,
        frames,
    })
}

fn stream_info(
    width: u32,
    height: u32,
    compression: &str,
    intrinsic: &Mat4,
    extrinsic: &Mat4,
) -> StreamInfo {
    StreamInfo {
        width,
        height,
        compression: compression.to_string(),
        intrinsic: mat4_to_row_major(intrinsic),
        extrinsic: mat4_to_row_major(extrinsic),
    }
}

fn print_frames(data: &SensorData) {
    println!("\nFrames ({}):", data.num_frames());
    println!(
        "  {:>6}  {:>10}  {:>10}  {:>20}  {:>20}  pose",
        "index", "color B", "depth B", "ts color", "ts depth"
    );
    for (index, frame) in data.frames().iter().enumerate() {
        println!(
            "  {:>6}  {:>10}  {:>10}  {:>20}  {:>20}  {}",
            index,
            frame.color_size_bytes(),
            frame.depth_size_bytes(),
            frame.timestamp_color(),
            frame.timestamp_depth(),
            if frame.has_pose() { "yes" } else { "-" }
        );
    }
}
