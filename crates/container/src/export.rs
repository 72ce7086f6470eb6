//! Image export in the 7-scenes layout
//!
//! ```text
//! out_dir/
//!   _info.txt
//!   frame-000000.color.jpg   (or .png)
//!   frame-000000.depth.pgm   (binary P5, 16-bit big-endian)
//!   frame-000000.pose.txt
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ByteOrder};
use codec::Codec;
use contracts::{mat4_to_row_major, ColorCompression, Mat4, Result};
use tracing::{debug, info, instrument, warn};

use crate::pose::save_pose_file;
use crate::SensorData;

/// Export options
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Prefix of every per-frame file
    pub basename: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            basename: "frame-".to_string(),
        }
    }
}

/// Result of an export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub frames_written: usize,
    pub bytes_written: u64,
    /// False if the run was stopped before the last frame
    pub completed: bool,
}

/// Export every frame of `data` into `out_dir`
pub fn export_images(
    data: &SensorData,
    out_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    export_images_until(data, out_dir, options, &AtomicBool::new(false))
}

/// Export frames until done or until `stop` is set
///
/// `stop` is checked between frames; files of the frame in progress are
/// always complete.
#[instrument(
    name = "container_export",
    skip(data, options, stop),
    fields(out_dir = %out_dir.display(), frames = data.num_frames())
)]
pub fn export_images_until(
    data: &SensorData,
    out_dir: &Path,
    options: &ExportOptions,
    stop: &AtomicBool,
) -> Result<ExportSummary> {
    let header = data.header()?;
    fs::create_dir_all(out_dir)?;

    let mut summary = ExportSummary::default();
    summary.bytes_written += write_info(data, out_dir)?;

    if data.num_imu_frames() > 0 {
        warn!(
            imu_frames = data.num_imu_frames(),
            "imu samples are not part of the image export"
        );
    }

    let format = header.format;
    let extension = format.color_compression.file_extension();

    for (index, frame) in data.frames().iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            info!(written = summary.frames_written, "export stopped");
            return Ok(summary);
        }
        let stem = format!("{}{:06}", options.basename, index);

        let color_path = out_dir.join(format!("{stem}.color.{extension}"));
        let color = match format.color_compression {
            ColorCompression::Raw => {
                let pixels = data.decompress_color_frame(frame)?;
                ColorCompression::Png.compress(&pixels, format.color_width, format.color_height)?
            }
            ColorCompression::Png | ColorCompression::Jpeg => frame.color_bytes().clone(),
        };
        fs::write(&color_path, &color)?;
        summary.bytes_written += color.len() as u64;

        let depth = data.decompress_depth_frame(frame)?;
        summary.bytes_written += write_pgm(
            &out_dir.join(format!("{stem}.depth.pgm")),
            format.depth_width,
            format.depth_height,
            &depth,
            header.depth_shift,
        )?;

        save_pose_file(&out_dir.join(format!("{stem}.pose.txt")), frame.camera_to_world())?;

        summary.frames_written += 1;
        debug!(frame = index, "frame exported");
    }

    summary.completed = true;
    observability::record_container_io(
        "export",
        summary.frames_written as u64,
        summary.bytes_written,
    );
    info!(
        frames = summary.frames_written,
        bytes = summary.bytes_written,
        "export finished"
    );
    Ok(summary)
}

/// Path of the metadata file inside an export directory
pub fn info_path(out_dir: &Path) -> PathBuf {
    out_dir.join("_info.txt")
}

fn write_info(data: &SensorData, out_dir: &Path) -> Result<u64> {
    let header = data.header()?;
    let f = &header.format;
    let matrix = |m: &Mat4| {
        mat4_to_row_major(m)
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let text = format!(
        "m_versionNumber = {}\n\
         m_sensorName = {}\n\
         m_colorWidth = {}\n\
         m_colorHeight = {}\n\
         m_depthWidth = {}\n\
         m_depthHeight = {}\n\
         m_depthShift = {}\n\
         m_calibrationColorIntrinsic = {}\n\
         m_calibrationColorExtrinsic = {}\n\
         m_calibrationDepthIntrinsic = {}\n\
         m_calibrationDepthExtrinsic = {}\n\
         m_frames.size = {}\n",
        header.version,
        header.sensor_name,
        f.color_width,
        f.color_height,
        f.depth_width,
        f.depth_height,
        header.depth_shift,
        matrix(&header.calibration_color.intrinsic),
        matrix(&header.calibration_color.extrinsic),
        matrix(&header.calibration_depth.intrinsic),
        matrix(&header.calibration_depth.extrinsic),
        data.num_frames(),
    );
    fs::write(info_path(out_dir), &text)?;
    Ok(text.len() as u64)
}

/// Binary 16-bit PGM, samples big-endian
fn write_pgm(path: &Path, width: u32, height: u32, depth: &[u16], depth_shift: f32) -> Result<u64> {
    let header = format!(
        "P5\n# data values are 16-bit each; depth shift is {depth_shift}\n{width} {height}\n{}\n",
        u16::MAX
    );
    let mut samples = vec![0u8; depth.len() * 2];
    BigEndian::write_u16_into(depth, &mut samples);

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(header.as_bytes())?;
    out.write_all(&samples)?;
    out.flush()?;
    Ok((header.len() + samples.len()) as u64)
}
