//! Colored point clouds from depth frames
//!
//! Depth pixels are back-projected with the inverse depth intrinsic and
//! moved to world space by the frame pose; unknown poses count as identity.
//! Each point takes the color pixel it projects to through the depth
//! extrinsic and the color intrinsic, or black outside the color image.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use contracts::{is_unknown_pose, ContractError, Mat4, Result, Rgb8};
use nalgebra::{Point3, Vector3, Vector4};
use tracing::{debug, info, instrument};

use crate::SensorData;

/// World-space point with the color it was seen with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    pub position: Vector3<f32>,
    pub color: Rgb8,
}

/// Back-project every non-zero depth pixel of `frames`
///
/// # Errors
/// - `NotConfigured` without a header
/// - `OutOfBounds` if the range reaches past the last frame
/// - `InvalidConfig` if the depth intrinsic cannot be inverted
pub fn back_project(data: &SensorData, frames: Range<usize>) -> Result<Vec<ColoredPoint>> {
    let header = data.header()?;
    if frames.end > data.num_frames() {
        return Err(ContractError::OutOfBounds {
            index: frames.end.saturating_sub(1),
            len: data.num_frames(),
        });
    }
    let intrinsic_inv = header
        .calibration_depth
        .intrinsic
        .try_inverse()
        .ok_or_else(|| {
            ContractError::invalid_config("calibration_depth", "intrinsic is not invertible")
        })?;
    let depth_to_color = header.calibration_depth.extrinsic;
    let color_intrinsic = header.calibration_color.intrinsic;
    let format = header.format;

    let mut points = Vec::new();
    for index in frames {
        let frame = data.frame(index)?;
        let color = data.decompress_color_frame(frame)?;
        let depth = data.decompress_depth_frame(frame)?;
        let transform = world_transform(frame.camera_to_world());

        let width = format.depth_width as usize;
        for (i, &raw) in depth.iter().enumerate() {
            if raw == 0 {
                continue;
            }
            let (x, y) = ((i % width) as f32, (i / width) as f32);
            let d = f32::from(raw) / header.depth_shift;
            let camera = (intrinsic_inv * Vector4::new(x * d, y * d, d, 0.0)).xyz();

            let world = transform.transform_point(&Point3::from(camera));
            let in_color = depth_to_color.transform_point(&Point3::from(camera));
            let projected = color_intrinsic.transform_point(&in_color);

            points.push(ColoredPoint {
                position: world.coords,
                color: color_at(&color, projected, format.color_width, format.color_height),
            });
        }
        debug!(frame = index, points = points.len(), "frame back-projected");
    }
    Ok(points)
}

/// Back-project `frames` and write them as a binary PLY file
#[instrument(skip(data), fields(path = %path.display()))]
pub fn save_point_cloud(data: &SensorData, path: &Path, frames: Range<usize>) -> Result<usize> {
    let points = back_project(data, frames)?;
    let bytes = write_ply(path, &points)?;
    observability::record_container_io("point_cloud", 1, bytes);
    info!(points = points.len(), bytes, "point cloud saved");
    Ok(points.len())
}

fn world_transform(pose: &Mat4) -> Mat4 {
    if is_unknown_pose(pose) || pose[(0, 0)] == 0.0 {
        Mat4::identity()
    } else {
        *pose
    }
}

fn color_at(color: &[Rgb8], projected: Point3<f32>, width: u32, height: u32) -> Rgb8 {
    let (u, v) = (
        (projected.x / projected.z).round(),
        (projected.y / projected.z).round(),
    );
    let inside = u >= 0.0 && v >= 0.0 && u < width as f32 && v < height as f32;
    if inside {
        color[v as usize * width as usize + u as usize]
    } else {
        Rgb8::default()
    }
}

fn write_ply(path: &Path, points: &[ColoredPoint]) -> Result<u64> {
    let header = format!(
        "ply\n\
         format binary_little_endian 1.0\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         property uchar red\n\
         property uchar green\n\
         property uchar blue\n\
         end_header\n",
        points.len()
    );
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(header.as_bytes())?;
    for point in points {
        for value in point.position.iter() {
            out.write_f32::<LittleEndian>(*value)?;
        }
        out.write_all(&[point.color.r, point.color.g, point.color.b])?;
    }
    out.flush()?;
    Ok(header.len() as u64 + points.len() as u64 * 15)
}
