//! CalibrationData - camera intrinsics and extrinsics

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{mat4_from_row_major, mat4_to_row_major, ContractError, Mat4, Result};

/// Intrinsic and extrinsic matrix pair of one camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationData {
    /// Camera-to-projection matrix
    pub intrinsic: Mat4,

    /// Mapping to the base frame of a multi-view setup
    /// (typically depth to color; the color extrinsic is the identity)
    pub extrinsic: Mat4,
}

impl CalibrationData {
    /// Serialized size: two row-major 4x4 f32 blocks
    pub const SERIALIZED_SIZE: usize = 2 * 16 * 4;

    /// Identity intrinsic and extrinsic
    pub fn identity() -> Self {
        Self {
            intrinsic: Mat4::identity(),
            extrinsic: Mat4::identity(),
        }
    }

    pub fn new(intrinsic: Mat4, extrinsic: Mat4) -> Self {
        Self {
            intrinsic,
            extrinsic,
        }
    }

    /// Pinhole intrinsics with identity extrinsic
    pub fn from_pinhole(fx: f32, fy: f32, mx: f32, my: f32) -> Self {
        Self::new(Self::make_intrinsic(fx, fy, mx, my), Mat4::identity())
    }

    /// Build a pinhole intrinsic matrix
    pub fn make_intrinsic(fx: f32, fy: f32, mx: f32, my: f32) -> Mat4 {
        Mat4::new(
            fx, 0.0, mx, 0.0, //
            0.0, fy, my, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    pub fn set_matrices(&mut self, intrinsic: Mat4, extrinsic: Mat4) {
        self.intrinsic = intrinsic;
        self.extrinsic = extrinsic;
    }

    pub fn set_identity(&mut self) {
        *self = Self::identity();
    }

    /// Write both matrices, intrinsic first
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_mat4(out, &self.intrinsic)?;
        write_mat4(out, &self.extrinsic)?;
        Ok(())
    }

    /// Read exactly `SERIALIZED_SIZE` bytes
    ///
    /// # Errors
    /// `CorruptStream` if the stream ends early
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let intrinsic = read_mat4(input, "calibration intrinsic")?;
        let extrinsic = read_mat4(input, "calibration extrinsic")?;
        Ok(Self {
            intrinsic,
            extrinsic,
        })
    }
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::identity()
    }
}

/// Write a matrix as 16 little-endian f32 in row-major order
pub fn write_mat4<W: Write>(out: &mut W, m: &Mat4) -> Result<()> {
    for v in mat4_to_row_major(m) {
        out.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

/// Read a row-major matrix of 16 little-endian f32
pub fn read_mat4<R: Read>(input: &mut R, context: &str) -> Result<Mat4> {
    let mut values = [0.0f32; 16];
    input
        .read_f32_into::<LittleEndian>(&mut values)
        .map_err(|e| ContractError::from_read(e, context))?;
    Ok(mat4_from_row_major(&values))
}
