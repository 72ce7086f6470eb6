//! ImuFrame - one inertial sample

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{ContractError, Result, Vec3d};

/// Timestamped inertial sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuFrame {
    /// Angular velocity (raw)
    pub rotation_rate: Vec3d,

    /// Acceleration in x, y, z (raw)
    pub acceleration: Vec3d,

    /// Magnetometer (raw)
    pub magnetic_field: Vec3d,

    /// Roll, pitch, yaw estimate (inferred)
    pub attitude: Vec3d,

    /// Gravity direction estimate (inferred)
    pub gravity: Vec3d,

    /// Timestamp, typically microseconds
    pub timestamp: u64,
}

impl ImuFrame {
    /// Serialized size: five 3×f64 vectors plus a u64 timestamp
    pub const SERIALIZED_SIZE: usize = 5 * 3 * 8 + 8;

    /// Zeroed sample at the given timestamp
    pub fn at(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for v in [
            &self.rotation_rate,
            &self.acceleration,
            &self.magnetic_field,
            &self.attitude,
            &self.gravity,
        ] {
            out.write_f64::<LittleEndian>(v.x)?;
            out.write_f64::<LittleEndian>(v.y)?;
            out.write_f64::<LittleEndian>(v.z)?;
        }
        out.write_u64::<LittleEndian>(self.timestamp)?;
        Ok(())
    }

    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut values = [0.0f64; 15];
        input
            .read_f64_into::<LittleEndian>(&mut values)
            .map_err(|e| ContractError::from_read(e, "imu frame"))?;
        let timestamp = input
            .read_u64::<LittleEndian>()
            .map_err(|e| ContractError::from_read(e, "imu timestamp"))?;

        let vec = |i: usize| Vec3d::new(values[i * 3], values[i * 3 + 1], values[i * 3 + 2]);
        Ok(Self {
            rotation_rate: vec(0),
            acceleration: vec(1),
            magnetic_field: vec(2),
            attitude: vec(3),
            gravity: vec(4),
            timestamp,
        })
    }
}

impl Default for ImuFrame {
    fn default() -> Self {
        Self {
            rotation_rate: Vec3d::zeros(),
            acceleration: Vec3d::zeros(),
            magnetic_field: Vec3d::zeros(),
            attitude: Vec3d::zeros(),
            gravity: Vec3d::zeros(),
            timestamp: 0,
        }
    }
}
