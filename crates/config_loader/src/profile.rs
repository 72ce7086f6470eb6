//! Capture profile: the parameters a container is configured with

use container::{ContainerHeader, FrameFormat, SensorData};
use contracts::{
    mat4_from_row_major, mat4_to_row_major, sensor, CalibrationData, ColorCompression,
    ContractError, DepthCompression, Mat4,
};
use serde::{Deserialize, Serialize};

/// Everything needed to configure a new container, plus cache sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureProfile {
    #[serde(default = "default_sensor_name")]
    pub sensor_name: String,
    /// Stored depth units per meter
    #[serde(default = "default_depth_shift")]
    pub depth_shift: f32,
    pub color: ColorStream,
    pub depth: DepthStream,
    #[serde(default)]
    pub cache: CacheProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStream {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub compression: ColorCompression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<Intrinsics>,
    /// Row-major 4x4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrinsic: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthStream {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub compression: DepthCompression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<Intrinsics>,
    /// Row-major 4x4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrinsic: Option<Vec<f32>>,
}

/// Pinhole parameters in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub mx: f32,
    pub my: f32,
}

/// Queue capacities for the background caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheProfile {
    #[serde(default = "default_capacity")]
    pub read_capacity: usize,
    #[serde(default = "default_capacity")]
    pub write_capacity: usize,
}

impl Default for CacheProfile {
    fn default() -> Self {
        Self {
            read_capacity: default_capacity(),
            write_capacity: default_capacity(),
        }
    }
}

impl Intrinsics {
    /// Recover pinhole parameters; `None` for identity or non-pinhole matrices
    pub fn from_matrix(m: &Mat4) -> Option<Self> {
        let k = Self {
            fx: m[(0, 0)],
            fy: m[(1, 1)],
            mx: m[(0, 2)],
            my: m[(1, 2)],
        };
        let is_pinhole = *m == CalibrationData::make_intrinsic(k.fx, k.fy, k.mx, k.my);
        (is_pinhole && *m != Mat4::identity()).then_some(k)
    }
}

fn extrinsic_values(m: &Mat4) -> Option<Vec<f32>> {
    (*m != Mat4::identity()).then(|| mat4_to_row_major(m).to_vec())
}

fn default_sensor_name() -> String {
    sensor::STRUCTURE_SENSOR.to_string()
}

fn default_depth_shift() -> f32 {
    1000.0
}

fn default_capacity() -> usize {
    10
}

impl CaptureProfile {
    /// Profile describing an existing container header
    ///
    /// Identity calibration matrices are left out.
    pub fn from_header(header: &ContainerHeader) -> Self {
        let format = &header.format;
        Self {
            sensor_name: header.sensor_name.clone(),
            depth_shift: header.depth_shift,
            color: ColorStream {
                width: format.color_width,
                height: format.color_height,
                compression: format.color_compression,
                intrinsics: Intrinsics::from_matrix(&header.calibration_color.intrinsic),
                extrinsic: extrinsic_values(&header.calibration_color.extrinsic),
            },
            depth: DepthStream {
                width: format.depth_width,
                height: format.depth_height,
                compression: format.depth_compression,
                intrinsics: Intrinsics::from_matrix(&header.calibration_depth.intrinsic),
                extrinsic: extrinsic_values(&header.calibration_depth.extrinsic),
            },
            cache: CacheProfile::default(),
        }
    }

    pub fn format(&self) -> FrameFormat {
        FrameFormat::new(
            self.color.compression,
            self.depth.compression,
            (self.color.width, self.color.height),
            (self.depth.width, self.depth.height),
        )
    }

    /// Header for a new container with this profile's parameters
    pub fn to_header(&self) -> Result<ContainerHeader, ContractError> {
        Ok(ContainerHeader::new(
            self.sensor_name.clone(),
            self.format(),
            calibration(self.color.intrinsics, self.color.extrinsic.as_deref(), "color")?,
            calibration(self.depth.intrinsics, self.depth.extrinsic.as_deref(), "depth")?,
            self.depth_shift,
        ))
    }

    /// Configured, empty container
    pub fn to_sensor_data(&self) -> Result<SensorData, ContractError> {
        SensorData::with_header(self.to_header()?)
    }
}

/// Missing parts stay identity
fn calibration(
    intrinsics: Option<Intrinsics>,
    extrinsic: Option<&[f32]>,
    stream: &str,
) -> Result<CalibrationData, ContractError> {
    let intrinsic = match intrinsics {
        Some(k) => CalibrationData::make_intrinsic(k.fx, k.fy, k.mx, k.my),
        None => Mat4::identity(),
    };
    let extrinsic = match extrinsic {
        Some(values) => {
            let values: &[f32; 16] = values.try_into().map_err(|_| {
                ContractError::invalid_config(
                    format!("{stream}.extrinsic"),
                    format!("expected 16 values, got {}", values.len()),
                )
            })?;
            mat4_from_row_major(values)
        }
        None => Mat4::identity(),
    };
    Ok(CalibrationData::new(intrinsic, extrinsic))
}
