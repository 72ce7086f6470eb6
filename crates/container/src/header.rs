//! ContainerHeader - everything stored before the frame list

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use contracts::{
    sensor, CalibrationData, ColorCompression, ContractError, DepthCompression, Result,
};
use tracing::warn;

use crate::format::{ContainerReader, FORMAT_VERSION};

/// Codecs and fixed dimensions every frame of a container is encoded against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub color_compression: ColorCompression,
    pub depth_compression: DepthCompression,
    pub color_width: u32,
    pub color_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
}

impl FrameFormat {
    pub fn new(
        color_compression: ColorCompression,
        depth_compression: DepthCompression,
        (color_width, color_height): (u32, u32),
        (depth_width, depth_height): (u32, u32),
    ) -> Self {
        Self {
            color_compression,
            depth_compression,
            color_width,
            color_height,
            depth_width,
            depth_height,
        }
    }

    pub fn color_pixels(&self) -> usize {
        codec::pixel_count(self.color_width, self.color_height)
    }

    pub fn depth_pixels(&self) -> usize {
        codec::pixel_count(self.depth_width, self.depth_height)
    }

    /// Describe every difference to `other`, or `None` if frames are interchangeable
    pub fn mismatch(&self, other: &FrameFormat) -> Option<String> {
        let mut diffs = Vec::new();
        if (self.color_width, self.color_height) != (other.color_width, other.color_height) {
            diffs.push(format!(
                "color {}x{} vs {}x{}",
                self.color_width, self.color_height, other.color_width, other.color_height
            ));
        }
        if (self.depth_width, self.depth_height) != (other.depth_width, other.depth_height) {
            diffs.push(format!(
                "depth {}x{} vs {}x{}",
                self.depth_width, self.depth_height, other.depth_width, other.depth_height
            ));
        }
        if self.color_compression != other.color_compression {
            diffs.push(format!(
                "color codec {} vs {}",
                self.color_compression, other.color_compression
            ));
        }
        if self.depth_compression != other.depth_compression {
            diffs.push(format!(
                "depth codec {} vs {}",
                self.depth_compression, other.depth_compression
            ));
        }
        (!diffs.is_empty()).then(|| diffs.join(", "))
    }
}

/// Container header: version, device, calibration, codecs, dimensions, depth scale
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    pub version: u32,
    pub sensor_name: String,
    pub calibration_color: CalibrationData,
    pub calibration_depth: CalibrationData,
    pub format: FrameFormat,
    /// Stored depth units per meter
    pub depth_shift: f32,
}

impl ContainerHeader {
    /// Header for the current format version
    pub fn new(
        sensor_name: impl Into<String>,
        format: FrameFormat,
        calibration_color: CalibrationData,
        calibration_depth: CalibrationData,
        depth_shift: f32,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            sensor_name: sensor_name.into(),
            calibration_color,
            calibration_depth,
            format,
            depth_shift,
        }
    }

    /// Check the parameters a container can be configured with
    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(ContractError::VersionMismatch {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }
        if !self.depth_shift.is_finite() || self.depth_shift == 0.0 {
            return Err(ContractError::invalid_config(
                "depth_shift",
                format!("must be finite and non-zero, got {}", self.depth_shift),
            ));
        }
        let f = &self.format;
        if f.color_width == 0 || f.color_height == 0 {
            return Err(ContractError::invalid_config(
                "color",
                format!("dimensions must be non-zero, got {}x{}", f.color_width, f.color_height),
            ));
        }
        if f.depth_width == 0 || f.depth_height == 0 {
            return Err(ContractError::invalid_config(
                "depth",
                format!("dimensions must be non-zero, got {}x{}", f.depth_width, f.depth_height),
            ));
        }
        for (field, width, height, bytes_per_pixel) in [
            ("color", f.color_width, f.color_height, 3),
            ("depth", f.depth_width, f.depth_height, 2),
        ] {
            if codec::frame_bytes(width, height, bytes_per_pixel).is_err() {
                return Err(ContractError::invalid_config(
                    field,
                    format!("a {width}x{height} frame does not fit in memory"),
                ));
            }
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u32::<LittleEndian>(self.version)?;
        out.write_u64::<LittleEndian>(self.sensor_name.len() as u64)?;
        out.write_all(self.sensor_name.as_bytes())?;

        self.calibration_color.write_to(out)?;
        self.calibration_depth.write_to(out)?;

        out.write_i32::<LittleEndian>(self.format.color_compression.to_wire())?;
        out.write_i32::<LittleEndian>(self.format.depth_compression.to_wire())?;
        out.write_u32::<LittleEndian>(self.format.color_width)?;
        out.write_u32::<LittleEndian>(self.format.color_height)?;
        out.write_u32::<LittleEndian>(self.format.depth_width)?;
        out.write_u32::<LittleEndian>(self.format.depth_height)?;
        out.write_f32::<LittleEndian>(self.depth_shift)?;
        Ok(())
    }

    /// Read a header; the version is checked before anything else is parsed
    ///
    /// # Errors
    /// - `VersionMismatch` if the stream was written by another format version
    /// - `UnsupportedCodec` for unknown compression tags
    /// - `CorruptStream` on short reads
    pub fn read_from<R: Read>(input: &mut ContainerReader<R>) -> Result<Self> {
        let version = input.read_u32("version")?;
        if version != FORMAT_VERSION {
            return Err(ContractError::VersionMismatch {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let name_len = input.read_u64("sensor name length")?;
        let name_bytes = input.read_blob(name_len, "sensor name")?;
        let sensor_name = match String::from_utf8(name_bytes.to_vec()) {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "sensor name is not valid utf-8, replacing invalid bytes");
                String::from_utf8_lossy(&name_bytes).into_owned()
            }
        };

        let calibration_color = CalibrationData::read_from(input)?;
        let calibration_depth = CalibrationData::read_from(input)?;

        let color_compression = ColorCompression::from_wire(input.read_i32("color codec")?)?;
        let depth_compression = DepthCompression::from_wire(input.read_i32("depth codec")?)?;
        let color_width = input.read_u32("color width")?;
        let color_height = input.read_u32("color height")?;
        let depth_width = input.read_u32("depth width")?;
        let depth_height = input.read_u32("depth height")?;
        let depth_shift = input.read_f32("depth shift")?;

        Ok(Self {
            version,
            sensor_name,
            calibration_color,
            calibration_depth,
            format: FrameFormat {
                color_compression,
                depth_compression,
                color_width,
                color_height,
                depth_width,
                depth_height,
            },
            depth_shift,
        })
    }
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self::new(
            sensor::UNKNOWN_SENSOR,
            FrameFormat::new(
                ColorCompression::default(),
                DepthCompression::default(),
                (640, 480),
                (640, 480),
            ),
            CalibrationData::identity(),
            CalibrationData::identity(),
            1000.0,
        )
    }
}
