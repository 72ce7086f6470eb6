//! RgbdFrame - one compressed color/depth capture with pose

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;
use codec::Codec;
use contracts::{
    is_unknown_pose, read_mat4, unknown_pose, write_mat4, ColorBuffer, DepthBuffer, Mat4, Result,
    Rgb8,
};

use crate::format::ContainerReader;
use crate::header::FrameFormat;

/// One timestamped capture
///
/// Equality compares the compressed payloads, timestamps and pose; two frames
/// holding the same image through different codecs are not equal.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbdFrame {
    color: Bytes,
    depth: Bytes,
    camera_to_world: Mat4,
    timestamp_color: u64,
    timestamp_depth: u64,
}

impl RgbdFrame {
    /// Compress raw buffers against `format`
    pub fn encode(
        color: &[Rgb8],
        depth: &[u16],
        format: &FrameFormat,
        camera_to_world: Mat4,
        timestamp_color: u64,
        timestamp_depth: u64,
    ) -> Result<Self> {
        let color = format
            .color_compression
            .compress(color, format.color_width, format.color_height)?;
        let depth = format
            .depth_compression
            .compress(depth, format.depth_width, format.depth_height)?;
        Ok(Self {
            color,
            depth,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        })
    }

    /// Frame from already compressed payloads
    pub fn from_parts(
        color: Bytes,
        depth: Bytes,
        camera_to_world: Mat4,
        timestamp_color: u64,
        timestamp_depth: u64,
    ) -> Self {
        Self {
            color,
            depth,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        }
    }

    pub fn color_bytes(&self) -> &Bytes {
        &self.color
    }

    pub fn depth_bytes(&self) -> &Bytes {
        &self.depth
    }

    pub fn color_size_bytes(&self) -> u64 {
        self.color.len() as u64
    }

    pub fn depth_size_bytes(&self) -> u64 {
        self.depth.len() as u64
    }

    pub fn camera_to_world(&self) -> &Mat4 {
        &self.camera_to_world
    }

    pub fn set_camera_to_world(&mut self, camera_to_world: Mat4) {
        self.camera_to_world = camera_to_world;
    }

    /// False if the pose is the unknown-pose sentinel
    pub fn has_pose(&self) -> bool {
        !is_unknown_pose(&self.camera_to_world)
    }

    pub fn timestamp_color(&self) -> u64 {
        self.timestamp_color
    }

    pub fn timestamp_depth(&self) -> u64 {
        self.timestamp_depth
    }

    pub fn set_timestamp_color(&mut self, timestamp: u64) {
        self.timestamp_color = timestamp;
    }

    pub fn set_timestamp_depth(&mut self, timestamp: u64) {
        self.timestamp_depth = timestamp;
    }

    pub fn decompress_color(&self, format: &FrameFormat) -> Result<ColorBuffer> {
        format
            .color_compression
            .decompress(&self.color, format.color_width, format.color_height)
    }

    pub fn decompress_depth(&self, format: &FrameFormat) -> Result<DepthBuffer> {
        format
            .depth_compression
            .decompress(&self.depth, format.depth_width, format.depth_height)
    }

    /// Re-encode the color payload; the old payload is kept if encoding fails
    pub fn replace_color(&mut self, pixels: &[Rgb8], format: &FrameFormat) -> Result<()> {
        self.color = format
            .color_compression
            .compress(pixels, format.color_width, format.color_height)?;
        Ok(())
    }

    /// Re-encode the depth payload; the old payload is kept if encoding fails
    pub fn replace_depth(&mut self, pixels: &[u16], format: &FrameFormat) -> Result<()> {
        self.depth = format
            .depth_compression
            .compress(pixels, format.depth_width, format.depth_height)?;
        Ok(())
    }

    /// Release both payloads and reset timestamps and pose
    pub fn free(&mut self) {
        self.color = Bytes::new();
        self.depth = Bytes::new();
        self.camera_to_world = unknown_pose();
        self.timestamp_color = 0;
        self.timestamp_depth = 0;
    }

    /// Serialized size of this frame record
    pub fn encoded_len(&self) -> u64 {
        64 + 4 * 8 + self.color_size_bytes() + self.depth_size_bytes()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_mat4(out, &self.camera_to_world)?;
        out.write_u64::<LittleEndian>(self.timestamp_color)?;
        out.write_u64::<LittleEndian>(self.timestamp_depth)?;
        out.write_u64::<LittleEndian>(self.color_size_bytes())?;
        out.write_u64::<LittleEndian>(self.depth_size_bytes())?;
        out.write_all(&self.color)?;
        out.write_all(&self.depth)?;
        Ok(())
    }

    pub fn read_from<R: Read>(input: &mut ContainerReader<R>) -> Result<Self> {
        let camera_to_world = read_mat4(input, "frame pose")?;
        let timestamp_color = input.read_u64("color timestamp")?;
        let timestamp_depth = input.read_u64("depth timestamp")?;
        let color_len = input.read_u64("color size")?;
        let depth_len = input.read_u64("depth size")?;
        let color = input.read_blob(color_len, "color payload")?;
        let depth = input.read_blob(depth_len, "depth payload")?;
        Ok(Self {
            color,
            depth,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        })
    }
}
