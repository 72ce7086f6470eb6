//! SensorData - the capture-sequence aggregate
//!
//! Holds the header, the frame list and the IMU samples, and owns the full
//! binary (de)serialization of a container file.
//!
//! ## Lifecycle
//! `SensorData::new()` starts unconfigured. `init_default` or
//! `load_from_file` configure it; `free` returns it to the unconfigured
//! state. Frame, IMU and save operations on an unconfigured instance fail
//! with `NotConfigured`.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use contracts::{
    is_unknown_pose, ColorBuffer, ContractError, DepthBuffer, ImuFrame, Mat4, Modality, Result,
    Rgb8,
};
use tracing::{debug, info, instrument, warn};

use crate::format::ContainerReader;
use crate::frame::RgbdFrame;
use crate::header::{ContainerHeader, FrameFormat};

/// Smallest possible serialized frame: pose, two timestamps, two sizes
const MIN_FRAME_RECORD: u64 = 64 + 4 * 8;

/// Largest preallocation when the stream length is unknown
const UNBOUNDED_RESERVE: usize = 4096;

/// Which frame clock to match IMU samples against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameClock {
    #[default]
    Color,
    Depth,
}

/// IMU handling when appending another container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImuMerge {
    /// Keep only this container's IMU samples
    #[default]
    Skip,
    /// Merge both IMU sequences in timestamp order
    Merge,
}

/// Capture sequence: header, frames and IMU samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorData {
    header: Option<ContainerHeader>,
    frames: Vec<RgbdFrame>,
    imu_frames: Vec<ImuFrame>,
}

impl SensorData {
    /// Unconfigured, empty instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured, frame-less instance
    pub fn with_header(header: ContainerHeader) -> Result<Self> {
        let mut data = Self::new();
        data.init_default(header)?;
        Ok(data)
    }

    /// Configure a fresh, frame-less container
    ///
    /// Any frames or IMU samples held before are released.
    ///
    /// # Errors
    /// `InvalidConfig` for zero dimensions or a zero / non-finite depth shift
    pub fn init_default(&mut self, header: ContainerHeader) -> Result<()> {
        header.validate()?;
        debug!(
            sensor = %header.sensor_name,
            color_codec = %header.format.color_compression,
            depth_codec = %header.format.depth_compression,
            "sensor data configured"
        );
        self.frames.clear();
        self.imu_frames.clear();
        self.header = Some(header);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.header.is_some()
    }

    pub fn header(&self) -> Result<&ContainerHeader> {
        self.header.as_ref().ok_or(ContractError::NotConfigured)
    }

    pub fn format(&self) -> Result<&FrameFormat> {
        self.header().map(|h| &h.format)
    }

    pub fn frames(&self) -> &[RgbdFrame] {
        &self.frames
    }

    pub fn imu_frames(&self) -> &[ImuFrame] {
        &self.imu_frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_imu_frames(&self) -> usize {
        self.imu_frames.len()
    }

    pub fn frame(&self, index: usize) -> Result<&RgbdFrame> {
        self.header()?;
        self.frames.get(index).ok_or(ContractError::OutOfBounds {
            index,
            len: self.frames.len(),
        })
    }

    pub fn frame_mut(&mut self, index: usize) -> Result<&mut RgbdFrame> {
        self.header()?;
        let len = self.frames.len();
        self.frames
            .get_mut(index)
            .ok_or(ContractError::OutOfBounds { index, len })
    }

    pub fn imu_frame(&self, index: usize) -> Result<&ImuFrame> {
        self.header()?;
        self.imu_frames.get(index).ok_or(ContractError::OutOfBounds {
            index,
            len: self.imu_frames.len(),
        })
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Compress a frame against this container's codecs without storing it
    pub fn create_frame(
        &self,
        color: &[Rgb8],
        depth: &[u16],
        camera_to_world: Mat4,
        timestamp_color: u64,
        timestamp_depth: u64,
    ) -> Result<RgbdFrame> {
        let format = self.format()?;
        let frame = RgbdFrame::encode(
            color,
            depth,
            format,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        )?;

        observability::record_frame_encoded(
            Modality::Color,
            format.color_compression.name(),
            color.len() * 3,
            frame.color_bytes().len(),
        );
        observability::record_frame_encoded(
            Modality::Depth,
            format.depth_compression.name(),
            depth.len() * 2,
            frame.depth_bytes().len(),
        );
        Ok(frame)
    }

    /// Append a frame with identity pose and zero timestamps
    pub fn add_frame(&mut self, color: &[Rgb8], depth: &[u16]) -> Result<&RgbdFrame> {
        self.add_frame_with(color, depth, Mat4::identity(), 0, 0)
    }

    /// Compress and append a frame, returning the stored frame
    ///
    /// # Errors
    /// - `NotConfigured` before `init_default` / `load_from_file`
    /// - `DimensionMismatch` if a buffer does not match the configured size
    pub fn add_frame_with(
        &mut self,
        color: &[Rgb8],
        depth: &[u16],
        camera_to_world: Mat4,
        timestamp_color: u64,
        timestamp_depth: u64,
    ) -> Result<&RgbdFrame> {
        let frame = self.create_frame(
            color,
            depth,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        )?;
        Ok(self.push_frame(frame))
    }

    /// Append an already compressed frame
    pub fn push_frame(&mut self, frame: RgbdFrame) -> &RgbdFrame {
        let index = self.frames.len();
        self.frames.push(frame);
        &self.frames[index]
    }

    pub fn decompress_color(&self, index: usize) -> Result<ColorBuffer> {
        self.decompress_color_frame(self.frame(index)?)
    }

    pub fn decompress_depth(&self, index: usize) -> Result<DepthBuffer> {
        self.decompress_depth_frame(self.frame(index)?)
    }

    /// Decode the color payload of any frame encoded against this container
    pub fn decompress_color_frame(&self, frame: &RgbdFrame) -> Result<ColorBuffer> {
        let format = self.format()?;
        let pixels = frame.decompress_color(format)?;
        observability::record_frame_decoded(Modality::Color, format.color_compression.name());
        Ok(pixels)
    }

    /// Decode the depth payload of any frame encoded against this container
    pub fn decompress_depth_frame(&self, frame: &RgbdFrame) -> Result<DepthBuffer> {
        let format = self.format()?;
        let pixels = frame.decompress_depth(format)?;
        observability::record_frame_decoded(Modality::Depth, format.depth_compression.name());
        Ok(pixels)
    }

    pub fn replace_color(&mut self, index: usize, pixels: &[Rgb8]) -> Result<()> {
        let format = *self.format()?;
        self.frame_mut(index)?.replace_color(pixels, &format)
    }

    pub fn replace_depth(&mut self, index: usize, pixels: &[u16]) -> Result<()> {
        let format = *self.format()?;
        self.frame_mut(index)?.replace_depth(pixels, &format)
    }

    // ========================================================================
    // Depth units and poses
    // ========================================================================

    /// Convert a stored depth value to meters
    pub fn depth_to_meters(&self, raw: u16) -> Result<f32> {
        Ok(raw as f32 / self.header()?.depth_shift)
    }

    /// Decode a depth frame into meters; `0` (no measurement) stays `0.0`
    pub fn compute_depth_meters(&self, index: usize) -> Result<Vec<f32>> {
        let shift = self.header()?.depth_shift;
        let depth = self.decompress_depth(index)?;
        Ok(depth
            .iter()
            .map(|&d| if d == 0 { 0.0 } else { d as f32 / shift })
            .collect())
    }

    /// Left-multiply every known camera-to-world pose by `transform`
    pub fn apply_transform(&mut self, transform: &Mat4) {
        for frame in &mut self.frames {
            let pose = *frame.camera_to_world();
            if is_unknown_pose(&pose) {
                continue;
            }
            frame.set_camera_to_world(transform * pose);
        }
    }

    // ========================================================================
    // IMU
    // ========================================================================

    /// Append an IMU sample
    ///
    /// # Errors
    /// `ImuOutOfOrder` if the timestamp is earlier than the last sample
    pub fn add_imu_frame(&mut self, frame: ImuFrame) -> Result<&ImuFrame> {
        self.header()?;
        if let Some(last) = self.imu_frames.last() {
            if frame.timestamp < last.timestamp {
                return Err(ContractError::ImuOutOfOrder {
                    timestamp: frame.timestamp,
                    last: last.timestamp,
                });
            }
        }
        let index = self.imu_frames.len();
        self.imu_frames.push(frame);
        Ok(&self.imu_frames[index])
    }

    /// IMU sample closest in time to `timestamp`
    ///
    /// Timestamps outside the recorded range return the first or last
    /// sample. Ties between two neighbours go to the earlier one.
    ///
    /// # Errors
    /// `NotConfigured` before a header exists, then `NoImuData` if empty
    pub fn find_closest_imu_frame(&self, timestamp: u64) -> Result<&ImuFrame> {
        self.header()?;
        let imu = &self.imu_frames;
        let (first, last) = match (imu.first(), imu.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ContractError::NoImuData),
        };
        if timestamp <= first.timestamp {
            return Ok(first);
        }
        if timestamp >= last.timestamp {
            return Ok(last);
        }

        let mut low = 0;
        let mut high = imu.len() - 1;
        while high - low > 1 {
            let middle = low + (high - low) / 2;
            let t = imu[middle].timestamp;
            if t == timestamp {
                return Ok(&imu[middle]);
            }
            if t > timestamp {
                high = middle;
            } else {
                low = middle;
            }
        }

        if timestamp - imu[low].timestamp <= imu[high].timestamp - timestamp {
            Ok(&imu[low])
        } else {
            Ok(&imu[high])
        }
    }

    /// IMU sample closest to a frame's color or depth timestamp
    pub fn closest_imu_frame_for(&self, index: usize, clock: FrameClock) -> Result<&ImuFrame> {
        let frame = self.frame(index)?;
        let timestamp = match clock {
            FrameClock::Color => frame.timestamp_color(),
            FrameClock::Depth => frame.timestamp_depth(),
        };
        self.find_closest_imu_frame(timestamp)
    }

    // ========================================================================
    // Append / free
    // ========================================================================

    /// Append all frames of `other` after this container's frames
    ///
    /// # Errors
    /// - `IncompatibleFormat` if dimensions or codecs differ
    #[instrument(
        name = "container_append",
        skip(self, other),
        fields(frames = self.frames.len(), other_frames = other.frames.len(), imu = ?imu)
    )]
    pub fn append(&mut self, other: &SensorData, imu: ImuMerge) -> Result<()> {
        let format = self.format()?;
        let other_format = other.format()?;
        if let Some(diff) = format.mismatch(other_format) {
            return Err(ContractError::incompatible_format(diff));
        }

        self.frames.extend(other.frames.iter().cloned());

        match imu {
            ImuMerge::Skip => {
                if !other.imu_frames.is_empty() {
                    warn!(
                        skipped = other.imu_frames.len(),
                        "imu samples of appended container were not merged"
                    );
                }
            }
            ImuMerge::Merge => {
                self.imu_frames = merge_by_timestamp(&self.imu_frames, &other.imu_frames);
            }
        }

        info!(
            frames = self.frames.len(),
            imu_frames = self.imu_frames.len(),
            "container appended"
        );
        Ok(())
    }

    /// Release all frames and samples and return to the unconfigured state
    pub fn free(&mut self) {
        for frame in &mut self.frames {
            frame.free();
        }
        self.frames.clear();
        self.imu_frames.clear();
        self.header = None;
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Write the complete container: header, frames, IMU samples
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.header()?.write_to(out)?;
        out.write_u64::<LittleEndian>(self.frames.len() as u64)?;
        for frame in &self.frames {
            frame.write_to(out)?;
        }
        out.write_u64::<LittleEndian>(self.imu_frames.len() as u64)?;
        for imu in &self.imu_frames {
            imu.write_to(out)?;
        }
        Ok(())
    }

    /// Parse a complete container
    ///
    /// # Errors
    /// - `VersionMismatch` before anything else is read
    /// - `CorruptStream` on short reads, impossible counts or a header
    ///   that could not be configured (zero or oversized dimensions, zero
    ///   depth shift)
    /// - `ImuOutOfOrder` if stored IMU samples are not sorted
    pub fn read_from<R: Read>(input: &mut ContainerReader<R>) -> Result<Self> {
        let header = ContainerHeader::read_from(input)?;
        header
            .validate()
            .map_err(|e| ContractError::corrupt_stream(format!("unusable container header: {e}")))?;

        let num_frames = input.read_u64("frame count")?;
        let mut frames = reserve_records(input, num_frames, MIN_FRAME_RECORD, "frames")?;
        for _ in 0..num_frames {
            frames.push(RgbdFrame::read_from(input)?);
        }

        let num_imu = input.read_u64("imu frame count")?;
        let mut imu_frames: Vec<ImuFrame> =
            reserve_records(input, num_imu, ImuFrame::SERIALIZED_SIZE as u64, "imu frames")?;
        for _ in 0..num_imu {
            let sample = ImuFrame::read_from(input)?;
            if let Some(last) = imu_frames.last() {
                if sample.timestamp < last.timestamp {
                    return Err(ContractError::ImuOutOfOrder {
                        timestamp: sample.timestamp,
                        last: last.timestamp,
                    });
                }
            }
            imu_frames.push(sample);
        }

        Ok(Self {
            header: Some(header),
            frames,
            imu_frames,
        })
    }

    /// Save to a container file, replacing any existing file
    #[instrument(
        name = "container_save",
        skip(self),
        fields(path = %path.display(), frames = self.frames.len(), imu = self.imu_frames.len())
    )]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.header()?;
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        let bytes = out.get_ref().metadata()?.len();

        observability::record_container_io("save", self.frames.len() as u64, bytes);
        info!(bytes, "container saved");
        Ok(())
    }

    /// Load a container file, replacing this instance only on success
    ///
    /// On any error the instance keeps its previous state.
    #[instrument(name = "container_load", skip(self), fields(path = %path.display()))]
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ContractError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ContractError::Io(e),
        })?;
        let len = file.metadata()?.len();

        let mut reader = ContainerReader::new(BufReader::new(file), Some(len));
        let loaded = Self::read_from(&mut reader)?;
        if let Some(trailing) = reader.remaining().filter(|&r| r > 0) {
            warn!(trailing, "container has trailing bytes after imu data");
        }

        observability::record_container_io("load", loaded.frames.len() as u64, len);
        info!(
            frames = loaded.frames.len(),
            imu_frames = loaded.imu_frames.len(),
            "container loaded"
        );
        *self = loaded;
        Ok(())
    }

    /// Convenience: load a container file into a new instance
    pub fn open(path: &Path) -> Result<Self> {
        let mut data = Self::new();
        data.load_from_file(path)?;
        Ok(data)
    }
}

fn reserve_records<R: Read, T>(
    input: &ContainerReader<R>,
    count: u64,
    min_record: u64,
    context: &str,
) -> Result<Vec<T>> {
    let capacity = match input.remaining() {
        Some(remaining) => {
            if count.saturating_mul(min_record) > remaining {
                return Err(ContractError::corrupt_stream(format!(
                    "{count} {context} cannot fit in the remaining {remaining} bytes"
                )));
            }
            usize::try_from(count).map_err(|_| ContractError::AllocationFailure {
                bytes: count.saturating_mul(min_record),
            })?
        }
        None => usize::try_from(count).unwrap_or(usize::MAX).min(UNBOUNDED_RESERVE),
    };

    let mut records = Vec::new();
    records
        .try_reserve_exact(capacity)
        .map_err(|_| ContractError::AllocationFailure {
            bytes: count.saturating_mul(min_record),
        })?;
    Ok(records)
}

fn merge_by_timestamp(a: &[ImuFrame], b: &[ImuFrame]) -> Vec<ImuFrame> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if b[j].timestamp < a[i].timestamp {
            merged.push(b[j]);
            j += 1;
        } else {
            merged.push(a[i]);
            i += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

impl fmt::Display for SensorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(header) = &self.header else {
            return writeln!(f, "SensorData: not configured");
        };
        let format = &header.format;
        writeln!(f, "SensorData:")?;
        writeln!(f, "  version:       {}", header.version)?;
        writeln!(f, "  sensor:        {}", header.sensor_name)?;
        writeln!(
            f,
            "  color:         {}x{} ({})",
            format.color_width, format.color_height, format.color_compression
        )?;
        writeln!(
            f,
            "  depth:         {}x{} ({})",
            format.depth_width, format.depth_height, format.depth_compression
        )?;
        writeln!(f, "  depth shift:   {}", header.depth_shift)?;
        writeln!(f, "  frames:        {}", self.frames.len())?;
        writeln!(f, "  imu frames:    {}", self.imu_frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{unknown_pose, CalibrationData, ColorCompression, DepthCompression};
    use rand::Rng;

    fn header(color: ColorCompression, depth: DepthCompression) -> ContainerHeader {
        ContainerHeader::new(
            "test-sensor",
            FrameFormat::new(color, depth, (4, 3), (2, 2)),
            CalibrationData::from_pinhole(10.0, 10.0, 2.0, 1.5),
            CalibrationData::identity(),
            1000.0,
        )
    }

    fn raw_data() -> SensorData {
        SensorData::with_header(header(ColorCompression::Raw, DepthCompression::Raw)).unwrap()
    }

    fn color(seed: u8) -> Vec<Rgb8> {
        vec![Rgb8::new(seed, seed.wrapping_add(1), seed.wrapping_add(2)); 12]
    }

    fn imu_data(timestamps: &[u64]) -> SensorData {
        let mut data = raw_data();
        for &t in timestamps {
            data.add_imu_frame(ImuFrame::at(t)).unwrap();
        }
        data
    }

    #[test]
    fn test_unconfigured_operations_fail() {
        let mut data = SensorData::new();
        assert!(matches!(
            data.add_frame(&color(0), &[0; 4]),
            Err(ContractError::NotConfigured)
        ));
        assert!(matches!(
            data.add_imu_frame(ImuFrame::at(1)),
            Err(ContractError::NotConfigured)
        ));
        assert!(matches!(
            data.write_to(&mut Vec::new()),
            Err(ContractError::NotConfigured)
        ));
    }

    #[test]
    fn test_unconfigured_reads_fail() {
        let data = SensorData::new();
        assert!(matches!(data.decompress_color(0), Err(ContractError::NotConfigured)));
        assert!(matches!(data.decompress_depth(0), Err(ContractError::NotConfigured)));
        assert!(matches!(data.frame(0), Err(ContractError::NotConfigured)));
        assert!(matches!(data.imu_frame(0), Err(ContractError::NotConfigured)));
        assert!(matches!(
            data.find_closest_imu_frame(10),
            Err(ContractError::NotConfigured)
        ));
        assert!(matches!(
            data.closest_imu_frame_for(0, FrameClock::Depth),
            Err(ContractError::NotConfigured)
        ));

        let mut freed = raw_data();
        freed.add_frame(&color(0), &[0; 4]).unwrap();
        freed.free();
        assert!(matches!(freed.decompress_color(0), Err(ContractError::NotConfigured)));
    }

    #[test]
    fn test_oversized_header_rejected_on_load() {
        let mut h = header(ColorCompression::Raw, DepthCompression::Raw);
        h.format = FrameFormat::new(
            ColorCompression::Raw,
            DepthCompression::Raw,
            (u32::MAX, u32::MAX),
            (u32::MAX, u32::MAX),
        );
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        RgbdFrame::from_parts(
            bytes::Bytes::new(),
            bytes::Bytes::new(),
            Mat4::identity(),
            0,
            0,
        )
        .write_to(&mut buf)
        .unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.sens");
        std::fs::write(&path, &buf).unwrap();

        let mut data = raw_data();
        data.add_frame(&color(3), &[3; 4]).unwrap();
        let before = data.clone();
        assert!(matches!(
            data.load_from_file(&path),
            Err(ContractError::CorruptStream { .. })
        ));
        assert_eq!(data, before);
    }

    #[test]
    fn test_init_rejects_zero_depth_shift() {
        let mut h = header(ColorCompression::Raw, DepthCompression::Raw);
        h.depth_shift = 0.0;
        let mut data = SensorData::new();
        assert!(matches!(
            data.init_default(h),
            Err(ContractError::InvalidConfig { .. })
        ));
        assert!(!data.is_configured());
    }

    #[test]
    fn test_add_frame_defaults_and_decode() {
        let mut data = raw_data();
        let frame = data.add_frame(&color(5), &[1, 2, 3, 4]).unwrap();
        assert_eq!(*frame.camera_to_world(), Mat4::identity());
        assert_eq!(frame.timestamp_color(), 0);

        assert_eq!(&*data.decompress_color(0).unwrap(), &color(5)[..]);
        assert_eq!(&*data.decompress_depth(0).unwrap(), &[1, 2, 3, 4]);
        assert!(matches!(
            data.decompress_depth(1),
            Err(ContractError::OutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_add_frame_wrong_size() {
        let mut data = raw_data();
        let err = data.add_frame(&color(0), &[0; 5]).unwrap_err();
        assert!(matches!(
            err,
            ContractError::DimensionMismatch {
                modality: Modality::Depth,
                expected: 4,
                actual: 5
            }
        ));
        assert_eq!(data.num_frames(), 0);
    }

    #[test]
    fn test_replace_through_container() {
        let mut data = raw_data();
        data.add_frame(&color(1), &[1; 4]).unwrap();
        data.replace_color(0, &color(9)).unwrap();
        data.replace_depth(0, &[9; 4]).unwrap();
        assert_eq!(&*data.decompress_color(0).unwrap(), &color(9)[..]);
        assert_eq!(&*data.decompress_depth(0).unwrap(), &[9; 4]);
        assert!(data.replace_depth(3, &[0; 4]).is_err());
    }

    #[test]
    fn test_depth_in_meters() {
        let mut data = raw_data();
        data.add_frame(&color(0), &[1000, 0, 2500, 1000]).unwrap();
        assert_eq!(data.depth_to_meters(1000).unwrap(), 1.0);
        assert_eq!(
            data.compute_depth_meters(0).unwrap(),
            vec![1.0, 0.0, 2.5, 1.0]
        );
    }

    #[test]
    fn test_closest_imu() {
        let data = imu_data(&[10, 20, 30]);
        assert_eq!(data.find_closest_imu_frame(24).unwrap().timestamp, 20);
        assert_eq!(data.find_closest_imu_frame(26).unwrap().timestamp, 30);
        assert_eq!(data.find_closest_imu_frame(5).unwrap().timestamp, 10);
        assert_eq!(data.find_closest_imu_frame(35).unwrap().timestamp, 30);
        assert_eq!(data.find_closest_imu_frame(20).unwrap().timestamp, 20);
    }

    #[test]
    fn test_closest_imu_tie_goes_low() {
        let data = imu_data(&[10, 20, 30, 40]);
        assert_eq!(data.find_closest_imu_frame(25).unwrap().timestamp, 20);
        assert_eq!(data.find_closest_imu_frame(15).unwrap().timestamp, 10);
    }

    #[test]
    fn test_closest_imu_matches_linear_scan() {
        let mut rng = rand::rng();
        let mut timestamps: Vec<u64> = (0..50).map(|_| rng.random_range(0..1000)).collect();
        timestamps.sort_unstable();
        let data = imu_data(&timestamps);

        for query in 0..1100u64 {
            let found = data.find_closest_imu_frame(query).unwrap().timestamp;
            let best = timestamps.iter().map(|&t| t.abs_diff(query)).min().unwrap();
            assert_eq!(found.abs_diff(query), best, "query {query}");
        }
    }

    #[test]
    fn test_closest_imu_by_frame_clock() {
        let mut data = imu_data(&[100, 200]);
        data.add_frame_with(&color(0), &[0; 4], Mat4::identity(), 110, 190)
            .unwrap();
        assert_eq!(
            data.closest_imu_frame_for(0, FrameClock::Color).unwrap().timestamp,
            100
        );
        assert_eq!(
            data.closest_imu_frame_for(0, FrameClock::Depth).unwrap().timestamp,
            200
        );
    }

    #[test]
    fn test_empty_imu_lookup() {
        assert!(matches!(
            raw_data().find_closest_imu_frame(3),
            Err(ContractError::NoImuData)
        ));
    }

    #[test]
    fn test_imu_out_of_order_rejected() {
        let mut data = imu_data(&[10, 20]);
        data.add_imu_frame(ImuFrame::at(20)).unwrap();
        assert!(matches!(
            data.add_imu_frame(ImuFrame::at(15)),
            Err(ContractError::ImuOutOfOrder {
                timestamp: 15,
                last: 20
            })
        ));
        assert_eq!(data.num_imu_frames(), 3);
    }

    #[test]
    fn test_stream_roundtrip() {
        let mut data =
            SensorData::with_header(header(ColorCompression::Png, DepthCompression::Occi)).unwrap();
        for i in 0..3u8 {
            let depth = [i as u16 * 100, 4000, 0, 65535];
            data.add_frame_with(
                &color(i),
                &depth,
                Mat4::identity() * (i as f32),
                i as u64,
                i as u64 + 1,
            )
            .unwrap();
        }
        data.add_imu_frame(ImuFrame::at(7)).unwrap();

        let mut buf = Vec::new();
        data.write_to(&mut buf).unwrap();
        let len = buf.len() as u64;
        let mut reader = ContainerReader::new(std::io::Cursor::new(buf), Some(len));
        let read = SensorData::read_from(&mut reader).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_impossible_frame_count() {
        let data = raw_data();
        let mut buf = Vec::new();
        data.write_to(&mut buf).unwrap();
        // frame count sits right before the trailing imu count
        let at = buf.len() - 16;
        buf[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        let len = buf.len() as u64;
        let mut reader = ContainerReader::new(std::io::Cursor::new(buf), Some(len));
        let err = SensorData::read_from(&mut reader).unwrap_err();
        assert!(matches!(err, ContractError::CorruptStream { .. }));
    }

    #[test]
    fn test_append_concatenates() {
        let mut a = raw_data();
        a.add_frame(&color(1), &[1; 4]).unwrap();
        let mut b = raw_data();
        b.add_frame(&color(2), &[2; 4]).unwrap();
        b.add_frame(&color(3), &[3; 4]).unwrap();

        let mut expected: Vec<RgbdFrame> = a.frames().to_vec();
        expected.extend(b.frames().iter().cloned());

        a.append(&b, ImuMerge::Skip).unwrap();
        assert_eq!(a.frames(), &expected[..]);
        assert_eq!(a.num_frames(), 3);
    }

    #[test]
    fn test_append_incompatible() {
        let mut a = raw_data();
        let b =
            SensorData::with_header(header(ColorCompression::Raw, DepthCompression::Zlib)).unwrap();
        assert!(matches!(
            a.append(&b, ImuMerge::Skip),
            Err(ContractError::IncompatibleFormat { .. })
        ));
    }

    #[test]
    fn test_append_imu_modes() {
        let mut skip = imu_data(&[10, 30]);
        let other = imu_data(&[20, 40]);
        skip.append(&other, ImuMerge::Skip).unwrap();
        assert_eq!(skip.num_imu_frames(), 2);

        let mut merge = imu_data(&[10, 30]);
        merge.append(&other, ImuMerge::Merge).unwrap();
        let ts: Vec<u64> = merge.imu_frames().iter().map(|f| f.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_apply_transform_skips_unknown_pose() {
        let mut data = raw_data();
        data.add_frame(&color(0), &[0; 4]).unwrap();
        data.add_frame_with(&color(0), &[0; 4], unknown_pose(), 0, 0)
            .unwrap();

        let mut t = Mat4::identity();
        t[(0, 3)] = 1.0;
        t[(1, 3)] = 2.0;
        t[(2, 3)] = 3.0;
        data.apply_transform(&t);
        assert_eq!(*data.frame(0).unwrap().camera_to_world(), t);
        assert!(!data.frame(1).unwrap().has_pose());
    }

    #[test]
    fn test_free_returns_to_unconfigured() {
        let mut data = raw_data();
        data.add_frame(&color(0), &[0; 4]).unwrap();
        data.free();
        assert!(!data.is_configured());
        assert_eq!(data.num_frames(), 0);
        assert!(matches!(data.header(), Err(ContractError::NotConfigured)));
    }

    #[test]
    fn test_failed_load_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.sens");
        let mut old = raw_data();
        old.add_frame(&color(1), &[1; 4]).unwrap();
        old.save_to_file(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&5u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let mut fresh = SensorData::new();
        assert!(matches!(
            fresh.load_from_file(&path),
            Err(ContractError::VersionMismatch { found: 5, .. })
        ));
        assert!(!fresh.is_configured());
        assert_eq!(fresh.num_frames(), 0);

        let before = old.clone();
        assert!(old.load_from_file(&path).is_err());
        assert_eq!(old, before);

        assert!(matches!(
            fresh.load_from_file(&dir.path().join("missing.sens")),
            Err(ContractError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_display_summary() {
        let mut data = raw_data();
        data.add_frame(&color(0), &[0; 4]).unwrap();
        let text = data.to_string();
        assert!(text.contains("test-sensor"));
        assert!(text.contains("4x3 (TYPE_RAW)"));
        assert!(text.contains("frames:        1"));
        assert_eq!(SensorData::new().to_string(), "SensorData: not configured\n");
    }
}
