//! # Container
//!
//! Self-describing capture-sequence container: a header (device, calibration,
//! codecs, dimensions, depth scale), a list of compressed color/depth frames
//! and a list of IMU samples.
//!
//! ## Binary Layout (format version 4, little-endian, no padding)
//! 1. header: version, sensor name, color and depth calibration, codec tags,
//!    dimensions, depth shift
//! 2. `u64` frame count, then per frame: pose, color/depth timestamps,
//!    color/depth byte counts, color bytes, depth bytes
//! 3. `u64` IMU count, then the IMU samples

pub mod export;
mod format;
mod frame;
mod header;
pub mod import;
pub mod point_cloud;
pub mod pose;
mod sensor_data;

pub use format::{ContainerReader, FORMAT_VERSION};
pub use frame::RgbdFrame;
pub use header::{ContainerHeader, FrameFormat};
pub use sensor_data::{FrameClock, ImuMerge, SensorData};
