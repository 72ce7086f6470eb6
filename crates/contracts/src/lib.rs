//! # Contracts
//!
//! Frozen interface contracts shared by the container engine.
//! All crates depend on this crate; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are opaque monotonic `u64` clock units, typically microseconds
//! - Color and depth frames carry independent timestamps

mod calibration;
mod compression;
mod error;
mod imu;
mod math;
mod pixel;
pub mod sensor;

pub use calibration::{read_mat4, write_mat4, CalibrationData};
pub use compression::{ColorCompression, DepthCompression, Modality};
pub use error::{ContractError, Result};
pub use imu::ImuFrame;
pub use math::{is_unknown_pose, mat4_from_row_major, mat4_to_row_major, unknown_pose, Mat4, Vec3d};
pub use pixel::{rgb_as_bytes, rgb_from_bytes, ColorBuffer, DepthBuffer, Rgb8};
