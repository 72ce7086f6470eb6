//! # Codec
//!
//! Per-modality compression strategies for frame payloads.
//!
//! The compression tags from `contracts` are the strategies themselves:
//! [`ColorCompression`] encodes `Rgb8` frames and [`DepthCompression`]
//! encodes 16-bit depth frames, both through the [`Codec`] trait.
//!
//! ```ignore
//! let bytes = DepthCompression::Zlib.compress(&depth, 640, 480)?;
//! let pixels = DepthCompression::Zlib.decompress(&bytes, 640, 480)?;
//! ```

pub mod bitstream;
mod color;
mod depth;
pub mod occi;

use bytes::Bytes;
use contracts::{ContractError, Modality, Result};

pub use contracts::{ColorCompression, DepthCompression};

/// Compression strategy for one modality
pub trait Codec {
    /// Pixel type this strategy operates on
    type Pixel: Copy;

    /// Modality this strategy belongs to
    fn modality(&self) -> Modality;

    /// Compress `width * height` pixels into an owned byte payload
    ///
    /// # Errors
    /// - `DimensionMismatch` if `pixels.len() != width * height`
    /// - `Codec` if the underlying encoder fails
    fn compress(&self, pixels: &[Self::Pixel], width: u32, height: u32) -> Result<Bytes>;

    /// Decompress a payload into a newly allocated `width * height` buffer
    ///
    /// # Errors
    /// - `CorruptStream` if the payload does not decode to exactly
    ///   `width * height` pixels
    /// - `Codec` if the underlying decoder fails
    fn decompress(&self, data: &[u8], width: u32, height: u32) -> Result<Box<[Self::Pixel]>>;
}

/// Number of pixels in a `width x height` frame
pub fn pixel_count(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize)
}

/// Byte length of a `width x height` frame of `bytes_per_pixel` wide pixels
///
/// # Errors
/// `AllocationFailure` if the length does not fit in `usize`
pub fn frame_bytes(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or(ContractError::AllocationFailure {
            bytes: u64::from(width)
                .saturating_mul(u64::from(height))
                .saturating_mul(bytes_per_pixel as u64),
        })
}

/// Verify a pixel buffer against the frame dimensions
pub(crate) fn check_dimensions(
    modality: Modality,
    actual: usize,
    width: u32,
    height: u32,
) -> Result<usize> {
    let expected = pixel_count(width, height);
    if actual != expected {
        return Err(ContractError::DimensionMismatch {
            modality,
            expected,
            actual,
        });
    }
    Ok(expected)
}
