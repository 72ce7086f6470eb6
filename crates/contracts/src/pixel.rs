//! Pixel types and owned pixel buffers
//!
//! Buffers crossing an API boundary are boxed slices: whoever holds the box
//! owns the pixels, and handing it over moves it.

use bytemuck::{Pod, Zeroable};

/// 8-bit RGB pixel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Owned color frame, `width * height` pixels row by row
pub type ColorBuffer = Box<[Rgb8]>;

/// Owned depth frame, `width * height` samples row by row
pub type DepthBuffer = Box<[u16]>;

/// View color pixels as interleaved RGB bytes
pub fn rgb_as_bytes(pixels: &[Rgb8]) -> &[u8] {
    bytemuck::cast_slice(pixels)
}

/// Copy interleaved RGB bytes into an owned color buffer
///
/// Returns `None` if the byte count is not a multiple of 3.
pub fn rgb_from_bytes(bytes: &[u8]) -> Option<ColorBuffer> {
    bytemuck::try_cast_slice::<u8, Rgb8>(bytes)
        .ok()
        .map(|pixels| pixels.to_vec().into_boxed_slice())
}
