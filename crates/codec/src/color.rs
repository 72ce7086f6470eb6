use bytes::Bytes;
use contracts::{
    rgb_as_bytes, rgb_from_bytes, ColorCompression, ContractError, Modality, Result, Rgb8,
};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use tracing::trace;

use crate::{check_dimensions, Codec};

/// Encoder quality for lossy color frames
pub const JPEG_QUALITY: u8 = 90;

impl Codec for ColorCompression {
    type Pixel = Rgb8;

    fn modality(&self) -> Modality {
        Modality::Color
    }

    fn compress(&self, pixels: &[Rgb8], width: u32, height: u32) -> Result<Bytes> {
        check_dimensions(Modality::Color, pixels.len(), width, height)?;
        let raw = rgb_as_bytes(pixels);

        let encoded = match self {
            ColorCompression::Raw => return Ok(Bytes::copy_from_slice(raw)),
            ColorCompression::Png => {
                let mut out = Vec::new();
                PngEncoder::new(&mut out)
                    .write_image(raw, width, height, ExtendedColorType::Rgb8)
                    .map_err(image_error)?;
                out
            }
            ColorCompression::Jpeg => {
                let mut out = Vec::new();
                JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                    .encode(raw, width, height, ExtendedColorType::Rgb8)
                    .map_err(image_error)?;
                out
            }
        };

        trace!(codec = %self, raw = raw.len(), encoded = encoded.len(), "color frame encoded");
        Ok(Bytes::from(encoded))
    }

    fn decompress(&self, data: &[u8], width: u32, height: u32) -> Result<Box<[Rgb8]>> {
        let expected = crate::frame_bytes(width, height, 3)?;

        let raw = match self {
            ColorCompression::Raw => {
                if data.len() != expected {
                    return Err(ContractError::corrupt_stream(format!(
                        "raw color payload has {} bytes, expected {expected}",
                        data.len()
                    )));
                }
                return rgb_from_bytes(data)
                    .ok_or_else(|| ContractError::corrupt_stream("raw color payload misaligned"));
            }
            ColorCompression::Png => decode_image(data, ImageFormat::Png, width, height)?,
            ColorCompression::Jpeg => decode_image(data, ImageFormat::Jpeg, width, height)?,
        };

        rgb_from_bytes(&raw)
            .ok_or_else(|| ContractError::codec(Modality::Color, "decoded image is not rgb8"))
    }
}

fn decode_image(data: &[u8], format: ImageFormat, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(data, format)
        .map_err(image_error)?
        .into_rgb8();
    if image.dimensions() != (width, height) {
        return Err(ContractError::corrupt_stream(format!(
            "decoded {:?} image is {}x{}, expected {width}x{height}",
            format,
            image.width(),
            image.height()
        )));
    }
    Ok(image.into_raw())
}

fn image_error(err: image::ImageError) -> ContractError {
    ContractError::codec(Modality::Color, err.to_string())
}
