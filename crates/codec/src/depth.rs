use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use contracts::{ContractError, DepthCompression, Modality, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::trace;

use crate::{check_dimensions, frame_bytes, occi, pixel_count, Codec};

/// Zlib level used for depth frames
pub const ZLIB_LEVEL: u32 = 8;

impl Codec for DepthCompression {
    type Pixel = u16;

    fn modality(&self) -> Modality {
        Modality::Depth
    }

    fn compress(&self, pixels: &[u16], width: u32, height: u32) -> Result<Bytes> {
        check_dimensions(Modality::Depth, pixels.len(), width, height)?;

        let encoded = match self {
            DepthCompression::Raw => samples_to_le(pixels),
            DepthCompression::Zlib => zlib_compress(&samples_to_le(pixels))
                .map_err(|e| ContractError::codec(Modality::Depth, e.to_string()))?,
            DepthCompression::Occi => occi::encode(pixels),
        };

        trace!(
            codec = %self,
            samples = pixels.len(),
            encoded = encoded.len(),
            "depth frame encoded"
        );
        Ok(Bytes::from(encoded))
    }

    fn decompress(&self, data: &[u8], width: u32, height: u32) -> Result<Box<[u16]>> {
        let count = pixel_count(width, height);
        let byte_len = frame_bytes(width, height, 2)?;

        let samples = match self {
            DepthCompression::Raw => samples_from_le(data, byte_len)?,
            DepthCompression::Zlib => {
                let mut raw = Vec::new();
                raw.try_reserve_exact(byte_len)
                    .map_err(|_| ContractError::AllocationFailure {
                        bytes: byte_len as u64,
                    })?;
                // one extra byte exposes oversized streams
                ZlibDecoder::new(data)
                    .take(byte_len as u64 + 1)
                    .read_to_end(&mut raw)
                    .map_err(|e| ContractError::codec(Modality::Depth, e.to_string()))?;
                samples_from_le(&raw, byte_len)?
            }
            DepthCompression::Occi => occi::decode(data, count)?,
        };

        Ok(samples.into_boxed_slice())
    }
}

fn zlib_compress(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(ZLIB_LEVEL));
    encoder.write_all(raw)?;
    encoder.finish()
}

fn samples_to_le(samples: &[u16]) -> Vec<u8> {
    let mut out = vec![0u8; samples.len() * 2];
    LittleEndian::write_u16_into(samples, &mut out);
    out
}

fn samples_from_le(data: &[u8], byte_len: usize) -> Result<Vec<u16>> {
    if data.len() != byte_len {
        return Err(ContractError::corrupt_stream(format!(
            "depth payload decodes to {} bytes, expected {byte_len}",
            data.len()
        )));
    }
    let mut samples = vec![0u16; byte_len / 2];
    LittleEndian::read_u16_into(data, &mut samples);
    Ok(samples)
}
