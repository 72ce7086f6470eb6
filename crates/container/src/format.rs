//! Low-level wire helpers for the container format
//!
//! All integers are little-endian with no padding. Length-prefixed blobs are
//! checked against the bytes left in the stream before anything is allocated.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use contracts::{ContractError, Result};

/// Container format version written and accepted by this crate
pub const FORMAT_VERSION: u32 = 4;

/// Reader that tracks how many bytes remain in the underlying stream
pub struct ContainerReader<R> {
    inner: R,
    remaining: Option<u64>,
}

impl<R: Read> ContainerReader<R> {
    /// Wrap a stream; `total_len` is the stream length when known (files)
    pub fn new(inner: R, total_len: Option<u64>) -> Self {
        Self {
            inner,
            remaining: total_len,
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    pub fn read_u32(&mut self, context: &str) -> Result<u32> {
        ReadBytesExt::read_u32::<LittleEndian>(self)
            .map_err(|e| ContractError::from_read(e, context))
    }

    pub fn read_i32(&mut self, context: &str) -> Result<i32> {
        ReadBytesExt::read_i32::<LittleEndian>(self)
            .map_err(|e| ContractError::from_read(e, context))
    }

    pub fn read_u64(&mut self, context: &str) -> Result<u64> {
        ReadBytesExt::read_u64::<LittleEndian>(self)
            .map_err(|e| ContractError::from_read(e, context))
    }

    pub fn read_f32(&mut self, context: &str) -> Result<f32> {
        ReadBytesExt::read_f32::<LittleEndian>(self)
            .map_err(|e| ContractError::from_read(e, context))
    }

    /// Read a blob of `len` bytes
    ///
    /// # Errors
    /// - `CorruptStream` if `len` exceeds the remaining stream or the stream ends early
    /// - `AllocationFailure` if the buffer cannot be reserved
    pub fn read_blob(&mut self, len: u64, context: &str) -> Result<Bytes> {
        if let Some(remaining) = self.remaining {
            if len > remaining {
                return Err(ContractError::corrupt_stream(format!(
                    "{context} declares {len} bytes but only {remaining} remain"
                )));
            }
        }

        let capacity =
            usize::try_from(len).map_err(|_| ContractError::AllocationFailure { bytes: len })?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| ContractError::AllocationFailure { bytes: len })?;

        self.by_ref()
            .take(len)
            .read_to_end(&mut buf)
            .map_err(|e| ContractError::from_read(e, context))?;
        if buf.len() as u64 != len {
            return Err(ContractError::corrupt_stream(format!(
                "unexpected end of stream while reading {context}: got {} of {len} bytes",
                buf.len()
            )));
        }
        Ok(Bytes::from(buf))
    }
}

impl<R: Read> Read for ContainerReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(n as u64);
        }
        Ok(n)
    }
}
