//! Compression tags
//!
//! The numeric values are part of the container format and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ContractError, Result};

/// Image modality a codec operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Color,
    Depth,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Color => "color",
            Modality::Depth => "depth",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color compression strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCompression {
    /// Uncompressed RGB8 pixels
    Raw,
    /// Lossless PNG
    Png,
    /// Lossy JPEG
    #[default]
    Jpeg,
}

impl ColorCompression {
    /// Wire value stored in the container header
    pub fn to_wire(self) -> i32 {
        match self {
            ColorCompression::Raw => 0,
            ColorCompression::Png => 1,
            ColorCompression::Jpeg => 2,
        }
    }

    /// Parse a wire value
    ///
    /// # Errors
    /// `UnsupportedCodec` for any value without a matching strategy
    pub fn from_wire(value: i32) -> Result<Self> {
        match value {
            0 => Ok(ColorCompression::Raw),
            1 => Ok(ColorCompression::Png),
            2 => Ok(ColorCompression::Jpeg),
            _ => Err(ContractError::UnsupportedCodec {
                modality: Modality::Color,
                value,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorCompression::Raw => "TYPE_RAW",
            ColorCompression::Png => "TYPE_PNG",
            ColorCompression::Jpeg => "TYPE_JPEG",
        }
    }

    /// File extension used when the compressed bytes are exported as-is
    pub fn file_extension(&self) -> &'static str {
        match self {
            ColorCompression::Jpeg => "jpg",
            ColorCompression::Raw | ColorCompression::Png => "png",
        }
    }
}

impl fmt::Display for ColorCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Depth compression strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthCompression {
    /// Uncompressed little-endian u16 samples
    Raw,
    /// Zlib stream over the raw samples
    #[default]
    Zlib,
    /// Delta/run-length bitstream over the samples
    Occi,
}

impl DepthCompression {
    /// Wire value stored in the container header
    pub fn to_wire(self) -> i32 {
        match self {
            DepthCompression::Raw => 0,
            DepthCompression::Zlib => 1,
            DepthCompression::Occi => 2,
        }
    }

    /// Parse a wire value
    ///
    /// # Errors
    /// `UnsupportedCodec` for any value without a matching strategy
    pub fn from_wire(value: i32) -> Result<Self> {
        match value {
            0 => Ok(DepthCompression::Raw),
            1 => Ok(DepthCompression::Zlib),
            2 => Ok(DepthCompression::Occi),
            _ => Err(ContractError::UnsupportedCodec {
                modality: Modality::Depth,
                value,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DepthCompression::Raw => "TYPE_RAW_USHORT",
            DepthCompression::Zlib => "TYPE_ZLIB_USHORT",
            DepthCompression::Occi => "TYPE_OCCI_USHORT",
        }
    }
}

impl fmt::Display for DepthCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
