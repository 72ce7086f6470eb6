//! Layered error definitions
//!
//! Categorized by source: file / format / codec / container state / config

use thiserror::Error;

use crate::Modality;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== File Errors =====
    /// Input file does not exist
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    // ===== Format Errors =====
    /// Container written by an unsupported format version
    #[error("invalid file version: found {found} but expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// Short read or inconsistent length-prefixed section
    #[error("corrupt stream: {message}")]
    CorruptStream { message: String },

    /// Declared blob size could not be allocated
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailure { bytes: u64 },

    // ===== Codec Errors =====
    /// Compression tag not known to this implementation
    #[error("unsupported {modality} codec: {value}")]
    UnsupportedCodec { modality: Modality, value: i32 },

    /// Pixel buffer does not match the configured frame dimensions
    #[error("{modality} buffer has {actual} pixels, expected {expected}")]
    DimensionMismatch {
        modality: Modality,
        expected: usize,
        actual: usize,
    },

    /// Encoder/decoder failure reported by the underlying codec
    #[error("{modality} codec error: {message}")]
    Codec { modality: Modality, message: String },

    // ===== Container Errors =====
    /// Frame or IMU index beyond sequence length
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },

    /// Append/merge between containers with different dimensions or codecs
    #[error("incompatible container format: {message}")]
    IncompatibleFormat { message: String },

    /// Operation on a container that was never configured (or was freed)
    #[error("sensor data is not configured; call init_default or load_from_file first")]
    NotConfigured,

    /// IMU samples must arrive with non-decreasing timestamps
    #[error("imu timestamp {timestamp} is earlier than previous sample {last}")]
    ImuOutOfOrder { timestamp: u64, last: u64 },

    /// Closest-IMU lookup without any IMU samples
    #[error("no imu data available")]
    NoImuData,

    // ===== Stream Errors =====
    /// Write attempted after the output stream was closed
    #[error("output stream has been closed")]
    StreamClosed,

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid configuration value
    #[error("invalid config at '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create corrupt stream error
    pub fn corrupt_stream(message: impl Into<String>) -> Self {
        Self::CorruptStream {
            message: message.into(),
        }
    }

    /// Create incompatible format error
    pub fn incompatible_format(message: impl Into<String>) -> Self {
        Self::IncompatibleFormat {
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create invalid configuration error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create codec error
    pub fn codec(modality: Modality, message: impl Into<String>) -> Self {
        Self::Codec {
            modality,
            message: message.into(),
        }
    }

    /// Map an I/O error raised while reading a container.
    ///
    /// `UnexpectedEof` means the stream ended inside a record and is reported
    /// as `CorruptStream`; everything else stays an I/O error.
    pub fn from_read(err: std::io::Error, context: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::corrupt_stream(format!("unexpected end of stream while reading {context}"))
        } else {
            Self::Io(err)
        }
    }
}

/// Contract Result type alias
pub type Result<T> = std::result::Result<T, ContractError>;
