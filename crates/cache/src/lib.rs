//! # Cache
//!
//! Background workers that overlap codec work with the caller:
//!
//! - [`ReadCache`] decodes frames of a loaded container ahead of playback
//! - [`StreamingWriter`] compresses captured frames and appends them to a
//!   container file as they arrive
//! - [`CompressCache`] does the same into a `SensorData` kept in memory
//!
//! Both use one worker thread and a bounded channel; the caller blocks on a
//! full (write) or empty (read) queue instead of polling. Worker failures come
//! back through the handle.

mod error;
mod metrics;
mod read_cache;
mod write_cache;

pub use error::{CacheError, Result};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use read_cache::{DecodedFrame, ReadCache};
pub use write_cache::{
    resolve_output_path, CompressCache, StreamSummary, StreamTarget, StreamingWriter,
};
