//! Codec and container metrics
//!
//! Recorded through the `metrics` facade; every helper is a no-op until a
//! recorder (e.g. the Prometheus exporter) is installed.

use contracts::Modality;
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

pub const FRAMES_ENCODED: &str = "sens_frames_encoded_total";
pub const ENCODED_BYTES: &str = "sens_encoded_bytes_total";
pub const COMPRESSION_RATIO: &str = "sens_compression_ratio";
pub const FRAMES_DECODED: &str = "sens_frames_decoded_total";
pub const CACHE_QUEUE_DEPTH: &str = "sens_cache_queue_depth";
pub const CACHE_ERRORS: &str = "sens_cache_errors_total";
pub const CONTAINER_OPS: &str = "sens_container_ops_total";
pub const CONTAINER_FRAMES: &str = "sens_container_frames_total";
pub const CONTAINER_BYTES: &str = "sens_container_bytes_total";

/// Register units and help text with the installed recorder
pub fn describe_metrics() {
    describe_counter!(
        FRAMES_ENCODED,
        Unit::Count,
        "Frame payloads compressed, per modality and codec"
    );
    describe_counter!(ENCODED_BYTES, Unit::Bytes, "Compressed payload bytes produced");
    describe_histogram!(COMPRESSION_RATIO, "Raw payload size over compressed size");
    describe_counter!(FRAMES_DECODED, Unit::Count, "Frame payloads decompressed");
    describe_gauge!(CACHE_QUEUE_DEPTH, Unit::Count, "Frames waiting in a read or write cache");
    describe_counter!(CACHE_ERRORS, Unit::Count, "Background cache worker failures");
    describe_counter!(CONTAINER_OPS, Unit::Count, "Save, load, export and stream operations");
    describe_counter!(CONTAINER_FRAMES, Unit::Count, "Frames moved by container operations");
    describe_counter!(CONTAINER_BYTES, Unit::Bytes, "File bytes moved by container operations");
}

/// Record one encoded frame payload
pub fn record_frame_encoded(
    modality: Modality,
    codec: &'static str,
    raw_bytes: usize,
    encoded_bytes: usize,
) {
    counter!(FRAMES_ENCODED, "modality" => modality.as_str(), "codec" => codec).increment(1);
    counter!(ENCODED_BYTES, "modality" => modality.as_str()).increment(encoded_bytes as u64);

    if encoded_bytes > 0 {
        histogram!(COMPRESSION_RATIO, "modality" => modality.as_str(), "codec" => codec)
            .record(raw_bytes as f64 / encoded_bytes as f64);
    }
}

/// Record one decoded frame payload
pub fn record_frame_decoded(modality: Modality, codec: &'static str) {
    counter!(FRAMES_DECODED, "modality" => modality.as_str(), "codec" => codec).increment(1);
}

/// Record the number of entries waiting in a cache queue
pub fn record_queue_depth(cache: &'static str, depth: usize) {
    gauge!(CACHE_QUEUE_DEPTH, "cache" => cache).set(depth as f64);
}

/// Record a background worker failure
pub fn record_cache_error(cache: &'static str) {
    counter!(CACHE_ERRORS, "cache" => cache).increment(1);
}

/// Record a whole-container operation (save / load / export / stream)
pub fn record_container_io(op: &'static str, frames: u64, bytes: u64) {
    counter!(CONTAINER_OPS, "op" => op).increment(1);
    counter!(CONTAINER_FRAMES, "op" => op).increment(frames);
    counter!(CONTAINER_BYTES, "op" => op).increment(bytes);
}

/// In-memory compression statistics, for end-of-run reports
#[derive(Debug, Clone, Default)]
pub struct CompressionAggregator {
    pub frames: u64,
    pub raw_bytes: u64,
    pub encoded_bytes: u64,
    /// Color raw/encoded ratio per frame
    pub color_ratio: RunningStats,
    /// Depth raw/encoded ratio per frame
    pub depth_ratio: RunningStats,
}

impl CompressionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame given raw and encoded byte counts of both payloads
    pub fn update(&mut self, color: (usize, usize), depth: (usize, usize)) {
        self.frames += 1;
        self.raw_bytes += (color.0 + depth.0) as u64;
        self.encoded_bytes += (color.1 + depth.1) as u64;
        if color.1 > 0 {
            self.color_ratio.push(color.0 as f64 / color.1 as f64);
        }
        if depth.1 > 0 {
            self.depth_ratio.push(depth.0 as f64 / depth.1 as f64);
        }
    }

    pub fn summary(&self) -> CompressionSummary {
        CompressionSummary {
            frames: self.frames,
            raw_bytes: self.raw_bytes,
            encoded_bytes: self.encoded_bytes,
            overall_ratio: if self.encoded_bytes > 0 {
                self.raw_bytes as f64 / self.encoded_bytes as f64
            } else {
                0.0
            },
            color_ratio: StatsSummary::from(&self.color_ratio),
            depth_ratio: StatsSummary::from(&self.depth_ratio),
        }
    }
}

/// Compression report
#[derive(Debug, Clone, Default)]
pub struct CompressionSummary {
    pub frames: u64,
    pub raw_bytes: u64,
    pub encoded_bytes: u64,
    pub overall_ratio: f64,
    pub color_ratio: StatsSummary,
    pub depth_ratio: StatsSummary,
}

impl std::fmt::Display for CompressionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Compression Summary ===")?;
        writeln!(f, "Frames: {}", self.frames)?;
        writeln!(
            f,
            "Bytes: {} raw -> {} encoded (ratio {:.2})",
            self.raw_bytes, self.encoded_bytes, self.overall_ratio
        )?;
        writeln!(f, "Color ratio: {}", self.color_ratio)?;
        writeln!(f, "Depth ratio: {}", self.depth_ratio)
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean / variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
