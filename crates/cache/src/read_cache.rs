//! ReadCache - background decompression for playback
//!
//! One worker thread decodes frames in order into a bounded channel;
//! `get_next` blocks until the next frame is ready or the sequence ends.
//! The worker takes a permit before each decode and the consumer hands one
//! back per delivered frame, so at most `capacity` decoded frames exist at
//! any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use async_channel::{bounded, Receiver, Sender};
use container::SensorData;
use contracts::{ColorBuffer, ContractError, DepthBuffer, Mat4};
use tracing::{debug, error, instrument, trace};

use crate::error::{CacheError, Result};
use crate::metrics::CacheMetrics;

const NAME: &str = "read";

/// One decoded frame; the caller owns both buffers
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Position in the frame sequence
    pub index: usize,
    pub color: ColorBuffer,
    pub depth: DepthBuffer,
    pub camera_to_world: Mat4,
    pub timestamp_color: u64,
    pub timestamp_depth: u64,
}

type Slot = std::result::Result<DecodedFrame, ContractError>;

/// Handle to a running decode worker
pub struct ReadCache {
    rx: Receiver<Slot>,
    permits: Sender<()>,
    stop: Arc<AtomicBool>,
    metrics: Arc<CacheMetrics>,
    worker: Option<JoinHandle<()>>,
    total_frames: usize,
}

impl ReadCache {
    /// Start decoding `data` ahead of consumption, at most `capacity` frames
    ///
    /// The worker decodes from its own snapshot of `data`; compressed payloads
    /// are shared, not copied.
    #[instrument(name = "read_cache_spawn", skip(data), fields(frames = data.num_frames()))]
    pub fn spawn(data: &SensorData, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ContractError::invalid_config("read_capacity", "must be at least 1").into());
        }
        data.header()?;

        let (tx, rx) = bounded(capacity);
        let (permits, permit_rx) = bounded(capacity);
        for _ in 0..capacity {
            permits
                .try_send(())
                .map_err(|_| CacheError::Aborted { name: NAME })?;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(CacheMetrics::new());
        let total_frames = data.num_frames();

        let snapshot = data.clone();
        let worker_stop = Arc::clone(&stop);
        let worker_metrics = Arc::clone(&metrics);
        let worker = std::thread::Builder::new()
            .name("read-cache".to_string())
            .spawn(move || read_worker(snapshot, tx, permit_rx, worker_stop, worker_metrics))
            .map_err(|e| CacheError::worker_spawn(NAME, e))?;

        debug!(capacity, "read cache started");
        Ok(Self {
            rx,
            permits,
            stop,
            metrics,
            worker: Some(worker),
            total_frames,
        })
    }

    /// Number of frames the cache will deliver
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Next decoded frame in sequence order, `None` at end of stream
    ///
    /// Blocks until the worker has a frame ready. A decode failure is
    /// returned once; the stream ends after it.
    pub fn get_next(&mut self) -> Result<Option<DecodedFrame>> {
        match self.rx.recv_blocking() {
            Ok(slot) => {
                // worker may already be gone
                let _ = self.permits.try_send(());
                self.metrics.set_queue_len(self.rx.len());
                let frame = slot?;
                trace!(index = frame.index, "frame delivered");
                Ok(Some(frame))
            }
            // closed and drained
            Err(_) => {
                self.join_worker()?;
                Ok(None)
            }
        }
    }

    /// Stop the worker, abandoning frames not yet delivered
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        self.permits.close();
        self.rx.close();
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CacheError::WorkerPanicked { name: NAME }),
            None => Ok(()),
        }
    }
}

impl Iterator for ReadCache {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}

impl Drop for ReadCache {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "read cache shutdown failed");
        }
    }
}

fn read_worker(
    data: SensorData,
    tx: Sender<Slot>,
    permits: Receiver<()>,
    stop: Arc<AtomicBool>,
    metrics: Arc<CacheMetrics>,
) {
    debug!("read worker started");

    for index in 0..data.num_frames() {
        if stop.load(Ordering::Relaxed) || permits.recv_blocking().is_err() {
            break;
        }

        let slot = decode_frame(&data, index);
        let failed = slot.is_err();
        if let Err(e) = &slot {
            metrics.inc_failure_count();
            observability::record_cache_error(NAME);
            error!(index, error = %e, "frame decode failed");
        }

        metrics.inc_queued_count();
        if tx.send_blocking(slot).is_err() {
            debug!(index, "read cache closed, abandoning remaining frames");
            break;
        }
        metrics.inc_processed_count();
        metrics.set_queue_len(tx.len());
        observability::record_queue_depth(NAME, tx.len());

        if failed {
            break;
        }
    }

    debug!(decoded = metrics.processed_count(), "read worker stopped");
}

fn decode_frame(data: &SensorData, index: usize) -> Slot {
    let frame = data.frame(index)?;
    Ok(DecodedFrame {
        index,
        color: data.decompress_color_frame(frame)?,
        depth: data.decompress_depth_frame(frame)?,
        camera_to_world: *frame.camera_to_world(),
        timestamp_color: frame.timestamp_color(),
        timestamp_depth: frame.timestamp_depth(),
    })
}
