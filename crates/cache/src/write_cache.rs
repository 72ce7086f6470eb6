//! Background frame compression
//!
//! The producer hands owned pixel buffers to a bounded queue and blocks when
//! it is full. A single worker compresses each frame against the template's
//! codecs and hands it to an output:
//!
//! - [`StreamingWriter`] appends to a container file (or any seekable
//!   [`StreamTarget`]); the frame count is patched in on close
//! - [`CompressCache`] appends to a `SensorData` held in memory, returned
//!   on close

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_channel::{bounded, Receiver, Sender};
use byteorder::{LittleEndian, WriteBytesExt};
use container::{FrameFormat, RgbdFrame, SensorData};
use contracts::{ColorBuffer, ContractError, DepthBuffer, Mat4, Modality};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{CacheError, Result};
use crate::metrics::CacheMetrics;

const NAME: &str = "write";

/// Seekable byte sink a stream can be written to
///
/// The frame count placeholder is patched in place on close, so the target
/// must support seeking back.
pub trait StreamTarget: Write + Seek + Send + 'static {
    /// Make everything written so far durable
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

impl StreamTarget for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

impl StreamTarget for Cursor<Vec<u8>> {}

/// Result of a finished stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// File actually written (may differ from the requested path); empty
    /// for targets opened with [`StreamingWriter::with_target`]
    pub path: PathBuf,
    pub frames: u64,
    pub bytes: u64,
}

struct WriteRequest {
    color: ColorBuffer,
    depth: DepthBuffer,
    camera_to_world: Mat4,
    timestamp_color: u64,
    timestamp_depth: u64,
}

type FailureSlot = Arc<Mutex<Option<ContractError>>>;

/// Handle to a running compress-and-write worker
///
/// `R` is what `close` hands back: a [`StreamSummary`] for streams, the
/// filled `SensorData` for [`CompressCache`].
pub struct StreamingWriter<R = StreamSummary> {
    tx: Option<Sender<WriteRequest>>,
    worker: Option<JoinHandle<Option<R>>>,
    failure: FailureSlot,
    metrics: Arc<CacheMetrics>,
    format: FrameFormat,
    path: PathBuf,
}

/// Background compression into an in-memory container
pub type CompressCache = StreamingWriter<SensorData>;

impl StreamingWriter<StreamSummary> {
    /// Open `path` for streaming, using `template` for header and codecs
    ///
    /// Only the template's header is used; its frames are not written.
    /// With `overwrite == false` an existing file is kept and the next free
    /// numbered name is used instead (`scan.sens` -> `scan1.sens`).
    #[instrument(name = "streaming_writer_create", skip(template), fields(path = %path.display()))]
    pub fn create(
        template: &SensorData,
        path: &Path,
        capacity: usize,
        overwrite: bool,
    ) -> Result<Self> {
        check_capacity(capacity)?;
        template.header()?;

        let path = resolve_output_path(path, overwrite);
        let file = File::create(&path).map_err(ContractError::from)?;
        let writer = Self::stream(template, file, capacity, path)?;
        info!(path = %writer.path.display(), capacity, "streaming writer started");
        Ok(writer)
    }

    /// Stream into any seekable target instead of a file
    pub fn with_target<W: StreamTarget>(
        template: &SensorData,
        target: W,
        capacity: usize,
    ) -> Result<Self> {
        check_capacity(capacity)?;
        Self::stream(template, target, capacity, PathBuf::new())
    }

    fn stream<W: StreamTarget>(
        template: &SensorData,
        target: W,
        capacity: usize,
        path: PathBuf,
    ) -> Result<Self> {
        let header = template.header()?.clone();
        let sink = FrameSink {
            data: SensorData::with_header(header)?,
            out: BufWriter::new(target),
            path: path.clone(),
            count_offset: None,
            frames: 0,
        };
        Self::spawn(sink, capacity, path)
    }
}

impl StreamingWriter<SensorData> {
    /// Compress frames in the background and append them to `data`
    ///
    /// Frames already in `data` are kept; `close` returns it with the new
    /// frames appended in submission order.
    pub fn in_memory(data: SensorData, capacity: usize) -> Result<Self> {
        check_capacity(capacity)?;
        data.header()?;
        debug!(frames = data.num_frames(), capacity, "compress cache started");
        Self::spawn(data, capacity, PathBuf::new())
    }
}

impl<R: Send + 'static> StreamingWriter<R> {
    fn spawn<O>(output: O, capacity: usize, path: PathBuf) -> Result<Self>
    where
        O: FrameOutput<Report = R>,
    {
        let format = *output.data().format()?;
        let (tx, rx) = bounded(capacity);
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let metrics = Arc::new(CacheMetrics::new());

        let worker_failure = Arc::clone(&failure);
        let worker_metrics = Arc::clone(&metrics);
        let worker = std::thread::Builder::new()
            .name("write-cache".to_string())
            .spawn(move || write_worker(output, rx, worker_failure, worker_metrics))
            .map_err(|e| CacheError::worker_spawn(NAME, e))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            failure,
            metrics,
            format,
            path,
        })
    }

    /// Output file path; empty unless opened with `create`
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Requests accepted but not yet picked up by the worker
    pub fn queue_len(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.len())
    }

    /// Queue a frame for compression and writing, taking ownership of the buffers
    ///
    /// Blocks while the queue is full.
    ///
    /// # Errors
    /// - `DimensionMismatch` if a buffer does not match the template size
    /// - `StreamClosed` after `close`
    /// - the worker's error if an earlier frame failed, then `Aborted`
    pub fn write_next_and_free(
        &self,
        color: ColorBuffer,
        depth: DepthBuffer,
        camera_to_world: Mat4,
        timestamp_color: u64,
        timestamp_depth: u64,
    ) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(ContractError::StreamClosed)?;
        self.take_failure()?;

        check_len(Modality::Color, color.len(), self.format.color_pixels())?;
        check_len(Modality::Depth, depth.len(), self.format.depth_pixels())?;

        let request = WriteRequest {
            color,
            depth,
            camera_to_world,
            timestamp_color,
            timestamp_depth,
        };
        if tx.send_blocking(request).is_err() {
            // worker closed the queue after a failure
            self.take_failure()?;
            return Err(CacheError::Aborted { name: NAME });
        }

        self.metrics.inc_queued_count();
        self.metrics.set_queue_len(tx.len());
        observability::record_queue_depth(NAME, tx.len());
        Ok(())
    }

    /// Drain the queue, finalize the output and return it
    ///
    /// A second call fails with `StreamClosed`.
    #[instrument(name = "streaming_writer_close", skip(self), fields(path = %self.path.display()))]
    pub fn close(&mut self) -> Result<R> {
        let tx = self.tx.take().ok_or(ContractError::StreamClosed)?;
        drop(tx);

        let report = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CacheError::WorkerPanicked { name: NAME })?,
            None => None,
        };
        self.take_failure()?;

        report.ok_or(CacheError::Aborted { name: NAME })
    }
}

impl<R> StreamingWriter<R> {
    fn take_failure(&self) -> Result<()> {
        let stored = match self.failure.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match stored {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl<R> Drop for StreamingWriter<R> {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        drop(tx);
        let finished = match self.worker.take() {
            Some(handle) => handle.join().is_ok_and(|report| report.is_some()),
            None => false,
        };
        if let Err(e) = self.take_failure() {
            error!(error = %e, path = %self.path.display(), "background writer failed");
        } else if !finished {
            error!(path = %self.path.display(), "background writer did not finish cleanly");
        }
    }
}

/// Pick the output path, avoiding existing files unless `overwrite` is set
///
/// A trailing number in the file stem is incremented until a free name is
/// found: `scan.sens` -> `scan1.sens`, `scan7.sens` -> `scan8.sens`.
pub fn resolve_output_path(path: &Path, overwrite: bool) -> PathBuf {
    if overwrite || !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let base = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let mut number: u64 = stem[base.len()..].parse().unwrap_or(0);

    loop {
        number += 1;
        let candidate = path.with_file_name(format!("{base}{number}{extension}"));
        if !candidate.exists() {
            warn!(
                requested = %path.display(),
                actual = %candidate.display(),
                "output exists, writing to a new file"
            );
            return candidate;
        }
    }
}

fn check_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(ContractError::invalid_config("write_capacity", "must be at least 1").into());
    }
    Ok(())
}

fn check_len(modality: Modality, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(ContractError::DimensionMismatch {
            modality,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Where the worker puts compressed frames
trait FrameOutput: Send + 'static {
    type Report: Send + 'static;

    /// Container whose codecs and dimensions frames are compressed against
    fn data(&self) -> &SensorData;

    fn append(&mut self, frame: RgbdFrame) -> contracts::Result<()>;

    fn finish(self) -> contracts::Result<Self::Report>;
}

impl FrameOutput for SensorData {
    type Report = SensorData;

    fn data(&self) -> &SensorData {
        self
    }

    fn append(&mut self, frame: RgbdFrame) -> contracts::Result<()> {
        self.push_frame(frame);
        Ok(())
    }

    fn finish(self) -> contracts::Result<SensorData> {
        debug!(frames = self.num_frames(), "compress cache finished");
        Ok(self)
    }
}

/// Worker-side stream state
struct FrameSink<W: StreamTarget> {
    data: SensorData,
    out: BufWriter<W>,
    path: PathBuf,
    /// Position of the frame count placeholder once the header is out
    count_offset: Option<u64>,
    frames: u64,
}

impl<W: StreamTarget> FrameSink<W> {
    fn begin(&mut self) -> contracts::Result<u64> {
        self.data.header()?.write_to(&mut self.out)?;
        let offset = self.out.stream_position()?;
        self.out.write_u64::<LittleEndian>(0)?;
        self.count_offset = Some(offset);
        Ok(offset)
    }
}

impl<W: StreamTarget> FrameOutput for FrameSink<W> {
    type Report = StreamSummary;

    fn data(&self) -> &SensorData {
        &self.data
    }

    fn append(&mut self, frame: RgbdFrame) -> contracts::Result<()> {
        if self.count_offset.is_none() {
            self.begin()?;
        }
        frame.write_to(&mut self.out)?;
        self.frames += 1;
        trace!(frame = self.frames, bytes = frame.encoded_len(), "frame written");
        Ok(())
    }

    /// Write the IMU count, patch the frame count and flush
    fn finish(mut self) -> contracts::Result<StreamSummary> {
        let offset = match self.count_offset {
            Some(offset) => offset,
            None => self.begin()?,
        };
        self.out.write_u64::<LittleEndian>(0)?;
        let end = self.out.stream_position()?;

        self.out.seek(SeekFrom::Start(offset))?;
        self.out.write_u64::<LittleEndian>(self.frames)?;
        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        self.out.get_ref().sync()?;

        observability::record_container_io("stream", self.frames, end);
        info!(frames = self.frames, bytes = end, "stream finalized");
        Ok(StreamSummary {
            path: self.path,
            frames: self.frames,
            bytes: end,
        })
    }
}

fn write_worker<O: FrameOutput>(
    mut output: O,
    rx: Receiver<WriteRequest>,
    failure: FailureSlot,
    metrics: Arc<CacheMetrics>,
) -> Option<O::Report> {
    debug!("write worker started");

    // the error is stored before the queue closes so a rejected send finds it
    let fail = |e: ContractError| {
        error!(error = %e, "background write failed");
        match failure.lock() {
            Ok(mut slot) => *slot = Some(e),
            Err(poisoned) => *poisoned.into_inner() = Some(e),
        }
        rx.close();
        metrics.inc_failure_count();
        observability::record_cache_error(NAME);
    };

    while let Ok(request) = rx.recv_blocking() {
        metrics.set_queue_len(rx.len());
        let frame = output.data().create_frame(
            &request.color,
            &request.depth,
            request.camera_to_world,
            request.timestamp_color,
            request.timestamp_depth,
        );
        drop(request);

        if let Err(e) = frame.and_then(|frame| output.append(frame)) {
            fail(e);
            return None;
        }
        metrics.inc_processed_count();
    }

    match output.finish() {
        Ok(report) => {
            debug!(processed = metrics.processed_count(), "write worker stopped");
            Some(report)
        }
        Err(e) => {
            fail(e);
            None
        }
    }
}
