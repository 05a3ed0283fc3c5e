//! Time-lapse capture hand-off
//!
//! The drawing thread composites and downsizes a frame after each stroke and
//! sends the owned buffer to a worker thread; the worker hands it to a
//! [`FrameSink`] (the encoder lives outside this crate) and posts a report
//! back through a shared queue the drawing thread drains.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::core::errors::EngineError;
use crate::file::encode_layer_png;
use crate::layer::PixelBuffer;

/// One captured frame, owned by whoever holds it
#[derive(Debug, Clone)]
pub struct TimelapseFrame {
    pub index: u64,
    pub stroke_id: u64,
    pub image: PixelBuffer,
}

/// Worker result for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    pub stroke_id: u64,
    /// Bytes written by the sink, or the sink's error message
    pub result: Result<usize, String>,
}

/// Frame consumer running on the worker thread.
pub trait FrameSink: Send + 'static {
    fn write_frame(&mut self, frame: &TimelapseFrame) -> Result<usize, EngineError>;
}

/// Keeps every frame as PNG bytes in memory.
#[derive(Debug, Clone, Default)]
pub struct PngMemorySink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PngMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the encoded frames.
    pub fn frames(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.frames)
    }
}

impl FrameSink for PngMemorySink {
    fn write_frame(&mut self, frame: &TimelapseFrame) -> Result<usize, EngineError> {
        let png = encode_layer_png(&frame.image)?;
        let len = png.len();
        self.frames.lock().push(png);
        Ok(len)
    }
}

pub struct TimelapseRecorder {
    tx: Option<UnboundedSender<TimelapseFrame>>,
    reports: Arc<Mutex<VecDeque<FrameReport>>>,
    worker: Option<JoinHandle<()>>,
    next_index: u64,
    max_dim: u32,
}

impl TimelapseRecorder {
    /// Start the worker thread feeding `sink`.
    pub fn spawn(mut sink: impl FrameSink, max_dim: u32) -> Result<Self, EngineError> {
        let (tx, mut rx) = unbounded_channel::<TimelapseFrame>();
        let reports = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&reports);

        let worker = thread::Builder::new()
            .name("timelapse".into())
            .spawn(move || {
                while let Some(frame) = rx.blocking_recv() {
                    let result = sink.write_frame(&frame).map_err(|e| e.to_string());
                    if let Err(e) = &result {
                        tracing::warn!("Time-lapse frame {} failed: {}", frame.index, e);
                    }
                    queue.lock().push_back(FrameReport {
                        index: frame.index,
                        stroke_id: frame.stroke_id,
                        result,
                    });
                }
                tracing::debug!("Time-lapse worker stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            reports,
            worker: Some(worker),
            next_index: 0,
            max_dim: max_dim.max(1),
        })
    }

    pub fn max_dim(&self) -> u32 {
        self.max_dim
    }

    pub fn frames_submitted(&self) -> u64 {
        self.next_index
    }

    /// Downsize `image` and hand it to the worker. Returns false once the
    /// worker is gone.
    pub fn submit(&mut self, stroke_id: u64, image: &PixelBuffer) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let frame = TimelapseFrame {
            index: self.next_index,
            stroke_id,
            image: image.thumbnail(self.max_dim),
        };
        if tx.send(frame).is_err() {
            tracing::warn!("Time-lapse worker gone, frame dropped");
            return false;
        }
        self.next_index += 1;
        true
    }

    /// Reports posted by the worker since the last drain.
    pub fn drain_reports(&self) -> Vec<FrameReport> {
        self.reports.lock().drain(..).collect()
    }

    /// Close the channel and wait for queued frames to be written.
    pub fn shutdown(&mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Time-lapse worker panicked");
            }
        }
    }
}

impl Drop for TimelapseRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TimelapseRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelapseRecorder")
            .field("next_index", &self.next_index)
            .field("max_dim", &self.max_dim)
            .field("running", &self.tx.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn write_frame(&mut self, _frame: &TimelapseFrame) -> Result<usize, EngineError> {
            Err(EngineError::Snapshot("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_frames_reach_sink() {
        let sink = PngMemorySink::new();
        let frames = sink.frames();
        let mut recorder = TimelapseRecorder::spawn(sink, 16).unwrap();

        let image = PixelBuffer::filled(64, 32, [255, 0, 0, 255]);
        assert!(recorder.submit(7, &image));
        assert!(recorder.submit(8, &image));
        recorder.shutdown();

        assert_eq!(frames.lock().len(), 2);
        let reports = recorder.drain_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].index, 0);
        assert_eq!(reports[1].stroke_id, 8);
        assert!(reports.iter().all(|r| r.result.is_ok()));

        let decoded = crate::file::decode_layer_png(&frames.lock()[0]).unwrap();
        assert_eq!(decoded.width(), 16);
        assert!(!recorder.submit(9, &image));
    }

    #[tokio::test]
    async fn test_sink_errors_are_reported() {
        let mut recorder = TimelapseRecorder::spawn(FailingSink, 8).unwrap();
        recorder.submit(1, &PixelBuffer::new(4, 4));
        recorder.shutdown();
        let reports = recorder.drain_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].result.as_ref().unwrap_err().contains("disk full"));
    }
}
