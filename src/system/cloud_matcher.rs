//! Cloud matcher - top-level entry point.
//!
//! The `CloudMatcher` owns the tracking engine for one sensor stream and the
//! output adapters its events go to. Frames are processed in the calling
//! thread; the optional trajectory writer runs on its own thread behind a
//! bounded channel.

use std::path::PathBuf;
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::cloud::PointBatch;
use crate::config::TrackerConfig;
use crate::geometry::SE3;
use crate::io::CloudSequence;
use crate::output::{spawn_trajectory_writer, ChannelAdapter, OutputAdapter, WriterStats};
use crate::registration::{IcpSequence, Registration};
use crate::tracking::{FrameReport, TrackingEngine, TrackingStats};

/// Capacity of the event channel between tracking and the trajectory writer.
/// When the channel is full, tracking blocks briefly.
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Frames between progress log lines in [`CloudMatcher::run`].
const PROGRESS_INTERVAL: usize = 100;

pub struct CloudMatcher<R: Registration = IcpSequence> {
    engine: TrackingEngine<R>,
    outputs: Vec<Box<dyn OutputAdapter + Send>>,
    writer_handle: Option<JoinHandle<Result<WriterStats>>>,
}

impl CloudMatcher<IcpSequence> {
    /// Create a matcher tracking with the built-in keyframe ICP.
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_registration(IcpSequence::new(config.icp.clone()), config)
    }
}

impl<R: Registration> CloudMatcher<R> {
    pub fn with_registration(registration: R, config: &TrackerConfig) -> Self {
        Self {
            engine: TrackingEngine::new(registration, config),
            outputs: Vec::new(),
            writer_handle: None,
        }
    }

    /// Send every event to `adapter` as well.
    pub fn add_output(&mut self, adapter: Box<dyn OutputAdapter + Send>) {
        self.outputs.push(adapter);
    }

    /// Stream events to CSV files in `dir` from a background thread.
    pub fn write_trajectory_to(&mut self, dir: PathBuf) -> Result<()> {
        if self.writer_handle.is_some() {
            return Err(anyhow!("trajectory writer already running"));
        }
        let (adapter, receiver) = ChannelAdapter::bounded(OUTPUT_CHANNEL_CAPACITY);
        let handle = spawn_trajectory_writer(
            receiver,
            dir,
            self.engine.fixed_frame().to_string(),
            self.engine.sensor_frame().to_string(),
        );
        self.outputs.push(Box::new(adapter));
        self.writer_handle = Some(handle);
        Ok(())
    }

    /// Process a single frame.
    pub fn process(&mut self, batch: &PointBatch) -> FrameReport {
        self.engine.process(batch, &mut self.outputs)
    }

    /// Replay a recorded sequence in order. Frames that fail to load are
    /// logged, counted and skipped.
    pub fn run(&mut self, sequence: &CloudSequence) -> Result<TrackingStats> {
        for (i, batch) in sequence.iter().enumerate() {
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Skipping frame {}: {:#}", i, e);
                    self.engine.skip_unreadable();
                    continue;
                }
            };
            let report = self.process(&batch);

            if i % PROGRESS_INTERVAL == 0 {
                let t = report.pose.translation;
                info!(
                    "Frame {}/{}: status={:?}, pose=[{:.3}, {:.3}, {:.3}], {:.1} ms",
                    i,
                    sequence.len(),
                    report.status,
                    t.x,
                    t.y,
                    t.z,
                    report.elapsed_ms
                );
            }
        }
        Ok(*self.engine.state().stats())
    }

    pub fn pose(&self) -> &SE3 {
        self.engine.pose()
    }

    pub fn engine(&self) -> &TrackingEngine<R> {
        &self.engine
    }

    /// Close every output and wait for the trajectory writer.
    pub fn shutdown(&mut self) -> Result<Option<WriterStats>> {
        // Dropping the channel adapter ends the writer loop.
        self.outputs.clear();

        match self.writer_handle.take() {
            Some(handle) => {
                let stats = handle
                    .join()
                    .map_err(|_| anyhow!("trajectory writer thread panicked"))??;
                Ok(Some(stats))
            }
            None => Ok(None),
        }
    }
}

impl<R: Registration> Drop for CloudMatcher<R> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Shutdown failed: {:#}", e);
        }
    }
}
