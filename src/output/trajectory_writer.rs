//! CSV trajectory output.
//!
//! Writes three files into an output directory:
//! - `tf.csv`: every transform broadcast
//! - `path.csv`: the keyframe path history
//! - `delta_pose.csv`: delta poses, failures as all-NaN rows

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use csv::Writer;
use tracing::{info, warn};

use super::messages::{
    DeltaPose, DeltaPoseMessage, OutputEvent, PoseStamped, StampedPoseRecord, TransformBroadcast,
};
use super::OutputAdapter;

/// Counts of rows written per file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub transforms: usize,
    pub keyframes: usize,
    pub delta_poses: usize,
    pub failed_delta_poses: usize,
}

pub struct TrajectoryWriter {
    fixed_frame: String,
    sensor_frame: String,
    tf: Writer<File>,
    path: Writer<File>,
    delta: Writer<File>,
    stats: WriterStats,
}

impl TrajectoryWriter {
    /// Path rows are stamped with `fixed_frame` as parent and `sensor_frame`
    /// as the frame of each pose.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        fixed_frame: impl Into<String>,
        sensor_frame: impl Into<String>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        Ok(Self {
            fixed_frame: fixed_frame.into(),
            sensor_frame: sensor_frame.into(),
            tf: open_csv(dir.join("tf.csv"))?,
            path: open_csv(dir.join("path.csv"))?,
            delta: open_csv(dir.join("delta_pose.csv"))?,
            stats: WriterStats::default(),
        })
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn write_event(&mut self, event: &OutputEvent) -> Result<()> {
        match event {
            OutputEvent::Transform(tf) => self.write_transform(tf),
            OutputEvent::Keyframe(pose) => self.write_keyframe(pose),
            OutputEvent::DeltaPose(delta) => self.write_delta(delta),
        }
    }

    fn write_transform(&mut self, tf: &TransformBroadcast) -> Result<()> {
        self.tf.serialize(StampedPoseRecord::new(
            tf.timestamp_ns,
            &tf.frame_id,
            &tf.child_frame_id,
            &tf.transform,
        ))?;
        self.stats.transforms += 1;
        Ok(())
    }

    fn write_keyframe(&mut self, pose: &PoseStamped) -> Result<()> {
        self.path.serialize(StampedPoseRecord::new(
            pose.timestamp_ns,
            &self.fixed_frame,
            &self.sensor_frame,
            &pose.pose,
        ))?;
        self.stats.keyframes += 1;
        Ok(())
    }

    fn write_delta(&mut self, delta: &DeltaPose) -> Result<()> {
        self.delta.serialize(DeltaPoseMessage::from_delta(delta))?;
        self.stats.delta_poses += 1;
        if !delta.success() {
            self.stats.failed_delta_poses += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.tf.flush()?;
        self.path.flush()?;
        self.delta.flush()?;
        Ok(())
    }
}

impl OutputAdapter for TrajectoryWriter {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        if let Err(e) = self.write_transform(transform) {
            warn!("Failed to write transform: {:#}", e);
        }
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        if let Err(e) = self.write_keyframe(pose) {
            warn!("Failed to write path entry: {:#}", e);
        }
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        if let Err(e) = self.write_delta(delta) {
            warn!("Failed to write delta pose: {:#}", e);
        }
    }
}

/// Spawn a thread that drains `receiver` into a [`TrajectoryWriter`] until
/// every sender is dropped.
pub fn spawn_trajectory_writer(
    receiver: Receiver<OutputEvent>,
    dir: PathBuf,
    fixed_frame: String,
    sensor_frame: String,
) -> JoinHandle<Result<WriterStats>> {
    thread::spawn(move || {
        let mut writer = TrajectoryWriter::create(&dir, fixed_frame, sensor_frame)?;
        info!("Trajectory writer started in {}", dir.display());

        for event in receiver.iter() {
            writer.write_event(&event)?;
        }

        writer.flush()?;
        let stats = writer.stats();
        info!(
            "Trajectory writer finished: {} transforms, {} keyframes, {} delta poses",
            stats.transforms, stats.keyframes, stats.delta_poses
        );
        Ok(stats)
    })
}

fn open_csv(path: PathBuf) -> Result<Writer<File>> {
    Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SE3;
    use crate::output::ChannelAdapter;
    use nalgebra::Vector3;

    #[test]
    fn test_writer_thread_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mut adapter, rx) = ChannelAdapter::bounded(8);
        let handle = spawn_trajectory_writer(
            rx,
            dir.path().to_path_buf(),
            "/world".into(),
            "/sensor".into(),
        );

        let pose = SE3::from_translation(Vector3::new(1.0, 0.0, 0.0));
        adapter.send_transform(&TransformBroadcast {
            timestamp_ns: 10,
            frame_id: "/world".into(),
            child_frame_id: "/sensor".into(),
            transform: pose,
        });
        adapter.append_path(&PoseStamped {
            timestamp_ns: 10,
            pose,
        });
        adapter.publish_delta_pose(&DeltaPose::succeeded(10, pose));
        adapter.publish_delta_pose(&DeltaPose::failed(20));
        drop(adapter);

        let stats = handle.join().unwrap().unwrap();
        assert_eq!(
            stats,
            WriterStats {
                transforms: 1,
                keyframes: 1,
                delta_poses: 2,
                failed_delta_poses: 1,
            }
        );

        let delta_csv = fs::read_to_string(dir.path().join("delta_pose.csv")).unwrap();
        let rows: Vec<_> = delta_csv.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("timestamp_ns,success"));
        assert!(rows[2].starts_with("20,false,NaN,NaN,NaN,NaN,NaN,NaN,NaN"));

        let tf_csv = fs::read_to_string(dir.path().join("tf.csv")).unwrap();
        assert!(tf_csv.contains("10,/world,/sensor,1.0,0.0,0.0"));

        let path_csv = fs::read_to_string(dir.path().join("path.csv")).unwrap();
        let path_rows: Vec<_> = path_csv.lines().collect();
        assert_eq!(path_rows.len(), 2);
        assert!(path_rows[1].starts_with("10,/world,/sensor,1.0,0.0,0.0"));
    }
}
