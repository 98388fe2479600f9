//! In-process output adapters.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

use super::messages::{DeltaPose, OutputEvent, PathHistory, PoseStamped, TransformBroadcast};
use super::OutputAdapter;

/// Keeps every event in memory, plus the path history built from keyframes.
#[derive(Debug, Clone, Default)]
pub struct RecordingAdapter {
    pub events: Vec<OutputEvent>,
    pub path: PathHistory,
}

impl RecordingAdapter {
    pub fn new(fixed_frame: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            path: PathHistory::new(fixed_frame),
        }
    }

    pub fn transforms(&self) -> impl Iterator<Item = &TransformBroadcast> {
        self.events.iter().filter_map(|e| match e {
            OutputEvent::Transform(t) => Some(t),
            _ => None,
        })
    }

    pub fn delta_poses(&self) -> impl Iterator<Item = &DeltaPose> {
        self.events.iter().filter_map(|e| match e {
            OutputEvent::DeltaPose(d) => Some(d),
            _ => None,
        })
    }

    pub fn keyframes(&self) -> impl Iterator<Item = &PoseStamped> {
        self.events.iter().filter_map(|e| match e {
            OutputEvent::Keyframe(p) => Some(p),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl OutputAdapter for RecordingAdapter {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        self.events.push(OutputEvent::Transform(transform.clone()));
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        self.path.push(pose.clone());
        self.events.push(OutputEvent::Keyframe(pose.clone()));
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        self.events.push(OutputEvent::DeltaPose(*delta));
    }
}

/// Hands events to another thread over a bounded channel.
///
/// Blocks while the channel is full so no event is lost; once the receiving
/// side is gone, events are dropped with a warning.
pub struct ChannelAdapter {
    sender: Sender<OutputEvent>,
    disconnected: bool,
}

impl ChannelAdapter {
    pub fn new(sender: Sender<OutputEvent>) -> Self {
        Self {
            sender,
            disconnected: false,
        }
    }

    /// Create an adapter and the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<OutputEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }

    fn forward(&mut self, event: OutputEvent) {
        if self.disconnected {
            return;
        }
        let result = match self.sender.try_send(event) {
            Err(TrySendError::Full(event)) => self.sender.send(event).map_err(|_| ()),
            Err(TrySendError::Disconnected(_)) => Err(()),
            Ok(()) => Ok(()),
        };
        if result.is_err() {
            warn!("Output channel disconnected, dropping further events");
            self.disconnected = true;
        }
    }
}

impl OutputAdapter for ChannelAdapter {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        self.forward(OutputEvent::Transform(transform.clone()));
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        self.forward(OutputEvent::Keyframe(pose.clone()));
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        self.forward(OutputEvent::DeltaPose(*delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SE3;

    fn broadcast(ts: u64) -> TransformBroadcast {
        TransformBroadcast {
            timestamp_ns: ts,
            frame_id: "/world".into(),
            child_frame_id: "/sensor".into(),
            transform: SE3::identity(),
        }
    }

    #[test]
    fn test_recording_adapter_builds_path() {
        let mut rec = RecordingAdapter::new("/world");
        rec.send_transform(&broadcast(1));
        rec.append_path(&PoseStamped {
            timestamp_ns: 1,
            pose: SE3::identity(),
        });
        rec.publish_delta_pose(&DeltaPose::failed(2));

        assert_eq!(rec.events.len(), 3);
        assert_eq!(rec.path.len(), 1);
        assert_eq!(rec.path.frame_id, "/world");
        assert_eq!(rec.delta_poses().count(), 1);
    }

    #[test]
    fn test_channel_adapter_preserves_order() {
        let (mut adapter, rx) = ChannelAdapter::bounded(4);
        adapter.send_transform(&broadcast(1));
        adapter.publish_delta_pose(&DeltaPose::failed(2));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                OutputEvent::Transform(broadcast(1)),
                OutputEvent::DeltaPose(DeltaPose::failed(2)),
            ]
        );
    }

    #[test]
    fn test_channel_adapter_survives_disconnect() {
        let (mut adapter, rx) = ChannelAdapter::bounded(1);
        drop(rx);

        adapter.send_transform(&broadcast(1));
        adapter.send_transform(&broadcast(2));

        assert!(adapter.disconnected);
    }
}
