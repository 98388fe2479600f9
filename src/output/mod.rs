//! Output side of the tracker: event types and the sinks that transmit them.
//!
//! Adapters are pure side-effect sinks. They never feed anything back into
//! tracking and report their own failures through logging.

pub mod adapters;
pub mod messages;
pub mod trajectory_writer;

pub use adapters::{ChannelAdapter, RecordingAdapter};
pub use messages::{
    DeltaPose, DeltaPoseMessage, OutputEvent, PathHistory, PoseStamped, TransformBroadcast,
};
pub use trajectory_writer::{spawn_trajectory_writer, TrajectoryWriter, WriterStats};

/// Receives the events produced while tracking one frame.
pub trait OutputAdapter {
    /// Absolute pose of the sensor in the fixed frame.
    fn send_transform(&mut self, transform: &TransformBroadcast);

    /// A new keyframe pose to append to the path history.
    fn append_path(&mut self, pose: &PoseStamped);

    /// Relative motion for the frame, or its failure.
    fn publish_delta_pose(&mut self, delta: &DeltaPose);
}

impl<A: OutputAdapter + ?Sized> OutputAdapter for &mut A {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        (**self).send_transform(transform)
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        (**self).append_path(pose)
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        (**self).publish_delta_pose(delta)
    }
}

impl<A: OutputAdapter + ?Sized> OutputAdapter for Box<A> {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        (**self).send_transform(transform)
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        (**self).append_path(pose)
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        (**self).publish_delta_pose(delta)
    }
}

/// Forwards every event to each adapter in order.
impl<A: OutputAdapter> OutputAdapter for Vec<A> {
    fn send_transform(&mut self, transform: &TransformBroadcast) {
        self.iter_mut().for_each(|a| a.send_transform(transform));
    }

    fn append_path(&mut self, pose: &PoseStamped) {
        self.iter_mut().for_each(|a| a.append_path(pose));
    }

    fn publish_delta_pose(&mut self, delta: &DeltaPose) {
        self.iter_mut().for_each(|a| a.publish_delta_pose(delta));
    }
}
