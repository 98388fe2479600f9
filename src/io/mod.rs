//! Recorded cloud input.

pub mod cloud_sequence;

pub use cloud_sequence::{CloudEntry, CloudSequence};
