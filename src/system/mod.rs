//! Top-level orchestration.
//!
//! `CloudMatcher` ties tracking to its output adapters and owns the
//! background trajectory writer thread.

mod cloud_matcher;

pub use cloud_matcher::CloudMatcher;
