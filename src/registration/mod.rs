//! Registration: aligning each incoming cloud against the current keyframe.
//!
//! The tracking engine only sees the [`Registration`] trait. It owns the
//! absolute pose; an implementation owns the keyframe, the per-call delta and
//! the decision to refresh its keyframe.
//!
//! [`IcpSequence`] is the keyframe-based point-to-point ICP shipped with the
//! crate.

pub mod icp;
pub mod icp_sequence;

#[cfg(test)]
pub(crate) mod scripted;

use thiserror::Error;

use crate::cloud::FeatureSet;
use crate::geometry::SE3;

pub use icp::{IcpConfig, IcpResult, PointToPointIcp, ReferenceCloud};
pub use icp_sequence::IcpSequence;

/// A successful registration of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converged {
    /// Motion since the previous successful call.
    pub delta: SE3,
    /// Share of reading points that ended up as inlier correspondences.
    pub match_ratio: f64,
}

/// Ways a registration call can fail. All are per-frame degradations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistrationError {
    /// The iteration limit was reached before the increment fell below the
    /// convergence thresholds.
    #[error("did not converge after {iterations} iterations")]
    ConvergenceFailure { iterations: u32 },

    /// Too few correspondences survived outlier rejection.
    #[error("only {found} correspondences, at least {required} required")]
    NotEnoughPoints { found: usize, required: usize },

    /// The estimated motion left the admissible bound.
    #[error("estimated translation {translation:.3} m exceeds bound {bound:.3} m")]
    Diverged { translation: f64, bound: f64 },

    /// The closed-form alignment step could not be solved.
    #[error("rigid alignment failed at iteration {iteration}")]
    Degenerate { iteration: u32 },
}

/// Result of one `match_cloud` call. Never both a transform and an error.
pub type RegistrationOutcome = Result<Converged, RegistrationError>;

/// Keyframe-based cloud registration as consumed by the tracking engine.
pub trait Registration {
    /// Register `features` against the current keyframe.
    ///
    /// Without a keyframe, the frame is adopted as keyframe and the delta is
    /// the identity.
    fn match_cloud(&mut self, features: &FeatureSet) -> RegistrationOutcome;

    /// Discard the current keyframe and adopt `features` instead.
    fn reset_tracking(&mut self, features: &FeatureSet);

    /// Whether the last `match_cloud` call replaced the keyframe.
    fn keyframe_created_at_last_call(&self) -> bool;
}

impl<R: Registration + ?Sized> Registration for Box<R> {
    fn match_cloud(&mut self, features: &FeatureSet) -> RegistrationOutcome {
        (**self).match_cloud(features)
    }

    fn reset_tracking(&mut self, features: &FeatureSet) {
        (**self).reset_tracking(features)
    }

    fn keyframe_created_at_last_call(&self) -> bool {
        (**self).keyframe_created_at_last_call()
    }
}
