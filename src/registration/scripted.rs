//! Scripted registration double for engine tests.

use std::collections::VecDeque;

use super::{Converged, Registration, RegistrationError, RegistrationOutcome};
use crate::cloud::FeatureSet;
use crate::geometry::SE3;

/// One scripted answer: the outcome and whether it created a keyframe.
pub struct Step {
    pub outcome: RegistrationOutcome,
    pub keyframe_created: bool,
}

impl Step {
    pub fn converged(delta: SE3, keyframe_created: bool) -> Self {
        Self {
            outcome: Ok(Converged {
                delta,
                match_ratio: 0.9,
            }),
            keyframe_created,
        }
    }

    pub fn failed() -> Self {
        Self {
            outcome: Err(RegistrationError::ConvergenceFailure { iterations: 40 }),
            keyframe_created: false,
        }
    }
}

/// Replays scripted steps and records every call it receives.
#[derive(Default)]
pub struct ScriptedRegistration {
    steps: VecDeque<Step>,
    keyframe_created: bool,
    pub matched: Vec<FeatureSet>,
    pub resets: Vec<FeatureSet>,
}

impl ScriptedRegistration {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl Registration for ScriptedRegistration {
    fn match_cloud(&mut self, features: &FeatureSet) -> RegistrationOutcome {
        self.matched.push(features.clone());
        let step = self.steps.pop_front().unwrap_or_else(Step::failed);
        self.keyframe_created = step.keyframe_created;
        step.outcome
    }

    fn reset_tracking(&mut self, features: &FeatureSet) {
        self.resets.push(features.clone());
    }

    fn keyframe_created_at_last_call(&self) -> bool {
        self.keyframe_created
    }
}
