//! Linear state machine of a dataset run.
//!
//! ```text
//! Idle -> Loading -> Binding -> Simulating(0..N) -> Writing -> Done
//!   \________\__________\___________\_________________\------> Failed
//! ```
//!
//! There is no branching, retry, or backward move. `Failed` and `Done` are
//! terminal.

use std::fmt;

use crate::{VdsError, VdsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loading,
    Binding,
    Simulating { step: usize },
    Writing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::Loading => 1,
            Stage::Binding => 2,
            Stage::Simulating { .. } => 3,
            Stage::Writing => 4,
            Stage::Done => 5,
            Stage::Failed => u8::MAX,
        }
    }

    /// Move to `next`, rejecting anything but the single forward step.
    ///
    /// Within `Simulating` the step index may only advance by one.
    pub fn advance(&mut self, next: Stage) -> VdsResult<()> {
        let allowed = match (*self, next) {
            (current, _) if current.is_terminal() => false,
            (_, Stage::Failed) => true,
            (Stage::Binding, Stage::Simulating { step }) => step == 0,
            (Stage::Simulating { step: a }, Stage::Simulating { step: b }) => b == a + 1,
            (current, next) => next.rank() == current.rank() + 1,
        };
        if !allowed {
            return Err(VdsError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::Loading => f.write_str("loading"),
            Stage::Binding => f.write_str("binding"),
            Stage::Simulating { step } => write!(f, "simulating (step {step})"),
            Stage::Writing => f.write_str("writing"),
            Stage::Done => f.write_str("done"),
            Stage::Failed => f.write_str("failed"),
        }
    }
}
