use super::error::PrepareError;
use std::fmt;
use tracing::debug;

/// Pipeline stage reached by a preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrepState {
    #[default]
    Unprepared,
    Typed,
    Merged,
    BondTyped,
    Hydrated,
    RingResolved,
    TreeBuilt,
    Done,
    Failed,
}

impl PrepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PrepState::Done | PrepState::Failed)
    }

    /// Whether the pipeline may move from `self` to `next`.
    ///
    /// Every non-terminal state may fail. Hydration is the only optional stage.
    pub fn can_advance_to(self, next: PrepState) -> bool {
        use PrepState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Unprepared, Typed)
            | (Typed, Merged)
            | (Merged, BondTyped)
            | (BondTyped, Hydrated)
            | (BondTyped, RingResolved)
            | (Hydrated, RingResolved)
            | (RingResolved, TreeBuilt)
            | (TreeBuilt, Done) => true,
            _ => false,
        }
    }

    pub fn advance(&mut self, next: PrepState) -> Result<(), PrepareError> {
        if !self.can_advance_to(next) {
            return Err(PrepareError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        debug!(from = %self, to = %next, "Preparation state transition");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for PrepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrepState::Unprepared => "unprepared",
            PrepState::Typed => "typed",
            PrepState::Merged => "merged",
            PrepState::BondTyped => "bond-typed",
            PrepState::Hydrated => "hydrated",
            PrepState::RingResolved => "ring-resolved",
            PrepState::TreeBuilt => "tree-built",
            PrepState::Done => "done",
            PrepState::Failed => "failed",
        };
        f.write_str(name)
    }
}
