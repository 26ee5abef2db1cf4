use std::fmt;

use crate::reference::ImageReference;

/// Identifies one update cycle. Late results and timers carry the id of the
/// cycle that started them and are ignored once that cycle is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(pub u64);

impl CycleId {
    pub fn next(self) -> Self {
        CycleId(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Preloading { cycle: CycleId, reference: ImageReference },
    Revealing { cycle: CycleId, reference: ImageReference },
}

impl TransitionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransitionState::Idle)
    }

    /// The reference being worked on, if any.
    pub fn reference(&self) -> Option<&ImageReference> {
        match self {
            TransitionState::Idle => None,
            TransitionState::Preloading { reference, .. }
            | TransitionState::Revealing { reference, .. } => Some(reference),
        }
    }
}
