//! Merges candidate references from every channel into one latest-wins
//! mailbox in front of the transition machine.

use crate::reference::ImageReference;

/// What the controller looks like at the moment a candidate arrives.
#[derive(Debug, Clone, Copy)]
pub struct Occupancy<'a> {
    pub idle: bool,
    pub active: Option<&'a ImageReference>,
    pub in_flight: Option<&'a ImageReference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Controller is idle: start a cycle for this reference now.
    Dispatch(ImageReference),
    /// Controller is busy: the reference now sits in the mailbox, evicting
    /// `superseded` if there was one.
    Parked { superseded: Option<ImageReference> },
    /// Already shown, in flight, or parked. Nothing to do.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct SourceIngestion {
    pending: Option<ImageReference>,
}

impl SourceIngestion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&ImageReference> {
        self.pending.as_ref()
    }

    pub fn submit(&mut self, reference: ImageReference, occupancy: Occupancy<'_>) -> Admission {
        if self.is_duplicate(&reference, occupancy) {
            return Admission::Duplicate;
        }
        if occupancy.idle {
            return Admission::Dispatch(reference);
        }
        Admission::Parked {
            superseded: self.pending.replace(reference),
        }
    }

    /// Empties the mailbox for dispatch once the controller is idle again.
    /// A parked reference that has meanwhile become the active one is
    /// dropped instead.
    pub fn take_pending(&mut self, active: Option<&ImageReference>) -> Option<ImageReference> {
        let pending = self.pending.take()?;
        if active == Some(&pending) {
            return None;
        }
        Some(pending)
    }

    pub fn clear(&mut self) -> Option<ImageReference> {
        self.pending.take()
    }

    fn is_duplicate(&self, reference: &ImageReference, occupancy: Occupancy<'_>) -> bool {
        occupancy.active == Some(reference)
            || occupancy.in_flight == Some(reference)
            || self.pending.as_ref() == Some(reference)
    }
}
