use std::time::Duration;

use crate::buffer::{BufferRole, SlotId};

/// The display surface. It owns every visual concern; the controller only
/// tells it which slot holds what and when the reveal starts and ends.
///
/// Calls made while finishing a reveal (`set_active`, `reset_standby`,
/// `end_transition_effect`) arrive back to back within one frame, so the
/// surface never draws a state with zero or two active layers.
pub trait Renderer<H> {
    /// Puts verified content into `slot`, which currently holds `role`.
    fn show(&mut self, slot: SlotId, role: BufferRole, handle: &H);

    /// Starts the two-phase reveal of `incoming` over the active layer.
    fn start_transition_effect(&mut self, incoming: SlotId, duration: Duration);

    /// Clears any overlay left by the reveal.
    fn end_transition_effect(&mut self);

    /// `slot` is now the active layer.
    fn set_active(&mut self, slot: SlotId);

    /// Returns `slot` to fully hidden with its reveal mask cleared.
    fn reset_standby(&mut self, slot: SlotId);
}
