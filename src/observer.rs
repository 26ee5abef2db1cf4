//! Diagnostic hooks. Every method has a no-op default and nothing the
//! controller does depends on an observer being present.

use tracing::{debug, info, warn};

use crate::preload::PreloadError;
use crate::reference::{CandidateError, ImageReference};
use crate::transition::CycleId;

pub trait Observer {
    fn ingestion_accepted(&mut self, _reference: &ImageReference) {}
    fn ingestion_superseded(&mut self, _reference: &ImageReference) {}
    fn ingestion_duplicate(&mut self, _reference: &ImageReference) {}
    fn candidate_rejected(&mut self, _reason: &CandidateError) {}
    fn preload_started(&mut self, _cycle: CycleId, _reference: &ImageReference) {}
    fn preload_failed(&mut self, _reference: &ImageReference, _reason: &PreloadError) {}
    fn stale_result_discarded(&mut self, _cycle: CycleId) {}
    fn reveal_started(&mut self, _cycle: CycleId, _reference: &ImageReference) {}
    fn reveal_completed(&mut self, _reference: &ImageReference) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn ingestion_accepted(&mut self, reference: &ImageReference) {
        debug!(%reference, "candidate accepted");
    }

    fn ingestion_superseded(&mut self, reference: &ImageReference) {
        debug!(%reference, "parked candidate superseded");
    }

    fn ingestion_duplicate(&mut self, reference: &ImageReference) {
        debug!(%reference, "duplicate candidate ignored");
    }

    fn candidate_rejected(&mut self, reason: &CandidateError) {
        warn!(%reason, "malformed candidate dropped");
    }

    fn preload_started(&mut self, cycle: CycleId, reference: &ImageReference) {
        debug!(%cycle, %reference, "preloading");
    }

    fn preload_failed(&mut self, reference: &ImageReference, reason: &PreloadError) {
        warn!(%reference, %reason, "preload failed, keeping current image");
    }

    fn stale_result_discarded(&mut self, cycle: CycleId) {
        debug!(%cycle, "discarded result of a finished cycle");
    }

    fn reveal_started(&mut self, cycle: CycleId, reference: &ImageReference) {
        debug!(%cycle, %reference, "revealing");
    }

    fn reveal_completed(&mut self, reference: &ImageReference) {
        info!(%reference, "now showing");
    }
}
