//! The update controller: one cycle at a time, preload, reveal, swap.
//!
//! ```text
//!   Idle --accept--> Preloading --verified--> Revealing --timeout--> Idle
//!                        |                                            ^
//!                        +------------------failed--------------------+
//! ```
//!
//! Every method runs to completion on the caller's thread. Suspension only
//! happens outside the controller, while a verifier works or while the reveal
//! timer runs, and both report back through [`Controller::complete_preload`]
//! and [`Controller::advance`].

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::{BufferRole, DoubleBuffer};
use crate::constants::{REFRESH_INTERVAL_MS, REVEAL_DURATION_MS};
use crate::ingestion::{Admission, Occupancy, SourceIngestion};
use crate::observer::Observer;
use crate::preload::{PreloadVerifier, Verification};
use crate::reference::{parse_push_payload, ImageReference};
use crate::renderer::Renderer;
use crate::scheduler::{Fired, Scheduler, TimerId};
use crate::transition::{CycleId, TransitionState};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub refresh_interval: Duration,
    pub reveal_duration: Duration,
    /// Polled on every tick; `None` leaves the push channel as the only source.
    pub default_source: Option<ImageReference>,
    /// Make every poll a distinct reference with a `random=` query parameter.
    pub cache_bust: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(REFRESH_INTERVAL_MS),
            reveal_duration: Duration::from_millis(REVEAL_DURATION_MS),
            default_source: None,
            cache_bust: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    RevealDone(CycleId),
}

pub struct Controller<V: PreloadVerifier, R, O> {
    config: ControllerConfig,
    verifier: V,
    renderer: R,
    observer: O,

    state: TransitionState,
    buffer: DoubleBuffer<V::Handle>,
    ingestion: SourceIngestion,
    scheduler: Scheduler<Timer>,

    last_cycle: CycleId,
    in_flight: Option<CancellationToken>,
    reveal_timer: Option<TimerId>,
    running: bool,
}

impl<V, R, O> Controller<V, R, O>
where
    V: PreloadVerifier,
    R: Renderer<V::Handle>,
    O: Observer,
{
    pub fn new(config: ControllerConfig, verifier: V, renderer: R, observer: O) -> Self {
        Self {
            config,
            verifier,
            renderer,
            observer,
            state: TransitionState::Idle,
            buffer: DoubleBuffer::new(),
            ingestion: SourceIngestion::new(),
            scheduler: Scheduler::new(),
            last_cycle: CycleId(0),
            in_flight: None,
            reveal_timer: None,
            running: false,
        }
    }

    /// Starts the periodic poll and loads the default source right away.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        if self.config.default_source.is_some() {
            self.scheduler.on_tick(self.config.refresh_interval);
            self.poll_default_source();
        } else {
            debug!("no default source configured, waiting for pushes");
        }
    }

    /// Stops polling, drops the mailbox, cancels any in-flight preload and
    /// abandons an unfinished reveal. The active image stays on screen.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.stop_tick();
        if let Some(timer) = self.reveal_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.ingestion.clear();
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        if let TransitionState::Revealing { .. } = self.state {
            let standby = self.buffer.slot(BufferRole::Standby);
            self.buffer.clear_standby();
            self.renderer.reset_standby(standby);
            self.renderer.end_transition_effect();
        }
        self.state = TransitionState::Idle;
    }

    /// Offers a candidate. Dispatched now when idle, otherwise parked in the
    /// latest-wins mailbox.
    pub fn submit(&mut self, reference: ImageReference) {
        if !self.running {
            debug!(%reference, "controller stopped, candidate ignored");
            return;
        }
        let occupancy = Occupancy {
            idle: self.state.is_idle(),
            active: self.buffer.reference(BufferRole::Active),
            in_flight: self.state.reference(),
        };
        match self.ingestion.submit(reference.clone(), occupancy) {
            Admission::Dispatch(reference) => {
                self.observer.ingestion_accepted(&reference);
                self.accept(reference);
            }
            Admission::Parked { superseded } => {
                if let Some(old) = superseded {
                    self.observer.ingestion_superseded(&old);
                }
                debug!(%reference, "controller busy, candidate parked");
            }
            Admission::Duplicate => self.observer.ingestion_duplicate(&reference),
        }
    }

    /// Offers the reference carried by a raw push payload. Payloads without a
    /// usable `imageSource` are reported and dropped.
    pub fn submit_payload(&mut self, raw: &str) {
        match parse_push_payload(raw) {
            Ok(reference) => self.submit(reference),
            Err(reason) => self.observer.candidate_rejected(&reason),
        }
    }

    /// Delivers the outcome of a verification started for `cycle`.
    pub fn complete_preload(&mut self, cycle: CycleId, outcome: Verification<V::Handle>) {
        let reference = match &self.state {
            TransitionState::Preloading {
                cycle: current,
                reference,
            } if *current == cycle => reference.clone(),
            _ => {
                self.observer.stale_result_discarded(cycle);
                return;
            }
        };
        self.in_flight = None;

        match outcome {
            Ok(handle) => {
                let slot = self.buffer.write(BufferRole::Standby, reference.clone(), handle);
                if let Some(content) = self.buffer.current(BufferRole::Standby) {
                    self.renderer.show(slot, BufferRole::Standby, &content.handle);
                }
                self.renderer
                    .start_transition_effect(slot, self.config.reveal_duration);
                self.reveal_timer = Some(
                    self.scheduler
                        .after(self.config.reveal_duration, Timer::RevealDone(cycle)),
                );
                self.observer.reveal_started(cycle, &reference);
                self.state = TransitionState::Revealing { cycle, reference };
            }
            Err(reason) => {
                self.observer.preload_failed(&reference, &reason);
                self.state = TransitionState::Idle;
                self.try_dispatch();
            }
        }
    }

    /// Advances time by `dt`: periodic polls and reveal completion.
    pub fn advance(&mut self, dt: Duration) {
        for fired in self.scheduler.advance(dt) {
            match fired {
                Fired::Tick => self.poll_default_source(),
                Fired::Timeout(Timer::RevealDone(cycle)) => self.finish_reveal(cycle),
            }
        }
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn buffer(&self) -> &DoubleBuffer<V::Handle> {
        &self.buffer
    }

    pub fn active_reference(&self) -> Option<&ImageReference> {
        self.buffer.reference(BufferRole::Active)
    }

    pub fn pending(&self) -> Option<&ImageReference> {
        self.ingestion.pending()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    fn poll_default_source(&mut self) {
        let Some(source) = self.config.default_source.as_ref() else {
            return;
        };
        let reference = if self.config.cache_bust {
            source.with_cache_bust(rand::rng().random())
        } else {
            source.clone()
        };
        self.submit(reference);
    }

    fn accept(&mut self, reference: ImageReference) {
        let cycle = self.last_cycle.next();
        self.last_cycle = cycle;

        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        self.observer.preload_started(cycle, &reference);
        self.state = TransitionState::Preloading {
            cycle,
            reference: reference.clone(),
        };
        self.verifier.verify(cycle, reference, token);
    }

    fn finish_reveal(&mut self, cycle: CycleId) {
        let reference = match &self.state {
            TransitionState::Revealing {
                cycle: current,
                reference,
            } if *current == cycle => reference.clone(),
            _ => {
                self.observer.stale_result_discarded(cycle);
                return;
            }
        };

        self.reveal_timer = None;

        // Swap, reset, clear overlay, go idle. No suspension in between.
        let active = self.buffer.swap();
        let standby = active.other();
        self.renderer.set_active(active);
        self.buffer.clear_standby();
        self.renderer.reset_standby(standby);
        self.renderer.end_transition_effect();
        self.state = TransitionState::Idle;
        self.observer.reveal_completed(&reference);

        self.try_dispatch();
    }

    fn try_dispatch(&mut self) {
        if !self.state.is_idle() {
            return;
        }
        let active = self.buffer.reference(BufferRole::Active).cloned();
        if let Some(reference) = self.ingestion.take_pending(active.as_ref()) {
            self.observer.ingestion_accepted(&reference);
            self.accept(reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SlotId;
    use crate::observer::NullObserver;
    use crate::preload::PreloadError;

    #[derive(Default)]
    struct Verifier {
        started: Vec<(CycleId, ImageReference, CancellationToken)>,
    }

    impl PreloadVerifier for Verifier {
        type Handle = u32;

        fn verify(&mut self, cycle: CycleId, reference: ImageReference, cancel: CancellationToken) {
            self.started.push((cycle, reference, cancel));
        }
    }

    #[derive(Default)]
    struct Surface {
        active: Option<SlotId>,
        effect_running: bool,
    }

    impl Renderer<u32> for Surface {
        fn show(&mut self, _slot: SlotId, _role: BufferRole, _handle: &u32) {}

        fn start_transition_effect(&mut self, _incoming: SlotId, _duration: Duration) {
            self.effect_running = true;
        }

        fn end_transition_effect(&mut self) {
            self.effect_running = false;
        }

        fn set_active(&mut self, slot: SlotId) {
            self.active = Some(slot);
        }

        fn reset_standby(&mut self, _slot: SlotId) {}
    }

    fn r(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    fn controller() -> Controller<Verifier, Surface, NullObserver> {
        let mut c = Controller::new(
            ControllerConfig::default(),
            Verifier::default(),
            Surface::default(),
            NullObserver,
        );
        c.start();
        c
    }

    #[test]
    fn stop_cancels_the_in_flight_preload() {
        let mut c = controller();
        c.submit(r("img://a"));
        let token = c.verifier().started[0].2.clone();
        assert!(!token.is_cancelled());

        c.stop();
        assert!(token.is_cancelled());
        assert!(c.state().is_idle());

        // The late result is discarded even though it succeeded.
        c.complete_preload(CycleId(1), Ok(7));
        assert!(c.active_reference().is_none());
    }

    #[test]
    fn stop_mid_reveal_keeps_the_old_image() {
        let mut c = controller();
        c.submit(r("img://a"));
        c.complete_preload(CycleId(1), Ok(1));
        c.advance(Duration::from_millis(1500));
        assert_eq!(c.active_reference(), Some(&r("img://a")));

        c.submit(r("img://b"));
        c.complete_preload(CycleId(2), Ok(2));
        assert!(c.renderer().effect_running);
        c.stop();

        assert!(!c.renderer().effect_running);
        assert_eq!(c.active_reference(), Some(&r("img://a")));
        assert!(c.buffer().current(BufferRole::Standby).is_none());

        // The abandoned reveal's timer was cancelled with it.
        assert_eq!(c.scheduler.pending_timers(), 0);
        c.advance(Duration::from_millis(5000));
        assert_eq!(c.active_reference(), Some(&r("img://a")));
    }

    #[test]
    fn submissions_before_start_are_ignored() {
        let mut c = Controller::new(
            ControllerConfig::default(),
            Verifier::default(),
            Surface::default(),
            NullObserver,
        );
        c.submit(r("img://a"));
        assert!(c.verifier().started.is_empty());
    }

    #[test]
    fn mismatched_cycle_ids_are_ignored() {
        let mut c = controller();
        c.submit(r("img://a"));
        c.complete_preload(CycleId(42), Err(PreloadError::Cancelled));
        assert!(matches!(c.state(), TransitionState::Preloading { .. }));
    }

    #[test]
    fn start_polls_the_default_source_immediately() {
        let mut c = Controller::new(
            ControllerConfig {
                default_source: Some(r("https://host/img")),
                ..ControllerConfig::default()
            },
            Verifier::default(),
            Surface::default(),
            NullObserver,
        );
        c.start();
        let started = &c.verifier().started;
        assert_eq!(started.len(), 1);
        assert!(started[0].1.as_str().starts_with("https://host/img?random="));
    }

    #[test]
    fn ticks_while_busy_are_parked_not_dropped() {
        let mut c = Controller::new(
            ControllerConfig {
                default_source: Some(r("https://host/img")),
                ..ControllerConfig::default()
            },
            Verifier::default(),
            Surface::default(),
            NullObserver,
        );
        c.start();
        c.advance(Duration::from_millis(3000));
        assert_eq!(c.verifier().started.len(), 1);
        assert!(c.pending().is_some());

        c.complete_preload(CycleId(1), Err(PreloadError::Fetch("offline".into())));
        assert_eq!(c.verifier().started.len(), 2);
        assert!(c.pending().is_none());
    }
}
