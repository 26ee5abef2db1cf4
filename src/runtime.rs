//! Background work for the frame loop.
//!
//! A tokio runtime runs everything that may block or wait: preload fetches and
//! the push listener. Results come back as [`Inbound`] events on one channel
//! that the frame loop drains at the start of every frame, so all controller
//! state is still touched from a single thread.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::Controller;
use crate::observer::Observer;
use crate::preload::{self, FetchLimits, ImageHandle, PreloadError, PreloadVerifier, Verification};
use crate::reference::ImageReference;
use crate::renderer::Renderer;
use crate::transition::CycleId;

#[derive(Debug)]
pub enum Inbound {
    /// Raw payload from the push channel.
    Push(String),
    /// Outcome of a verification started for `cycle`.
    Preloaded {
        cycle: CycleId,
        outcome: Verification<ImageHandle>,
    },
}

pub fn inbound_channel() -> (UnboundedSender<Inbound>, UnboundedReceiver<Inbound>) {
    mpsc::unbounded_channel()
}

pub fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("image-relay-io")
        .enable_all()
        .build()
}

/// Verifies candidates on the tokio runtime; the blocking fetch and decode go
/// to the blocking pool.
pub struct TokioVerifier {
    runtime: Handle,
    agent: ureq::Agent,
    limits: FetchLimits,
    events: UnboundedSender<Inbound>,
}

impl TokioVerifier {
    pub fn new(runtime: Handle, limits: FetchLimits, events: UnboundedSender<Inbound>) -> Self {
        Self {
            runtime,
            agent: preload::http_agent(limits),
            limits,
            events,
        }
    }
}

impl PreloadVerifier for TokioVerifier {
    type Handle = ImageHandle;

    fn verify(&mut self, cycle: CycleId, reference: ImageReference, cancel: CancellationToken) {
        let agent = self.agent.clone();
        let limits = self.limits;
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let work = tokio::task::spawn_blocking(move || preload::load(&agent, &reference, limits));
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PreloadError::Cancelled),
                joined = work => match joined {
                    Ok(result) => result.map(Arc::new),
                    Err(e) => Err(PreloadError::Worker(e.to_string())),
                },
            };
            if events.send(Inbound::Preloaded { cycle, outcome }).is_err() {
                debug!(%cycle, "frame loop gone, preload result dropped");
            }
        });
    }
}

/// Feeds every queued event into the controller. Returns how many were handled.
pub fn drain<V, R, O>(
    events: &mut UnboundedReceiver<Inbound>,
    controller: &mut Controller<V, R, O>,
) -> usize
where
    V: PreloadVerifier<Handle = ImageHandle>,
    R: Renderer<ImageHandle>,
    O: Observer,
{
    let mut handled = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            Inbound::Push(raw) => controller.submit_payload(&raw),
            Inbound::Preloaded { cycle, outcome } => controller.complete_preload(cycle, outcome),
        }
        handled += 1;
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits() -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_secs(2),
            max_bytes: 1024 * 1024,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_fetch_is_reported_for_the_right_cycle() {
        let (tx, mut rx) = inbound_channel();
        let mut verifier = TokioVerifier::new(Handle::current(), limits(), tx);
        let reference = ImageReference::parse("/nonexistent/image-relay/nope.png").unwrap();
        verifier.verify(CycleId(9), reference, CancellationToken::new());

        match rx.recv().await.unwrap() {
            Inbound::Preloaded { cycle, outcome } => {
                assert_eq!(cycle, CycleId(9));
                assert!(matches!(outcome, Err(PreloadError::Io(_))));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_before_start_reports_cancellation() {
        let (tx, mut rx) = inbound_channel();
        let mut verifier = TokioVerifier::new(Handle::current(), limits(), tx);
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Cancellation wins even if the fetch has already failed.
        let reference = ImageReference::parse("/nonexistent/image-relay/cancelled.png").unwrap();
        verifier.verify(CycleId(1), reference, cancel);

        match rx.recv().await.unwrap() {
            Inbound::Preloaded { outcome, .. } => {
                assert!(matches!(outcome, Err(PreloadError::Cancelled)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
