//! # Message Pump
//!
//! The consumption loop opened once bootstrap completes. Every envelope goes
//! through the target filter; claimed envelopes are handed to the process
//! engine, the rest are counted and skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_bus::{Envelope, Inbox};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::filter::MessageTargetFilter;

/// Receives envelopes claimed by this worker.
#[async_trait]
pub trait EnvelopeDispatcher: Send + Sync {
    /// Process one envelope.
    async fn dispatch(&self, envelope: Envelope) -> anyhow::Result<()>;
}

/// What happens to envelopes still buffered in the inbox at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainPolicy {
    /// Process buffered envelopes before exiting.
    #[default]
    Drain,
    /// Drop buffered envelopes.
    Discard,
}

impl std::str::FromStr for DrainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(Self::Drain),
            "discard" => Ok(Self::Discard),
            other => Err(format!("unknown drain policy `{other}`")),
        }
    }
}

/// Running counters for one pump.
#[derive(Debug, Default)]
pub struct PumpStats {
    received: AtomicU64,
    handled: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl PumpStats {
    /// Copy the counters.
    #[must_use]
    pub fn snapshot(&self) -> PumpSnapshot {
        PumpSnapshot {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PumpStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpSnapshot {
    /// Envelopes taken from the inbox.
    pub received: u64,
    /// Claimed and dispatched successfully.
    pub handled: u64,
    /// Not addressed to this worker.
    pub ignored: u64,
    /// Claimed but the dispatcher returned an error.
    pub failed: u64,
    /// Dropped at shutdown under [`DrainPolicy::Discard`].
    pub discarded: u64,
}

/// Filter-then-dispatch loop over an [`Inbox`].
pub struct MessagePump {
    filter: MessageTargetFilter,
    dispatcher: Arc<dyn EnvelopeDispatcher>,
    drain_policy: DrainPolicy,
    stats: Arc<PumpStats>,
}

impl MessagePump {
    /// Create a pump.
    pub fn new(
        filter: MessageTargetFilter,
        dispatcher: Arc<dyn EnvelopeDispatcher>,
        drain_policy: DrainPolicy,
    ) -> Self {
        Self {
            filter,
            dispatcher,
            drain_policy,
            stats: Arc::new(PumpStats::default()),
        }
    }

    /// Shared counters, valid after the pump is spawned.
    #[must_use]
    pub fn stats(&self) -> Arc<PumpStats> {
        Arc::clone(&self.stats)
    }

    /// Run the loop on its own task.
    pub fn spawn(self, inbox: Inbox) -> PumpHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(inbox, shutdown_rx));
        PumpHandle { shutdown_tx, join }
    }

    async fn run(self, mut inbox: Inbox, mut shutdown: watch::Receiver<bool>) {
        info!(target_system = %self.filter.target(), "Message pump started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = inbox.recv() => match next {
                    Some(envelope) => self.handle(envelope).await,
                    None => {
                        info!("Inbox closed, message pump exiting");
                        return;
                    }
                },
            }
        }

        self.finish(&mut inbox).await;
    }

    async fn finish(&self, inbox: &mut Inbox) {
        let mut remaining = 0u64;
        while let Ok(Some(envelope)) = inbox.try_recv() {
            remaining += 1;
            match self.drain_policy {
                DrainPolicy::Drain => self.handle(envelope).await,
                DrainPolicy::Discard => {
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        info!(policy = ?self.drain_policy, remaining, "Message pump stopped");
    }

    async fn handle(&self, envelope: Envelope) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        if !self.filter.claims(&envelope) {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(
                message_id = %envelope.message_id(),
                message_type = envelope.message_type(),
                "Envelope not addressed to this worker"
            );
            return;
        }

        let message_id = envelope.message_id();
        let message_type = envelope.message_type().to_string();
        match self.dispatcher.dispatch(envelope).await {
            Ok(()) => {
                self.stats.handled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(%message_id, %message_type, error = %e, "Dispatch failed");
            }
        }
    }
}

/// Handle to a spawned pump.
pub struct PumpHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PumpHandle {
    /// Signal the loop to stop, then wait for it to finish its drain policy.
    pub async fn close(self) {
        // The loop may already have exited on a closed inbox.
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "Message pump task failed");
        }
    }
}
