//! # Transport
//!
//! The start/stop consuming control pair a worker drives, and the in-memory
//! bus used for single-node deployments and tests.

use crate::envelope::Envelope;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Errors from transport control and publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// `start_consuming` was called while a consumer is already attached.
    #[error("Transport is already consuming")]
    AlreadyConsuming,

    /// An envelope was published while nobody is consuming.
    #[error("Transport is not consuming; envelope {message_id} rejected")]
    NotConsuming {
        /// Id of the rejected envelope.
        message_id: String,
    },

    /// The underlying channel is gone.
    #[error("Transport channel closed")]
    Closed,
}

/// Errors from non-blocking inbox reads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InboxError {
    /// The transport was dropped.
    #[error("Inbox closed")]
    Closed,
}

/// Control surface of a message transport.
///
/// A worker calls `start_consuming` only after it is fully bootstrapped and
/// `stop_consuming` first thing on shutdown.
pub trait Transport: Send + Sync {
    /// Attach a consumer and begin accepting envelopes.
    fn start_consuming(&self) -> Result<Inbox, TransportError>;

    /// Stop accepting new envelopes. Idempotent.
    fn stop_consuming(&self) -> Result<(), TransportError>;

    /// Whether envelopes are currently accepted.
    fn is_consuming(&self) -> bool;
}

/// Receiving end handed to the consumer by `start_consuming`.
pub struct Inbox {
    receiver: broadcast::Receiver<Envelope>,
}

impl Inbox {
    fn new(receiver: broadcast::Receiver<Envelope>) -> Self {
        Self { receiver }
    }

    /// Receive the next envelope.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next envelope
    /// - `None` - The transport was dropped
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Inbox lagged, envelopes dropped");
                }
            }
        }
    }

    /// Receive an already-buffered envelope without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - An envelope was buffered
    /// - `Ok(None)` - Nothing buffered
    /// - `Err(InboxError::Closed)` - The transport was dropped
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, InboxError> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => return Ok(Some(envelope)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(InboxError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(lagged = count, "Inbox lagged, envelopes dropped");
                }
            }
        }
    }

    /// Convert into a stream for use with stream combinators.
    ///
    /// Lag notifications are skipped.
    pub fn into_stream(self) -> impl Stream<Item = Envelope> {
        BroadcastStream::new(self.receiver).filter_map(Result::ok)
    }
}

/// In-memory transport backed by `tokio::sync::broadcast`.
///
/// Suitable for single-node operation; a networked deployment would plug a
/// broker-backed implementation in behind [`Transport`].
pub struct InMemoryTransport {
    sender: broadcast::Sender<Envelope>,
    consuming: AtomicBool,
    envelopes_published: AtomicU64,
    envelopes_rejected: AtomicU64,
    sessions_opened: AtomicU64,
    capacity: usize,
}

impl InMemoryTransport {
    /// Create a transport with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a transport with the given inbox capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            consuming: AtomicBool::new(false),
            envelopes_published: AtomicU64::new(0),
            envelopes_rejected: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Publish an envelope to the attached consumer.
    ///
    /// Returns the number of inboxes that received it.
    pub fn publish(&self, envelope: Envelope) -> Result<usize, TransportError> {
        if !self.is_consuming() {
            self.envelopes_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                message_id = %envelope.message_id(),
                message_type = envelope.message_type(),
                "Envelope rejected (not consuming)"
            );
            return Err(TransportError::NotConsuming {
                message_id: envelope.message_id().to_string(),
            });
        }

        let message_id = envelope.message_id();
        match self.sender.send(envelope) {
            Ok(receivers) => {
                self.envelopes_published.fetch_add(1, Ordering::Relaxed);
                debug!(%message_id, receivers, "Envelope published");
                Ok(receivers)
            }
            Err(_) => {
                self.envelopes_rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%message_id, "Envelope dropped (inbox gone)");
                Err(TransportError::Closed)
            }
        }
    }

    /// Total envelopes accepted.
    #[must_use]
    pub fn envelopes_published(&self) -> u64 {
        self.envelopes_published.load(Ordering::Relaxed)
    }

    /// Total envelopes refused.
    #[must_use]
    pub fn envelopes_rejected(&self) -> u64 {
        self.envelopes_rejected.load(Ordering::Relaxed)
    }

    /// How many times a consumer was attached.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Inbox capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryTransport {
    fn start_consuming(&self) -> Result<Inbox, TransportError> {
        // The receiver must exist before publishers can see `consuming`.
        let receiver = self.sender.subscribe();
        if self
            .consuming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransportError::AlreadyConsuming);
        }

        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        info!(capacity = self.capacity, "Transport consuming");
        Ok(Inbox::new(receiver))
    }

    fn stop_consuming(&self) -> Result<(), TransportError> {
        if self.consuming.swap(false, Ordering::AcqRel) {
            info!("Transport stopped consuming");
        }
        Ok(())
    }

    fn is_consuming(&self) -> bool {
        self.consuming.load(Ordering::Acquire)
    }
}
