//! # Shared Bus - Message Bus for Worker Processes
//!
//! The transport layer every worker attaches to. Messages travel as
//! [`Envelope`]s: an ordered header list plus an opaque payload.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   publish()    ┌──────────────┐  start_consuming()  ┌──────────────┐
//! │   Producer   │ ─────────────→ │  Transport   │ ──────────────────→ │    Inbox     │
//! └──────────────┘                └──────────────┘                     └──────┬───────┘
//!                                        ↑                                    │ recv()
//!                                        │ subscribe(event_type)              ▼
//!                                 ┌──────────────┐                     ┌──────────────┐
//!                                 │ Subscription │                     │    Worker    │
//!                                 │   Manager    │ ←────────────────── │  (runtime)   │
//!                                 └──────────────┘                     └──────────────┘
//! ```
//!
//! ## Rules
//!
//! - Envelopes are immutable once built; consumers never rewrite headers.
//! - A transport rejects envelopes while nobody is consuming, so nothing is
//!   accepted for dispatch before the worker is fully up.
//! - Subscribing is idempotent: repeating a `subscribe` for the same event
//!   type is a no-op.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod envelope;
pub mod subscription;
pub mod transport;

pub use envelope::{Envelope, Header};
pub use subscription::{
    EventTypeId, InMemorySubscriptionManager, SubscriptionManager, SubscriptionManagerError,
};
pub use transport::{InMemoryTransport, Inbox, InboxError, Transport, TransportError};

/// Maximum envelopes to buffer per inbox before the consumer lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Header naming the subsystem an envelope is addressed to.
pub const TARGET_SYSTEM_HEADER: &str = "TargetSystem";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }

    #[test]
    fn test_target_system_header_name() {
        assert_eq!(TARGET_SYSTEM_HEADER, "TargetSystem");
    }
}
