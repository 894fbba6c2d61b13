//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the **transport layer** for events after they have been
//! appended to the event store:
//!
//! ```text
//! Command → Event Store (append) → Event Bus (publish) → Consumers
//!                                                           ├─ Ledger projection
//!                                                           ├─ Stock read model
//!                                                           └─ Low-stock notifier
//! ```
//!
//! Events are stored first, then published, so a failed publication never
//! loses a fact — the store remains the source of truth and consumers can be
//! replayed from it.
//!
//! Delivery is **at-least-once** with broadcast semantics: each subscriber
//! gets a copy of every published event, possibly more than once, possibly
//! interleaved across publishers. Consumers must be idempotent; the
//! projections in `stockpile-infra` track per-stream cursors for exactly
//! this reason.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Designed for single-threaded consumption: one subscription per consumer
/// thread. Messages arrive in the order the bus implementation published
/// them.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Transport-agnostic and storage-free: works with in-memory channels in
/// tests and message brokers in production without the domain noticing.
/// `publish()` can fail; since events are already persisted at that point,
/// the caller may retry publication safely (duplicates are the consumer's
/// problem by contract).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
