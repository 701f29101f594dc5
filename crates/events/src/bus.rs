//! In-process event bus (pub/sub mechanics only).
//!
//! The bus fans events out to local subscribers **synchronously and
//! best-effort**. It is not durable and provides no delivery guarantee — the
//! publisher writes the outbox row first, and the scheduler queue carries the
//! durable delivery. Subscribers must be idempotent; a failing subscriber
//! never aborts a publish.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to the bus.
///
/// Each subscription receives a copy of every published envelope (broadcast
/// semantics). Designed for single-threaded consumption: one subscription,
/// one consumer loop.
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

/// Pub/sub abstraction for local event distribution.
///
/// Sits *after* the outbox append in the publish pipeline:
///
/// ```text
/// publish → outbox append (durable) → bus fan-out (best-effort) → delivery job
/// ```
///
/// Implementations must be safe to publish from multiple in-flight handlers
/// concurrently.
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
