use std::sync::Arc;

use tokio::sync::watch;

/// A synchronization utility for sending and receiving shutdown signals.
///
/// - Multi-producer and multi-consumer: clone to get another handle.
/// - A handle created (or cloned) *after* the signal was sent still
///   observes it, unlike [`tokio::sync::broadcast`].
/// - Sending more than once is harmless.
///
/// Built on a [`watch`] channel holding a single "shutting down" flag; the
/// sender half is kept inside every handle so the channel can never close
/// underneath a receiver.
#[derive(Clone, Debug)]
pub struct ShutdownChannel {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownChannel {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Send a shutdown signal, releasing every current and future waiter.
    pub fn send(&self) {
        // send() only errors when all receivers are gone; we hold one.
        self.tx.send_replace(true);
    }

    /// Wait until a shutdown signal has been sent. Returns immediately if
    /// one was already sent.
    pub async fn recv(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                // All senders dropped; treat as shutdown.
                return;
            }
        }
    }

    /// Whether a shutdown signal has been sent, without waiting.
    pub fn try_recv(&self) -> bool {
        *self.rx.borrow()
    }
}
