//! The listener fan-out.
//!
//! Every mutation in the core produces an ordered observer event. All
//! events of one wallet manager flow through a single unbounded channel
//! and are drained by a single task, so listener callbacks are serialized
//! per manager and arrive in generation order (per entity; cross-entity
//! order is channel arrival order).
//!
//! Senders never block and never fail: once the receiving side is gone
//! the events are simply dropped, which is exactly what a torn-down
//! manager wants.

use std::sync::Arc;

use common::amount::Amount;
use common::task::Task;
use tokio::sync::mpsc;
use tracing::debug;

use crate::fee::FeeBasis;
use crate::manager::{ManagerState, SyncDepth, SyncStoppedReason};
use crate::transfer::{Transfer, TransferState};
use crate::wallet::{Wallet, WalletState};

/// Events on a single transfer.
#[derive(Clone, Debug)]
pub enum TransferEvent {
    Created,
    Changed {
        old: TransferState,
        new: TransferState,
    },
    Deleted,
}

/// The outcome of an asynchronous fee estimation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EstimateStatus {
    Success,
    Failed,
}

/// Events on a wallet.
#[derive(Clone, Debug)]
pub enum WalletEvent {
    Created,
    Changed {
        old: WalletState,
        new: WalletState,
    },
    Deleted,
    TransferAdded {
        transfer: Arc<Transfer>,
    },
    TransferChanged {
        transfer: Arc<Transfer>,
    },
    TransferSubmitted {
        transfer: Arc<Transfer>,
    },
    TransferDeleted {
        transfer: Arc<Transfer>,
    },
    /// Emitted only when the balance actually changed.
    BalanceUpdated {
        balance: Amount,
    },
    /// The wallet's default fee basis changed.
    FeeBasisUpdated {
        fee_basis: FeeBasis,
    },
    /// Completion of [`crate::manager::WalletManager::estimate_fee_basis`].
    /// `cookie` is the caller's opaque token, round-tripped verbatim.
    FeeBasisEstimated {
        status: EstimateStatus,
        cookie: u64,
        fee_basis: Option<FeeBasis>,
    },
}

/// Events on the wallet manager itself.
#[derive(Clone, Debug)]
pub enum ManagerEvent {
    Created,
    Changed {
        old: ManagerState,
        new: ManagerState,
    },
    Deleted,
    WalletAdded { wallet: Arc<Wallet> },
    WalletChanged { wallet: Arc<Wallet> },
    WalletDeleted { wallet: Arc<Wallet> },
    SyncStarted,
    SyncContinues { percent_complete: Option<f32> },
    SyncStopped { reason: SyncStoppedReason },
    SyncRecommended { depth: SyncDepth },
    BlockHeightUpdated { height: u64 },
}

/// One fan-out event: transfer events carry their wallet, wallet events
/// their wallet, manager events stand alone.
#[derive(Clone, Debug)]
pub enum Event {
    Transfer {
        wallet: Arc<Wallet>,
        transfer: Arc<Transfer>,
        event: TransferEvent,
    },
    Wallet {
        wallet: Arc<Wallet>,
        event: WalletEvent,
    },
    Manager {
        event: ManagerEvent,
    },
}

/// The sending half of a manager's event channel. Cheap to clone; held by
/// the manager, its wallets, and their transfers.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            // The receiver is gone; the manager is being torn down.
            debug!("Dropped event: receiver closed");
        }
    }

    pub fn wallet_event(&self, wallet: &Arc<Wallet>, event: WalletEvent) {
        self.send(Event::Wallet {
            wallet: wallet.clone(),
            event,
        });
    }

    pub fn manager_event(&self, event: ManagerEvent) {
        self.send(Event::Manager { event });
    }
}

/// The receiving half; exactly one per manager.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Receive the next event; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drain whatever is currently queued without waiting.
    pub fn drain_now(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// An observer of core events. Callbacks run on the manager's event task,
/// one at a time, in arrival order; they must not call back into the core
/// synchronously.
pub trait EventListener: Send + Sync + 'static {
    fn handle_event(&self, event: Event);
}

/// Spawn the event task draining `rx` into `listener`. The task ends when
/// every [`EventSender`] is dropped.
pub fn spawn_event_pump(
    mut rx: EventReceiver,
    listener: Arc<dyn EventListener>,
) -> Task<()> {
    Task::spawn("event pump", async move {
        while let Some(event) = rx.recv().await {
            listener.handle_event(event);
        }
        debug!("Event pump shutting down");
    })
}
