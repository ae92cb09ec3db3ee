//! The QRY synchronizer's round state and periodic driver.
//!
//! Syncing is an address-driven pull loop: each round queries the indexer
//! for everything touching the wallet's recovery addresses within the
//! current window `[beg, end]`, folds the results into the wallet, and
//! re-queries any addresses discovered along the way before closing. At
//! most one round is ever in flight, identified by a monotonically
//! increasing request id; responses carrying a stale id are discarded.
//!
//! After every successful round the window's begin retreats by
//! [`QrySyncState::block_number_offset`] blocks (roughly three days of
//! chain time, at least 100 blocks) before advancing, so indexer lag and
//! shallow reorgs are absorbed by re-scanning the recent overlap.

use std::sync::Arc;
use std::time::Duration;

use common::task::Task;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::client::BLOCK_HEIGHT_UNBOUNDED;
use crate::manager::{SyncDepth, WalletManager};

/// Ticks per network confirmation period: a chain targeting ten-minute
/// blocks is polled every two and a half minutes.
pub const CONFIRMATION_PERIOD_FACTOR: u32 = 4;

/// The begin-block overlap re-scanned after successful rounds.
const OFFSET_SECONDS: u64 = 3 * 24 * 60 * 60;

const RID_NONE: u64 = u64::MAX;

/// The block range the current round is responsible for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncWindow {
    pub rid: u64,
    pub beg_block: u64,
    pub end_block: u64,
    pub completed: bool,
    pub success: bool,
    /// When set, requests are issued with an unbounded end so the first
    /// full sync also returns recent and pending rows immediately.
    pub unbounded: bool,
}

/// One planned request round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPlan {
    pub rid: u64,
    pub beg_block: u64,
    /// The end to put on the wire ([`BLOCK_HEIGHT_UNBOUNDED`] when the
    /// window is unbounded).
    pub end_block: u64,
    /// Whether this round spans enough history to count as a full sync
    /// (brackets SYNC_STARTED / SYNC_STOPPED and the SYNCING state).
    pub is_full: bool,
}

/// The synchronizer's mutable state. Owned by the wallet manager behind
/// its lock; the arithmetic lives here so it can be driven directly in
/// tests without timers or transports.
#[derive(Debug)]
pub struct QrySyncState {
    next_rid: u64,
    window: SyncWindow,
    block_number_offset: u64,
    earliest_block: u64,
}

impl QrySyncState {
    pub fn new(
        earliest_block: u64,
        current_height: u64,
        confirmation_period: Duration,
    ) -> Self {
        let period_secs = confirmation_period.as_secs().max(1);
        let block_number_offset = (OFFSET_SECONDS / period_secs).max(100);

        Self {
            next_rid: 0,
            window: SyncWindow {
                rid: RID_NONE,
                beg_block: earliest_block,
                end_block: current_height.max(earliest_block),
                completed: true,
                success: false,
                unbounded: true,
            },
            block_number_offset,
            earliest_block,
        }
    }

    pub fn window(&self) -> &SyncWindow {
        &self.window
    }

    pub fn block_number_offset(&self) -> u64 {
        self.block_number_offset
    }

    /// One periodic tick's window arithmetic:
    ///
    /// 1. if the previous round completed successfully, advance `beg` to
    ///    `end - offset` (the overlap absorbs reorgs and indexer lag);
    /// 2. pull `end` up to the current network height;
    /// 3. if no round is in flight and there are blocks to examine,
    ///    start a new round.
    pub fn plan_round(&mut self, network_height: u64) -> Option<RoundPlan> {
        let window = &mut self.window;

        if window.completed && window.success {
            window.beg_block =
                window.end_block.saturating_sub(self.block_number_offset);
        }

        window.end_block = network_height.max(window.beg_block);

        if !window.completed || window.beg_block == window.end_block {
            return None;
        }

        window.rid = self.next_rid;
        self.next_rid += 1;
        window.completed = false;
        window.success = false;

        Some(RoundPlan {
            rid: window.rid,
            beg_block: window.beg_block,
            end_block: if window.unbounded {
                BLOCK_HEIGHT_UNBOUNDED
            } else {
                window.end_block
            },
            is_full: window.end_block - window.beg_block
                > 2 * self.block_number_offset,
        })
    }

    /// Whether a response for `rid` belongs to the round in flight.
    pub fn is_current(&self, rid: u64) -> bool {
        !self.window.completed && self.window.rid == rid
    }

    pub fn finish_round(&mut self, rid: u64, success: bool) {
        if self.window.rid == rid && !self.window.completed {
            self.window.completed = true;
            self.window.success = success;
        }
    }

    /// Retire whatever round is in flight; its responses become stale.
    /// Called on disconnect.
    pub fn retire(&mut self) {
        if !self.window.completed {
            self.window.completed = true;
            self.window.success = false;
        }
        self.window.rid = RID_NONE;
    }

    /// Rewind the window for an explicit sync request.
    pub fn rewind(&mut self, depth: SyncDepth, last_confirmed_send: Option<u64>) {
        let beg = match depth {
            SyncDepth::FromCreation => self.earliest_block,
            SyncDepth::FromLastConfirmedSend => last_confirmed_send
                .unwrap_or(self.earliest_block)
                .max(self.earliest_block),
            SyncDepth::FromLastTrustedBlock => self
                .window
                .end_block
                .saturating_sub(2 * self.block_number_offset)
                .max(self.earliest_block),
        };
        self.window.beg_block = beg;
        // Invalidate the last round's success so the next tick doesn't
        // immediately advance past the rewound begin.
        self.window.success = false;
    }
}

/// Spawn the periodic driver: one tick every quarter confirmation period,
/// for as long as the manager is alive and not shut down.
pub(crate) fn spawn_sync_task(manager: &Arc<WalletManager>) -> Task<()> {
    let weak = Arc::downgrade(manager);
    let mut shutdown = manager.shutdown_handle();
    let period = manager.network().chain().confirmation_period()
        / CONFIRMATION_PERIOD_FACTOR;

    Task::spawn("qry sync", async move {
        let mut timer = time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let Some(manager) = weak.upgrade() else { break };
                    manager.sync_tick().await;
                }
                () = shutdown.recv() => break,
            }
        }

        info!("QRY synchronizer shutting down");
    })
}
