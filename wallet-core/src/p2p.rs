//! The peer-to-peer contract and the sync/send dispatcher.
//!
//! A [`P2pManager`] wraps an external peer-to-peer engine; the core only
//! connects, disconnects, kicks syncs and hands over signed bytes. Only
//! Bitcoin-family managers ever have one. The dispatcher maps the selected
//! sync mode to which path serves syncs and which serves sends, falling
//! back to the indexer path when no peer-to-peer engine exists.

use async_trait::async_trait;

use crate::manager::{SyncDepth, SyncMode};

/// An external peer-to-peer engine.
#[async_trait]
pub trait P2pManager: Send + Sync + 'static {
    /// Connect, optionally to a caller-specified peer.
    async fn connect(&self, peer: Option<String>);

    async fn disconnect(&self);

    /// Kick a sync from the given depth toward `height`.
    async fn sync(&self, depth: SyncDepth, height: u64);

    /// Relay a signed transaction to the network.
    async fn send(&self, raw: &[u8]) -> anyhow::Result<()>;
}

/// Which engine serves a given operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClientPath {
    Qry,
    P2p,
}

/// Map `(mode, has_p2p)` to the (sync, send) paths.
///
/// Modes that name the peer-to-peer engine degrade to the indexer path
/// when the chain has none.
pub fn paths_for_mode(mode: SyncMode, has_p2p: bool) -> (ClientPath, ClientPath) {
    use ClientPath::{P2p, Qry};
    let (sync, send) = match mode {
        SyncMode::ApiOnly => (Qry, Qry),
        SyncMode::ApiWithP2pSend => (Qry, P2p),
        // Initial sync over the indexer; sends over the wire.
        SyncMode::P2pWithApiSync => (Qry, P2p),
        SyncMode::P2pOnly => (P2p, P2p),
    };
    if has_p2p {
        (sync, send)
    } else {
        (Qry, Qry)
    }
}
