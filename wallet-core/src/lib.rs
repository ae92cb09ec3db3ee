//! The network-agnostic transfer and wallet-manager engine of a
//! multi-currency wallet.
//!
//! One [`manager::WalletManager`] binds one account to one network. It
//! owns per-currency [`wallet::Wallet`]s; each wallet owns its
//! [`transfer::Transfer`]s. Sends flow down through signing and the
//! selected send path; indexer results flow up through the
//! [`sync`] loop into wallet state, and every mutation fans out as an
//! ordered [`event::Event`].
//!
//! Chain-specific behavior (payload shapes, fee arithmetic, attribute
//! rules, bundle reconciliation) lives under [`chains`]; the transports,
//! wire codecs and cryptography are external collaborators consumed via
//! the [`client`], [`p2p`] and [`signer`] contracts.

// Enforce disallowed methods clippy lint
#![deny(clippy::disallowed_methods)]

/// Indexer-delivered transfer/transaction rows.
pub mod bundle;
/// Per-chain payloads, reconciliation, fee and attribute rules.
pub mod chains;
/// The remote indexer contract.
pub mod client;
/// Event types and the per-manager fan-out.
pub mod event;
/// Polymorphic fee bases.
pub mod fee;
/// The wallet manager.
pub mod manager;
/// The peer-to-peer contract and sync/send routing.
pub mod p2p;
/// The versioned durable store.
pub mod persist;
/// The signing contract.
pub mod signer;
/// The QRY synchronizer.
pub mod sync;
/// Wallet sweepers.
pub mod sweep;
/// Transfers and their state machine.
pub mod transfer;
/// Per-currency wallets.
pub mod wallet;
