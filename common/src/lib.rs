//! Types shared by every crate in the wallet-core workspace: chain tags,
//! units, amounts, hashes, addresses, transfer attributes, accounts, and a
//! few small async utilities.
//!
//! Nothing in this crate touches the network or the disk; it is pure data
//! plus the invariants that hold that data together.

// Enforce disallowed methods clippy lint
#![deny(clippy::disallowed_methods)]

/// User accounts: per-chain primary addresses plus the account's sync floor.
pub mod account;
/// Chain-tagged addresses with canonical-string round-trips.
pub mod address;
/// Signed 256-bit amounts denominated in a [`unit::Unit`].
pub mod amount;
/// Key/value attributes carried alongside transfers.
pub mod attribute;
/// The closed set of supported chains, plus network handles.
pub mod chain;
/// Chain-tagged transaction hashes.
pub mod hash;
/// Opaque signing keys (public bytes, optional secret).
pub mod key;
/// Multi-consumer shutdown signalling.
pub mod shutdown;
/// A `#[must_use]` named task wrapper.
pub mod task;
/// Round-trip proptest helpers, enabled by the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
/// Currency denominations and unit compatibility.
pub mod unit;
