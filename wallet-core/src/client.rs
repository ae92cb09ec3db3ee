//! The remote indexer contract.
//!
//! The core never owns a transport: it consumes this trait, issues
//! requests from the synchronizer and the submission pipeline, and treats
//! every call as fire-and-forget work whose result is reconciled when it
//! arrives. Implementations live outside this workspace; tests use mocks.

use async_trait::async_trait;
use common::address::Address;

use crate::bundle::{TransactionBundle, TransferBundle};

/// Sentinel block height meaning "no upper bound": return everything from
/// `beg` onward, including unconfirmed rows.
pub const BLOCK_HEIGHT_UNBOUNDED: u64 = u64::MAX;

/// Whether a chain syncs by whole transactions or by parsed transfers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncGranularity {
    /// Bitcoin family: raw transactions, locally reconciled.
    Transactions,
    /// Account chains: the indexer parses transfers for us.
    Transfers,
}

/// A block-number response; the hash is present when the indexer attests
/// to a specific verified block.
#[derive(Clone, Debug)]
pub struct BlockNumber {
    pub height: u64,
    pub verified_block_hash: Option<String>,
}

/// The cost units measured by a remote fee estimation, plus any
/// chain-specific attributes the estimator wants to attach.
#[derive(Clone, Debug)]
pub struct FeeEstimate {
    pub cost_units: u64,
    pub attributes: Vec<(String, String)>,
}

/// The indexer client. `end == BLOCK_HEIGHT_UNBOUNDED` requests all
/// remaining history.
#[async_trait]
pub trait TransferClient: Send + Sync + 'static {
    async fn get_block_number(&self) -> anyhow::Result<BlockNumber>;

    async fn get_transactions(
        &self,
        addresses: &[Address],
        beg_block: u64,
        end_block: u64,
    ) -> anyhow::Result<Vec<TransactionBundle>>;

    async fn get_transfers(
        &self,
        addresses: &[Address],
        beg_block: u64,
        end_block: u64,
    ) -> anyhow::Result<Vec<TransferBundle>>;

    async fn submit_transaction(
        &self,
        raw: &[u8],
        hash_hex: &str,
    ) -> anyhow::Result<()>;

    async fn estimate_transaction_fee(
        &self,
        raw: &[u8],
        hash_hex: &str,
    ) -> anyhow::Result<FeeEstimate>;
}
