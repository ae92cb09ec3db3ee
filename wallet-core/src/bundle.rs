//! Bundles: the value objects the remote indexer delivers, one row per
//! on-chain event.
//!
//! A *transfer bundle* is a fully-parsed row (addresses, amounts, fees as
//! decimal strings) used by the account-based chains. A *transaction
//! bundle* carries an opaque serialized transaction and is used by the
//! Bitcoin family, where one transaction can move value at several
//! addresses at once. Both sort ascending by `(block, index)` so that
//! reconciliation folds earlier history first.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::fee::FeeBasis;
use crate::transfer::{SubmitError, TransferState, TransferStateKind};

/// One indexer row describing a single transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferBundle {
    pub status: TransferStateKind,
    /// Chain-specific transaction/operation hash, hex.
    pub hash: String,
    /// The indexer's own identifier for this transfer.
    pub uids: String,
    pub from: String,
    pub to: String,
    /// Base-unit amount as a decimal string.
    pub amount: String,
    /// Currency code ("xrp", "usdt", ...).
    pub currency: String,
    /// Base-unit fee as a decimal string, when the indexer knows it.
    pub fee: Option<String>,
    pub block_timestamp: u64,
    pub block_number: u64,
    pub block_confirmations: u64,
    pub block_transaction_index: u64,
    pub block_hash: String,
    pub attributes: Vec<(String, String)>,
}

impl TransferBundle {
    /// The canonical reconciliation order: ascending block, then index.
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.block_transaction_index)
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.ordering_key().cmp(&other.ordering_key())
    }

    /// Project this bundle's status into a transfer state.
    ///
    /// An ERRORED row that nevertheless carries a block position is an
    /// on-chain failure: it was included, unsuccessfully, and still burned
    /// its fee. Plain ERRORED rows (no block) become `Errored`.
    pub fn transfer_state(
        &self,
        confirmed_fee_basis: Option<FeeBasis>,
    ) -> TransferState {
        let included_but_failed = self.status == TransferStateKind::Errored
            && self.block_number != 0
            && self.block_timestamp != 0;

        match self.status {
            TransferStateKind::Included => TransferState::included(
                self.block_number,
                self.block_transaction_index,
                self.block_timestamp,
                confirmed_fee_basis,
                true,
                None,
            ),
            TransferStateKind::Errored if included_but_failed =>
                TransferState::included(
                    self.block_number,
                    self.block_transaction_index,
                    self.block_timestamp,
                    confirmed_fee_basis,
                    false,
                    Some("unknown"),
                ),
            TransferStateKind::Errored =>
                TransferState::errored(SubmitError::Unknown),
            TransferStateKind::Created => TransferState::Created,
            TransferStateKind::Signed => TransferState::Signed,
            TransferStateKind::Submitted => TransferState::Submitted,
            TransferStateKind::Deleted => TransferState::Deleted,
        }
    }
}

/// One indexer row carrying an opaque serialized transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionBundle {
    pub status: TransferStateKind,
    pub serialization: Vec<u8>,
    pub timestamp: u64,
    pub block_height: u64,
}

impl TransactionBundle {
    pub fn compare(&self, other: &Self) -> Ordering {
        self.block_height.cmp(&other.block_height)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bundle(block: u64, index: u64) -> TransferBundle {
        TransferBundle {
            status: TransferStateKind::Included,
            hash: String::new(),
            uids: String::new(),
            from: String::new(),
            to: String::new(),
            amount: "0".to_owned(),
            currency: "xrp".to_owned(),
            fee: None,
            block_timestamp: 0,
            block_number: block,
            block_confirmations: 0,
            block_transaction_index: index,
            block_hash: String::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn bundles_sort_by_block_then_index() {
        let mut bundles = vec![bundle(2, 0), bundle(1, 5), bundle(1, 2)];
        bundles.sort_by(|a, b| a.compare(b));
        let keys: Vec<_> = bundles.iter().map(TransferBundle::ordering_key).collect();
        assert_eq!(keys, vec![(1, 2), (1, 5), (2, 0)]);
    }

    #[test]
    fn errored_with_block_position_is_a_failed_inclusion() {
        let mut b = bundle(700_000, 3);
        b.status = TransferStateKind::Errored;
        b.block_timestamp = 1_700_000_000;

        match b.transfer_state(None) {
            TransferState::Included {
                success: false,
                error: Some(e),
                block_number,
                ..
            } => {
                assert_eq!(block_number, 700_000);
                assert_eq!(e, "unknown");
            }
            other => panic!("expected failed inclusion, got {other:?}"),
        }

        // Without a block position it is a plain submit error.
        let mut b = bundle(0, 0);
        b.status = TransferStateKind::Errored;
        b.block_timestamp = 0;
        assert_eq!(
            b.transfer_state(None),
            TransferState::errored(SubmitError::Unknown),
        );
    }
}
