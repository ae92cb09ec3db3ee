//! Hedera: flat tinybar fee, 48-byte transaction hashes, memo attribute.
//!
//! A Hedera transfer's durable payload is just the hash plus the
//! `shard.realm.num@seconds.nanos` transaction id; everything else is
//! reconstructed from the wallet on load.

use std::sync::Arc;

use anyhow::Context;
use common::amount::Amount;
use common::attribute::{AttributeSpec, AttributeValidationError};
use common::chain::{ChainKind, NetworkFee};
use common::hash::TxHash;
use serde::{Deserialize, Serialize};

use crate::bundle::TransferBundle;
use crate::chains::{
    bundle_address, direction_for, FeeEstimateOutcome, RecoveredParts,
    TransferPayload,
};
use crate::fee::FeeBasis;
use crate::wallet::Wallet;

pub const MEMO: &str = "Memo";

/// The consensus memo size limit.
const MEMO_MAX_LEN: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HbarPayload {
    pub hash: Option<TxHash>,
    pub transaction_id: Option<String>,
    pub raw: Option<Vec<u8>>,
}

pub(crate) fn unsigned_payload() -> TransferPayload {
    TransferPayload::Hedera(HbarPayload {
        hash: None,
        transaction_id: None,
        raw: None,
    })
}

pub(crate) fn attribute_specs() -> Vec<AttributeSpec> {
    vec![AttributeSpec {
        key: MEMO,
        required: false,
    }]
}

pub(crate) fn validate_attribute_value(
    key: &str,
    value: &str,
) -> Result<(), AttributeValidationError> {
    if key.eq_ignore_ascii_case(MEMO) && value.len() > MEMO_MAX_LEN {
        return Err(AttributeValidationError::MismatchedType);
    }
    Ok(())
}

pub(crate) fn estimate_fee_basis(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
) -> anyhow::Result<FeeEstimateOutcome> {
    let fee_tinybar = network_fee
        .price_per_cost_factor
        .to_base_u64()
        .context("HBAR network fee out of range")?;
    Ok(FeeEstimateOutcome::Ready(FeeBasis::Hedera {
        unit: wallet.unit_for_fee().clone(),
        fee_tinybar,
    }))
}

pub(crate) fn recover_parts(
    wallet: &Arc<Wallet>,
    bundle: &TransferBundle,
) -> anyhow::Result<RecoveredParts> {
    let hash = TxHash::from_hex(ChainKind::Hbar, &bundle.hash)
        .context("Bad HBAR transaction hash")?;

    let amount = Amount::parse_base(wallet.unit().clone(), &bundle.amount)?;

    let fee_tinybar = match bundle.fee.as_deref() {
        Some(fee) => fee
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Bad HBAR fee '{fee}'"))?,
        None => 0,
    };
    let fee_basis = FeeBasis::Hedera {
        unit: wallet.unit_for_fee().clone(),
        fee_tinybar,
    };

    let source = bundle_address(ChainKind::Hbar, &bundle.from);
    let target = bundle_address(ChainKind::Hbar, &bundle.to);
    let direction = direction_for(wallet, &source, &target);
    let state = bundle.transfer_state(Some(fee_basis.clone()));

    Ok(RecoveredParts {
        amount,
        hash,
        state,
        direction,
        source,
        target,
        fee_basis,
        payload: TransferPayload::Hedera(HbarPayload {
            hash: Some(hash),
            transaction_id: Some(bundle.uids.clone()),
            raw: None,
        }),
    })
}
