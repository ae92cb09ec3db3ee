//! Tezos: estimated fee bases before inclusion, a single "actual" number
//! afterwards; operation memos.

use std::sync::Arc;

use anyhow::Context;
use common::amount::Amount;
use common::attribute::{AttributeSpec, AttributeValidationError, TransferAttribute};
use common::chain::{ChainKind, NetworkFee};
use common::hash::TxHash;
use serde::{Deserialize, Serialize};

use crate::bundle::TransferBundle;
use crate::chains::{
    bundle_address, direction_for, FeeEstimateOutcome, RecoveredParts,
    TransferPayload,
};
use crate::fee::{FeeBasis, XtzFee};
use crate::wallet::Wallet;

pub const MEMO: &str = "Memo";

// Protocol defaults for a plain transaction operation.
const DEFAULT_OPERATION_SIZE: u64 = 250;
const DEFAULT_GAS_LIMIT: u64 = 10_600;
const DEFAULT_STORAGE_LIMIT: u64 = 257;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XtzPayload {
    pub operation_hash: Option<TxHash>,
    pub raw: Option<Vec<u8>>,
}

pub(crate) fn unsigned_payload() -> TransferPayload {
    TransferPayload::Tezos(XtzPayload {
        operation_hash: None,
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
    _key: &str,
    _value: &str,
) -> Result<(), AttributeValidationError> {
    Ok(())
}

pub(crate) fn estimate_fee_basis(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
    _attributes: &[TransferAttribute],
) -> anyhow::Result<FeeEstimateOutcome> {
    let mutez_per_kb = network_fee
        .price_per_cost_factor
        .to_base_u64()
        .context("XTZ network fee out of range")?;
    Ok(FeeEstimateOutcome::Ready(FeeBasis::Tezos {
        unit: wallet.unit_for_fee().clone(),
        fee: XtzFee::Estimate {
            mutez_per_kb,
            size_bytes: DEFAULT_OPERATION_SIZE,
            gas_limit: DEFAULT_GAS_LIMIT,
            storage_limit: DEFAULT_STORAGE_LIMIT,
        },
    }))
}

pub(crate) fn recover_parts(
    wallet: &Arc<Wallet>,
    bundle: &TransferBundle,
) -> anyhow::Result<RecoveredParts> {
    let hash = TxHash::from_hex(ChainKind::Xtz, &bundle.hash)
        .context("Bad XTZ operation hash")?;

    let amount = Amount::parse_base(wallet.unit().clone(), &bundle.amount)?;

    // The indexer reports one settled number; the confirmed basis is an
    // "actual" basis reconstructed from it.
    let fee_mutez = match bundle.fee.as_deref() {
        Some(fee) => fee
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Bad XTZ fee '{fee}'"))?,
        None => 0,
    };
    let fee_basis = FeeBasis::Tezos {
        unit: wallet.unit_for_fee().clone(),
        fee: XtzFee::Actual { fee_mutez },
    };

    let source = bundle_address(ChainKind::Xtz, &bundle.from);
    let target = bundle_address(ChainKind::Xtz, &bundle.to);
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
        payload: TransferPayload::Tezos(XtzPayload {
            operation_hash: Some(hash),
            raw: None,
        }),
    })
}
