//! Ripple: fixed network fee, destination-tag attributes, transfer-bundle
//! sync.

use std::sync::Arc;

use anyhow::Context;
use common::address::Address;
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

pub const DESTINATION_TAG: &str = "DestinationTag";
pub const INVOICE_ID: &str = "InvoiceId";

/// Custodial targets which reject deposits lacking a destination tag.
/// Mirrors the indexer's exchange list; kept small and static here.
const TAG_REQUIRED_TARGETS: &[&str] = &[
    "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
    "rEb8TK3gBgk5auZkwc6sHnwrGVJH8DuaLh",
    "rw2ciyaNshpHe7bCHo4bRWq6pqqynnWKQg",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XrpPayload {
    pub hash: Option<TxHash>,
    pub raw: Option<Vec<u8>>,
}

pub(crate) fn unsigned_payload() -> TransferPayload {
    TransferPayload::Ripple(XrpPayload {
        hash: None,
        raw: None,
    })
}

pub(crate) fn attribute_specs(target: Option<&Address>) -> Vec<AttributeSpec> {
    let tag_required = target
        .map(|t| TAG_REQUIRED_TARGETS.contains(&t.as_str()))
        .unwrap_or(false);
    vec![
        AttributeSpec {
            key: DESTINATION_TAG,
            required: tag_required,
        },
        AttributeSpec {
            key: INVOICE_ID,
            required: false,
        },
    ]
}

pub(crate) fn validate_attribute_value(
    key: &str,
    value: &str,
) -> Result<(), AttributeValidationError> {
    if key.eq_ignore_ascii_case(DESTINATION_TAG) {
        // Tags are 32-bit unsigned integers on the wire.
        value
            .parse::<u32>()
            .map(|_| ())
            .map_err(|_| AttributeValidationError::MismatchedType)
    } else if key.eq_ignore_ascii_case(INVOICE_ID) {
        let ok = value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit());
        if ok {
            Ok(())
        } else {
            Err(AttributeValidationError::MismatchedType)
        }
    } else {
        Ok(())
    }
}

pub(crate) fn estimate_fee_basis(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
) -> anyhow::Result<FeeEstimateOutcome> {
    let fee_drops = network_fee
        .price_per_cost_factor
        .to_base_u64()
        .context("XRP network fee out of range")?;
    Ok(FeeEstimateOutcome::Ready(FeeBasis::Ripple {
        unit: wallet.unit_for_fee().clone(),
        fee_drops,
    }))
}

pub(crate) fn recover_parts(
    wallet: &Arc<Wallet>,
    bundle: &TransferBundle,
) -> anyhow::Result<RecoveredParts> {
    let hash = TxHash::from_hex(ChainKind::Xrp, &bundle.hash)
        .context("Bad XRP transaction hash")?;

    let amount = Amount::parse_base(wallet.unit().clone(), &bundle.amount)?;

    let fee_drops = match bundle.fee.as_deref() {
        Some(fee) => fee
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Bad XRP fee '{fee}'"))?,
        None => 0,
    };
    let fee_basis = FeeBasis::Ripple {
        unit: wallet.unit_for_fee().clone(),
        fee_drops,
    };

    let source = bundle_address(ChainKind::Xrp, &bundle.from);
    let target = bundle_address(ChainKind::Xrp, &bundle.to);
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
        payload: TransferPayload::Ripple(XrpPayload {
            hash: Some(hash),
            raw: None,
        }),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn destination_tag_value_shapes() {
        assert!(validate_attribute_value(DESTINATION_TAG, "12345").is_ok());
        assert_eq!(
            validate_attribute_value(DESTINATION_TAG, "abc"),
            Err(AttributeValidationError::MismatchedType),
        );
        // Larger than u32.
        assert_eq!(
            validate_attribute_value(DESTINATION_TAG, "99999999999"),
            Err(AttributeValidationError::MismatchedType),
        );
    }

    #[test]
    fn invoice_id_must_be_32_hex_bytes() {
        assert!(validate_attribute_value(INVOICE_ID, &"ab".repeat(32)).is_ok());
        assert!(validate_attribute_value(INVOICE_ID, "xyz").is_err());
    }

    #[test]
    fn exchanges_require_a_tag() {
        let exchange =
            Address::parse(ChainKind::Xrp, TAG_REQUIRED_TARGETS[0]).unwrap();
        let personal = Address::parse(
            ChainKind::Xrp,
            "rDarPNJEpCnpBZSfmcquydockkePkjPGA2",
        )
        .unwrap();

        let specs = attribute_specs(Some(&exchange));
        assert!(specs.iter().any(|s| s.key == DESTINATION_TAG && s.required));

        let specs = attribute_specs(Some(&personal));
        assert!(specs.iter().any(|s| s.key == DESTINATION_TAG && !s.required));
    }
}
