//! Ethereum and ERC-20 tokens.
//!
//! A transfer's basis is three-way: an on-chain transaction we originated
//! or received, a token log event parsed by the indexer, or an internal
//! exchange. Token wallets denominate amounts in the token unit but pay
//! fees in ether, so their fee is deliberately absent from net-amount
//! arithmetic (the units are incompatible).

use std::sync::Arc;

use anyhow::Context;
use common::address::Address;
use common::amount::Amount;
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

/// Gas for a plain ether send.
const DEFAULT_GAS_LIMIT: u64 = 21_000;
/// Conservative default for a token `transfer(...)` call; refined by the
/// remote estimator.
const DEFAULT_TOKEN_GAS_LIMIT: u64 = 92_000;

/// The three ways an Ethereum transfer comes into existence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EthBasis {
    /// An actual on-chain transaction.
    Transaction { nonce: u64 },
    /// An ERC-20 `Transfer` log within some transaction.
    Log {
        log_index: u64,
        token_contract: String,
    },
    /// An indexer-reported internal exchange (no log, no own tx).
    Exchange { exchange_index: u64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EthPayload {
    pub basis: EthBasis,
    pub hash: Option<TxHash>,
    pub raw: Option<Vec<u8>>,
}

pub(crate) fn unsigned_payload(_wallet: &Arc<Wallet>) -> TransferPayload {
    // Sends always originate a transaction, token sends included; the
    // nonce is assigned by the signer.
    TransferPayload::Ethereum(EthPayload {
        basis: EthBasis::Transaction { nonce: 0 },
        hash: None,
        raw: None,
    })
}

/// Is this wallet the native ether wallet (as opposed to a token wallet)?
fn is_native(wallet: &Wallet) -> bool {
    wallet.unit().currency() == "ETH"
}

pub(crate) fn estimate_fee_basis(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
    target: &Address,
    amount: &Amount,
) -> anyhow::Result<FeeEstimateOutcome> {
    let gas_price_wei = u128::try_from(network_fee.price_per_cost_factor.value())
        .map_err(|_| anyhow::anyhow!("ETH gas price out of range"))?;

    let gas_limit = if is_native(wallet) {
        DEFAULT_GAS_LIMIT
    } else {
        DEFAULT_TOKEN_GAS_LIMIT
    };
    let initial = FeeBasis::Ethereum {
        unit: wallet.unit_for_fee().clone(),
        gas_price_wei,
        gas_limit,
    };

    // Gas usage depends on the target (contract or not) and calldata;
    // ask the indexer's estimator.
    #[derive(Serialize)]
    struct EstimationRequest<'a> {
        from: &'a str,
        to: &'a str,
        amount: String,
        token: Option<&'a str>,
    }
    let request = EstimationRequest {
        from: wallet.primary_address().as_str(),
        to: target.as_str(),
        amount: amount.value().to_string(),
        token: token_contract_of(wallet),
    };
    let unsigned = serde_json::to_vec(&request)
        .context("Fee estimation request encoding failed")?;

    Ok(FeeEstimateOutcome::NeedsRemote { unsigned, initial })
}

/// The token contract backing a token wallet's currency, if any. Token
/// units carry `TICKER:0xcontract` as their currency identity.
fn token_contract_of(wallet: &Wallet) -> Option<&str> {
    wallet.unit().currency().split_once(':').map(|(_, c)| c)
}

pub(crate) fn estimate_limit(wallet: &Arc<Wallet>) -> (Amount, bool, bool) {
    // The maximum spend of an ether wallet depends on the fee, which
    // needs a remote estimate; report the raw balance and say so.
    (wallet.balance(), true, false)
}

pub(crate) fn recover_parts(
    wallet: &Arc<Wallet>,
    bundle: &TransferBundle,
) -> anyhow::Result<RecoveredParts> {
    let hash = TxHash::from_hex(ChainKind::Eth, &bundle.hash)
        .context("Bad ETH transaction hash")?;

    let amount = Amount::parse_base(wallet.unit().clone(), &bundle.amount)?;

    // The settled fee arrives as one wei total; reconstruct a degenerate
    // basis with the whole fee as the price of a single gas unit.
    let fee_basis = match bundle.fee.as_deref() {
        Some(fee) => {
            let fee_wei = fee
                .trim()
                .parse::<u128>()
                .with_context(|| format!("Bad ETH fee '{fee}'"))?;
            Some(FeeBasis::Ethereum {
                unit: wallet.unit_for_fee().clone(),
                gas_price_wei: fee_wei,
                gas_limit: 1,
            })
        }
        None => None,
    };
    // Recovered transfers still need an estimated basis for the
    // invariant that one is always present.
    let estimated = fee_basis.clone().unwrap_or(FeeBasis::Ethereum {
        unit: wallet.unit_for_fee().clone(),
        gas_price_wei: 0,
        gas_limit: 0,
    });

    let basis = if !is_native(wallet) {
        EthBasis::Log {
            log_index: bundle.block_transaction_index,
            token_contract: token_contract_of(wallet).unwrap_or("").to_owned(),
        }
    } else if bundle.uids.contains(":exchange") {
        EthBasis::Exchange {
            exchange_index: bundle.block_transaction_index,
        }
    } else {
        EthBasis::Transaction { nonce: 0 }
    };

    let source = bundle_address(ChainKind::Eth, &bundle.from);
    let target = bundle_address(ChainKind::Eth, &bundle.to);
    let direction = direction_for(wallet, &source, &target);
    let state = bundle.transfer_state(fee_basis);

    Ok(RecoveredParts {
        amount,
        hash,
        state,
        direction,
        source,
        target,
        fee_basis: estimated,
        payload: TransferPayload::Ethereum(EthPayload {
            basis,
            hash: Some(hash),
            raw: None,
        }),
    })
}

#[cfg(test)]
mod test {
    use common::unit::token_unit;

    use super::*;

    #[test]
    fn token_units_expose_their_contract() {
        let unit = token_unit("USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6);
        assert_eq!(
            unit.currency().split_once(':').map(|(_, c)| c),
            Some("0xdac17f958d2ee523a2206206994597c13d831ec7"),
        );
    }
}
