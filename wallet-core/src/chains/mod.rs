//! Per-chain behavior.
//!
//! The core's entities are chain-polymorphic sum types; this module holds
//! the chain-specific arms: payload shapes, transfer construction,
//! reconciliation of indexer bundles, attribute registries and fee
//! estimation. One submodule per chain family; everything chain-agnostic
//! dispatches through the functions here.

use std::sync::Arc;

use common::address::Address;
use common::amount::Amount;
use common::attribute::{
    AttributeSpec, AttributeValidationError, TransferAttribute,
};
use common::chain::{ChainKind, NetworkFee};
use common::hash::TxHash;
use common::unit::Unit;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle::TransferBundle;
use crate::fee::FeeBasis;
use crate::signer::SignedTransaction;
use crate::transfer::{Transfer, TransferDirection, TransferListener, TransferState};
use crate::wallet::Wallet;

pub mod btc;
pub mod eth;
pub mod hbar;
pub mod xrp;
pub mod xtz;

/// The chain-specific half of a transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransferPayload {
    Bitcoin(btc::BtcPayload),
    Ethereum(eth::EthPayload),
    Hedera(hbar::HbarPayload),
    Ripple(xrp::XrpPayload),
    Tezos(xtz::XtzPayload),
}

impl TransferPayload {
    pub fn chain(&self) -> ChainKind {
        match self {
            Self::Bitcoin(p) => p.chain,
            Self::Ethereum(_) => ChainKind::Eth,
            Self::Hedera(_) => ChainKind::Hbar,
            Self::Ripple(_) => ChainKind::Xrp,
            Self::Tezos(_) => ChainKind::Xtz,
        }
    }

    /// The transaction/operation hash, once known.
    pub fn hash(&self) -> Option<TxHash> {
        match self {
            Self::Bitcoin(p) => p.txid,
            Self::Ethereum(p) => p.hash,
            Self::Hedera(p) => p.hash,
            Self::Ripple(p) => p.hash,
            Self::Tezos(p) => p.operation_hash,
        }
    }

    /// The signed wire serialization, once known.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Self::Bitcoin(p) => p.raw.as_deref(),
            Self::Ethereum(p) => p.raw.as_deref(),
            Self::Hedera(p) => p.raw.as_deref(),
            Self::Ripple(p) => p.raw.as_deref(),
            Self::Tezos(p) => p.raw.as_deref(),
        }
    }

    /// Deterministic bytes describing the unsigned transfer, handed to
    /// the external signer and to remote fee estimation. The real wire
    /// encoding is produced by the signing collaborator.
    pub fn unsigned_preimage(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| anyhow::anyhow!("Preimage encoding failed: {e}"))
    }

    /// Record the signer's output.
    pub fn set_signed(&mut self, signed: &SignedTransaction) {
        match self {
            Self::Bitcoin(p) => {
                p.raw = Some(signed.raw.clone());
                p.txid = Some(signed.hash);
            }
            Self::Ethereum(p) => {
                p.raw = Some(signed.raw.clone());
                p.hash = Some(signed.hash);
            }
            Self::Hedera(p) => {
                p.raw = Some(signed.raw.clone());
                p.hash = Some(signed.hash);
            }
            Self::Ripple(p) => {
                p.raw = Some(signed.raw.clone());
                p.hash = Some(signed.hash);
            }
            Self::Tezos(p) => {
                p.raw = Some(signed.raw.clone());
                p.operation_hash = Some(signed.hash);
            }
        }
    }
}

/// Why [`Wallet::create_transfer`] refused.
#[derive(Debug, thiserror::Error)]
pub enum CreateTransferError {
    #[error("Invalid transfer attribute: {0}")]
    Attribute(#[from] AttributeValidationError),
    #[error("Amount currency does not match the wallet")]
    IncompatibleAmount,
    #[error("Fee basis belongs to a different chain")]
    FeeBasisChainMismatch,
    #[error("Target address belongs to a different chain")]
    TargetChainMismatch,
    #[error("Operation not supported for this chain")]
    NotSupported,
    #[error("A transfer needs at least one output")]
    NoOutputs,
}

/// The attribute keys a wallet recognizes for a target, with their
/// required-ness.
pub fn attribute_specs(
    chain: ChainKind,
    target: Option<&Address>,
) -> Vec<AttributeSpec> {
    match chain {
        ChainKind::Xrp => xrp::attribute_specs(target),
        ChainKind::Hbar => hbar::attribute_specs(),
        ChainKind::Xtz => xtz::attribute_specs(),
        _ => Vec::new(),
    }
}

/// Validate one attribute's key and value shape.
pub fn validate_attribute(
    chain: ChainKind,
    target: Option<&Address>,
    attribute: &TransferAttribute,
) -> Result<(), AttributeValidationError> {
    let specs = attribute_specs(chain, target);
    let spec = specs
        .iter()
        .find(|s| s.key.eq_ignore_ascii_case(attribute.key()))
        .ok_or(AttributeValidationError::RelationshipInconsistency)?;

    match attribute.value() {
        None if spec.required || attribute.is_required() =>
            Err(AttributeValidationError::RequiredButNotProvided),
        None => Ok(()),
        Some(value) => match chain {
            ChainKind::Xrp => xrp::validate_attribute_value(attribute.key(), value),
            ChainKind::Hbar => hbar::validate_attribute_value(attribute.key(), value),
            ChainKind::Xtz => xtz::validate_attribute_value(attribute.key(), value),
            _ => Ok(()),
        },
    }
}

/// Validate a proposed attribute set against a target: every provided
/// attribute must validate, and every attribute the target requires must
/// be provided.
pub fn validate_attributes(
    chain: ChainKind,
    target: &Address,
    attributes: &[TransferAttribute],
) -> Result<(), AttributeValidationError> {
    for attribute in attributes {
        validate_attribute(chain, Some(target), attribute)?;
    }

    for spec in attribute_specs(chain, Some(target)) {
        if spec.required
            && !attributes
                .iter()
                .any(|a| a.key().eq_ignore_ascii_case(spec.key) && a.value().is_some())
        {
            return Err(AttributeValidationError::RequiredButNotProvided);
        }
    }
    Ok(())
}

/// Build an unsigned outbound transfer in state `Created`.
pub fn create_transfer(
    wallet: &Arc<Wallet>,
    listener: TransferListener,
    target: Address,
    amount: Amount,
    fee_basis: FeeBasis,
    attributes: Vec<TransferAttribute>,
) -> Result<Arc<Transfer>, CreateTransferError> {
    let chain = wallet.chain();
    if !amount.unit().is_compatible(wallet.unit()) {
        return Err(CreateTransferError::IncompatibleAmount);
    }
    if fee_basis.chain() != chain {
        return Err(CreateTransferError::FeeBasisChainMismatch);
    }
    if target.chain() != chain {
        return Err(CreateTransferError::TargetChainMismatch);
    }
    validate_attributes(chain, &target, &attributes)?;

    let payload = match chain {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
            btc::unsigned_payload(chain, &fee_basis),
        ChainKind::Eth => eth::unsigned_payload(wallet),
        ChainKind::Hbar => hbar::unsigned_payload(),
        ChainKind::Xrp => xrp::unsigned_payload(),
        ChainKind::Xtz => xtz::unsigned_payload(),
    };

    Ok(Transfer::new(
        chain,
        listener,
        wallet.unit().clone(),
        wallet.unit_for_fee().clone(),
        fee_basis,
        amount,
        TransferDirection::Sent,
        wallet.primary_address().clone(),
        target,
        TransferState::Created,
        None,
        attributes,
        payload,
    ))
}

/// Build one unsigned transfer paying several outputs at once. Only the
/// Bitcoin family can express this; the transfer's amount is the sum over
/// the outputs and its target is the first output's address.
pub fn create_transfer_multiple(
    wallet: &Arc<Wallet>,
    listener: TransferListener,
    outputs: Vec<(Address, Amount)>,
    fee_basis: FeeBasis,
) -> Result<Arc<Transfer>, CreateTransferError> {
    let chain = wallet.chain();
    if !chain.is_bitcoin_family() {
        return Err(CreateTransferError::NotSupported);
    }
    if fee_basis.chain() != chain {
        return Err(CreateTransferError::FeeBasisChainMismatch);
    }
    let Some((first_target, _)) = outputs.first() else {
        return Err(CreateTransferError::NoOutputs);
    };
    let first_target = first_target.clone();

    let mut total = Amount::zero(wallet.unit().clone());
    for (target, amount) in &outputs {
        if target.chain() != chain {
            return Err(CreateTransferError::TargetChainMismatch);
        }
        total = total
            .checked_add(amount)
            .ok_or(CreateTransferError::IncompatibleAmount)?;
    }

    Ok(Transfer::new(
        chain,
        listener,
        wallet.unit().clone(),
        wallet.unit_for_fee().clone(),
        fee_basis.clone(),
        total,
        TransferDirection::Sent,
        wallet.primary_address().clone(),
        first_target,
        TransferState::Created,
        None,
        Vec::new(),
        btc::unsigned_payload(chain, &fee_basis),
    ))
}

/// Everything a chain recovers out of one transfer bundle.
pub(crate) struct RecoveredParts {
    pub amount: Amount,
    pub hash: TxHash,
    pub state: TransferState,
    pub direction: TransferDirection,
    pub source: Address,
    pub target: Address,
    pub fee_basis: FeeBasis,
    pub payload: TransferPayload,
}

/// Fold one indexer transfer bundle into the wallet: update the matching
/// transfer if we already hold one (a send of ours coming back), create
/// and add it otherwise. Used by every account-based chain.
pub(crate) fn reconcile_transfer_bundle(
    wallet: &Arc<Wallet>,
    listener: TransferListener,
    bundle: &TransferBundle,
) -> anyhow::Result<()> {
    let parts = match wallet.chain() {
        ChainKind::Eth => eth::recover_parts(wallet, bundle)?,
        ChainKind::Hbar => hbar::recover_parts(wallet, bundle)?,
        ChainKind::Xrp => xrp::recover_parts(wallet, bundle)?,
        ChainKind::Xtz => xtz::recover_parts(wallet, bundle)?,
        chain => anyhow::bail!(
            "Chain {chain} does not sync by transfer bundles"
        ),
    };

    let attributes = recovered_attributes(wallet, &parts.target, bundle);

    match wallet.transfer_by_hash(&parts.hash) {
        Some(existing) => {
            existing.adopt_uids(&bundle.uids);
            if !attributes.is_empty() {
                existing.set_attributes(attributes);
            }
            wallet.apply_transfer_state(&existing, parts.state);
        }
        None => {
            let transfer = Transfer::new(
                wallet.chain(),
                listener,
                wallet.unit().clone(),
                wallet.unit_for_fee().clone(),
                parts.fee_basis,
                parts.amount,
                parts.direction,
                parts.source,
                parts.target,
                parts.state,
                Some(bundle.uids.clone()),
                attributes,
                parts.payload,
            );
            wallet.add_transfer(&transfer);
        }
    }
    Ok(())
}

/// Rebuild a transfer's attributes from a bundle, keeping only the keys
/// the wallet recognizes for the target. Unknown keys indicate an indexer
/// quirk and are dropped with a note.
fn recovered_attributes(
    wallet: &Arc<Wallet>,
    target: &Address,
    bundle: &TransferBundle,
) -> Vec<TransferAttribute> {
    let specs = attribute_specs(wallet.chain(), Some(target));
    let mut out = Vec::new();
    for (key, value) in &bundle.attributes {
        match specs.iter().find(|s| s.key.eq_ignore_ascii_case(key)) {
            Some(spec) => out.push(TransferAttribute::new(
                spec.key,
                Some(value.clone()),
                spec.required,
            )),
            None => debug!("Dropping unrecognized bundle attribute '{key}'"),
        }
    }
    out
}

/// Parse a bundle endpoint, falling back to an unverified address: the
/// indexer may report counterparties (coinbase inputs, contract
/// internals) that the local syntactic rules do not cover.
pub(crate) fn bundle_address(chain: ChainKind, s: &str) -> Address {
    Address::parse(chain, s).unwrap_or_else(|_| Address::unverified(chain, s))
}

/// Post-add hook: a Bitcoin-family wallet learns from its own outbound
/// transfers which addresses it controls.
pub(crate) fn on_transfer_added(wallet: &Arc<Wallet>, transfer: &Arc<Transfer>) {
    if wallet.chain().is_bitcoin_family()
        && transfer.direction() != TransferDirection::Received
    {
        wallet.register_recovery_address(transfer.source().clone());
    }
}

/// Determine a recovered transfer's direction from its endpoints.
pub(crate) fn direction_for(
    wallet: &Wallet,
    source: &Address,
    target: &Address,
) -> TransferDirection {
    let from_ours = wallet.owns_address(source);
    let to_ours = wallet.owns_address(target);
    match (from_ours, to_ours) {
        (true, true) => TransferDirection::Recovered,
        (true, false) => TransferDirection::Sent,
        _ => TransferDirection::Received,
    }
}

/// The fee basis a freshly created wallet starts from, before any
/// network fee schedule or estimate has been seen.
pub fn default_fee_basis(chain: ChainKind, unit_for_fee: &Unit) -> FeeBasis {
    let unit = unit_for_fee.clone();
    match chain {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv => FeeBasis::Bitcoin {
            chain,
            unit,
            sats_per_kb: 1000,
            size_bytes: 226,
        },
        ChainKind::Eth => FeeBasis::Ethereum {
            unit,
            gas_price_wei: 20_000_000_000,
            gas_limit: 21_000,
        },
        ChainKind::Hbar => FeeBasis::Hedera {
            unit,
            fee_tinybar: 500_000,
        },
        ChainKind::Xrp => FeeBasis::Ripple {
            unit,
            fee_drops: 10,
        },
        ChainKind::Xtz => FeeBasis::Tezos {
            unit,
            fee: crate::fee::XtzFee::Estimate {
                mutez_per_kb: 1000,
                size_bytes: 250,
                gas_limit: 10_600,
                storage_limit: 257,
            },
        },
    }
}

/// Balance bounds the chain's protocol imposes on an account.
pub fn balance_bounds(
    chain: ChainKind,
    unit: &Unit,
) -> (Option<Amount>, Option<Amount>) {
    match chain {
        // The XRP base reserve: accounts may not drain below 10 XRP.
        ChainKind::Xrp =>
            (Some(Amount::from_base(unit.clone(), 10_000_000)), None),
        _ => (Some(Amount::zero(unit.clone())), None),
    }
}

/// The outcome of a fee-basis estimation request: either fully local, or
/// in need of a round-trip to the indexer's estimator.
pub enum FeeEstimateOutcome {
    Ready(FeeBasis),
    NeedsRemote {
        /// Bytes to hand to the estimator.
        unsigned: Vec<u8>,
        /// The basis to refine with the estimator's cost units.
        initial: FeeBasis,
    },
}

/// Begin a fee estimation for a proposed transfer.
pub fn estimate_fee_basis(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
    target: &Address,
    amount: &Amount,
    attributes: &[TransferAttribute],
) -> anyhow::Result<FeeEstimateOutcome> {
    match wallet.chain() {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
            btc::estimate_fee_basis(wallet, network_fee),
        ChainKind::Eth => eth::estimate_fee_basis(wallet, network_fee, target, amount),
        ChainKind::Hbar => hbar::estimate_fee_basis(wallet, network_fee),
        ChainKind::Xrp => xrp::estimate_fee_basis(wallet, network_fee),
        ChainKind::Xtz => xtz::estimate_fee_basis(wallet, network_fee, attributes),
    }
}

/// Refine an initial fee basis with the cost units measured remotely.
pub fn recover_fee_basis_from_estimate(
    chain: ChainKind,
    initial: &FeeBasis,
    cost_units: u64,
) -> FeeBasis {
    match (chain, initial) {
        (ChainKind::Eth, FeeBasis::Ethereum { unit, gas_price_wei, .. }) =>
            FeeBasis::Ethereum {
                unit: unit.clone(),
                gas_price_wei: *gas_price_wei,
                gas_limit: cost_units,
            },
        _ => initial.clone(),
    }
}

/// Spendable-limit estimation: `(limit, need_estimate,
/// zero_means_insufficient_funds)`.
pub fn estimate_limit(
    wallet: &Arc<Wallet>,
    as_maximum: bool,
    network_fee: &NetworkFee,
) -> (Amount, bool, bool) {
    if !as_maximum {
        return (Amount::zero(wallet.unit().clone()), false, false);
    }
    match wallet.chain() {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
            btc::estimate_limit(wallet, network_fee),
        ChainKind::Eth => eth::estimate_limit(wallet),
        ChainKind::Hbar | ChainKind::Xrp | ChainKind::Xtz =>
            fixed_fee_limit(wallet, network_fee),
    }
}

/// Maximum-spend for chains with one flat network fee: balance, minus the
/// reserve the chain requires the account to keep, minus one fee.
fn fixed_fee_limit(
    wallet: &Arc<Wallet>,
    network_fee: &NetworkFee,
) -> (Amount, bool, bool) {
    let mut limit = wallet.balance();
    if let Some(minimum) = wallet.balance_minimum() {
        limit = limit
            .checked_sub(&minimum)
            .unwrap_or_else(|| Amount::zero(wallet.unit().clone()));
    }
    if let Some(less_fee) =
        limit.checked_sub(&network_fee.price_per_cost_factor)
    {
        limit = less_fee;
    }
    if limit.is_negative() {
        limit = Amount::zero(wallet.unit().clone());
    }
    (limit, false, true)
}
