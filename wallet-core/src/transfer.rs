//! Transfers: one on-chain value movement, with an immutable identity and
//! a mutable lifecycle state.
//!
//! The state machine is `Created → Signed → Submitted → {Included,
//! Errored} → Deleted`, never backwards, except that an `Errored` transfer
//! may later be discovered `Included` by the indexer. State changes emit
//! `Changed` events carrying both the old and the new state; events for
//! one transfer are emitted in the order the changes were applied.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, Weak};

use common::address::Address;
use common::amount::Amount;
use common::attribute::TransferAttribute;
use common::chain::ChainKind;
use common::hash::TxHash;
use common::unit::Unit;
use serde::{Deserialize, Serialize};

use crate::chains::TransferPayload;
use crate::event::{Event, EventSender, TransferEvent};
use crate::fee::FeeBasis;
use crate::wallet::Wallet;

/// Included-state error strings are bounded; longer indexer messages are
/// truncated at a char boundary.
pub const INCLUDED_ERROR_MAX_LEN: usize = 63;

/// Whether value moved out of, into, or within the wallet.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Sent,
    Received,
    /// A self-transfer: source and target are both ours, so only the fee
    /// actually left the wallet.
    Recovered,
}

/// Why a submission failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitError {
    Unknown,
    Posix { errnum: i32 },
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown submit error"),
            Self::Posix { errnum } => write!(f, "POSIX error {errnum}"),
        }
    }
}

/// The discriminant of a [`TransferState`], used where only the phase
/// matters (bundle statuses, transition guards).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStateKind {
    Created,
    Signed,
    Submitted,
    Included,
    Errored,
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included {
        block_number: u64,
        transaction_index: u64,
        timestamp: u64,
        /// The confirmed fee basis, when the indexer reported one.
        fee_basis: Option<FeeBasis>,
        success: bool,
        /// Present iff `!success`; bounded by [`INCLUDED_ERROR_MAX_LEN`].
        error: Option<String>,
    },
    Errored {
        error: SubmitError,
    },
    Deleted,
}

impl TransferState {
    /// Build an `Included` state, normalizing the error field: successful
    /// inclusions carry no error, failed ones always carry a (possibly
    /// truncated) message.
    pub fn included(
        block_number: u64,
        transaction_index: u64,
        timestamp: u64,
        fee_basis: Option<FeeBasis>,
        success: bool,
        error: Option<&str>,
    ) -> Self {
        let error = if success {
            None
        } else {
            let msg = error.unwrap_or("unknown error");
            let mut msg = msg.to_owned();
            if msg.len() > INCLUDED_ERROR_MAX_LEN {
                let mut cut = INCLUDED_ERROR_MAX_LEN;
                while !msg.is_char_boundary(cut) {
                    cut -= 1;
                }
                msg.truncate(cut);
            }
            Some(msg)
        };
        Self::Included {
            block_number,
            transaction_index,
            timestamp,
            fee_basis,
            success,
            error,
        }
    }

    pub fn errored(error: SubmitError) -> Self {
        Self::Errored { error }
    }

    pub fn kind(&self) -> TransferStateKind {
        match self {
            Self::Created => TransferStateKind::Created,
            Self::Signed => TransferStateKind::Signed,
            Self::Submitted => TransferStateKind::Submitted,
            Self::Included { .. } => TransferStateKind::Included,
            Self::Errored { .. } => TransferStateKind::Errored,
            Self::Deleted => TransferStateKind::Deleted,
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included { .. })
    }
}

/// Where a transfer reports its events: the owning wallet (held weakly, so
/// a torn-down wallet silences its transfers) plus the manager's event
/// channel.
#[derive(Clone)]
pub struct TransferListener {
    pub(crate) wallet: Weak<Wallet>,
    pub(crate) events: EventSender,
}

impl TransferListener {
    pub(crate) fn new(wallet: &Arc<Wallet>, events: EventSender) -> Self {
        Self {
            wallet: Arc::downgrade(wallet),
            events,
        }
    }
}

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(1);

/// One on-chain value movement.
///
/// Identity (addresses, amount, direction, units, estimated fee basis) is
/// immutable; only the state, the attributes, the indexer uids and the
/// chain payload change over a transfer's life. Lock ordering: a transfer
/// lock is the innermost lock in the system; nothing else may be acquired
/// while holding one.
pub struct Transfer {
    chain: ChainKind,
    ordinal: u64,
    source: Address,
    target: Address,
    unit: Unit,
    unit_for_fee: Unit,
    amount: Amount,
    direction: TransferDirection,
    fee_basis_estimated: FeeBasis,
    state: Mutex<TransferState>,
    attributes: Mutex<Vec<TransferAttribute>>,
    uids: Mutex<Option<String>>,
    payload: Mutex<TransferPayload>,
    listener: TransferListener,
}

#[allow(clippy::too_many_arguments)]
impl Transfer {
    pub(crate) fn new(
        chain: ChainKind,
        listener: TransferListener,
        unit: Unit,
        unit_for_fee: Unit,
        fee_basis_estimated: FeeBasis,
        amount: Amount,
        direction: TransferDirection,
        source: Address,
        target: Address,
        state: TransferState,
        uids: Option<String>,
        attributes: Vec<TransferAttribute>,
        payload: TransferPayload,
    ) -> Arc<Self> {
        assert_eq!(
            chain,
            fee_basis_estimated.chain(),
            "Transfer and fee basis chain tags must agree",
        );
        assert_eq!(chain, payload.chain(), "Transfer and payload tags must agree");

        let transfer = Arc::new(Self {
            chain,
            ordinal: NEXT_ORDINAL.fetch_add(1, AtomicOrdering::Relaxed),
            source,
            target,
            unit,
            unit_for_fee,
            amount,
            direction,
            fee_basis_estimated,
            state: Mutex::new(state),
            attributes: Mutex::new(attributes),
            uids: Mutex::new(uids),
            payload: Mutex::new(payload),
            listener,
        });

        transfer.emit(TransferEvent::Created);
        transfer
    }

    // --- Identity getters --- //

    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    /// A process-unique, monotonically assigned id; the stable identity
    /// used to order transfers that have no on-chain position yet.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.unit_for_fee
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// The unsigned amount. Use [`Transfer::amount_directed`] for signed
    /// semantics.
    pub fn amount(&self) -> Amount {
        self.amount.clone()
    }

    /// +amount for received transfers, -amount for sent, zero for
    /// recovered self-transfers.
    pub fn amount_directed(&self) -> Amount {
        match self.direction {
            TransferDirection::Received => self.amount.clone(),
            TransferDirection::Sent => -self.amount.clone(),
            TransferDirection::Recovered => Amount::zero(self.unit.clone()),
        }
    }

    /// The directed amount net of fees: what actually happened to the
    /// wallet's balance. Identical to the directed amount when the fee is
    /// paid in an incompatible unit (e.g. ERC-20 fees paid in ether).
    pub fn amount_directed_net(&self) -> Amount {
        let directed = self.amount_directed();
        match self.direction {
            TransferDirection::Received => directed,
            TransferDirection::Sent | TransferDirection::Recovered =>
                match self.fee() {
                    Some(fee) => directed
                        .checked_sub(&fee)
                        .expect("fee() implies compatible units"),
                    None => directed,
                },
        }
    }

    // --- Fees --- //

    pub fn estimated_fee_basis(&self) -> FeeBasis {
        self.fee_basis_estimated.clone()
    }

    /// The confirmed fee basis, present only once INCLUDED (and only when
    /// the indexer reported one).
    pub fn confirmed_fee_basis(&self) -> Option<FeeBasis> {
        match &*self.state.lock().unwrap() {
            TransferState::Included { fee_basis, .. } => fee_basis.clone(),
            _ => None,
        }
    }

    /// The basis in effect: confirmed once INCLUDED, estimated before.
    pub fn fee_basis(&self) -> Option<FeeBasis> {
        match &*self.state.lock().unwrap() {
            TransferState::Included { fee_basis, .. } => fee_basis.clone(),
            _ => Some(self.fee_basis_estimated.clone()),
        }
    }

    /// The fee, when it is denominated compatibly with the amount.
    /// `None` when the units are incompatible, or when the transfer is
    /// INCLUDED without a confirmed fee basis.
    pub fn fee(&self) -> Option<Amount> {
        if !self.unit.is_compatible(&self.unit_for_fee) {
            return None;
        }
        self.fee_basis().map(|basis| basis.fee())
    }

    // --- State --- //

    pub fn state(&self) -> TransferState {
        self.state.lock().unwrap().clone()
    }

    pub fn state_kind(&self) -> TransferStateKind {
        self.state.lock().unwrap().kind()
    }

    /// Swap in a new state, emitting a `Changed` event iff the state
    /// actually changed (structurally). The event is enqueued while the
    /// state lock is held so per-transfer event order matches the order
    /// the changes were applied; listeners receive it on the manager's
    /// event task and must not call back into the core synchronously.
    pub(crate) fn set_state(self: &Arc<Self>, new: TransferState) -> bool {
        let mut guard = self.state.lock().unwrap();
        if *guard == new {
            return false;
        }
        let old = std::mem::replace(&mut *guard, new.clone());
        self.emit(TransferEvent::Changed { old, new });
        drop(guard);
        true
    }

    /// Atomically apply a submission outcome. On success only CREATED or
    /// SIGNED may advance to SUBMITTED; on failure anything not yet
    /// INCLUDED (or already failed) becomes ERRORED. Anything else is
    /// left alone, so an inclusion observed by the indexer before the
    /// submit acknowledgement can never be regressed.
    pub(crate) fn transition_submit(self: &Arc<Self>, success: bool) -> bool {
        let mut guard = self.state.lock().unwrap();
        let next = match (guard.kind(), success) {
            (TransferStateKind::Created | TransferStateKind::Signed, true) =>
                TransferState::Submitted,
            (
                TransferStateKind::Created
                | TransferStateKind::Signed
                | TransferStateKind::Submitted,
                false,
            ) => TransferState::errored(SubmitError::Unknown),
            _ => return false,
        };
        let old = std::mem::replace(&mut *guard, next.clone());
        self.emit(TransferEvent::Changed { old, new: next });
        drop(guard);
        true
    }

    // --- Attributes --- //

    pub fn attributes(&self) -> Vec<TransferAttribute> {
        self.attributes.lock().unwrap().clone()
    }

    /// Replace the attribute set wholesale. Partial updates are not
    /// supported.
    pub fn set_attributes(&self, attributes: Vec<TransferAttribute>) {
        *self.attributes.lock().unwrap() = attributes;
    }

    // --- Indexer uids --- //

    pub fn uids(&self) -> Option<String> {
        self.uids.lock().unwrap().clone()
    }

    /// Adopt the indexer's identifier if we don't have one yet.
    pub(crate) fn adopt_uids(&self, uids: &str) {
        let mut guard = self.uids.lock().unwrap();
        if guard.is_none() {
            *guard = Some(uids.to_owned());
        }
    }

    // --- Chain payload --- //

    pub(crate) fn with_payload<R>(
        &self,
        f: impl FnOnce(&TransferPayload) -> R,
    ) -> R {
        f(&self.payload.lock().unwrap())
    }

    pub(crate) fn with_payload_mut<R>(
        &self,
        f: impl FnOnce(&mut TransferPayload) -> R,
    ) -> R {
        f(&mut self.payload.lock().unwrap())
    }

    /// The chain-specific transaction hash; `None` until the transfer has
    /// been signed or recovered.
    pub fn hash(&self) -> Option<TxHash> {
        self.payload.lock().unwrap().hash()
    }

    // --- Equality and ordering --- //

    /// Whether two transfers are the same logical on-chain movement:
    /// either the same object, or the same chain and the chain's equality
    /// (hash equality; raw-bytes equality for unhashed Bitcoin-family
    /// transactions).
    pub fn matches(&self, other: &Transfer) -> bool {
        if self.ordinal == other.ordinal {
            return true;
        }
        if self.chain != other.chain {
            return false;
        }
        match (self.hash(), other.hash()) {
            (Some(a), Some(b)) => a == b,
            _ if self.chain.is_bitcoin_family() => {
                // Copy both serializations out; never hold two transfer
                // payload locks at once.
                let a = self.with_payload(|p| p.raw().map(<[u8]>::to_vec));
                let b = other.with_payload(|p| p.raw().map(<[u8]>::to_vec));
                matches!((a, b), (Some(x), Some(y)) if x == y)
            }
            _ => false,
        }
    }

    /// Total order over transfers: INCLUDED before non-INCLUDED; INCLUDED
    /// among themselves by (timestamp, block number, transaction index);
    /// everything else by stable creation ordinal.
    ///
    /// The two states are copied out one at a time, never holding both
    /// transfer locks at once.
    pub fn total_cmp(&self, other: &Transfer) -> Ordering {
        if self.matches(other) {
            return Ordering::Equal;
        }

        let s1 = self.state();
        let s2 = other.state();

        match (s1, s2) {
            (
                TransferState::Included {
                    block_number: b1,
                    transaction_index: i1,
                    timestamp: t1,
                    ..
                },
                TransferState::Included {
                    block_number: b2,
                    transaction_index: i2,
                    timestamp: t2,
                    ..
                },
            ) => (t1, b1, i1).cmp(&(t2, b2, i2)),
            (TransferState::Included { .. }, _) => Ordering::Less,
            (_, TransferState::Included { .. }) => Ordering::Greater,
            (_, _) => self.ordinal.cmp(&other.ordinal),
        }
    }

    // --- Serialization --- //

    /// Wire bytes suitable for submission; errors until signed.
    pub fn serialize_for_submission(&self) -> anyhow::Result<Vec<u8>> {
        self.payload
            .lock()
            .unwrap()
            .raw()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| anyhow::anyhow!("Transfer has not been signed"))
    }

    /// Bytes for fee estimation: the signed serialization when available,
    /// otherwise the unsigned preimage.
    pub fn serialize_for_fee_estimation(&self) -> anyhow::Result<Vec<u8>> {
        let payload = self.payload.lock().unwrap();
        match payload.raw() {
            Some(raw) => Ok(raw.to_vec()),
            None => payload.unsigned_preimage(),
        }
    }

    /// Snapshot this transfer into its durable record form.
    pub fn to_record(&self) -> TransferRecord {
        TransferRecord {
            chain: self.chain,
            source: self.source.clone(),
            target: self.target.clone(),
            state: self.state(),
            unit: self.unit.clone(),
            unit_for_fee: self.unit_for_fee.clone(),
            fee_basis_estimated: self.fee_basis_estimated.clone(),
            direction: self.direction,
            amount: self.amount.clone(),
            attributes: self.attributes(),
            uids: self.uids(),
            payload: self.payload.lock().unwrap().clone(),
        }
    }

    /// Rebuild a transfer from its durable record. Emits a `Created`
    /// event, like any other construction.
    pub(crate) fn from_record(
        record: TransferRecord,
        listener: TransferListener,
    ) -> Arc<Self> {
        Self::new(
            record.chain,
            listener,
            record.unit,
            record.unit_for_fee,
            record.fee_basis_estimated,
            record.amount,
            record.direction,
            record.source,
            record.target,
            record.state,
            record.uids,
            record.attributes,
            record.payload,
        )
    }

    fn emit(self: &Arc<Self>, event: TransferEvent) {
        if let Some(wallet) = self.listener.wallet.upgrade() {
            self.listener.events.send(Event::Transfer {
                wallet,
                transfer: self.clone(),
                event,
            });
        }
    }

    pub(crate) fn emit_deleted(self: &Arc<Self>) {
        self.emit(TransferEvent::Deleted);
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("chain", &self.chain)
            .field("ordinal", &self.ordinal)
            .field("direction", &self.direction)
            .field("amount", &self.amount)
            .field("state", &self.state_kind())
            .finish()
    }
}

/// The durable, wire-stable form of a [`Transfer`]: every identity field,
/// the current state, the attributes and the chain payload. This is what
/// the file service writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub chain: ChainKind,
    pub source: Address,
    pub target: Address,
    pub state: TransferState,
    pub unit: Unit,
    pub unit_for_fee: Unit,
    pub fee_basis_estimated: FeeBasis,
    pub direction: TransferDirection,
    pub amount: Amount,
    pub attributes: Vec<TransferAttribute>,
    pub uids: Option<String>,
    pub payload: TransferPayload,
}
