//! Wallets: the per-currency transfer containers.
//!
//! A wallet owns an insertion-ordered list of transfers, a cached balance
//! derived from the INCLUDED ones, its default fee basis, and the set of
//! recovery addresses the synchronizer queries for. All mutations persist
//! the affected transfer and emit wallet events; the balance event fires
//! only when the balance actually changed.
//!
//! Lock ordering: manager → wallet → transfer. Wallet methods may take
//! transfer locks while holding the wallet's, never the reverse.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use common::address::Address;
use common::amount::Amount;
use common::attribute::{
    AttributeSpec, AttributeValidationError, TransferAttribute,
};
use common::chain::ChainKind;
use common::hash::TxHash;
use common::unit::Unit;
use tracing::warn;

use crate::chains::{self, CreateTransferError};
use crate::event::{EventSender, WalletEvent};
use crate::fee::FeeBasis;
use crate::persist::{FileService, TransferFileType};
use crate::transfer::{Transfer, TransferListener};
use crate::transfer::TransferState;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WalletState {
    Created,
    Deleted,
}

struct WalletInner {
    /// Insertion order is preserved; [`Transfer::total_cmp`] gives the
    /// canonical presentation order when callers want one.
    transfers: Vec<Arc<Transfer>>,
    balance: Amount,
}

/// A per-currency container of transfers.
pub struct Wallet {
    chain: ChainKind,
    unit: Unit,
    unit_for_fee: Unit,
    primary_address: Address,
    balance_minimum: Option<Amount>,
    balance_maximum: Option<Amount>,
    state: Mutex<WalletState>,
    default_fee_basis: Mutex<FeeBasis>,
    inner: Mutex<WalletInner>,
    recovery_addresses: Mutex<BTreeSet<Address>>,
    events: EventSender,
    store: Option<Arc<FileService>>,
}

#[allow(clippy::too_many_arguments)]
impl Wallet {
    pub(crate) fn new(
        chain: ChainKind,
        unit: Unit,
        unit_for_fee: Unit,
        primary_address: Address,
        default_fee_basis: FeeBasis,
        balance_minimum: Option<Amount>,
        balance_maximum: Option<Amount>,
        events: EventSender,
        store: Option<Arc<FileService>>,
    ) -> Arc<Self> {
        assert_eq!(
            chain,
            default_fee_basis.chain(),
            "Wallet and fee basis chain tags must agree",
        );

        let wallet = Arc::new(Self {
            chain,
            balance_minimum,
            balance_maximum,
            state: Mutex::new(WalletState::Created),
            default_fee_basis: Mutex::new(default_fee_basis),
            inner: Mutex::new(WalletInner {
                transfers: Vec::new(),
                balance: Amount::zero(unit.clone()),
            }),
            recovery_addresses: Mutex::new(BTreeSet::from([
                primary_address.clone()
            ])),
            primary_address,
            unit,
            unit_for_fee,
            events,
            store,
        });

        wallet
            .events
            .wallet_event(&wallet, WalletEvent::Created);
        wallet
    }

    /// The listener new transfers of this wallet should carry.
    pub(crate) fn transfer_listener(self: &Arc<Self>) -> TransferListener {
        TransferListener::new(self, self.events.clone())
    }

    // --- Getters --- //

    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.unit_for_fee
    }

    pub fn primary_address(&self) -> &Address {
        &self.primary_address
    }

    pub fn state(&self) -> WalletState {
        *self.state.lock().unwrap()
    }

    pub fn balance(&self) -> Amount {
        self.inner.lock().unwrap().balance.clone()
    }

    pub fn balance_minimum(&self) -> Option<Amount> {
        self.balance_minimum.clone()
    }

    pub fn balance_maximum(&self) -> Option<Amount> {
        self.balance_maximum.clone()
    }

    pub fn default_fee_basis(&self) -> FeeBasis {
        self.default_fee_basis.lock().unwrap().clone()
    }

    pub fn set_default_fee_basis(self: &Arc<Self>, fee_basis: FeeBasis) {
        assert_eq!(self.chain, fee_basis.chain());
        *self.default_fee_basis.lock().unwrap() = fee_basis.clone();
        self.events
            .wallet_event(self, WalletEvent::FeeBasisUpdated { fee_basis });
    }

    // --- Recovery addresses --- //

    pub fn owns_address(&self, address: &Address) -> bool {
        self.recovery_addresses.lock().unwrap().contains(address)
    }

    /// The addresses the synchronizer should query for. Grows over time
    /// for chains with hierarchical-deterministic wallets.
    pub fn addresses_for_recovery(&self) -> Vec<Address> {
        self.recovery_addresses
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }

    /// Add a newly-discovered owned address; returns whether it was new.
    pub fn register_recovery_address(&self, address: Address) -> bool {
        if address.chain() != self.chain {
            return false;
        }
        self.recovery_addresses.lock().unwrap().insert(address)
    }

    // --- Transfers --- //

    pub fn transfers(&self) -> Vec<Arc<Transfer>> {
        self.inner.lock().unwrap().transfers.clone()
    }

    pub fn has_transfer(&self, transfer: &Transfer) -> bool {
        self.inner
            .lock()
            .unwrap()
            .transfers
            .iter()
            .any(|t| t.matches(transfer))
    }

    /// Linear scan by hash; wallets hold few enough transfers that no
    /// index is kept.
    pub fn transfer_by_hash(&self, hash: &TxHash) -> Option<Arc<Transfer>> {
        self.inner
            .lock()
            .unwrap()
            .transfers
            .iter()
            .find(|t| t.hash().as_ref() == Some(hash))
            .cloned()
    }

    /// Add a transfer unless an equal one is already held. Persists the
    /// transfer, emits `TransferAdded`, and `BalanceUpdated` iff the
    /// balance moved.
    pub fn add_transfer(self: &Arc<Self>, transfer: &Arc<Transfer>) -> bool {
        assert_eq!(self.chain, transfer.chain());

        let balances = {
            let mut inner = self.inner.lock().unwrap();
            if inner.transfers.iter().any(|t| t.matches(transfer)) {
                return false;
            }
            inner.transfers.push(transfer.clone());
            self.refresh_balance(&mut inner)
        };

        self.save_transfer(transfer);
        self.events.wallet_event(
            self,
            WalletEvent::TransferAdded {
                transfer: transfer.clone(),
            },
        );
        self.emit_balance_if_changed(balances);
        chains::on_transfer_added(self, transfer);
        true
    }

    /// Remove a transfer; emits `TransferDeleted` then `BalanceUpdated`
    /// iff the balance moved.
    pub fn remove_transfer(self: &Arc<Self>, transfer: &Arc<Transfer>) -> bool {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let index = inner
                .transfers
                .iter()
                .position(|t| t.matches(transfer));
            match index {
                Some(index) => {
                    let removed = inner.transfers.remove(index);
                    let balances = self.refresh_balance(&mut inner);
                    Some((removed, balances))
                }
                None => None,
            }
        };

        let Some((removed, balances)) = removed else {
            return false;
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.remove::<TransferFileType>(&removed.to_record()) {
                warn!("Failed to remove transfer record: {e}");
            }
        }
        removed.emit_deleted();
        self.events.wallet_event(
            self,
            WalletEvent::TransferDeleted { transfer: removed },
        );
        self.emit_balance_if_changed(balances);
        true
    }

    /// Apply a state to a transfer this wallet (possibly) holds: swap the
    /// state, re-persist, refresh the balance.
    pub fn apply_transfer_state(
        self: &Arc<Self>,
        transfer: &Arc<Transfer>,
        new_state: TransferState,
    ) {
        if !transfer.set_state(new_state) {
            return;
        }
        self.after_transfer_mutation(transfer);
    }

    /// Apply a submission outcome with the transition guard: only a
    /// CREATED or SIGNED transfer may become SUBMITTED, and an INCLUDED
    /// transfer is never regressed (the indexer may have seen the
    /// inclusion before the submit acknowledgement arrived).
    pub fn apply_submit_outcome(
        self: &Arc<Self>,
        transfer: &Arc<Transfer>,
        success: bool,
    ) {
        if !transfer.transition_submit(success) {
            return;
        }
        self.after_transfer_mutation(transfer);
    }

    fn after_transfer_mutation(self: &Arc<Self>, transfer: &Arc<Transfer>) {
        if !self.has_transfer(transfer) {
            return;
        }
        self.save_transfer(transfer);
        let balances = {
            let mut inner = self.inner.lock().unwrap();
            self.refresh_balance(&mut inner)
        };
        self.events.wallet_event(
            self,
            WalletEvent::TransferChanged {
                transfer: transfer.clone(),
            },
        );
        self.emit_balance_if_changed(balances);
    }

    /// Build an unsigned outbound transfer. The transfer is *not* added
    /// to the wallet; submission does that.
    pub fn create_transfer(
        self: &Arc<Self>,
        target: Address,
        amount: Amount,
        fee_basis: FeeBasis,
        attributes: Vec<TransferAttribute>,
    ) -> Result<Arc<Transfer>, CreateTransferError> {
        chains::create_transfer(
            self,
            self.transfer_listener(),
            target,
            amount,
            fee_basis,
            attributes,
        )
    }

    /// Build an unsigned transfer paying several outputs in one
    /// transaction (Bitcoin family only).
    pub fn create_transfer_multiple(
        self: &Arc<Self>,
        outputs: Vec<(Address, Amount)>,
        fee_basis: FeeBasis,
    ) -> Result<Arc<Transfer>, CreateTransferError> {
        chains::create_transfer_multiple(
            self,
            self.transfer_listener(),
            outputs,
            fee_basis,
        )
    }

    // --- Attributes --- //

    /// The attribute keys this wallet recognizes for a target.
    pub fn attribute_specs(&self, target: Option<&Address>) -> Vec<AttributeSpec> {
        chains::attribute_specs(self.chain, target)
    }

    pub fn validate_attribute(
        &self,
        target: Option<&Address>,
        attribute: &TransferAttribute,
    ) -> Result<(), AttributeValidationError> {
        chains::validate_attribute(self.chain, target, attribute)
    }

    pub fn validate_attributes(
        &self,
        target: &Address,
        attributes: &[TransferAttribute],
    ) -> Result<(), AttributeValidationError> {
        chains::validate_attributes(self.chain, target, attributes)
    }

    // --- Internal --- //

    /// Recompute the cached balance: the sum of directed-net amounts over
    /// INCLUDED transfers. Returns `(old, new)`.
    fn refresh_balance(&self, inner: &mut WalletInner) -> (Amount, Amount) {
        let mut balance = Amount::zero(self.unit.clone());
        for transfer in &inner.transfers {
            if transfer.state().is_included() {
                balance = balance + transfer.amount_directed_net();
            }
        }
        let old = std::mem::replace(&mut inner.balance, balance.clone());
        (old, balance)
    }

    fn emit_balance_if_changed(self: &Arc<Self>, (old, new): (Amount, Amount)) {
        if old != new {
            self.events
                .wallet_event(self, WalletEvent::BalanceUpdated { balance: new });
        }
    }

    fn save_transfer(&self, transfer: &Arc<Transfer>) {
        let Some(store) = &self.store else { return };
        // Unsigned transfers have no hash yet, hence no identity on disk.
        if transfer.hash().is_none() {
            return;
        }
        if let Err(e) = store.save::<TransferFileType>(&transfer.to_record()) {
            warn!("Failed to persist transfer: {e}");
        }
    }

    /// Mark the wallet deleted on manager teardown.
    pub(crate) fn mark_deleted(self: &Arc<Self>) {
        let old = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, WalletState::Deleted)
        };
        if old != WalletState::Deleted {
            self.events.wallet_event(
                self,
                WalletEvent::Changed {
                    old,
                    new: WalletState::Deleted,
                },
            );
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("chain", &self.chain)
            .field("unit", &self.unit.code())
            .field("address", &self.primary_address)
            .finish()
    }
}
