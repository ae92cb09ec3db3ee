//! The wallet manager: the root aggregate binding one account and one
//! network to a durable store, an indexer client, an optional
//! peer-to-peer engine, and a set of wallets.
//!
//! User-initiated sends flow down (manager → wallet → transfer → signer →
//! client); indexer results flow up through the recovery entry points
//! into wallet state and out as events. A periodic task drives the QRY
//! synchronizer at a quarter of the network's confirmation period.
//!
//! Lock ordering: manager → wallet → transfer, never upward. No lock is
//! held across an await or across file I/O.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use common::account::Account;
use common::address::Address;
use common::amount::Amount;
use common::attribute::TransferAttribute;
use common::chain::{Network, NetworkFee};
use common::key::SigningKey;
use common::shutdown::ShutdownChannel;
use common::task::Task;
use common::unit::Unit;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bundle::{TransactionBundle, TransferBundle};
use crate::chains::{self, FeeEstimateOutcome};
use crate::client::{SyncGranularity, TransferClient};
use crate::event::{
    event_channel, EstimateStatus, EventReceiver, EventSender, ManagerEvent,
    WalletEvent,
};
use crate::p2p::{paths_for_mode, ClientPath, P2pManager};
use crate::persist::{FileService, FileServiceError, TransferFileType};
use crate::signer::TransactionSigner;
use crate::sync::{self, QrySyncState};
use crate::sweep::{self, SweeperError, WalletSweeper};
use crate::transfer::{Transfer, TransferState};
use crate::wallet::Wallet;

/// How syncs and sends are routed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    ApiOnly,
    ApiWithP2pSend,
    P2pWithApiSync,
    P2pOnly,
}

/// How far back an explicit sync should reach.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDepth {
    FromLastConfirmedSend,
    FromLastTrustedBlock,
    FromCreation,
}

/// The address derivation flavor for chains that have more than one.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScheme {
    Native,
    Legacy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisconnectReason {
    Requested,
    Unknown,
    Posix { errnum: i32 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncStoppedReason {
    Complete,
    Requested,
    Unknown,
    Posix { errnum: i32 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ManagerState {
    Created,
    Connected,
    Syncing,
    Disconnected { reason: DisconnectReason },
    Deleted,
}

impl ManagerState {
    fn same_phase(&self, other: &ManagerState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Everything needed to stand up a manager, minus the collaborators.
pub struct WalletManagerConfig {
    pub account: Account,
    pub network: Arc<Network>,
    pub mode: SyncMode,
    pub scheme: AddressScheme,
    pub storage_path: PathBuf,
    /// Defaults per chain: transaction sync for the Bitcoin family,
    /// transfer sync for the account chains.
    pub granularity: Option<SyncGranularity>,
}

pub struct WalletManager {
    account: Account,
    network: Arc<Network>,
    scheme: AddressScheme,
    storage_path: PathBuf,
    granularity: SyncGranularity,

    client: Arc<dyn TransferClient>,
    signer: Arc<dyn TransactionSigner>,
    p2p: Option<Arc<dyn P2pManager>>,
    store: Arc<FileService>,

    state: Mutex<ManagerState>,
    mode: Mutex<SyncMode>,
    paths: Mutex<(ClientPath, ClientPath)>,
    qry: Mutex<QrySyncState>,
    wallets: Mutex<Vec<Arc<Wallet>>>,

    events: EventSender,
    shutdown: ShutdownChannel,
    tasks: Mutex<Vec<Task<()>>>,
}

impl WalletManager {
    /// Stand up a manager: resolve the durable store, create the primary
    /// wallet, load persisted transfers into it, and start the periodic
    /// synchronizer. Must be called within a tokio runtime.
    ///
    /// `MANAGER_CREATED` is emitted before any wallet event.
    pub fn create(
        config: WalletManagerConfig,
        client: Arc<dyn TransferClient>,
        signer: Arc<dyn TransactionSigner>,
        p2p: Option<Arc<dyn P2pManager>>,
    ) -> anyhow::Result<(Arc<Self>, EventReceiver)> {
        let chain = config.network.chain();
        anyhow::ensure!(
            config.account.is_initialized_on(chain),
            "Account is not initialized on {chain}",
        );

        let store = Arc::new(FileService::new(
            &config.storage_path,
            chain.currency_code(),
            config.network.name(),
        )?);

        let granularity = config.granularity.unwrap_or({
            if chain.is_bitcoin_family() {
                SyncGranularity::Transactions
            } else {
                SyncGranularity::Transfers
            }
        });

        let qry = QrySyncState::new(
            config.network.earliest_block(),
            config.network.height(),
            chain.confirmation_period(),
        );
        let paths = paths_for_mode(config.mode, p2p.is_some());

        let (events, receiver) = event_channel();

        let manager = Arc::new(Self {
            account: config.account,
            network: config.network,
            scheme: config.scheme,
            storage_path: config.storage_path,
            granularity,
            client,
            signer,
            p2p,
            store,
            state: Mutex::new(ManagerState::Created),
            mode: Mutex::new(config.mode),
            paths: Mutex::new(paths),
            qry: Mutex::new(qry),
            wallets: Mutex::new(Vec::new()),
            events,
            shutdown: ShutdownChannel::new(),
            tasks: Mutex::new(Vec::new()),
        });

        manager.events.manager_event(ManagerEvent::Created);
        manager.create_primary_wallet()?;

        let sync_task = sync::spawn_sync_task(&manager);
        manager.tasks.lock().unwrap().push(sync_task);

        Ok((manager, receiver))
    }

    fn create_primary_wallet(self: &Arc<Self>) -> anyhow::Result<Arc<Wallet>> {
        let chain = self.network.chain();
        let unit = chain.default_unit();
        let unit_for_fee = chain.default_unit();
        let address = self
            .account
            .address(chain)
            .cloned()
            .context("Account address missing")?;

        let (balance_minimum, balance_maximum) =
            chains::balance_bounds(chain, &unit);
        let wallet = Wallet::new(
            chain,
            unit,
            unit_for_fee.clone(),
            address,
            chains::default_fee_basis(chain, &unit_for_fee),
            balance_minimum,
            balance_maximum,
            self.events.clone(),
            Some(self.store.clone()),
        );
        self.attach_wallet(&wallet);

        // Load whatever the store already holds. Undecodable records were
        // skipped inside the service; mismatched chains are a config bug.
        let records = self.store.load_all::<TransferFileType>()?;
        for record in records {
            if record.chain != chain {
                warn!("Skipping persisted transfer for wrong chain {}", record.chain);
                continue;
            }
            let transfer =
                Transfer::from_record(record, wallet.transfer_listener());
            wallet.add_transfer(&transfer);
        }

        Ok(wallet)
    }

    fn attach_wallet(self: &Arc<Self>, wallet: &Arc<Wallet>) {
        self.wallets.lock().unwrap().push(wallet.clone());
        self.events.manager_event(ManagerEvent::WalletAdded {
            wallet: wallet.clone(),
        });
    }

    /// Register an additional wallet (e.g. an ERC-20 token) denominated
    /// in `unit`, paying fees in `unit_for_fee`.
    pub fn register_wallet(
        self: &Arc<Self>,
        unit: Unit,
        unit_for_fee: Unit,
    ) -> Arc<Wallet> {
        let chain = self.network.chain();
        if let Some(existing) = self.wallet_for_currency(unit.currency()) {
            return existing;
        }
        let address = self
            .account
            .address(chain)
            .cloned()
            .expect("Checked at create");
        let wallet = Wallet::new(
            chain,
            unit.clone(),
            unit_for_fee.clone(),
            address,
            chains::default_fee_basis(chain, &unit_for_fee),
            None,
            None,
            self.events.clone(),
            Some(self.store.clone()),
        );
        self.attach_wallet(&wallet);
        wallet
    }

    // --- Getters --- //

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn address_scheme(&self) -> AddressScheme {
        self.scheme
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// The wallet for the network's native currency.
    pub fn primary_wallet(&self) -> Arc<Wallet> {
        self.wallets.lock().unwrap()[0].clone()
    }

    pub fn wallets(&self) -> Vec<Arc<Wallet>> {
        self.wallets.lock().unwrap().clone()
    }

    /// Find the wallet denominated in `currency` (a bundle currency code
    /// or a unit currency).
    pub fn wallet_for_currency(&self, currency: &str) -> Option<Arc<Wallet>> {
        self.wallets
            .lock()
            .unwrap()
            .iter()
            .find(|w| {
                w.unit().currency().eq_ignore_ascii_case(currency)
                    || w.unit().code().eq_ignore_ascii_case(currency)
                    || (w.chain().currency_code().eq_ignore_ascii_case(currency)
                        && w.unit().currency().eq_ignore_ascii_case(
                            w.chain().base_unit().currency(),
                        ))
            })
            .cloned()
    }

    pub fn state(&self) -> ManagerState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn set_state(&self, new: ManagerState) {
        let old = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, new)
        };
        if !old.same_phase(&new) {
            self.events.manager_event(ManagerEvent::Changed { old, new });
        }
    }

    pub fn mode(&self) -> SyncMode {
        *self.mode.lock().unwrap()
    }

    /// Change how syncs and sends are routed.
    pub fn set_mode(&self, mode: SyncMode) {
        *self.mode.lock().unwrap() = mode;
        *self.paths.lock().unwrap() = paths_for_mode(mode, self.p2p.is_some());
    }

    pub(crate) fn sync_path(&self) -> ClientPath {
        self.paths.lock().unwrap().0
    }

    pub(crate) fn send_path(&self) -> ClientPath {
        self.paths.lock().unwrap().1
    }

    pub(crate) fn shutdown_handle(&self) -> ShutdownChannel {
        self.shutdown.clone()
    }

    /// A read-only view of the synchronizer window, for observability.
    pub fn sync_window(&self) -> crate::sync::SyncWindow {
        self.qry.lock().unwrap().window().clone()
    }

    // --- Lifecycle --- //

    /// Connect, optionally to a caller-chosen peer. Valid from CREATED or
    /// DISCONNECTED; a no-op otherwise.
    pub fn connect(self: &Arc<Self>, peer: Option<String>) {
        let can = matches!(
            self.state(),
            ManagerState::Created | ManagerState::Disconnected { .. },
        );
        if !can {
            return;
        }

        if let (Some(p2p), true) = (&self.p2p, self.uses_p2p()) {
            let p2p = p2p.clone();
            self.spawn_detached("p2p connect", async move {
                p2p.connect(peer).await;
            });
        }

        self.set_state(ManagerState::Connected);
    }

    /// Disconnect; in-flight sync rounds are retired so their responses
    /// are discarded on arrival.
    pub fn disconnect(self: &Arc<Self>) {
        let can = matches!(
            self.state(),
            ManagerState::Created
                | ManagerState::Connected
                | ManagerState::Syncing,
        );
        if !can {
            return;
        }

        self.qry.lock().unwrap().retire();

        if let Some(p2p) = &self.p2p {
            let p2p = p2p.clone();
            self.spawn_detached("p2p disconnect", async move {
                p2p.disconnect().await;
            });
        }

        self.set_state(ManagerState::Disconnected {
            reason: DisconnectReason::Requested,
        });
    }

    pub fn sync(self: &Arc<Self>) {
        self.sync_to_depth(SyncDepth::FromCreation);
    }

    /// Kick an explicit sync from the given depth. Valid only while
    /// CONNECTED.
    pub fn sync_to_depth(self: &Arc<Self>, depth: SyncDepth) {
        if self.state() != ManagerState::Connected {
            return;
        }
        match self.sync_path() {
            ClientPath::P2p => {
                if let Some(p2p) = &self.p2p {
                    let p2p = p2p.clone();
                    let height = self.network.height();
                    self.spawn_detached("p2p sync", async move {
                        p2p.sync(depth, height).await;
                    });
                }
            }
            ClientPath::Qry => {
                let last_send = self.last_confirmed_send_height();
                self.qry.lock().unwrap().rewind(depth, last_send);
            }
        }
    }

    fn last_confirmed_send_height(&self) -> Option<u64> {
        self.primary_wallet()
            .transfers()
            .iter()
            .filter_map(|t| match t.state() {
                TransferState::Included { block_number, .. }
                    if t.direction()
                        == crate::transfer::TransferDirection::Sent =>
                    Some(block_number),
                _ => None,
            })
            .max()
    }

    /// Stop all background work and mark the aggregate deleted.
    pub fn stop(self: &Arc<Self>) {
        self.shutdown.send();
        self.qry.lock().unwrap().retire();
        for wallet in self.wallets() {
            wallet.mark_deleted();
        }
        self.set_state(ManagerState::Deleted);
        self.events.manager_event(ManagerEvent::Deleted);
        info!("Wallet manager stopped");
    }

    /// Erase the durable store for a network. The manager for it must be
    /// stopped first.
    pub fn wipe(network: &Network, path: &Path) -> Result<(), FileServiceError> {
        FileService::wipe(
            path,
            network.chain().currency_code(),
            network.name(),
        )
    }

    fn uses_p2p(&self) -> bool {
        let (sync_path, send_path) = *self.paths.lock().unwrap();
        sync_path == ClientPath::P2p || send_path == ClientPath::P2p
    }

    fn spawn_detached(
        &self,
        name: &'static str,
        fut: impl std::future::Future<Output = ()> + Send + 'static,
    ) {
        self.tasks.lock().unwrap().push(Task::spawn(name, fut));
    }

    // --- Sign and submit --- //

    /// Sign a CREATED transfer with the seed derived from the account's
    /// paper key; on success the transfer becomes SIGNED.
    pub fn sign(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        paper_key: &SecretString,
    ) -> anyhow::Result<()> {
        let unsigned = transfer.with_payload(|p| p.unsigned_preimage())?;
        let signed = self.signer.sign_with_paper_key(
            transfer.chain(),
            &unsigned,
            paper_key,
        )?;
        transfer.with_payload_mut(|p| p.set_signed(&signed));
        wallet.apply_transfer_state(transfer, TransferState::Signed);
        Ok(())
    }

    /// Sign with an explicit private key (sweeps). The key must carry its
    /// secret half.
    pub fn sign_with_key(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        key: &SigningKey,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(key.has_secret(), "Signing requires a private key");
        let unsigned = transfer.with_payload(|p| p.unsigned_preimage())?;
        let signed =
            self.signer.sign_with_key(transfer.chain(), &unsigned, key)?;
        transfer.with_payload_mut(|p| p.set_signed(&signed));
        wallet.apply_transfer_state(transfer, TransferState::Signed);
        Ok(())
    }

    /// Sign and submit in one step.
    pub async fn submit(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        paper_key: &SecretString,
    ) -> anyhow::Result<()> {
        self.sign(wallet, transfer, paper_key)?;
        self.submit_signed(wallet, transfer).await
    }

    pub async fn submit_with_key(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        key: &SigningKey,
    ) -> anyhow::Result<()> {
        self.sign_with_key(wallet, transfer, key)?;
        self.submit_signed(wallet, transfer).await
    }

    /// Submit an already-signed transfer: add it to the wallet
    /// (idempotent), announce the submission, dispatch over the selected
    /// send path, and apply the acknowledgement.
    pub async fn submit_signed(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
    ) -> anyhow::Result<()> {
        wallet.add_transfer(transfer);

        let raw = transfer.serialize_for_submission()?;
        let hash_hex = transfer
            .hash()
            .map(|h| h.to_hex())
            .unwrap_or_default();

        self.events.wallet_event(
            wallet,
            WalletEvent::TransferSubmitted {
                transfer: transfer.clone(),
            },
        );

        let result = match self.send_path() {
            ClientPath::Qry =>
                self.client.submit_transaction(&raw, &hash_hex).await,
            ClientPath::P2p => match &self.p2p {
                Some(p2p) => p2p.send(&raw).await,
                None => Err(anyhow::anyhow!("No peer-to-peer engine")),
            },
        };

        if let Err(e) = &result {
            warn!("Submission failed: {e:#}");
        }
        self.announce_submit(wallet, transfer, result.is_ok());
        Ok(())
    }

    /// Apply a submission acknowledgement. Guarded both against transfers
    /// no longer held by the wallet and against regressing a transfer the
    /// indexer already reported INCLUDED.
    pub fn announce_submit(
        &self,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        success: bool,
    ) {
        if wallet.has_transfer(transfer) {
            wallet.apply_submit_outcome(transfer, success);
        }
    }

    // --- Estimation --- //

    /// The spendable limit toward `target`:
    /// `(limit, need_estimate, zero_means_insufficient_funds)`.
    pub fn estimate_limit(
        &self,
        wallet: &Arc<Wallet>,
        as_maximum: bool,
        _target: &Address,
        network_fee: &NetworkFee,
    ) -> (Amount, bool, bool) {
        chains::estimate_limit(wallet, as_maximum, network_fee)
    }

    /// Estimate the fee basis for a proposed transfer. Completion arrives
    /// as a `FeeBasisEstimated` wallet event carrying `cookie` verbatim;
    /// the engine never inspects the cookie.
    pub async fn estimate_fee_basis(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        cookie: u64,
        target: &Address,
        amount: &Amount,
        network_fee: &NetworkFee,
        attributes: &[TransferAttribute],
    ) {
        let outcome = chains::estimate_fee_basis(
            wallet,
            network_fee,
            target,
            amount,
            attributes,
        );

        let (status, fee_basis) = match outcome {
            Ok(FeeEstimateOutcome::Ready(basis)) =>
                (EstimateStatus::Success, Some(basis)),
            Ok(FeeEstimateOutcome::NeedsRemote { unsigned, initial }) => {
                match self.client.estimate_transaction_fee(&unsigned, "").await {
                    Ok(estimate) => {
                        let basis = chains::recover_fee_basis_from_estimate(
                            wallet.chain(),
                            &initial,
                            estimate.cost_units,
                        );
                        (EstimateStatus::Success, Some(basis))
                    }
                    Err(e) => {
                        debug!("Remote fee estimation failed: {e:#}");
                        (EstimateStatus::Failed, None)
                    }
                }
            }
            Err(e) => {
                debug!("Fee estimation failed: {e:#}");
                (EstimateStatus::Failed, None)
            }
        };

        self.events.wallet_event(
            wallet,
            WalletEvent::FeeBasisEstimated {
                status,
                cookie,
                fee_basis,
            },
        );
    }

    // --- Recovery (indexer results flowing up) --- //

    /// Fold one transfer bundle into the owning wallet. Bundles for
    /// currencies with no registered wallet are dropped with a note.
    pub fn recover_from_transfer_bundle(
        self: &Arc<Self>,
        bundle: &TransferBundle,
    ) -> anyhow::Result<()> {
        let Some(wallet) = self.wallet_for_currency(&bundle.currency) else {
            debug!("No wallet for bundle currency '{}'", bundle.currency);
            return Ok(());
        };
        chains::reconcile_transfer_bundle(
            &wallet,
            wallet.transfer_listener(),
            bundle,
        )
    }

    /// Fold one transaction bundle into the primary wallet
    /// (Bitcoin-family only).
    pub fn recover_from_transaction_bundle(
        self: &Arc<Self>,
        bundle: &TransactionBundle,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.network.chain().is_bitcoin_family(),
            "Chain {} does not sync by transaction bundles",
            self.network.chain(),
        );
        let wallet = self.primary_wallet();
        chains::btc::recover_transaction_bundle(
            &wallet,
            wallet.transfer_listener(),
            bundle,
        )
    }

    // --- Sweeper --- //

    pub fn validate_sweeper(
        &self,
        wallet: &Arc<Wallet>,
        key: &SigningKey,
    ) -> Result<(), SweeperError> {
        sweep::validate(self.network.chain(), wallet, key)
    }

    pub fn create_sweeper(
        self: &Arc<Self>,
        wallet: &Arc<Wallet>,
        key: SigningKey,
    ) -> Result<WalletSweeper, SweeperError> {
        sweep::validate(self.network.chain(), wallet, &key)?;
        Ok(WalletSweeper::new(wallet.clone(), key))
    }

    // --- The periodic tick --- //

    /// One synchronizer tick: refresh the network height, then run at
    /// most one sync round, re-querying grown address sets under the
    /// same request id before closing the round.
    ///
    /// Normally driven by the periodic task; public for embedders (and
    /// tests) that drive their own cadence.
    pub async fn sync_tick(self: &Arc<Self>) {
        // Only the API-sync modes tick.
        if !matches!(self.mode(), SyncMode::ApiOnly | SyncMode::ApiWithP2pSend)
        {
            return;
        }

        match self.client.get_block_number().await {
            Ok(bn) => {
                if self.network.set_height(bn.height) {
                    self.events.manager_event(
                        ManagerEvent::BlockHeightUpdated { height: bn.height },
                    );
                }
                if let Some(hash) = bn.verified_block_hash {
                    self.network.set_verified_block_hash(hash);
                }
            }
            Err(e) => debug!("Block number request failed: {e:#}"),
        }

        if !matches!(
            self.state(),
            ManagerState::Connected | ManagerState::Syncing,
        ) {
            return;
        }

        let plan = {
            let mut qry = self.qry.lock().unwrap();
            qry.plan_round(self.network.height())
        };
        let Some(plan) = plan else { return };

        if plan.is_full {
            self.set_state(ManagerState::Syncing);
            self.events.manager_event(ManagerEvent::SyncStarted);
        }

        let wallet = self.primary_wallet();
        let mut requested: BTreeSet<Address> =
            wallet.addresses_for_recovery().into_iter().collect();
        let mut pending: Vec<Address> = requested.iter().cloned().collect();

        let success = loop {
            let outcome = self
                .fetch_and_fold(&pending, plan.beg_block, plan.end_block)
                .await;

            // A disconnect (or teardown) while we were waiting retires
            // the round; its results are stale and must be discarded.
            if !self.qry.lock().unwrap().is_current(plan.rid) {
                debug!("Discarding results of retired sync round {}", plan.rid);
                return;
            }

            match outcome {
                Err(e) => {
                    warn!("Sync round {} failed: {e:#}", plan.rid);
                    break false;
                }
                Ok(()) => {
                    let now: BTreeSet<Address> =
                        wallet.addresses_for_recovery().into_iter().collect();
                    let delta: Vec<Address> =
                        now.difference(&requested).cloned().collect();
                    if delta.is_empty() {
                        break true;
                    }
                    // The recovered history revealed new owned addresses:
                    // query just those, still within this round.
                    debug!(
                        "Sync round {}: {} new address(es)",
                        plan.rid,
                        delta.len(),
                    );
                    requested = now;
                    pending = delta;
                }
            }
        };

        self.qry.lock().unwrap().finish_round(plan.rid, success);

        if plan.is_full {
            let reason = if success {
                SyncStoppedReason::Complete
            } else {
                SyncStoppedReason::Unknown
            };
            self.events
                .manager_event(ManagerEvent::SyncStopped { reason });
            self.set_state(ManagerState::Connected);
        }
    }

    async fn fetch_and_fold(
        self: &Arc<Self>,
        addresses: &[Address],
        beg: u64,
        end: u64,
    ) -> anyhow::Result<()> {
        match self.granularity {
            SyncGranularity::Transfers => {
                let mut bundles =
                    self.client.get_transfers(addresses, beg, end).await?;
                bundles.sort_by(|a, b| a.compare(b));
                for bundle in &bundles {
                    // One bad row never aborts the round.
                    if let Err(e) = self.recover_from_transfer_bundle(bundle) {
                        warn!("Skipping bad transfer bundle: {e:#}");
                    }
                }
            }
            SyncGranularity::Transactions => {
                let mut bundles =
                    self.client.get_transactions(addresses, beg, end).await?;
                bundles.sort_by(|a, b| a.compare(b));
                for bundle in &bundles {
                    if let Err(e) = self.recover_from_transaction_bundle(bundle)
                    {
                        warn!("Skipping bad transaction bundle: {e:#}");
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for WalletManager {
    fn drop(&mut self) {
        self.shutdown.send();
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("network", &self.network)
            .field("mode", &self.mode())
            .field("state", &self.state())
            .finish()
    }
}
