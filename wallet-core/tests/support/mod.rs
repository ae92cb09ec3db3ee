//! Shared fixtures: a scriptable indexer client and a deterministic
//! signer.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::account::Account;
use common::address::Address;
use common::chain::{ChainKind, Network};
use common::hash::TxHash;
use common::key::SigningKey;
use secrecy::SecretString;
use wallet_core::bundle::{TransactionBundle, TransferBundle};
use wallet_core::client::{BlockNumber, FeeEstimate, TransferClient};
use wallet_core::signer::{SignedTransaction, TransactionSigner};

/// One recorded `get_transactions` / `get_transfers` call.
#[derive(Clone, Debug)]
pub struct RecordedQuery {
    pub addresses: Vec<String>,
    pub beg: u64,
    pub end: u64,
}

/// A scriptable [`TransferClient`]: every query pops the next scripted
/// batch (empty when the script runs out) and is recorded for assertions.
#[derive(Default)]
pub struct MockClient {
    pub height: AtomicU64,
    pub transfer_batches: Mutex<VecDeque<Vec<TransferBundle>>>,
    pub transaction_batches: Mutex<VecDeque<Vec<TransactionBundle>>>,
    pub queries: Mutex<Vec<RecordedQuery>>,
    pub submissions: Mutex<Vec<String>>,
    pub fail_submit: AtomicBool,
    pub fail_queries: AtomicBool,
    pub estimate_cost_units: AtomicU64,
}

impl MockClient {
    pub fn new(height: u64) -> Arc<Self> {
        let client = Self::default();
        client.height.store(height, Ordering::Relaxed);
        client.estimate_cost_units.store(21_000, Ordering::Relaxed);
        Arc::new(client)
    }

    pub fn push_transfers(&self, batch: Vec<TransferBundle>) {
        self.transfer_batches.lock().unwrap().push_back(batch);
    }

    pub fn push_transactions(&self, batch: Vec<TransactionBundle>) {
        self.transaction_batches.lock().unwrap().push_back(batch);
    }

    fn record(&self, addresses: &[Address], beg: u64, end: u64) {
        self.queries.lock().unwrap().push(RecordedQuery {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            beg,
            end,
        });
    }
}

#[async_trait]
impl TransferClient for MockClient {
    async fn get_block_number(&self) -> anyhow::Result<BlockNumber> {
        Ok(BlockNumber {
            height: self.height.load(Ordering::Relaxed),
            verified_block_hash: None,
        })
    }

    async fn get_transactions(
        &self,
        addresses: &[Address],
        beg: u64,
        end: u64,
    ) -> anyhow::Result<Vec<TransactionBundle>> {
        self.record(addresses, beg, end);
        if self.fail_queries.load(Ordering::Relaxed) {
            anyhow::bail!("scripted failure");
        }
        Ok(self
            .transaction_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn get_transfers(
        &self,
        addresses: &[Address],
        beg: u64,
        end: u64,
    ) -> anyhow::Result<Vec<TransferBundle>> {
        self.record(addresses, beg, end);
        if self.fail_queries.load(Ordering::Relaxed) {
            anyhow::bail!("scripted failure");
        }
        Ok(self
            .transfer_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn submit_transaction(
        &self,
        _raw: &[u8],
        hash_hex: &str,
    ) -> anyhow::Result<()> {
        self.submissions.lock().unwrap().push(hash_hex.to_owned());
        if self.fail_submit.load(Ordering::Relaxed) {
            anyhow::bail!("scripted submit failure");
        }
        Ok(())
    }

    async fn estimate_transaction_fee(
        &self,
        _raw: &[u8],
        _hash_hex: &str,
    ) -> anyhow::Result<FeeEstimate> {
        Ok(FeeEstimate {
            cost_units: self.estimate_cost_units.load(Ordering::Relaxed),
            attributes: Vec::new(),
        })
    }
}

/// A deterministic signer: the "signature" is the preimage itself and
/// hashes are drawn from a counter, so every signed transfer gets a
/// unique, stable hash.
#[derive(Default)]
pub struct MockSigner {
    counter: AtomicU64,
}

impl MockSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_hash(&self, chain: ChainKind) -> TxHash {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let len = TxHash::len_for(chain);
        let mut hex = String::with_capacity(len * 2);
        for i in 0..len {
            hex.push_str(&format!("{:02x}", (n as u8).wrapping_add(i as u8)));
        }
        TxHash::from_hex(chain, &hex).unwrap()
    }
}

impl TransactionSigner for MockSigner {
    fn sign_with_paper_key(
        &self,
        chain: ChainKind,
        unsigned: &[u8],
        _paper_key: &SecretString,
    ) -> anyhow::Result<SignedTransaction> {
        Ok(SignedTransaction {
            raw: unsigned.to_vec(),
            hash: self.next_hash(chain),
        })
    }

    fn sign_with_key(
        &self,
        chain: ChainKind,
        unsigned: &[u8],
        _key: &SigningKey,
    ) -> anyhow::Result<SignedTransaction> {
        Ok(SignedTransaction {
            raw: unsigned.to_vec(),
            hash: self.next_hash(chain),
        })
    }
}

// --- Fixtures --- //

pub const BTC_ADDR_0: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
pub const BTC_ADDR_1: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
pub const BTC_TARGET: &str = "1CounterpartyXXXXXXXXXXXXXXXUWLpVr";
pub const XRP_ADDR_0: &str = "rDarPNJEpCnpBZSfmcquydockkePkjPGA2";
pub const ETH_ADDR_0: &str = "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae";

pub fn account_on(chain: ChainKind, address: &str) -> Account {
    let address = Address::parse(chain, address).unwrap();
    Account::new("test-account", 0, BTreeMap::from([(chain, address)]))
}

pub fn network(chain: ChainKind, height: u64) -> Arc<Network> {
    Arc::new(Network::new(chain, "mainnet", true, 0, height))
}
