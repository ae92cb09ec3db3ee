use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::unit::Unit;

/// The closed set of chain families the wallet core supports.
///
/// Every polymorphic entity (transfer, fee basis, hash, address) carries its
/// [`ChainKind`]; mixing tags across entities is a programmer error and is
/// asserted against at the seams.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr)]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub enum ChainKind {
    Btc,
    Bch,
    Bsv,
    Eth,
    Hbar,
    Xrp,
    Xtz,
}

impl ChainKind {
    pub const ALL: [ChainKind; 7] = [
        Self::Btc,
        Self::Bch,
        Self::Bsv,
        Self::Eth,
        Self::Hbar,
        Self::Xrp,
        Self::Xtz,
    ];

    /// The native currency code, also the first path component of the
    /// on-disk store for this chain.
    pub fn currency_code(self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Bch => "bch",
            Self::Bsv => "bsv",
            Self::Eth => "eth",
            Self::Hbar => "hbar",
            Self::Xrp => "xrp",
            Self::Xtz => "xtz",
        }
    }

    /// The expected mean inter-block interval. Drives the sync tick rate and
    /// the re-scan overlap of the synchronizer.
    pub fn confirmation_period(self) -> Duration {
        match self {
            Self::Btc | Self::Bch | Self::Bsv => Duration::from_secs(600),
            Self::Eth => Duration::from_secs(15),
            Self::Hbar => Duration::from_secs(5),
            Self::Xrp => Duration::from_secs(4),
            Self::Xtz => Duration::from_secs(60),
        }
    }

    /// Whether this chain is UTXO-based and (optionally) reachable over the
    /// peer-to-peer path.
    pub fn is_bitcoin_family(self) -> bool {
        matches!(self, Self::Btc | Self::Bch | Self::Bsv)
    }

    /// The native base unit (satoshi, wei, ...).
    pub fn base_unit(self) -> Unit {
        match self {
            Self::Btc => Unit::new("BTC", "sat", 0),
            Self::Bch => Unit::new("BCH", "sat", 0),
            Self::Bsv => Unit::new("BSV", "sat", 0),
            Self::Eth => Unit::new("ETH", "wei", 0),
            Self::Hbar => Unit::new("HBAR", "tinybar", 0),
            Self::Xrp => Unit::new("XRP", "drop", 0),
            Self::Xtz => Unit::new("XTZ", "mutez", 0),
        }
    }

    /// The default (display) unit for the native currency.
    pub fn default_unit(self) -> Unit {
        match self {
            Self::Btc => Unit::new("BTC", "btc", 8),
            Self::Bch => Unit::new("BCH", "bch", 8),
            Self::Bsv => Unit::new("BSV", "bsv", 8),
            Self::Eth => Unit::new("ETH", "ether", 18),
            Self::Hbar => Unit::new("HBAR", "hbar", 8),
            Self::Xrp => Unit::new("XRP", "xrp", 6),
            Self::Xtz => Unit::new("XTZ", "tez", 6),
        }
    }
}

impl Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.currency_code())
    }
}

impl FromStr for ChainKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "btc" => Ok(Self::Btc),
            "bch" => Ok(Self::Bch),
            "bsv" => Ok(Self::Bsv),
            "eth" => Ok(Self::Eth),
            "hbar" => Ok(Self::Hbar),
            "xrp" => Ok(Self::Xrp),
            "xtz" => Ok(Self::Xtz),
            _ => Err(anyhow::anyhow!("Unknown chain kind: '{s}'")),
        }
    }
}

/// A handle to one network of one chain ("eth" + "mainnet").
///
/// The metadata registry proper (checkpoints, fee schedules, currency
/// listings) lives outside this workspace; a [`Network`] carries only what
/// the core needs: the tag, a name for the on-disk store, the block-height
/// cell the indexer updates, and the account-creation sync floor.
pub struct Network {
    chain: ChainKind,
    name: String,
    is_mainnet: bool,
    /// Earliest block the synchronizer must ever reach back to.
    earliest_block: u64,
    height: AtomicU64,
    verified_block_hash: Mutex<Option<String>>,
}

impl Network {
    pub fn new(
        chain: ChainKind,
        name: impl Into<String>,
        is_mainnet: bool,
        earliest_block: u64,
        height: u64,
    ) -> Self {
        Self {
            chain,
            name: name.into(),
            is_mainnet,
            earliest_block,
            height: AtomicU64::new(height),
            verified_block_hash: Mutex::new(None),
        }
    }

    /// A mainnet network starting from genesis. Mostly useful in tests.
    pub fn mainnet(chain: ChainKind) -> Self {
        Self::new(chain, "mainnet", true, 0, 0)
    }

    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    pub fn earliest_block(&self) -> u64 {
        self.earliest_block
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Record a new network height announced by the indexer. Returns true
    /// iff the height actually changed.
    pub fn set_height(&self, height: u64) -> bool {
        self.height.swap(height, Ordering::AcqRel) != height
    }

    pub fn verified_block_hash(&self) -> Option<String> {
        self.verified_block_hash
            .lock()
            .expect("poisoned")
            .clone()
    }

    pub fn set_verified_block_hash(&self, hash: String) {
        *self.verified_block_hash.lock().expect("poisoned") = Some(hash);
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("chain", &self.chain)
            .field("name", &self.name)
            .field("height", &self.height())
            .finish()
    }
}

/// One entry of the network's fee schedule: the price of a single cost
/// factor unit at a given confirmation-speed tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkFee {
    /// Expected time-to-confirmation when paying this price.
    pub confirmation_time_ms: u64,
    /// Price per cost factor: sat/kB for Bitcoin-family, wei per gas unit
    /// for Ethereum, the flat fee for fixed-fee chains.
    pub price_per_cost_factor: crate::amount::Amount,
}
