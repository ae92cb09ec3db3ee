use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::chain::ChainKind;

/// A chain-tagged transaction (or operation) hash.
///
/// Hashes are opaque to the core: they only need value equality, hashing
/// for use in lookup sets, and a hex round-trip for the indexer and the
/// durable store. Hedera transaction hashes are 48 bytes; every other
/// supported chain uses 32.
#[serde_as]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TxHash {
    Bitcoin(#[serde_as(as = "serde_with::hex::Hex")] [u8; 32]),
    Ethereum(#[serde_as(as = "serde_with::hex::Hex")] [u8; 32]),
    Hedera(#[serde_as(as = "serde_with::hex::Hex")] [u8; 48]),
    Ripple(#[serde_as(as = "serde_with::hex::Hex")] [u8; 32]),
    Tezos(#[serde_as(as = "serde_with::hex::Hex")] [u8; 32]),
}

impl TxHash {
    /// Expected hash length in bytes for a chain.
    pub fn len_for(chain: ChainKind) -> usize {
        match chain {
            ChainKind::Hbar => 48,
            _ => 32,
        }
    }

    /// Parse an indexer-delivered hex string (optionally `0x`-prefixed)
    /// into the hash variant for `chain`.
    pub fn from_hex(chain: ChainKind, s: &str) -> anyhow::Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = decode_hex(s)?;
        let expected = Self::len_for(chain);
        anyhow::ensure!(
            bytes.len() == expected,
            "Expected {expected}-byte hash for {chain}, got {}",
            bytes.len(),
        );

        let hash = match chain {
            ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
                Self::Bitcoin(to_array::<32>(&bytes)),
            ChainKind::Eth => Self::Ethereum(to_array::<32>(&bytes)),
            ChainKind::Hbar => Self::Hedera(to_array::<48>(&bytes)),
            ChainKind::Xrp => Self::Ripple(to_array::<32>(&bytes)),
            ChainKind::Xtz => Self::Tezos(to_array::<32>(&bytes)),
        };
        Ok(hash)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bitcoin(b) | Self::Ethereum(b) | Self::Ripple(b)
            | Self::Tezos(b) => b,
            Self::Hedera(b) => b,
        }
    }

    pub fn to_hex(&self) -> String {
        let bytes = self.as_bytes();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(s.len() % 2 == 0, "Odd-length hex string");
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| anyhow::anyhow!("Invalid hex at offset {i}"))
        })
        .collect()
}

impl Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}
