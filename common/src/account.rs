use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::chain::ChainKind;

/// One user account, bound to exactly one key hierarchy.
///
/// The account does not hold key material; derivation from the paper key
/// happens inside the external signing collaborator. What the core needs
/// from an account is (a) a stable identifier, (b) the primary receive
/// address per chain, and (c) the creation timestamp, which floors how far
/// back the synchronizer ever needs to scan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    uids: String,
    /// Unix seconds at account creation.
    created_at: u64,
    addresses: BTreeMap<ChainKind, Address>,
}

impl Account {
    pub fn new(
        uids: impl Into<String>,
        created_at: u64,
        addresses: BTreeMap<ChainKind, Address>,
    ) -> Self {
        Self {
            uids: uids.into(),
            created_at,
            addresses,
        }
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// The account's primary address on `chain`, if the account was
    /// initialized for it.
    pub fn address(&self, chain: ChainKind) -> Option<&Address> {
        self.addresses.get(&chain)
    }

    /// Whether the account can operate on `chain` at all.
    pub fn is_initialized_on(&self, chain: ChainKind) -> bool {
        self.addresses.contains_key(&chain)
    }
}
