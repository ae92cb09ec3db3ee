//! Wallet sweepers: one-shot drains of a paper-wallet private key into a
//! wallet. Only supported for the Bitcoin family; everything else reports
//! the currency as unsupported.

use std::sync::Arc;

use common::key::SigningKey;
use common::chain::ChainKind;

use crate::wallet::Wallet;

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SweeperError {
    #[error("Sweeping is not supported for this currency")]
    UnsupportedCurrency,
    #[error("The key cannot sign (no secret half)")]
    InvalidKey,
    #[error("Wallet and manager belong to different chains")]
    InvalidArguments,
}

/// Check whether `key` can sweep into `wallet` under a manager for
/// `manager_chain`.
pub(crate) fn validate(
    manager_chain: ChainKind,
    wallet: &Arc<Wallet>,
    key: &SigningKey,
) -> Result<(), SweeperError> {
    if wallet.chain() != manager_chain {
        return Err(SweeperError::InvalidArguments);
    }
    if !key.has_secret() {
        return Err(SweeperError::InvalidKey);
    }
    if !wallet.chain().is_bitcoin_family() {
        return Err(SweeperError::UnsupportedCurrency);
    }
    Ok(())
}

/// A validated sweeper: holds the key to drain and the wallet to drain
/// into. The sweep transaction itself is built by the external wire
/// codec once the key's funding has been discovered.
pub struct WalletSweeper {
    wallet: Arc<Wallet>,
    key: SigningKey,
}

impl WalletSweeper {
    pub(crate) fn new(wallet: Arc<Wallet>, key: SigningKey) -> Self {
        Self { wallet, key }
    }

    pub fn chain(&self) -> ChainKind {
        self.wallet.chain()
    }

    pub fn wallet(&self) -> &Arc<Wallet> {
        &self.wallet
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }
}
