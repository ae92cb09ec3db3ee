//! The signing contract.
//!
//! Key derivation (BIP-39/BIP-32), curve math and wire encoding all live
//! in an external collaborator; the core hands it the unsigned preimage
//! and receives back the exact bytes to broadcast plus the resulting
//! transaction hash. Paper keys and raw keys cross this seam wrapped in
//! [`secrecy`] types, so the secret material is zeroized on drop and
//! never lands in logs.

use common::chain::ChainKind;
use common::hash::TxHash;
use common::key::SigningKey;
use secrecy::SecretString;

/// A signer's output: the broadcastable serialization and its hash.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
}

pub trait TransactionSigner: Send + Sync + 'static {
    /// Sign with the seed derived from the account's paper key.
    fn sign_with_paper_key(
        &self,
        chain: ChainKind,
        unsigned: &[u8],
        paper_key: &SecretString,
    ) -> anyhow::Result<SignedTransaction>;

    /// Sign with an explicit private key (sweeps). The key must carry its
    /// secret half.
    fn sign_with_key(
        &self,
        chain: ChainKind,
        unsigned: &[u8],
        key: &SigningKey,
    ) -> anyhow::Result<SignedTransaction>;
}
