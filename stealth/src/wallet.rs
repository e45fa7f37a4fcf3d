//! Wallet signer capability
//!
//! The protocol only needs three things from a wallet: its public key, a
//! message signature (for key derivation) and transaction signatures. Browser
//! wallets, hardware wallets and local keypairs all fit behind this trait.

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use thiserror::Error;

use crate::error::StealthError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The user declined the request
    #[error("signing request rejected")]
    Rejected,

    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<WalletError> for StealthError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected => StealthError::SigningRejected,
            other => StealthError::Wallet(other.to_string()),
        }
    }
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;

    /// Add this wallet's signature to a transaction whose blockhash is already set
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;
}

/// Local keypair wallet (CLI and tests)
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        self.keypair
            .try_sign_message(message)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(tx)
    }
}
