//! Error types for the stealth payment client

use thiserror::Error;

/// Result type for stealth operations
pub type StealthResult<T> = Result<T, StealthError>;

/// Errors that can occur while deriving keys, building payments, scanning or claiming.
///
/// Variants are grouped by how the caller should react:
/// - input errors are rejected before any network call
/// - signing errors abort only the current step
/// - RPC / timeout errors are safe to retry
/// - relayer errors leave funds in a recoverable state
#[derive(Error, Debug)]
pub enum StealthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid meta-address: {0}")]
    InvalidMetaAddress(String),

    #[error("Wallet rejected the signing request")]
    SigningRejected,

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Relayer error: {0}")]
    Relayer(String),

    #[error("Account layout error: {0}")]
    Layout(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Deposit already executed by the relayer; nothing to undelegate")]
    AlreadyExecuted,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StealthError {
    /// Transient failures where resubmitting the same request is safe
    pub fn is_retryable(&self) -> bool {
        matches!(self, StealthError::Rpc(_) | StealthError::Timeout(_))
    }

    /// Errors caught before anything touched the network
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            StealthError::InvalidInput(_)
                | StealthError::InvalidAmount(_)
                | StealthError::InvalidKey(_)
                | StealthError::InvalidMetaAddress(_)
        )
    }
}

impl From<std::io::Error> for StealthError {
    fn from(err: std::io::Error) -> Self {
        StealthError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StealthError {
    fn from(err: serde_json::Error) -> Self {
        StealthError::Serialization(err.to_string())
    }
}

impl From<solana_client::client_error::ClientError> for StealthError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        StealthError::Rpc(err.to_string())
    }
}
