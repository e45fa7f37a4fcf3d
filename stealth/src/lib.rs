//! WaveSwap stealth payment client
//!
//! Senders pay a recipient's published meta-address through a one-time vault
//! nobody else can link to the recipient. Recipients find their payments by
//! scanning on-chain announcements with a view key and claim them with a
//! key derived per payment.
//!
//! - [`crypto`]: key derivation, one-time addresses, view tags, claim signing
//! - [`scanner`]: view-tag filtered discovery of incoming payments
//! - [`orchestrator`]: send / mix / claim / undelegate state machine
//! - [`relay`]: privacy relayer HTTP client
//! - [`registry`]: on-chain meta-address registry
//!
//! Chain access, wallets and the relayer are traits (`ChainRpc`,
//! `WalletSigner`, `PrivacyRelay`) so every flow runs against in-memory fakes
//! in tests.

pub mod amount;
pub mod config;
pub mod crypto;
pub mod error;
pub mod instruction;
pub mod key_cache;
pub mod layout;
pub mod orchestrator;
pub mod pda;
pub mod registry;
pub mod relay;
pub mod retry;
pub mod rpc;
pub mod scanner;
pub mod store;
pub mod wallet;

pub use amount::{Lamports, MIN_DEPOSIT};
pub use config::ClientConfig;
pub use crypto::{derive_keys, DeriveOptions, StealthKeyPair, StealthMetaAddress, ViewingKey};
pub use error::{StealthError, StealthResult};
pub use orchestrator::{ClaimMode, ClaimOutcome, Orchestrator, PaymentSession, PaymentState, Recovery, SendMode};
pub use relay::{PrivacyRelay, RelayClient};
pub use rpc::{ChainRpc, SolanaRpc};
pub use scanner::{PendingClaim, ScanReport, Scanner};
pub use store::{BalanceCache, ClaimStatus, ClaimTracker, KeyValueStore, MemoryStore};
pub use wallet::{KeypairWallet, WalletSigner};

#[cfg(test)]
mod test_support;



#[cfg(test)]
mod test_vectors;
