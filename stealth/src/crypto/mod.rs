//! Client-side cryptography for stealth payments
//!
//! - `keys`: signature-seeded spend/view key derivation
//! - `stealth`: one-time address and view tag computation (DKSAP over ed25519)
//! - `signer`: ed25519 signing with DKSAP-derived scalars
//! - `hybrid`: optional ML-KEM-768 key pair for post-quantum note encryption

pub mod hybrid;
pub mod keys;
pub mod signer;
pub mod stealth;

pub use hybrid::{seal_note, HybridKeyPair, SealedNote, KEM_PUBLIC_KEY_SIZE};
pub use keys::{
    derive_keys, DeriveOptions, SecretScalar, StealthKeyPair, StealthMetaAddress, ViewingKey,
    KEY_DERIVATION_MESSAGE,
};
pub use signer::{claim_message, destination_hash, StealthSigner};
pub use stealth::{
    compute_view_tag, derive_stealth_address, recover_one_time_key, OneTimeKey, StealthAddress,
};
