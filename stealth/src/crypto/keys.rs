//! Stealth key pairs derived from a wallet signature
//!
//! The wallet signs a fixed, versioned message. The signature is hashed into
//! seed material and the spend and view scalars are taken from disjoint
//! domains of that seed, so the same wallet always recovers the same keys
//! without anything being stored.

use std::fmt;
use std::str::FromStr;

use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;
use zeroize::Zeroize;

use crate::crypto::hybrid::HybridKeyPair;
use crate::error::{StealthError, StealthResult};
use crate::wallet::WalletSigner;

/// Message presented to the wallet. Changing it changes every derived key.
pub const KEY_DERIVATION_MESSAGE: &[u8] = b"WaveSwap stealth keys v1\n\n\
Sign this message to derive your private stealth keys.\n\
This signature never leaves your device and does not cost any fees.";

const SPEND_DOMAIN: &[u8] = b"waveswap/stealth/spend/v1";
const VIEW_DOMAIN: &[u8] = b"waveswap/stealth/view/v1";
const KEM_DOMAIN: &[u8] = b"waveswap/stealth/kem/v1";

const META_ADDRESS_PREFIX: &str = "wavestealth:";
const VIEWING_KEY_PREFIX: &str = "waveview:";

// ============================================================================
// Zeroizing Scalar Wrapper
// ============================================================================

/// A scalar that zeroizes its contents on drop
#[derive(Clone)]
pub struct SecretScalar {
    bytes: [u8; 32],
}

impl SecretScalar {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self { bytes: scalar.to_bytes() }
    }

    pub fn to_scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.bytes)
    }

    /// Raw bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

/// Options for `derive_keys`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeriveOptions {
    /// Also derive the ML-KEM-768 key pair from the same seed
    pub with_hybrid: bool,
}

// ============================================================================
// Stealth Key Pair
// ============================================================================

/// Spend + view key pair, optionally extended with a post-quantum KEM pair.
///
/// Secrets are zeroized on drop and Clone is intentionally not derived.
pub struct StealthKeyPair {
    spend_secret: SecretScalar,
    view_secret: SecretScalar,
    /// Spend public key (B = b·G)
    pub spend_pubkey: [u8; 32],
    /// View public key (V = v·G)
    pub view_pubkey: [u8; 32],
    hybrid: Option<HybridKeyPair>,
}

/// Ask the wallet to sign the derivation message and derive the key pair.
pub async fn derive_keys<W>(wallet: &W, options: DeriveOptions) -> StealthResult<StealthKeyPair>
where
    W: WalletSigner + ?Sized,
{
    debug!(wallet = %wallet.pubkey(), "requesting key derivation signature");
    let signature = wallet.sign_message(KEY_DERIVATION_MESSAGE).await?;
    StealthKeyPair::from_signature(signature.as_ref(), options)
}

impl StealthKeyPair {
    /// Deterministically derive keys from a 64-byte wallet signature.
    ///
    /// - seed = SHA512(signature)
    /// - spend = SHA256(SPEND_DOMAIN || seed) mod l
    /// - view = SHA256(VIEW_DOMAIN || seed) mod l
    pub fn from_signature(signature: &[u8], options: DeriveOptions) -> StealthResult<Self> {
        if signature.len() != 64 {
            return Err(StealthError::Derivation(format!(
                "expected a 64-byte signature, got {} bytes",
                signature.len()
            )));
        }
        if signature.iter().all(|&b| b == 0) {
            return Err(StealthError::Derivation("signature is all zeros".into()));
        }

        let mut seed = [0u8; 64];
        seed.copy_from_slice(&Sha512::digest(signature));

        let spend_scalar = domain_scalar(SPEND_DOMAIN, &seed);
        let view_scalar = domain_scalar(VIEW_DOMAIN, &seed);

        let hybrid = if options.with_hybrid {
            let mut kem_seed = domain_bytes(KEM_DOMAIN, &seed);
            let pair = HybridKeyPair::from_seed(kem_seed);
            kem_seed.zeroize();
            Some(pair?)
        } else {
            None
        };
        seed.zeroize();

        if spend_scalar == Scalar::zero() || view_scalar == Scalar::zero() {
            return Err(StealthError::Derivation("signature reduced to a zero scalar".into()));
        }

        let mut keys = Self::from_scalars(&spend_scalar, &view_scalar);
        keys.hybrid = hybrid;
        Ok(keys)
    }

    /// Reconstruct keys from cached secrets
    pub fn from_secrets(spend_secret: &[u8; 32], view_secret: &[u8; 32]) -> Self {
        let spend_scalar = Scalar::from_bytes_mod_order(*spend_secret);
        let view_scalar = Scalar::from_bytes_mod_order(*view_secret);
        Self::from_scalars(&spend_scalar, &view_scalar)
    }

    fn from_scalars(spend_scalar: &Scalar, view_scalar: &Scalar) -> Self {
        let g = ED25519_BASEPOINT_POINT;
        Self {
            spend_secret: SecretScalar::from_scalar(spend_scalar),
            view_secret: SecretScalar::from_scalar(view_scalar),
            spend_pubkey: (spend_scalar * g).compress().to_bytes(),
            view_pubkey: (view_scalar * g).compress().to_bytes(),
            hybrid: None,
        }
    }

    /// Attach a KEM pair restored from the key cache
    pub fn with_hybrid(mut self, hybrid: HybridKeyPair) -> Self {
        self.hybrid = Some(hybrid);
        self
    }

    pub fn hybrid(&self) -> Option<&HybridKeyPair> {
        self.hybrid.as_ref()
    }

    /// Public half, safe to publish
    pub fn meta_address(&self) -> StealthMetaAddress {
        StealthMetaAddress {
            spend_pubkey: self.spend_pubkey,
            view_pubkey: self.view_pubkey,
            kem_pubkey: self.hybrid.as_ref().map(|h| h.public_key().to_vec()),
        }
    }

    /// Scan-only capability: can detect payments, cannot spend them
    pub fn viewing_key(&self) -> ViewingKey {
        ViewingKey {
            view_secret: self.view_secret.clone(),
            view_pubkey: self.view_pubkey,
            spend_pubkey: self.spend_pubkey,
        }
    }

    /// Export secrets as bytes (for encrypted storage)
    ///
    /// WARNING: Handle these bytes with extreme care!
    pub fn export_secrets(&self) -> ([u8; 32], [u8; 32]) {
        (*self.spend_secret.as_bytes(), *self.view_secret.as_bytes())
    }

    pub(crate) fn spend_secret(&self) -> Scalar {
        self.spend_secret.to_scalar()
    }

    pub(crate) fn view_secret(&self) -> Scalar {
        self.view_secret.to_scalar()
    }
}

impl fmt::Debug for StealthKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StealthKeyPair")
            .field("spend_pubkey", &hex::encode(self.spend_pubkey))
            .field("view_pubkey", &hex::encode(self.view_pubkey))
            .field("hybrid", &self.hybrid.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Viewing Key
// ============================================================================

/// View secret plus the public spend key.
///
/// Enough to run the scanner and recompute stealth addresses, never enough
/// to sign a claim.
#[derive(Clone)]
pub struct ViewingKey {
    view_secret: SecretScalar,
    pub view_pubkey: [u8; 32],
    pub spend_pubkey: [u8; 32],
}

impl ViewingKey {
    pub fn new(view_secret: [u8; 32], spend_pubkey: [u8; 32]) -> StealthResult<Self> {
        decompress_point(&spend_pubkey)
            .ok_or_else(|| StealthError::InvalidKey("spend public key is not a curve point".into()))?;
        let scalar = Scalar::from_bytes_mod_order(view_secret);
        Ok(Self {
            view_secret: SecretScalar::from_scalar(&scalar),
            view_pubkey: (scalar * ED25519_BASEPOINT_POINT).compress().to_bytes(),
            spend_pubkey,
        })
    }

    pub(crate) fn view_secret(&self) -> Scalar {
        self.view_secret.to_scalar()
    }

    /// `waveview:<hex(view_secret || spend_pubkey)>`
    pub fn export(&self) -> String {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(self.view_secret.as_bytes());
        combined[32..].copy_from_slice(&self.spend_pubkey);
        let encoded = format!("{}{}", VIEWING_KEY_PREFIX, hex::encode(combined));
        combined.zeroize();
        encoded
    }

    pub fn import(input: &str) -> StealthResult<Self> {
        let encoded = input.trim().strip_prefix(VIEWING_KEY_PREFIX).unwrap_or(input.trim());
        let mut bytes = hex::decode(encoded)
            .map_err(|e| StealthError::InvalidKey(format!("viewing key is not hex: {}", e)))?;
        if bytes.len() != 64 {
            bytes.zeroize();
            return Err(StealthError::InvalidKey(format!(
                "viewing key must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut view_secret = [0u8; 32];
        let mut spend_pubkey = [0u8; 32];
        view_secret.copy_from_slice(&bytes[..32]);
        spend_pubkey.copy_from_slice(&bytes[32..]);
        bytes.zeroize();
        let key = Self::new(view_secret, spend_pubkey);
        view_secret.zeroize();
        key
    }
}

impl fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewingKey")
            .field("view_pubkey", &hex::encode(self.view_pubkey))
            .field("spend_pubkey", &hex::encode(self.spend_pubkey))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Meta-address
// ============================================================================

/// Recipient public keys as published in the registry or shared out of band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthMetaAddress {
    pub spend_pubkey: [u8; 32],
    pub view_pubkey: [u8; 32],
    /// ML-KEM-768 public key; only carried by the registry, too large for the string form
    pub kem_pubkey: Option<Vec<u8>>,
}

impl StealthMetaAddress {
    pub fn new(spend_pubkey: [u8; 32], view_pubkey: [u8; 32]) -> Self {
        Self {
            spend_pubkey,
            view_pubkey,
            kem_pubkey: None,
        }
    }

    /// Both keys must decompress to points outside the small-order subgroup
    pub fn validate(&self) -> StealthResult<()> {
        validate_public_key(&self.spend_pubkey, "spend")?;
        validate_public_key(&self.view_pubkey, "view")?;
        Ok(())
    }
}

impl fmt::Display for StealthMetaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(&self.view_pubkey);
        combined[32..].copy_from_slice(&self.spend_pubkey);
        write!(f, "{}{}", META_ADDRESS_PREFIX, bs58::encode(&combined).into_string())
    }
}

impl FromStr for StealthMetaAddress {
    type Err = StealthError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let encoded = input.trim().strip_prefix(META_ADDRESS_PREFIX).unwrap_or(input.trim());
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| StealthError::InvalidMetaAddress(format!("not base58: {}", e)))?;

        if bytes.len() != 64 {
            return Err(StealthError::InvalidMetaAddress(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let mut view_pubkey = [0u8; 32];
        let mut spend_pubkey = [0u8; 32];
        view_pubkey.copy_from_slice(&bytes[..32]);
        spend_pubkey.copy_from_slice(&bytes[32..]);

        let meta = Self::new(spend_pubkey, view_pubkey);
        meta.validate()?;
        Ok(meta)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn domain_bytes(domain: &[u8], seed: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(seed);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn domain_scalar(domain: &[u8], seed: &[u8]) -> Scalar {
    let mut bytes = domain_bytes(domain, seed);
    let scalar = Scalar::from_bytes_mod_order(bytes);
    bytes.zeroize();
    scalar
}

pub(crate) fn decompress_point(bytes: &[u8; 32]) -> Option<EdwardsPoint> {
    CompressedEdwardsY::from_slice(bytes).decompress()
}

pub(crate) fn validate_public_key(bytes: &[u8; 32], label: &str) -> StealthResult<EdwardsPoint> {
    let point = decompress_point(bytes)
        .ok_or_else(|| StealthError::InvalidKey(format!("{} public key is not a curve point", label)))?;
    if point.is_small_order() {
        return Err(StealthError::InvalidKey(format!(
            "{} public key has small order",
            label
        )));
    }
    Ok(point)
}
