//! One-time stealth addresses and view tags
//!
//! Sender side (r fresh per payment, V view key, B spend key):
//!   R  = r·G
//!   ss = SHA256(STEALTH_DOMAIN || R || r·V)
//!   tag = SHA256(VIEW_TAG_DOMAIN || ss)[0]
//!   h  = SHA256(STEALTH_DOMAIN || ss || B) mod l
//!   P  = B + h·G
//!
//! Recipient side uses v·R = r·V to get the same ss, so P is recomputable
//! from the view secret and the published R alone. The one-time spending
//! scalar is b + h.

use curve25519_dalek::{constants::ED25519_BASEPOINT_POINT, edwards::EdwardsPoint, scalar::Scalar};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::crypto::keys::{decompress_point, validate_public_key, SecretScalar, StealthKeyPair, ViewingKey};
use crate::crypto::signer::StealthSigner;
use crate::error::{StealthError, StealthResult};

const STEALTH_DOMAIN: &[u8] = b"waveswap_stealth_v1";
const VIEW_TAG_DOMAIN: &[u8] = b"waveswap_viewtag_v1";

/// Output of `derive_stealth_address` (sender side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthAddress {
    /// One-time public key controlling the vault
    pub stealth_pubkey: [u8; 32],
    /// R, published in the announcement
    pub ephemeral_pubkey: [u8; 32],
    /// One-byte pre-filter for scanners
    pub view_tag: u8,
}

/// Compute a fresh stealth address for a recipient.
///
/// A new ephemeral key is drawn from OS entropy on every call; reusing one
/// would link payments.
pub fn derive_stealth_address(
    spend_pubkey: &[u8; 32],
    view_pubkey: &[u8; 32],
) -> StealthResult<StealthAddress> {
    derive_stealth_address_with_rng(&mut OsRng, spend_pubkey, view_pubkey)
}

pub fn derive_stealth_address_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    spend_pubkey: &[u8; 32],
    view_pubkey: &[u8; 32],
) -> StealthResult<StealthAddress> {
    let spend_point = validate_public_key(spend_pubkey, "spend")?;
    let view_point = validate_public_key(view_pubkey, "view")?;

    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let ephemeral_scalar = Scalar::from_bytes_mod_order(bytes);
    bytes.zeroize();

    if ephemeral_scalar == Scalar::zero() {
        return Err(StealthError::Derivation("ephemeral scalar is zero".into()));
    }

    Ok(derive_with_ephemeral(&ephemeral_scalar, &spend_point, spend_pubkey, &view_point))
}

/// Deterministic core, split out for test vectors
pub(crate) fn derive_with_ephemeral(
    ephemeral_scalar: &Scalar,
    spend_point: &EdwardsPoint,
    spend_pubkey: &[u8; 32],
    view_point: &EdwardsPoint,
) -> StealthAddress {
    let g = ED25519_BASEPOINT_POINT;
    let ephemeral_pubkey = (ephemeral_scalar * g).compress().to_bytes();

    let dh = ephemeral_scalar * view_point;
    let mut ss = shared_secret(&ephemeral_pubkey, &dh);
    let view_tag = compute_view_tag(&ss);
    let h = stealth_scalar(&ss, spend_pubkey);
    ss.zeroize();

    let stealth_pubkey = (spend_point + h * g).compress().to_bytes();

    StealthAddress {
        stealth_pubkey,
        ephemeral_pubkey,
        view_tag,
    }
}

/// ss = SHA256(domain || R || dh)
fn shared_secret(ephemeral_pubkey: &[u8; 32], dh: &EdwardsPoint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(STEALTH_DOMAIN);
    hasher.update(ephemeral_pubkey);
    hasher.update(dh.compress().as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// First byte of SHA256(VIEW_TAG_DOMAIN || shared_secret)
pub fn compute_view_tag(shared_secret: &[u8; 32]) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(VIEW_TAG_DOMAIN);
    hasher.update(shared_secret);
    hasher.finalize()[0]
}

fn stealth_scalar(shared_secret: &[u8; 32], spend_pubkey: &[u8; 32]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(STEALTH_DOMAIN);
    hasher.update(shared_secret);
    hasher.update(spend_pubkey);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    let scalar = Scalar::from_bytes_mod_order(bytes);
    bytes.zeroize();
    scalar
}

// ============================================================================
// Recipient Side
// ============================================================================

/// Shared secret as seen by the recipient (v·R). None if R is not a point.
pub(crate) fn recipient_shared_secret(view_secret: &Scalar, ephemeral_pubkey: &[u8; 32]) -> Option<[u8; 32]> {
    let ephemeral_point = decompress_point(ephemeral_pubkey)?;
    let dh = view_secret * ephemeral_point;
    Some(shared_secret(ephemeral_pubkey, &dh))
}

/// Fast filter: one scalar multiplication and two hashes
pub fn expected_view_tag(viewing_key: &ViewingKey, ephemeral_pubkey: &[u8; 32]) -> Option<u8> {
    let mut ss = recipient_shared_secret(&viewing_key.view_secret(), ephemeral_pubkey)?;
    let tag = compute_view_tag(&ss);
    ss.zeroize();
    Some(tag)
}

/// Full confirmation: recompute P and compare in constant time
pub fn confirm_stealth_pubkey(
    viewing_key: &ViewingKey,
    ephemeral_pubkey: &[u8; 32],
    stealth_pubkey: &[u8; 32],
) -> bool {
    let mut ss = match recipient_shared_secret(&viewing_key.view_secret(), ephemeral_pubkey) {
        Some(ss) => ss,
        None => return false,
    };
    let spend_point = match decompress_point(&viewing_key.spend_pubkey) {
        Some(p) => p,
        None => return false,
    };
    let h = stealth_scalar(&ss, &viewing_key.spend_pubkey);
    ss.zeroize();

    let expected = (spend_point + h * ED25519_BASEPOINT_POINT).compress().to_bytes();
    bool::from(expected.ct_eq(stealth_pubkey))
}

/// One-time spending key recovered by the recipient for a confirmed payment
pub struct OneTimeKey {
    pub stealth_pubkey: [u8; 32],
    spending_key: SecretScalar,
}

impl OneTimeKey {
    pub fn create_signer(&self) -> StealthResult<StealthSigner> {
        StealthSigner::from_scalar(&self.spending_key.to_scalar())
    }

    pub(crate) fn spending_scalar(&self) -> Scalar {
        self.spending_key.to_scalar()
    }
}

/// Derive the spending scalar b + h for a payment, if it belongs to `keys`.
pub fn recover_one_time_key(
    keys: &StealthKeyPair,
    ephemeral_pubkey: &[u8; 32],
    stealth_pubkey: &[u8; 32],
) -> Option<OneTimeKey> {
    let mut ss = recipient_shared_secret(&keys.view_secret(), ephemeral_pubkey)?;
    let h = stealth_scalar(&ss, &keys.spend_pubkey);
    ss.zeroize();

    let spending_scalar = keys.spend_secret() + h;
    let derived = (spending_scalar * ED25519_BASEPOINT_POINT).compress().to_bytes();

    if bool::from(derived.ct_eq(stealth_pubkey)) {
        Some(OneTimeKey {
            stealth_pubkey: *stealth_pubkey,
            spending_key: SecretScalar::from_scalar(&spending_scalar),
        })
    } else {
        None
    }
}
