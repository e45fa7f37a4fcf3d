//! Ed25519 signing with DKSAP-derived keys
//!
//! DKSAP produces private keys as scalars (p = b + h), but Solana's Keypair
//! uses seed-based derivation which would produce a different scalar. The
//! signer below feeds our exact scalar to ed25519-dalek's ExpandedSecretKey
//! so signatures verify against the stealth public key.

use curve25519_dalek::{constants::ED25519_BASEPOINT_POINT, scalar::Scalar};
use ed25519_dalek::{ExpandedSecretKey, PublicKey as DalekPublicKey, Signature as DalekSignature, Verifier};
use sha2::{Digest, Sha256, Sha512};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Signature, Signer, SignerError},
};
use zeroize::Zeroize;

use crate::error::{StealthError, StealthResult};

/// Domain separator for nonce derivation in signing
const NONCE_DOMAIN: &[u8] = b"waveswap_nonce_v1";

/// Domain separator for claim authorization messages
const CLAIM_DOMAIN: &[u8] = b"waveswap_claim_v1";

/// SHA256 of the destination wallet, sent to the relayer instead of signing the raw address
pub fn destination_hash(destination: &Pubkey) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(destination.as_ref()));
    out
}

/// Bytes signed by the one-time key to authorize draining `vault` to `destination`
pub fn claim_message(vault: &Pubkey, destination_hash: &[u8; 32]) -> Vec<u8> {
    let mut message = Vec::with_capacity(CLAIM_DOMAIN.len() + 64);
    message.extend_from_slice(CLAIM_DOMAIN);
    message.extend_from_slice(vault.as_ref());
    message.extend_from_slice(destination_hash);
    message
}

/// A Solana-compatible signer that uses a raw scalar for ed25519 signing
pub struct StealthSigner {
    pubkey: Pubkey,
    expanded: ExpandedSecretKey,
    dalek_pubkey: DalekPublicKey,
}

impl StealthSigner {
    /// Create a signer from a DKSAP-derived scalar
    pub fn from_scalar(scalar: &Scalar) -> StealthResult<Self> {
        let public_bytes = (scalar * ED25519_BASEPOINT_POINT).compress().to_bytes();

        // Expanded key: [scalar (32) | nonce prefix (32)], prefix = SHA512(domain || scalar)[..32]
        let mut scalar_bytes = scalar.to_bytes();
        let mut nonce_hasher = Sha512::new();
        nonce_hasher.update(NONCE_DOMAIN);
        nonce_hasher.update(scalar_bytes);
        let nonce_hash = nonce_hasher.finalize();

        let mut expanded_bytes = [0u8; 64];
        expanded_bytes[..32].copy_from_slice(&scalar_bytes);
        expanded_bytes[32..].copy_from_slice(&nonce_hash[..32]);

        let expanded = ExpandedSecretKey::from_bytes(&expanded_bytes)
            .map_err(|e| StealthError::InvalidKey(format!("invalid scalar: {}", e)));

        scalar_bytes.zeroize();
        expanded_bytes.zeroize();

        let dalek_pubkey = DalekPublicKey::from_bytes(&public_bytes)
            .map_err(|e| StealthError::InvalidKey(format!("invalid pubkey: {}", e)))?;

        Ok(Self {
            pubkey: Pubkey::new_from_array(public_bytes),
            expanded: expanded?,
            dalek_pubkey,
        })
    }

    /// Sign the claim authorization for `vault` → `destination`
    pub fn sign_claim(&self, vault: &Pubkey, destination: &Pubkey) -> ([u8; 64], [u8; 32]) {
        let hash = destination_hash(destination);
        let signature = self.expanded.sign(&claim_message(vault, &hash), &self.dalek_pubkey);
        (signature.to_bytes(), hash)
    }

    /// Verify a claim signature against a stealth public key
    pub fn verify_claim(
        stealth_pubkey: &[u8; 32],
        vault: &Pubkey,
        destination_hash: &[u8; 32],
        signature: &[u8; 64],
    ) -> bool {
        let Ok(pubkey) = DalekPublicKey::from_bytes(stealth_pubkey) else {
            return false;
        };
        let Ok(signature) = DalekSignature::from_bytes(signature) else {
            return false;
        };
        pubkey
            .verify(&claim_message(vault, destination_hash), &signature)
            .is_ok()
    }
}

impl Signer for StealthSigner {
    fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    fn try_pubkey(&self) -> Result<Pubkey, SignerError> {
        Ok(self.pubkey)
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let sig: DalekSignature = self.expanded.sign(message, &self.dalek_pubkey);
        Ok(Signature::from(sig.to_bytes()))
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

impl PartialEq for StealthSigner {
    fn eq(&self, other: &Self) -> bool {
        self.pubkey == other.pubkey
    }
}

impl std::fmt::Debug for StealthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthSigner")
            .field("pubkey", &self.pubkey)
            .finish_non_exhaustive()
    }
}
