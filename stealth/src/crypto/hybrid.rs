//! Post-quantum KEM key pair (ML-KEM-768 / Kyber768)
//!
//! The pair is derived from the same wallet-signature seed as the classical
//! keys, published through the registry, and used to seal short notes to a
//! recipient (KEM shared secret → AES-256-GCM).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use pqc_kyber::{decapsulate, encapsulate, keypair, KYBER_CIPHERTEXTBYTES, KYBER_PUBLICKEYBYTES, KYBER_SECRETKEYBYTES};
use rand::{rngs::OsRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{StealthError, StealthResult};

/// Size of an ML-KEM-768 public key
pub const KEM_PUBLIC_KEY_SIZE: usize = KYBER_PUBLICKEYBYTES;

const NOTE_KEY_DOMAIN: &[u8] = b"waveswap_note_v1";

/// ML-KEM-768 key pair; the secret half is zeroized on drop
pub struct HybridKeyPair {
    public: [u8; KYBER_PUBLICKEYBYTES],
    secret: [u8; KYBER_SECRETKEYBYTES],
}

/// Note sealed to a recipient's KEM public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedNote {
    /// KEM ciphertext (hex)
    pub kem_ciphertext: String,
    /// AES-GCM nonce (hex)
    pub nonce: String,
    /// AES-GCM ciphertext (hex)
    pub body: String,
}

impl HybridKeyPair {
    /// Deterministic key generation from 32 bytes of seed material
    pub fn from_seed(seed: [u8; 32]) -> StealthResult<Self> {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let keys = keypair(&mut rng)
            .map_err(|e| StealthError::Derivation(format!("kyber keypair generation failed: {:?}", e)))?;
        Ok(Self {
            public: keys.public,
            secret: keys.secret,
        })
    }

    /// Restore from cached bytes
    pub fn from_bytes(public: &[u8], secret: &[u8]) -> StealthResult<Self> {
        if public.len() != KYBER_PUBLICKEYBYTES || secret.len() != KYBER_SECRETKEYBYTES {
            return Err(StealthError::InvalidKey(format!(
                "kem key sizes must be {}/{}, got {}/{}",
                KYBER_PUBLICKEYBYTES,
                KYBER_SECRETKEYBYTES,
                public.len(),
                secret.len()
            )));
        }
        let mut pair = Self {
            public: [0u8; KYBER_PUBLICKEYBYTES],
            secret: [0u8; KYBER_SECRETKEYBYTES],
        };
        pair.public.copy_from_slice(public);
        pair.secret.copy_from_slice(secret);
        Ok(pair)
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    pub fn secret_key(&self) -> &[u8] {
        &self.secret
    }

    /// Open a note sealed with `seal_note`
    pub fn open_note(&self, note: &SealedNote) -> StealthResult<Vec<u8>> {
        let kem_ciphertext = decode_hex(&note.kem_ciphertext, "kem ciphertext")?;
        if kem_ciphertext.len() != KYBER_CIPHERTEXTBYTES {
            return Err(StealthError::InvalidInput(format!(
                "kem ciphertext must be {} bytes",
                KYBER_CIPHERTEXTBYTES
            )));
        }
        let nonce = decode_hex(&note.nonce, "nonce")?;
        if nonce.len() != 12 {
            return Err(StealthError::InvalidInput("nonce must be 12 bytes".into()));
        }
        let body = decode_hex(&note.body, "body")?;

        let mut shared = decapsulate(&kem_ciphertext, &self.secret)
            .map_err(|e| StealthError::Derivation(format!("kyber decapsulation failed: {:?}", e)))?;
        let cipher = note_cipher(&shared);
        shared.zeroize();

        cipher?
            .decrypt(Nonce::from_slice(&nonce), body.as_ref())
            .map_err(|_| StealthError::Derivation("note decryption failed".into()))
    }
}

impl Drop for HybridKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Seal `plaintext` so only the holder of `recipient_kem_pubkey` can read it
pub fn seal_note(recipient_kem_pubkey: &[u8], plaintext: &[u8]) -> StealthResult<SealedNote> {
    if recipient_kem_pubkey.len() != KYBER_PUBLICKEYBYTES {
        return Err(StealthError::InvalidKey(format!(
            "kem public key must be {} bytes, got {}",
            KYBER_PUBLICKEYBYTES,
            recipient_kem_pubkey.len()
        )));
    }

    let mut rng = OsRng;
    let (kem_ciphertext, mut shared) = encapsulate(recipient_kem_pubkey, &mut rng)
        .map_err(|e| StealthError::Derivation(format!("kyber encapsulation failed: {:?}", e)))?;
    let cipher = note_cipher(&shared);
    shared.zeroize();

    let mut nonce = [0u8; 12];
    rng.fill_bytes(&mut nonce);
    let body = cipher?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StealthError::Derivation("note encryption failed".into()))?;

    Ok(SealedNote {
        kem_ciphertext: hex::encode(kem_ciphertext),
        nonce: hex::encode(nonce),
        body: hex::encode(body),
    })
}

fn note_cipher(shared_secret: &[u8]) -> StealthResult<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(NOTE_KEY_DOMAIN);
    hasher.update(shared_secret);
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| StealthError::Derivation(format!("cipher creation failed: {}", e)));
    key.zeroize();
    cipher
}

fn decode_hex(value: &str, label: &str) -> StealthResult<Vec<u8>> {
    hex::decode(value).map_err(|e| StealthError::InvalidInput(format!("{} is not hex: {}", label, e)))
}
