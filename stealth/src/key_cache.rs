//! Encrypted local key cache
//!
//! Stealth secrets can always be re-derived by asking the wallet to sign
//! again; the cache saves that prompt. AES-256-GCM with an Argon2id-derived
//! key, never plaintext on disk.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{
    password_hash::{rand_core::RngCore, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use zeroize::Zeroize;

use crate::config::CONFIG_DIR;
use crate::crypto::{HybridKeyPair, StealthKeyPair};
use crate::error::{StealthError, StealthResult};

const KEYS_FILE: &str = "keys.enc";
const FILE_VERSION: u8 = 1;

/// Argon2 parameters for key derivation
const ARGON2_M_COST: u32 = 65536; // 64 MB memory
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

/// Encrypted key file format
#[derive(Serialize, Deserialize)]
pub struct EncryptedKeyFile {
    pub version: u8,
    /// Salt for Argon2
    pub salt: String,
    /// Nonce for AES-GCM (base64)
    pub nonce: String,
    /// Encrypted `KeyData` (base64)
    pub ciphertext: String,
    /// Argon2 hash for a clear "wrong password" error
    pub password_hash: Option<String>,
    /// Wallet the keys were derived from (public)
    pub owner: String,
    pub created_at: String,
}

/// Plaintext key material (in memory only)
#[derive(Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct KeyData {
    pub spend_secret: [u8; 32],
    pub view_secret: [u8; 32],
    pub spend_pubkey: [u8; 32],
    pub view_pubkey: [u8; 32],
    #[serde(default)]
    pub kem_public: Option<Vec<u8>>,
    #[serde(default)]
    pub kem_secret: Option<Vec<u8>>,
}

impl KeyData {
    pub fn from_keys(keys: &StealthKeyPair) -> Self {
        let (spend_secret, view_secret) = keys.export_secrets();
        Self {
            spend_secret,
            view_secret,
            spend_pubkey: keys.spend_pubkey,
            view_pubkey: keys.view_pubkey,
            kem_public: keys.hybrid().map(|h| h.public_key().to_vec()),
            kem_secret: keys.hybrid().map(|h| h.secret_key().to_vec()),
        }
    }

    /// Rebuild the key pair, checking the cached public keys still match
    pub fn to_keys(&self) -> StealthResult<StealthKeyPair> {
        let keys = StealthKeyPair::from_secrets(&self.spend_secret, &self.view_secret);
        if keys.spend_pubkey != self.spend_pubkey || keys.view_pubkey != self.view_pubkey {
            return Err(StealthError::Storage("cached keys are inconsistent".into()));
        }
        match (&self.kem_public, &self.kem_secret) {
            (Some(public), Some(secret)) => Ok(keys.with_hybrid(HybridKeyPair::from_bytes(public, secret)?)),
            _ => Ok(keys),
        }
    }
}

fn argon2() -> StealthResult<Argon2<'static>> {
    let params = argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| StealthError::Storage(format!("argon2 params error: {}", e)))?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

fn derive_cipher(password: &str, salt: &str) -> StealthResult<Aes256Gcm> {
    let mut key_bytes = [0u8; 32];
    argon2()?
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut key_bytes)
        .map_err(|e| StealthError::Storage(format!("key derivation failed: {}", e)))?;
    let cipher = Aes256Gcm::new_from_slice(&key_bytes)
        .map_err(|e| StealthError::Storage(format!("cipher creation failed: {}", e)));
    key_bytes.zeroize();
    cipher
}

impl EncryptedKeyFile {
    pub fn encrypt(data: &KeyData, owner: &Pubkey, password: &str) -> StealthResult<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let cipher = derive_cipher(password, salt.as_str())?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);

        let mut plaintext = serde_json::to_vec(data)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
            .map_err(|e| StealthError::Storage(format!("encryption failed: {}", e)));
        plaintext.zeroize();

        let password_hash = argon2()?
            .hash_password(password.as_bytes(), &salt)
            .ok()
            .map(|h| h.to_string());

        Ok(Self {
            version: FILE_VERSION,
            salt: salt.as_str().to_string(),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext?),
            password_hash,
            owner: owner.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn decrypt(&self, password: &str) -> StealthResult<KeyData> {
        if self.version != FILE_VERSION {
            return Err(StealthError::Storage(format!("unsupported key file version {}", self.version)));
        }
        if let Some(hash) = &self.password_hash {
            let parsed = argon2::PasswordHash::new(hash)
                .map_err(|e| StealthError::Storage(format!("invalid password hash: {}", e)))?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .map_err(|_| StealthError::Storage("invalid password".into()))?;
        }

        let cipher = derive_cipher(password, &self.salt)?;
        let nonce = BASE64
            .decode(&self.nonce)
            .map_err(|e| StealthError::Storage(format!("invalid nonce encoding: {}", e)))?;
        if nonce.len() != 12 {
            return Err(StealthError::Storage("invalid nonce length".into()));
        }
        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .map_err(|e| StealthError::Storage(format!("invalid ciphertext encoding: {}", e)))?;

        let mut plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| StealthError::Storage("decryption failed - wrong password or corrupted data".into()))?;
        let data = serde_json::from_slice(&plaintext)
            .map_err(|e| StealthError::Storage(format!("failed to parse key data: {}", e)));
        plaintext.zeroize();
        data
    }
}

/// Key cache at a file path
pub struct KeyCache {
    path: PathBuf,
}

impl KeyCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.wavestealth/keys.enc`
    pub fn default_path() -> StealthResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(KEYS_FILE))
            .ok_or_else(|| StealthError::Storage("could not find home directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, keys: &StealthKeyPair, owner: &Pubkey, password: &str) -> StealthResult<()> {
        let encrypted = EncryptedKeyFile::encrypt(&KeyData::from_keys(keys), owner, password)?;
        let json = serde_json::to_string_pretty(&encrypted)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::write(&self.path, &json)?;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, &json)?;
        }

        Ok(())
    }

    fn read_file(&self) -> StealthResult<EncryptedKeyFile> {
        if !self.exists() {
            return Err(StealthError::Storage(format!("no key cache at {}", self.path.display())));
        }
        let json = fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| StealthError::Storage(format!("corrupt key cache: {}", e)))
    }

    /// Wallet the cached keys belong to, without needing the password
    pub fn owner(&self) -> StealthResult<Pubkey> {
        let file = self.read_file()?;
        file.owner
            .parse()
            .map_err(|e| StealthError::Storage(format!("invalid owner in key cache: {}", e)))
    }

    pub fn load(&self, password: &str) -> StealthResult<StealthKeyPair> {
        self.read_file()?.decrypt(password)?.to_keys()
    }

    pub fn delete(&self, password: &str) -> StealthResult<()> {
        self.load(password)?;
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// At least 8 characters with upper, lower and digit
pub fn validate_password_strength(password: &str) -> StealthResult<()> {
    if password.len() < 8 {
        return Err(StealthError::InvalidInput("password must be at least 8 characters".into()));
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_upper || !has_lower || !has_digit {
        return Err(StealthError::InvalidInput(
            "password must contain uppercase, lowercase and numeric characters".into(),
        ));
    }
    Ok(())
}
