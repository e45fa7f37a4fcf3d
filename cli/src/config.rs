//! Wallet, password and key loading for the CLI

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use solana_sdk::signature::Keypair;
use wave_stealth::key_cache::{validate_password_strength, KeyCache};
use wave_stealth::StealthKeyPair;

/// Non-interactive password source for scripts
pub const ENV_PASSWORD: &str = "WAVESTEALTH_PASSWORD";

/// `~/.config/solana/id.json`
pub fn default_keypair_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".config").join("solana").join("id.json"))
}

/// Load a Solana keypair file (JSON array of 64 bytes)
pub fn load_keypair(path: Option<&Path>) -> Result<Keypair> {
    let keypair_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_keypair_path()?,
    };

    if !keypair_path.exists() {
        bail!(
            "Solana keypair not found at {}. Generate one with 'solana-keygen new' or pass --keypair",
            keypair_path.display()
        );
    }

    let json = fs::read_to_string(&keypair_path)
        .with_context(|| format!("Failed to read {}", keypair_path.display()))?;
    let bytes: Vec<u8> = serde_json::from_str(&json).context("Keypair file is not a JSON byte array")?;
    Keypair::from_bytes(&bytes).map_err(|e| anyhow::anyhow!("Invalid keypair file: {}", e))
}

pub fn prompt_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password(prompt: &str) -> Result<String> {
    let password = prompt_password(prompt)?;
    if std::env::var(ENV_PASSWORD).is_err() {
        let confirm = prompt_password("Confirm password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }
    }

    validate_password_strength(&password)?;
    Ok(password)
}

pub fn key_cache() -> Result<KeyCache> {
    Ok(KeyCache::new(KeyCache::default_path()?))
}

/// Decrypt the cached stealth keys
pub fn load_stealth_keys(cache: &KeyCache) -> Result<StealthKeyPair> {
    if !cache.exists() {
        bail!("No stealth keys found. Run 'wavestealth init' first.");
    }

    let password = prompt_password("Enter password to decrypt keys: ")?;
    cache
        .load(&password)
        .context("Failed to decrypt keys. Wrong password?")
}
