//! Client configuration
//!
//! Resolution order: built-in devnet defaults, then `~/.wavestealth/config.json`,
//! then `WAVESTEALTH_*` environment variables. The CLI applies its flags last.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{StealthError, StealthResult};
use crate::retry::RetryPolicy;

pub const CONFIG_DIR: &str = ".wavestealth";
pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_PROGRAM_ID: &str = "8XeQ3emXadLCHSQkczbhm5ggW5nMmmChRNmzve4udWNM";

pub const ENV_RPC_URL: &str = "WAVESTEALTH_RPC_URL";
pub const ENV_RELAYER_URL: &str = "WAVESTEALTH_RELAYER_URL";
pub const ENV_PROGRAM_ID: &str = "WAVESTEALTH_PROGRAM_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub rpc_url: String,
    /// Required for private sends and relayed claims
    pub relayer_url: Option<String>,
    pub program_id: String,
    pub confirm_timeout_secs: u64,
    pub relay_timeout_secs: u64,
    pub scan_interval_secs: u64,
    /// How long claim progress is remembered
    pub claim_state_ttl_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            relayer_url: None,
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            confirm_timeout_secs: 60,
            relay_timeout_secs: 30,
            scan_interval_secs: 15,
            claim_state_ttl_secs: 600,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// `~/.wavestealth`
    pub fn default_dir() -> StealthResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR))
            .ok_or_else(|| StealthError::Config("could not find home directory".into()))
    }

    pub fn default_path() -> StealthResult<PathBuf> {
        Ok(Self::default_dir()?.join(CONFIG_FILE))
    }

    /// Read `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> StealthResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| StealthError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults, then the config file, then the environment
    pub fn resolve() -> StealthResult<Self> {
        let config = Self::load(&Self::default_path()?)?.with_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> StealthResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `WAVESTEALTH_*` overrides; `lookup` is `std::env::var` outside tests
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC_URL).filter(|v| !v.is_empty()) {
            self.rpc_url = url;
        }
        if let Some(url) = lookup(ENV_RELAYER_URL).filter(|v| !v.is_empty()) {
            self.relayer_url = Some(url);
        }
        if let Some(id) = lookup(ENV_PROGRAM_ID).filter(|v| !v.is_empty()) {
            self.program_id = id;
        }
        self
    }

    pub fn validate(&self) -> StealthResult<()> {
        check_url("rpcUrl", &self.rpc_url)?;
        if let Some(url) = &self.relayer_url {
            check_url("relayerUrl", url)?;
        }
        self.program_id()?;
        if self.confirm_timeout_secs == 0 || self.relay_timeout_secs == 0 || self.scan_interval_secs == 0 {
            return Err(StealthError::Config("timeouts and intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn program_id(&self) -> StealthResult<Pubkey> {
        self.program_id
            .parse()
            .map_err(|e| StealthError::Config(format!("invalid program id {}: {}", self.program_id, e)))
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn claim_state_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_state_ttl_secs)
    }
}

fn check_url(field: &str, url: &str) -> StealthResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(StealthError::Config(format!("{} must be an http(s) URL, got {:?}", field, url)))
    }
}
