pub mod address;
pub mod balance;
pub mod claim;
pub mod export_view_key;
pub mod info;
pub mod init;
pub mod register;
pub mod scan;
pub mod send;
pub mod undelegate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;
use wave_stealth::{
    BalanceCache, ClaimTracker, ClientConfig, KeypairWallet, Lamports, MemoryStore, Orchestrator, RelayClient, Scanner, SolanaRpc,
    StealthKeyPair,
};

use crate::config::load_keypair;

/// Resolved configuration plus the handles every command builds from it
pub struct CliContext {
    pub config: ClientConfig,
    pub keypair_path: Option<PathBuf>,
    store: Arc<MemoryStore>,
}

impl CliContext {
    /// Config file and environment first, then command line flags
    pub fn new(rpc_url: Option<String>, relayer_url: Option<String>, keypair_path: Option<PathBuf>) -> Result<Self> {
        let mut config = ClientConfig::resolve().context("Failed to load configuration")?;
        if let Some(url) = rpc_url {
            config.rpc_url = url;
        }
        if let Some(url) = relayer_url {
            config.relayer_url = Some(url);
        }
        config.validate()?;
        debug!(rpc = %config.rpc_url, relayer = ?config.relayer_url, "configuration resolved");

        Ok(Self {
            config,
            keypair_path,
            store: Arc::new(MemoryStore::new()),
        })
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        Ok(self.config.program_id()?)
    }

    pub fn rpc(&self) -> Arc<SolanaRpc> {
        Arc::new(SolanaRpc::new(&self.config.rpc_url))
    }

    pub fn wallet(&self) -> Result<KeypairWallet> {
        Ok(KeypairWallet::new(load_keypair(self.keypair_path.as_deref())?))
    }

    /// Vault balances cached for one scan interval, shared by scanner and claims
    pub fn balance_cache(&self) -> BalanceCache {
        BalanceCache::new(self.store.clone(), self.config.scan_interval())
    }

    /// Orchestrator wired to the relayer when one is configured
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let claims = ClaimTracker::new(self.store.clone(), self.config.claim_state_ttl());
        let orchestrator = Orchestrator::new(self.rpc(), self.program_id()?, claims, self.config.confirm_timeout())
            .with_balance_cache(self.balance_cache());

        match &self.config.relayer_url {
            Some(url) => {
                let relay = RelayClient::new(url, self.config.relay_timeout(), self.config.retry.clone())?;
                Ok(orchestrator.with_relay(Arc::new(relay)))
            }
            None => Ok(orchestrator),
        }
    }

    pub fn scanner(&self, keys: &StealthKeyPair) -> Result<Scanner> {
        Ok(Scanner::new(keys.viewing_key(), self.program_id()?))
    }

    /// Scanner for repeated passes; balances are re-read once per scan interval
    pub fn watching_scanner(&self, keys: &StealthKeyPair) -> Result<Scanner> {
        Ok(self.scanner(keys)?.with_balance_cache(self.balance_cache()))
    }
}

pub fn format_sol(amount: Lamports) -> String {
    format!("{} SOL", amount.to_sol_string())
}
