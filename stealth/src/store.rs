//! Injected key-value state with TTL
//!
//! Session state (claim progress, cached vault balances) lives behind the
//! `KeyValueStore` trait instead of process-wide globals. `MemoryStore` is
//! the in-process implementation; values are JSON strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::amount::Lamports;
use crate::error::StealthResult;
use crate::rpc::ChainRpc;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StealthResult<Option<String>>;

    /// Insert or replace. `ttl = None` keeps the entry until removed.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StealthResult<()>;

    async fn remove(&self, key: &str) -> StealthResult<()>;

    /// Atomically replace the value if it currently equals `expected`
    /// (`None` = absent or expired). Returns whether the swap happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> StealthResult<bool>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory store; expired entries are dropped lazily on access
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StealthResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).map_or(false, |e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StealthResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> StealthResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> StealthResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let current = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.as_str());

        if current != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(true)
    }
}

// ============================================================================
// Claim Tracker
// ============================================================================

/// Client-side progress of one vault's claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Claiming,
    Claimed,
    Failed,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Claiming => "claiming",
            ClaimStatus::Claimed => "claimed",
            ClaimStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-vault claim status, so concurrent claims of the same vault do not both submit
#[derive(Clone)]
pub struct ClaimTracker {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ClaimTracker {
    /// Entries outlive a session by at most `ttl`
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(vault: &Pubkey) -> String {
        format!("claim:{}", vault)
    }

    pub async fn status(&self, vault: &Pubkey) -> StealthResult<Option<ClaimStatus>> {
        match self.store.get(&Self::key(vault)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Move the vault to `Claiming`. Returns false if another claim is in
    /// flight or already finished.
    pub async fn begin(&self, vault: &Pubkey) -> StealthResult<bool> {
        let key = Self::key(vault);
        let current = self.store.get(&key).await?;
        if let Some(raw) = &current {
            let status: ClaimStatus = serde_json::from_str(raw)?;
            if matches!(status, ClaimStatus::Claiming | ClaimStatus::Claimed) {
                debug!(vault = %vault, %status, "claim already in progress or done");
                return Ok(false);
            }
        }
        let next = serde_json::to_string(&ClaimStatus::Claiming)?;
        self.store
            .compare_and_set(&key, current.as_deref(), next, Some(self.ttl))
            .await
    }

    /// Give up an unfinished claim: `Claiming` becomes `Failed`, any other
    /// status is left alone. Returns whether the marker was released.
    pub async fn release(&self, vault: &Pubkey) -> StealthResult<bool> {
        let claiming = serde_json::to_string(&ClaimStatus::Claiming)?;
        let failed = serde_json::to_string(&ClaimStatus::Failed)?;
        self.store
            .compare_and_set(&Self::key(vault), Some(&claiming), failed, Some(self.ttl))
            .await
    }

    pub async fn mark(&self, vault: &Pubkey, status: ClaimStatus) -> StealthResult<()> {
        let value = serde_json::to_string(&status)?;
        self.store.set(&Self::key(vault), value, Some(self.ttl)).await
    }
}

// ============================================================================
// Balance Cache
// ============================================================================

/// Short-lived vault balance cache in front of `ChainRpc::get_balance`
#[derive(Clone)]
pub struct BalanceCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl BalanceCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(address: &Pubkey) -> String {
        format!("balance:{}", address)
    }

    pub async fn balance(&self, rpc: &dyn ChainRpc, address: &Pubkey) -> StealthResult<Lamports> {
        let key = Self::key(address);
        if let Some(raw) = self.store.get(&key).await? {
            return Ok(serde_json::from_str(&raw)?);
        }
        let balance = rpc.get_balance(address).await?;
        self.store
            .set(&key, serde_json::to_string(&balance)?, Some(self.ttl))
            .await?;
        Ok(balance)
    }

    pub async fn invalidate(&self, address: &Pubkey) -> StealthResult<()> {
        self.store.remove(&Self::key(address)).await
    }
}
