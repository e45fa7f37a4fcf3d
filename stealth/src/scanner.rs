//! Announcement scanner
//!
//! Per announcement the scanner does one scalar multiplication and two hashes
//! to compare view tags, which rejects ~255/256 of foreign announcements.
//! Only on a tag hit does it recompute the full stealth public key. Nothing
//! here can sign: the scanner holds a `ViewingKey`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::amount::Lamports;
use crate::crypto::stealth::{confirm_stealth_pubkey, expected_view_tag};
use crate::crypto::ViewingKey;
use crate::error::StealthResult;
use crate::layout::{Announcement, ANNOUNCEMENT_SIZE};
use crate::pda;
use crate::rpc::ChainRpc;
use crate::store::{BalanceCache, ClaimStatus};

/// Counters for one scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub tag_rejected: usize,
    /// View tag matched but the stealth key did not
    pub tag_collisions: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub skipped_claimed: usize,
    pub skipped_unfinalized: usize,
    pub skipped_empty: usize,
    pub malformed: usize,
    /// Matched, but the vault balance could not be read this pass
    pub balance_unavailable: usize,
}

/// An announcement confirmed to belong to the scanning key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementMatch {
    pub announcement_address: Pubkey,
    pub announcement: Announcement,
    pub vault: Pubkey,
}

/// Funds waiting in a vault that the scanning key can claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClaim {
    pub vault: Pubkey,
    pub announcement: Pubkey,
    pub amount: Lamports,
    pub stealth_pubkey: [u8; 32],
    pub ephemeral_pubkey: [u8; 32],
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub claims: Vec<PendingClaim>,
    pub stats: ScanStats,
}

impl ScanReport {
    pub fn total(&self) -> Lamports {
        Lamports(self.claims.iter().map(|c| c.amount.get()).sum())
    }
}

#[derive(Clone)]
pub struct Scanner {
    viewing_key: ViewingKey,
    program_id: Pubkey,
    balances: Option<BalanceCache>,
}

impl Scanner {
    pub fn new(viewing_key: ViewingKey, program_id: Pubkey) -> Self {
        Self {
            viewing_key,
            program_id,
            balances: None,
        }
    }

    /// Serve vault balances from a short-lived cache (watch mode)
    pub fn with_balance_cache(mut self, cache: BalanceCache) -> Self {
        self.balances = Some(cache);
        self
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Lazily yield the announcements that belong to this key.
    ///
    /// Restartable: a new call starts a new pass. Within one pass a vault is
    /// yielded at most once.
    pub fn matches<I>(&self, announcements: I) -> Matches<'_, I::IntoIter>
    where
        I: IntoIterator<Item = (Pubkey, Announcement)>,
    {
        Matches {
            scanner: self,
            inner: announcements.into_iter(),
            seen: HashSet::new(),
            stats: ScanStats::default(),
        }
    }

    fn check(&self, announcement: &Announcement, stats: &mut ScanStats) -> bool {
        match expected_view_tag(&self.viewing_key, &announcement.ephemeral_pubkey) {
            None => {
                stats.malformed += 1;
                false
            }
            Some(tag) if tag != announcement.view_tag => {
                stats.tag_rejected += 1;
                false
            }
            Some(_) => {
                if confirm_stealth_pubkey(
                    &self.viewing_key,
                    &announcement.ephemeral_pubkey,
                    &announcement.stealth_pubkey,
                ) {
                    true
                } else {
                    stats.tag_collisions += 1;
                    false
                }
            }
        }
    }

    /// Read every announcement from the chain and return funded matches
    pub async fn scan_chain(&self, rpc: &dyn ChainRpc) -> StealthResult<ScanReport> {
        let accounts = rpc.get_program_accounts(&self.program_id, ANNOUNCEMENT_SIZE).await?;
        debug!(count = accounts.len(), "scanning announcements");

        let mut malformed = 0;
        let decoded: Vec<(Pubkey, Announcement)> = accounts
            .into_iter()
            .filter_map(|(address, account)| match Announcement::unpack(&account.data) {
                Ok(announcement) => Some((address, announcement)),
                Err(e) => {
                    debug!(%address, error = %e, "skipping malformed announcement");
                    malformed += 1;
                    None
                }
            })
            .collect();

        let mut matches = self.matches(decoded);
        let found: Vec<AnnouncementMatch> = matches.by_ref().collect();
        let mut stats = matches.stats();
        stats.malformed += malformed;
        stats.scanned += malformed;

        let mut claims = Vec::with_capacity(found.len());
        for m in found {
            let amount = match &self.balances {
                Some(cache) => cache.balance(rpc, &m.vault).await,
                None => rpc.get_balance(&m.vault).await,
            };
            let amount = match amount {
                Ok(amount) => amount,
                Err(e) => {
                    warn!(vault = %m.vault, error = %e, "vault balance unavailable; retrying next pass");
                    stats.balance_unavailable += 1;
                    continue;
                }
            };
            if amount.is_zero() {
                stats.skipped_empty += 1;
                continue;
            }
            claims.push(PendingClaim {
                vault: m.vault,
                announcement: m.announcement_address,
                amount,
                stealth_pubkey: m.announcement.stealth_pubkey,
                ephemeral_pubkey: m.announcement.ephemeral_pubkey,
                status: ClaimStatus::Pending,
            });
        }

        info!(
            scanned = stats.scanned,
            matched = stats.matched,
            claimable = claims.len(),
            "scan complete"
        );
        Ok(ScanReport { claims, stats })
    }

    /// Re-scan every `every` until `cancel` fires, sending each cycle's report.
    ///
    /// Cancellation abandons an in-flight cycle. A failed cycle is logged and
    /// the next tick tries again.
    pub fn watch(
        &self,
        rpc: Arc<dyn ChainRpc>,
        every: Duration,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<ScanReport>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(8);
        let scanner = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let report = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = scanner.scan_chain(rpc.as_ref()) => result,
                };

                match report {
                    Ok(report) => {
                        if tx.send(report).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "scan cycle failed"),
                }
            }
            debug!("scanner stopped");
        });

        (rx, handle)
    }
}

/// Iterator returned by `Scanner::matches`
pub struct Matches<'a, I> {
    scanner: &'a Scanner,
    inner: I,
    seen: HashSet<Pubkey>,
    stats: ScanStats,
}

impl<I> Matches<'_, I> {
    /// Counters so far in this pass
    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

impl<I> Iterator for Matches<'_, I>
where
    I: Iterator<Item = (Pubkey, Announcement)>,
{
    type Item = AnnouncementMatch;

    fn next(&mut self) -> Option<Self::Item> {
        for (address, announcement) in self.inner.by_ref() {
            self.stats.scanned += 1;

            if !self.scanner.check(&announcement, &mut self.stats) {
                continue;
            }
            if announcement.claimed {
                self.stats.skipped_claimed += 1;
                continue;
            }
            if !announcement.finalized {
                self.stats.skipped_unfinalized += 1;
                continue;
            }

            let (vault, _) = pda::vault_address(&self.scanner.program_id, &announcement.stealth_pubkey);
            if !self.seen.insert(vault) {
                self.stats.duplicates += 1;
                continue;
            }

            self.stats.matched += 1;
            return Some(AnnouncementMatch {
                announcement_address: address,
                announcement,
                vault,
            });
        }
        None
    }
}
