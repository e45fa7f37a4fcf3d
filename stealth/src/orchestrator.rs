//! Send / claim orchestration
//!
//! A payment moves through
//!
//! ```text
//! Init → Announced → Deposited → (Mixing →) Executed → Claimable → Claimed
//! ```
//!
//! with `Failed` reachable from every non-terminal state. In private mode the
//! mixer deposit is the last transaction the sender signs; the pool→vault
//! transfer is requested from the relayer and never signed locally. A relayer
//! failure leaves the deposit refundable through `undelegate`.
//!
//! Submissions that time out are never trusted either way: the orchestrator
//! re-reads the affected accounts and continues from what the chain shows.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::amount::{Lamports, MIN_DEPOSIT};
use crate::crypto::{
    derive_stealth_address, recover_one_time_key, StealthAddress, StealthKeyPair, StealthMetaAddress, StealthSigner,
};
use crate::error::{StealthError, StealthResult};
use crate::instruction;
use crate::layout::{Announcement, DepositRecord};
use crate::pda;
use crate::relay::{ClaimRequest, MixerTransferRequest, PrivacyRelay, RelayError, RelayResponse};
use crate::rpc::{build_signed, confirm_within, ChainRpc};
use crate::scanner::PendingClaim;
use crate::store::{BalanceCache, ClaimStatus, ClaimTracker};
use crate::wallet::WalletSigner;

/// Lamports kept aside for fees and rent when checking the sender's balance
pub const SEND_FEE_RESERVE: Lamports = Lamports(10_000_000);

const CLAIM_WAIT_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentState {
    Init,
    Announced,
    Deposited,
    Mixing,
    Executed,
    Claimable,
    Claimed,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Claimed | PaymentState::Failed)
    }

    pub fn can_transition_to(self, next: PaymentState) -> bool {
        use PaymentState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Announced)
                | (Announced, Deposited)
                | (Deposited, Mixing)
                | (Deposited, Executed)
                | (Mixing, Executed)
                | (Executed, Claimable)
                | (Executed, Claimed)
                | (Claimable, Claimed)
        )
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentState::Init => "init",
            PaymentState::Announced => "announced",
            PaymentState::Deposited => "deposited",
            PaymentState::Mixing => "mixing",
            PaymentState::Executed => "executed",
            PaymentState::Claimable => "claimable",
            PaymentState::Claimed => "claimed",
            PaymentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Deposit straight into the vault
    Direct,
    /// Deposit into the mixing pool; the relayer moves it to the vault
    Private,
}

/// How a failed payment gets its funds back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Refund the unexecuted mixer deposit to the depositor
    Undelegate { nonce: [u8; 32] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from: PaymentState,
    pub to: PaymentState,
    pub at: DateTime<Utc>,
}

/// One outgoing payment, from announcement to claim
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub nonce: [u8; 32],
    pub mode: SendMode,
    pub address: StealthAddress,
    pub amount: Lamports,
    pub announcement: Pubkey,
    pub vault: Pubkey,
    pub announce_signature: Option<Signature>,
    pub deposit_signature: Option<Signature>,
    pub mix_signature: Option<Signature>,
    pub recovery: Option<Recovery>,
    pub failure: Option<String>,
    state: PaymentState,
    history: Vec<TransitionRecord>,
}

impl PaymentSession {
    pub fn new(program_id: &Pubkey, nonce: [u8; 32], mode: SendMode, address: StealthAddress, amount: Lamports) -> Self {
        Self {
            nonce,
            mode,
            address,
            amount,
            announcement: pda::announcement_address(program_id, &nonce).0,
            vault: pda::vault_address(program_id, &address.stealth_pubkey).0,
            announce_signature: None,
            deposit_signature: None,
            mix_signature: None,
            recovery: None,
            failure: None,
            state: PaymentState::Init,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn transition(&mut self, to: PaymentState) -> StealthResult<()> {
        let direct_skip = self.state == PaymentState::Deposited && to == PaymentState::Executed;
        let mixing_in_direct = to == PaymentState::Mixing && self.mode == SendMode::Direct;
        let invalid_for_mode = (direct_skip && self.mode == SendMode::Private) || mixing_in_direct;

        if !self.state.can_transition_to(to) || invalid_for_mode {
            return Err(StealthError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        debug!(from = %self.state, %to, "payment transition");
        self.history.push(TransitionRecord {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }

    fn fail(&mut self, reason: String, recovery: Option<Recovery>) -> StealthResult<()> {
        self.transition(PaymentState::Failed)?;
        self.failure = Some(reason);
        self.recovery = recovery;
        Ok(())
    }
}

// ============================================================================
// Claims
// ============================================================================

/// How the claim transaction reaches the chain
pub enum ClaimMode<'a> {
    /// The given wallet submits and pays the fee
    Direct(&'a dyn WalletSigner),
    /// The relayer submits; the recipient's wallet never appears on chain
    Relayed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { signature: Signature, amount: Lamports },
    /// The vault was already drained. Counts as success.
    AlreadyClaimed,
}

/// What the chain currently says about a submitted step
enum StepCheck {
    AnnouncementExists(Pubkey),
    AnnouncementFinalized(Pubkey),
    DepositRecorded(Pubkey),
}

/// Holds a vault's `Claiming` marker. Dropped unfinished (a cancelled claim
/// future), it releases the marker as `Failed` so later claims are not
/// blocked until the marker expires.
struct ClaimGuard {
    claims: ClaimTracker,
    vault: Pubkey,
    finished: bool,
}

impl ClaimGuard {
    fn new(claims: ClaimTracker, vault: Pubkey) -> Self {
        Self {
            claims,
            vault,
            finished: false,
        }
    }

    async fn finish(mut self, status: ClaimStatus) -> StealthResult<()> {
        self.finished = true;
        self.claims.mark(&self.vault, status).await
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let claims = self.claims.clone();
        let vault = self.vault;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = claims.release(&vault).await {
                        warn!(%vault, error = %e, "failed to release abandoned claim");
                    }
                });
            }
            Err(_) => warn!(%vault, "claim abandoned outside a runtime; marker expires with its ttl"),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    rpc: Arc<dyn ChainRpc>,
    relay: Option<Arc<dyn PrivacyRelay>>,
    program_id: Pubkey,
    confirm_timeout: Duration,
    claims: ClaimTracker,
    balances: Option<BalanceCache>,
}

impl Orchestrator {
    pub fn new(rpc: Arc<dyn ChainRpc>, program_id: Pubkey, claims: ClaimTracker, confirm_timeout: Duration) -> Self {
        Self {
            rpc,
            relay: None,
            program_id,
            confirm_timeout,
            claims,
            balances: None,
        }
    }

    pub fn with_relay(mut self, relay: Arc<dyn PrivacyRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Drop a vault's cached balance once its claim settles, so a scanner
    /// sharing `cache` stops reporting it
    pub fn with_balance_cache(mut self, cache: BalanceCache) -> Self {
        self.balances = Some(cache);
        self
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    fn relay(&self) -> StealthResult<&dyn PrivacyRelay> {
        self.relay
            .as_deref()
            .ok_or_else(|| StealthError::Config("no relayer configured".into()))
    }

    // ------------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------------

    /// Pay `amount` to `recipient`.
    ///
    /// Errors before the deposit confirms leave no funds at risk. Once funds
    /// moved, relayer problems are reported through the returned session
    /// (`Failed` + `Recovery`), not as an error.
    pub async fn send(
        &self,
        wallet: &dyn WalletSigner,
        recipient: &StealthMetaAddress,
        amount: Lamports,
        mode: SendMode,
    ) -> StealthResult<PaymentSession> {
        if amount < MIN_DEPOSIT {
            return Err(StealthError::InvalidAmount(format!(
                "{} is below the minimum deposit of {}",
                amount, MIN_DEPOSIT
            )));
        }
        recipient.validate()?;
        if mode == SendMode::Private {
            self.relay()?;
        }

        let sender = wallet.pubkey();
        let required = amount
            .checked_add(SEND_FEE_RESERVE)
            .ok_or_else(|| StealthError::InvalidAmount("amount overflows".into()))?;
        let balance = self.rpc.get_balance(&sender).await?;
        if balance < required {
            return Err(StealthError::InvalidAmount(format!(
                "insufficient balance: have {}, need {} plus fees",
                balance, amount
            )));
        }

        let address = derive_stealth_address(&recipient.spend_pubkey, &recipient.view_pubkey)?;
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        let mut session = PaymentSession::new(&self.program_id, nonce, mode, address, amount);

        info!(vault = %session.vault, %amount, ?mode, "starting stealth payment");

        let announce = instruction::publish_announcement(&self.program_id, &sender, &nonce, &address);
        let signature = self
            .submit(wallet, &[announce], StepCheck::AnnouncementExists(session.announcement))
            .await?;
        session.announce_signature = Some(signature);
        session.transition(PaymentState::Announced)?;

        match mode {
            SendMode::Direct => {
                let ix = instruction::deposit(&self.program_id, &sender, &nonce, &address.stealth_pubkey, amount);
                let signature = self
                    .submit(wallet, &[ix], StepCheck::AnnouncementFinalized(session.announcement))
                    .await?;
                session.deposit_signature = Some(signature);
                session.transition(PaymentState::Deposited)?;
                session.transition(PaymentState::Executed)?;
            }
            SendMode::Private => {
                let ix = instruction::deposit_to_mixer(&self.program_id, &sender, &nonce, &address, amount);
                let (record, _) = pda::mixer_deposit_address(&self.program_id, &nonce);
                let signature = self.submit(wallet, &[ix], StepCheck::DepositRecorded(record)).await?;
                session.deposit_signature = Some(signature);
                session.transition(PaymentState::Deposited)?;

                self.request_mix(&mut session, signature).await?;
            }
        }

        info!(vault = %session.vault, state = %session.state(), "payment submitted");
        Ok(session)
    }

    async fn request_mix(&self, session: &mut PaymentSession, deposit_signature: Signature) -> StealthResult<()> {
        session.transition(PaymentState::Mixing)?;

        let request = MixerTransferRequest::new(
            &session.nonce,
            &session.announcement,
            &session.vault,
            &session.address.stealth_pubkey,
            &deposit_signature,
        );
        let failure = match self.relay()?.execute_mixer_transfer(&request).await {
            Ok(RelayResponse {
                success: true,
                signature,
                ..
            }) => {
                session.mix_signature = signature.and_then(|s| s.parse().ok());
                session.transition(PaymentState::Executed)?;
                return Ok(());
            }
            Ok(response) => response
                .error
                .unwrap_or_else(|| "relayer reported failure".to_string()),
            Err(e) => e.to_string(),
        };

        // The relayer may have executed even though we never saw its answer
        let executed = match self.deposit_executed(&session.nonce).await {
            Ok(executed) => executed,
            Err(e) => {
                warn!(vault = %session.vault, error = %e, "could not re-read mixer deposit; treating as unexecuted");
                false
            }
        };
        if executed {
            info!(vault = %session.vault, "mixer transfer found executed on chain");
            session.transition(PaymentState::Executed)?;
            return Ok(());
        }

        warn!(
            vault = %session.vault,
            error = %failure,
            "mixer transfer failed; deposit can be recovered with undelegate"
        );
        session.fail(failure, Some(Recovery::Undelegate { nonce: session.nonce }))
    }

    async fn deposit_executed(&self, nonce: &[u8; 32]) -> StealthResult<bool> {
        let (record, _) = pda::mixer_deposit_address(&self.program_id, nonce);
        match self.rpc.get_account(&record).await? {
            Some(account) => Ok(DepositRecord::unpack(&account.data)?.executed),
            None => Ok(false),
        }
    }

    /// Sign, submit and confirm. On a transient error, re-read the chain and
    /// accept the step if it landed anyway.
    async fn submit(&self, wallet: &dyn WalletSigner, ixs: &[Instruction], check: StepCheck) -> StealthResult<Signature> {
        let tx = build_signed(self.rpc.as_ref(), wallet, ixs).await?;
        let signature = tx.signatures.first().copied().unwrap_or_default();

        match confirm_within(self.rpc.as_ref(), &tx, self.confirm_timeout).await {
            Ok(signature) => Ok(signature),
            Err(e) if e.is_retryable() => {
                if self.step_landed(&check).await? {
                    warn!(%signature, error = %e, "confirmation lost but step is on chain");
                    Ok(signature)
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn step_landed(&self, check: &StepCheck) -> StealthResult<bool> {
        match check {
            StepCheck::AnnouncementExists(address) => Ok(self.rpc.get_account(address).await?.is_some()),
            StepCheck::AnnouncementFinalized(address) => match self.rpc.get_account(address).await? {
                Some(account) => Ok(Announcement::unpack(&account.data)?.finalized),
                None => Ok(false),
            },
            StepCheck::DepositRecorded(address) => Ok(self.rpc.get_account(address).await?.is_some()),
        }
    }

    /// Advance an executed payment to `Claimable` / `Claimed` from chain state
    pub async fn refresh(&self, session: &mut PaymentSession) -> StealthResult<PaymentState> {
        if !matches!(session.state(), PaymentState::Executed | PaymentState::Claimable) {
            return Ok(session.state());
        }
        match self.resolve_claim_status(&session.vault, &session.announcement).await? {
            ClaimStatus::Claimed => session.transition(PaymentState::Claimed)?,
            _ if session.state() == PaymentState::Executed => session.transition(PaymentState::Claimable)?,
            _ => {}
        }
        Ok(session.state())
    }

    /// Refund an unexecuted mixer deposit to its depositor
    pub async fn undelegate(&self, wallet: &dyn WalletSigner, nonce: &[u8; 32]) -> StealthResult<Signature> {
        let (record_address, _) = pda::mixer_deposit_address(&self.program_id, nonce);
        let account = self
            .rpc
            .get_account(&record_address)
            .await?
            .ok_or_else(|| StealthError::AccountNotFound(format!("mixer deposit {}", record_address)))?;
        let record = DepositRecord::unpack(&account.data)?;

        if !record.can_undelegate() {
            return Err(StealthError::AlreadyExecuted);
        }
        if record.depositor != wallet.pubkey().to_bytes() {
            return Err(StealthError::InvalidInput(format!(
                "deposit {} belongs to {}",
                record_address,
                Pubkey::new_from_array(record.depositor)
            )));
        }

        let ix = instruction::undelegate(&self.program_id, &wallet.pubkey(), nonce);
        let tx = build_signed(self.rpc.as_ref(), wallet, &[ix]).await?;
        let signature = confirm_within(self.rpc.as_ref(), &tx, self.confirm_timeout).await?;
        info!(record = %record_address, amount = %record.amount, "mixer deposit refunded");
        Ok(signature)
    }

    // ------------------------------------------------------------------------
    // Claim
    // ------------------------------------------------------------------------

    /// Chain view of a vault: `Claimed` once drained or flagged, else `Pending`
    pub async fn resolve_claim_status(&self, vault: &Pubkey, announcement: &Pubkey) -> StealthResult<ClaimStatus> {
        if let Some(account) = self.rpc.get_account(announcement).await? {
            if Announcement::unpack(&account.data)?.claimed {
                return Ok(ClaimStatus::Claimed);
            }
        }
        if self.rpc.get_balance(vault).await?.is_zero() {
            return Ok(ClaimStatus::Claimed);
        }
        Ok(ClaimStatus::Pending)
    }

    /// Drain `claim`'s vault to `destination`.
    ///
    /// Claiming an already-empty vault is `AlreadyClaimed`, not an error, so
    /// two scanners racing for the same vault both succeed.
    pub async fn claim(
        &self,
        keys: &StealthKeyPair,
        claim: &mut PendingClaim,
        destination: &Pubkey,
        mode: ClaimMode<'_>,
    ) -> StealthResult<ClaimOutcome> {
        let one_time = recover_one_time_key(keys, &claim.ephemeral_pubkey, &claim.stealth_pubkey)
            .ok_or_else(|| StealthError::InvalidKey("payment does not belong to these keys".into()))?;
        let (vault, _) = pda::vault_address(&self.program_id, &claim.stealth_pubkey);
        if vault != claim.vault {
            return Err(StealthError::InvalidInput(format!(
                "vault {} does not match stealth key (expected {})",
                claim.vault, vault
            )));
        }
        if matches!(mode, ClaimMode::Relayed) {
            self.relay()?;
        }

        let guard = match self.acquire_claim(&vault, &claim.announcement).await? {
            Some(guard) => guard,
            None => {
                self.forget_balance(&vault).await;
                claim.status = ClaimStatus::Claimed;
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
        };
        claim.status = ClaimStatus::Claiming;

        let result = self.submit_claim(&one_time.create_signer()?, claim, destination, mode).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => match self.resolve_claim_status(&vault, &claim.announcement).await {
                Ok(ClaimStatus::Claimed) => {
                    info!(%vault, error = %e, "claim submission failed but vault is drained");
                    ClaimOutcome::AlreadyClaimed
                }
                _ => {
                    claim.status = ClaimStatus::Failed;
                    guard.finish(ClaimStatus::Failed).await?;
                    return Err(e);
                }
            },
        };

        guard.finish(ClaimStatus::Claimed).await?;
        self.forget_balance(&vault).await;
        claim.status = ClaimStatus::Claimed;
        Ok(outcome)
    }

    async fn forget_balance(&self, vault: &Pubkey) {
        if let Some(cache) = &self.balances {
            if let Err(e) = cache.invalidate(vault).await {
                warn!(%vault, error = %e, "failed to drop cached vault balance");
            }
        }
    }

    /// Single-flight per vault. `None` when the vault is already claimed,
    /// either in this tracker or on chain.
    ///
    /// While another claim holds the vault the chain is re-read on every
    /// wait, so a vault drained elsewhere resolves without waiting out the
    /// marker.
    async fn acquire_claim(&self, vault: &Pubkey, announcement: &Pubkey) -> StealthResult<Option<ClaimGuard>> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            if self.claims.begin(vault).await? {
                return Ok(Some(ClaimGuard::new(self.claims.clone(), *vault)));
            }
            if self.claims.status(vault).await? == Some(ClaimStatus::Claimed) {
                debug!(%vault, "vault already claimed in this session");
                return Ok(None);
            }
            if self.resolve_claim_status(vault, announcement).await? == ClaimStatus::Claimed {
                debug!(%vault, "vault drained while another claim held it");
                self.claims.mark(vault, ClaimStatus::Claimed).await?;
                return Ok(None);
            }
            if Instant::now() >= deadline {
                return Err(StealthError::Timeout(format!("claim of {} in progress elsewhere", vault)));
            }
            tokio::time::sleep(CLAIM_WAIT_INTERVAL).await;
        }
    }

    async fn submit_claim(
        &self,
        signer: &StealthSigner,
        claim: &PendingClaim,
        destination: &Pubkey,
        mode: ClaimMode<'_>,
    ) -> StealthResult<ClaimOutcome> {
        let balance = self.rpc.get_balance(&claim.vault).await?;
        if balance.is_zero() {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let (signature, destination_hash) = signer.sign_claim(&claim.vault, destination);

        match mode {
            ClaimMode::Direct(wallet) => {
                let ix = instruction::claim_stealth_payment(
                    &self.program_id,
                    &wallet.pubkey(),
                    &claim.announcement,
                    destination,
                    &claim.stealth_pubkey,
                    signature,
                    destination_hash,
                );
                let tx = build_signed(self.rpc.as_ref(), wallet, &[ix]).await?;
                let tx_signature = confirm_within(self.rpc.as_ref(), &tx, self.confirm_timeout).await?;
                info!(vault = %claim.vault, amount = %balance, %tx_signature, "claimed");
                Ok(ClaimOutcome::Claimed {
                    signature: tx_signature,
                    amount: balance,
                })
            }
            ClaimMode::Relayed => {
                let request = ClaimRequest::new(
                    &claim.vault,
                    &claim.announcement,
                    destination,
                    &claim.stealth_pubkey,
                    &signature,
                    &destination_hash,
                );
                let response = self.relay()?.submit_claim(&request).await?;
                if !response.success {
                    return Err(StealthError::Relayer(
                        response.error.unwrap_or_else(|| "claim rejected".to_string()),
                    ));
                }
                let tx_signature = response
                    .signature
                    .as_deref()
                    .and_then(|s| s.parse::<Signature>().ok())
                    .ok_or_else(|| {
                        StealthError::from(RelayError::MalformedResponse("claim succeeded without a signature".into()))
                    })?;
                let amount = response.amount.unwrap_or(balance);
                info!(vault = %claim.vault, %amount, %tx_signature, "claimed via relayer");
                Ok(ClaimOutcome::Claimed {
                    signature: tx_signature,
                    amount,
                })
            }
        }
    }
}
