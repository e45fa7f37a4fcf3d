//! In-memory ledger and relayer used by the scenario tests
//!
//! `FakeLedger` executes stealth program instructions against a map of
//! accounts with the same account rules the program enforces: PDA checks,
//! signer checks, claim signature verification, atomic transactions and a
//! flat fee per transaction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_program,
    transaction::Transaction,
};

use crate::amount::Lamports;
use crate::crypto::{destination_hash, StealthSigner};
use crate::error::{StealthError, StealthResult};
use crate::instruction::{self, StealthInstruction, TEE_PROOF_SIZE};
use crate::layout::{Announcement, DepositRecord, RegistryEntry};
use crate::pda;
use crate::relay::{ClaimRequest, MixerTransferRequest, PrivacyRelay, RelayError, RelayResponse};
use crate::rpc::ChainRpc;

pub const TX_FEE: Lamports = Lamports(5_000);

pub fn program_id() -> Pubkey {
    crate::config::DEFAULT_PROGRAM_ID.parse().unwrap()
}

pub struct FakeLedger {
    program_id: Pubkey,
    relayer: Keypair,
    accounts: Mutex<HashMap<Pubkey, Account>>,
    submitted: AtomicUsize,
    lose_confirmations: AtomicUsize,
    stall_submissions: AtomicUsize,
    fail_balance_reads: AtomicUsize,
    fail_account_reads: AtomicUsize,
}

type Accounts = HashMap<Pubkey, Account>;

impl FakeLedger {
    pub fn new(program_id: Pubkey) -> Self {
        let ledger = Self {
            program_id,
            relayer: Keypair::new(),
            accounts: Mutex::new(HashMap::new()),
            submitted: AtomicUsize::new(0),
            lose_confirmations: AtomicUsize::new(0),
            stall_submissions: AtomicUsize::new(0),
            fail_balance_reads: AtomicUsize::new(0),
            fail_account_reads: AtomicUsize::new(0),
        };
        ledger.fund(&ledger.relayer.pubkey(), Lamports(10_000_000_000));
        ledger
    }

    pub fn fund(&self, address: &Pubkey, amount: Lamports) {
        let mut accounts = self.accounts.lock().unwrap();
        credit(&mut accounts, address, amount, system_program::id());
    }

    pub fn balance(&self, address: &Pubkey) -> Lamports {
        let accounts = self.accounts.lock().unwrap();
        Lamports(accounts.get(address).map(|a| a.lamports).unwrap_or(0))
    }

    /// Store raw program-owned data, bypassing instruction checks
    pub fn insert_raw(&self, address: Pubkey, data: Vec<u8>) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.insert(address, program_account(self.program_id, data));
    }

    pub fn announcement(&self, nonce: &[u8; 32]) -> Option<Announcement> {
        let (address, _) = pda::announcement_address(&self.program_id, nonce);
        let accounts = self.accounts.lock().unwrap();
        accounts.get(&address).map(|a| Announcement::unpack(&a.data).unwrap())
    }

    pub fn deposit_record(&self, nonce: &[u8; 32]) -> Option<DepositRecord> {
        let (address, _) = pda::mixer_deposit_address(&self.program_id, nonce);
        let accounts = self.accounts.lock().unwrap();
        accounts.get(&address).map(|a| DepositRecord::unpack(&a.data).unwrap())
    }

    pub fn relayer_pubkey(&self) -> Pubkey {
        self.relayer.pubkey()
    }

    /// Transactions that reached the ledger, including rejected ones
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// The next `n` transactions land but their confirmation is lost
    pub fn lose_next_confirmations(&self, n: usize) {
        self.lose_confirmations.store(n, Ordering::SeqCst);
    }

    /// The next `n` submissions never confirm and never land
    pub fn stall_next_submissions(&self, n: usize) {
        self.stall_submissions.store(n, Ordering::SeqCst);
    }

    /// The next `n` balance reads fail with an RPC error
    pub fn fail_next_balance_reads(&self, n: usize) {
        self.fail_balance_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_account_reads(&self, n: usize) {
        self.fail_account_reads.store(n, Ordering::SeqCst);
    }

    /// Submit an instruction list paid and signed by the relayer authority
    pub async fn submit_as_relayer(&self, instructions: &[Instruction]) -> StealthResult<Signature> {
        let payer = self.relayer.pubkey();
        let tx = Transaction::new_signed_with_payer(instructions, Some(&payer), &[&self.relayer], Hash::default());
        self.send_and_confirm(&tx).await
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn execute(&self, tx: &Transaction) -> Result<(), String> {
        tx.verify().map_err(|e| format!("signature verification failed: {}", e))?;

        let message = &tx.message;
        let signers = &message.account_keys[..message.header.num_required_signatures as usize];
        let payer = message.account_keys[0];

        let mut accounts = self.accounts.lock().unwrap();
        let mut working = accounts.clone();
        debit(&mut working, &payer, TX_FEE)?;

        for compiled in &message.instructions {
            let program = message.account_keys[compiled.program_id_index as usize];
            if program != self.program_id {
                return Err(format!("unknown program {}", program));
            }
            let keys: Vec<Pubkey> = compiled
                .accounts
                .iter()
                .map(|&i| message.account_keys[i as usize])
                .collect();
            let authority = *keys.first().ok_or("missing accounts")?;
            if !signers.contains(&authority) {
                return Err(format!("{} did not sign", authority));
            }
            let ix = StealthInstruction::unpack(&compiled.data).map_err(|e| e.to_string())?;
            self.apply(&mut working, &keys, ix)?;
        }

        *accounts = working;
        Ok(())
    }

    fn apply(&self, accounts: &mut Accounts, keys: &[Pubkey], ix: StealthInstruction) -> Result<(), String> {
        let program_id = &self.program_id;
        let key = |i: usize| keys.get(i).copied().ok_or_else(|| format!("missing account {}", i));

        match ix {
            StealthInstruction::RegisterKeys {
                spend_pubkey,
                view_pubkey,
                kem_len,
            } => {
                let owner = key(0)?;
                let (registry, bump) = pda::registry_address(program_id, &owner);
                expect_key(key(1)?, registry)?;
                if accounts.contains_key(&registry) {
                    return Err("registry entry already exists".into());
                }
                let entry = RegistryEntry {
                    owner: owner.to_bytes(),
                    spend_pubkey,
                    view_pubkey,
                    finalized: false,
                    bump,
                    kem_pubkey: vec![0u8; kem_len as usize],
                };
                accounts.insert(registry, program_account(*program_id, entry.pack().map_err(|e| e.to_string())?));
            }
            StealthInstruction::UploadKeyChunk { offset, bytes } => {
                let owner = key(0)?;
                let (registry, _) = pda::registry_address(program_id, &owner);
                expect_key(key(1)?, registry)?;
                let mut entry = read(accounts, &registry, RegistryEntry::unpack)?;
                let start = offset as usize;
                let end = start + bytes.len();
                if entry.finalized || end > entry.kem_pubkey.len() {
                    return Err("chunk rejected".into());
                }
                entry.kem_pubkey[start..end].copy_from_slice(&bytes);
                write(accounts, &registry, entry.pack().map_err(|e| e.to_string())?);
            }
            StealthInstruction::FinalizeRegistry => {
                let owner = key(0)?;
                let (registry, _) = pda::registry_address(program_id, &owner);
                expect_key(key(1)?, registry)?;
                let mut entry = read(accounts, &registry, RegistryEntry::unpack)?;
                entry.finalized = true;
                write(accounts, &registry, entry.pack().map_err(|e| e.to_string())?);
            }
            StealthInstruction::PublishAnnouncement {
                nonce,
                ephemeral_pubkey,
                stealth_pubkey,
                view_tag,
            } => {
                let (address, bump) = pda::announcement_address(program_id, &nonce);
                expect_key(key(1)?, address)?;
                if accounts.contains_key(&address) {
                    return Err("announcement already exists".into());
                }
                let announcement = Announcement {
                    nonce,
                    ephemeral_pubkey,
                    stealth_pubkey,
                    view_tag,
                    bump,
                    finalized: false,
                    claimed: false,
                };
                accounts.insert(address, program_account(*program_id, announcement.pack()));
            }
            StealthInstruction::Deposit { nonce, amount } => {
                let sender = key(0)?;
                let (address, _) = pda::announcement_address(program_id, &nonce);
                expect_key(key(1)?, address)?;
                let mut announcement = read(accounts, &address, Announcement::unpack)?;
                if announcement.finalized {
                    return Err("announcement already finalized".into());
                }
                let (vault, _) = pda::vault_address(program_id, &announcement.stealth_pubkey);
                expect_key(key(2)?, vault)?;

                debit(accounts, &sender, amount)?;
                credit(accounts, &vault, amount, *program_id);
                announcement.finalized = true;
                write(accounts, &address, announcement.pack());
            }
            StealthInstruction::DepositToMixer {
                nonce,
                amount,
                stealth_pubkey,
                ephemeral_pubkey,
                view_tag,
            } => {
                let depositor = key(0)?;
                let (record_address, bump) = pda::mixer_deposit_address(program_id, &nonce);
                let (pool, _) = pda::mixer_pool_address(program_id);
                expect_key(key(1)?, record_address)?;
                expect_key(key(2)?, pool)?;
                if accounts.contains_key(&record_address) {
                    return Err("deposit record already exists".into());
                }

                debit(accounts, &depositor, amount)?;
                credit(accounts, &pool, amount, *program_id);
                let record = DepositRecord {
                    nonce,
                    amount,
                    depositor: depositor.to_bytes(),
                    stealth_pubkey,
                    ephemeral_pubkey,
                    view_tag,
                    executed: false,
                    delegated: true,
                    bump,
                };
                accounts.insert(record_address, program_account(*program_id, record.pack()));
            }
            StealthInstruction::ExecuteMixerTransfer { nonce, .. } => {
                if key(0)? != self.relayer.pubkey() {
                    return Err("only the relayer may execute mixer transfers".into());
                }
                let (record_address, _) = pda::mixer_deposit_address(program_id, &nonce);
                let (pool, _) = pda::mixer_pool_address(program_id);
                let (announcement_address, _) = pda::announcement_address(program_id, &nonce);
                expect_key(key(1)?, record_address)?;
                expect_key(key(2)?, pool)?;
                expect_key(key(3)?, announcement_address)?;

                let mut record = read(accounts, &record_address, DepositRecord::unpack)?;
                if record.executed {
                    return Err("deposit already executed".into());
                }
                let mut announcement = read(accounts, &announcement_address, Announcement::unpack)?;
                if announcement.stealth_pubkey != record.stealth_pubkey {
                    return Err("announcement does not match deposit".into());
                }
                let (vault, _) = pda::vault_address(program_id, &record.stealth_pubkey);
                expect_key(key(4)?, vault)?;

                debit(accounts, &pool, record.amount)?;
                credit(accounts, &vault, record.amount, *program_id);
                record.executed = true;
                record.delegated = false;
                announcement.finalized = true;
                write(accounts, &record_address, record.pack());
                write(accounts, &announcement_address, announcement.pack());
            }
            StealthInstruction::ClaimStealthPayment {
                stealth_pubkey,
                signature,
                destination_hash: hash,
            } => {
                let (vault, _) = pda::vault_address(program_id, &stealth_pubkey);
                expect_key(key(1)?, vault)?;
                let announcement_address = key(2)?;
                let destination = key(3)?;

                let mut announcement = read(accounts, &announcement_address, Announcement::unpack)?;
                if announcement.stealth_pubkey != stealth_pubkey || !announcement.finalized {
                    return Err("announcement does not cover this vault".into());
                }
                if hash != destination_hash(&destination) {
                    return Err("destination hash mismatch".into());
                }
                if !StealthSigner::verify_claim(&stealth_pubkey, &vault, &hash, &signature) {
                    return Err("invalid claim signature".into());
                }
                let amount = Lamports(accounts.get(&vault).map(|a| a.lamports).unwrap_or(0));
                if amount.is_zero() {
                    return Err("vault is empty".into());
                }

                debit(accounts, &vault, amount)?;
                credit(accounts, &destination, amount, system_program::id());
                announcement.claimed = true;
                write(accounts, &announcement_address, announcement.pack());
            }
            StealthInstruction::Undelegate { nonce } => {
                let depositor = key(0)?;
                let (record_address, _) = pda::mixer_deposit_address(program_id, &nonce);
                let (pool, _) = pda::mixer_pool_address(program_id);
                expect_key(key(1)?, record_address)?;
                expect_key(key(2)?, pool)?;

                let record = read(accounts, &record_address, DepositRecord::unpack)?;
                if record.depositor != depositor.to_bytes() {
                    return Err("not the depositor".into());
                }
                if !record.can_undelegate() {
                    return Err("deposit already executed".into());
                }
                debit(accounts, &pool, record.amount)?;
                credit(accounts, &depositor, record.amount, system_program::id());
                accounts.remove(&record_address);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for FakeLedger {
    async fn get_account(&self, address: &Pubkey) -> StealthResult<Option<Account>> {
        tokio::task::yield_now().await;
        if Self::take(&self.fail_account_reads) {
            return Err(StealthError::Rpc("account read timed out".into()));
        }
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_balance(&self, address: &Pubkey) -> StealthResult<Lamports> {
        tokio::task::yield_now().await;
        if Self::take(&self.fail_balance_reads) {
            return Err(StealthError::Rpc("balance read timed out".into()));
        }
        Ok(self.balance(address))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> StealthResult<Vec<(Pubkey, Account)>> {
        tokio::task::yield_now().await;
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .iter()
            .filter(|(_, a)| a.owner == *program_id && a.data.len() == data_size)
            .map(|(k, a)| (*k, a.clone()))
            .collect())
    }

    async fn latest_blockhash(&self) -> StealthResult<Hash> {
        Ok(Hash::default())
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> StealthResult<Signature> {
        tokio::task::yield_now().await;
        self.submitted.fetch_add(1, Ordering::SeqCst);

        if Self::take(&self.stall_submissions) {
            std::future::pending::<()>().await;
        }

        self.execute(tx).map_err(StealthError::TransactionFailed)?;
        tokio::task::yield_now().await;

        if Self::take(&self.lose_confirmations) {
            return Err(StealthError::Rpc("connection reset while confirming".into()));
        }
        Ok(tx.signatures[0])
    }
}

fn program_account(owner: Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 0,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn expect_key(actual: Pubkey, expected: Pubkey) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected account {}, got {}", expected, actual))
    }
}

fn read<T>(accounts: &Accounts, address: &Pubkey, unpack: fn(&[u8]) -> StealthResult<T>) -> Result<T, String> {
    let account = accounts
        .get(address)
        .ok_or_else(|| format!("account {} not found", address))?;
    unpack(&account.data).map_err(|e| e.to_string())
}

fn write(accounts: &mut Accounts, address: &Pubkey, data: Vec<u8>) {
    if let Some(account) = accounts.get_mut(address) {
        account.data = data;
    }
}

fn debit(accounts: &mut Accounts, address: &Pubkey, amount: Lamports) -> Result<(), String> {
    let account = accounts
        .get_mut(address)
        .ok_or_else(|| format!("{} has no funds", address))?;
    account.lamports = account
        .lamports
        .checked_sub(amount.get())
        .ok_or_else(|| format!("insufficient funds in {}", address))?;
    if account.lamports == 0 && account.data.is_empty() {
        accounts.remove(address);
    }
    Ok(())
}

fn credit(accounts: &mut Accounts, address: &Pubkey, amount: Lamports, owner: Pubkey) {
    accounts
        .entry(*address)
        .or_insert_with(|| program_account(owner, Vec::new()))
        .lamports += amount.get();
}

/// Relayer that executes against a `FakeLedger` with its own authority
pub struct FakeRelayer {
    ledger: Arc<FakeLedger>,
    failing: AtomicBool,
    outage: AtomicBool,
    pub mix_requests: Mutex<Vec<MixerTransferRequest>>,
    pub claim_requests: Mutex<Vec<ClaimRequest>>,
}

impl FakeRelayer {
    pub fn new(ledger: Arc<FakeLedger>) -> Self {
        Self {
            ledger,
            failing: AtomicBool::new(false),
            outage: AtomicBool::new(false),
            mix_requests: Mutex::new(Vec::new()),
            claim_requests: Mutex::new(Vec::new()),
        }
    }

    /// Report every request as failed without touching the ledger
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail every request and take the ledger's next account read down too
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
        self.set_failing(outage);
    }

    fn bad_request(e: StealthError) -> RelayError {
        RelayError::Status {
            status: 400,
            body: e.to_string(),
        }
    }

    fn respond(result: StealthResult<Signature>) -> RelayResponse {
        match result {
            Ok(signature) => RelayResponse::ok(signature.to_string()),
            Err(e) => RelayResponse::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl PrivacyRelay for FakeRelayer {
    async fn execute_mixer_transfer(&self, request: &MixerTransferRequest) -> Result<RelayResponse, RelayError> {
        self.mix_requests.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            if self.outage.load(Ordering::SeqCst) {
                self.ledger.fail_next_account_reads(1);
            }
            return Ok(RelayResponse::failed("TEE attestation unavailable"));
        }

        let nonce = request.nonce_bytes().map_err(Self::bad_request)?;
        let stealth_pubkey = request.stealth_pubkey_bytes().map_err(Self::bad_request)?;
        let ix = instruction::execute_mixer_transfer(
            &self.ledger.program_id,
            &self.ledger.relayer_pubkey(),
            &nonce,
            &stealth_pubkey,
            [7u8; TEE_PROOF_SIZE],
        );
        Ok(Self::respond(self.ledger.submit_as_relayer(&[ix]).await))
    }

    async fn submit_claim(&self, request: &ClaimRequest) -> Result<RelayResponse, RelayError> {
        self.claim_requests.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Ok(RelayResponse::failed("relayer is paused"));
        }

        let parse = |value: &str| {
            value
                .parse::<Pubkey>()
                .map_err(|e| RelayError::Status { status: 400, body: e.to_string() })
        };
        let vault = parse(&request.vault_pda)?;
        let announcement = parse(&request.announcement_pda)?;
        let destination = parse(&request.destination)?;
        let stealth_pubkey = request.stealth_pubkey_bytes().map_err(Self::bad_request)?;

        let amount = self.ledger.balance(&vault);
        let ix = instruction::claim_stealth_payment(
            &self.ledger.program_id,
            &self.ledger.relayer_pubkey(),
            &announcement,
            &destination,
            &stealth_pubkey,
            request.signature_bytes().map_err(Self::bad_request)?,
            request.destination_hash_bytes().map_err(Self::bad_request)?,
        );
        let mut response = Self::respond(self.ledger.submit_as_relayer(&[ix]).await);
        if response.success {
            response.amount = Some(amount);
        }
        Ok(response)
    }
}
