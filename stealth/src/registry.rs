//! On-chain key registry
//!
//! Publishes a wallet's meta-address so senders can look it up by wallet
//! address. The ML-KEM public key (1184 bytes) does not fit one transaction,
//! so registration is: create entry, upload ≤900-byte chunks, finalize.

use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{debug, info};

use crate::crypto::StealthMetaAddress;
use crate::error::{StealthError, StealthResult};
use crate::instruction::{self, MAX_CHUNK_SIZE};
use crate::layout::RegistryEntry;
use crate::pda;
use crate::rpc::{sign_and_send, ChainRpc};
use crate::wallet::WalletSigner;

pub struct RegistryClient<'a> {
    rpc: &'a dyn ChainRpc,
    program_id: Pubkey,
    timeout: Duration,
}

impl<'a> RegistryClient<'a> {
    pub fn new(rpc: &'a dyn ChainRpc, program_id: Pubkey, timeout: Duration) -> Self {
        Self {
            rpc,
            program_id,
            timeout,
        }
    }

    /// Raw entry for `owner`, finalized or not
    pub async fn entry(&self, owner: &Pubkey) -> StealthResult<Option<RegistryEntry>> {
        let (address, _) = pda::registry_address(&self.program_id, owner);
        match self.rpc.get_account(&address).await? {
            Some(account) => Ok(Some(RegistryEntry::unpack(&account.data)?)),
            None => Ok(None),
        }
    }

    /// Published meta-address for `owner`; `None` if never registered
    pub async fn lookup(&self, owner: &Pubkey) -> StealthResult<Option<StealthMetaAddress>> {
        let Some(entry) = self.entry(owner).await? else {
            return Ok(None);
        };
        if !entry.finalized {
            return Err(StealthError::InvalidMetaAddress(format!(
                "registration of {} is incomplete",
                owner
            )));
        }

        let mut meta = StealthMetaAddress::new(entry.spend_pubkey, entry.view_pubkey);
        if !entry.kem_pubkey.is_empty() {
            meta.kem_pubkey = Some(entry.kem_pubkey);
        }
        meta.validate()?;
        Ok(Some(meta))
    }

    /// Register `meta` for the wallet, resuming an interrupted upload.
    ///
    /// Returns the signatures of the transactions sent; empty when the same
    /// keys are already registered.
    pub async fn register(&self, wallet: &dyn WalletSigner, meta: &StealthMetaAddress) -> StealthResult<Vec<Signature>> {
        meta.validate()?;
        let owner = wallet.pubkey();
        let kem = meta.kem_pubkey.as_deref().unwrap_or_default();
        let mut signatures = Vec::new();

        match self.entry(&owner).await? {
            Some(entry) if entry.spend_pubkey != meta.spend_pubkey || entry.view_pubkey != meta.view_pubkey => {
                return Err(StealthError::InvalidInput(format!(
                    "{} already registered different keys",
                    owner
                )));
            }
            Some(entry) if entry.finalized => {
                info!(%owner, "keys already registered");
                return Ok(signatures);
            }
            Some(_) => {
                debug!(%owner, "resuming incomplete registration");
            }
            None => {
                let ix = instruction::register_keys(
                    &self.program_id,
                    &owner,
                    meta.spend_pubkey,
                    meta.view_pubkey,
                    kem.len(),
                )?;
                signatures.push(sign_and_send(self.rpc, wallet, &[ix], self.timeout).await?);
            }
        }

        for (index, chunk) in kem.chunks(MAX_CHUNK_SIZE).enumerate() {
            let offset = index * MAX_CHUNK_SIZE;
            let ix = instruction::upload_key_chunk(&self.program_id, &owner, offset, chunk)?;
            signatures.push(sign_and_send(self.rpc, wallet, &[ix], self.timeout).await?);
            debug!(%owner, offset, len = chunk.len(), "uploaded key chunk");
        }

        let ix = instruction::finalize_registry(&self.program_id, &owner);
        signatures.push(sign_and_send(self.rpc, wallet, &[ix], self.timeout).await?);

        info!(%owner, transactions = signatures.len(), "registration complete");
        Ok(signatures)
    }
}
