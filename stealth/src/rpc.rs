//! Chain RPC capability
//!
//! Everything the client reads from or submits to the chain goes through
//! `ChainRpc`. The production adapter wraps the nonblocking Solana RPC
//! client; tests use an in-memory ledger.

use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    client_error::ClientError,
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::RpcFilterType,
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, instruction::Instruction,
    pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use tracing::debug;

use crate::amount::Lamports;
use crate::error::{StealthError, StealthResult};
use crate::wallet::WalletSigner;

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_account(&self, address: &Pubkey) -> StealthResult<Option<Account>>;

    /// Lamport balance. A missing account is a balance of zero, never an error.
    async fn get_balance(&self, address: &Pubkey) -> StealthResult<Lamports>;

    /// All accounts owned by `program_id` whose data is exactly `data_size` bytes
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> StealthResult<Vec<(Pubkey, Account)>>;

    async fn latest_blockhash(&self) -> StealthResult<Hash>;

    /// Submit and wait for confirmation. Callers bound the wait themselves.
    async fn send_and_confirm(&self, tx: &Transaction) -> StealthResult<Signature>;
}

/// `ChainRpc` over a Solana JSON-RPC endpoint
pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(rpc_url: &str) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn get_account(&self, address: &Pubkey) -> StealthResult<Option<Account>> {
        Ok(self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value)
    }

    async fn get_balance(&self, address: &Pubkey) -> StealthResult<Lamports> {
        let balance = self
            .client
            .get_balance_with_commitment(address, self.commitment)
            .await?
            .value;
        Ok(Lamports(balance))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        data_size: usize,
    ) -> StealthResult<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::DataSize(data_size as u64)]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?;
        debug!(program = %program_id, data_size, count = accounts.len(), "fetched program accounts");
        Ok(accounts)
    }

    async fn latest_blockhash(&self) -> StealthResult<Hash> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> StealthResult<Signature> {
        self.client
            .send_and_confirm_transaction(tx)
            .await
            .map_err(submission_error)
    }
}

/// Build a transaction paid by `wallet` and have the wallet sign it.
///
/// The first signature identifies the transaction before it is submitted.
pub async fn build_signed(
    rpc: &dyn ChainRpc,
    wallet: &dyn WalletSigner,
    instructions: &[Instruction],
) -> StealthResult<Transaction> {
    let payer = wallet.pubkey();
    let mut tx = Transaction::new_with_payer(instructions, Some(&payer));
    tx.message.recent_blockhash = rpc.latest_blockhash().await?;
    Ok(wallet.sign_transaction(tx).await?)
}

/// Submit and wait at most `timeout` for confirmation.
///
/// A `Timeout` error does not mean the transaction failed; callers re-read
/// chain state before deciding.
pub async fn confirm_within(rpc: &dyn ChainRpc, tx: &Transaction, timeout: Duration) -> StealthResult<Signature> {
    match tokio::time::timeout(timeout, rpc.send_and_confirm(tx)).await {
        Ok(result) => result,
        Err(_) => Err(StealthError::Timeout(format!(
            "confirmation of {}",
            tx.signatures.first().copied().unwrap_or_default()
        ))),
    }
}

pub async fn sign_and_send(
    rpc: &dyn ChainRpc,
    wallet: &dyn WalletSigner,
    instructions: &[Instruction],
    timeout: Duration,
) -> StealthResult<Signature> {
    let tx = build_signed(rpc, wallet, instructions).await?;
    confirm_within(rpc, &tx, timeout).await
}

/// Program/runtime rejections are final; everything else may be transient
fn submission_error(err: ClientError) -> StealthError {
    match err.get_transaction_error() {
        Some(tx_err) => StealthError::TransactionFailed(tx_err.to_string()),
        None => StealthError::Rpc(err.to_string()),
    }
}
