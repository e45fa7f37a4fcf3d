//! Privacy relay client
//!
//! The relayer submits the pool→vault mix transfer (authorized by its TEE
//! attestation) and, optionally, the claim, so neither shows the user's own
//! wallet as signer. Requests are idempotent on the relayer side, so network
//! failures are retried with backoff. Relayer-reported failures come back as
//! `RelayResponse { success: false, .. }`; bad statuses and unparsable bodies
//! are `RelayError`s.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;
use tracing::{debug, info};

use crate::amount::Lamports;
use crate::error::{StealthError, StealthResult};
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const EXECUTE_MIXER_PATH: &str = "/execute-mixer";
pub const CLAIM_PATH: &str = "/claim";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relayer unreachable: {0}")]
    Network(String),

    #[error("relayer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed relayer response: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    /// Connection problems and gateway errors; the request is resent as-is
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Network(_) => true,
            RelayError::Status { status, .. } => matches!(status, 502 | 503 | 504),
            RelayError::MalformedResponse(_) => false,
        }
    }
}

impl From<RelayError> for StealthError {
    fn from(err: RelayError) -> Self {
        StealthError::Relayer(err.to_string())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// `POST /execute-mixer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerTransferRequest {
    /// Deposit nonce (base64)
    pub nonce: String,
    pub announcement_pda: String,
    pub vault_pda: String,
    /// base64
    pub stealth_pubkey: String,
    pub deposit_signature: String,
}

impl MixerTransferRequest {
    pub fn new(
        nonce: &[u8; 32],
        announcement_pda: &Pubkey,
        vault_pda: &Pubkey,
        stealth_pubkey: &[u8; 32],
        deposit_signature: &Signature,
    ) -> Self {
        Self {
            nonce: BASE64.encode(nonce),
            announcement_pda: announcement_pda.to_string(),
            vault_pda: vault_pda.to_string(),
            stealth_pubkey: BASE64.encode(stealth_pubkey),
            deposit_signature: deposit_signature.to_string(),
        }
    }

    pub fn nonce_bytes(&self) -> StealthResult<[u8; 32]> {
        decode_fixed(&self.nonce, "nonce")
    }

    pub fn stealth_pubkey_bytes(&self) -> StealthResult<[u8; 32]> {
        decode_fixed(&self.stealth_pubkey, "stealthPubkey")
    }
}

/// `POST /claim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub vault_pda: String,
    pub announcement_pda: String,
    pub destination: String,
    /// base64
    pub stealth_pubkey: String,
    /// Claim authorization signed by the one-time key (base64)
    pub signature: String,
    /// SHA256(destination) (base64)
    pub destination_hash: String,
}

impl ClaimRequest {
    pub fn new(
        vault_pda: &Pubkey,
        announcement_pda: &Pubkey,
        destination: &Pubkey,
        stealth_pubkey: &[u8; 32],
        signature: &[u8; 64],
        destination_hash: &[u8; 32],
    ) -> Self {
        Self {
            vault_pda: vault_pda.to_string(),
            announcement_pda: announcement_pda.to_string(),
            destination: destination.to_string(),
            stealth_pubkey: BASE64.encode(stealth_pubkey),
            signature: BASE64.encode(signature),
            destination_hash: BASE64.encode(destination_hash),
        }
    }

    pub fn stealth_pubkey_bytes(&self) -> StealthResult<[u8; 32]> {
        decode_fixed(&self.stealth_pubkey, "stealthPubkey")
    }

    pub fn signature_bytes(&self) -> StealthResult<[u8; 64]> {
        decode_fixed(&self.signature, "signature")
    }

    pub fn destination_hash_bytes(&self) -> StealthResult<[u8; 32]> {
        decode_fixed(&self.destination_hash, "destinationHash")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Lamports moved (claims only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Lamports>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok(signature: impl Into<String>) -> Self {
        Self {
            success: true,
            signature: Some(signature.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> StealthResult<[u8; N]> {
    let bytes = BASE64
        .decode(value)
        .map_err(|e| StealthError::InvalidInput(format!("{} is not base64: {}", field, e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| StealthError::InvalidInput(format!("{} must be {} bytes, got {}", field, N, bytes.len())))
}

// ============================================================================
// Client
// ============================================================================

#[async_trait]
pub trait PrivacyRelay: Send + Sync {
    async fn execute_mixer_transfer(&self, request: &MixerTransferRequest) -> Result<RelayResponse, RelayError>;

    async fn submit_claim(&self, request: &ClaimRequest) -> Result<RelayResponse, RelayError>;
}

/// HTTP client for the relayer API
pub struct RelayClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> StealthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StealthError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<RelayResponse, RelayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = retry_with_backoff(path, &self.retry, RelayError::is_retryable, || {
            self.post_once(&url, body)
        })
        .await?;

        debug!(path, success = response.success, "relayer responded");
        Ok(response)
    }

    async fn post_once<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<RelayResponse, RelayError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).chars().take(256).collect(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| RelayError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl PrivacyRelay for RelayClient {
    async fn execute_mixer_transfer(&self, request: &MixerTransferRequest) -> Result<RelayResponse, RelayError> {
        info!(vault = %request.vault_pda, "requesting mixer transfer from relayer");
        self.post(EXECUTE_MIXER_PATH, request).await
    }

    async fn submit_claim(&self, request: &ClaimRequest) -> Result<RelayResponse, RelayError> {
        info!(vault = %request.vault_pda, "submitting claim via relayer");
        self.post(CLAIM_PATH, request).await
    }
}
