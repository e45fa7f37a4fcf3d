//! Fixed-offset account layouts
//!
//! Records are read straight from account data at fixed byte offsets. Every
//! record starts with an 8-byte discriminator, multi-byte integers are little
//! endian, and mutable flags sit at the tail.

use crate::amount::Lamports;
use crate::error::{StealthError, StealthResult};

pub const ANNOUNCEMENT_DISCRIMINATOR: [u8; 8] = *b"wsannoun";
pub const DEPOSIT_DISCRIMINATOR: [u8; 8] = *b"wsmixdep";
pub const REGISTRY_DISCRIMINATOR: [u8; 8] = *b"wsregstr";

/// 8 disc + 32 nonce + 32 ephemeral + 32 stealth + view_tag + bump + finalized + claimed
pub const ANNOUNCEMENT_SIZE: usize = 108;

/// 8 disc + 32 nonce + 8 amount + 32 depositor + 32 stealth + 32 ephemeral
/// + view_tag + executed + delegated + bump
pub const DEPOSIT_RECORD_SIZE: usize = 148;

/// Largest KEM public key a registry entry can hold (ML-KEM-768)
pub const MAX_KEM_KEY_SIZE: usize = 1184;

/// 8 disc + 32 owner + 32 spend + 32 view + finalized + bump + u16 len + key bytes
pub const REGISTRY_HEADER_SIZE: usize = 108;
pub const REGISTRY_SIZE: usize = REGISTRY_HEADER_SIZE + MAX_KEM_KEY_SIZE;

// ============================================================================
// Announcement
// ============================================================================

/// Public record of a stealth payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    pub nonce: [u8; 32],
    pub ephemeral_pubkey: [u8; 32],
    pub stealth_pubkey: [u8; 32],
    pub view_tag: u8,
    pub bump: u8,
    /// Set once the deposit landed in the vault
    pub finalized: bool,
    pub claimed: bool,
}

impl Announcement {
    pub fn unpack(data: &[u8]) -> StealthResult<Self> {
        check_record(data, ANNOUNCEMENT_SIZE, &ANNOUNCEMENT_DISCRIMINATOR, "announcement")?;
        Ok(Self {
            nonce: read_array(data, 8)?,
            ephemeral_pubkey: read_array(data, 40)?,
            stealth_pubkey: read_array(data, 72)?,
            view_tag: data[104],
            bump: data[105],
            finalized: read_flag(data, 106)?,
            claimed: read_flag(data, 107)?,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ANNOUNCEMENT_SIZE);
        data.extend_from_slice(&ANNOUNCEMENT_DISCRIMINATOR);
        data.extend_from_slice(&self.nonce);
        data.extend_from_slice(&self.ephemeral_pubkey);
        data.extend_from_slice(&self.stealth_pubkey);
        data.push(self.view_tag);
        data.push(self.bump);
        data.push(self.finalized as u8);
        data.push(self.claimed as u8);
        data
    }
}

// ============================================================================
// Mixer Deposit Record
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRecord {
    pub nonce: [u8; 32],
    pub amount: Lamports,
    pub depositor: [u8; 32],
    pub stealth_pubkey: [u8; 32],
    pub ephemeral_pubkey: [u8; 32],
    pub view_tag: u8,
    /// Relayer already moved the funds into the vault
    pub executed: bool,
    pub delegated: bool,
    pub bump: u8,
}

impl DepositRecord {
    pub fn unpack(data: &[u8]) -> StealthResult<Self> {
        check_record(data, DEPOSIT_RECORD_SIZE, &DEPOSIT_DISCRIMINATOR, "deposit record")?;
        Ok(Self {
            nonce: read_array(data, 8)?,
            amount: Lamports(u64::from_le_bytes(read_array(data, 40)?)),
            depositor: read_array(data, 48)?,
            stealth_pubkey: read_array(data, 80)?,
            ephemeral_pubkey: read_array(data, 112)?,
            view_tag: data[144],
            executed: read_flag(data, 145)?,
            delegated: read_flag(data, 146)?,
            bump: data[147],
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(DEPOSIT_RECORD_SIZE);
        data.extend_from_slice(&DEPOSIT_DISCRIMINATOR);
        data.extend_from_slice(&self.nonce);
        data.extend_from_slice(&self.amount.get().to_le_bytes());
        data.extend_from_slice(&self.depositor);
        data.extend_from_slice(&self.stealth_pubkey);
        data.extend_from_slice(&self.ephemeral_pubkey);
        data.push(self.view_tag);
        data.push(self.executed as u8);
        data.push(self.delegated as u8);
        data.push(self.bump);
        data
    }

    /// Refund is only possible before the relayer executed the transfer
    pub fn can_undelegate(&self) -> bool {
        !self.executed
    }
}

// ============================================================================
// Registry Entry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub owner: [u8; 32],
    pub spend_pubkey: [u8; 32],
    pub view_pubkey: [u8; 32],
    pub finalized: bool,
    pub bump: u8,
    /// Bytes uploaded so far; complete once `finalized`
    pub kem_pubkey: Vec<u8>,
}

impl RegistryEntry {
    pub fn unpack(data: &[u8]) -> StealthResult<Self> {
        check_record(data, REGISTRY_HEADER_SIZE, &REGISTRY_DISCRIMINATOR, "registry entry")?;
        let kem_len = u16::from_le_bytes(read_array(data, 106)?) as usize;
        if kem_len > MAX_KEM_KEY_SIZE {
            return Err(StealthError::Layout(format!(
                "registry kem key length {} exceeds {}",
                kem_len, MAX_KEM_KEY_SIZE
            )));
        }
        let kem_end = REGISTRY_HEADER_SIZE + kem_len;
        if data.len() < kem_end {
            return Err(StealthError::Layout(format!(
                "registry entry truncated: {} bytes, kem key needs {}",
                data.len(),
                kem_end
            )));
        }

        Ok(Self {
            owner: read_array(data, 8)?,
            spend_pubkey: read_array(data, 40)?,
            view_pubkey: read_array(data, 72)?,
            finalized: read_flag(data, 104)?,
            bump: data[105],
            kem_pubkey: data[REGISTRY_HEADER_SIZE..kem_end].to_vec(),
        })
    }

    /// Full account image (`REGISTRY_SIZE` bytes, zero padded)
    pub fn pack(&self) -> StealthResult<Vec<u8>> {
        if self.kem_pubkey.len() > MAX_KEM_KEY_SIZE {
            return Err(StealthError::Layout(format!(
                "kem key of {} bytes does not fit",
                self.kem_pubkey.len()
            )));
        }
        let mut data = Vec::with_capacity(REGISTRY_SIZE);
        data.extend_from_slice(&REGISTRY_DISCRIMINATOR);
        data.extend_from_slice(&self.owner);
        data.extend_from_slice(&self.spend_pubkey);
        data.extend_from_slice(&self.view_pubkey);
        data.push(self.finalized as u8);
        data.push(self.bump);
        data.extend_from_slice(&(self.kem_pubkey.len() as u16).to_le_bytes());
        data.extend_from_slice(&self.kem_pubkey);
        data.resize(REGISTRY_SIZE, 0);
        Ok(data)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_record(data: &[u8], min_size: usize, discriminator: &[u8; 8], label: &str) -> StealthResult<()> {
    if data.len() < min_size {
        return Err(StealthError::Layout(format!(
            "{} too short: {} bytes, expected {}",
            label,
            data.len(),
            min_size
        )));
    }
    if &data[..8] != discriminator {
        return Err(StealthError::Layout(format!("{} discriminator mismatch", label)));
    }
    Ok(())
}

pub(crate) fn read_array<const N: usize>(data: &[u8], offset: usize) -> StealthResult<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| StealthError::Layout(format!("need {} bytes at offset {}", N, offset)))
}

fn read_flag(data: &[u8], offset: usize) -> StealthResult<bool> {
    match data.get(offset) {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(StealthError::Layout(format!(
            "flag at offset {} is {}, expected 0 or 1",
            offset, other
        ))),
        None => Err(StealthError::Layout(format!("missing flag at offset {}", offset))),
    }
}
