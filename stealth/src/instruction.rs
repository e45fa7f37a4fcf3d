//! Stealth program instruction codec
//!
//! Each instruction is a 1-byte discriminator followed by fixed-offset,
//! little-endian fields. Builders return ready-to-sign `Instruction`s with
//! the account order the program expects.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::amount::Lamports;
use crate::crypto::StealthAddress;
use crate::error::{StealthError, StealthResult};
use crate::layout::{read_array, MAX_KEM_KEY_SIZE};
use crate::pda;

/// Largest registry chunk that fits a transaction alongside its accounts
pub const MAX_CHUNK_SIZE: usize = 900;

/// Attestation bytes carried by `ExecuteMixerTransfer`
pub const TEE_PROOF_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StealthInstruction {
    /// Create the registry entry. Accounts: owner (signer), registry, system program.
    RegisterKeys {
        spend_pubkey: [u8; 32],
        view_pubkey: [u8; 32],
        kem_len: u16,
    },
    /// Accounts: owner (signer), registry.
    UploadKeyChunk { offset: u16, bytes: Vec<u8> },
    /// Accounts: owner (signer), registry.
    FinalizeRegistry,
    /// Accounts: sender (signer), announcement, system program.
    PublishAnnouncement {
        nonce: [u8; 32],
        ephemeral_pubkey: [u8; 32],
        stealth_pubkey: [u8; 32],
        view_tag: u8,
    },
    /// Direct deposit; also finalizes the announcement.
    /// Accounts: sender (signer), announcement, vault, system program.
    Deposit { nonce: [u8; 32], amount: Lamports },
    /// Accounts: depositor (signer), deposit record, mixer pool, system program.
    DepositToMixer {
        nonce: [u8; 32],
        amount: Lamports,
        stealth_pubkey: [u8; 32],
        ephemeral_pubkey: [u8; 32],
        view_tag: u8,
    },
    /// Relayer-only. Accounts: relayer (signer), deposit record, mixer pool,
    /// announcement, vault, system program.
    ExecuteMixerTransfer {
        nonce: [u8; 32],
        tee_proof: [u8; TEE_PROOF_SIZE],
    },
    /// Accounts: fee payer (signer), vault, announcement, destination, system program.
    ClaimStealthPayment {
        stealth_pubkey: [u8; 32],
        signature: [u8; 64],
        destination_hash: [u8; 32],
    },
    /// Accounts: depositor (signer), deposit record, mixer pool.
    Undelegate { nonce: [u8; 32] },
}

impl StealthInstruction {
    pub fn discriminator(&self) -> u8 {
        match self {
            Self::RegisterKeys { .. } => 0,
            Self::UploadKeyChunk { .. } => 1,
            Self::FinalizeRegistry => 2,
            Self::PublishAnnouncement { .. } => 3,
            Self::Deposit { .. } => 4,
            Self::DepositToMixer { .. } => 5,
            Self::ExecuteMixerTransfer { .. } => 6,
            Self::ClaimStealthPayment { .. } => 7,
            Self::Undelegate { .. } => 8,
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut data = vec![self.discriminator()];
        match self {
            Self::RegisterKeys {
                spend_pubkey,
                view_pubkey,
                kem_len,
            } => {
                data.extend_from_slice(spend_pubkey);
                data.extend_from_slice(view_pubkey);
                data.extend_from_slice(&kem_len.to_le_bytes());
            }
            Self::UploadKeyChunk { offset, bytes } => {
                data.extend_from_slice(&offset.to_le_bytes());
                data.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                data.extend_from_slice(bytes);
            }
            Self::FinalizeRegistry => {}
            Self::PublishAnnouncement {
                nonce,
                ephemeral_pubkey,
                stealth_pubkey,
                view_tag,
            } => {
                data.extend_from_slice(nonce);
                data.extend_from_slice(ephemeral_pubkey);
                data.extend_from_slice(stealth_pubkey);
                data.push(*view_tag);
            }
            Self::Deposit { nonce, amount } => {
                data.extend_from_slice(nonce);
                data.extend_from_slice(&amount.get().to_le_bytes());
            }
            Self::DepositToMixer {
                nonce,
                amount,
                stealth_pubkey,
                ephemeral_pubkey,
                view_tag,
            } => {
                data.extend_from_slice(nonce);
                data.extend_from_slice(&amount.get().to_le_bytes());
                data.extend_from_slice(stealth_pubkey);
                data.extend_from_slice(ephemeral_pubkey);
                data.push(*view_tag);
            }
            Self::ExecuteMixerTransfer { nonce, tee_proof } => {
                data.extend_from_slice(nonce);
                data.extend_from_slice(tee_proof);
            }
            Self::ClaimStealthPayment {
                stealth_pubkey,
                signature,
                destination_hash,
            } => {
                data.extend_from_slice(stealth_pubkey);
                data.extend_from_slice(signature);
                data.extend_from_slice(destination_hash);
            }
            Self::Undelegate { nonce } => {
                data.extend_from_slice(nonce);
            }
        }
        data
    }

    pub fn unpack(data: &[u8]) -> StealthResult<Self> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| StealthError::Layout("empty instruction data".into()))?;

        let (instruction, expected_len) = match tag {
            0 => (
                Self::RegisterKeys {
                    spend_pubkey: read_array(rest, 0)?,
                    view_pubkey: read_array(rest, 32)?,
                    kem_len: u16::from_le_bytes(read_array(rest, 64)?),
                },
                66,
            ),
            1 => {
                let offset = u16::from_le_bytes(read_array(rest, 0)?);
                let len = u16::from_le_bytes(read_array(rest, 2)?) as usize;
                let bytes = rest
                    .get(4..4 + len)
                    .ok_or_else(|| StealthError::Layout(format!("chunk declares {} bytes", len)))?
                    .to_vec();
                (Self::UploadKeyChunk { offset, bytes }, 4 + len)
            }
            2 => (Self::FinalizeRegistry, 0),
            3 => (
                Self::PublishAnnouncement {
                    nonce: read_array(rest, 0)?,
                    ephemeral_pubkey: read_array(rest, 32)?,
                    stealth_pubkey: read_array(rest, 64)?,
                    view_tag: read_byte(rest, 96)?,
                },
                97,
            ),
            4 => (
                Self::Deposit {
                    nonce: read_array(rest, 0)?,
                    amount: Lamports(u64::from_le_bytes(read_array(rest, 32)?)),
                },
                40,
            ),
            5 => (
                Self::DepositToMixer {
                    nonce: read_array(rest, 0)?,
                    amount: Lamports(u64::from_le_bytes(read_array(rest, 32)?)),
                    stealth_pubkey: read_array(rest, 40)?,
                    ephemeral_pubkey: read_array(rest, 72)?,
                    view_tag: read_byte(rest, 104)?,
                },
                105,
            ),
            6 => (
                Self::ExecuteMixerTransfer {
                    nonce: read_array(rest, 0)?,
                    tee_proof: read_array(rest, 32)?,
                },
                96,
            ),
            7 => (
                Self::ClaimStealthPayment {
                    stealth_pubkey: read_array(rest, 0)?,
                    signature: read_array(rest, 32)?,
                    destination_hash: read_array(rest, 96)?,
                },
                128,
            ),
            8 => (Self::Undelegate { nonce: read_array(rest, 0)? }, 32),
            other => {
                return Err(StealthError::Layout(format!("unknown instruction discriminator {}", other)));
            }
        };

        if rest.len() != expected_len {
            return Err(StealthError::Layout(format!(
                "instruction {} has {} trailing bytes",
                tag,
                rest.len().saturating_sub(expected_len)
            )));
        }
        Ok(instruction)
    }
}

fn read_byte(data: &[u8], offset: usize) -> StealthResult<u8> {
    data.get(offset)
        .copied()
        .ok_or_else(|| StealthError::Layout(format!("need 1 byte at offset {}", offset)))
}

// ============================================================================
// Builders
// ============================================================================

pub fn register_keys(
    program_id: &Pubkey,
    owner: &Pubkey,
    spend_pubkey: [u8; 32],
    view_pubkey: [u8; 32],
    kem_len: usize,
) -> StealthResult<Instruction> {
    if kem_len > MAX_KEM_KEY_SIZE {
        return Err(StealthError::InvalidInput(format!(
            "kem key of {} bytes exceeds {}",
            kem_len, MAX_KEM_KEY_SIZE
        )));
    }
    let (registry, _) = pda::registry_address(program_id, owner);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(registry, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::RegisterKeys {
            spend_pubkey,
            view_pubkey,
            kem_len: kem_len as u16,
        }
        .pack(),
    })
}

pub fn upload_key_chunk(program_id: &Pubkey, owner: &Pubkey, offset: usize, bytes: &[u8]) -> StealthResult<Instruction> {
    if bytes.len() > MAX_CHUNK_SIZE || offset + bytes.len() > MAX_KEM_KEY_SIZE {
        return Err(StealthError::InvalidInput(format!(
            "chunk {}..{} out of bounds",
            offset,
            offset + bytes.len()
        )));
    }
    let (registry, _) = pda::registry_address(program_id, owner);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*owner, true), AccountMeta::new(registry, false)],
        data: StealthInstruction::UploadKeyChunk {
            offset: offset as u16,
            bytes: bytes.to_vec(),
        }
        .pack(),
    })
}

pub fn finalize_registry(program_id: &Pubkey, owner: &Pubkey) -> Instruction {
    let (registry, _) = pda::registry_address(program_id, owner);
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*owner, true), AccountMeta::new(registry, false)],
        data: StealthInstruction::FinalizeRegistry.pack(),
    }
}

pub fn publish_announcement(
    program_id: &Pubkey,
    sender: &Pubkey,
    nonce: &[u8; 32],
    address: &StealthAddress,
) -> Instruction {
    let (announcement, _) = pda::announcement_address(program_id, nonce);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*sender, true),
            AccountMeta::new(announcement, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::PublishAnnouncement {
            nonce: *nonce,
            ephemeral_pubkey: address.ephemeral_pubkey,
            stealth_pubkey: address.stealth_pubkey,
            view_tag: address.view_tag,
        }
        .pack(),
    }
}

pub fn deposit(
    program_id: &Pubkey,
    sender: &Pubkey,
    nonce: &[u8; 32],
    stealth_pubkey: &[u8; 32],
    amount: Lamports,
) -> Instruction {
    let (announcement, _) = pda::announcement_address(program_id, nonce);
    let (vault, _) = pda::vault_address(program_id, stealth_pubkey);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*sender, true),
            AccountMeta::new(announcement, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::Deposit { nonce: *nonce, amount }.pack(),
    }
}

pub fn deposit_to_mixer(
    program_id: &Pubkey,
    depositor: &Pubkey,
    nonce: &[u8; 32],
    address: &StealthAddress,
    amount: Lamports,
) -> Instruction {
    let (record, _) = pda::mixer_deposit_address(program_id, nonce);
    let (pool, _) = pda::mixer_pool_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*depositor, true),
            AccountMeta::new(record, false),
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::DepositToMixer {
            nonce: *nonce,
            amount,
            stealth_pubkey: address.stealth_pubkey,
            ephemeral_pubkey: address.ephemeral_pubkey,
            view_tag: address.view_tag,
        }
        .pack(),
    }
}

/// Built by the relayer; the client only needs it for decoding and tests
pub fn execute_mixer_transfer(
    program_id: &Pubkey,
    relayer: &Pubkey,
    nonce: &[u8; 32],
    stealth_pubkey: &[u8; 32],
    tee_proof: [u8; TEE_PROOF_SIZE],
) -> Instruction {
    let (record, _) = pda::mixer_deposit_address(program_id, nonce);
    let (pool, _) = pda::mixer_pool_address(program_id);
    let (announcement, _) = pda::announcement_address(program_id, nonce);
    let (vault, _) = pda::vault_address(program_id, stealth_pubkey);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*relayer, true),
            AccountMeta::new(record, false),
            AccountMeta::new(pool, false),
            AccountMeta::new(announcement, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::ExecuteMixerTransfer {
            nonce: *nonce,
            tee_proof,
        }
        .pack(),
    }
}

pub fn claim_stealth_payment(
    program_id: &Pubkey,
    fee_payer: &Pubkey,
    announcement: &Pubkey,
    destination: &Pubkey,
    stealth_pubkey: &[u8; 32],
    signature: [u8; 64],
    destination_hash: [u8; 32],
) -> Instruction {
    let (vault, _) = pda::vault_address(program_id, stealth_pubkey);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*fee_payer, true),
            AccountMeta::new(vault, false),
            AccountMeta::new(*announcement, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: StealthInstruction::ClaimStealthPayment {
            stealth_pubkey: *stealth_pubkey,
            signature,
            destination_hash,
        }
        .pack(),
    }
}

pub fn undelegate(program_id: &Pubkey, depositor: &Pubkey, nonce: &[u8; 32]) -> Instruction {
    let (record, _) = pda::mixer_deposit_address(program_id, nonce);
    let (pool, _) = pda::mixer_pool_address(program_id);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*depositor, true),
            AccountMeta::new(record, false),
            AccountMeta::new(pool, false),
        ],
        data: StealthInstruction::Undelegate { nonce: *nonce }.pack(),
    }
}
