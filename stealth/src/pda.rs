//! Program-derived addresses used by the stealth program

use solana_sdk::pubkey::Pubkey;

pub const ANNOUNCEMENT_SEED: &[u8] = b"announcement";
pub const VAULT_SEED: &[u8] = b"stealth_vault";
pub const MIXER_DEPOSIT_SEED: &[u8] = b"mixer_deposit";
pub const MIXER_POOL_SEED: &[u8] = b"mixer_pool";
pub const REGISTRY_SEED: &[u8] = b"registry";

pub fn announcement_address(program_id: &Pubkey, nonce: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ANNOUNCEMENT_SEED, nonce], program_id)
}

/// Vault holding the lamports paid to `stealth_pubkey`
pub fn vault_address(program_id: &Pubkey, stealth_pubkey: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, stealth_pubkey], program_id)
}

pub fn mixer_deposit_address(program_id: &Pubkey, nonce: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MIXER_DEPOSIT_SEED, nonce], program_id)
}

pub fn mixer_pool_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MIXER_POOL_SEED], program_id)
}

pub fn registry_address(program_id: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REGISTRY_SEED, owner.as_ref()], program_id)
}
