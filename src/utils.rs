// Lottery Program - Utility Functions
use arrayref::{array_ref, array_refs};
use solana_program::{
    bpf_loader_upgradeable::{self, UpgradeableLoaderState},
    program_error::ProgramError,
    pubkey::Pubkey,
};

pub const LOTTERY_SEED: &[u8] = b"lottery";
pub const VAULT_SEED: &[u8] = b"vault";
pub const COORDINATOR_SEED: &[u8] = b"coordinator";

/// Find the program derived address of the lottery
pub fn find_lottery_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LOTTERY_SEED], program_id)
}

/// Find the program derived address of the prize vault
pub fn find_vault_address(program_id: &Pubkey, lottery: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, lottery.as_ref()], program_id)
}

/// Find the program derived address of the randomness coordinator
pub fn find_coordinator_address(program_id: &Pubkey, lottery: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_SEED, lottery.as_ref()], program_id)
}

/// Address of the upgradeable loader's program data account for `program_id`
pub fn find_program_data_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id()).0
}

/// Read the upgrade authority out of a program data account.
///
/// The header is the loader's bincode layout: a u32 variant tag (3 for
/// program data), the deployment slot, then an optional authority key.
pub fn program_upgrade_authority(data: &[u8]) -> Result<Option<Pubkey>, ProgramError> {
    const PROGRAM_DATA_TAG: u32 = 3;
    const HEADER_LEN: usize = UpgradeableLoaderState::size_of_programdata_metadata();
    let header = data.get(..HEADER_LEN).ok_or(ProgramError::InvalidAccountData)?;
    let header = array_ref![header, 0, HEADER_LEN];
    let (tag, _slot, has_authority, authority) = array_refs![header, 4, 8, 1, 32];

    if u32::from_le_bytes(*tag) != PROGRAM_DATA_TAG {
        return Err(ProgramError::InvalidAccountData);
    }
    match has_authority[0] {
        0 => Ok(None),
        1 => Ok(Some(Pubkey::new_from_array(*authority))),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
