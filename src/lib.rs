// Lottery Program
// Entries are pooled until a draw is due, then an oracle picks the winner.

pub mod engine;
pub mod error;
pub mod event;
pub mod instruction;
pub mod oracle;
pub mod processor;
pub mod state;
pub mod utils;
pub mod vault;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process_instruction(program_id, accounts, instruction_data)
}
