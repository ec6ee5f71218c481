// Lottery Program - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::{
    oracle::RandomWord,
    state::LotteryConfig,
    utils::{
        find_coordinator_address, find_lottery_address, find_program_data_address,
        find_vault_address,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum LotteryInstruction {
    /// Create the lottery with its immutable configuration
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The program upgrade authority, funding the new accounts
    /// 1. `[writable]` The lottery account (PDA)
    /// 2. `[writable]` The coordinator account (PDA)
    /// 3. `[]` The vault account (PDA)
    /// 4. `[]` The oracle authority allowed to fulfill requests
    /// 5. `[]` The system program
    /// 6. `[]` The program data account of this program
    InitializeLottery {
        /// Immutable lottery parameters
        config: LotteryConfig,
    },

    /// Enter the running round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The entrant (pays the fee)
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The vault account
    /// 3. `[]` The system program
    EnterDraw {
        /// Lamports paid, at least the entrance fee
        payment: u64,
    },

    /// Report whether a draw is due, as borsh `UpkeepCheck` return data
    ///
    /// Accounts expected:
    /// 0. `[]` The lottery account
    /// 1. `[]` The vault account
    CheckUpkeep {},

    /// Close entries and request randomness once a draw is due
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller (usually the automation keeper)
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The vault account
    /// 3. `[writable]` The coordinator account
    PerformUpkeep {},

    /// Deliver randomness for the outstanding request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle authority
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The coordinator account
    /// 3. `[writable]` The vault account
    /// 4. `[writable]` The winner selected by the first random word
    /// 5. `[]` The system program
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<RandomWord>,
    },
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (draw_interval, rest) = Self::unpack_u64(rest)?;
                let (key_hash, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (request_confirmations, rest) = Self::unpack_u16(rest)?;
                let (num_words, _) = Self::unpack_u32(rest)?;
                Self::InitializeLottery {
                    config: LotteryConfig {
                        entrance_fee,
                        draw_interval,
                        key_hash,
                        subscription_id,
                        callback_gas_limit,
                        request_confirmations,
                        num_words,
                    },
                }
            }
            1 => {
                let (payment, _) = Self::unpack_u64(rest)?;
                Self::EnterDraw { payment }
            }
            2 => Self::CheckUpkeep {},
            3 => Self::PerformUpkeep {},
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u32(rest)?;
                let mut random_words = Vec::with_capacity((count as usize).min(rest.len() / 32));
                for _ in 0..count {
                    let (word, tail) = Self::unpack_fixed_bytes::<32>(rest)?;
                    random_words.push(word);
                    rest = tail;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeLottery { config } => {
                buf.push(0);
                buf.extend_from_slice(&config.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&config.draw_interval.to_le_bytes());
                buf.extend_from_slice(&config.key_hash);
                buf.extend_from_slice(&config.subscription_id.to_le_bytes());
                buf.extend_from_slice(&config.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&config.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&config.num_words.to_le_bytes());
            }
            Self::EnterDraw { payment } => {
                buf.push(1);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::CheckUpkeep {} => buf.push(2),
            Self::PerformUpkeep {} => buf.push(3),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(word);
                }
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<2>(input)?;
        Ok((u16::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = input.split_at(N);
        let bytes: [u8; N] = bytes
            .try_into()
            .map_err(|_| ProgramError::InvalidInstructionData)?;
        Ok((bytes, rest))
    }
}

/// Create initialize_lottery instruction. `payer` must be the program's
/// upgrade authority.
pub fn initialize_lottery(
    program_id: &Pubkey,
    payer: &Pubkey,
    oracle_authority: &Pubkey,
    config: LotteryConfig,
) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id);
    let (coordinator, _) = find_coordinator_address(program_id, &lottery);
    let (vault, _) = find_vault_address(program_id, &lottery);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new(coordinator, false),
            AccountMeta::new_readonly(vault, false),
            AccountMeta::new_readonly(*oracle_authority, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(find_program_data_address(program_id), false),
        ],
        data: LotteryInstruction::InitializeLottery { config }.pack(),
    }
}

/// Create enter_draw instruction
pub fn enter_draw(program_id: &Pubkey, entrant: &Pubkey, payment: u64) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id);
    let (vault, _) = find_vault_address(program_id, &lottery);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*entrant, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::EnterDraw { payment }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id);
    let (vault, _) = find_vault_address(program_id, &lottery);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(lottery, false),
            AccountMeta::new_readonly(vault, false),
        ],
        data: LotteryInstruction::CheckUpkeep {}.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, caller: &Pubkey) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id);
    let (coordinator, _) = find_coordinator_address(program_id, &lottery);
    let (vault, _) = find_vault_address(program_id, &lottery);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new_readonly(vault, false),
            AccountMeta::new(coordinator, false),
        ],
        data: LotteryInstruction::PerformUpkeep {}.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    oracle_authority: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<RandomWord>,
) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id);
    let (coordinator, _) = find_coordinator_address(program_id, &lottery);
    let (vault, _) = find_vault_address(program_id, &lottery);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*oracle_authority, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new(coordinator, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*winner, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}
