// Lottery Program - Errors
use solana_program::{msg, program_error::ProgramError};
use thiserror::Error;

use crate::state::DrawPhase;

/// Errors that may be returned by the lottery program
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotteryError {
    /// Entry or draw request attempted while a draw is in progress
    #[error("Lottery is not open")]
    NotOpen,

    /// Payment below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientFee,

    /// Draw requested before it is due
    #[error("Upkeep not needed: balance={balance}, phase={phase:?}, participants={participants}")]
    UpkeepNotNeeded {
        balance: u64,
        phase: DrawPhase,
        participants: u64,
    },

    /// Fulfillment does not match the outstanding randomness request
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Prize transfer to the winner was rejected
    #[error("Payout to winner failed")]
    PayoutFailed,

    /// Lottery configuration rejected at creation
    #[error("Invalid lottery configuration")]
    InvalidConfig,

    /// Account does not match the expected program derived address
    #[error("Account address does not match the expected PDA")]
    InvalidAccountAddress,

    /// Fulfillment was not signed by the registered oracle authority
    #[error("Fulfillment not signed by the oracle authority")]
    UnauthorizedOracle,

    /// Lottery account already holds state
    #[error("Lottery already initialized")]
    AlreadyInitialized,

    /// Entry slot outside the lottery account
    #[error("Participant entry out of range")]
    EntryOutOfRange,

    /// Lottery creation not signed by the program's upgrade authority
    #[error("Initializer is not the program upgrade authority")]
    NotUpgradeAuthority,
}

impl LotteryError {
    /// Stable custom error code surfaced through `ProgramError::Custom`.
    pub fn code(&self) -> u32 {
        match self {
            LotteryError::NotOpen => 0,
            LotteryError::InsufficientFee => 1,
            LotteryError::UpkeepNotNeeded { .. } => 2,
            LotteryError::UnknownRequest => 3,
            LotteryError::PayoutFailed => 4,
            LotteryError::InvalidConfig => 5,
            LotteryError::InvalidAccountAddress => 6,
            LotteryError::UnauthorizedOracle => 7,
            LotteryError::AlreadyInitialized => 8,
            LotteryError::EntryOutOfRange => 9,
            LotteryError::NotUpgradeAuthority => 10,
        }
    }
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        // The custom code cannot carry a payload, so the diagnostics go to the log.
        msg!("Error: {}", e);
        ProgramError::Custom(e.code())
    }
}
