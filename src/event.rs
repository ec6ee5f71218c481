// Lottery Program - Events
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

/// Notifications emitted by the draw engine.
///
/// Each event is written twice: a readable `msg!` line and the borsh bytes
/// as program data for indexers.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    /// A participant entered the running round
    EnteredDraw { player: Pubkey },
    /// Entries closed and randomness was requested
    DrawRequested { request_id: u64 },
    /// A round was resolved and paid out
    WinnerPicked { winner: Pubkey },
}

impl LotteryEvent {
    pub fn emit(&self) {
        match self {
            LotteryEvent::EnteredDraw { player } => msg!("EnteredDraw: {}", player),
            LotteryEvent::DrawRequested { request_id } => msg!("DrawRequested: {}", request_id),
            LotteryEvent::WinnerPicked { winner } => msg!("WinnerPicked: {}", winner),
        }
        if let Ok(data) = borsh::to_vec(self) {
            sol_log_data(&[&data]);
        }
    }
}
