// Lottery Program - Account State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::{Pubkey, PUBKEY_BYTES},
};

use crate::{engine::EntryList, error::LotteryError};

/// Lamports per SOL, kept local so the defaults read in SOL.
const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Draw phase of the lottery
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPhase {
    /// Open for entries; a draw may be requested once due
    Open,
    /// Randomness requested, waiting for the oracle callback
    DrawInProgress,
}

impl TryFrom<u8> for DrawPhase {
    type Error = ProgramError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DrawPhase::Open),
            1 => Ok(DrawPhase::DrawInProgress),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

/// Immutable parameters fixed when the lottery is created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LotteryConfig {
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between two draws
    pub draw_interval: u64,
    /// Fingerprint echoed to the oracle with every request
    pub key_hash: [u8; 32],
    /// Oracle subscription paying for requests
    pub subscription_id: u64,
    /// Compute budget granted to the fulfillment callback
    pub callback_gas_limit: u32,
    /// Confirmations the oracle waits before answering
    pub request_confirmations: u16,
    /// Random words asked for per draw; only the first is used
    pub num_words: u32,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            entrance_fee: LAMPORTS_PER_SOL / 100, // 0.01 SOL
            draw_interval: 30,
            key_hash: [0u8; 32],
            subscription_id: 0,
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            num_words: 1,
        }
    }
}

impl LotteryConfig {
    /// Reject configurations the program cannot operate with.
    ///
    /// `min_fee` is the smallest deposit the vault can hold on its own.
    pub fn validate(&self, min_fee: u64) -> Result<(), LotteryError> {
        if self.entrance_fee == 0 || self.entrance_fee < min_fee {
            return Err(LotteryError::InvalidConfig);
        }
        if self.num_words == 0 {
            return Err(LotteryError::InvalidConfig);
        }
        if i64::try_from(self.draw_interval).is_err() {
            return Err(LotteryError::InvalidConfig);
        }
        Ok(())
    }
}

/// Lottery account header.
///
/// The entries of the running round follow the header in the same account,
/// one 32-byte key per slot (see [`Entries`]). Only the first
/// `participant_count` slots belong to the round; later slots are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lottery {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Immutable configuration
    pub config: LotteryConfig,
    /// Key allowed to deliver randomness fulfillments
    pub oracle_authority: Pubkey,
    /// Current phase
    pub phase: DrawPhase,
    /// Entries in the running round
    pub participant_count: u64,
    /// Creation time or time of the last resolution
    pub last_draw_time: UnixTimestamp,
    /// Winner of the previous round
    pub last_winner: Option<Pubkey>,
}

impl Lottery {
    pub fn new(config: LotteryConfig, oracle_authority: Pubkey, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            config,
            oracle_authority,
            phase: DrawPhase::Open,
            participant_count: 0,
            last_draw_time: now,
            last_winner: None,
        }
    }

    /// Account space needed for the header plus `participants` entry slots.
    pub fn space_for(participants: usize) -> usize {
        Self::LEN + PUBKEY_BYTES * participants
    }

    /// Account space needed by the current round.
    pub fn space(&self) -> usize {
        Self::space_for(self.participant_count as usize)
    }

    /// Read the header out of account data. Entry slots are left in place.
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let header = data.get(..Self::LEN).ok_or(ProgramError::InvalidAccountData)?;
        let lottery = Self::unpack(header)?;
        if data.len() < lottery.space() {
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(lottery)
    }

    /// Write the header back. Entry slots are not touched.
    pub fn save(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        if data.len() < self.space() {
            return Err(ProgramError::AccountDataTooSmall);
        }
        let header = data
            .get_mut(..Self::LEN)
            .ok_or(ProgramError::AccountDataTooSmall)?;
        Self::pack(*self, header)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn draw_interval(&self) -> u64 {
        self.config.draw_interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.request_confirmations
    }

    pub fn participant_count(&self) -> u64 {
        self.participant_count
    }

    /// Entry at `index` of the running round.
    pub fn participant<E: EntryList>(&self, entries: &E, index: u64) -> Option<Pubkey> {
        if index >= self.participant_count {
            return None;
        }
        entries.get(index)
    }

    /// All entries of the running round, in order. Allocates, so it is meant
    /// for clients and tests rather than instruction processing.
    pub fn participants<E: EntryList>(&self, entries: &E) -> Vec<Pubkey> {
        (0..self.participant_count)
            .filter_map(|index| entries.get(index))
            .collect()
    }
}

impl Sealed for Lottery {}

impl IsInitialized for Lottery {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Lottery {
    const LEN: usize = 1 + 8 + 8 + 32 + 8 + 4 + 2 + 4 + 32 + 1 + 8 + 8 + 1 + 32;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Lottery::LEN];
        let (
            is_initialized,
            entrance_fee,
            draw_interval,
            key_hash,
            subscription_id,
            callback_gas_limit,
            request_confirmations,
            num_words,
            oracle_authority,
            phase,
            participant_count,
            last_draw_time,
            has_winner,
            last_winner,
        ) = array_refs![src, 1, 8, 8, 32, 8, 4, 2, 4, 32, 1, 8, 8, 1, 32];

        let last_winner = match has_winner[0] {
            0 => None,
            1 => Some(Pubkey::new_from_array(*last_winner)),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Lottery {
            is_initialized: is_initialized[0] != 0,
            config: LotteryConfig {
                entrance_fee: u64::from_le_bytes(*entrance_fee),
                draw_interval: u64::from_le_bytes(*draw_interval),
                key_hash: *key_hash,
                subscription_id: u64::from_le_bytes(*subscription_id),
                callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
                request_confirmations: u16::from_le_bytes(*request_confirmations),
                num_words: u32::from_le_bytes(*num_words),
            },
            oracle_authority: Pubkey::new_from_array(*oracle_authority),
            phase: DrawPhase::try_from(phase[0])?,
            participant_count: u64::from_le_bytes(*participant_count),
            last_draw_time: i64::from_le_bytes(*last_draw_time),
            last_winner,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Lottery::LEN];
        let (
            is_initialized_dst,
            entrance_fee_dst,
            draw_interval_dst,
            key_hash_dst,
            subscription_id_dst,
            callback_gas_limit_dst,
            request_confirmations_dst,
            num_words_dst,
            oracle_authority_dst,
            phase_dst,
            participant_count_dst,
            last_draw_time_dst,
            has_winner_dst,
            last_winner_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 8, 4, 2, 4, 32, 1, 8, 8, 1, 32];

        is_initialized_dst[0] = self.is_initialized as u8;
        *entrance_fee_dst = self.config.entrance_fee.to_le_bytes();
        *draw_interval_dst = self.config.draw_interval.to_le_bytes();
        *key_hash_dst = self.config.key_hash;
        *subscription_id_dst = self.config.subscription_id.to_le_bytes();
        *callback_gas_limit_dst = self.config.callback_gas_limit.to_le_bytes();
        *request_confirmations_dst = self.config.request_confirmations.to_le_bytes();
        *num_words_dst = self.config.num_words.to_le_bytes();
        oracle_authority_dst.copy_from_slice(self.oracle_authority.as_ref());
        phase_dst[0] = match self.phase {
            DrawPhase::Open => 0,
            DrawPhase::DrawInProgress => 1,
        };
        *participant_count_dst = self.participant_count.to_le_bytes();
        *last_draw_time_dst = self.last_draw_time.to_le_bytes();
        has_winner_dst[0] = self.last_winner.is_some() as u8;
        last_winner_dst.copy_from_slice(self.last_winner.unwrap_or_default().as_ref());
    }
}

/// Entry slots of a lottery account, read and written in place.
///
/// `data` is the whole account data, header included. Nothing is copied
/// besides the single slot being accessed.
pub struct Entries<D> {
    data: D,
}

impl<D> Entries<D> {
    pub fn new(data: D) -> Self {
        Self { data }
    }

    fn slot_range(index: u64) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(index)
            .ok()?
            .checked_mul(PUBKEY_BYTES)?
            .checked_add(Lottery::LEN)?;
        Some(start..start.checked_add(PUBKEY_BYTES)?)
    }
}

impl<D: AsRef<[u8]> + AsMut<[u8]>> EntryList for Entries<D> {
    fn get(&self, index: u64) -> Option<Pubkey> {
        let slot = self.data.as_ref().get(Self::slot_range(index)?)?;
        Pubkey::try_from(slot).ok()
    }

    fn put(&mut self, index: u64, player: Pubkey) -> bool {
        let Some(range) = Self::slot_range(index) else {
            return false;
        };
        match self.data.as_mut().get_mut(range) {
            Some(slot) => {
                slot.copy_from_slice(player.as_ref());
                true
            }
            None => false,
        }
    }
}

/// Randomness request held by the coordinator until fulfilled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u64,
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// Slot at which the request was made
    pub request_slot: u64,
}

/// Request bookkeeping for one lottery. The draw engine never sees request
/// ids beyond what this account hands out and verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinator {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Lottery served by this coordinator
    pub lottery: Pubkey,
    /// Key allowed to fulfill requests
    pub oracle_authority: Pubkey,
    /// Id handed to the next request
    pub next_request_id: u64,
    /// Outstanding request, if any
    pub pending: Option<PendingRequest>,
}

impl Coordinator {
    pub fn new(lottery: Pubkey, oracle_authority: Pubkey) -> Self {
        Self {
            is_initialized: true,
            lottery,
            oracle_authority,
            next_request_id: 1,
            pending: None,
        }
    }
}

impl Sealed for Coordinator {}

impl IsInitialized for Coordinator {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Coordinator {
    const LEN: usize = 1 + 32 + 32 + 8 + 1 + 8 + 32 + 8 + 2 + 4 + 4 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Coordinator::LEN];
        let (
            is_initialized,
            lottery,
            oracle_authority,
            next_request_id,
            has_pending,
            request_id,
            key_hash,
            subscription_id,
            request_confirmations,
            callback_gas_limit,
            num_words,
            request_slot,
        ) = array_refs![src, 1, 32, 32, 8, 1, 8, 32, 8, 2, 4, 4, 8];

        let pending = match has_pending[0] {
            0 => None,
            1 => Some(PendingRequest {
                request_id: u64::from_le_bytes(*request_id),
                key_hash: *key_hash,
                subscription_id: u64::from_le_bytes(*subscription_id),
                request_confirmations: u16::from_le_bytes(*request_confirmations),
                callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
                num_words: u32::from_le_bytes(*num_words),
                request_slot: u64::from_le_bytes(*request_slot),
            }),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Coordinator {
            is_initialized: is_initialized[0] != 0,
            lottery: Pubkey::new_from_array(*lottery),
            oracle_authority: Pubkey::new_from_array(*oracle_authority),
            next_request_id: u64::from_le_bytes(*next_request_id),
            pending,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Coordinator::LEN];
        let (
            is_initialized_dst,
            lottery_dst,
            oracle_authority_dst,
            next_request_id_dst,
            has_pending_dst,
            request_id_dst,
            key_hash_dst,
            subscription_id_dst,
            request_confirmations_dst,
            callback_gas_limit_dst,
            num_words_dst,
            request_slot_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 8, 1, 8, 32, 8, 2, 4, 4, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        lottery_dst.copy_from_slice(self.lottery.as_ref());
        oracle_authority_dst.copy_from_slice(self.oracle_authority.as_ref());
        *next_request_id_dst = self.next_request_id.to_le_bytes();

        let pending = self.pending.unwrap_or(PendingRequest {
            request_id: 0,
            key_hash: [0u8; 32],
            subscription_id: 0,
            request_confirmations: 0,
            callback_gas_limit: 0,
            num_words: 0,
            request_slot: 0,
        });
        has_pending_dst[0] = self.pending.is_some() as u8;
        *request_id_dst = pending.request_id.to_le_bytes();
        *key_hash_dst = pending.key_hash;
        *subscription_id_dst = pending.subscription_id.to_le_bytes();
        *request_confirmations_dst = pending.request_confirmations.to_le_bytes();
        *callback_gas_limit_dst = pending.callback_gas_limit.to_le_bytes();
        *num_words_dst = pending.num_words.to_le_bytes();
        *request_slot_dst = pending.request_slot.to_le_bytes();
    }
}
