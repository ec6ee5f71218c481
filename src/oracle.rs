// Lottery Program - Randomness Coordinator
use solana_program::msg;

use crate::{
    engine::{RandomnessOracle, RandomnessRequest, RequestId},
    error::LotteryError,
    state::{Coordinator, PendingRequest},
};

/// One 256-bit random word, big-endian.
pub type RandomWord = [u8; 32];

/// Reduce a random word modulo the number of entries.
///
/// The word is read as a 256-bit big-endian integer, so the result is the
/// same as the full-width `word mod participants`.
pub fn winner_index(word: &RandomWord, participants: u64) -> u64 {
    if participants == 0 {
        return 0;
    }
    let modulus = participants as u128;
    word.iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus) as u64
}

/// Random word holding a small integer value.
pub fn word_from_u64(value: u64) -> RandomWord {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// [`RandomnessOracle`] over the coordinator account of a lottery.
///
/// Requests are logged so the off-chain oracle can pick them up and answer
/// with a `FulfillRandomWords` instruction.
pub struct CoordinatorOracle {
    pub coordinator: Coordinator,
    /// Slot recorded with new requests
    pub slot: u64,
}

impl CoordinatorOracle {
    pub fn new(coordinator: Coordinator, slot: u64) -> Self {
        Self { coordinator, slot }
    }
}

impl RandomnessOracle for CoordinatorOracle {
    fn request_random_words(
        &mut self,
        request: &RandomnessRequest,
    ) -> Result<RequestId, LotteryError> {
        if self.coordinator.pending.is_some() {
            msg!("A randomness request is already outstanding");
            return Err(LotteryError::NotOpen);
        }

        let request_id = self.coordinator.next_request_id;
        self.coordinator.next_request_id = request_id
            .checked_add(1)
            .ok_or(LotteryError::UnknownRequest)?;
        self.coordinator.pending = Some(PendingRequest {
            request_id,
            key_hash: request.key_hash,
            subscription_id: request.subscription_id,
            request_confirmations: request.request_confirmations,
            callback_gas_limit: request.callback_gas_limit,
            num_words: request.num_words,
            request_slot: self.slot,
        });

        msg!(
            "RandomWordsRequested: request_id={}, subscription={}, confirmations={}, gas_limit={}, words={}",
            request_id,
            request.subscription_id,
            request.request_confirmations,
            request.callback_gas_limit,
            request.num_words
        );
        Ok(request_id)
    }

    fn verify_fulfillment(
        &self,
        request_id: RequestId,
        word_count: usize,
    ) -> Result<(), LotteryError> {
        let pending = self.coordinator.pending.ok_or_else(|| {
            msg!("No randomness request outstanding");
            LotteryError::UnknownRequest
        })?;
        if pending.request_id != request_id {
            msg!(
                "Fulfillment for request {} but {} is outstanding",
                request_id,
                pending.request_id
            );
            return Err(LotteryError::UnknownRequest);
        }
        if word_count != pending.num_words as usize {
            msg!("Expected {} random words, got {}", pending.num_words, word_count);
            return Err(LotteryError::UnknownRequest);
        }
        Ok(())
    }

    fn complete_fulfillment(&mut self, request_id: RequestId) -> Result<(), LotteryError> {
        match self.coordinator.pending {
            Some(pending) if pending.request_id == request_id => {
                self.coordinator.pending = None;
                Ok(())
            }
            _ => Err(LotteryError::UnknownRequest),
        }
    }
}
