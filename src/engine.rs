// Lottery Program - Draw Engine
// The entry / upkeep / fulfillment state machine. Randomness, funds and
// entry storage are reached only through the traits below.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

use crate::{
    error::LotteryError,
    event::LotteryEvent,
    oracle::{winner_index, RandomWord},
    state::{DrawPhase, Lottery},
};

pub type RequestId = u64;

/// Parameters of a single randomness request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Source of verifiable randomness.
///
/// The oracle owns request bookkeeping: it hands out request ids and decides
/// whether a fulfillment matches what is outstanding.
pub trait RandomnessOracle {
    fn request_random_words(&mut self, request: &RandomnessRequest)
        -> Result<RequestId, LotteryError>;

    /// Fails with `UnknownRequest` unless `request_id` is outstanding and
    /// `word_count` matches what was asked for.
    fn verify_fulfillment(&self, request_id: RequestId, word_count: usize)
        -> Result<(), LotteryError>;

    /// Retire a verified request.
    fn complete_fulfillment(&mut self, request_id: RequestId) -> Result<(), LotteryError>;
}

/// Holder of the pooled entry fees.
pub trait PrizeVault {
    fn balance(&self) -> u64;

    /// Move `amount` to `recipient`. Returns false when the transfer was
    /// rejected; nothing has moved in that case.
    fn send(&mut self, recipient: &Pubkey, amount: u64) -> bool;
}

/// Ordered entry storage for the running round.
///
/// The lottery tracks how many slots belong to the round; slots past that
/// count are stale and get overwritten by later entries.
pub trait EntryList {
    fn get(&self, index: u64) -> Option<Pubkey>;

    /// Store `player` in slot `index`. Returns false when there is no room.
    fn put(&mut self, index: u64, player: Pubkey) -> bool;
}

/// Result of the read-only upkeep check
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub perform_data: Vec<u8>,
}

/// Round fields changed by a resolution
#[derive(Debug, Clone, Copy)]
struct RoundSnapshot {
    phase: DrawPhase,
    participant_count: u64,
    last_draw_time: UnixTimestamp,
    last_winner: Option<Pubkey>,
}

impl RoundSnapshot {
    fn take(lottery: &Lottery) -> Self {
        Self {
            phase: lottery.phase,
            participant_count: lottery.participant_count,
            last_draw_time: lottery.last_draw_time,
            last_winner: lottery.last_winner,
        }
    }

    fn restore(self, lottery: &mut Lottery) {
        lottery.phase = self.phase;
        lottery.participant_count = self.participant_count;
        lottery.last_draw_time = self.last_draw_time;
        lottery.last_winner = self.last_winner;
    }
}

/// A resolved draw whose prize has not moved yet.
///
/// Entry slots are never cleared, so restoring the round fields brings the
/// whole round back if the transfer is rejected.
#[derive(Debug)]
#[must_use]
pub struct Payout {
    pub request_id: RequestId,
    pub winner: Pubkey,
    pub amount: u64,
    previous: RoundSnapshot,
}

impl Payout {
    /// Send the prize. On rejection the lottery is restored to its
    /// pre-resolution values and `PayoutFailed` is returned.
    pub fn disburse<O, V>(
        self,
        lottery: &mut Lottery,
        oracle: &mut O,
        vault: &mut V,
    ) -> Result<Pubkey, LotteryError>
    where
        O: RandomnessOracle,
        V: PrizeVault,
    {
        if !vault.send(&self.winner, self.amount) {
            msg!("Transfer of {} lamports to {} rejected", self.amount, self.winner);
            self.previous.restore(lottery);
            return Err(LotteryError::PayoutFailed);
        }
        oracle.complete_fulfillment(self.request_id)?;

        LotteryEvent::WinnerPicked { winner: self.winner }.emit();
        Ok(self.winner)
    }
}

impl Lottery {
    /// Add `caller` to the running round.
    ///
    /// Payments above the fee are kept in the pool.
    pub fn enter<E>(&mut self, caller: Pubkey, payment: u64, entries: &mut E) -> Result<(), LotteryError>
    where
        E: EntryList,
    {
        if self.phase != DrawPhase::Open {
            return Err(LotteryError::NotOpen);
        }
        if payment < self.config.entrance_fee {
            msg!(
                "Payment of {} lamports is below the entrance fee of {}",
                payment,
                self.config.entrance_fee
            );
            return Err(LotteryError::InsufficientFee);
        }
        if !entries.put(self.participant_count, caller) {
            msg!("No room for entry {}", self.participant_count);
            return Err(LotteryError::EntryOutOfRange);
        }

        self.participant_count += 1;
        LotteryEvent::EnteredDraw { player: caller }.emit();
        Ok(())
    }

    fn interval_elapsed(&self, now: UnixTimestamp) -> bool {
        let elapsed = now.saturating_sub(self.last_draw_time);
        elapsed >= 0 && elapsed as u64 >= self.config.draw_interval
    }

    /// Whether a draw is due. `balance` is the pool as seen by the vault.
    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepCheck {
        // balance and entries are checked separately: the pool can be topped
        // up from outside without anyone entering.
        let upkeep_needed = self.interval_elapsed(now)
            && self.phase == DrawPhase::Open
            && balance > 0
            && self.participant_count > 0;

        UpkeepCheck {
            upkeep_needed,
            perform_data: Vec::new(),
        }
    }

    /// Close entries and ask the oracle for randomness.
    pub fn perform_upkeep<O>(
        &mut self,
        now: UnixTimestamp,
        balance: u64,
        oracle: &mut O,
    ) -> Result<RequestId, LotteryError>
    where
        O: RandomnessOracle,
    {
        if self.phase != DrawPhase::Open {
            return Err(LotteryError::NotOpen);
        }
        if !self.check_upkeep(now, balance).upkeep_needed {
            return Err(LotteryError::UpkeepNotNeeded {
                balance,
                phase: self.phase,
                participants: self.participant_count,
            });
        }

        self.phase = DrawPhase::DrawInProgress;
        let request = RandomnessRequest {
            key_hash: self.config.key_hash,
            subscription_id: self.config.subscription_id,
            request_confirmations: self.config.request_confirmations,
            callback_gas_limit: self.config.callback_gas_limit,
            num_words: self.config.num_words,
        };
        let request_id = match oracle.request_random_words(&request) {
            Ok(request_id) => request_id,
            Err(e) => {
                self.phase = DrawPhase::Open;
                return Err(e);
            }
        };

        LotteryEvent::DrawRequested { request_id }.emit();
        Ok(request_id)
    }

    /// Pick the winner for a fulfilled request and reset the round.
    ///
    /// Only the winning slot is read from `entries`. State is fully reset
    /// before the returned [`Payout`] moves any funds.
    pub fn settle<O, E>(
        &mut self,
        request_id: RequestId,
        random_words: &[RandomWord],
        now: UnixTimestamp,
        oracle: &O,
        entries: &E,
        balance: u64,
    ) -> Result<Payout, LotteryError>
    where
        O: RandomnessOracle,
        E: EntryList,
    {
        if self.phase != DrawPhase::DrawInProgress {
            msg!("No draw in progress");
            return Err(LotteryError::UnknownRequest);
        }
        oracle.verify_fulfillment(request_id, random_words.len())?;
        let word = random_words.first().ok_or(LotteryError::UnknownRequest)?;
        if self.participant_count == 0 {
            return Err(LotteryError::UnknownRequest);
        }

        let index = winner_index(word, self.participant_count);
        let winner = entries.get(index).ok_or(LotteryError::EntryOutOfRange)?;
        msg!("Winner index {} of {}", index, self.participant_count);

        let previous = RoundSnapshot::take(self);
        self.last_winner = Some(winner);
        self.participant_count = 0;
        self.phase = DrawPhase::Open;
        self.last_draw_time = now;

        Ok(Payout {
            request_id,
            winner,
            amount: balance,
            previous,
        })
    }

    /// Oracle callback: resolve the draw and pay the whole pool to the winner.
    pub fn fulfill_random_words<O, E, V>(
        &mut self,
        request_id: RequestId,
        random_words: &[RandomWord],
        now: UnixTimestamp,
        oracle: &mut O,
        entries: &E,
        vault: &mut V,
    ) -> Result<Pubkey, LotteryError>
    where
        O: RandomnessOracle,
        E: EntryList,
        V: PrizeVault,
    {
        let payout = self.settle(request_id, random_words, now, oracle, entries, vault.balance())?;
        payout.disburse(self, oracle, vault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::word_from_u64;
    use crate::state::LotteryConfig;
    use std::cell::Cell;
    use std::collections::HashMap;

    const FEE: u64 = 10_000_000; // 0.01 SOL
    const INTERVAL: u64 = 100;
    const START: UnixTimestamp = 1_700_000_000;

    #[derive(Default)]
    struct MockOracle {
        next_id: RequestId,
        pending: Option<(RequestId, RandomnessRequest)>,
        requests: Vec<RandomnessRequest>,
        reject_requests: bool,
    }

    impl RandomnessOracle for MockOracle {
        fn request_random_words(
            &mut self,
            request: &RandomnessRequest,
        ) -> Result<RequestId, LotteryError> {
            if self.reject_requests {
                return Err(LotteryError::UnknownRequest);
            }
            self.next_id += 1;
            self.pending = Some((self.next_id, *request));
            self.requests.push(*request);
            Ok(self.next_id)
        }

        fn verify_fulfillment(
            &self,
            request_id: RequestId,
            word_count: usize,
        ) -> Result<(), LotteryError> {
            match self.pending {
                Some((id, request)) if id == request_id && word_count == request.num_words as usize => {
                    Ok(())
                }
                _ => Err(LotteryError::UnknownRequest),
            }
        }

        fn complete_fulfillment(&mut self, request_id: RequestId) -> Result<(), LotteryError> {
            self.verify_fulfillment(request_id, self.pending.map_or(0, |(_, r)| r.num_words as usize))?;
            self.pending = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockVault {
        balance: u64,
        accounts: HashMap<Pubkey, u64>,
        reject: bool,
    }

    impl PrizeVault for MockVault {
        fn balance(&self) -> u64 {
            self.balance
        }

        fn send(&mut self, recipient: &Pubkey, amount: u64) -> bool {
            if self.reject || amount > self.balance {
                return false;
            }
            self.balance -= amount;
            *self.accounts.entry(*recipient).or_default() += amount;
            true
        }
    }

    impl EntryList for Vec<Pubkey> {
        fn get(&self, index: u64) -> Option<Pubkey> {
            self.as_slice().get(index as usize).copied()
        }

        fn put(&mut self, index: u64, player: Pubkey) -> bool {
            let index = index as usize;
            if index < self.len() {
                self[index] = player;
            } else if index == self.len() {
                self.push(player);
            } else {
                return false;
            }
            true
        }
    }

    /// Entry storage that records how many slots were read.
    struct CountingEntries {
        slots: Vec<Pubkey>,
        reads: Cell<usize>,
    }

    impl EntryList for CountingEntries {
        fn get(&self, index: u64) -> Option<Pubkey> {
            self.reads.set(self.reads.get() + 1);
            self.slots.get(index)
        }

        fn put(&mut self, index: u64, player: Pubkey) -> bool {
            self.slots.put(index, player)
        }
    }

    /// Fixed-capacity storage
    struct FullEntries;

    impl EntryList for FullEntries {
        fn get(&self, _index: u64) -> Option<Pubkey> {
            None
        }

        fn put(&mut self, _index: u64, _player: Pubkey) -> bool {
            false
        }
    }

    fn lottery() -> Lottery {
        let config = LotteryConfig {
            entrance_fee: FEE,
            draw_interval: INTERVAL,
            ..LotteryConfig::default()
        };
        Lottery::new(config, Pubkey::new_unique(), START)
    }

    fn enter<E: EntryList>(
        lottery: &mut Lottery,
        entries: &mut E,
        vault: &mut MockVault,
        player: Pubkey,
        payment: u64,
    ) -> Result<(), LotteryError> {
        lottery.enter(player, payment, entries)?;
        vault.balance += payment;
        Ok(())
    }

    #[test]
    fn entries_keep_insertion_order_and_duplicates() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());

        for player in [a, b, a] {
            enter(&mut lottery, &mut entries, &mut vault, player, FEE).unwrap();
        }

        assert_eq!(lottery.participants(&entries), vec![a, b, a]);
        assert_eq!(lottery.participant_count(), 3);
        assert_eq!(lottery.participant(&entries, 1), Some(b));
        assert_eq!(vault.balance, 3 * FEE);
    }

    #[test]
    fn underpaid_entry_is_rejected_without_mutation() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let before = lottery;

        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE / 2, &mut entries),
            Err(LotteryError::InsufficientFee)
        );
        assert_eq!(lottery, before);
        assert!(entries.is_empty());
    }

    #[test]
    fn entry_without_room_is_rejected() {
        let mut lottery = lottery();

        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE, &mut FullEntries),
            Err(LotteryError::EntryOutOfRange)
        );
        assert_eq!(lottery.participant_count(), 0);
    }

    #[test]
    fn overpayment_is_accepted() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE * 3).unwrap();

        assert_eq!(lottery.participant_count(), 1);
        assert_eq!(vault.balance, FEE * 3);
    }

    #[test]
    fn upkeep_not_needed_without_participants() {
        let lottery = lottery();
        let far_future = START + 10 * INTERVAL as i64;

        assert!(!lottery.check_upkeep(far_future, 5 * FEE).upkeep_needed);
    }

    #[test]
    fn upkeep_not_needed_without_balance() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE, &mut Vec::<Pubkey>::new()).unwrap();

        assert!(!lottery.check_upkeep(START + INTERVAL as i64, 0).upkeep_needed);
    }

    #[test]
    fn upkeep_waits_for_interval() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();

        assert!(!lottery.check_upkeep(START + INTERVAL as i64 - 1, vault.balance).upkeep_needed);
        assert!(lottery.check_upkeep(START + INTERVAL as i64, vault.balance).upkeep_needed);
        // clock behind the last draw
        assert!(!lottery.check_upkeep(START - 1, vault.balance).upkeep_needed);
    }

    #[test]
    fn perform_upkeep_reports_diagnostics_when_not_due() {
        let mut lottery = lottery();
        let mut oracle = MockOracle::default();

        let err = lottery.perform_upkeep(START + 1, 0, &mut oracle).unwrap_err();
        assert_eq!(
            err,
            LotteryError::UpkeepNotNeeded {
                balance: 0,
                phase: DrawPhase::Open,
                participants: 0,
            }
        );
        assert_eq!(lottery.phase, DrawPhase::Open);
        assert!(oracle.requests.is_empty());
    }

    #[test]
    fn perform_upkeep_issues_one_request_with_config() {
        let mut lottery = lottery();
        lottery.config.key_hash = [7u8; 32];
        lottery.config.subscription_id = 42;
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();

        let request_id = lottery
            .perform_upkeep(START + INTERVAL as i64, vault.balance, &mut oracle)
            .unwrap();

        assert_eq!(request_id, 1);
        assert_eq!(lottery.phase, DrawPhase::DrawInProgress);
        assert_eq!(
            oracle.requests,
            vec![RandomnessRequest {
                key_hash: [7u8; 32],
                subscription_id: 42,
                request_confirmations: 3,
                callback_gas_limit: 500_000,
                num_words: 1,
            }]
        );
    }

    #[test]
    fn rejected_request_reopens_the_round() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle {
            reject_requests: true,
            ..MockOracle::default()
        };
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();

        assert!(lottery
            .perform_upkeep(START + INTERVAL as i64, vault.balance, &mut oracle)
            .is_err());
        assert_eq!(lottery.phase, DrawPhase::Open);
    }

    #[test]
    fn draw_in_progress_blocks_entry_and_second_request() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();
        let now = START + INTERVAL as i64;
        lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();

        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE, &mut entries),
            Err(LotteryError::NotOpen)
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(
            lottery.perform_upkeep(now + 1, vault.balance, &mut oracle),
            Err(LotteryError::NotOpen)
        );
        assert!(!lottery.check_upkeep(now + 1, vault.balance).upkeep_needed);
        assert_eq!(oracle.requests.len(), 1);
    }

    #[test]
    fn single_entrant_round() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let a = Pubkey::new_unique();

        assert_eq!(
            enter(&mut lottery, &mut entries, &mut vault, a, FEE / 2),
            Err(LotteryError::InsufficientFee)
        );
        enter(&mut lottery, &mut entries, &mut vault, a, FEE).unwrap();
        assert_eq!(lottery.participants(&entries), vec![a]);

        assert!(!lottery.check_upkeep(START + 50, vault.balance).upkeep_needed);
        let now = START + 100;
        assert!(lottery.check_upkeep(now, vault.balance).upkeep_needed);

        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();
        assert_eq!(lottery.phase, DrawPhase::DrawInProgress);
        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE, &mut entries),
            Err(LotteryError::NotOpen)
        );

        let resolved_at = now + 30;
        let winner = lottery
            .fulfill_random_words(
                request_id,
                &[word_from_u64(5)],
                resolved_at,
                &mut oracle,
                &entries,
                &mut vault,
            )
            .unwrap();

        assert_eq!(winner, a);
        assert_eq!(lottery.last_winner, Some(a));
        assert_eq!(lottery.phase, DrawPhase::Open);
        assert!(lottery.participants(&entries).is_empty());
        assert_eq!(lottery.last_draw_time, resolved_at);
        assert_eq!(vault.balance, 0);
        assert_eq!(vault.accounts[&a], FEE);
        assert!(oracle.pending.is_none());
    }

    #[test]
    fn winner_is_random_word_modulo_participants() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let players: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            enter(&mut lottery, &mut entries, &mut vault, *player, FEE).unwrap();
        }
        let now = START + INTERVAL as i64;
        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();

        let winner = lottery
            .fulfill_random_words(request_id, &[word_from_u64(7)], now, &mut oracle, &entries, &mut vault)
            .unwrap();

        assert_eq!(winner, players[2]);
        assert_eq!(vault.accounts[&players[2]], 5 * FEE);
        assert_eq!(vault.accounts.len(), 1);
    }

    #[test]
    fn large_round_reads_only_the_winning_slot() {
        let mut lottery = lottery();
        let mut entries = CountingEntries {
            slots: Vec::new(),
            reads: Cell::new(0),
        };
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let players: Vec<Pubkey> = (0..1_000).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            enter(&mut lottery, &mut entries, &mut vault, *player, FEE).unwrap();
        }
        let now = START + INTERVAL as i64;
        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();

        let winner = lottery
            .fulfill_random_words(request_id, &[word_from_u64(4_321)], now, &mut oracle, &entries, &mut vault)
            .unwrap();

        assert_eq!(winner, players[321]);
        assert_eq!(entries.reads.get(), 1);
        assert_eq!(vault.accounts[&players[321]], 1_000 * FEE);
    }

    #[test]
    fn unknown_request_leaves_state_untouched() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();
        let now = START + INTERVAL as i64;
        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();
        let before = lottery;

        assert_eq!(
            lottery.fulfill_random_words(request_id + 1, &[word_from_u64(1)], now, &mut oracle, &entries, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert_eq!(
            lottery.fulfill_random_words(request_id, &[], now, &mut oracle, &entries, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert_eq!(lottery, before);
        assert_eq!(vault.balance, FEE);
        assert!(oracle.pending.is_some());
    }

    #[test]
    fn fulfillment_while_open_is_rejected() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        enter(&mut lottery, &mut entries, &mut vault, Pubkey::new_unique(), FEE).unwrap();
        let before = lottery;

        assert_eq!(
            lottery.fulfill_random_words(1, &[word_from_u64(1)], START, &mut oracle, &entries, &mut vault),
            Err(LotteryError::UnknownRequest)
        );
        assert_eq!(lottery, before);
    }

    #[test]
    fn rejected_payout_reverts_resolution() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        for player in players {
            enter(&mut lottery, &mut entries, &mut vault, player, FEE).unwrap();
        }
        let now = START + INTERVAL as i64;
        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();
        let before = lottery;
        vault.reject = true;

        assert_eq!(
            lottery.fulfill_random_words(request_id, &[word_from_u64(1)], now + 5, &mut oracle, &entries, &mut vault),
            Err(LotteryError::PayoutFailed)
        );
        assert_eq!(lottery, before);
        assert_eq!(lottery.phase, DrawPhase::DrawInProgress);
        assert_eq!(lottery.last_winner, None);
        assert_eq!(lottery.participants(&entries), players.to_vec());
        assert_eq!(vault.balance, 2 * FEE);
        assert!(oracle.pending.is_some());

        // the oracle may retry once the recipient accepts funds
        vault.reject = false;
        let winner = lottery
            .fulfill_random_words(request_id, &[word_from_u64(1)], now + 6, &mut oracle, &entries, &mut vault)
            .unwrap();
        assert_eq!(winner, players[1]);
    }

    #[test]
    fn settle_resets_state_before_funds_move() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let a = Pubkey::new_unique();
        enter(&mut lottery, &mut entries, &mut vault, a, FEE).unwrap();
        let now = START + INTERVAL as i64;
        let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();

        let payout = lottery
            .settle(request_id, &[word_from_u64(0)], now, &oracle, &entries, vault.balance())
            .unwrap();

        // a reentrant caller sees a finished round
        assert_eq!(lottery.phase, DrawPhase::Open);
        assert_eq!(lottery.participant_count(), 0);
        assert!(!lottery.check_upkeep(now, vault.balance).upkeep_needed);
        assert_eq!(
            lottery
                .settle(request_id, &[word_from_u64(0)], now, &oracle, &entries, vault.balance())
                .unwrap_err(),
            LotteryError::UnknownRequest
        );
        assert_eq!(vault.balance, FEE);

        assert_eq!(payout.disburse(&mut lottery, &mut oracle, &mut vault), Ok(a));
        assert_eq!(vault.balance, 0);
    }

    #[test]
    fn rounds_repeat() {
        let mut lottery = lottery();
        let mut entries: Vec<Pubkey> = Vec::new();
        let mut vault = MockVault::default();
        let mut oracle = MockOracle::default();
        let mut now = START;

        for round in 0..3u64 {
            let player = Pubkey::new_unique();
            enter(&mut lottery, &mut entries, &mut vault, player, FEE).unwrap();
            now += INTERVAL as i64;
            let request_id = lottery.perform_upkeep(now, vault.balance, &mut oracle).unwrap();
            assert_eq!(request_id, round + 1);
            let winner = lottery
                .fulfill_random_words(request_id, &[word_from_u64(round)], now, &mut oracle, &entries, &mut vault)
                .unwrap();
            assert_eq!(winner, player);
        }
        // stale slots are reused rather than appended
        assert_eq!(entries.len(), 1);
        assert_eq!(oracle.requests.len(), 3);
    }
}
