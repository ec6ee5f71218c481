// Lottery Program - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    bpf_loader_upgradeable,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    engine::PrizeVault,
    error::LotteryError,
    instruction::LotteryInstruction,
    oracle::{CoordinatorOracle, RandomWord},
    state::{Coordinator, Entries, Lottery, LotteryConfig},
    utils::{
        find_coordinator_address, find_lottery_address, find_program_data_address,
        find_vault_address, lamports_to_sol, program_upgrade_authority, COORDINATOR_SEED,
        LOTTERY_SEED,
    },
    vault::AccountVault,
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process_instruction(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeLottery { config } => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(program_id, accounts, config)
            }
            LotteryInstruction::EnterDraw { payment } => {
                msg!("Instruction: Enter Draw");
                Self::process_enter_draw(program_id, accounts, payment)
            }
            LotteryInstruction::CheckUpkeep {} => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            LotteryInstruction::PerformUpkeep {} => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            LotteryInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, &random_words)
            }
        }
    }

    fn process_initialize_lottery(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        config: LotteryConfig,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let oracle_authority_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_upgrade_authority(program_id, program_data_info, payer_info.key)?;

        let (expected_lottery, lottery_bump) = find_lottery_address(program_id);
        if *lottery_info.key != expected_lottery {
            msg!("Invalid lottery account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        let (expected_coordinator, coordinator_bump) =
            find_coordinator_address(program_id, lottery_info.key);
        if *coordinator_info.key != expected_coordinator {
            msg!("Invalid coordinator account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        let (expected_vault, _) = find_vault_address(program_id, lottery_info.key);
        if *vault_info.key != expected_vault {
            msg!("Invalid vault account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }

        if lottery_info.owner == program_id || coordinator_info.owner == program_id {
            msg!("Lottery account is already initialized");
            return Err(LotteryError::AlreadyInitialized.into());
        }

        // The vault has no data, so the first deposit alone must make it rent exempt.
        let rent = Rent::get()?;
        config.validate(rent.minimum_balance(0))?;

        let clock = Clock::get()?;
        let lottery = Lottery::new(config, *oracle_authority_info.key, clock.unix_timestamp);
        let space = lottery.space();

        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                lottery_info.key,
                rent.minimum_balance(space),
                space as u64,
                program_id,
            ),
            &[payer_info.clone(), lottery_info.clone(), system_program_info.clone()],
            &[&[LOTTERY_SEED, &[lottery_bump]]],
        )?;
        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                coordinator_info.key,
                rent.minimum_balance(Coordinator::LEN),
                Coordinator::LEN as u64,
                program_id,
            ),
            &[payer_info.clone(), coordinator_info.clone(), system_program_info.clone()],
            &[&[COORDINATOR_SEED, lottery_info.key.as_ref(), &[coordinator_bump]]],
        )?;

        lottery.save(&mut lottery_info.data.borrow_mut())?;
        Coordinator::pack(
            Coordinator::new(*lottery_info.key, *oracle_authority_info.key),
            &mut coordinator_info.data.borrow_mut(),
        )?;

        msg!(
            "Lottery initialized: EntranceFee={} SOL, Interval={}s, Oracle={}",
            lamports_to_sol(config.entrance_fee),
            config.draw_interval,
            oracle_authority_info.key
        );
        Ok(())
    }

    fn process_enter_draw(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        payment: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let entrant_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !entrant_info.is_signer {
            msg!("Entrant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Self::load_lottery(program_id, lottery_info)?;
        Self::check_vault(program_id, lottery_info.key, vault_info)?;

        // One more slot: the entrant pays the extra rent.
        let space = Lottery::space_for(lottery.participant_count() as usize + 1);
        if space > lottery_info.data_len() {
            let rent = Rent::get()?;
            let top_up = rent
                .minimum_balance(space)
                .saturating_sub(lottery_info.lamports());
            if top_up > 0 {
                invoke(
                    &system_instruction::transfer(entrant_info.key, lottery_info.key, top_up),
                    &[entrant_info.clone(), lottery_info.clone(), system_program_info.clone()],
                )?;
            }
            lottery_info.realloc(space, false)?;
        }

        {
            let mut data = lottery_info.data.borrow_mut();
            lottery.enter(*entrant_info.key, payment, &mut Entries::new(&mut data[..]))?;
            lottery.save(&mut data)?;
        }

        invoke(
            &system_instruction::transfer(entrant_info.key, vault_info.key, payment),
            &[entrant_info.clone(), vault_info.clone(), system_program_info.clone()],
        )?;

        msg!(
            "Entry {} accepted, pool is {} SOL",
            lottery.participant_count(),
            lamports_to_sol(vault_info.lamports())
        );
        Ok(())
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;

        let lottery = Self::load_lottery(program_id, lottery_info)?;
        Self::check_vault(program_id, lottery_info.key, vault_info)?;

        let clock = Clock::get()?;
        let check = lottery.check_upkeep(clock.unix_timestamp, vault_info.lamports());
        let data = borsh::to_vec(&check).map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        set_return_data(&data);

        msg!(
            "Upkeep needed: {} (phase={:?}, participants={}, balance={})",
            check.upkeep_needed,
            lottery.phase,
            lottery.participant_count(),
            vault_info.lamports()
        );
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;

        // Anyone may trigger a due draw.
        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Self::load_lottery(program_id, lottery_info)?;
        Self::check_vault(program_id, lottery_info.key, vault_info)?;
        let coordinator = Self::load_coordinator(program_id, lottery_info.key, coordinator_info)?;

        let clock = Clock::get()?;
        let mut oracle = CoordinatorOracle::new(coordinator, clock.slot);
        let request_id =
            lottery.perform_upkeep(clock.unix_timestamp, vault_info.lamports(), &mut oracle)?;

        lottery.save(&mut lottery_info.data.borrow_mut())?;
        Coordinator::pack(oracle.coordinator, &mut coordinator_info.data.borrow_mut())?;

        msg!("Draw requested with request id {}", request_id);
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[RandomWord],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_authority_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        let mut lottery = Self::load_lottery(program_id, lottery_info)?;
        let vault_bump = Self::check_vault(program_id, lottery_info.key, vault_info)?;
        let coordinator = Self::load_coordinator(program_id, lottery_info.key, coordinator_info)?;

        if !oracle_authority_info.is_signer {
            msg!("Oracle authority must sign the fulfillment");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *oracle_authority_info.key != coordinator.oracle_authority {
            msg!("Signer {} is not the oracle authority", oracle_authority_info.key);
            return Err(LotteryError::UnauthorizedOracle.into());
        }

        let clock = Clock::get()?;
        let mut oracle = CoordinatorOracle::new(coordinator, clock.slot);
        let mut vault = AccountVault::new(
            vault_info,
            system_program_info,
            std::slice::from_ref(winner_info),
            *lottery_info.key,
            vault_bump,
        );

        // The reset round is written out before any lamports move.
        let payout = {
            let mut data = lottery_info.data.borrow_mut();
            let payout = lottery.settle(
                request_id,
                random_words,
                clock.unix_timestamp,
                &oracle,
                &Entries::new(&mut data[..]),
                vault.balance(),
            )?;
            lottery.save(&mut data)?;
            payout
        };

        let winner = payout.disburse(&mut lottery, &mut oracle, &mut vault)?;
        Coordinator::pack(oracle.coordinator, &mut coordinator_info.data.borrow_mut())?;

        msg!("Request {} fulfilled, winner {}", request_id, winner);
        Ok(())
    }

    fn load_lottery(program_id: &Pubkey, lottery_info: &AccountInfo) -> Result<Lottery, ProgramError> {
        if lottery_info.owner != program_id {
            msg!("Lottery account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_lottery, _) = find_lottery_address(program_id);
        if *lottery_info.key != expected_lottery {
            msg!("Invalid lottery account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        let data = lottery_info.data.borrow();
        Lottery::load(&data)
    }

    /// Only the program's upgrade authority may create the lottery.
    fn check_upgrade_authority(
        program_id: &Pubkey,
        program_data_info: &AccountInfo,
        signer: &Pubkey,
    ) -> ProgramResult {
        if *program_data_info.key != find_program_data_address(program_id) {
            msg!("Invalid program data account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        if *program_data_info.owner != bpf_loader_upgradeable::id() {
            msg!("Program data account is not owned by the upgradeable loader");
            return Err(ProgramError::IncorrectProgramId);
        }
        let upgrade_authority = program_upgrade_authority(&program_data_info.data.borrow())?;
        if upgrade_authority != Some(*signer) {
            msg!("Signer {} is not the program upgrade authority", signer);
            return Err(LotteryError::NotUpgradeAuthority.into());
        }
        Ok(())
    }

    /// Check the vault address and return its bump seed.
    fn check_vault(
        program_id: &Pubkey,
        lottery: &Pubkey,
        vault_info: &AccountInfo,
    ) -> Result<u8, ProgramError> {
        let (expected_vault, bump) = find_vault_address(program_id, lottery);
        if *vault_info.key != expected_vault {
            msg!("Invalid vault account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        Ok(bump)
    }

    fn load_coordinator(
        program_id: &Pubkey,
        lottery: &Pubkey,
        coordinator_info: &AccountInfo,
    ) -> Result<Coordinator, ProgramError> {
        if coordinator_info.owner != program_id {
            msg!("Coordinator account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_coordinator, _) = find_coordinator_address(program_id, lottery);
        if *coordinator_info.key != expected_coordinator {
            msg!("Invalid coordinator account address");
            return Err(LotteryError::InvalidAccountAddress.into());
        }
        let coordinator = Coordinator::unpack(&coordinator_info.data.borrow())?;
        if coordinator.lottery != *lottery {
            msg!("Coordinator serves a different lottery");
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(coordinator)
    }
}
