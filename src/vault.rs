// Lottery Program - Prize Vault
use solana_program::{
    account_info::AccountInfo, msg, program::invoke_signed, pubkey::Pubkey, system_instruction,
};

use crate::{engine::PrizeVault, utils::VAULT_SEED};

/// [`PrizeVault`] backed by the vault PDA. Payouts are system transfers
/// signed with the vault seeds, to one of the accounts passed in.
pub struct AccountVault<'a, 'b> {
    vault_info: &'b AccountInfo<'a>,
    system_program_info: &'b AccountInfo<'a>,
    recipients: &'b [AccountInfo<'a>],
    lottery: Pubkey,
    bump: u8,
}

impl<'a, 'b> AccountVault<'a, 'b> {
    pub fn new(
        vault_info: &'b AccountInfo<'a>,
        system_program_info: &'b AccountInfo<'a>,
        recipients: &'b [AccountInfo<'a>],
        lottery: Pubkey,
        bump: u8,
    ) -> Self {
        Self {
            vault_info,
            system_program_info,
            recipients,
            lottery,
            bump,
        }
    }
}

impl<'a, 'b> PrizeVault for AccountVault<'a, 'b> {
    fn balance(&self) -> u64 {
        self.vault_info.lamports()
    }

    /// Returns false, and the caller reports `PayoutFailed`, only when the
    /// recipient was not supplied or is not writable. On the real runtime a
    /// failed transfer CPI aborts the whole transaction with the system
    /// program's error, so the `Err` branch below is reached only under
    /// harnesses that hand CPI errors back to the program.
    fn send(&mut self, recipient: &Pubkey, amount: u64) -> bool {
        let Some(recipient_info) = self.recipients.iter().find(|info| info.key == recipient) else {
            msg!("Winner account {} was not supplied", recipient);
            return false;
        };
        if !recipient_info.is_writable {
            msg!("Winner account {} is not writable", recipient);
            return false;
        }

        let result = invoke_signed(
            &system_instruction::transfer(self.vault_info.key, recipient, amount),
            &[
                self.vault_info.clone(),
                recipient_info.clone(),
                self.system_program_info.clone(),
            ],
            &[&[VAULT_SEED, self.lottery.as_ref(), &[self.bump]]],
        );
        if let Err(e) = result {
            msg!("Prize transfer failed: {}", e);
            return false;
        }

        msg!(
            "Paid {} SOL to {}",
            crate::utils::lamports_to_sol(amount),
            recipient
        );
        true
    }
}
