//! `TokenProgram` over SPL token accounts for use inside an instruction.
//! Custody is a program-derived address: it owns the custody token accounts,
//! holds mint authority over the reward mint and is the delegate depositors
//! approve before staking.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::Instruction,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
};
use spl_token::state::Account as TokenAccount;

use crate::{error::FarmError, interface::TokenProgram};

/// Cloning shares the underlying accounts; the runtime discards the writes
/// of a failed transaction.
#[derive(Clone)]
pub struct SplTokenProgram<'a, 'info> {
    token_program: &'a AccountInfo<'info>,
    custody: &'a AccountInfo<'info>,
    custody_seeds: &'a [&'a [u8]],
    mints: &'a [AccountInfo<'info>],
    token_accounts: &'a [AccountInfo<'info>],
}

impl<'a, 'info> SplTokenProgram<'a, 'info> {
    pub fn new(
        token_program: &'a AccountInfo<'info>,
        custody: &'a AccountInfo<'info>,
        custody_seeds: &'a [&'a [u8]],
        mints: &'a [AccountInfo<'info>],
        token_accounts: &'a [AccountInfo<'info>],
    ) -> Result<Self, ProgramError> {
        if *token_program.key != spl_token::id() {
            msg!("Expected token program {}, got {}", spl_token::id(), token_program.key);
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(Self {
            token_program,
            custody,
            custody_seeds,
            mints,
            token_accounts,
        })
    }

    fn unpack(account: &AccountInfo) -> Option<TokenAccount> {
        if *account.owner != spl_token::id() {
            return None;
        }
        let data = account.try_borrow_data().ok()?;
        TokenAccount::unpack(&data).ok()
    }

    /// Token account of `owner` for `mint` among the accounts passed in.
    fn token_account(
        &self,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<(&'a AccountInfo<'info>, TokenAccount), ProgramError> {
        self.token_accounts
            .iter()
            .find_map(|info| {
                Self::unpack(info)
                    .filter(|account| account.mint == *mint && account.owner == *owner)
                    .map(|account| (info, account))
            })
            .ok_or_else(|| {
                msg!("No token account for mint {} owner {}", mint, owner);
                FarmError::TokenAccountNotFound.into()
            })
    }

    fn mint_account(&self, mint: &Pubkey) -> Result<&'a AccountInfo<'info>, ProgramError> {
        self.mints
            .iter()
            .find(|info| info.key == mint)
            .ok_or_else(|| FarmError::TokenAccountNotFound.into())
    }

    fn invoke_as_custody(
        &self,
        instruction: &Instruction,
        accounts: &[AccountInfo<'info>],
    ) -> ProgramResult {
        invoke_signed(instruction, accounts, &[self.custody_seeds])
    }
}

impl<'a, 'info> TokenProgram for SplTokenProgram<'a, 'info> {
    fn transfer_from(
        &mut self,
        mint: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let (source_info, source) = self.token_account(mint, from)?;
        let (destination_info, _) = self.token_account(mint, to)?;
        // only custody can sign, so it is the only spender that works
        let allowance = match source.delegate {
            COption::Some(delegate) if delegate == *spender && spender == self.custody.key => {
                source.delegated_amount
            }
            _ => 0,
        };
        if allowance < amount {
            msg!("Allowance {} below requested {}", allowance, amount);
            return Err(FarmError::InsufficientAllowance.into());
        }
        if source.amount < amount {
            return Err(FarmError::InsufficientBalance.into());
        }

        msg!("Transferring {} of {} from {} into custody", amount, mint, from);
        self.invoke_as_custody(
            &spl_token::instruction::transfer(
                self.token_program.key,
                source_info.key,
                destination_info.key,
                self.custody.key,
                &[],
                amount,
            )?,
            &[
                self.token_program.clone(),
                source_info.clone(),
                destination_info.clone(),
                self.custody.clone(),
            ],
        )
    }

    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        if from != self.custody.key {
            msg!("Only custody can send tokens, not {}", from);
            return Err(FarmError::Unauthorized.into());
        }
        let (source_info, source) = self.token_account(mint, from)?;
        let (destination_info, _) = self.token_account(mint, to)?;
        if source.amount < amount {
            return Err(FarmError::InsufficientBalance.into());
        }

        self.invoke_as_custody(
            &spl_token::instruction::transfer(
                self.token_program.key,
                source_info.key,
                destination_info.key,
                self.custody.key,
                &[],
                amount,
            )?,
            &[
                self.token_program.clone(),
                source_info.clone(),
                destination_info.clone(),
                self.custody.clone(),
            ],
        )
    }

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let mint_info = self.mint_account(mint)?;
        let (destination_info, _) = self.token_account(mint, to)?;

        msg!("Minting {} of {} to {}", amount, mint, to);
        self.invoke_as_custody(
            &spl_token::instruction::mint_to(
                self.token_program.key,
                mint_info.key,
                destination_info.key,
                self.custody.key,
                &[],
                amount,
            )?,
            &[
                self.token_program.clone(),
                mint_info.clone(),
                destination_info.clone(),
                self.custody.clone(),
            ],
        )
    }

    fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.token_account(mint, owner)
            .map(|(_, account)| account.amount)
            .unwrap_or(0)
    }
}
