//! Services the farm calls but does not own: fungible tokens, position
//! tokens and the block height. Errors come back as `ProgramError` so they
//! propagate through `?` exactly like a failed CPI would.

use solana_program::{
    clock::Clock, entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey,
};

use crate::state::PositionId;

/// Fungible token program holding balances for any number of mints.
pub trait TokenProgram {
    /// Moves `amount` from `from` to `to`, spending an allowance `from`
    /// granted to `spender`.
    fn transfer_from(
        &mut self,
        mint: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> ProgramResult;

    /// Moves `amount` out of an account the caller controls.
    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64)
        -> ProgramResult;

    /// Fails with `MaxSupplyExceeded` when the mint's cap would be crossed.
    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult;

    fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64;
}

/// Unique, transferable token identifying one vested position.
pub trait PositionToken {
    fn mint(&mut self, to: &Pubkey) -> Result<PositionId, ProgramError>;

    fn burn(&mut self, id: PositionId) -> ProgramResult;

    fn owner_of(&self, id: PositionId) -> Result<Pubkey, ProgramError>;

    fn is_approved_or_owner(&self, caller: &Pubkey, id: PositionId) -> bool;
}

pub trait BlockSource {
    /// Never decreases between calls.
    fn current_height(&self) -> u64;
}

/// On-chain, the block height is the slot.
impl BlockSource for Clock {
    fn current_height(&self) -> u64 {
        self.slot
    }
}
