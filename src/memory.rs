//! In-memory token, position-token and clock services. Everything the farm
//! needs from the outside world, held in plain maps so a whole farm can be
//! driven and inspected off-chain.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::FarmError,
    interface::{BlockSource, PositionToken, TokenProgram},
    state::PositionId,
};

#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    /// (mint, owner) -> balance
    balances: HashMap<(Pubkey, Pubkey), u64>,
    /// (mint, owner, spender) -> remaining allowance
    allowances: HashMap<(Pubkey, Pubkey, Pubkey), u64>,
    supply: HashMap<Pubkey, u64>,
    max_supply: HashMap<Pubkey, u64>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total supply of `mint`. Uncapped mints accept any amount
    /// that fits in a `u64`.
    pub fn set_max_supply(&mut self, mint: &Pubkey, cap: u64) {
        self.max_supply.insert(*mint, cap);
    }

    pub fn max_supply(&self, mint: &Pubkey) -> Option<u64> {
        self.max_supply.get(mint).copied()
    }

    pub fn total_supply(&self, mint: &Pubkey) -> u64 {
        self.supply.get(mint).copied().unwrap_or(0)
    }

    pub fn approve(&mut self, mint: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) {
        self.allowances.insert((*mint, *owner, *spender), amount);
    }

    pub fn allowance(&self, mint: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64 {
        self.allowances
            .get(&(*mint, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn move_balance(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let from_balance = self.balance_of(mint, from);
        if from_balance < amount {
            return Err(FarmError::InsufficientBalance.into());
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(mint, to)
            .checked_add(amount)
            .ok_or(FarmError::MathOverflow)?;
        self.balances.insert((*mint, *from), from_balance - amount);
        self.balances.insert((*mint, *to), to_balance);
        Ok(())
    }
}

impl TokenProgram for TokenBank {
    fn transfer_from(
        &mut self,
        mint: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let allowance = self.allowance(mint, from, spender);
        if allowance < amount {
            msg!("Allowance {} below requested {}", allowance, amount);
            return Err(FarmError::InsufficientAllowance.into());
        }
        self.move_balance(mint, from, to, amount)?;
        self.allowances
            .insert((*mint, *from, *spender), allowance - amount);
        Ok(())
    }

    fn transfer(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        self.move_balance(mint, from, to, amount)
    }

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let supply = self
            .total_supply(mint)
            .checked_add(amount)
            .ok_or(FarmError::MaxSupplyExceeded)?;
        if let Some(cap) = self.max_supply(mint) {
            if supply > cap {
                msg!("Mint of {} would exceed max supply {}", amount, cap);
                return Err(FarmError::MaxSupplyExceeded.into());
            }
        }
        let balance = self
            .balance_of(mint, to)
            .checked_add(amount)
            .ok_or(FarmError::MathOverflow)?;
        self.supply.insert(*mint, supply);
        self.balances.insert((*mint, *to), balance);
        Ok(())
    }

    fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.balances.get(&(*mint, *owner)).copied().unwrap_or(0)
    }
}

/// Sequentially numbered position tokens. Ids start at 1.
#[derive(Debug, Clone, Default)]
pub struct NftRegistry {
    latest_token_id: PositionId,
    owners: BTreeMap<PositionId, Pubkey>,
    approvals: BTreeMap<PositionId, Pubkey>,
    /// (owner, operator) pairs allowed to act on every token of the owner
    operators: BTreeSet<(Pubkey, Pubkey)>,
    base_uri: String,
}

impl NftRegistry {
    pub fn new(base_uri: &str) -> Self {
        Self {
            base_uri: base_uri.to_string(),
            ..Self::default()
        }
    }

    pub fn latest_token_id(&self) -> PositionId {
        self.latest_token_id
    }

    pub fn balance_of(&self, owner: &Pubkey) -> usize {
        self.owners.values().filter(|o| *o == owner).count()
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn set_base_uri(&mut self, base_uri: &str) {
        self.base_uri = base_uri.to_string();
    }

    pub fn token_uri(&self, id: PositionId) -> Result<String, ProgramError> {
        self.owner_of(id)?;
        Ok(format!("{}{}", self.base_uri, id))
    }

    /// Lets `spender` act on token `id`. Only the owner or one of its
    /// operators may grant this.
    pub fn approve(&mut self, caller: &Pubkey, spender: &Pubkey, id: PositionId) -> ProgramResult {
        let owner = self.owner_of(id)?;
        if *caller != owner && !self.operators.contains(&(owner, *caller)) {
            return Err(FarmError::NotOwnerOrApproved.into());
        }
        self.approvals.insert(id, *spender);
        Ok(())
    }

    pub fn set_approval_for_all(&mut self, owner: &Pubkey, operator: &Pubkey, approved: bool) {
        if approved {
            self.operators.insert((*owner, *operator));
        } else {
            self.operators.remove(&(*owner, *operator));
        }
    }

    pub fn transfer(&mut self, caller: &Pubkey, to: &Pubkey, id: PositionId) -> ProgramResult {
        if !self.is_approved_or_owner(caller, id) {
            return Err(FarmError::NotOwnerOrApproved.into());
        }
        self.approvals.remove(&id);
        self.owners.insert(id, *to);
        Ok(())
    }
}

impl PositionToken for NftRegistry {
    fn mint(&mut self, to: &Pubkey) -> Result<PositionId, ProgramError> {
        let id = self
            .latest_token_id
            .checked_add(1)
            .ok_or(FarmError::MathOverflow)?;
        self.latest_token_id = id;
        self.owners.insert(id, *to);
        Ok(id)
    }

    fn burn(&mut self, id: PositionId) -> ProgramResult {
        self.owners
            .remove(&id)
            .ok_or(FarmError::TokenNotFound)?;
        self.approvals.remove(&id);
        Ok(())
    }

    fn owner_of(&self, id: PositionId) -> Result<Pubkey, ProgramError> {
        self.owners
            .get(&id)
            .copied()
            .ok_or_else(|| FarmError::TokenNotFound.into())
    }

    fn is_approved_or_owner(&self, caller: &Pubkey, id: PositionId) -> bool {
        match self.owners.get(&id) {
            Some(owner) => {
                owner == caller
                    || self.approvals.get(&id) == Some(caller)
                    || self.operators.contains(&(*owner, *caller))
            }
            None => false,
        }
    }
}

/// Manually driven block height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockClock {
    height: u64,
}

impl BlockClock {
    pub fn at(height: u64) -> Self {
        Self { height }
    }

    pub fn advance(&mut self, blocks: u64) {
        self.height = self.height.saturating_add(blocks);
    }

    /// Moves to `height`; a lower target leaves the clock where it is.
    pub fn advance_to(&mut self, height: u64) {
        self.height = self.height.max(height);
    }
}

impl BlockSource for BlockClock {
    fn current_height(&self) -> u64 {
        self.height
    }
}
