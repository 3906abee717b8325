//! Pool registry and block-driven reward accrual shared by both farm
//! variants. `L` is the lock policy a pool carries: `NoLock` for the simple
//! farm, `LockPolicy` for the vested one.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::FarmError,
    interface::TokenProgram,
    state::{FarmConfig, Pool, PoolId, MAX_POOL_WEIGHT},
    utils::{pool_reward, reward_per_share},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct RewardEngine<L> {
    config: FarmConfig,

    /// Append-only; a pool's id is its index
    pools: Vec<Pool<L>>,

    /// Sum of every pool's weight
    total_weight: u64,
}

impl<L> RewardEngine<L> {
    pub fn new(config: FarmConfig) -> Result<Self, ProgramError> {
        config.validate()?;
        Ok(Self {
            config,
            pools: Vec::new(),
            total_weight: 0,
        })
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    pub fn set_authority(&mut self, authority: Pubkey) {
        self.config.authority = authority;
    }

    pub fn pools(&self) -> &[Pool<L>] {
        &self.pools
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool<L>, ProgramError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.pools.get(index))
            .ok_or_else(|| FarmError::PoolNotFound.into())
    }

    fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool<L>, ProgramError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.pools.get_mut(index))
            .ok_or_else(|| FarmError::PoolNotFound.into())
    }

    /// Deposit-token balance custodied for `pool`, as reported by the token
    /// program rather than tracked here.
    pub fn staked_total(&self, pool: &Pool<L>, tokens: &dyn TokenProgram) -> u64 {
        tokens.balance_of(&pool.deposit_mint, &self.config.custody)
    }

    pub fn add_pool(
        &mut self,
        deposit_mint: Pubkey,
        weight: u64,
        lock: L,
        current_block: u64,
    ) -> Result<PoolId, ProgramError> {
        if weight > MAX_POOL_WEIGHT {
            return Err(FarmError::InvalidWeight.into());
        }
        // custody balances are read per mint, so a mint can back one pool only
        if deposit_mint == self.config.reward_mint
            || self.pools.iter().any(|p| p.deposit_mint == deposit_mint)
        {
            return Err(FarmError::DuplicateDepositToken.into());
        }

        let id = self.pools.len() as PoolId;
        let total_weight = self
            .total_weight
            .checked_add(weight)
            .ok_or(FarmError::MathOverflow)?;

        self.pools.push(Pool {
            id,
            deposit_mint,
            weight,
            last_synced_block: current_block.max(self.config.start_block),
            acc_reward_per_share: 0,
            lock,
        });
        self.total_weight = total_weight;

        msg!(
            "Pool {} added: mint={} weight={} total_weight={}",
            id,
            deposit_mint,
            weight,
            total_weight
        );
        Ok(id)
    }

    /// Reweights a pool and replaces its lock policy. With `force_sync` the
    /// pool is first accrued under its old weight.
    pub fn update_pool(
        &mut self,
        id: PoolId,
        weight: u64,
        lock: L,
        force_sync: bool,
        current_block: u64,
        tokens: &mut dyn TokenProgram,
    ) -> ProgramResult {
        let old_weight = self.pool(id)?.weight;
        if weight > MAX_POOL_WEIGHT {
            return Err(FarmError::InvalidWeight.into());
        }
        if force_sync {
            self.sync_pool(id, current_block, tokens)?;
        }

        let total_weight = self
            .total_weight
            .checked_sub(old_weight)
            .and_then(|w| w.checked_add(weight))
            .ok_or(FarmError::MathOverflow)?;

        let pool = self.pool_mut(id)?;
        pool.weight = weight;
        pool.lock = lock;
        self.total_weight = total_weight;

        msg!(
            "Pool {} updated: weight {} -> {} total_weight={}",
            id,
            old_weight,
            weight,
            total_weight
        );
        Ok(())
    }

    /// Brings the pool's accumulator up to `current_block`, minting the
    /// pool's emission into custody. Returns the amount minted.
    pub fn sync_pool(
        &mut self,
        id: PoolId,
        current_block: u64,
        tokens: &mut dyn TokenProgram,
    ) -> Result<u64, ProgramError> {
        let custody = self.config.custody;
        let reward_mint = self.config.reward_mint;
        let reward_per_block = self.config.reward_per_block;
        let total_weight = self.total_weight;

        let pool = self.pool_mut(id)?;
        if current_block <= pool.last_synced_block {
            return Ok(0);
        }

        let staked_total = tokens.balance_of(&pool.deposit_mint, &custody);
        if staked_total == 0 {
            // emission for an empty pool is forfeited
            pool.last_synced_block = current_block;
            return Ok(0);
        }

        let elapsed = current_block - pool.last_synced_block;
        let reward = pool_reward(elapsed, reward_per_block, pool.weight, total_weight)?;
        let acc_reward_per_share = pool
            .acc_reward_per_share
            .checked_add(reward_per_share(reward, staked_total)?)
            .ok_or(FarmError::MathOverflow)?;

        if reward > 0 {
            tokens.mint_to(&reward_mint, &custody, reward)?;
        }
        pool.acc_reward_per_share = acc_reward_per_share;
        pool.last_synced_block = current_block;

        msg!(
            "Pool {} synced to block {}: minted={} staked={} acc={}",
            id,
            current_block,
            reward,
            staked_total,
            acc_reward_per_share
        );
        Ok(reward)
    }

    pub fn sync_all_pools(
        &mut self,
        current_block: u64,
        tokens: &mut dyn TokenProgram,
    ) -> ProgramResult {
        for id in 0..self.pools.len() as PoolId {
            self.sync_pool(id, current_block, tokens)?;
        }
        Ok(())
    }

    /// Pays up to `amount` of reward from custody to `to` and returns what
    /// was paid. Positions checkpoint their debt rounded down one by one, so
    /// the last payouts of a pool can ask for a few units more than custody
    /// holds; those get the remaining balance.
    pub fn pay_reward(
        &self,
        tokens: &mut dyn TokenProgram,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        let available = tokens.balance_of(&self.config.reward_mint, &self.config.custody);
        let paid = amount.min(available);
        if paid < amount {
            msg!("Reward custody short: owed={} paid={}", amount, paid);
        }
        if paid > 0 {
            tokens.transfer(&self.config.reward_mint, &self.config.custody, to, paid)?;
        }
        Ok(paid)
    }

    /// Accumulator value the pool would hold after a sync at `current_block`.
    pub fn projected_acc_reward_per_share(
        &self,
        id: PoolId,
        current_block: u64,
        tokens: &dyn TokenProgram,
    ) -> Result<u128, ProgramError> {
        let pool = self.pool(id)?;
        if current_block <= pool.last_synced_block {
            return Ok(pool.acc_reward_per_share);
        }
        let staked_total = self.staked_total(pool, tokens);
        let reward = pool_reward(
            current_block - pool.last_synced_block,
            self.config.reward_per_block,
            pool.weight,
            self.total_weight,
        )?;
        Ok(pool
            .acc_reward_per_share
            .checked_add(reward_per_share(reward, staked_total)?)
            .ok_or(FarmError::MathOverflow)?)
    }
}
