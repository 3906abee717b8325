//! Simple farm: one aggregated position per (pool, depositor).

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    engine::RewardEngine,
    error::FarmError,
    interface::{BlockSource, TokenProgram},
    security::SecurityManager,
    state::{FarmConfig, NoLock, Pool, PoolId, UserPosition},
    utils::{pending_reward, reward_debt},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Farm {
    engine: RewardEngine<NoLock>,
    positions: BTreeMap<(PoolId, Pubkey), UserPosition>,
}

impl Farm {
    pub fn new(config: FarmConfig) -> Result<Self, ProgramError> {
        Ok(Self {
            engine: RewardEngine::new(config)?,
            positions: BTreeMap::new(),
        })
    }

    pub fn engine(&self) -> &RewardEngine<NoLock> {
        &self.engine
    }

    pub fn config(&self) -> &FarmConfig {
        self.engine.config()
    }

    pub fn pool_info(&self, pool_id: PoolId) -> Result<&Pool<NoLock>, ProgramError> {
        self.engine.pool(pool_id)
    }

    /// A depositor without a position reads as an empty one.
    pub fn position_info(
        &self,
        pool_id: PoolId,
        depositor: &Pubkey,
    ) -> Result<UserPosition, ProgramError> {
        self.engine.pool(pool_id)?;
        Ok(self
            .positions
            .get(&(pool_id, *depositor))
            .cloned()
            .unwrap_or_default())
    }

    pub fn positions(&self) -> impl Iterator<Item = (&(PoolId, Pubkey), &UserPosition)> {
        self.positions.iter()
    }

    pub fn add_pool(
        &mut self,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        deposit_mint: Pubkey,
        weight: u64,
    ) -> Result<PoolId, ProgramError> {
        SecurityManager::verify_authority(caller, self.engine.config())?;
        self.engine
            .add_pool(deposit_mint, weight, NoLock {}, clock.current_height())
    }

    pub fn update_pool(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        pool_id: PoolId,
        weight: u64,
        force_sync: bool,
    ) -> ProgramResult {
        SecurityManager::verify_authority(caller, self.engine.config())?;
        self.engine.update_pool(
            pool_id,
            weight,
            NoLock {},
            force_sync,
            clock.current_height(),
            tokens,
        )
    }

    pub fn transfer_authority(&mut self, caller: &Pubkey, new_authority: Pubkey) -> ProgramResult {
        SecurityManager::verify_authority(caller, self.engine.config())?;
        self.engine.set_authority(new_authority);
        msg!("Farm authority transferred to {}", new_authority);
        Ok(())
    }

    pub fn sync_pool(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        pool_id: PoolId,
    ) -> ProgramResult {
        self.engine
            .sync_pool(pool_id, clock.current_height(), tokens)
            .map(|_| ())
    }

    pub fn sync_all_pools(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
    ) -> ProgramResult {
        self.engine.sync_all_pools(clock.current_height(), tokens)
    }

    /// Reward `depositor` would receive if they acted in the current block.
    pub fn pending_reward(
        &self,
        tokens: &dyn TokenProgram,
        clock: &dyn BlockSource,
        pool_id: PoolId,
        depositor: &Pubkey,
    ) -> Result<u64, ProgramError> {
        let acc = self
            .engine
            .projected_acc_reward_per_share(pool_id, clock.current_height(), tokens)?;
        let position = self.position_info(pool_id, depositor)?;
        Ok(pending_reward(position.staked_amount, acc, position.reward_debt)?)
    }

    /// Stakes `amount` more and pays out whatever the existing stake earned.
    pub fn deposit(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        depositor: &Pubkey,
        pool_id: PoolId,
        amount: u64,
    ) -> ProgramResult {
        self.engine.pool(pool_id)?;
        SecurityManager::verify_amount(amount)?;

        self.engine
            .sync_pool(pool_id, clock.current_height(), tokens)?;
        let pool = self.engine.pool(pool_id)?;
        let acc = pool.acc_reward_per_share;
        let deposit_mint = pool.deposit_mint;
        let custody = self.engine.config().custody;

        let key = (pool_id, *depositor);
        let position = self.positions.get(&key).cloned().unwrap_or_default();
        let pending = pending_reward(position.staked_amount, acc, position.reward_debt)?;
        let staked_amount = position
            .staked_amount
            .checked_add(amount)
            .ok_or(FarmError::MathOverflow)?;
        let updated = UserPosition {
            staked_amount,
            reward_debt: reward_debt(staked_amount, acc)?,
        };

        self.positions.insert(key, updated);

        tokens.transfer_from(&deposit_mint, &custody, depositor, &custody, amount)?;
        let paid = self.engine.pay_reward(tokens, depositor, pending)?;

        msg!(
            "Deposit: pool={} depositor={} amount={} staked={} reward_paid={}",
            pool_id,
            depositor,
            amount,
            staked_amount,
            paid
        );
        Ok(())
    }

    /// Unstakes `amount` and pays out the reward earned so far. An amount
    /// of zero only harvests.
    pub fn withdraw(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        depositor: &Pubkey,
        pool_id: PoolId,
        amount: u64,
    ) -> ProgramResult {
        self.engine.pool(pool_id)?;
        let key = (pool_id, *depositor);
        let position = match self.positions.get(&key) {
            Some(position) => position.clone(),
            None if amount == 0 => return Err(FarmError::PositionNotFound.into()),
            None => UserPosition::default(),
        };
        if amount > position.staked_amount {
            msg!(
                "Withdraw of {} exceeds stake of {}",
                amount,
                position.staked_amount
            );
            return Err(FarmError::InsufficientStake.into());
        }

        self.engine
            .sync_pool(pool_id, clock.current_height(), tokens)?;
        let pool = self.engine.pool(pool_id)?;
        let acc = pool.acc_reward_per_share;
        let deposit_mint = pool.deposit_mint;
        let custody = self.engine.config().custody;

        let pending = pending_reward(position.staked_amount, acc, position.reward_debt)?;
        let staked_amount = position.staked_amount - amount;

        if staked_amount == 0 {
            self.positions.remove(&key);
        } else {
            self.positions.insert(
                key,
                UserPosition {
                    staked_amount,
                    reward_debt: reward_debt(staked_amount, acc)?,
                },
            );
        }

        let paid = self.engine.pay_reward(tokens, depositor, pending)?;
        if amount > 0 {
            tokens.transfer(&deposit_mint, &custody, depositor, amount)?;
        }

        msg!(
            "Withdraw: pool={} depositor={} amount={} staked={} reward_paid={}",
            pool_id,
            depositor,
            amount,
            staked_amount,
            paid
        );
        Ok(())
    }

    /// Returns the whole stake without syncing or paying reward. The unpaid
    /// entitlement is forfeited.
    pub fn emergency_withdraw(
        &mut self,
        tokens: &mut dyn TokenProgram,
        depositor: &Pubkey,
        pool_id: PoolId,
    ) -> ProgramResult {
        let deposit_mint = self.engine.pool(pool_id)?.deposit_mint;
        let key = (pool_id, *depositor);
        let position = self
            .positions
            .get(&key)
            .cloned()
            .ok_or(FarmError::PositionNotFound)?;

        self.positions.remove(&key);
        tokens.transfer(
            &deposit_mint,
            &self.engine.config().custody,
            depositor,
            position.staked_amount,
        )?;

        msg!(
            "Emergency withdraw: pool={} depositor={} amount={}",
            pool_id,
            depositor,
            position.staked_amount
        );
        Ok(())
    }
}
