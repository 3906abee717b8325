use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

use crate::error::FarmError;

/// Fixed-point scale applied to `acc_reward_per_share`.
pub const SCALE: u128 = 1_000_000_000_000;

/// Upper bound on a single pool's weight. Keeps `elapsed * rate * weight`
/// well inside `u128` for any `u64` block span and emission rate.
pub const MAX_POOL_WEIGHT: u64 = 1_000_000_000;

pub type PoolId = u64;

/// Identifier handed out by the position token service.
pub type PositionId = u64;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct FarmConfig {
    /// Allowed to add and reweight pools
    pub authority: Pubkey,

    /// Account holding every deposit and the minted reward until it is paid out
    pub custody: Pubkey,

    /// Mint of the reward token
    pub reward_mint: Pubkey,

    /// Reward emitted per block across all pools
    pub reward_per_block: u64,

    /// No pool accrues before this height
    pub start_block: u64,
}

impl FarmConfig {
    pub fn validate(&self) -> Result<(), FarmError> {
        if self.custody == Pubkey::default() || self.reward_mint == Pubkey::default() {
            return Err(FarmError::InvalidConfig);
        }
        if self.reward_per_block == 0 {
            return Err(FarmError::InvalidConfig);
        }
        Ok(())
    }
}

impl Sealed for FarmConfig {}

impl IsInitialized for FarmConfig {
    fn is_initialized(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Lock policy of a pool in the simple farm: there is none.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoLock {}

/// How a vested pool decides when a position may leave.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Every position unlocks at the same height. Deposits are refused once
    /// the height has passed.
    UnlockAt { block: u64 },

    /// Each position unlocks `blocks` after the block it was created in.
    VestFor { blocks: u64 },
}

impl LockPolicy {
    /// Unlock height for a position opened at `current_block`.
    pub fn unlock_block(&self, current_block: u64) -> Result<u64, FarmError> {
        match *self {
            LockPolicy::UnlockAt { block } => {
                if current_block > block {
                    return Err(FarmError::PoolFinished);
                }
                Ok(block)
            }
            LockPolicy::VestFor { blocks } => current_block
                .checked_add(blocks)
                .ok_or(FarmError::MathOverflow),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Pool<L> {
    pub id: PoolId,

    /// Mint of the token staked in this pool
    pub deposit_mint: Pubkey,

    /// Share of the global emission, relative to the farm's total weight
    pub weight: u64,

    /// Last height folded into the accumulator; never goes down
    pub last_synced_block: u64,

    /// Reward per staked unit since creation, scaled by `SCALE`; never goes down
    pub acc_reward_per_share: u128,

    pub lock: L,
}

/// One depositor's aggregated stake in one pool.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq)]
pub struct UserPosition {
    pub staked_amount: u64,

    /// `staked_amount * acc_reward_per_share / SCALE` at the last checkpoint
    pub reward_debt: u128,
}

/// A single deposit identified by its position token.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct VestedPosition {
    pub staked_amount: u64,

    pub reward_debt: u128,

    /// Fixed when the position is opened
    pub unlock_block: u64,
}

impl VestedPosition {
    pub fn is_locked(&self, current_block: u64) -> bool {
        current_block < self.unlock_block
    }
}
