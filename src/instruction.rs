use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::state::{LockPolicy, PoolId, PositionId};

/// Instructions accepted by the simple farm. The caller is supplied by the
/// runtime alongside the data, never inside it.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub enum FarmInstruction {
    /// Register a new pool. Authority only.
    AddPool {
        /// Mint of the token staked in the pool
        deposit_mint: Pubkey,
        weight: u64,
    },

    /// Reweight a pool. Authority only.
    UpdatePool {
        pool_id: PoolId,
        weight: u64,
        /// Accrue the pool under its old weight first
        force_sync: bool,
    },

    /// Stake tokens, paying out reward already earned in the pool
    Deposit { pool_id: PoolId, amount: u64 },

    /// Unstake tokens and collect reward. `amount` 0 only collects.
    Withdraw { pool_id: PoolId, amount: u64 },

    /// Take the whole stake back, giving up its reward
    EmergencyWithdraw { pool_id: PoolId },

    SyncPool { pool_id: PoolId },

    SyncAllPools,

    /// Hand the authority role to another key. Authority only.
    TransferAuthority { new_authority: Pubkey },
}

/// Instructions accepted by the vested farm.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub enum VestedFarmInstruction {
    /// Register a new pool with its lock policy. Authority only.
    AddPool {
        deposit_mint: Pubkey,
        weight: u64,
        lock: LockPolicy,
    },

    /// Reweight a pool and replace its lock policy. Authority only.
    UpdatePool {
        pool_id: PoolId,
        weight: u64,
        lock: LockPolicy,
        force_sync: bool,
    },

    /// Open a new position; its token is minted to the caller
    Deposit { pool_id: PoolId, amount: u64 },

    /// Close an unlocked position held by, or approved to, the caller
    Withdraw {
        pool_id: PoolId,
        position_id: PositionId,
    },

    SyncPool { pool_id: PoolId },

    SyncAllPools,

    TransferAuthority { new_authority: Pubkey },
}
