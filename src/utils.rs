use crate::{error::FarmError, state::SCALE};

pub fn scale_up(x: u128) -> Result<u128, FarmError> {
    x.checked_mul(SCALE).ok_or(FarmError::MathOverflow)
}

pub fn scale_down(x: u128) -> u128 {
    x / SCALE
}

/// Emission owed to one pool for `elapsed_blocks`, floored.
/// Returns 0 when the farm carries no weight at all.
pub fn pool_reward(
    elapsed_blocks: u64,
    reward_per_block: u64,
    weight: u64,
    total_weight: u64,
) -> Result<u64, FarmError> {
    if total_weight == 0 {
        return Ok(0);
    }
    (elapsed_blocks as u128)
        .checked_mul(reward_per_block as u128)
        .ok_or(FarmError::MathOverflow)?
        .checked_mul(weight as u128)
        .ok_or(FarmError::MathOverflow)?
        .checked_div(total_weight as u128)
        .ok_or(FarmError::MathOverflow)?
        .try_into()
        .map_err(|_| FarmError::MathOverflow)
}

/// Accumulator increment for `reward` spread over `staked_total` units.
pub fn reward_per_share(reward: u64, staked_total: u64) -> Result<u128, FarmError> {
    if staked_total == 0 {
        return Ok(0);
    }
    Ok(scale_up(reward as u128)? / staked_total as u128)
}

/// `staked * acc / SCALE`, the checkpoint a position stores after a sync.
/// `acc` is split at `SCALE` so the product never needs more than
/// `u64 * acc / SCALE` bits, however far the accumulator has grown.
pub fn reward_debt(staked: u64, acc_reward_per_share: u128) -> Result<u128, FarmError> {
    let staked = staked as u128;
    let whole = staked
        .checked_mul(acc_reward_per_share / SCALE)
        .ok_or(FarmError::MathOverflow)?;
    // remainder < SCALE, so this product stays below 2^64 * 10^12
    let fraction = scale_down(staked * (acc_reward_per_share % SCALE));
    whole.checked_add(fraction).ok_or(FarmError::MathOverflow)
}

pub fn pending_reward(
    staked: u64,
    acc_reward_per_share: u128,
    reward_debt_checkpoint: u128,
) -> Result<u64, FarmError> {
    reward_debt(staked, acc_reward_per_share)?
        .checked_sub(reward_debt_checkpoint)
        .ok_or(FarmError::MathOverflow)?
        .try_into()
        .map_err(|_| FarmError::MathOverflow)
}
