use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum FarmError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Pool doesn't exist")]
    PoolNotFound,

    #[error("Pool weight out of range")]
    InvalidWeight,

    #[error("Deposit token already backs a pool")]
    DuplicateDepositToken,

    #[error("Amount must be greater than 0")]
    ZeroAmount,

    #[error("Insufficient allowance")]
    InsufficientAllowance,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Withdraw amount exceeds staked amount")]
    InsufficientStake,

    #[error("Pool is finished")]
    PoolFinished,

    #[error("Position is locked")]
    PositionLocked,

    #[error("Position not found in pool")]
    PositionNotFound,

    #[error("Caller is not owner nor approved")]
    NotOwnerOrApproved,

    #[error("Invalid token id")]
    TokenNotFound,

    #[error("Max total supply reached")]
    MaxSupplyExceeded,

    #[error("Caller is not the farm authority")]
    Unauthorized,

    #[error("Invalid farm configuration")]
    InvalidConfig,

    #[error("Math operation overflow")]
    MathOverflow,

    #[error("Token account not passed in")]
    TokenAccountNotFound,
}

impl From<FarmError> for ProgramError {
    fn from(e: FarmError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for FarmError {
    fn type_of() -> &'static str {
        "FarmError"
    }
}

impl PrintProgramError for FarmError {
    fn print<E>(&self)
    where
        E: 'static
            + std::error::Error
            + DecodeError<E>
            + PrintProgramError
            + num_traits::FromPrimitive,
    {
        msg!("Error: {}", self);
    }
}
