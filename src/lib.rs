//! Block-driven reward farm. Pools weighted against each other share a fixed
//! per-block emission; stakers earn in proportion to their share of a pool.
//! `Farm` keeps one aggregated position per depositor, `VestedFarm` keeps one
//! locked position per deposit, each identified by its own position token.
//! Tokens move through `memory::TokenBank` off-chain or `spl::SplTokenProgram`
//! inside an instruction.

use solana_program::{
    entrypoint::ProgramResult,
    msg,
    program_error::PrintProgramError,
    pubkey::Pubkey,
};

pub mod engine;
pub mod error;
pub mod farm;
pub mod instruction;
pub mod interface;
pub mod memory;
pub mod processor;
pub mod security;
pub mod spl;
pub mod state;
pub mod utils;
pub mod vested;

use crate::{
    error::FarmError,
    farm::Farm,
    interface::{BlockSource, PositionToken, TokenProgram},
    processor::Processor,
    vested::VestedFarm,
};

/// Simple-farm instruction entry point
pub fn process_farm_instruction<T: TokenProgram + Clone>(
    farm: &mut Farm,
    tokens: &mut T,
    clock: &dyn BlockSource,
    caller: &Pubkey,
    instruction_data: &[u8],
) -> ProgramResult {
    msg!("Farm entrypoint");
    if let Err(error) = Processor::process_farm(farm, tokens, clock, caller, instruction_data) {
        // catch the error so we can print it
        error.print::<FarmError>();
        return Err(error);
    }
    Ok(())
}

/// Vested-farm instruction entry point
pub fn process_vested_instruction<T: TokenProgram + Clone, N: PositionToken + Clone>(
    farm: &mut VestedFarm,
    tokens: &mut T,
    position_tokens: &mut N,
    clock: &dyn BlockSource,
    caller: &Pubkey,
    instruction_data: &[u8],
) -> ProgramResult {
    msg!("Vested farm entrypoint");
    if let Err(error) = Processor::process_vested(
        farm,
        tokens,
        position_tokens,
        clock,
        caller,
        instruction_data,
    ) {
        error.print::<FarmError>();
        return Err(error);
    }
    Ok(())
}
