use borsh::BorshDeserialize;
use solana_program::{entrypoint::ProgramResult, msg, pubkey::Pubkey};

use crate::{
    error::FarmError,
    farm::Farm,
    instruction::{FarmInstruction, VestedFarmInstruction},
    interface::{BlockSource, PositionToken, TokenProgram},
    vested::VestedFarm,
};

pub struct Processor {}

impl Processor {
    /// Decodes and runs one simple-farm instruction. Either all of its
    /// effects on the farm and the token program land, or none do.
    pub fn process_farm<T: TokenProgram + Clone>(
        farm: &mut Farm,
        tokens: &mut T,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = FarmInstruction::try_from_slice(instruction_data).map_err(|e| {
            msg!("Failed to deserialize instruction data: {}", e);
            FarmError::InvalidInstruction
        })?;

        let farm_before = farm.clone();
        let tokens_before = tokens.clone();
        let result = Self::dispatch_farm(farm, tokens, clock, caller, instruction);
        if result.is_err() {
            *farm = farm_before;
            *tokens = tokens_before;
            msg!("Instruction failed, farm state restored");
        }
        result
    }

    /// Decodes and runs one vested-farm instruction with the same
    /// all-or-nothing guarantee, position tokens included.
    pub fn process_vested<T: TokenProgram + Clone, N: PositionToken + Clone>(
        farm: &mut VestedFarm,
        tokens: &mut T,
        position_tokens: &mut N,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = VestedFarmInstruction::try_from_slice(instruction_data).map_err(|e| {
            msg!("Failed to deserialize instruction data: {}", e);
            FarmError::InvalidInstruction
        })?;

        let farm_before = farm.clone();
        let tokens_before = tokens.clone();
        let position_tokens_before = position_tokens.clone();
        let result =
            Self::dispatch_vested(farm, tokens, position_tokens, clock, caller, instruction);
        if result.is_err() {
            *farm = farm_before;
            *tokens = tokens_before;
            *position_tokens = position_tokens_before;
            msg!("Instruction failed, farm state restored");
        }
        result
    }

    fn dispatch_farm(
        farm: &mut Farm,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        instruction: FarmInstruction,
    ) -> ProgramResult {
        match instruction {
            FarmInstruction::AddPool {
                deposit_mint,
                weight,
            } => {
                msg!("Instruction: AddPool");
                farm.add_pool(clock, caller, deposit_mint, weight).map(|_| ())
            }
            FarmInstruction::UpdatePool {
                pool_id,
                weight,
                force_sync,
            } => {
                msg!("Instruction: UpdatePool");
                farm.update_pool(tokens, clock, caller, pool_id, weight, force_sync)
            }
            FarmInstruction::Deposit { pool_id, amount } => {
                msg!("Instruction: Deposit");
                farm.deposit(tokens, clock, caller, pool_id, amount)
            }
            FarmInstruction::Withdraw { pool_id, amount } => {
                msg!("Instruction: Withdraw");
                farm.withdraw(tokens, clock, caller, pool_id, amount)
            }
            FarmInstruction::EmergencyWithdraw { pool_id } => {
                msg!("Instruction: EmergencyWithdraw");
                farm.emergency_withdraw(tokens, caller, pool_id)
            }
            FarmInstruction::SyncPool { pool_id } => {
                msg!("Instruction: SyncPool");
                farm.sync_pool(tokens, clock, pool_id)
            }
            FarmInstruction::SyncAllPools => {
                msg!("Instruction: SyncAllPools");
                farm.sync_all_pools(tokens, clock)
            }
            FarmInstruction::TransferAuthority { new_authority } => {
                msg!("Instruction: TransferAuthority");
                farm.transfer_authority(caller, new_authority)
            }
        }
    }

    fn dispatch_vested(
        farm: &mut VestedFarm,
        tokens: &mut dyn TokenProgram,
        position_tokens: &mut dyn PositionToken,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        instruction: VestedFarmInstruction,
    ) -> ProgramResult {
        match instruction {
            VestedFarmInstruction::AddPool {
                deposit_mint,
                weight,
                lock,
            } => {
                msg!("Instruction: AddPool");
                farm.add_pool(clock, caller, deposit_mint, weight, lock)
                    .map(|_| ())
            }
            VestedFarmInstruction::UpdatePool {
                pool_id,
                weight,
                lock,
                force_sync,
            } => {
                msg!("Instruction: UpdatePool");
                farm.update_pool(tokens, clock, caller, pool_id, weight, lock, force_sync)
            }
            VestedFarmInstruction::Deposit { pool_id, amount } => {
                msg!("Instruction: Deposit");
                farm.deposit(tokens, position_tokens, clock, caller, pool_id, amount)
                    .map(|_| ())
            }
            VestedFarmInstruction::Withdraw {
                pool_id,
                position_id,
            } => {
                msg!("Instruction: Withdraw");
                farm.withdraw(tokens, position_tokens, clock, caller, pool_id, position_id)
            }
            VestedFarmInstruction::SyncPool { pool_id } => {
                msg!("Instruction: SyncPool");
                farm.sync_pool(tokens, clock, pool_id)
            }
            VestedFarmInstruction::SyncAllPools => {
                msg!("Instruction: SyncAllPools");
                farm.sync_all_pools(tokens, clock)
            }
            VestedFarmInstruction::TransferAuthority { new_authority } => {
                msg!("Instruction: TransferAuthority");
                farm.transfer_authority(caller, new_authority)
            }
        }
    }
}
