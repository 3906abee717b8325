use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::FarmError,
    interface::PositionToken,
    state::{FarmConfig, PositionId},
};

pub struct SecurityManager;

impl SecurityManager {
    pub fn verify_authority(caller: &Pubkey, config: &FarmConfig) -> Result<(), ProgramError> {
        if config.authority != *caller {
            msg!("Caller {} is not the farm authority", caller);
            return Err(FarmError::Unauthorized.into());
        }
        Ok(())
    }

    /// The caller must hold the position token or be approved for it.
    pub fn verify_position_operator(
        caller: &Pubkey,
        position_id: PositionId,
        positions: &dyn PositionToken,
    ) -> Result<(), ProgramError> {
        if !positions.is_approved_or_owner(caller, position_id) {
            msg!("Caller {} may not act on position {}", caller, position_id);
            return Err(FarmError::NotOwnerOrApproved.into());
        }
        Ok(())
    }

    pub fn verify_amount(amount: u64) -> Result<(), ProgramError> {
        if amount == 0 {
            return Err(FarmError::ZeroAmount.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NftRegistry;

    #[test]
    fn only_authority_passes() {
        let config = FarmConfig {
            authority: Pubkey::new_unique(),
            custody: Pubkey::new_unique(),
            reward_mint: Pubkey::new_unique(),
            reward_per_block: 1,
            start_block: 0,
        };
        assert!(SecurityManager::verify_authority(&config.authority, &config).is_ok());
        assert_eq!(
            SecurityManager::verify_authority(&Pubkey::new_unique(), &config),
            Err(FarmError::Unauthorized.into())
        );
    }

    #[test]
    fn position_operator_needs_ownership_or_approval() {
        let mut nfts = NftRegistry::new("");
        let (owner, other) = (Pubkey::new_unique(), Pubkey::new_unique());
        let id = nfts.mint(&owner).unwrap();

        assert!(SecurityManager::verify_position_operator(&owner, id, &nfts).is_ok());
        assert_eq!(
            SecurityManager::verify_position_operator(&other, id, &nfts),
            Err(FarmError::NotOwnerOrApproved.into())
        );
        nfts.approve(&owner, &other, id).unwrap();
        assert!(SecurityManager::verify_position_operator(&other, id, &nfts).is_ok());
    }
}
