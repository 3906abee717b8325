//! Vested farm: every deposit is its own position, identified by a freshly
//! minted position token and locked until its unlock height.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    engine::RewardEngine,
    error::FarmError,
    interface::{BlockSource, PositionToken, TokenProgram},
    security::SecurityManager,
    state::{FarmConfig, LockPolicy, Pool, PoolId, PositionId, VestedPosition},
    utils::{pending_reward, reward_debt},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct VestedFarm {
    engine: RewardEngine<LockPolicy>,
    positions: BTreeMap<(PoolId, PositionId), VestedPosition>,
}

impl VestedFarm {
    pub fn new(config: FarmConfig) -> Result<Self, ProgramError> {
        Ok(Self {
            engine: RewardEngine::new(config)?,
            positions: BTreeMap::new(),
        })
    }

    pub fn engine(&self) -> &RewardEngine<LockPolicy> {
        &self.engine
    }

    pub fn config(&self) -> &FarmConfig {
        self.engine.config()
    }

    pub fn pool_info(&self, pool_id: PoolId) -> Result<&Pool<LockPolicy>, ProgramError> {
        self.engine.pool(pool_id)
    }

    pub fn position_info(
        &self,
        pool_id: PoolId,
        position_id: PositionId,
    ) -> Result<&VestedPosition, ProgramError> {
        self.engine.pool(pool_id)?;
        self.positions
            .get(&(pool_id, position_id))
            .ok_or_else(|| FarmError::PositionNotFound.into())
    }

    pub fn positions(&self) -> impl Iterator<Item = (&(PoolId, PositionId), &VestedPosition)> {
        self.positions.iter()
    }

    pub fn add_pool(
        &mut self,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        deposit_mint: Pubkey,
        weight: u64,
        lock: LockPolicy,
    ) -> Result<PoolId, ProgramError> {
        SecurityManager::verify_authority(caller, self.engine.config())?;
        let id = self
            .engine
            .add_pool(deposit_mint, weight, lock, clock.current_height())?;
        msg!("Pool {} lock policy: {:?}", id, lock);
        Ok(id)
    }

    /// Replaces weight and lock policy. Open positions keep the unlock
    /// height they were created with.
    pub fn update_pool(
        &mut self,
        tokens: &mut dyn TokenProgram,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        pool_id: PoolId,
        weight: u64,
        lock: LockPolicy,
        force_sync: bool,
    ) -> ProgramResult {
        SecurityManager::verify_authority(caller, self.engine.config())?;
        self.engine.update_pool(
            pool_id,
            weight,
            lock,
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

    pub fn pending_reward(
        &self,
        tokens: &dyn TokenProgram,
        clock: &dyn BlockSource,
        pool_id: PoolId,
        position_id: PositionId,
    ) -> Result<u64, ProgramError> {
        let position = self.position_info(pool_id, position_id)?;
        let acc = self
            .engine
            .projected_acc_reward_per_share(pool_id, clock.current_height(), tokens)?;
        Ok(pending_reward(position.staked_amount, acc, position.reward_debt)?)
    }

    /// Opens a new position holding `amount` and mints its token to
    /// `depositor`. Returns the position id.
    pub fn deposit(
        &mut self,
        tokens: &mut dyn TokenProgram,
        position_tokens: &mut dyn PositionToken,
        clock: &dyn BlockSource,
        depositor: &Pubkey,
        pool_id: PoolId,
        amount: u64,
    ) -> Result<PositionId, ProgramError> {
        let current_block = clock.current_height();
        let lock = self.engine.pool(pool_id)?.lock;
        SecurityManager::verify_amount(amount)?;
        let unlock_block = lock.unlock_block(current_block).map_err(|e| {
            msg!("Pool {} no longer takes deposits", pool_id);
            e
        })?;

        self.engine.sync_pool(pool_id, current_block, tokens)?;
        let pool = self.engine.pool(pool_id)?;
        let acc = pool.acc_reward_per_share;
        let deposit_mint = pool.deposit_mint;
        let custody = self.engine.config().custody;

        let position = VestedPosition {
            staked_amount: amount,
            reward_debt: reward_debt(amount, acc)?,
            unlock_block,
        };

        let position_id = position_tokens.mint(depositor)?;
        self.positions.insert((pool_id, position_id), position);
        tokens.transfer_from(&deposit_mint, &custody, depositor, &custody, amount)?;

        msg!(
            "Vested deposit: pool={} position={} depositor={} amount={} unlock_block={}",
            pool_id,
            position_id,
            depositor,
            amount,
            unlock_block
        );
        Ok(position_id)
    }

    /// Closes an unlocked position: pays its reward and stake to the token
    /// holder and burns the token. `caller` must hold or be approved for it.
    pub fn withdraw(
        &mut self,
        tokens: &mut dyn TokenProgram,
        position_tokens: &mut dyn PositionToken,
        clock: &dyn BlockSource,
        caller: &Pubkey,
        pool_id: PoolId,
        position_id: PositionId,
    ) -> ProgramResult {
        let current_block = clock.current_height();
        let position = self.position_info(pool_id, position_id)?.clone();
        SecurityManager::verify_position_operator(caller, position_id, position_tokens)?;
        if position.is_locked(current_block) {
            msg!(
                "Position {} locked until block {}, current {}",
                position_id,
                position.unlock_block,
                current_block
            );
            return Err(FarmError::PositionLocked.into());
        }

        self.engine.sync_pool(pool_id, current_block, tokens)?;
        let pool = self.engine.pool(pool_id)?;
        let acc = pool.acc_reward_per_share;
        let deposit_mint = pool.deposit_mint;
        let custody = self.engine.config().custody;

        let holder = position_tokens.owner_of(position_id)?;
        let pending = pending_reward(position.staked_amount, acc, position.reward_debt)?;

        self.positions.remove(&(pool_id, position_id));
        position_tokens.burn(position_id)?;
        let paid = self.engine.pay_reward(tokens, &holder, pending)?;
        tokens.transfer(&deposit_mint, &custody, &holder, position.staked_amount)?;

        msg!(
            "Vested withdraw: pool={} position={} holder={} amount={} reward_paid={}",
            pool_id,
            position_id,
            holder,
            position.staked_amount,
            paid
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BlockClock, NftRegistry, TokenBank};

    const START: u64 = 1_000;
    const R: u64 = 1_000_000_000;

    struct Fixture {
        farm: VestedFarm,
        bank: TokenBank,
        nfts: NftRegistry,
        clock: BlockClock,
        authority: Pubkey,
        mint: Pubkey,
    }

    fn fixture(lock: LockPolicy) -> Fixture {
        let authority = Pubkey::new_unique();
        let mut farm = VestedFarm::new(FarmConfig {
            authority,
            custody: Pubkey::new_unique(),
            reward_mint: Pubkey::new_unique(),
            reward_per_block: R,
            start_block: START,
        })
        .unwrap();
        let clock = BlockClock::at(START);
        let mint = Pubkey::new_unique();
        farm.add_pool(&clock, &authority, mint, 1, lock).unwrap();
        Fixture {
            farm,
            bank: TokenBank::new(),
            nfts: NftRegistry::new("https://example.com/"),
            clock,
            authority,
            mint,
        }
    }

    impl Fixture {
        fn fund(&mut self, user: &Pubkey, amount: u64) {
            let custody = self.farm.config().custody;
            self.bank.mint_to(&self.mint, user, amount).unwrap();
            self.bank.approve(&self.mint, user, &custody, amount);
        }

        fn deposit(&mut self, user: &Pubkey, amount: u64) -> Result<PositionId, ProgramError> {
            self.farm
                .deposit(&mut self.bank, &mut self.nfts, &self.clock, user, 0, amount)
        }

        fn withdraw(&mut self, caller: &Pubkey, id: PositionId) -> ProgramResult {
            self.farm
                .withdraw(&mut self.bank, &mut self.nfts, &self.clock, caller, 0, id)
        }
    }

    #[test]
    fn deposit_mints_position_token() {
        let mut f = fixture(LockPolicy::UnlockAt { block: START + 10_000 });
        let user = Pubkey::new_unique();
        f.fund(&user, 100);

        let id = f.deposit(&user, 100).unwrap();
        assert_eq!(id, f.nfts.latest_token_id());
        assert_eq!(f.nfts.owner_of(id), Ok(user));
        assert_eq!(f.bank.balance_of(&f.mint, &user), 0);
        assert_eq!(f.bank.balance_of(&f.mint, &f.farm.config().custody), 100);

        let position = f.farm.position_info(0, id).unwrap();
        assert_eq!(position.reward_debt, 0);
        assert_eq!(position.unlock_block, START + 10_000);
    }

    #[test]
    fn deposit_failures() {
        let mut f = fixture(LockPolicy::UnlockAt { block: START + 10 });
        let user = Pubkey::new_unique();
        assert_eq!(
            f.farm
                .deposit(&mut f.bank, &mut f.nfts, &f.clock, &user, 1, 1)
                .err(),
            Some(FarmError::PoolNotFound.into())
        );
        assert_eq!(f.deposit(&user, 0).err(), Some(FarmError::ZeroAmount.into()));
        assert_eq!(
            f.deposit(&user, 1).err(),
            Some(FarmError::InsufficientAllowance.into())
        );

        f.fund(&user, 1);
        f.clock.advance_to(START + 11);
        let latest = f.nfts.latest_token_id();
        assert_eq!(f.deposit(&user, 1).err(), Some(FarmError::PoolFinished.into()));
        assert_eq!(f.nfts.latest_token_id(), latest);
    }

    #[test]
    fn unlock_height_accepts_deposit_at_the_height() {
        let mut f = fixture(LockPolicy::UnlockAt { block: START + 10 });
        let user = Pubkey::new_unique();
        f.fund(&user, 1);
        f.clock.advance_to(START + 10);
        let id = f.deposit(&user, 1).unwrap();
        // already unlocked
        f.withdraw(&user, id).unwrap();
    }

    #[test]
    fn pool_wide_lock_blocks_withdraw_until_height() {
        let unlock = START + 10_000;
        let mut f = fixture(LockPolicy::UnlockAt { block: unlock });
        let user = Pubkey::new_unique();
        f.fund(&user, 100);
        f.clock.advance(1);
        let deposit_block = f.clock.current_height();
        let id = f.deposit(&user, 100).unwrap();

        f.clock.advance_to(unlock - 3);
        assert_eq!(f.withdraw(&user, id), Err(FarmError::PositionLocked.into()));

        f.clock.advance_to(unlock + 1);
        f.withdraw(&user, id).unwrap();
        assert_eq!(f.nfts.balance_of(&user), 0);
        assert_eq!(f.bank.balance_of(&f.mint, &user), 100);
        assert_eq!(f.bank.balance_of(&f.mint, &f.farm.config().custody), 0);
        assert_eq!(
            f.bank.balance_of(&f.farm.config().reward_mint, &user),
            R * (unlock + 1 - deposit_block)
        );
        assert_eq!(f.farm.positions().count(), 0);
    }

    #[test]
    fn withdraw_requires_known_position_and_operator() {
        let mut f = fixture(LockPolicy::VestFor { blocks: 0 });
        let (user, stranger) = (Pubkey::new_unique(), Pubkey::new_unique());
        f.fund(&user, 1);
        let id = f.deposit(&user, 1).unwrap();

        assert_eq!(f.withdraw(&user, id + 1), Err(FarmError::PositionNotFound.into()));
        assert_eq!(
            f.farm
                .withdraw(&mut f.bank, &mut f.nfts, &f.clock, &user, 3, id),
            Err(FarmError::PoolNotFound.into())
        );
        assert_eq!(f.withdraw(&stranger, id), Err(FarmError::NotOwnerOrApproved.into()));
    }

    #[test]
    fn approved_operator_withdraws_to_holder() {
        let mut f = fixture(LockPolicy::VestFor { blocks: 2 });
        let (user, operator) = (Pubkey::new_unique(), Pubkey::new_unique());
        f.fund(&user, 10);
        f.clock.advance(1);
        let id = f.deposit(&user, 10).unwrap();
        f.nfts.approve(&user, &operator, id).unwrap();

        f.clock.advance(2);
        f.withdraw(&operator, id).unwrap();
        assert_eq!(f.bank.balance_of(&f.mint, &user), 10);
        assert_eq!(f.bank.balance_of(&f.mint, &operator), 0);
        assert_eq!(f.bank.balance_of(&f.farm.config().reward_mint, &user), 2 * R);
    }

    #[test]
    fn transferred_position_pays_new_holder() {
        let mut f = fixture(LockPolicy::VestFor { blocks: 1 });
        let (user, buyer) = (Pubkey::new_unique(), Pubkey::new_unique());
        f.fund(&user, 10);
        f.clock.advance(1);
        let id = f.deposit(&user, 10).unwrap();
        f.nfts.transfer(&user, &buyer, id).unwrap();
        f.clock.advance(1);

        assert_eq!(f.withdraw(&user, id), Err(FarmError::NotOwnerOrApproved.into()));
        f.withdraw(&buyer, id).unwrap();
        assert_eq!(f.bank.balance_of(&f.mint, &buyer), 10);
        assert_eq!(f.bank.balance_of(&f.farm.config().reward_mint, &buyer), R);
    }

    #[test]
    fn policy_update_leaves_open_positions_alone() {
        let mut f = fixture(LockPolicy::VestFor { blocks: 5 });
        let user = Pubkey::new_unique();
        f.fund(&user, 2);
        let first = f.deposit(&user, 1).unwrap();

        let authority = f.authority;
        f.farm
            .update_pool(
                &mut f.bank,
                &f.clock,
                &authority,
                0,
                2,
                LockPolicy::UnlockAt { block: START + 9_000 },
                false,
            )
            .unwrap();
        let pool = f.farm.pool_info(0).unwrap();
        assert_eq!(pool.weight, 2);
        assert_eq!(pool.lock, LockPolicy::UnlockAt { block: START + 9_000 });

        let second = f.deposit(&user, 1).unwrap();
        assert_eq!(f.farm.position_info(0, first).unwrap().unlock_block, START + 5);
        assert_eq!(
            f.farm.position_info(0, second).unwrap().unlock_block,
            START + 9_000
        );
    }

    #[test]
    fn pending_reward_tracks_each_position() {
        let mut f = fixture(LockPolicy::VestFor { blocks: 100 });
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        f.fund(&a, 1);
        f.fund(&b, 3);
        f.clock.advance(1);
        let first = f.deposit(&a, 1).unwrap();
        f.clock.advance(1);
        let second = f.deposit(&b, 3).unwrap();
        f.clock.advance(1);

        assert_eq!(
            f.farm.pending_reward(&f.bank, &f.clock, 0, first),
            Ok(R + R / 4)
        );
        assert_eq!(
            f.farm.pending_reward(&f.bank, &f.clock, 0, second),
            Ok(3 * R / 4)
        );
        assert_eq!(
            f.farm.pending_reward(&f.bank, &f.clock, 0, 42),
            Err(FarmError::PositionNotFound.into())
        );
    }
}
