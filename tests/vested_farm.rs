use block_farm::{
    error::FarmError,
    interface::{PositionToken, TokenProgram},
    memory::{BlockClock, NftRegistry, TokenBank},
    state::{FarmConfig, LockPolicy},
    vested::VestedFarm,
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};
use solana_sdk::signature::{Keypair, Signer};

const START_BLOCK: u64 = 1_000;
const REWARD_PER_BLOCK: u64 = 1_000_000_000;

struct Env {
    farm: VestedFarm,
    bank: TokenBank,
    nfts: NftRegistry,
    clock: BlockClock,
    authority: Pubkey,
}

impl Env {
    fn new() -> Self {
        Self::with_rate(REWARD_PER_BLOCK)
    }

    fn with_rate(reward_per_block: u64) -> Self {
        let authority = Keypair::new().pubkey();
        let farm = VestedFarm::new(FarmConfig {
            authority,
            custody: Pubkey::new_unique(),
            reward_mint: Pubkey::new_unique(),
            reward_per_block,
            start_block: START_BLOCK,
        })
        .unwrap();
        Self {
            farm,
            bank: TokenBank::new(),
            nfts: NftRegistry::new("https://positions.example/"),
            clock: BlockClock::at(START_BLOCK),
            authority,
        }
    }

    fn add_pool(&mut self, weight: u64, lock: LockPolicy) -> (u64, Pubkey) {
        let mint = Pubkey::new_unique();
        let id = self
            .farm
            .add_pool(&self.clock, &self.authority, mint, weight, lock)
            .unwrap();
        (id, mint)
    }

    fn user_with(&mut self, mint: &Pubkey, amount: u64) -> Pubkey {
        let user = Keypair::new().pubkey();
        let custody = self.farm.config().custody;
        self.bank.mint_to(mint, &user, amount).unwrap();
        self.bank.approve(mint, &user, &custody, amount);
        user
    }

    fn deposit(&mut self, user: &Pubkey, pool_id: u64, amount: u64) -> Result<u64, ProgramError> {
        self.farm.deposit(
            &mut self.bank,
            &mut self.nfts,
            &self.clock,
            user,
            pool_id,
            amount,
        )
    }

    fn withdraw(&mut self, caller: &Pubkey, pool_id: u64, position_id: u64) -> Result<(), ProgramError> {
        self.farm.withdraw(
            &mut self.bank,
            &mut self.nfts,
            &self.clock,
            caller,
            pool_id,
            position_id,
        )
    }

    fn rewards_of(&self, user: &Pubkey) -> u64 {
        self.bank.balance_of(&self.farm.config().reward_mint, user)
    }
}

#[test]
fn ten_block_vesting_releases_on_the_unlock_block() {
    let mut env = Env::new();
    let (id, mint) = env.add_pool(1, LockPolicy::VestFor { blocks: 10 });
    let user = env.user_with(&mint, 1);

    env.clock.advance(1);
    let position_id = env.deposit(&user, id, 1).unwrap();
    assert_eq!(env.nfts.owner_of(position_id), Ok(user));
    assert_eq!(
        env.farm.position_info(id, position_id).unwrap().unlock_block,
        START_BLOCK + 11
    );

    env.clock.advance(9);
    assert_eq!(
        env.withdraw(&user, id, position_id),
        Err(FarmError::PositionLocked.into())
    );
    assert_eq!(env.bank.balance_of(&mint, &user), 0);

    env.clock.advance(1);
    env.withdraw(&user, id, position_id).unwrap();

    assert_eq!(env.bank.balance_of(&mint, &user), 1);
    assert_eq!(env.rewards_of(&user), 10 * REWARD_PER_BLOCK);
    assert_eq!(env.nfts.owner_of(position_id), Err(FarmError::TokenNotFound.into()));
    assert_eq!(env.nfts.balance_of(&user), 0);
    assert_eq!(
        env.farm.position_info(id, position_id),
        Err(FarmError::PositionNotFound.into())
    );
}

#[test]
fn fixed_unlock_refuses_late_deposits() {
    let mut env = Env::new();
    let unlock = START_BLOCK + 5;
    let (id, mint) = env.add_pool(1, LockPolicy::UnlockAt { block: unlock });
    let early = env.user_with(&mint, 1);
    let late = env.user_with(&mint, 1);

    env.clock.advance(2);
    let position_id = env.deposit(&early, id, 1).unwrap();
    assert_eq!(
        env.farm.position_info(id, position_id).unwrap().unlock_block,
        unlock
    );

    env.clock.advance_to(unlock + 1);
    assert_eq!(env.deposit(&late, id, 1), Err(FarmError::PoolFinished.into()));
    assert_eq!(env.bank.balance_of(&mint, &late), 1);

    env.withdraw(&early, id, position_id).unwrap();
    // accrual continues past the unlock height while the stake stays in
    assert_eq!(env.rewards_of(&early), 4 * REWARD_PER_BLOCK);
}

#[test]
fn every_deposit_gets_its_own_position() {
    let mut env = Env::new();
    let (id, mint) = env.add_pool(1, LockPolicy::VestFor { blocks: 0 });
    let user = env.user_with(&mint, 3);

    env.clock.advance(1);
    let first = env.deposit(&user, id, 1).unwrap();
    env.clock.advance(1);
    let second = env.deposit(&user, id, 2).unwrap();
    assert_ne!(first, second);
    assert_eq!(env.nfts.balance_of(&user), 2);

    env.clock.advance(1);
    env.withdraw(&user, id, first).unwrap();
    env.withdraw(&user, id, second).unwrap();

    // block one goes to the first position, block two is split 1:2
    let expected = REWARD_PER_BLOCK + REWARD_PER_BLOCK / 3 + 2 * REWARD_PER_BLOCK / 3;
    assert!(env.rewards_of(&user) <= expected);
    assert!(expected - env.rewards_of(&user) <= 2);
    assert_eq!(env.bank.balance_of(&mint, &user), 3);
}

#[test]
fn vested_pools_share_emission_by_weight() {
    let mut env = Env::new();
    let (light, mint_a) = env.add_pool(1, LockPolicy::VestFor { blocks: 0 });
    let (heavy, mint_b) = env.add_pool(3, LockPolicy::VestFor { blocks: 0 });
    let a = env.user_with(&mint_a, 10);
    let b = env.user_with(&mint_b, 10);

    env.clock.advance(1);
    let first = env.deposit(&a, light, 10).unwrap();
    let second = env.deposit(&b, heavy, 10).unwrap();

    env.clock.advance(4);
    env.withdraw(&a, light, first).unwrap();
    env.withdraw(&b, heavy, second).unwrap();

    assert_eq!(env.rewards_of(&a), REWARD_PER_BLOCK);
    assert_eq!(env.rewards_of(&b), 3 * REWARD_PER_BLOCK);
    assert_eq!(env.nfts.balance_of(&a) + env.nfts.balance_of(&b), 0);
}

#[test]
fn unknown_position_is_reported() {
    let mut env = Env::new();
    let (id, _) = env.add_pool(1, LockPolicy::VestFor { blocks: 0 });
    let user = Keypair::new().pubkey();

    assert_eq!(
        env.withdraw(&user, id, 42),
        Err(FarmError::PositionNotFound.into())
    );
    assert_eq!(
        env.withdraw(&user, 7, 1),
        Err(FarmError::PoolNotFound.into())
    );
}

#[test]
fn every_position_closes_under_small_emission() {
    for round in 1..=20u64 {
        let mut env = Env::with_rate(7);
        let (id, mint) = env.add_pool(1, LockPolicy::VestFor { blocks: 0 });
        let user = env.user_with(&mint, 1_000);

        let mut seed = round;
        let mut next = || {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            seed >> 33
        };
        let mut positions = Vec::new();
        for _ in 0..8 {
            env.clock.advance(1 + next() % 2);
            positions.push(env.deposit(&user, id, 1 + next() % 100).unwrap());
        }

        for position_id in positions {
            env.clock.advance(1);
            env.withdraw(&user, id, position_id)
                .unwrap_or_else(|e| panic!("round {} position {} stuck: {:?}", round, position_id, e));
        }

        let custody = env.farm.config().custody;
        let reward_mint = env.farm.config().reward_mint;
        let minted = env.bank.total_supply(&reward_mint);
        assert_eq!(env.bank.balance_of(&mint, &user), 1_000);
        assert_eq!(env.bank.balance_of(&mint, &custody), 0);
        assert!(env.rewards_of(&user) <= minted);
        assert_eq!(
            env.bank.balance_of(&reward_mint, &custody),
            minted - env.rewards_of(&user)
        );
        assert_eq!(env.nfts.balance_of(&user), 0);
    }
}
