//! UrbanCoin Token Contract
//!
//! Fungible reward token for verified recycling. Supply only grows through
//! `mint`, and only addresses in the minter set may call it. The deployer
//! starts as the sole administrator; administrators grow the minter set.
//!
//! ## Invariants
//!
//! - Sum of all balances equals `total_supply`
//! - `total_supply == total_minted - total_burned`
//! - The minter set never shrinks (there is no revoke)
//! - Every check runs before any mutation, so a failed call leaves no trace

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use urbancycle_common::{
    check,
    constants::token,
    errors::{UrbanError, UrbanResult},
    events::{EventLog, UrbanEvent},
    math::{safe_add, safe_sub},
    types::{address_short, require_nonzero, Address, Amount, CallContext},
    validation::{require_positive, supply_matches},
};

// ============ Token State ============

/// UrbanCoin ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UrbanCoinState {
    /// Addresses allowed to grant minter rights
    pub admins: BTreeSet<Address>,
    /// Addresses allowed to mint
    pub minters: BTreeSet<Address>,
    /// Account balances (accounts with a zero balance are dropped)
    pub balances: BTreeMap<Address, Amount>,
    /// Total supply tracking
    pub total_supply: u64,
    /// Total minted (cumulative)
    pub total_minted: u64,
    /// Total burned (cumulative)
    pub total_burned: u64,
}

// No Default: a token without an admin could never authorize a minter.

impl UrbanCoinState {
    /// Create state with `deployer` as the only administrator
    pub fn new(deployer: Address) -> Self {
        let mut admins = BTreeSet::new();
        admins.insert(deployer);
        Self {
            admins,
            minters: BTreeSet::new(),
            balances: BTreeMap::new(),
            total_supply: 0,
            total_minted: 0,
            total_burned: 0,
        }
    }
}

/// A deployed UrbanCoin instance
#[derive(Debug, Clone)]
pub struct UrbanCoin {
    address: Address,
    state: UrbanCoinState,
    events: EventLog,
}

impl UrbanCoin {
    /// Deploy a new token at `address`, administered by `deployer`
    pub fn deploy(deployer: Address, address: Address) -> UrbanResult<Self> {
        require_nonzero(&deployer, "deployer cannot be zero address")?;
        require_nonzero(&address, "token address cannot be zero address")?;
        Ok(Self {
            address,
            state: UrbanCoinState::new(deployer),
            events: EventLog::new(),
        })
    }

    /// Address of this token
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get token name
    pub fn name() -> &'static str {
        token::NAME
    }

    /// Get token symbol
    pub fn symbol() -> &'static str {
        token::SYMBOL
    }

    /// Get token decimals
    pub fn decimals() -> u8 {
        token::DECIMALS
    }

    // ============ Administration ============

    /// Add `target` to the minter set.
    ///
    /// Returns `true` on the first grant, `false` if `target` was already a
    /// minter. Only administrators may call it.
    pub fn authorize_minter(&mut self, ctx: &CallContext, target: Address) -> UrbanResult<bool> {
        self.require_admin(&ctx.caller)?;
        require_nonzero(&target, "minter cannot be zero address")?;

        if !self.state.minters.insert(target) {
            return Ok(false);
        }

        debug!(minter = %address_short(&target), "minter authorized");
        self.events.emit(UrbanEvent::MinterAuthorized {
            minter: target,
            by: ctx.caller,
            block_height: ctx.block_height,
        });
        Ok(true)
    }

    /// Add another administrator. Idempotent.
    pub fn add_admin(&mut self, ctx: &CallContext, target: Address) -> UrbanResult<bool> {
        self.require_admin(&ctx.caller)?;
        require_nonzero(&target, "admin cannot be zero address")?;

        if !self.state.admins.insert(target) {
            return Ok(false);
        }

        self.events.emit(UrbanEvent::AdminAdded {
            admin: target,
            by: ctx.caller,
            block_height: ctx.block_height,
        });
        Ok(true)
    }

    // ============ Supply ============

    /// Mint `amount` to `account`, returning the new balance
    pub fn mint(&mut self, ctx: &CallContext, account: Address, amount: Amount) -> UrbanResult<Amount> {
        // 1. Caller must be a minter
        self.require_minter(&ctx.caller)?;

        // 2. Amount and recipient must be valid
        require_positive(amount)?;
        require_nonzero(&account, "cannot mint to zero address")?;

        // 3. Compute every new value before writing any of them
        let new_supply = safe_add(self.state.total_supply, amount)?;
        let new_minted = safe_add(self.state.total_minted, amount)?;
        let new_balance = safe_add(self.balance_of(&account), amount)?;

        // 4. Apply
        self.state.total_supply = new_supply;
        self.state.total_minted = new_minted;
        self.state.balances.insert(account, new_balance);

        // 5. Emit mint event
        self.events.emit(UrbanEvent::TokenMint {
            to: account,
            amount,
            new_total_supply: new_supply,
            block_height: ctx.block_height,
        });

        Ok(new_balance)
    }

    /// Burn `amount` from `account`, returning the new balance.
    ///
    /// Minter only. Used to reverse a reward whose provenance record could
    /// not be created.
    pub fn burn(&mut self, ctx: &CallContext, account: Address, amount: Amount) -> UrbanResult<Amount> {
        self.require_minter(&ctx.caller)?;
        require_positive(amount)?;

        let new_balance = safe_sub(self.balance_of(&account), amount)?;
        let new_supply = safe_sub(self.state.total_supply, amount)?;
        let new_burned = safe_add(self.state.total_burned, amount)?;

        self.set_balance(account, new_balance);
        self.state.total_supply = new_supply;
        self.state.total_burned = new_burned;

        self.events.emit(UrbanEvent::TokenBurn {
            from: account,
            amount,
            new_total_supply: new_supply,
            block_height: ctx.block_height,
        });

        Ok(new_balance)
    }

    /// Move `amount` from the caller to `to`
    pub fn transfer(&mut self, ctx: &CallContext, to: Address, amount: Amount) -> UrbanResult<()> {
        require_positive(amount)?;
        require_nonzero(&to, "cannot transfer to zero address")?;

        let from = ctx.caller;
        let new_from = safe_sub(self.balance_of(&from), amount)?;
        if from == to {
            // Balance was checked; a self-transfer changes nothing.
            return Ok(());
        }
        let new_to = safe_add(self.balance_of(&to), amount)?;

        self.set_balance(from, new_from);
        self.set_balance(to, new_to);

        self.events.emit(UrbanEvent::TokenTransfer {
            from,
            to,
            amount,
            block_height: ctx.block_height,
        });
        Ok(())
    }

    // ============ Reads ============

    /// Balance of `account` (zero for unknown accounts)
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.state.total_supply
    }

    pub fn is_minter(&self, address: &Address) -> bool {
        self.state.minters.contains(address)
    }

    pub fn is_admin(&self, address: &Address) -> bool {
        self.state.admins.contains(address)
    }

    /// Number of accounts holding a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.state.balances.len()
    }

    /// Snapshot of the full state
    pub fn state(&self) -> &UrbanCoinState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Sum of balances equals total supply, and supply equals minted minus burned
    pub fn check_supply_invariant(&self) -> bool {
        supply_matches(self.state.balances.values(), self.state.total_supply)
            && self.state.total_minted.checked_sub(self.state.total_burned) == Some(self.state.total_supply)
    }

    // ============ Helpers ============

    fn require_admin(&self, caller: &Address) -> UrbanResult<()> {
        check!(
            self.is_admin(caller),
            UrbanError::Unauthorized {
                expected: self.first_admin(),
                actual: *caller,
            }
        );
        Ok(())
    }

    fn require_minter(&self, caller: &Address) -> UrbanResult<()> {
        check!(
            self.is_minter(caller),
            UrbanError::Unauthorized {
                expected: self.state.minters.iter().next().copied().unwrap_or_default(),
                actual: *caller,
            }
        );
        Ok(())
    }

    fn first_admin(&self) -> Address {
        self.state.admins.iter().next().copied().unwrap_or_default()
    }

    fn set_balance(&mut self, account: Address, balance: Amount) {
        if balance == 0 {
            self.state.balances.remove(&account);
        } else {
            self.state.balances.insert(account, balance);
        }
    }
}

/// Format amount for display (whole URB, fractional base units)
pub fn format_amount(amount: u64) -> (u64, u64) {
    let whole = amount / token::ONE;
    let fractional = amount % token::ONE;
    (whole, fractional)
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use urbancycle_common::errors::AmountErrorReason;
    use urbancycle_common::events::EventType;

    const ONE_URB: u64 = token::ONE;

    fn deployer() -> Address {
        [1u8; 32]
    }

    fn manager() -> Address {
        [2u8; 32]
    }

    fn citizen() -> Address {
        [3u8; 32]
    }

    fn ctx(caller: Address) -> CallContext {
        CallContext::new(caller, 100)
    }

    fn create_token() -> UrbanCoin {
        UrbanCoin::deploy(deployer(), [9u8; 32]).unwrap()
    }

    #[test]
    fn test_metadata() {
        assert_eq!(UrbanCoin::name(), "UrbanCoin");
        assert_eq!(UrbanCoin::symbol(), "URB");
        assert_eq!(UrbanCoin::decimals(), 8);
        assert_eq!(format_amount(25 * ONE_URB + 5), (25, 5));
    }

    #[test]
    fn test_deploy_rejects_zero_addresses() {
        assert!(matches!(UrbanCoin::deploy([0u8; 32], [9u8; 32]), Err(UrbanError::InvalidAddress { .. })));
        assert!(matches!(UrbanCoin::deploy(deployer(), [0u8; 32]), Err(UrbanError::InvalidAddress { .. })));
    }

    #[test]
    fn test_authorize_minter_idempotent() {
        let mut token = create_token();

        assert!(token.authorize_minter(&ctx(deployer()), manager()).unwrap());
        assert!(!token.authorize_minter(&ctx(deployer()), manager()).unwrap());
        assert!(token.is_minter(&manager()));
        assert_eq!(token.events().count(EventType::MinterAuthorized), 1);
    }

    #[test]
    fn test_authorize_minter_requires_admin() {
        let mut token = create_token();

        let result = token.authorize_minter(&ctx(citizen()), citizen());
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
        assert!(!token.is_minter(&citizen()));
    }

    #[test]
    fn test_added_admin_can_authorize() {
        let mut token = create_token();
        token.add_admin(&ctx(deployer()), citizen()).unwrap();

        assert!(token.authorize_minter(&ctx(citizen()), manager()).unwrap());
        assert!(token.is_minter(&manager()));
    }

    #[test]
    fn test_mint_authorized() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();

        let balance = token.mint(&ctx(manager()), citizen(), 25 * ONE_URB).unwrap();
        assert_eq!(balance, 25 * ONE_URB);
        assert_eq!(token.balance_of(&citizen()), 25 * ONE_URB);
        assert_eq!(token.total_supply(), 25 * ONE_URB);
        assert!(token.check_supply_invariant());
    }

    #[test]
    fn test_mint_unauthorized() {
        let mut token = create_token();
        let attacker = [99u8; 32];

        let result = token.mint(&ctx(attacker), citizen(), 1000);
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
        assert_eq!(token.total_supply(), 0);
        assert!(!token.events().has_events());
    }

    #[test]
    fn test_deployer_is_not_implicitly_a_minter() {
        let mut token = create_token();
        let result = token.mint(&ctx(deployer()), citizen(), 1000);
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
    }

    #[test]
    fn test_mint_zero_amount() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();

        let result = token.mint(&ctx(manager()), citizen(), 0);
        assert!(matches!(
            result,
            Err(UrbanError::InvalidAmount { reason: AmountErrorReason::Zero, .. })
        ));
    }

    #[test]
    fn test_mint_overflow_leaves_state_untouched() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();
        token.mint(&ctx(manager()), citizen(), u64::MAX - 1).unwrap();

        let before = token.state().clone();
        let result = token.mint(&ctx(manager()), [4u8; 32], 2);
        assert!(matches!(result, Err(UrbanError::Overflow)));
        assert_eq!(token.state(), &before);
    }

    #[test]
    fn test_burn_reverses_mint() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();
        token.mint(&ctx(manager()), citizen(), 1000).unwrap();

        let balance = token.burn(&ctx(manager()), citizen(), 1000).unwrap();
        assert_eq!(balance, 0);
        assert_eq!(token.total_supply(), 0);
        assert_eq!(token.holder_count(), 0);
        assert!(token.check_supply_invariant());
    }

    #[test]
    fn test_burn_insufficient_balance() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();
        token.mint(&ctx(manager()), citizen(), 500).unwrap();

        let result = token.burn(&ctx(manager()), citizen(), 1000);
        assert!(matches!(result, Err(UrbanError::InsufficientBalance { available: 500, requested: 1000 })));
    }

    #[test]
    fn test_transfer_success() {
        let mut token = create_token();
        token.authorize_minter(&ctx(deployer()), manager()).unwrap();
        token.mint(&ctx(manager()), citizen(), 1000).unwrap();

        let bob = [5u8; 32];
        token.transfer(&ctx(citizen()), bob, 600).unwrap();

        assert_eq!(token.balance_of(&citizen()), 400);
        assert_eq!(token.balance_of(&bob), 600);
        assert!(token.check_supply_invariant());
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut token = create_token();
        let result = token.transfer(&ctx(citizen()), [5u8; 32], 10);
        assert!(matches!(result, Err(UrbanError::InsufficientBalance { .. })));
    }

    #[test]
    fn test_balance_of_unknown_is_zero() {
        let token = create_token();
        assert_eq!(token.balance_of(&[42u8; 32]), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mint(u8, u32),
        Burn(u8, u32),
        Transfer(u8, u8, u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 1u32..1_000_000).prop_map(|(a, n)| Op::Mint(a, n)),
            (0u8..4, 1u32..1_000_000).prop_map(|(a, n)| Op::Burn(a, n)),
            (0u8..4, 0u8..4, 1u32..1_000_000).prop_map(|(a, b, n)| Op::Transfer(a, b, n)),
        ]
    }

    fn account(i: u8) -> Address {
        [10 + i; 32]
    }

    proptest! {
        /// Sum of balances equals total supply after any sequence of calls
        #[test]
        fn supply_invariant_holds(ops in proptest::collection::vec(arb_op(), 0..64)) {
            let mut token = create_token();
            token.authorize_minter(&ctx(deployer()), manager()).unwrap();

            for op in ops {
                let _ = match op {
                    Op::Mint(a, n) => token.mint(&ctx(manager()), account(a), n as u64).map(|_| ()),
                    Op::Burn(a, n) => token.burn(&ctx(manager()), account(a), n as u64).map(|_| ()),
                    Op::Transfer(a, b, n) => token.transfer(&ctx(account(a)), account(b), n as u64),
                };
                prop_assert!(token.check_supply_invariant());
            }
        }

        /// Once authorized, a minter keeps minting successfully
        #[test]
        fn minter_set_never_shrinks(amounts in proptest::collection::vec(1u64..1_000_000, 1..32)) {
            let mut token = create_token();
            token.authorize_minter(&ctx(deployer()), manager()).unwrap();

            for amount in amounts {
                prop_assert!(token.mint(&ctx(manager()), citizen(), amount).is_ok());
                // Re-authorizing is a no-op and never removes the grant
                prop_assert!(!token.authorize_minter(&ctx(deployer()), manager()).unwrap());
                prop_assert!(token.is_minter(&manager()));
            }
        }
    }
}
