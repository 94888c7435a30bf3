//! Token Ledger
//!
//! In-memory fungible-token accounting for the stablecoin and every
//! collateral asset. The engine moves balances through this ledger;
//! mint and burn of the stablecoin are gated by a whitelist the engine
//! owner controls.

use std::collections::{BTreeMap, BTreeSet};

use crate::check;
use crate::errors::{EngineError, EngineResult};
use crate::types::Address;

/// Supply statistics for one token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenSupply {
    /// Outstanding supply
    pub total_supply: u128,
    /// Cumulative minted over the token's lifetime
    pub total_minted: u128,
    /// Cumulative burned over the token's lifetime
    pub total_burned: u128,
}

/// Multi-asset balance ledger with mint/burn whitelisting
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: BTreeMap<(Address, Address), u128>,
    supplies: BTreeMap<Address, TokenSupply>,
    minters: BTreeSet<Address>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `holder` in `token`
    pub fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    /// Supply statistics for `token`
    pub fn supply(&self, token: Address) -> TokenSupply {
        self.supplies.get(&token).copied().unwrap_or_default()
    }

    /// Whether `account` may mint and burn
    pub fn is_minter(&self, account: Address) -> bool {
        self.minters.contains(&account)
    }

    /// Adds an account to the mint/burn whitelist
    pub fn add_minter(&mut self, account: Address) {
        self.minters.insert(account);
    }

    /// Removes an account from the mint/burn whitelist
    pub fn remove_minter(&mut self, account: Address) {
        self.minters.remove(&account);
    }

    /// Moves `amount` of `token` between holders.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> EngineResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let from_balance = self.balance_of(token, from);
        check!(
            from_balance >= amount,
            EngineError::TokenTransferFailed {
                token,
                from,
                to,
                amount,
            }
        );

        self.balances.insert((token, from), from_balance - amount);
        let to_balance = self.balance_of(token, to);
        self.balances.insert((token, to), to_balance + amount);
        Ok(())
    }

    /// Mints `amount` of `token` to `to`. Caller must be whitelisted.
    pub fn mint(
        &mut self,
        caller: Address,
        token: Address,
        to: Address,
        amount: u128,
    ) -> EngineResult<()> {
        check!(self.is_minter(caller), EngineError::NotAuthorized);
        if amount == 0 {
            return Ok(());
        }

        let supply = self.supplies.entry(token).or_default();
        supply.total_supply = supply
            .total_supply
            .checked_add(amount)
            .ok_or(EngineError::Overflow)?;
        supply.total_minted = supply.total_minted.saturating_add(amount);

        let balance = self.balance_of(token, to);
        self.balances.insert((token, to), balance + amount);
        Ok(())
    }

    /// Burns `amount` of `token` held by `from`. Caller must be whitelisted.
    pub fn burn(
        &mut self,
        caller: Address,
        token: Address,
        from: Address,
        amount: u128,
    ) -> EngineResult<()> {
        check!(self.is_minter(caller), EngineError::NotAuthorized);
        if amount == 0 {
            return Ok(());
        }

        let balance = self.balance_of(token, from);
        check!(
            balance >= amount,
            EngineError::TokenTransferFailed {
                token,
                from,
                to: from,
                amount,
            }
        );

        self.balances.insert((token, from), balance - amount);
        let supply = self.supplies.entry(token).or_default();
        supply.total_supply = supply.total_supply.saturating_sub(amount);
        supply.total_burned = supply.total_burned.saturating_add(amount);
        Ok(())
    }
}
