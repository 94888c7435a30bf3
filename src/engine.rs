//! Engine
//!
//! The orchestrator tying the vault store, sorted index, stability pool,
//! token ledger and price feed together. Every public operation is
//! atomic: a reentrancy flag rejects nested entry, component state is
//! snapshotted on entry, and any error restores the snapshot so no
//! partial mutation ever commits.
//!
//! Timestamps are supplied by the caller and must be monotone; the
//! engine holds no clock of its own.

use tracing::{debug, info, warn};

use crate::check;
use crate::constants::scale::ONE;
use crate::errors::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::math;
use crate::oracle::PriceFeed;
use crate::sorted_index::SortedIndex;
use crate::stability_pool::StabilityPool;
use crate::token::TokenLedger;
use crate::types::{Address, MintRecipient, SystemStats, Vault, VaultHealth, VaultId};
use crate::vault_store::VaultStore;

/// Token accounts the engine moves balances through, wired once by the
/// owner after construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAddresses {
    /// The stablecoin token
    pub stable: Address,
    /// Receives protocol revenue when configured as interest recipient
    pub treasury: Address,
    /// The engine's own account holding vault collateral
    pub custody: Address,
    /// The stability pool's token account
    pub pool_account: Address,
}

/// The CDP engine
#[derive(Debug)]
pub struct Engine {
    pub(crate) owner: Address,
    pub(crate) store: VaultStore,
    pub(crate) index: SortedIndex,
    pub(crate) pool: StabilityPool,
    pub(crate) ledger: TokenLedger,
    pub(crate) oracle: PriceFeed,
    pub(crate) addresses: Option<ProtocolAddresses>,
    pub(crate) mint_recipients: Vec<MintRecipient>,
    pub(crate) default_interest_recipient: Option<Address>,
    in_operation: bool,
    pub(crate) events: Vec<EngineEvent>,
}

impl Engine {
    /// Creates an engine administered by `owner`. The owner starts as
    /// the oracle operator and can rotate it later.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            store: VaultStore::new(),
            index: SortedIndex::new(),
            pool: StabilityPool::new(),
            ledger: TokenLedger::new(),
            oracle: PriceFeed::new(owner),
            addresses: None,
            mint_recipients: Vec::new(),
            default_interest_recipient: None,
            in_operation: false,
            events: Vec::new(),
        }
    }

    // ============ Observers ============

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    pub fn index(&self) -> &SortedIndex {
        &self.index
    }

    pub fn pool(&self) -> &StabilityPool {
        &self.pool
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Host-side mutable access to the token ledger, for crediting
    /// balances that originate outside the engine.
    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    pub fn oracle(&self) -> &PriceFeed {
        &self.oracle
    }

    /// Vault record for (asset, owner), if open
    pub fn vault(&self, asset: Address, owner: Address) -> Option<&Vault> {
        self.store.vault(asset, owner)
    }

    /// Drains the event log accumulated by committed operations
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Point-in-time health report for a vault at the current price
    pub fn vault_health(&self, asset: Address, owner: Address, now: u64) -> EngineResult<VaultHealth> {
        let vault = self
            .store
            .vault(asset, owner)
            .ok_or(EngineError::VaultNotFound { asset, owner })?;
        let price = self.oracle.fetch_price(asset, now)?;

        let cr = self.store.vault_cr(vault, price)?;
        let ncr = math::compute_ncr(vault.collateral, vault.debt)?;
        let ars = self.store.calculate_ars(vault)?;
        let interest_rate = self.store.vault_interest_rate(vault)?;
        Ok(VaultHealth {
            cr,
            ncr,
            ars,
            interest_rate,
            buffer: cr.saturating_sub(vault.mcr),
        })
    }

    /// Aggregate system view
    pub fn system_stats(&self) -> SystemStats {
        let pool_deposits = self.pool.total_deposits();
        let pool_coverage = if self.store.total_protocol_debt == 0 {
            ONE
        } else {
            math::mul_div(pool_deposits, ONE, self.store.total_protocol_debt).unwrap_or(u128::MAX)
        };
        SystemStats {
            active_vaults: self.store.active_vaults,
            total_protocol_debt: self.store.total_protocol_debt,
            total_accrued_debt: self.store.total_accrued_debt,
            pool_deposits,
            pool_coverage,
        }
    }

    /// Walks the sorted list to produce an insert hint for `ars`
    pub fn approx_hint(&self, asset: Address, ars: u128) -> (Option<VaultId>, Option<VaultId>) {
        let store = &self.store;
        self.index.approx_hint(asset, ars, |id| store.ars_of(id))
    }

    /// Compounded stability deposit of an account
    pub fn stability_deposit_of(&self, depositor: Address) -> u128 {
        self.pool.compounded_deposit(depositor)
    }

    /// Pending collateral gains of a depositor for the listed assets
    pub fn pending_stability_gains(
        &self,
        depositor: Address,
        assets: &[Address],
    ) -> Vec<(Address, u128)> {
        assets
            .iter()
            .map(|&a| (a, self.pool.collateral_gain(depositor, a)))
            .filter(|&(_, g)| g > 0)
            .collect()
    }

    // ============ Atomicity ============

    /// Runs a mutating operation under the reentrancy flag, restoring
    /// component state and the event log if it errors.
    fn execute<T>(&mut self, f: impl FnOnce(&mut Self) -> EngineResult<T>) -> EngineResult<T> {
        check!(!self.in_operation, EngineError::ReentrancyBlocked);
        self.in_operation = true;

        let store = self.store.clone();
        let index = self.index.clone();
        let pool = self.pool.clone();
        let ledger = self.ledger.clone();
        let events_mark = self.events.len();

        let result = f(self);
        if result.is_err() {
            self.store = store;
            self.index = index;
            self.pool = pool;
            self.ledger = ledger;
            self.events.truncate(events_mark);
        }
        self.in_operation = false;
        result
    }

    pub(crate) fn addresses(&self) -> EngineResult<ProtocolAddresses> {
        self.addresses.ok_or(EngineError::NotInitialized)
    }

    // ============ Interest Accrual ============

    /// Accrues compound interest on a vault up to `now` and writes it
    /// back. Returns the current (collateral, debt, mcr); all zeros
    /// when no vault is open for the pair.
    fn manage_debt_interest(
        &mut self,
        asset: Address,
        owner: Address,
        now: u64,
    ) -> EngineResult<(u128, u128, u128)> {
        let Some(id) = self.store.id_of(asset, owner) else {
            return Ok((0, 0, 0));
        };
        let mut vault = self
            .store
            .vault_by_id(id)
            .cloned()
            .ok_or(EngineError::VaultNotFound { asset, owner })?;

        let elapsed = now.saturating_sub(vault.last_update);
        if elapsed > 0 && vault.debt > 0 {
            let rate = self.store.vault_interest_rate(&vault)?;
            let factor = math::compound_factor(rate, elapsed)?;
            let new_debt = math::mul_div(vault.debt, factor, ONE)?;
            let accrued = new_debt.saturating_sub(vault.debt);
            if accrued > 0 {
                vault.debt = new_debt;
                self.store.total_accrued_debt = self.store.total_accrued_debt.saturating_add(accrued);
                self.store.total_protocol_debt =
                    self.store.total_protocol_debt.saturating_add(accrued);
                let totals = self.store.totals_mut(asset);
                totals.debt = totals.debt.saturating_add(accrued);
                debug!(accrued, elapsed, "interest accrued");
            }
        }
        vault.last_update = now;
        let current = (vault.collateral, vault.debt, vault.mcr);
        self.store.write_vault(id, vault)?;
        Ok(current)
    }

    /// Re-ranks a vault at its live risk score. A fully stripped vault
    /// still ranks: score zero is reserved by the index, so it is
    /// clamped to the minimum key and lands at the tail.
    fn reinsert_vault(
        &mut self,
        asset: Address,
        id: VaultId,
        prev: Option<VaultId>,
        next: Option<VaultId>,
    ) -> EngineResult<()> {
        let vault = self
            .store
            .vault_by_id(id)
            .ok_or(EngineError::VaultNotFound {
                asset,
                owner: [0u8; 32],
            })?;
        let ars = self.store.calculate_ars(vault)?.max(1);
        let store = &self.store;
        let index = &mut self.index;
        index.re_insert(asset, id, ars, prev, next, |vid| store.ars_of(vid))
    }

    // ============ Vault Operations ============

    /// Opens a vault: pulls collateral from the caller and mints the
    /// requested debt to them.
    #[allow(clippy::too_many_arguments)]
    pub fn create_vault(
        &mut self,
        caller: Address,
        asset: Address,
        coll_amount: u128,
        debt_amount: u128,
        mcr: u128,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            let params = e.store.active_params(asset)?.clone();
            check!(coll_amount > 0 && debt_amount > 0, EngineError::ZeroAmount);

            let (existing_coll, _, _) = e.manage_debt_interest(asset, caller, now)?;
            check!(
                existing_coll == 0,
                EngineError::VaultAlreadyExists { asset, owner: caller }
            );

            let price = e.oracle.fetch_price(asset, now)?;

            let totals = e.store.totals_mut(asset);
            totals.debt = totals.debt.saturating_add(debt_amount);
            totals.collateral = totals.collateral.saturating_add(coll_amount);
            let asset_debt = totals.debt;
            check!(
                asset_debt <= params.mint_cap,
                EngineError::MintCapExceeded {
                    total: asset_debt,
                    cap: params.mint_cap,
                }
            );
            e.store.total_protocol_debt = e.store.total_protocol_debt.saturating_add(debt_amount);
            e.store.active_vaults += 1;

            let vault = Vault {
                owner: caller,
                asset,
                collateral: coll_amount,
                debt: debt_amount,
                mcr,
                last_update: now,
            };
            e.store.check_vault_state(&vault, price)?;
            let ars = e.store.calculate_ars(&vault)?;
            let id = e.store.insert_vault(vault)?;

            let store = &e.store;
            let index = &mut e.index;
            index.insert(asset, id, ars, prev, next, |vid| store.ars_of(vid))?;

            e.ledger.transfer(asset, caller, addrs.custody, coll_amount)?;
            e.ledger
                .mint(addrs.custody, addrs.stable, caller, debt_amount)?;

            info!(debt = debt_amount, coll = coll_amount, "vault created");
            e.events.push(EngineEvent::VaultCreated {
                asset,
                owner: caller,
                collateral: coll_amount,
                debt: debt_amount,
                mcr,
            });
            Ok(())
        })
    }

    /// Adjusts collateral and debt of an open vault. Opposing deltas of
    /// the same kind cannot be combined in one call.
    #[allow(clippy::too_many_arguments)]
    pub fn adjust_vault(
        &mut self,
        caller: Address,
        asset: Address,
        add_coll: u128,
        withdraw_coll: u128,
        add_debt: u128,
        repay_debt: u128,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            let id = e
                .store
                .id_of(asset, caller)
                .ok_or(EngineError::VaultNotFound { asset, owner: caller })?;

            check!(
                add_coll == 0 || withdraw_coll == 0,
                EngineError::InvalidParameter {
                    what: "simultaneous collateral add and withdraw",
                }
            );
            check!(
                add_debt == 0 || repay_debt == 0,
                EngineError::InvalidParameter {
                    what: "simultaneous borrow and repay",
                }
            );
            check!(
                add_coll > 0 || withdraw_coll > 0 || add_debt > 0 || repay_debt > 0,
                EngineError::ZeroAmount
            );

            let (coll, debt, mcr) = e.manage_debt_interest(asset, caller, now)?;
            check!(
                coll >= withdraw_coll,
                EngineError::InvalidParameter {
                    what: "collateral withdrawal exceeds balance",
                }
            );
            check!(
                debt >= repay_debt,
                EngineError::InvalidParameter {
                    what: "repayment exceeds debt",
                }
            );

            let new_coll = coll.saturating_add(add_coll) - withdraw_coll;
            let new_debt = debt.saturating_add(add_debt) - repay_debt;
            let price = e.oracle.fetch_price(asset, now)?;

            let params = e.store.params(asset)?.clone();
            let totals = e.store.totals_mut(asset);
            totals.collateral = totals
                .collateral
                .saturating_add(add_coll)
                .saturating_sub(withdraw_coll);
            totals.debt = totals.debt.saturating_add(add_debt).saturating_sub(repay_debt);
            let asset_debt = totals.debt;
            if add_debt > 0 {
                check!(
                    asset_debt <= params.mint_cap,
                    EngineError::MintCapExceeded {
                        total: asset_debt,
                        cap: params.mint_cap,
                    }
                );
            }
            e.store.total_protocol_debt = e
                .store
                .total_protocol_debt
                .saturating_add(add_debt)
                .saturating_sub(repay_debt);

            let vault = Vault {
                owner: caller,
                asset,
                collateral: new_coll,
                debt: new_debt,
                mcr,
                last_update: now,
            };
            e.store.check_vault_state(&vault, price)?;
            e.store.write_vault(id, vault)?;
            e.reinsert_vault(asset, id, prev, next)?;

            if add_coll > 0 {
                e.ledger.transfer(asset, caller, addrs.custody, add_coll)?;
            }
            if withdraw_coll > 0 {
                e.ledger.transfer(asset, addrs.custody, caller, withdraw_coll)?;
            }
            if add_debt > 0 {
                e.ledger.mint(addrs.custody, addrs.stable, caller, add_debt)?;
            }
            if repay_debt > 0 {
                e.ledger.burn(addrs.custody, addrs.stable, caller, repay_debt)?;
            }

            e.events.push(EngineEvent::VaultAdjusted {
                asset,
                owner: caller,
                collateral: new_coll,
                debt: new_debt,
            });
            Ok(())
        })
    }

    /// Changes the vault's chosen MCR, re-pricing its interest and its
    /// redemption rank in one step.
    pub fn adjust_vault_mcr(
        &mut self,
        caller: Address,
        asset: Address,
        new_mcr: u128,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let id = e
                .store
                .id_of(asset, caller)
                .ok_or(EngineError::VaultNotFound { asset, owner: caller })?;

            let (coll, debt, mcr) = e.manage_debt_interest(asset, caller, now)?;
            check!(
                new_mcr != mcr,
                EngineError::InvalidParameter {
                    what: "MCR unchanged",
                }
            );

            let price = e.oracle.fetch_price(asset, now)?;
            let vault = Vault {
                owner: caller,
                asset,
                collateral: coll,
                debt,
                mcr: new_mcr,
                last_update: now,
            };
            e.store.check_vault_state(&vault, price)?;
            e.store.write_vault(id, vault)?;
            e.reinsert_vault(asset, id, prev, next)?;

            e.events.push(EngineEvent::VaultMcrAdjusted {
                asset,
                owner: caller,
                mcr: new_mcr,
            });
            Ok(())
        })
    }

    /// Closes the caller's vault, burning its debt and returning all
    /// collateral.
    pub fn close_vault(&mut self, caller: Address, asset: Address, now: u64) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            let id = e
                .store
                .id_of(asset, caller)
                .ok_or(EngineError::VaultNotFound { asset, owner: caller })?;

            let (coll, debt, _) = e.manage_debt_interest(asset, caller, now)?;

            let totals = e.store.totals_mut(asset);
            totals.debt = totals.debt.saturating_sub(debt);
            totals.collateral = totals.collateral.saturating_sub(coll);
            e.store.total_protocol_debt = e.store.total_protocol_debt.saturating_sub(debt);
            e.store.active_vaults = e.store.active_vaults.saturating_sub(1);

            e.index.remove(asset, id)?;
            e.store.remove_vault(asset, caller)?;

            e.ledger.burn(addrs.custody, addrs.stable, caller, debt)?;
            e.ledger.transfer(asset, addrs.custody, caller, coll)?;

            info!(debt, coll, "vault closed");
            e.events.push(EngineEvent::VaultClosed {
                asset,
                owner: caller,
                collateral_returned: coll,
                debt_burned: debt,
            });
            Ok(())
        })
    }

    /// Moves the caller's vault to `recipient` wholesale. The accrual
    /// anchor travels with the record, so interest keeps compounding
    /// without a gap.
    pub fn transfer_vault_ownership(
        &mut self,
        caller: Address,
        asset: Address,
        recipient: Address,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            check!(
                recipient != caller,
                EngineError::InvalidParameter {
                    what: "cannot transfer a vault to its owner",
                }
            );
            let id = e
                .store
                .id_of(asset, caller)
                .ok_or(EngineError::VaultNotFound { asset, owner: caller })?;
            check!(
                e.store.id_of(asset, recipient).is_none(),
                EngineError::VaultAlreadyExists {
                    asset,
                    owner: recipient,
                }
            );

            let (coll, debt, mcr) = e.manage_debt_interest(asset, caller, now)?;
            let price = e.oracle.fetch_price(asset, now)?;
            let cr = math::compute_cr(coll, debt, price)?;
            check!(cr > mcr, EngineError::VaultBelowMcr { cr, mcr });

            // The rank is unchanged by an ownership move; compute it
            // before unlinking and splice straight back.
            let vault = e
                .store
                .vault_by_id(id)
                .ok_or(EngineError::VaultNotFound { asset, owner: caller })?;
            let ars = e.store.calculate_ars(vault)?.max(1);

            e.index.remove(asset, id)?;
            e.store.rekey_owner(asset, caller, recipient)?;
            let store = &e.store;
            let index = &mut e.index;
            index.insert(asset, id, ars, prev, next, |vid| store.ars_of(vid))?;

            e.events.push(EngineEvent::VaultOwnershipTransferred {
                asset,
                from: caller,
                to: recipient,
            });
            Ok(())
        })
    }

    /// Liquidates an undercollateralized vault against the stability
    /// pool. The pool absorbs as much debt as it holds; a vault larger
    /// than the pool is liquidated partially and re-ranked.
    pub fn liquidate_vault(
        &mut self,
        asset: Address,
        owner: Address,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            let params = e.store.params(asset)?.clone();
            let id = e
                .store
                .id_of(asset, owner)
                .ok_or(EngineError::VaultNotFound { asset, owner })?;

            let (coll, debt, mcr) = e.manage_debt_interest(asset, owner, now)?;
            let price = e.oracle.fetch_price(asset, now)?;
            let cr = math::compute_cr(coll, debt, price)?;
            check!(cr < mcr, EngineError::VaultNotLiquidatable { cr, mcr });
            check!(e.pool.total_deposits() > 0, EngineError::StabilityPoolEmpty);

            let debt_to_offset = debt.min(e.pool.total_deposits());
            let (sp_collateral, surplus) =
                liquidation_distribution(coll, debt_to_offset, params.liquidation_penalty, price)?;

            let full = debt_to_offset == debt;
            if full {
                e.store.active_vaults = e.store.active_vaults.saturating_sub(1);
                let totals = e.store.totals_mut(asset);
                totals.debt = totals.debt.saturating_sub(debt);
                totals.collateral = totals.collateral.saturating_sub(coll);
                e.index.remove(asset, id)?;
                e.store.remove_vault(asset, owner)?;
            } else {
                let totals = e.store.totals_mut(asset);
                totals.debt = totals.debt.saturating_sub(debt_to_offset);
                totals.collateral = totals.collateral.saturating_sub(sp_collateral);
                let remaining = Vault {
                    owner,
                    asset,
                    collateral: coll - sp_collateral,
                    debt: debt - debt_to_offset,
                    mcr,
                    last_update: now,
                };
                e.store.write_vault(id, remaining)?;
                e.reinsert_vault(asset, id, prev, next)?;
            }
            e.store.total_protocol_debt =
                e.store.total_protocol_debt.saturating_sub(debt_to_offset);

            e.pool
                .offset_debt(debt_to_offset, asset, params.index, sp_collateral)?;

            e.ledger
                .burn(addrs.custody, addrs.stable, addrs.pool_account, debt_to_offset)?;
            e.ledger
                .transfer(asset, addrs.custody, addrs.pool_account, sp_collateral)?;
            if full && surplus > 0 {
                e.ledger.transfer(asset, addrs.custody, owner, surplus)?;
            }

            info!(debt_to_offset, sp_collateral, full, "vault liquidated");
            e.events.push(EngineEvent::VaultLiquidated {
                asset,
                owner,
                debt_offset: debt_to_offset,
                collateral_to_pool: sp_collateral,
                surplus_returned: if full { surplus } else { 0 },
                full,
            });
            e.events.push(EngineEvent::DebtOffset {
                asset,
                debt: debt_to_offset,
                collateral: sp_collateral,
            });
            Ok(())
        })
    }

    /// Exchanges the caller's stablecoin for collateral at the oracle
    /// price, draining vaults from the lowest risk score upward.
    pub fn redeem_vaults(
        &mut self,
        caller: Address,
        asset: Address,
        amount: u128,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            e.store.params(asset)?;
            check!(amount > 0, EngineError::ZeroAmount);
            check!(e.index.tail(asset).is_some(), EngineError::NoVaultsToRedeem);

            let price = e.oracle.fetch_price(asset, now)?;
            let fee_rate = e.store.redemption_fee;

            let mut remaining = amount;
            let mut total_coll_redeemed: u128 = 0;
            let mut total_debt_redeemed: u128 = 0;
            let mut surplus_payouts: Vec<(Address, u128)> = Vec::new();
            let mut cursor = e.index.tail(asset);

            while let Some(id) = cursor {
                if remaining == 0 {
                    break;
                }
                let vault_owner = e
                    .store
                    .vault_by_id(id)
                    .ok_or(EngineError::NoVaultsToRedeem)?
                    .owner;
                let (coll, debt, mcr) = e.manage_debt_interest(asset, vault_owner, now)?;
                let to_redeem = debt.min(remaining);
                if to_redeem == 0 {
                    // Only zero-debt vaults remain toward the head.
                    break;
                }

                let fee = math::mul_div(to_redeem, fee_rate, ONE)?;
                let net_redeem = to_redeem - fee;
                let coll_out = math::mul_div(net_redeem, ONE, price)?;
                check!(
                    coll_out <= coll,
                    EngineError::InvalidParameter {
                        what: "redemption exceeds vault collateral",
                    }
                );

                total_coll_redeemed = total_coll_redeemed.saturating_add(coll_out);
                total_debt_redeemed = total_debt_redeemed.saturating_add(to_redeem);
                remaining -= to_redeem;

                let totals = e.store.totals_mut(asset);
                totals.debt = totals.debt.saturating_sub(to_redeem);

                if remaining > 0 {
                    // Vault fully drained: leftover collateral goes back
                    // to its owner and the record is cleared.
                    let totals = e.store.totals_mut(asset);
                    totals.collateral = totals.collateral.saturating_sub(coll);
                    e.store.active_vaults = e.store.active_vaults.saturating_sub(1);

                    cursor = e.index.prev(asset, id);
                    e.index.remove(asset, id)?;
                    e.store.remove_vault(asset, vault_owner)?;
                    if coll > coll_out {
                        surplus_payouts.push((vault_owner, coll - coll_out));
                    }
                } else {
                    // Final partial touch.
                    let totals = e.store.totals_mut(asset);
                    totals.collateral = totals.collateral.saturating_sub(coll_out);
                    let touched = Vault {
                        owner: vault_owner,
                        asset,
                        collateral: coll - coll_out,
                        debt: debt - to_redeem,
                        mcr,
                        last_update: now,
                    };
                    e.store.write_vault(id, touched)?;
                    e.reinsert_vault(asset, id, prev, next)?;
                    cursor = None;
                }
            }

            check!(total_debt_redeemed > 0, EngineError::NoVaultsToRedeem);
            e.store.total_protocol_debt = e
                .store
                .total_protocol_debt
                .saturating_sub(total_debt_redeemed);

            e.ledger
                .burn(addrs.custody, addrs.stable, caller, total_debt_redeemed)?;
            e.ledger
                .transfer(asset, addrs.custody, caller, total_coll_redeemed)?;
            for (vault_owner, surplus) in surplus_payouts {
                e.ledger.transfer(asset, addrs.custody, vault_owner, surplus)?;
            }

            info!(
                debt = total_debt_redeemed,
                coll = total_coll_redeemed,
                "redemption settled"
            );
            e.events.push(EngineEvent::VaultsRedeemed {
                asset,
                redeemer: caller,
                debt_redeemed: total_debt_redeemed,
                collateral_out: total_coll_redeemed,
            });
            Ok(())
        })
    }

    /// Public accrual entry point; a no-op when called twice at the
    /// same timestamp.
    pub fn update_vault_interest(
        &mut self,
        asset: Address,
        owner: Address,
        now: u64,
    ) -> EngineResult<()> {
        self.execute(|e| {
            let id = e
                .store
                .id_of(asset, owner)
                .ok_or(EngineError::VaultNotFound { asset, owner })?;

            let debt_before = e
                .store
                .vault_by_id(id)
                .map(|v| v.debt)
                .unwrap_or(0);
            let (_, debt, _) = e.manage_debt_interest(asset, owner, now)?;
            let accrued = debt.saturating_sub(debt_before);

            // The current neighbors are the natural hints: accrual only
            // nudges the score.
            let prev = e.index.prev(asset, id);
            let next = e.index.next(asset, id);
            e.reinsert_vault(asset, id, prev, next)?;

            e.events.push(EngineEvent::InterestAccrued {
                asset,
                owner,
                accrued,
            });
            Ok(())
        })
    }

    /// Mints interest accrued since the last distribution to the
    /// configured recipients by their basis-point shares.
    pub fn mint_vaults_interest(&mut self) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            let delta = e
                .store
                .total_accrued_debt
                .saturating_sub(e.store.last_recorded_accrued_debt);
            check!(delta > 0, EngineError::ZeroAmount);
            e.store.last_recorded_accrued_debt = e.store.total_accrued_debt;

            let mut remaining = delta;
            let recipients = e.mint_recipients.clone();
            for entry in recipients {
                let share = math::mul_div(delta, entry.bps as u128, 10_000)?;
                e.ledger
                    .mint(addrs.custody, addrs.stable, entry.recipient, share)?;
                remaining -= share;
            }
            if remaining > 0 {
                if let Some(recipient) = e.default_interest_recipient {
                    e.ledger
                        .mint(addrs.custody, addrs.stable, recipient, remaining)?;
                } else {
                    // No default recipient: the shortfall stays unminted.
                    warn!(remaining, "accrued interest left undistributed");
                }
            }

            e.events.push(EngineEvent::InterestMinted { total: delta });
            Ok(())
        })
    }

    // ============ Stability Pool Operations ============

    /// Deposits stablecoin into the pool, paying out pending gains for
    /// the listed assets.
    pub fn stability_deposit(
        &mut self,
        caller: Address,
        amount: u128,
        assets: &[Address],
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            for &asset in assets {
                e.store.params(asset)?;
            }

            let outcome = e.pool.deposit(caller, amount, assets)?;

            e.ledger
                .transfer(addrs.stable, caller, addrs.pool_account, amount)?;
            for (asset, gain) in &outcome.gains {
                e.ledger
                    .transfer(*asset, addrs.pool_account, caller, *gain)?;
            }

            e.events.push(EngineEvent::StabilityDeposited {
                depositor: caller,
                amount,
            });
            Ok(())
        })
    }

    /// Withdraws up to `amount` of the caller's compounded deposit plus
    /// pending gains for the listed assets. Zero withdraws gains only.
    pub fn stability_withdraw(
        &mut self,
        caller: Address,
        amount: u128,
        assets: &[Address],
    ) -> EngineResult<()> {
        self.execute(|e| {
            let addrs = e.addresses()?;
            for &asset in assets {
                e.store.params(asset)?;
            }

            let outcome = e.pool.withdraw(caller, amount, assets)?;

            e.ledger
                .transfer(addrs.stable, addrs.pool_account, caller, outcome.paid)?;
            for (asset, gain) in &outcome.gains {
                e.ledger
                    .transfer(*asset, addrs.pool_account, caller, *gain)?;
            }

            e.events.push(EngineEvent::StabilityWithdrawn {
                depositor: caller,
                amount: outcome.paid,
            });
            Ok(())
        })
    }
}

/// Splits a liquidated vault's collateral between the stability pool
/// and the owner. The pool is owed the offset debt plus the penalty;
/// when the vault cannot cover that, it takes everything and the
/// penalty is truncated.
fn liquidation_distribution(
    coll: u128,
    debt_to_offset: u128,
    penalty: u128,
    price: u128,
) -> EngineResult<(u128, u128)> {
    let payable = debt_to_offset.saturating_add(math::mul_div(debt_to_offset, penalty, ONE)?);
    let collateral_value = math::mul_div(coll, price, ONE)?;

    if payable >= collateral_value {
        if payable > collateral_value {
            warn!("liquidation penalty truncated by collateral shortfall");
        }
        return Ok((coll, 0));
    }
    let sp_collateral = math::mul_div(payable, ONE, price)?;
    Ok((sp_collateral, coll - sp_collateral))
}
