//! Stability Pool
//!
//! Aggregates stablecoin deposits that absorb liquidated debt in
//! exchange for the liquidated collateral. Bookkeeping uses the running
//! product `P` and per-asset running sums `S` so a liquidation costs
//! O(1) state writes per asset while depositor balances compound
//! lazily:
//!
//! - a deposit's current value is `d0 * P / P0`, where `P0` was
//!   snapshotted when the deposit was last touched;
//! - a deposit's collateral gain in asset `a` is
//!   `d0 * (S_a - S0_a) / P0 / 1e18`, read against the epoch and scale
//!   of the snapshot.
//!
//! `P` is rescaled by 1e9 when it loses nine digits, bumping `scale`;
//! a pool-emptying liquidation bumps `epoch` and resets `P`. Feedback
//! error buckets carry division remainders into the next offset so
//! rounding never compounds.

use std::collections::BTreeMap;

use primitive_types::U256;
use tracing::debug;

use crate::check;
use crate::constants::scale::{ONE, SCALE_FACTOR};
use crate::errors::{EngineError, EngineResult};
use crate::types::Address;

/// Snapshot of the pool taken when a deposit is placed or touched
#[derive(Debug, Clone)]
pub struct DepositSnapshot {
    /// Running product at snapshot time
    pub p: u128,
    /// Scale counter at snapshot time
    pub scale: u64,
    /// Epoch counter at snapshot time
    pub epoch: u64,
    /// Per-asset running sums at snapshot time
    pub sums: BTreeMap<Address, U256>,
}

/// Collateral paid out alongside a deposit or withdrawal
pub type AssetGains = Vec<(Address, u128)>;

/// Result of a deposit: gains owed plus the new compounded balance
#[derive(Debug, Clone, PartialEq)]
pub struct DepositOutcome {
    /// Collateral gains to pay the depositor
    pub gains: AssetGains,
    /// Compounded value of the prior deposit, before topping up
    pub compounded_before: u128,
    /// New recorded deposit
    pub new_deposit: u128,
}

/// Result of a withdrawal: stablecoin paid plus gains owed
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawOutcome {
    /// Stablecoin actually paid out, capped at the compounded value
    pub paid: u128,
    /// Collateral gains to pay the depositor
    pub gains: AssetGains,
    /// Deposit remaining after the withdrawal
    pub remaining: u128,
}

/// Stablecoin deposits with product/sum liquidation accounting
#[derive(Debug, Clone)]
pub struct StabilityPool {
    p: u128,
    current_scale: u64,
    current_epoch: u64,
    total_deposits: u128,
    deposits: BTreeMap<Address, u128>,
    snapshots: BTreeMap<Address, DepositSnapshot>,
    sums: BTreeMap<(Address, u64, u64), U256>,
    last_asset_error: BTreeMap<u32, u128>,
    last_debt_loss_error: u128,
}

impl Default for StabilityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityPool {
    pub fn new() -> Self {
        Self {
            p: ONE,
            current_scale: 0,
            current_epoch: 0,
            total_deposits: 0,
            deposits: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            sums: BTreeMap::new(),
            last_asset_error: BTreeMap::new(),
            last_debt_loss_error: 0,
        }
    }

    // ============ Observers ============

    /// Stablecoin currently backing liquidations
    pub fn total_deposits(&self) -> u128 {
        self.total_deposits
    }

    /// Running product
    pub fn p(&self) -> u128 {
        self.p
    }

    /// Epoch counter, incremented when the pool empties
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Scale counter, incremented on precision rescaling
    pub fn current_scale(&self) -> u64 {
        self.current_scale
    }

    /// Number of accounts with a recorded deposit
    pub fn depositor_count(&self) -> usize {
        self.deposits.len()
    }

    /// Accounts with a recorded deposit
    pub fn depositors(&self) -> impl Iterator<Item = Address> + '_ {
        self.deposits.keys().copied()
    }

    /// Recorded (pre-compounding) deposit of an account
    pub fn deposit_of(&self, depositor: Address) -> u128 {
        self.deposits.get(&depositor).copied().unwrap_or(0)
    }

    fn sum(&self, asset: Address, epoch: u64, scale: u64) -> U256 {
        self.sums
            .get(&(asset, epoch, scale))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    // ============ Depositor Accounting ============

    /// Current value of a deposit after all liquidations since its
    /// snapshot. Zero once the pool emptied behind it or the value has
    /// shrunk below a billionth of the original.
    pub fn compounded_deposit(&self, depositor: Address) -> u128 {
        let d0 = self.deposit_of(depositor);
        let Some(snapshot) = self.snapshots.get(&depositor) else {
            return 0;
        };
        if d0 == 0 || snapshot.epoch < self.current_epoch || snapshot.p == 0 {
            return 0;
        }

        let ratio = U256::from(d0) * U256::from(self.p) / U256::from(snapshot.p);
        let compounded = match self.current_scale - snapshot.scale {
            0 => ratio,
            1 => ratio / U256::from(SCALE_FACTOR),
            _ => return 0,
        };

        let compounded = if compounded > U256::from(u128::MAX) {
            u128::MAX
        } else {
            compounded.as_u128()
        };
        if compounded < d0 / SCALE_FACTOR {
            return 0;
        }
        compounded
    }

    /// Collateral gain of a deposit in one asset, read against the
    /// snapshot's epoch. A scale boundary crossed since the snapshot
    /// contributes its rescaled portion.
    pub fn collateral_gain(&self, depositor: Address, asset: Address) -> u128 {
        let d0 = self.deposit_of(depositor);
        let Some(snapshot) = self.snapshots.get(&depositor) else {
            return 0;
        };
        if d0 == 0 || snapshot.p == 0 {
            return 0;
        }

        let s0 = snapshot
            .sums
            .get(&asset)
            .copied()
            .unwrap_or_else(U256::zero);
        let first = self
            .sum(asset, snapshot.epoch, snapshot.scale)
            .saturating_sub(s0);
        let second = self.sum(asset, snapshot.epoch, snapshot.scale + 1) / U256::from(SCALE_FACTOR);

        let gain = U256::from(d0) * (first + second) / U256::from(snapshot.p) / U256::from(ONE);
        if gain > U256::from(u128::MAX) {
            u128::MAX
        } else {
            gain.as_u128()
        }
    }

    fn take_snapshot(&self) -> DepositSnapshot {
        let mut sums = BTreeMap::new();
        for (&(asset, epoch, scale), &value) in &self.sums {
            if epoch == self.current_epoch && scale == self.current_scale {
                sums.insert(asset, value);
            }
        }
        DepositSnapshot {
            p: self.p,
            scale: self.current_scale,
            epoch: self.current_epoch,
            sums,
        }
    }

    // ============ User Operations ============

    /// Places or tops up a deposit. Pending gains for the listed assets
    /// are returned for payout; the snapshot then moves to the current
    /// pool state, so unlisted gains are forfeited.
    pub fn deposit(
        &mut self,
        depositor: Address,
        amount: u128,
        assets: &[Address],
    ) -> EngineResult<DepositOutcome> {
        check!(amount > 0, EngineError::ZeroAmount);
        check_ascending(assets)?;

        let gains = self.collect_gains(depositor, assets);
        let compounded_before = self.compounded_deposit(depositor);
        let new_deposit = compounded_before + amount;

        self.deposits.insert(depositor, new_deposit);
        let snapshot = self.take_snapshot();
        self.snapshots.insert(depositor, snapshot);
        self.total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(EngineError::Overflow)?;

        debug!(new_deposit, total = self.total_deposits, "stability deposit");
        Ok(DepositOutcome {
            gains,
            compounded_before,
            new_deposit,
        })
    }

    /// Withdraws up to `amount` of the compounded deposit plus pending
    /// gains for the listed assets. `amount = 0` claims gains only.
    pub fn withdraw(
        &mut self,
        depositor: Address,
        amount: u128,
        assets: &[Address],
    ) -> EngineResult<WithdrawOutcome> {
        check_ascending(assets)?;
        check!(
            self.deposits.contains_key(&depositor),
            EngineError::InsufficientDeposit
        );

        let gains = self.collect_gains(depositor, assets);
        let compounded = self.compounded_deposit(depositor);
        let paid = amount.min(compounded);
        let remaining = compounded - paid;

        if remaining == 0 {
            self.deposits.remove(&depositor);
            self.snapshots.remove(&depositor);
        } else {
            self.deposits.insert(depositor, remaining);
            let snapshot = self.take_snapshot();
            self.snapshots.insert(depositor, snapshot);
        }
        self.total_deposits = self.total_deposits.saturating_sub(paid);

        debug!(paid, remaining, total = self.total_deposits, "stability withdrawal");
        Ok(WithdrawOutcome {
            paid,
            gains,
            remaining,
        })
    }

    fn collect_gains(&self, depositor: Address, assets: &[Address]) -> AssetGains {
        assets
            .iter()
            .map(|&asset| (asset, self.collateral_gain(depositor, asset)))
            .filter(|&(_, gain)| gain > 0)
            .collect()
    }

    // ============ Liquidation Offset ============

    /// Cancels `debt_to_offset` against the pool and credits
    /// `coll_added` of `asset` to depositors. Engine-internal; the
    /// caller has already capped the debt at the pool size and moves
    /// the corresponding tokens afterwards.
    pub fn offset_debt(
        &mut self,
        debt_to_offset: u128,
        asset: Address,
        asset_index: u32,
        coll_added: u128,
    ) -> EngineResult<()> {
        if self.total_deposits == 0 || debt_to_offset == 0 {
            return Ok(());
        }
        check!(
            debt_to_offset <= self.total_deposits,
            EngineError::InvalidParameter {
                what: "offset exceeds pool deposits",
            }
        );

        let total = U256::from(self.total_deposits);
        let coll_error = self
            .last_asset_error
            .get(&asset_index)
            .copied()
            .unwrap_or(0);
        let coll_numerator = U256::from(coll_added) * U256::from(ONE) + U256::from(coll_error);

        // Per-unit loss, rounded up so rounding favors the pool; the
        // remainder feeds back into the next offset.
        let debt_loss_per_unit = if debt_to_offset == self.total_deposits {
            self.last_debt_loss_error = 0;
            ONE
        } else {
            let loss_numerator = (U256::from(debt_to_offset) * U256::from(ONE))
                .saturating_sub(U256::from(self.last_debt_loss_error));
            let per_unit = loss_numerator / total + U256::one();
            self.last_debt_loss_error = (per_unit * total - loss_numerator).as_u128();
            per_unit.as_u128()
        };

        let coll_gain_per_unit = coll_numerator / total;
        self.last_asset_error
            .insert(asset_index, (coll_numerator - coll_gain_per_unit * total).as_u128());

        // Credit the marginal gain to the current epoch and scale.
        let marginal_gain = coll_gain_per_unit * U256::from(self.p);
        let key = (asset, self.current_epoch, self.current_scale);
        let updated = self.sum(asset, self.current_epoch, self.current_scale) + marginal_gain;
        self.sums.insert(key, updated);

        check!(debt_loss_per_unit <= ONE, EngineError::Overflow);
        let product_factor = ONE - debt_loss_per_unit;
        if product_factor == 0 {
            // The pool is fully consumed: every live deposit compounds
            // to zero and accounting restarts in a fresh epoch.
            self.current_epoch += 1;
            self.current_scale = 0;
            self.p = ONE;
            debug!(epoch = self.current_epoch, "stability pool emptied");
        } else {
            let product = U256::from(self.p) * U256::from(product_factor);
            if product / U256::from(ONE) < U256::from(SCALE_FACTOR) {
                self.p = (product * U256::from(SCALE_FACTOR) / U256::from(ONE)).as_u128();
                self.current_scale += 1;
            } else {
                self.p = (product / U256::from(ONE)).as_u128();
            }
            check!(
                self.p != 0,
                EngineError::InvalidParameter {
                    what: "stability pool product vanished",
                }
            );
        }

        self.total_deposits -= debt_to_offset;
        debug!(
            debt = debt_to_offset,
            coll = coll_added,
            p = self.p,
            total = self.total_deposits,
            "debt offset applied"
        );
        Ok(())
    }
}

fn check_ascending(assets: &[Address]) -> EngineResult<()> {
    for pair in assets.windows(2) {
        check!(pair[0] < pair[1], EngineError::ArrayNotAscending);
    }
    Ok(())
}
