//! Vault Store
//!
//! Pure state for vault records and per-collateral parameters. Records
//! are keyed by (asset, owner) through a stable arena id so the sorted
//! index can splice in O(1). Only the engine mutates this store.

use std::collections::BTreeMap;

use crate::check;
use crate::constants::limits;
use crate::errors::{EngineError, EngineResult};
use crate::math;
use crate::types::{Address, AssetTotals, CollateralParams, Vault, VaultId};

/// Vault records, collateral parameters and global aggregates
#[derive(Debug, Clone, Default)]
pub struct VaultStore {
    params: BTreeMap<Address, CollateralParams>,
    valid_collateral: Vec<Address>,
    records: BTreeMap<VaultId, Vault>,
    ids: BTreeMap<(Address, Address), VaultId>,
    next_id: VaultId,
    totals: BTreeMap<Address, AssetTotals>,

    /// Number of open vaults across all assets
    pub active_vaults: u64,
    /// Debt across all assets, including accrued interest
    pub total_protocol_debt: u128,
    /// Interest accrued over the protocol lifetime, monotone
    pub total_accrued_debt: u128,
    /// Watermark of `total_accrued_debt` already minted out
    pub last_recorded_accrued_debt: u128,
    /// Redemption fee (rate scale), hard-capped at 10%
    pub redemption_fee: u128,
}

impl VaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============ Collateral Parameters ============

    /// Registers a new collateral asset. Parameters must be configured
    /// before vaults can open against it.
    pub fn add_collateral(&mut self, asset: Address, decimals: u8) -> EngineResult<u32> {
        check!(
            !self.params.contains_key(&asset),
            EngineError::InvalidParameter {
                what: "collateral already registered",
            }
        );

        let index = self.valid_collateral.len() as u32;
        self.valid_collateral.push(asset);
        self.params.insert(asset, CollateralParams::new(index, decimals));
        self.totals.insert(asset, AssetTotals::default());
        Ok(index)
    }

    /// Parameters of a registered asset
    pub fn params(&self, asset: Address) -> EngineResult<&CollateralParams> {
        self.params
            .get(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })
    }

    /// Parameters of a registered, currently active asset
    pub fn active_params(&self, asset: Address) -> EngineResult<&CollateralParams> {
        let params = self.params(asset)?;
        check!(params.active, EngineError::InactiveCollateral { asset });
        Ok(params)
    }

    /// The registered collateral list; positions are stable lifetime indices
    pub fn valid_collateral(&self) -> &[Address] {
        &self.valid_collateral
    }

    /// Configures all risk parameters of an asset and activates it.
    #[allow(clippy::too_many_arguments)]
    pub fn set_collateral_parameters(
        &mut self,
        asset: Address,
        min_range: u128,
        max_range: u128,
        mcr_factor: u128,
        base_fee: u128,
        max_fee: u128,
        min_net_debt: u128,
        mint_cap: u128,
        liquidation_penalty: u128,
    ) -> EngineResult<()> {
        check!(
            min_range >= limits::MIN_ALLOWED_MCR,
            EngineError::InvalidParameter {
                what: "MCR range floor below 100%",
            }
        );
        check!(
            max_range >= min_range,
            EngineError::InvalidParameter {
                what: "MCR range is inverted",
            }
        );
        check!(
            base_fee <= max_fee,
            EngineError::InvalidParameter {
                what: "base fee above max fee",
            }
        );
        check!(
            max_fee <= limits::MAX_INTEREST_RATE,
            EngineError::InvalidParameter {
                what: "interest rate above 100%",
            }
        );
        check!(
            liquidation_penalty <= limits::MAX_LIQUIDATION_PENALTY,
            EngineError::InvalidParameter {
                what: "liquidation penalty above 30%",
            }
        );
        check!(
            min_net_debt > 0,
            EngineError::InvalidParameter {
                what: "minimum net debt must be non-zero",
            }
        );

        let params = self
            .params
            .get_mut(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })?;
        params.min_range = min_range;
        params.max_range = max_range;
        params.mcr_factor = mcr_factor;
        params.base_fee = base_fee;
        params.max_fee = max_fee;
        params.min_net_debt = min_net_debt;
        params.mint_cap = mint_cap;
        params.liquidation_penalty = liquidation_penalty;
        params.active = true;
        Ok(())
    }

    /// Raises or lowers the MCR range floor; never below 100%.
    pub fn set_min_range(&mut self, asset: Address, min_range: u128) -> EngineResult<()> {
        check!(
            min_range >= limits::MIN_ALLOWED_MCR,
            EngineError::InvalidParameter {
                what: "MCR range floor below 100%",
            }
        );
        let params = self
            .params
            .get_mut(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })?;
        check!(
            min_range <= params.max_range,
            EngineError::InvalidParameter {
                what: "MCR range is inverted",
            }
        );
        params.min_range = min_range;
        Ok(())
    }

    /// Sets the steep end of the interest curve; never above 100%.
    pub fn set_max_fee(&mut self, asset: Address, max_fee: u128) -> EngineResult<()> {
        check!(
            max_fee <= limits::MAX_INTEREST_RATE,
            EngineError::InvalidParameter {
                what: "interest rate above 100%",
            }
        );
        let params = self
            .params
            .get_mut(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })?;
        check!(
            max_fee >= params.base_fee,
            EngineError::InvalidParameter {
                what: "base fee above max fee",
            }
        );
        params.max_fee = max_fee;
        Ok(())
    }

    /// Sets the extra collateral fraction seized on liquidation.
    pub fn set_liquidation_penalty(&mut self, asset: Address, penalty: u128) -> EngineResult<()> {
        check!(
            penalty <= limits::MAX_LIQUIDATION_PENALTY,
            EngineError::InvalidParameter {
                what: "liquidation penalty above 30%",
            }
        );
        let params = self
            .params
            .get_mut(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })?;
        params.liquidation_penalty = penalty;
        Ok(())
    }

    /// Enables or disables new positions against an asset.
    pub fn set_is_active(&mut self, asset: Address, active: bool) -> EngineResult<()> {
        let params = self
            .params
            .get_mut(&asset)
            .ok_or(EngineError::InvalidCollateral { asset })?;
        params.active = active;
        Ok(())
    }

    /// Sets the global redemption fee; never above 10%.
    pub fn set_redemption_fee(&mut self, fee: u128) -> EngineResult<()> {
        check!(
            fee <= limits::MAX_REDEMPTION_FEE,
            EngineError::InvalidParameter {
                what: "redemption fee above 10%",
            }
        );
        self.redemption_fee = fee;
        Ok(())
    }

    // ============ Vault Records ============

    /// Arena id of the vault for (asset, owner), if one is open
    pub fn id_of(&self, asset: Address, owner: Address) -> Option<VaultId> {
        self.ids.get(&(asset, owner)).copied()
    }

    /// Vault record for (asset, owner)
    pub fn vault(&self, asset: Address, owner: Address) -> Option<&Vault> {
        self.id_of(asset, owner).and_then(|id| self.records.get(&id))
    }

    /// Vault record by arena id
    pub fn vault_by_id(&self, id: VaultId) -> Option<&Vault> {
        self.records.get(&id)
    }

    /// Creates a record and allocates its arena id. Ids start at one;
    /// zero stays reserved for the index sentinel.
    pub fn insert_vault(&mut self, vault: Vault) -> EngineResult<VaultId> {
        let key = (vault.asset, vault.owner);
        check!(
            !self.ids.contains_key(&key),
            EngineError::VaultAlreadyExists {
                asset: vault.asset,
                owner: vault.owner,
            }
        );

        self.next_id += 1;
        let id = self.next_id;
        self.ids.insert(key, id);
        self.records.insert(id, vault);
        Ok(id)
    }

    /// Overwrites the record behind `id`.
    pub fn write_vault(&mut self, id: VaultId, vault: Vault) -> EngineResult<()> {
        check!(
            self.records.contains_key(&id),
            EngineError::VaultNotFound {
                asset: vault.asset,
                owner: vault.owner,
            }
        );
        self.records.insert(id, vault);
        Ok(())
    }

    /// Clears a record and frees its (asset, owner) slot.
    pub fn remove_vault(&mut self, asset: Address, owner: Address) -> EngineResult<Vault> {
        let id = self
            .ids
            .remove(&(asset, owner))
            .ok_or(EngineError::VaultNotFound { asset, owner })?;
        self.records
            .remove(&id)
            .ok_or(EngineError::VaultNotFound { asset, owner })
    }

    /// Moves a record to a new owner, keeping the arena id.
    pub fn rekey_owner(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
    ) -> EngineResult<VaultId> {
        check!(
            !self.ids.contains_key(&(asset, to)),
            EngineError::VaultAlreadyExists { asset, owner: to }
        );
        let id = self
            .ids
            .remove(&(asset, from))
            .ok_or(EngineError::VaultNotFound { asset, owner: from })?;
        self.ids.insert((asset, to), id);
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EngineError::VaultNotFound { asset, owner: from })?;
        record.owner = to;
        Ok(id)
    }

    /// Iterates all open vaults of one asset.
    pub fn vaults_for(&self, asset: Address) -> impl Iterator<Item = (&VaultId, &Vault)> {
        self.records.iter().filter(move |(_, v)| v.asset == asset)
    }

    // ============ Aggregates ============

    /// Aggregate totals for one asset
    pub fn totals(&self, asset: Address) -> AssetTotals {
        self.totals.get(&asset).copied().unwrap_or_default()
    }

    /// Mutable aggregate totals for one asset
    pub fn totals_mut(&mut self, asset: Address) -> &mut AssetTotals {
        self.totals.entry(asset).or_default()
    }

    // ============ Risk Scores ============

    /// Collateral ratio of a record at `price`
    pub fn vault_cr(&self, vault: &Vault, price: u128) -> EngineResult<u128> {
        math::compute_cr(vault.collateral, vault.debt, price)
    }

    /// Adjusted risk score of a record, using live parameters
    pub fn calculate_ars(&self, vault: &Vault) -> EngineResult<u128> {
        let params = self.params(vault.asset)?;
        let ncr = math::compute_ncr(vault.collateral, vault.debt)?;
        math::compute_ars(ncr, params.mcr_factor, vault.mcr)
    }

    /// Adjusted risk score by arena id; zero for vanished records keeps
    /// in-flight index searches total.
    pub fn ars_of(&self, id: VaultId) -> u128 {
        self.records
            .get(&id)
            .and_then(|v| self.calculate_ars(v).ok())
            .unwrap_or(0)
    }

    /// Annualized interest rate the vault currently pays
    pub fn vault_interest_rate(&self, vault: &Vault) -> EngineResult<u128> {
        let params = self.params(vault.asset)?;
        math::interest_rate(params, vault.mcr)
    }

    /// Enforces the active-vault invariant after a mutation:
    /// the asset accepts positions, the MCR sits inside its range, debt
    /// meets the minimum, and the ratio clears the chosen MCR.
    pub fn check_vault_state(&self, vault: &Vault, price: u128) -> EngineResult<()> {
        let params = self.params(vault.asset)?;
        check!(
            params.active,
            EngineError::InactiveCollateral { asset: vault.asset }
        );
        check!(
            vault.mcr >= params.min_range && vault.mcr <= params.max_range,
            EngineError::InvalidMcr {
                mcr: vault.mcr,
                min: params.min_range,
                max: params.max_range,
            }
        );
        check!(
            vault.debt >= params.min_net_debt,
            EngineError::VaultBelowMinDebt {
                debt: vault.debt,
                minimum: params.min_net_debt,
            }
        );

        let cr = self.vault_cr(vault, price)?;
        check!(
            cr > vault.mcr,
            EngineError::VaultBelowMcr {
                cr,
                mcr: vault.mcr,
            }
        );
        Ok(())
    }
}
