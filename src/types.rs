//! Core Types for the Unitas Engine
//!
//! Data structures shared across the engine's components. Persistent
//! records derive both serde and borsh so a host can snapshot state in
//! either encoding.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for account and token addresses (32-byte hash)
pub type Address = [u8; 32];

/// Stable handle of a vault inside the sorted index arena.
/// Zero is never allocated.
pub type VaultId = u64;

// ============ Vault Types ============

/// Individual vault state, one per (owner, collateral) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Vault {
    /// Owner's address
    pub owner: Address,
    /// Collateral token backing this vault
    pub asset: Address,
    /// Units of the collateral token held
    pub collateral: u128,
    /// Debt including interest accrued as of `last_update`
    pub debt: u128,
    /// Owner-chosen minimum collateral ratio (ratio scale, 110% = `110e18`)
    pub mcr: u128,
    /// Timestamp of the last interest accrual; zero means no active vault
    pub last_update: u64,
}

impl Vault {
    /// Returns true while the vault holds an open position
    pub fn is_active(&self) -> bool {
        self.last_update != 0
    }
}

// ============ Collateral Types ============

/// Per-asset risk parameters and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollateralParams {
    /// Whether new positions and adjustments are accepted
    pub active: bool,
    /// Decimal places of the collateral token
    pub decimals: u8,
    /// Position in the valid-collateral list, stable for the asset's
    /// lifetime; indexes the stability-pool error buckets
    pub index: u32,
    /// Lower bound on the owner-chosen MCR (ratio scale)
    pub min_range: u128,
    /// Upper bound on the owner-chosen MCR (ratio scale)
    pub max_range: u128,
    /// Contribution of the MCR to the adjusted risk score
    pub mcr_factor: u128,
    /// Interest rate charged at `max_range` (rate scale, per annum)
    pub base_fee: u128,
    /// Interest rate charged at `min_range` (rate scale, per annum)
    pub max_fee: u128,
    /// Minimum debt a vault must carry
    pub min_net_debt: u128,
    /// Upper bound on total debt minted against this collateral
    pub mint_cap: u128,
    /// Extra collateral fraction seized on liquidation (rate scale)
    pub liquidation_penalty: u128,
}

impl CollateralParams {
    /// Registers a new, not yet configured collateral slot
    pub fn new(index: u32, decimals: u8) -> Self {
        Self {
            active: false,
            decimals,
            index,
            min_range: 0,
            max_range: 0,
            mcr_factor: 0,
            base_fee: 0,
            max_fee: 0,
            min_net_debt: 0,
            mint_cap: 0,
            liquidation_penalty: 0,
        }
    }
}

/// Aggregate debt and collateral for one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetTotals {
    /// Sum of vault debt for this asset
    pub debt: u128,
    /// Sum of vault collateral for this asset
    pub collateral: u128,
}

// ============ Interest Distribution Types ============

/// A recipient of minted interest with its basis-point share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MintRecipient {
    /// Receiving address
    pub recipient: Address,
    /// Share of newly accrued interest, in basis points
    pub bps: u64,
}

// ============ Query Types ============

/// Point-in-time health report for one vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHealth {
    /// Collateral ratio at the current price (ratio scale)
    pub cr: u128,
    /// Price-independent nominal collateral ratio
    pub ncr: u128,
    /// Adjusted risk score ranking the vault for redemptions
    pub ars: u128,
    /// Annualized interest rate implied by the vault's MCR (rate scale)
    pub interest_rate: u128,
    /// How far the ratio sits above the liquidation threshold; zero when
    /// the vault is liquidatable
    pub buffer: u128,
}

/// Aggregate system view across all collaterals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStats {
    /// Number of open vaults across all assets
    pub active_vaults: u64,
    /// Debt across all assets, including accrued interest
    pub total_protocol_debt: u128,
    /// Interest accrued over the protocol lifetime
    pub total_accrued_debt: u128,
    /// Stability-pool deposits backing liquidations
    pub pool_deposits: u128,
    /// Pool deposits as a fraction of protocol debt (rate scale)
    pub pool_coverage: u128,
}
