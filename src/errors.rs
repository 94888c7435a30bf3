//! Error Types for the Unitas Engine
//!
//! Every abort surfaces as a distinct variant. Operations are
//! all-or-nothing: an error means no state was committed.

use thiserror::Error;

use crate::types::Address;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Main error enum for all engine aborts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ============ Vault Errors ============
    /// No vault exists for this (owner, collateral) pair
    #[error("no vault exists for this owner and collateral")]
    VaultNotFound { asset: Address, owner: Address },

    /// A vault already exists for this (owner, collateral) pair
    #[error("a vault already exists for this owner and collateral")]
    VaultAlreadyExists { asset: Address, owner: Address },

    /// Collateral ratio is not above the vault's chosen minimum
    #[error("collateral ratio {cr} is not above the vault minimum {mcr}")]
    VaultBelowMcr { cr: u128, mcr: u128 },

    /// Vault is healthy and may not be liquidated
    #[error("collateral ratio {cr} is not below the vault minimum {mcr}")]
    VaultNotLiquidatable { cr: u128, mcr: u128 },

    /// Vault debt is below the collateral's minimum net debt
    #[error("vault debt {debt} is below the collateral minimum {minimum}")]
    VaultBelowMinDebt { debt: u128, minimum: u128 },

    /// Total debt for the collateral would exceed its mint cap
    #[error("total debt {total} would exceed the collateral mint cap {cap}")]
    MintCapExceeded { total: u128, cap: u128 },

    /// Chosen MCR is outside the collateral's configured range
    #[error("chosen MCR {mcr} is outside [{min}, {max}]")]
    InvalidMcr { mcr: u128, min: u128, max: u128 },

    // ============ Collateral Errors ============
    /// Asset is not a registered collateral
    #[error("asset is not a registered collateral")]
    InvalidCollateral { asset: Address },

    /// Asset is registered but currently disabled
    #[error("collateral asset is not active")]
    InactiveCollateral { asset: Address },

    /// A parameter violates its bounds or consistency rules
    #[error("invalid parameter: {what}")]
    InvalidParameter { what: &'static str },

    // ============ Redemption / Liquidation Errors ============
    /// The sorted index for this asset holds no vaults
    #[error("no vaults available to redeem against")]
    NoVaultsToRedeem,

    /// Liquidation requires a non-empty stability pool
    #[error("stability pool holds no deposits")]
    StabilityPoolEmpty,

    // ============ Stability Pool Errors ============
    /// Withdrawal requires a prior deposit
    #[error("no stability deposit for this account")]
    InsufficientDeposit,

    /// A non-zero amount is required
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// The asset list argument must be strictly ascending
    #[error("asset list must be strictly ascending")]
    ArrayNotAscending,

    // ============ Collaborator Errors ============
    /// Oracle price is missing or stale
    #[error("oracle price unavailable for asset")]
    OracleFailure { asset: Address },

    /// Token ledger refused the transfer
    #[error("token transfer of {amount} failed")]
    TokenTransferFailed {
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    },

    // ============ Access / State Errors ============
    /// A mutator was entered while another operation was in flight
    #[error("reentrant call blocked")]
    ReentrancyBlocked,

    /// Caller lacks the required role
    #[error("caller is not authorized")]
    NotAuthorized,

    /// Protocol addresses have not been configured yet
    #[error("protocol addresses have not been configured")]
    NotInitialized,

    // ============ Math Errors ============
    /// Arithmetic overflow in fixed-point math
    #[error("arithmetic overflow")]
    Overflow,

    /// Division by zero in fixed-point math
    #[error("division by zero")]
    DivisionByZero,
}

impl EngineError {
    /// Returns a stable error code for logging and host dispatch
    pub fn code(&self) -> &'static str {
        match self {
            Self::VaultNotFound { .. } => "E001_VAULT_NOT_FOUND",
            Self::VaultAlreadyExists { .. } => "E002_VAULT_EXISTS",
            Self::VaultBelowMcr { .. } => "E003_BELOW_MCR",
            Self::VaultNotLiquidatable { .. } => "E004_NOT_LIQUIDATABLE",
            Self::VaultBelowMinDebt { .. } => "E005_BELOW_MIN_DEBT",
            Self::MintCapExceeded { .. } => "E006_MINT_CAP",
            Self::InvalidMcr { .. } => "E007_INVALID_MCR",
            Self::InvalidCollateral { .. } => "E010_INVALID_COLLATERAL",
            Self::InactiveCollateral { .. } => "E011_INACTIVE_COLLATERAL",
            Self::InvalidParameter { .. } => "E012_INVALID_PARAM",
            Self::NoVaultsToRedeem => "E020_NO_VAULTS_TO_REDEEM",
            Self::StabilityPoolEmpty => "E021_POOL_EMPTY",
            Self::InsufficientDeposit => "E030_NO_DEPOSIT",
            Self::ZeroAmount => "E031_ZERO_AMOUNT",
            Self::ArrayNotAscending => "E032_NOT_ASCENDING",
            Self::OracleFailure { .. } => "E040_ORACLE_FAILURE",
            Self::TokenTransferFailed { .. } => "E041_TRANSFER_FAILED",
            Self::ReentrancyBlocked => "E050_REENTRANCY",
            Self::NotAuthorized => "E051_NOT_AUTHORIZED",
            Self::NotInitialized => "E052_NOT_INITIALIZED",
            Self::Overflow => "E060_OVERFLOW",
            Self::DivisionByZero => "E061_DIV_ZERO",
        }
    }
}
