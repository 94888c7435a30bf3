//! Unitas Engine
//!
//! Core engine of a multi-collateral CDP protocol that mints a
//! unit-pegged stablecoin against deposits of whitelisted collateral.
//!
//! ## Components
//!
//! - **Vault store**: per-(owner, collateral) vault records with
//!   owner-chosen minimum collateral ratios and compound interest
//! - **Sorted index**: per-asset list of vaults ordered by adjusted
//!   risk score, driving redemption order
//! - **Stability pool**: stablecoin deposits absorbing liquidated debt
//!   under product/sum accounting
//! - **Engine**: the orchestrator wiring vault operations, liquidation,
//!   redemption, interest distribution, oracle and token ledger
//!
//! The engine is single-threaded and non-reentrant: every public
//! operation commits atomically or leaves no trace. Timestamps are
//! supplied by the caller.

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod validation;
pub mod token;
pub mod oracle;
pub mod vault_store;
pub mod sorted_index;
pub mod stability_pool;
pub mod engine;
pub mod admin;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use events::*;
pub use math::{compute_ars, compute_cr, compute_ncr, dec_pow, interest_rate, mul_div, RATIO_INFINITY};
pub use token::{TokenLedger, TokenSupply};
pub use oracle::{PriceFeed, PricePoint};
pub use vault_store::VaultStore;
pub use sorted_index::SortedIndex;
pub use stability_pool::{DepositOutcome, StabilityPool, WithdrawOutcome};
pub use engine::{Engine, ProtocolAddresses};
