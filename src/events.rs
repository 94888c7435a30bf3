//! Protocol Events
//!
//! Events are appended to the engine's log on every committed mutation
//! and drained by the host for indexing. Failed operations leave no
//! events behind.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Event discriminants for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventKind {
    // Vault events (0x01 - 0x1F)
    VaultCreated = 0x01,
    VaultAdjusted = 0x02,
    VaultMcrAdjusted = 0x03,
    VaultClosed = 0x04,
    VaultOwnershipTransferred = 0x05,
    VaultLiquidated = 0x06,
    VaultsRedeemed = 0x07,
    InterestAccrued = 0x08,

    // Stability pool events (0x20 - 0x3F)
    StabilityDeposited = 0x20,
    StabilityWithdrawn = 0x21,
    DebtOffset = 0x22,

    // Protocol events (0x40 - 0x5F)
    CollateralAdded = 0x40,
    CollateralParametersSet = 0x41,
    PriceUpdated = 0x42,
    InterestMinted = 0x43,
}

/// All events the engine can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum EngineEvent {
    VaultCreated {
        asset: Address,
        owner: Address,
        collateral: u128,
        debt: u128,
        mcr: u128,
    },
    VaultAdjusted {
        asset: Address,
        owner: Address,
        collateral: u128,
        debt: u128,
    },
    VaultMcrAdjusted {
        asset: Address,
        owner: Address,
        mcr: u128,
    },
    VaultClosed {
        asset: Address,
        owner: Address,
        collateral_returned: u128,
        debt_burned: u128,
    },
    VaultOwnershipTransferred {
        asset: Address,
        from: Address,
        to: Address,
    },
    VaultLiquidated {
        asset: Address,
        owner: Address,
        debt_offset: u128,
        collateral_to_pool: u128,
        surplus_returned: u128,
        full: bool,
    },
    VaultsRedeemed {
        asset: Address,
        redeemer: Address,
        debt_redeemed: u128,
        collateral_out: u128,
    },
    InterestAccrued {
        asset: Address,
        owner: Address,
        accrued: u128,
    },
    StabilityDeposited {
        depositor: Address,
        amount: u128,
    },
    StabilityWithdrawn {
        depositor: Address,
        amount: u128,
    },
    DebtOffset {
        asset: Address,
        debt: u128,
        collateral: u128,
    },
    CollateralAdded {
        asset: Address,
        index: u32,
    },
    CollateralParametersSet {
        asset: Address,
    },
    PriceUpdated {
        asset: Address,
        price: u128,
    },
    InterestMinted {
        total: u128,
    },
}

impl EngineEvent {
    /// Returns the discriminant used for host-side filtering
    pub fn kind(&self) -> EventKind {
        match self {
            Self::VaultCreated { .. } => EventKind::VaultCreated,
            Self::VaultAdjusted { .. } => EventKind::VaultAdjusted,
            Self::VaultMcrAdjusted { .. } => EventKind::VaultMcrAdjusted,
            Self::VaultClosed { .. } => EventKind::VaultClosed,
            Self::VaultOwnershipTransferred { .. } => EventKind::VaultOwnershipTransferred,
            Self::VaultLiquidated { .. } => EventKind::VaultLiquidated,
            Self::VaultsRedeemed { .. } => EventKind::VaultsRedeemed,
            Self::InterestAccrued { .. } => EventKind::InterestAccrued,
            Self::StabilityDeposited { .. } => EventKind::StabilityDeposited,
            Self::StabilityWithdrawn { .. } => EventKind::StabilityWithdrawn,
            Self::DebtOffset { .. } => EventKind::DebtOffset,
            Self::CollateralAdded { .. } => EventKind::CollateralAdded,
            Self::CollateralParametersSet { .. } => EventKind::CollateralParametersSet,
            Self::PriceUpdated { .. } => EventKind::PriceUpdated,
            Self::InterestMinted { .. } => EventKind::InterestMinted,
        }
    }
}
