//! Protocol Constants
//!
//! All magic numbers and scaling conventions for the Unitas engine.
//! Two fixed-point scales are in play and must not be mixed:
//!
//! - **Rate scale**: fees, interest rates and penalties use 1e18 = 100%.
//! - **Ratio scale**: collateral ratios (CR, NCR, MCR) use 1e18 = 1%, so
//!   110% is written `110 * ONE`.

/// Token Metadata
pub mod token {
    /// Stablecoin name
    pub const NAME: &str = "Unitas USD";
    /// Stablecoin symbol
    pub const SYMBOL: &str = "USDU";
    /// Decimal places
    pub const DECIMALS: u8 = 18;
    /// One unit with decimals
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Fixed-point scales
pub mod scale {
    /// 1e18, the unit of the rate scale and of token amounts
    pub const ONE: u128 = 1_000_000_000_000_000_000;

    /// Half of [`ONE`], used for half-up rounding in decimal multiplication
    pub const HALF_ONE: u128 = ONE / 2;

    /// 100% on the ratio scale (1e18 = 1%)
    pub const PERCENT_100: u128 = 100 * ONE;

    /// Numerator scale of the nominal collateral ratio: `coll * 1e20 / debt`
    pub const NCR_PRECISION: u128 = 100_000_000_000_000_000_000;

    /// Stability-pool rescaling factor applied when the running product
    /// loses nine digits of precision
    pub const SCALE_FACTOR: u128 = 1_000_000_000;
}

/// Bounds on owner-configurable parameters
pub mod limits {
    use super::scale::ONE;

    /// Lowest MCR range bound an owner may configure (100% on the ratio scale)
    pub const MIN_ALLOWED_MCR: u128 = super::scale::PERCENT_100;

    /// Interest-rate curve endpoints may not exceed 100% per annum
    pub const MAX_INTEREST_RATE: u128 = ONE;

    /// Liquidation penalty is hard-capped at 30%
    pub const MAX_LIQUIDATION_PENALTY: u128 = 3 * ONE / 10;

    /// Redemption fee is hard-capped at 10%
    pub const MAX_REDEMPTION_FEE: u128 = ONE / 10;

    /// Basis-points denominator for interest-mint recipient shares
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Time-related constants
pub mod time {
    /// Seconds in a 365-day year, the divisor of per-second interest
    pub const SECONDS_IN_YEAR: u64 = 31_536_000;
}
