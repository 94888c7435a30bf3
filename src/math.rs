//! Fixed-Point Math
//!
//! All 1e18-scale arithmetic goes through 256-bit intermediates so that
//! products of two full-scale amounts cannot overflow. `mul_div` is the
//! single widening primitive; everything else is built on it.

use primitive_types::U256;

use crate::constants::{scale, time};
use crate::errors::{EngineError, EngineResult};
use crate::types::CollateralParams;

/// Sentinel for an unbounded ratio (zero-debt vaults)
pub const RATIO_INFINITY: u128 = u128::MAX;

fn narrow(value: U256) -> EngineResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(EngineError::Overflow);
    }
    Ok(value.as_u128())
}

/// Computes `a * b / denominator` with a 256-bit intermediate product.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> EngineResult<u128> {
    if denominator == 0 {
        return Err(EngineError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator))
}

/// Multiplies two 1e18-scale decimals, rounding half up.
pub fn dec_mul(a: u128, b: u128) -> EngineResult<u128> {
    let product = U256::from(a) * U256::from(b) + U256::from(scale::HALF_ONE);
    narrow(product / U256::from(scale::ONE))
}

/// Raises a 1e18-scale decimal to an integer power by repeated squaring.
///
/// Used with per-second interest factors, where the exponent is the
/// elapsed seconds since the last accrual.
pub fn dec_pow(base: u128, mut exponent: u64) -> EngineResult<u128> {
    if exponent == 0 {
        return Ok(scale::ONE);
    }

    let mut x = base;
    let mut y = scale::ONE;
    while exponent > 1 {
        if exponent % 2 == 0 {
            x = dec_mul(x, x)?;
            exponent /= 2;
        } else {
            y = dec_mul(x, y)?;
            x = dec_mul(x, x)?;
            exponent = (exponent - 1) / 2;
        }
    }
    dec_mul(x, y)
}

/// Collateral ratio at a given price: `collateral * price * 100 / debt`,
/// on the ratio scale (1e18 = 1%). Zero debt yields [`RATIO_INFINITY`].
pub fn compute_cr(collateral: u128, debt: u128, price: u128) -> EngineResult<u128> {
    if debt == 0 {
        return Ok(RATIO_INFINITY);
    }
    let value = U256::from(collateral) * U256::from(price) * U256::from(100u32);
    narrow(value / U256::from(debt))
}

/// Price-independent nominal collateral ratio: `collateral * 1e20 / debt`.
pub fn compute_ncr(collateral: u128, debt: u128) -> EngineResult<u128> {
    if debt == 0 {
        return Ok(RATIO_INFINITY);
    }
    mul_div(collateral, scale::NCR_PRECISION, debt)
}

/// Adjusted risk score: `NCR + mcr_factor * mcr / 1e18`.
///
/// An unbounded NCR or a zero factor leaves the NCR unchanged. The top
/// end saturates into the infinity sentinel.
pub fn compute_ars(ncr: u128, mcr_factor: u128, mcr: u128) -> EngineResult<u128> {
    if ncr == RATIO_INFINITY || mcr_factor == 0 {
        return Ok(ncr);
    }
    let weight = mul_div(mcr_factor, mcr, scale::ONE)?;
    Ok(ncr.saturating_add(weight))
}

/// Annualized interest rate implied by a vault's MCR on the collateral's
/// linear curve. Lower MCR (riskier) pays the higher endpoint.
pub fn interest_rate(params: &CollateralParams, mcr: u128) -> EngineResult<u128> {
    if mcr == 0 {
        return Ok(0);
    }
    if mcr >= params.max_range {
        return Ok(params.base_fee);
    }
    if mcr <= params.min_range {
        return Ok(params.max_fee);
    }

    let span = params.max_range - params.min_range;
    let slope = mul_div(params.max_fee - params.base_fee, scale::ONE, span)?;
    let premium = mul_div(slope, params.max_range - mcr, scale::ONE)?;
    Ok(params.base_fee + premium)
}

/// Per-second growth factor for an annualized rate.
pub fn per_second_rate(annual_rate: u128) -> u128 {
    scale::ONE + annual_rate / time::SECONDS_IN_YEAR as u128
}

/// Compound growth factor over `elapsed` seconds at `annual_rate`.
pub fn compound_factor(annual_rate: u128, elapsed: u64) -> EngineResult<u128> {
    dec_pow(per_second_rate(annual_rate), elapsed)
}
