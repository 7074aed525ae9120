//! Fixed-point constants shared by the oracle adapter and the engine.
//!
//! Every USD amount and health factor is an integer scaled by `PRECISION`
//! (18 decimals). Percentages are expressed over `LIQUIDATION_PRECISION`.

use alloy::primitives::U256;

/// Number of decimals of the internal fixed-point representation.
pub const PRECISION_DECIMALS: u8 = 18;

/// `1.0` in 18-decimal fixed point.
pub const PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Share of collateral value counted toward the health factor (50%).
pub const LIQUIDATION_THRESHOLD: U256 = U256::from_limbs([50, 0, 0, 0]);

/// Extra collateral awarded to a liquidator (10%).
pub const LIQUIDATION_BONUS: U256 = U256::from_limbs([10, 0, 0, 0]);

/// Denominator for `LIQUIDATION_THRESHOLD` and `LIQUIDATION_BONUS`.
pub const LIQUIDATION_PRECISION: U256 = U256::from_limbs([100, 0, 0, 0]);

/// Positions below this health factor can be liquidated.
pub const MIN_HEALTH_FACTOR: U256 = PRECISION;

/// `10^exp` as a `U256`.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u8).pow(U256::from(exp))
}
