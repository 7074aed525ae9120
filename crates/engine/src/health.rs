//! Health factor and USD conversion arithmetic.
//!
//! HF = (collateral_value_usd * LIQUIDATION_THRESHOLD / LIQUIDATION_PRECISION) * PRECISION / debt
//!
//! The threshold is applied before scaling by `PRECISION` so the intermediate
//! product stays small for realistic collateral. All divisions truncate.

use alloy::primitives::U256;

use ballast_common::error::EngineError;
use ballast_common::precision::{
    LIQUIDATION_BONUS, LIQUIDATION_PRECISION, LIQUIDATION_THRESHOLD, PRECISION,
};

/// Health factor of a position; `U256::MAX` when there is no debt.
///
/// Saturates instead of overflowing for absurd collateral values.
pub fn calculate_health_factor(total_dsc_minted: U256, collateral_value_in_usd: U256) -> U256 {
    if total_dsc_minted.is_zero() {
        return U256::MAX;
    }
    let adjusted = collateral_value_in_usd.saturating_mul(LIQUIDATION_THRESHOLD) / LIQUIDATION_PRECISION;
    adjusted.saturating_mul(PRECISION) / total_dsc_minted
}

/// USD value of `amount` units at an 18-decimal `price`.
pub fn usd_value(price: U256, amount: U256) -> Result<U256, EngineError> {
    price
        .checked_mul(amount)
        .map(|product| product / PRECISION)
        .ok_or(EngineError::Overflow)
}

/// Units worth `usd_amount` at an 18-decimal `price`, rounded down.
pub fn token_amount_from_usd(price: U256, usd_amount: U256) -> Result<U256, EngineError> {
    usd_amount
        .checked_mul(PRECISION)
        .and_then(|product| product.checked_div(price))
        .ok_or(EngineError::Overflow)
}

/// Bonus collateral awarded on top of `amount` to a liquidator.
pub fn liquidation_bonus(amount: U256) -> U256 {
    amount.saturating_mul(LIQUIDATION_BONUS) / LIQUIDATION_PRECISION
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_common::precision::{MIN_HEALTH_FACTOR, pow10};

    fn ether(value: u64) -> U256 {
        U256::from(value) * pow10(18)
    }

    #[test]
    fn test_usd_value() {
        // 2000e8 feed answer lifted to 18 decimals
        let price = ether(2_000);
        assert_eq!(usd_value(price, ether(15)).unwrap(), ether(30_000));
    }

    #[test]
    fn test_token_amount_from_usd() {
        let price = ether(2_000);
        assert_eq!(
            token_amount_from_usd(price, ether(100)).unwrap(),
            U256::from(50_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_token_amount_truncates() {
        let price = ether(900);
        assert_eq!(
            token_amount_from_usd(price, ether(1_000)).unwrap(),
            U256::from(1_111_111_111_111_111_111u64)
        );
    }

    #[test]
    fn test_health_factor_without_debt_is_max() {
        assert_eq!(calculate_health_factor(U256::ZERO, ether(1)), U256::MAX);
    }

    #[test]
    fn test_health_factor_at_two_hundred_percent_is_one() {
        assert_eq!(
            calculate_health_factor(ether(100), ether(200)),
            MIN_HEALTH_FACTOR
        );
    }

    #[test]
    fn test_health_factor_below_threshold() {
        // $150 collateral backing $100 debt
        assert_eq!(
            calculate_health_factor(ether(100), ether(150)),
            U256::from(750_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_health_factor_saturates() {
        assert_eq!(
            calculate_health_factor(U256::from(1u8), U256::MAX),
            U256::MAX
        );
    }

    #[test]
    fn test_liquidation_bonus_is_ten_percent() {
        assert_eq!(liquidation_bonus(ether(1)), U256::from(100_000_000_000_000_000u64));
    }
}
