//! Weighted constant-product pool pricing.
//!
//! The pool's weights and swap fee are deployment constants (read from
//! config, never discovered on chain). Spot price is quoted as units of
//! token A per unit of token B, grossed up by the swap fee:
//!
//! ```text
//! spot = (reserve_a / weight_a) / (reserve_b / weight_b) * 1 / (1 - fee)
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::amount::Amount;
use crate::error::{BotError, BotResult};

/// Fixed pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    /// Weight of token A (0.5 for an equal-weight pool).
    pub weight_a: Decimal,
    /// Weight of token B.
    pub weight_b: Decimal,
    /// Swap fee as a fraction (0.003 = 0.3%).
    pub swap_fee: Decimal,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            weight_a: dec!(0.5),
            weight_b: dec!(0.5),
            swap_fee: dec!(0.003),
        }
    }
}

impl PoolParams {
    /// Build from a fee expressed in percent (0.3 => 0.003).
    pub fn new(weight_a: Decimal, weight_b: Decimal, swap_fee_percent: Decimal) -> BotResult<Self> {
        let params = Self {
            weight_a,
            weight_b,
            swap_fee: swap_fee_percent / dec!(100),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.weight_a <= Decimal::ZERO || self.weight_b <= Decimal::ZERO {
            return Err(BotError::Configuration(format!(
                "pool weights must be positive, got {}/{}",
                self.weight_a, self.weight_b
            )));
        }
        if self.swap_fee < Decimal::ZERO || self.swap_fee >= Decimal::ONE {
            return Err(BotError::Configuration(format!(
                "swap fee must be in [0, 1), got {}",
                self.swap_fee
            )));
        }
        Ok(())
    }

    /// Weighted price of B in units of A, before the fee adjustment.
    pub fn base_price(&self, reserve_a: Amount, reserve_b: Amount) -> BotResult<Decimal> {
        let a = reserve_decimal(reserve_a, "A")?;
        let b = reserve_decimal(reserve_b, "B")?;
        if b.is_zero() {
            return Err(BotError::InvalidPool("reserve B is zero".to_string()));
        }

        let weighted_a = a / self.weight_a;
        let weighted_b = b / self.weight_b;
        weighted_a
            .checked_div(weighted_b)
            .ok_or_else(|| BotError::InvalidPool("base price overflow".to_string()))
    }

    /// Fee-adjusted spot price of B in units of A.
    pub fn spot_price(&self, reserve_a: Amount, reserve_b: Amount) -> BotResult<Decimal> {
        let base = self.base_price(reserve_a, reserve_b)?;
        let fee_adjustment = Decimal::ONE / (Decimal::ONE - self.swap_fee);
        Ok(base * fee_adjustment)
    }
}

fn reserve_decimal(reserve: Amount, label: &str) -> BotResult<Decimal> {
    reserve
        .to_decimal()
        .map_err(|e| BotError::InvalidPool(format!("reserve {label}: {e}")))
}

/// One observation of the pool, taken when the ledger sequence advanced.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    pub ledger_sequence: u32,
    pub reserve_a: Amount,
    pub reserve_b: Amount,
    pub spot_price: Decimal,
    /// Signed delta from the previous sample; `None` on the first.
    pub price_change: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Price a pair of reserves and chain the delta from `previous`.
    pub fn from_reserves(
        params: &PoolParams,
        ledger_sequence: u32,
        reserve_a: Amount,
        reserve_b: Amount,
        previous: Option<&Self>,
    ) -> BotResult<Self> {
        let spot_price = params.spot_price(reserve_a, reserve_b)?;
        Ok(Self {
            ledger_sequence,
            reserve_a,
            reserve_b,
            spot_price,
            price_change: previous.map(|p| spot_price - p.spot_price),
            observed_at: Utc::now(),
        })
    }

    /// Spot price rounded to the venue's 7 decimals, for logs.
    pub fn display_price(&self) -> Decimal {
        self.spot_price.round_dp(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_equal_weight_pool_spot_price() {
        let params = PoolParams::default();
        let a = amount("1000.0000000");
        let b = amount("2000.0000000");

        assert_eq!(params.base_price(a, b).unwrap(), dec!(0.5));

        let spot = params.spot_price(a, b).unwrap();
        assert_eq!(spot.round_dp(6), dec!(0.501505));
        assert!(spot > dec!(0.5015045) && spot < dec!(0.5015046));
    }

    #[test]
    fn test_fee_percent_is_converted() {
        let params = PoolParams::new(dec!(0.5), dec!(0.5), dec!(0.3)).unwrap();
        assert_eq!(params.swap_fee, dec!(0.003));
    }

    #[test]
    fn test_unequal_weights() {
        let params = PoolParams::new(dec!(0.8), dec!(0.2), Decimal::ZERO).unwrap();
        // (100 / 0.8) / (100 / 0.2) = 0.25
        let spot = params
            .spot_price(amount("100"), amount("100"))
            .unwrap();
        assert_eq!(spot, dec!(0.25));
    }

    #[test]
    fn test_zero_reserve_is_invalid_pool() {
        let params = PoolParams::default();
        let err = params.spot_price(amount("10"), Amount::ZERO).unwrap_err();
        assert!(matches!(err, BotError::InvalidPool(_)));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PoolParams::new(Decimal::ZERO, dec!(0.5), dec!(0.3)).is_err());
        assert!(PoolParams::new(dec!(0.5), dec!(0.5), dec!(100)).is_err());
    }

    #[test]
    fn test_sample_chains_price_change() {
        let params = PoolParams::default();
        let first =
            PriceSample::from_reserves(&params, 10, amount("1000"), amount("2000"), None).unwrap();
        assert!(first.price_change.is_none());

        let second = PriceSample::from_reserves(
            &params,
            11,
            amount("1100"),
            amount("2000"),
            Some(&first),
        )
        .unwrap();
        let change = second.price_change.unwrap();
        assert!(change > Decimal::ZERO);
        assert_eq!(change, second.spot_price - first.spot_price);
    }
}
