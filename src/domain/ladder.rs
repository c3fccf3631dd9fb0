//! Buy-ladder generation.
//!
//! Bucket `i` (1-based) rests at `spot * (1 - increment * i)` with a
//! constant size. Prices are quantized to the venue's fixed-denominator
//! fraction; this is the only lossy step and it is deterministic.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::amount::{AMOUNT_DECIMALS, Amount};
use crate::error::{BotError, BotResult};

/// Fixed denominator of every order price.
pub const PRICE_DENOMINATOR: i32 = 10_000_000;

/// Exact rational order price `numerator / 10_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceFraction {
    #[serde(rename = "n")]
    pub numerator: i32,
    #[serde(rename = "d")]
    pub denominator: i32,
}

impl PriceFraction {
    /// Price of 1/1, used on cancellation operations.
    pub const ONE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Quantize a decimal price by rounding `price * 10^7` half away from zero.
    pub fn from_price(price: Decimal) -> BotResult<Self> {
        let scaled = (price * Decimal::from(PRICE_DENOMINATOR))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let numerator = scaled
            .to_i32()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                BotError::Configuration(format!(
                    "price {price} does not quantize to a positive 32-bit numerator"
                ))
            })?;
        Ok(Self {
            numerator,
            denominator: PRICE_DENOMINATOR,
        })
    }

    /// Decimal value of the fraction.
    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.numerator) / Decimal::from(self.denominator)
    }
}

/// Ladder shape parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderParams {
    /// Base-asset size of every bucket.
    pub unit_size: Decimal,
    /// Discount step per bucket (0.005 = 0.5%).
    pub bucket_increment: Decimal,
    /// Number of buckets.
    pub bucket_count: u32,
}

impl LadderParams {
    pub fn validate(&self) -> BotResult<()> {
        if self.unit_size <= Decimal::ZERO {
            return Err(BotError::Configuration(format!(
                "unit_size must be positive, got {}",
                self.unit_size
            )));
        }
        if self.unit_size.normalize().scale() > AMOUNT_DECIMALS {
            return Err(BotError::Configuration(format!(
                "unit_size {} has more than {AMOUNT_DECIMALS} decimal places",
                self.unit_size
            )));
        }
        if self.bucket_increment <= Decimal::ZERO {
            return Err(BotError::Configuration(format!(
                "bucket_increment must be positive, got {}",
                self.bucket_increment
            )));
        }
        if self.bucket_count < 1 {
            return Err(BotError::Configuration(
                "bucket_count must be at least 1".to_string(),
            ));
        }
        if self.bucket_increment * Decimal::from(self.bucket_count) >= Decimal::ONE {
            return Err(BotError::Configuration(format!(
                "bucket_increment {} x bucket_count {} leaves no positive price",
                self.bucket_increment, self.bucket_count
            )));
        }
        Ok(())
    }

    /// Unit size in ledger units.
    pub fn unit_amount(&self) -> BotResult<Amount> {
        Amount::from_decimal_floor(self.unit_size)
            .map_err(|e| BotError::Configuration(format!("unit_size: {e}")))
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBucket {
    /// 1-based index; larger index = deeper discount.
    pub bucket_index: u32,
    /// `1 - increment * index`.
    pub discount_fraction: Decimal,
    /// Unquantized `spot * discount`.
    pub target_price: Decimal,
    /// Base-asset size.
    pub size: Decimal,
    /// Quantized venue price.
    pub price_fraction: PriceFraction,
}

/// Build the ladder below `spot_price`, shallowest bucket first.
pub fn generate_ladder(spot_price: Decimal, params: &LadderParams) -> BotResult<Vec<OrderBucket>> {
    params.validate()?;
    if spot_price <= Decimal::ZERO {
        return Err(BotError::Configuration(format!(
            "spot price must be positive, got {spot_price}"
        )));
    }

    (1..=params.bucket_count)
        .map(|i| {
            let discount_fraction = Decimal::ONE - params.bucket_increment * Decimal::from(i);
            let target_price = spot_price * discount_fraction;
            Ok(OrderBucket {
                bucket_index: i,
                discount_fraction,
                target_price,
                size: params.unit_size,
                price_fraction: PriceFraction::from_price(target_price)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> LadderParams {
        LadderParams {
            unit_size: dec!(0.05),
            bucket_increment: dec!(0.005),
            bucket_count: 10,
        }
    }

    #[test]
    fn test_reference_ladder() {
        let ladder = generate_ladder(dec!(1.5), &params()).unwrap();
        assert_eq!(ladder.len(), 10);

        let first = &ladder[0];
        assert_eq!(first.bucket_index, 1);
        assert_eq!(first.discount_fraction, dec!(0.995));
        assert_eq!(first.target_price, dec!(1.4925));
        assert_eq!(first.size, dec!(0.05));
        assert_eq!(
            first.price_fraction,
            PriceFraction {
                numerator: 14_925_000,
                denominator: 10_000_000
            }
        );

        let last = &ladder[9];
        assert_eq!(last.bucket_index, 10);
        assert_eq!(last.target_price, dec!(1.425));
    }

    #[test]
    fn test_prices_strictly_decrease() {
        let ladder = generate_ladder(dec!(0.5015045), &params()).unwrap();
        for pair in ladder.windows(2) {
            assert!(pair[0].target_price > pair[1].target_price);
        }
    }

    #[test]
    fn test_quantization_rounds_half_away_from_zero() {
        assert_eq!(
            PriceFraction::from_price(dec!(0.00000005)).unwrap().numerator,
            1
        );
        assert_eq!(
            PriceFraction::from_price(dec!(0.12345674)).unwrap().numerator,
            1_234_567
        );
    }

    #[test]
    fn test_quantization_is_deterministic() {
        let a = PriceFraction::from_price(dec!(0.49899999951)).unwrap();
        let b = PriceFraction::from_price(dec!(0.49899999951)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_decimal(), dec!(0.499));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut p = params();
        p.bucket_increment = Decimal::ZERO;
        assert!(matches!(p.validate(), Err(BotError::Configuration(_))));

        let mut p = params();
        p.unit_size = dec!(-1);
        assert!(generate_ladder(dec!(1.5), &p).is_err());

        let mut p = params();
        p.bucket_count = 0;
        assert!(generate_ladder(dec!(1.5), &p).is_err());

        let mut p = params();
        p.bucket_increment = dec!(0.1);
        p.bucket_count = 10;
        assert!(generate_ladder(dec!(1.5), &p).is_err());

        assert!(generate_ladder(Decimal::ZERO, &params()).is_err());
    }

    #[test]
    fn test_price_too_large_for_venue() {
        assert!(PriceFraction::from_price(dec!(1000)).is_err());
    }

    #[test]
    fn test_unit_amount() {
        assert_eq!(params().unit_amount().unwrap().units(), 500_000);
    }
}
