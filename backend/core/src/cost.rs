use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PonderError;
use crate::usage::UsageRecord;

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Price per 1,000,000 tokens for each billing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    pub input_tokens: f64,
    #[serde(default)]
    pub cached_tokens: f64,
    #[serde(default)]
    pub output_tokens: f64,
}

impl PricingTable {
    pub fn new(input_tokens: f64, cached_tokens: f64, output_tokens: f64) -> Self {
        Self {
            input_tokens,
            cached_tokens,
            output_tokens,
        }
    }

    /// Reject negative or non-finite prices.
    pub fn validate(&self) -> Result<(), PonderError> {
        for (bucket, price) in [
            ("input_tokens", self.input_tokens),
            ("cached_tokens", self.cached_tokens),
            ("output_tokens", self.output_tokens),
        ] {
            if !price.is_finite() || price < 0.0 {
                return Err(PonderError::configuration(format!(
                    "pricing.{bucket} must be a non-negative number, got {price}"
                )));
            }
        }
        Ok(())
    }
}

/// Monetary cost of one step, or of a whole session when accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub cached_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    fn from_parts(input_cost: f64, cached_cost: f64, output_cost: f64) -> Self {
        Self {
            input_cost,
            cached_cost,
            output_cost,
            total_cost: input_cost + cached_cost + output_cost,
        }
    }
}

impl Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_cost: self.input_cost + rhs.input_cost,
            cached_cost: self.cached_cost + rhs.cached_cost,
            output_cost: self.output_cost + rhs.output_cost,
            total_cost: self.total_cost + rhs.total_cost,
        }
    }
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for CostBreakdown {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(CostBreakdown::default(), Add::add)
    }
}

/// Price a usage record.
///
/// Cached tokens are billed at the cached rate and removed from the input
/// bucket. A provider reporting more cached than prompt tokens is clamped to
/// zero effective prompt tokens.
pub fn cost(usage: &UsageRecord, pricing: &PricingTable) -> CostBreakdown {
    if usage.cached_tokens > usage.prompt_tokens {
        warn!(
            cached_tokens = usage.cached_tokens,
            prompt_tokens = usage.prompt_tokens,
            "Provider reported more cached than prompt tokens; clamping"
        );
    }
    let effective_prompt_tokens = usage.effective_prompt_tokens() as f64;

    CostBreakdown::from_parts(
        effective_prompt_tokens * pricing.input_tokens / TOKENS_PER_PRICE_UNIT,
        usage.cached_tokens as f64 * pricing.cached_tokens / TOKENS_PER_PRICE_UNIT,
        usage.completion_tokens as f64 * pricing.output_tokens / TOKENS_PER_PRICE_UNIT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u64, cached: u64, completion: u64) -> UsageRecord {
        UsageRecord {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            cached_tokens: cached,
            ..Default::default()
        }
    }

    #[test]
    fn prices_each_bucket() {
        let breakdown = cost(&usage(100, 20, 50), &PricingTable::new(5.0, 1.0, 15.0));
        assert!((breakdown.input_cost - 0.0004).abs() < 1e-12);
        assert!((breakdown.cached_cost - 0.00002).abs() < 1e-12);
        assert!((breakdown.output_cost - 0.00075).abs() < 1e-12);
        assert_eq!(
            breakdown.total_cost,
            breakdown.input_cost + breakdown.cached_cost + breakdown.output_cost
        );
    }

    #[test]
    fn cached_above_prompt_is_clamped() {
        let breakdown = cost(&usage(10, 30, 0), &PricingTable::new(5.0, 1.0, 15.0));
        assert_eq!(breakdown.input_cost, 0.0);
        assert!(breakdown.cached_cost > 0.0);
    }

    #[test]
    fn zero_pricing_is_free() {
        let breakdown = cost(&usage(1_000, 0, 1_000), &PricingTable::default());
        assert_eq!(breakdown, CostBreakdown::default());
    }

    #[test]
    fn accumulates_across_steps() {
        let pricing = PricingTable::new(2.5, 1.25, 10.0);
        let steps = [usage(1_000, 0, 200), usage(1_400, 1_000, 300)];

        let mut running = CostBreakdown::default();
        for step in &steps {
            running += cost(step, &pricing);
        }
        let summed: CostBreakdown = steps.iter().map(|u| cost(u, &pricing)).sum();

        assert_eq!(running, summed);
        assert!((running.output_cost - 0.005).abs() < 1e-12);
    }

    #[test]
    fn negative_price_is_configuration_error() {
        let err = PricingTable::new(1.0, -1.0, 1.0).validate().unwrap_err();
        assert!(matches!(err, PonderError::Configuration(_)));
        assert!(PricingTable::new(1.0, 0.5, f64::NAN).validate().is_err());
        assert!(PricingTable::default().validate().is_ok());
    }
}
