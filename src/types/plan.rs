//! Boost plan catalog
//!
//! Plans are static configuration: a purchasable upgrade with a TON
//! price, a daily yield rate applied to the position's principal, and
//! an optional one-time UNI bonus. The catalog is read-only at
//! runtime; the purchase flow and the reconciler consume it.

use super::account::Currency;
use rust_decimal::Decimal;

/// Plan identifier
pub type PlanId = u32;

/// Seconds in a day, for converting daily rates to per-second rates
const SECONDS_PER_DAY: i64 = 86_400;

/// A purchasable boost plan
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,

    /// Currency the plan is priced in; also the track it boosts
    pub currency: Currency,

    /// Exact purchase price
    ///
    /// A purchase debit always encodes this value, never the
    /// account's current balance.
    pub price: Decimal,

    /// Daily yield as a fraction of principal (0.01 == 1% per day)
    pub daily_rate: Decimal,

    /// One-time UNI bonus credited on purchase
    pub bonus_uni: Decimal,
}

impl Plan {
    /// Per-second yield for a position holding `principal`
    pub fn rate_per_second(&self, principal: Decimal) -> Decimal {
        principal * self.daily_rate / Decimal::from(SECONDS_PER_DAY)
    }
}

/// The static set of plans known to the engine
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        PlanCatalog { plans }
    }

    /// Look up a plan by ID
    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }

    /// The default catalog used by the binary and tests
    ///
    /// Rates mirror the production boost tiers: 1% to 3% daily on the
    /// TON track, with growing UNI bonuses.
    pub fn standard() -> Self {
        let tiers = [
            (1, "Starter", "1", "0.01", "10"),
            (2, "Standard", "5", "0.015", "75"),
            (3, "Advanced", "15", "0.02", "250"),
            (4, "Premium", "25", "0.025", "500"),
            (5, "Elite", "100", "0.03", "2500"),
        ];
        let plans = tiers
            .iter()
            .map(|(id, name, price, rate, bonus)| Plan {
                id: *id,
                name: (*name).to_string(),
                currency: Currency::Ton,
                price: price.parse().unwrap(),
                daily_rate: rate.parse().unwrap(),
                bonus_uni: bonus.parse().unwrap(),
            })
            .collect();
        PlanCatalog::new(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_standard_catalog_lookup() {
        let catalog = PlanCatalog::standard();
        let plan = catalog.get(1).unwrap();
        assert_eq!(plan.name, "Starter");
        assert_eq!(plan.price, Decimal::ONE);
        assert!(catalog.get(99).is_none());
    }

    #[rstest]
    #[case::one_percent_daily("0.01", "86400", "0.01")] // 86400 principal at 1%/day -> 0.01/sec
    #[case::zero_principal("0.02", "0", "0")]
    fn test_rate_per_second(
        #[case] daily_rate: Decimal,
        #[case] principal: Decimal,
        #[case] expected: Decimal,
    ) {
        let plan = Plan {
            id: 1,
            name: "test".to_string(),
            currency: Currency::Ton,
            price: Decimal::ONE,
            daily_rate,
            bonus_uni: Decimal::ZERO,
        };
        assert_eq!(plan.rate_per_second(principal), expected);
    }

    #[test]
    fn test_daily_rate_accrues_to_daily_yield() {
        let catalog = PlanCatalog::standard();
        let plan = catalog.get(2).unwrap();
        let principal = Decimal::from(100);
        let per_second = plan.rate_per_second(principal);
        let one_day = per_second * Decimal::from(86_400i64);
        assert_eq!(one_day, principal * plan.daily_rate);
    }
}
