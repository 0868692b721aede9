// Pricing of one aggregation bucket under one offer. The power
// compatibility check runs before any pricing; a label the aggregation
// never saw simply contributes nothing.

use crate::core::aggregate::{AggregationBucket, BucketPeriod};
use crate::core::tariff::{RateLabel, TariffOffer};
use crate::errors::EngineError;
use indexmap::IndexMap;
use serde::Serialize;

/// The priced outcome for one (offer, bucket) pair. Never mutated after
/// construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostResult {
    pub offer_id: String,
    pub period: BucketPeriod,
    pub total_cost: f64,
    pub per_bucket_cost: IndexMap<RateLabel, f64>,
    pub subscription_cost: f64,
}

impl CostResult {
    /// The consumption-driven part of the total.
    pub fn energy_cost(&self) -> f64 {
        self.per_bucket_cost.values().sum()
    }
}

pub fn price(
    bucket: &AggregationBucket,
    offer: &TariffOffer,
    subscribed_power_kva: f64,
) -> Result<CostResult, EngineError> {
    if offer.power_kva != subscribed_power_kva {
        return Err(EngineError::IncompatiblePower {
            offer_id: offer.id.clone(),
            offer_kva: offer.power_kva,
            subscribed_kva: subscribed_power_kva,
        });
    }

    let per_bucket_cost: IndexMap<RateLabel, f64> = offer
        .priced_buckets
        .iter()
        .map(|(&label, &price_per_kwh)| (label, bucket.kwh(label) * price_per_kwh))
        .collect();
    let subscription_cost = offer.subscription_price * bucket.period.subscription_months();
    let total_cost = per_bucket_cost.values().sum::<f64>() + subscription_cost;

    Ok(CostResult {
        offer_id: offer.id.clone(),
        period: bucket.period,
        total_cost,
        per_bucket_cost,
        subscription_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tariff::TariffFamily;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn offer() -> TariffOffer {
        TariffOffer {
            id: "hc-6kva".to_string(),
            family: TariffFamily::PeakOffPeak,
            subscription_price: 10.,
            power_kva: 6.,
            priced_buckets: IndexMap::from([(RateLabel::OffPeak, 0.15), (RateLabel::Peak, 0.20)]),
        }
    }

    fn month_bucket(off_peak_kwh: f64, peak_kwh: f64) -> AggregationBucket {
        AggregationBucket {
            period: BucketPeriod::Month {
                year: 2024,
                month: 6,
            },
            per_label_kwh: IndexMap::from([
                (RateLabel::OffPeak, off_peak_kwh),
                (RateLabel::Peak, peak_kwh),
            ]),
        }
    }

    #[rstest]
    fn should_price_each_label_and_add_the_subscription(offer: TariffOffer) {
        let result = price(&month_bucket(8., 16.), &offer, 6.).unwrap();
        assert_relative_eq!(result.energy_cost(), 8. * 0.15 + 16. * 0.20);
        assert_relative_eq!(result.subscription_cost, 10.);
        assert_relative_eq!(result.total_cost, 4.4 + 10.);
    }

    #[rstest]
    fn should_charge_a_missing_label_as_zero(offer: TariffOffer) {
        let bucket = AggregationBucket {
            period: BucketPeriod::Month {
                year: 2024,
                month: 6,
            },
            per_label_kwh: IndexMap::from([(RateLabel::Peak, 10.)]),
        };
        let result = price(&bucket, &offer, 6.).unwrap();
        assert_relative_eq!(result.per_bucket_cost[&RateLabel::OffPeak], 0.);
        assert_relative_eq!(result.total_cost, 10. * 0.20 + 10.);
    }

    #[rstest]
    fn should_charge_twelve_subscription_months_for_a_rolling_year(offer: TariffOffer) {
        let bucket = AggregationBucket {
            period: BucketPeriod::RollingYear { index: 0 },
            per_label_kwh: IndexMap::from([(RateLabel::OffPeak, 100.), (RateLabel::Peak, 200.)]),
        };
        let result = price(&bucket, &offer, 6.).unwrap();
        assert_relative_eq!(result.subscription_cost, 120.);
    }

    #[rstest]
    fn should_refuse_an_offer_for_a_different_power(offer: TariffOffer) {
        assert_eq!(
            price(&month_bucket(8., 16.), &offer, 9.).unwrap_err(),
            EngineError::IncompatiblePower {
                offer_id: "hc-6kva".to_string(),
                offer_kva: 6.,
                subscribed_kva: 9.,
            }
        );
    }

    #[rstest]
    fn should_scale_the_energy_cost_linearly_with_consumption(offer: TariffOffer) {
        let single = price(&month_bucket(8., 16.), &offer, 6.).unwrap();
        let double = price(&month_bucket(16., 32.), &offer, 6.).unwrap();
        assert_relative_eq!(double.energy_cost(), 2. * single.energy_cost());
        assert_relative_eq!(double.subscription_cost, single.subscription_cost);
    }
}
