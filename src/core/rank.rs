// Market-wide comparison: price every compatible offer against the same
// consumption series and rank by total annual cost. Candidates are priced
// independently from immutable snapshots, so the fan-out is a plain
// parallel map.

use crate::core::aggregate::{fold, AggregationBucket, BucketPeriod, WindowKind};
use crate::core::classify::RateClassifier;
use crate::core::cost::{price, CostResult};
use crate::core::normalize::NormalizedInterval;
use crate::core::tariff::{HouseholdContext, TariffOffer};
use crate::errors::EngineError;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// One entry of the comparison result. `savings` is the signed difference
/// to the household's current offer (positive when this entry is cheaper),
/// present only when the current offer was itself ranked.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedOffer {
    #[serde(flatten)]
    pub cost: CostResult,
    pub savings: Option<f64>,
}

/// The full outcome of a comparison run: ranked entries, the annual bucket
/// each offer was priced on, and whatever could not be processed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Ranking {
    pub entries: Vec<RankedOffer>,
    pub annual_buckets: IndexMap<String, AggregationBucket>,
    pub skipped: Vec<EngineError>,
}

#[derive(Clone, Debug)]
pub struct OfferRanker<'a> {
    classifier: RateClassifier<'a>,
    household: &'a HouseholdContext,
}

impl<'a> OfferRanker<'a> {
    pub fn new(classifier: RateClassifier<'a>, household: &'a HouseholdContext) -> Self {
        Self {
            classifier,
            household,
        }
    }

    /// Rank the candidate offers for one normalized consumption series.
    /// Classification runs per offer family, the most recent rolling-year
    /// window is priced, and the result is ordered by ascending total cost
    /// with ties broken by offer id.
    pub fn rank(&self, intervals: &[NormalizedInterval], candidates: &[TariffOffer]) -> Ranking {
        let compatible: Vec<&TariffOffer> = candidates
            .iter()
            .filter(|offer| offer.power_kva == self.household.subscribed_power_kva)
            .collect();
        debug!(
            candidates = candidates.len(),
            compatible = compatible.len(),
            "filtered candidate offers by subscribed power"
        );

        let mut skipped = vec![];
        let mut annual_buckets = IndexMap::new();
        let mut costs = vec![];
        let priced: Vec<_> = compatible
            .par_iter()
            .map(|offer| self.price_annual(intervals, offer))
            .collect();
        for (offer_cost, bucket, offer_skipped) in priced {
            skipped.extend(offer_skipped);
            if let Some(cost) = offer_cost {
                annual_buckets.insert(cost.offer_id.clone(), bucket);
                costs.push(cost);
            }
        }

        let entries = rank_costs(costs, self.household.current_offer_id.as_deref());
        info!(
            ranked = entries.len(),
            skipped = skipped.len(),
            "ranked tariff offers"
        );

        Ranking {
            entries,
            annual_buckets,
            skipped,
        }
    }

    /// Price one offer over the most recent rolling-year window. Intervals
    /// that cannot be classified are reported, not silently dropped; an
    /// offer whose pricing fails outright yields no cost entry.
    fn price_annual(
        &self,
        intervals: &[NormalizedInterval],
        offer: &TariffOffer,
    ) -> (Option<CostResult>, AggregationBucket, Vec<EngineError>) {
        let outcome = self.classifier.classify_sequence(intervals, &offer.family);
        let mut skipped = outcome.skipped;

        let buckets = fold(
            &outcome.classified,
            WindowKind::RollingYear,
            self.household.timezone,
        );
        let bucket = buckets
            .into_iter()
            .find(|bucket| bucket.period == BucketPeriod::RollingYear { index: 0 })
            .unwrap_or(AggregationBucket {
                period: BucketPeriod::RollingYear { index: 0 },
                per_label_kwh: IndexMap::new(),
            });

        match price(&bucket, offer, self.household.subscribed_power_kva) {
            Ok(cost) => (Some(cost), bucket, skipped),
            Err(error) => {
                skipped.push(error);
                (None, bucket, skipped)
            }
        }
    }
}

/// The pure ordering step: sort priced offers by ascending total cost (ties
/// by id) and attach savings against the current offer when it is present
/// among them.
pub fn rank_costs(costs: Vec<CostResult>, current_offer_id: Option<&str>) -> Vec<RankedOffer> {
    let current_total = current_offer_id.and_then(|id| {
        costs
            .iter()
            .find(|cost| cost.offer_id == id)
            .map(|cost| cost.total_cost)
    });

    let mut entries: Vec<RankedOffer> = costs
        .into_iter()
        .map(|cost| RankedOffer {
            savings: current_total.map(|current| current - cost.total_cost),
            cost,
        })
        .collect();
    entries.sort_by(|left, right| {
        (OrderedFloat(left.cost.total_cost), &left.cost.offer_id)
            .cmp(&(OrderedFloat(right.cost.total_cost), &right.cost.offer_id))
    });
    entries
}
