//! Survey aggregation.
//!
//! Turns a batch of anonymous [`ResponseRecord`]s into the population
//! statistics consumed by the survey-based estimator.  Aggregation is
//! order-independent and never fails: an empty batch is a defined case
//! (prevalence 0, efficiency 1.0) and callers are expected to check the
//! respondent count before costing it.

use crate::models::{AggregateStatistics, Factor, Impact, ResponseRecord, WorkingHours};
use std::collections::BTreeMap;

/// Aggregate a batch of survey responses.
pub fn aggregate(responses: &[ResponseRecord]) -> AggregateStatistics {
    let total = responses.len();

    let mut affected = 0usize;
    let mut efficiency_sum = 0u64;
    let mut factors: BTreeMap<Factor, usize> = Factor::ALL.iter().map(|f| (*f, 0)).collect();
    let mut impacts: BTreeMap<Impact, usize> = Impact::ALL.iter().map(|i| (*i, 0)).collect();
    let mut hours: BTreeMap<WorkingHours, usize> =
        WorkingHours::ALL.iter().map(|h| (*h, 0)).collect();

    for response in responses {
        if response.is_affected() {
            affected += 1;
            efficiency_sum += u64::from(response.efficiency.percent());
        }
        for factor in &response.factors {
            *factors.entry(*factor).or_default() += 1;
        }
        for impact in &response.impacts {
            *impacts.entry(*impact).or_default() += 1;
        }
        *hours.entry(response.working_hours).or_default() += 1;
    }

    let prevalence = if total == 0 {
        0.0
    } else {
        affected as f64 / total as f64
    };
    // Percentages are summed as integers so the mean does not depend on
    // response order.
    let avg_efficiency_score = if affected == 0 {
        1.0
    } else {
        efficiency_sum as f64 / affected as f64 / 100.0
    };

    AggregateStatistics {
        respondents_count: total,
        prevalence,
        avg_efficiency_score,
        factor_distribution: to_percentages(factors, total),
        impact_distribution: to_percentages(impacts, total),
        working_hours_distribution: to_percentages(hours, total),
    }
}

/// Convert counts into whole percentages of `total`.  Every key is kept,
/// zero counts included.
fn to_percentages<K: Ord>(counts: BTreeMap<K, usize>, total: usize) -> BTreeMap<K, u32> {
    counts
        .into_iter()
        .map(|(key, count)| {
            let pct = if total == 0 {
                0
            } else {
                (count as f64 / total as f64 * 100.0).round() as u32
            };
            (key, pct)
        })
        .collect()
}
