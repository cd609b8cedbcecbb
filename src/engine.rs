//! Presenteeism cost estimators.
//!
//! The `engine` module turns company financials into a
//! [`CalculationResult`], either from sector ratios (Method A,
//! [`calculate_macro`]) or from aggregated survey statistics (Method B,
//! [`calculate_micro`]).  Both are pure functions: the same inputs give
//! bit-identical outputs.  Every intermediate value is kept in the
//! result's breakdown so that a figure can be traced back to its inputs.
//!
//! Several campaigns can be costed at once with
//! [`calculate_micro_batch`], which uses the [`rayon`] crate to spread
//! the work across CPU cores.

use crate::error::{ensure_fraction, ensure_non_negative, ensure_positive, EngineError, Result};
use crate::models::{
    AggregateStatistics, Breakdown, CalculationResult, CompanyFinancials, MacroBreakdown,
    MethodComparison, MicroBreakdown, QualityFlag, ResponseRecord, ValueBasis,
};
use crate::settings::{MacroCoefficients, MicroCoefficients};
use crate::survey::aggregate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Check the company parameters shared by both methods.
fn validate_financials(financials: &CompanyFinancials) -> Result<()> {
    if financials.headcount == 0 {
        return Err(EngineError::invalid("headcount", "must be > 0, got 0"));
    }
    ensure_positive("avg_gross_salary", financials.avg_gross_salary)?;
    ensure_non_negative("employer_contribution_rate", financials.employer_contribution_rate)?;
    ensure_non_negative("absenteeism_rate", financials.absenteeism_rate)?;
    ensure_positive("hours_per_year", financials.hours_per_year())
}

/// Estimate presenteeism cost from the sector absenteeism rate.
pub fn calculate_macro(
    financials: &CompanyFinancials,
    coefficients: &MacroCoefficients,
) -> Result<CalculationResult> {
    validate_financials(financials)?;
    coefficients.validate()?;

    let headcount = f64::from(financials.headcount);
    let working_days = coefficients.working_days_per_year;

    let loaded_salary = financials.loaded_salary();
    let payroll = loaded_salary * headcount;
    // absenteeism_rate is already a percentage
    let pres_rate = financials.absenteeism_rate * coefficients.pres_abs_coefficient;
    let pres_days = (pres_rate / 100.0) * headcount * working_days;
    let productivity_loss_days = pres_days * coefficients.productivity_loss_coeff;
    let cost = productivity_loss_days
        * financials.avg_gross_salary
        * (1.0 + financials.employer_contribution_rate)
        / working_days;

    debug!(headcount = financials.headcount, pres_rate, cost, "method A estimate");

    Ok(CalculationResult {
        cost,
        cost_pct_payroll: cost / payroll * 100.0,
        cost_per_employee: cost / headcount,
        payroll,
        is_valid: true,
        quality_flag: None,
        breakdown: Breakdown::Macro(MacroBreakdown {
            loaded_salary,
            pres_rate,
            pres_days,
            productivity_loss_days,
            pres_abs_coefficient: coefficients.pres_abs_coefficient,
            productivity_loss_coeff: coefficients.productivity_loss_coeff,
            working_days_per_year: working_days,
        }),
    })
}

/// Grade a response rate against the configured thresholds.
pub fn quality_flag(response_rate: f64, coefficients: &MicroCoefficients) -> QualityFlag {
    if response_rate >= coefficients.high_response_rate {
        QualityFlag::High
    } else if response_rate >= coefficients.medium_response_rate {
        QualityFlag::Medium
    } else {
        QualityFlag::Low
    }
}

/// Estimate presenteeism cost from aggregated survey statistics.
///
/// Below the respondent minimum the estimate is still computed but
/// flagged `is_valid = false`; preview screens want an indicative figure
/// before the survey closes.
pub fn calculate_micro(
    financials: &CompanyFinancials,
    stats: &AggregateStatistics,
    coefficients: &MicroCoefficients,
) -> Result<CalculationResult> {
    validate_financials(financials)?;
    coefficients.validate()?;
    ensure_fraction("prevalence", stats.prevalence)?;
    ensure_fraction("avg_efficiency_score", stats.avg_efficiency_score)?;

    let headcount = f64::from(financials.headcount);
    let hours_per_year = financials.hours_per_year();
    let payroll = financials.payroll();

    let respondents = stats.respondents_count;
    let is_valid = respondents >= coefficients.min_respondents;
    let response_rate = respondents as f64 / headcount;

    let productivity_loss = 1.0 - stats.avg_efficiency_score;
    let affected_employees = headcount * stats.prevalence;
    let degraded_hours = affected_employees * hours_per_year * productivity_loss;

    let (value_per_hour, value_basis) = match financials.annual_value_added {
        Some(value_added) if value_added > 0.0 => (
            value_added / (headcount * hours_per_year),
            ValueBasis::ValueAdded,
        ),
        _ => (
            financials.loaded_salary() / hours_per_year,
            ValueBasis::LoadedSalary,
        ),
    };
    let loss_value = degraded_hours * value_per_hour * coefficients.error_correction_coeff;
    let cost = loss_value;

    debug!(
        respondents,
        is_valid,
        prevalence = stats.prevalence,
        cost,
        "method B estimate"
    );

    Ok(CalculationResult {
        cost,
        cost_pct_payroll: cost / payroll * 100.0,
        cost_per_employee: cost / headcount,
        payroll,
        is_valid,
        quality_flag: Some(quality_flag(response_rate, coefficients)),
        breakdown: Breakdown::Micro(MicroBreakdown {
            respondents_count: respondents,
            response_rate,
            prevalence: stats.prevalence,
            avg_efficiency_score: stats.avg_efficiency_score,
            productivity_loss,
            affected_employees,
            hours_per_year,
            degraded_hours,
            value_per_hour,
            value_basis,
            loss_value,
            error_correction_coeff: coefficients.error_correction_coeff,
        }),
    })
}

/// One campaign of a batch computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInput {
    pub campaign_id: String,
    pub financials: CompanyFinancials,
    pub responses: Vec<ResponseRecord>,
}

/// Aggregate and cost many campaigns in parallel.
///
/// Results come back in input order.  A failing campaign does not stop
/// the others.
pub fn calculate_micro_batch(
    campaigns: &[CampaignInput],
    coefficients: &MicroCoefficients,
) -> Vec<(String, Result<CalculationResult>)> {
    campaigns
        .par_iter()
        .map(|campaign| {
            let stats = aggregate(&campaign.responses);
            let result = calculate_micro(&campaign.financials, &stats, coefficients);
            (campaign.campaign_id.clone(), result)
        })
        .collect()
}

/// Compare a Method A and a Method B estimate for the same company.
pub fn compare_methods(
    macro_result: &CalculationResult,
    micro_result: &CalculationResult,
) -> MethodComparison {
    let macro_cost = macro_result.cost;
    let micro_cost = micro_result.cost;
    MethodComparison {
        macro_cost,
        micro_cost,
        difference: micro_cost - macro_cost,
        ratio: (macro_cost != 0.0).then_some(micro_cost / macro_cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Efficiency, Prevalence, WorkingHours};
    use std::collections::BTreeSet;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= 1e-6 * expected.abs().max(1.0)
    }

    fn financials() -> CompanyFinancials {
        CompanyFinancials {
            headcount: 100,
            avg_gross_salary: 40_000.0,
            employer_contribution_rate: 0.45,
            absenteeism_rate: 5.0,
            hours_per_year: None,
            annual_value_added: None,
        }
    }

    fn stats(respondents: usize, prevalence: f64, efficiency: f64) -> AggregateStatistics {
        let mut stats = aggregate(&[]);
        stats.respondents_count = respondents;
        stats.prevalence = prevalence;
        stats.avg_efficiency_score = efficiency;
        stats
    }

    fn micro_breakdown(result: &CalculationResult) -> &MicroBreakdown {
        match &result.breakdown {
            Breakdown::Micro(b) => b,
            other => panic!("expected micro breakdown, got {other:?}"),
        }
    }

    #[test]
    fn test_macro_reference_company() {
        let result = calculate_macro(&financials(), &MacroCoefficients::default()).unwrap();
        let Breakdown::Macro(b) = &result.breakdown else {
            panic!("expected macro breakdown");
        };
        assert!(close(b.pres_rate, 6.5));
        assert!(close(b.pres_days, 1430.0));
        assert!(close(b.productivity_loss_days, 471.9));
        assert!(close(result.cost, 471.9 * 40_000.0 * 1.45 / 220.0));
        assert!(close(result.cost_per_employee, result.cost / 100.0));
        assert!(close(result.cost_pct_payroll, result.cost / 5_800_000.0 * 100.0));
        assert!(result.is_valid);
        assert_eq!(result.quality_flag, None);
    }

    #[test]
    fn test_macro_is_deterministic() {
        let a = calculate_macro(&financials(), &MacroCoefficients::default()).unwrap();
        let b = calculate_macro(&financials(), &MacroCoefficients::default()).unwrap();
        assert_eq!(a.cost.to_bits(), b.cost.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_macro_rejects_zero_headcount() {
        let mut f = financials();
        f.headcount = 0;
        let err = calculate_macro(&f, &MacroCoefficients::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "headcount", .. }));
    }

    #[test]
    fn test_macro_rejects_zero_working_days() {
        let coeffs = MacroCoefficients {
            working_days_per_year: 0.0,
            ..MacroCoefficients::default()
        };
        assert!(calculate_macro(&financials(), &coeffs).is_err());
    }

    #[test]
    fn test_micro_reference_survey() {
        let result =
            calculate_micro(&financials(), &stats(10, 0.6, 0.75), &MicroCoefficients::default())
                .unwrap();
        let b = micro_breakdown(&result);
        assert!(close(b.value_per_hour, 36.25));
        assert_eq!(b.value_basis, ValueBasis::LoadedSalary);
        assert!(close(b.affected_employees, 60.0));
        assert!(close(b.productivity_loss, 0.25));
        assert!(close(b.degraded_hours, 24_000.0));
        assert!(close(b.loss_value, 24_000.0 * 36.25 * 1.1));
        assert!(close(result.cost, b.loss_value));
        assert!(close(result.cost_per_employee, result.cost / 100.0));
        assert!(result.is_valid);
        assert!(close(b.response_rate, 0.1));
        assert_eq!(result.quality_flag, Some(QualityFlag::Low));
    }

    #[test]
    fn test_micro_below_minimum_still_computes() {
        let result =
            calculate_micro(&financials(), &stats(9, 0.6, 0.75), &MicroCoefficients::default())
                .unwrap();
        assert!(!result.is_valid);
        assert!(result.cost > 0.0);
    }

    #[test]
    fn test_micro_prefers_value_added() {
        let mut f = financials();
        f.annual_value_added = Some(8_000_000.0);
        let result =
            calculate_micro(&f, &stats(30, 0.5, 0.8), &MicroCoefficients::default()).unwrap();
        let b = micro_breakdown(&result);
        assert_eq!(b.value_basis, ValueBasis::ValueAdded);
        assert!(close(b.value_per_hour, 8_000_000.0 / (100.0 * 1600.0)));
        assert_eq!(result.quality_flag, Some(QualityFlag::High));
    }

    #[test]
    fn test_micro_ignores_non_positive_value_added() {
        let mut f = financials();
        f.annual_value_added = Some(0.0);
        let result =
            calculate_micro(&f, &stats(20, 0.5, 0.8), &MicroCoefficients::default()).unwrap();
        assert_eq!(micro_breakdown(&result).value_basis, ValueBasis::LoadedSalary);
        assert_eq!(result.quality_flag, Some(QualityFlag::Medium));
    }

    #[test]
    fn test_zero_salary_is_rejected_by_both_methods() {
        let mut f = financials();
        f.avg_gross_salary = 0.0;
        let err = calculate_macro(&f, &MacroCoefficients::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "avg_gross_salary", .. }));
        let err = calculate_micro(&f, &stats(10, 0.6, 0.75), &MicroCoefficients::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "avg_gross_salary", .. }));
    }

    #[test]
    fn test_micro_results_stay_finite() {
        let result =
            calculate_micro(&financials(), &stats(10, 0.6, 0.75), &MicroCoefficients::default())
                .unwrap();
        assert!(result.cost_pct_payroll.is_finite());
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("null"));
        let back: CalculationResult = serde_json::from_str(&json).unwrap();
        assert!((back.cost_pct_payroll - result.cost_pct_payroll).abs() < 1e-9);
    }

    #[test]
    fn test_micro_rejects_out_of_range_statistics() {
        let coeffs = MicroCoefficients::default();
        let err = calculate_micro(&financials(), &stats(10, 1.5, 0.75), &coeffs).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "prevalence", .. }));
        let err = calculate_micro(&financials(), &stats(10, 0.5, -0.2), &coeffs).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "avg_efficiency_score", .. }));
        let err = calculate_micro(&financials(), &stats(10, 0.5, 1.2), &coeffs).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "avg_efficiency_score", .. }));
        assert!(calculate_micro(&financials(), &stats(10, 1.0, 0.0), &coeffs).is_ok());
    }

    #[test]
    fn test_micro_rejects_zero_hours() {
        let mut f = financials();
        f.hours_per_year = Some(0.0);
        let err = calculate_micro(&f, &stats(10, 0.5, 0.8), &MicroCoefficients::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "hours_per_year", .. }));
    }

    #[test]
    fn test_micro_nobody_affected_costs_nothing() {
        let result = calculate_micro(&financials(), &aggregate(&[]), &MicroCoefficients::default())
            .unwrap();
        assert_eq!(result.cost, 0.0);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_quality_thresholds_are_inclusive() {
        let coeffs = MicroCoefficients::default();
        assert_eq!(quality_flag(0.30, &coeffs), QualityFlag::High);
        assert_eq!(quality_flag(0.15, &coeffs), QualityFlag::Medium);
        assert_eq!(quality_flag(0.149, &coeffs), QualityFlag::Low);
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let response = ResponseRecord {
            prevalence: Prevalence::Regularly,
            efficiency: Efficiency::Pct70,
            factors: BTreeSet::new(),
            impacts: BTreeSet::new(),
            working_hours: WorkingHours::From40To44,
        };
        let mut broken = financials();
        broken.headcount = 0;
        let campaigns = vec![
            CampaignInput {
                campaign_id: "a".into(),
                financials: financials(),
                responses: vec![response.clone(); 12],
            },
            CampaignInput {
                campaign_id: "b".into(),
                financials: broken,
                responses: vec![response; 12],
            },
        ];
        let results = calculate_micro_batch(&campaigns, &MicroCoefficients::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1.as_ref().unwrap().is_valid);
        assert_eq!(results[1].0, "b");
        assert!(results[1].1.is_err());
    }

    #[test]
    fn test_compare_methods() {
        let macro_result = calculate_macro(&financials(), &MacroCoefficients::default()).unwrap();
        let micro_result =
            calculate_micro(&financials(), &stats(10, 0.6, 0.75), &MicroCoefficients::default())
                .unwrap();
        let comparison = compare_methods(&macro_result, &micro_result);
        assert!(close(comparison.difference, micro_result.cost - macro_result.cost));
        assert!(close(comparison.ratio.unwrap(), micro_result.cost / macro_result.cost));

        let mut zero = macro_result.clone();
        zero.cost = 0.0;
        assert_eq!(compare_methods(&zero, &micro_result).ratio, None);
    }
}
