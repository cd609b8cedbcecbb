//! Data models for the presenteeism engine.
//!
//! The `models` module defines the serialisable inputs (company
//! financials and anonymous survey responses), the derived survey
//! statistics and the calculation result.  Every type derives
//! `Serialize` and `Deserialize` with camelCase field names so the host
//! application can pass them straight through its JSON endpoints.
//!
//! The survey answer sets are closed enumerations.  Modelling them as
//! enums means an unknown answer is rejected when the response is
//! decoded rather than silently ignored during aggregation.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default annual working hours used when a company does not supply
/// its own figure.
pub const DEFAULT_HOURS_PER_YEAR: f64 = 1600.0;

/// Snapshot of a company's HR and payroll parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFinancials {
    /// Number of employees.  Must be greater than zero.
    pub headcount: u32,
    /// Average gross annual salary per employee.
    pub avg_gross_salary: f64,
    /// Employer social contribution rate as a fraction (`0.45` = 45%).
    pub employer_contribution_rate: f64,
    /// Absenteeism rate as a percentage (`5.0` = 5%).
    pub absenteeism_rate: f64,
    /// Annual hours worked per employee.  Defaults to
    /// [`DEFAULT_HOURS_PER_YEAR`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_per_year: Option<f64>,
    /// Annual value added by the company.  When present and positive it
    /// replaces the loaded salary as the basis for the value of an hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_value_added: Option<f64>,
}

impl CompanyFinancials {
    pub fn hours_per_year(&self) -> f64 {
        self.hours_per_year.unwrap_or(DEFAULT_HOURS_PER_YEAR)
    }

    /// Gross salary plus employer contributions.
    pub fn loaded_salary(&self) -> f64 {
        self.avg_gross_salary * (1.0 + self.employer_contribution_rate)
    }

    /// Total loaded payroll of the company.
    pub fn payroll(&self) -> f64 {
        self.loaded_salary() * f64::from(self.headcount)
    }
}

/// How often a respondent worked while impaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prevalence {
    Never,
    Occasionally,
    Regularly,
    VeryFrequently,
}

/// Self-assessed efficiency while impaired.  Only the six survey
/// answers are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Efficiency {
    Full,
    Pct90,
    Pct80,
    Pct70,
    Pct60,
    Pct50,
}

impl Efficiency {
    pub const ALL: [Efficiency; 6] = [
        Efficiency::Full,
        Efficiency::Pct90,
        Efficiency::Pct80,
        Efficiency::Pct70,
        Efficiency::Pct60,
        Efficiency::Pct50,
    ];

    pub fn percent(self) -> u8 {
        match self {
            Efficiency::Full => 100,
            Efficiency::Pct90 => 90,
            Efficiency::Pct80 => 80,
            Efficiency::Pct70 => 70,
            Efficiency::Pct60 => 60,
            Efficiency::Pct50 => 50,
        }
    }
}

impl TryFrom<u8> for Efficiency {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Efficiency::ALL
            .into_iter()
            .find(|e| e.percent() == value)
            .ok_or(EngineError::InvalidEfficiency(value))
    }
}

impl From<Efficiency> for u8 {
    fn from(value: Efficiency) -> Self {
        value.percent()
    }
}

/// Contributing factors a respondent may tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Factor {
    Fatigue,
    Stress,
    PhysicalPain,
    ChronicIllness,
    MentalHealth,
    Workload,
    PersonalSituation,
    Other,
}

impl Factor {
    pub const ALL: [Factor; 8] = [
        Factor::Fatigue,
        Factor::Stress,
        Factor::PhysicalPain,
        Factor::ChronicIllness,
        Factor::MentalHealth,
        Factor::Workload,
        Factor::PersonalSituation,
        Factor::Other,
    ];
}

/// Observed effects on the respondent's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    Concentration,
    Errors,
    Slowness,
    Communication,
    Quality,
    Deadlines,
}

impl Impact {
    pub const ALL: [Impact; 6] = [
        Impact::Concentration,
        Impact::Errors,
        Impact::Slowness,
        Impact::Communication,
        Impact::Quality,
        Impact::Deadlines,
    ];
}

/// Weekly working-hours bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkingHours {
    #[serde(rename = "UNDER_35")]
    Under35,
    #[serde(rename = "FROM_35_TO_39")]
    From35To39,
    #[serde(rename = "FROM_40_TO_44")]
    From40To44,
    #[serde(rename = "FROM_45_TO_49")]
    From45To49,
    #[serde(rename = "OVER_50")]
    Over50,
}

impl WorkingHours {
    pub const ALL: [WorkingHours; 5] = [
        WorkingHours::Under35,
        WorkingHours::From35To39,
        WorkingHours::From40To44,
        WorkingHours::From45To49,
        WorkingHours::Over50,
    ];
}

/// One anonymous survey response.
///
/// Factor and impact sets are ordered so that two responses with the
/// same answers always serialise to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub prevalence: Prevalence,
    pub efficiency: Efficiency,
    #[serde(default)]
    pub factors: BTreeSet<Factor>,
    #[serde(default)]
    pub impacts: BTreeSet<Impact>,
    pub working_hours: WorkingHours,
}

impl ResponseRecord {
    pub fn is_affected(&self) -> bool {
        self.prevalence != Prevalence::Never
    }
}

/// Population statistics derived from a batch of responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStatistics {
    /// Number of responses aggregated.
    pub respondents_count: usize,
    /// Fraction of respondents who reported any presenteeism.
    pub prevalence: f64,
    /// Mean efficiency of affected respondents as a fraction, `1.0`
    /// when nobody is affected.
    pub avg_efficiency_score: f64,
    /// Whole percentages, one entry per enumeration value.
    pub factor_distribution: BTreeMap<Factor, u32>,
    /// Whole percentages, one entry per enumeration value.
    pub impact_distribution: BTreeMap<Impact, u32>,
    /// Whole percentages, one entry per enumeration value.
    pub working_hours_distribution: BTreeMap<WorkingHours, u32>,
}

impl AggregateStatistics {
    /// Whether the distributions may be shown without risking the
    /// anonymity of individual respondents.
    pub fn is_releasable(&self, anonymity_threshold: usize) -> bool {
        self.respondents_count >= anonymity_threshold
    }
}

/// Reliability of a survey estimate, driven by the response rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityFlag {
    Low,
    Medium,
    High,
}

/// Which figure was used to value one working hour in Method B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueBasis {
    ValueAdded,
    LoadedSalary,
}

/// Intermediate values of the sector-ratio estimate (Method A).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroBreakdown {
    /// Gross salary plus employer contributions.
    pub loaded_salary: f64,
    /// Presenteeism rate in percent.
    pub pres_rate: f64,
    /// Presenteeism days across the whole workforce per year.
    pub pres_days: f64,
    /// Presenteeism days converted into fully lost days.
    pub productivity_loss_days: f64,
    /// Coefficient applied to the absenteeism rate.
    pub pres_abs_coefficient: f64,
    /// Share of a presenteeism day counted as lost.
    pub productivity_loss_coeff: f64,
    /// Working days used to turn a salary into a daily cost.
    pub working_days_per_year: f64,
}

/// Intermediate values of the survey-based estimate (Method B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroBreakdown {
    /// Number of survey responses aggregated.
    pub respondents_count: usize,
    /// `respondents_count / headcount`.
    pub response_rate: f64,
    /// Fraction of respondents reporting presenteeism.
    pub prevalence: f64,
    /// Mean efficiency of affected respondents as a fraction.
    pub avg_efficiency_score: f64,
    /// `1 - avg_efficiency_score`.
    pub productivity_loss: f64,
    /// `headcount × prevalence`, not rounded.
    pub affected_employees: f64,
    /// Annual hours per employee used for the estimate.
    pub hours_per_year: f64,
    /// Hours per year worked at reduced efficiency, net of the loss.
    pub degraded_hours: f64,
    /// Value of one working hour.
    pub value_per_hour: f64,
    /// Figure `value_per_hour` was derived from.
    pub value_basis: ValueBasis,
    /// `degraded_hours × value_per_hour × error_correction_coeff`.
    pub loss_value: f64,
    /// Self-report bias multiplier that was applied.
    pub error_correction_coeff: f64,
}

/// Method-specific intermediate values, tagged by `method`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Breakdown {
    Macro(MacroBreakdown),
    Micro(MicroBreakdown),
}

/// Result of a presenteeism cost estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    /// Estimated annual cost.
    pub cost: f64,
    /// Cost as a percentage of the loaded payroll.
    pub cost_pct_payroll: f64,
    /// Cost divided by headcount.
    pub cost_per_employee: f64,
    /// Loaded salary times headcount.
    pub payroll: f64,
    /// `false` when the survey has fewer respondents than the
    /// statistical minimum.  Always `true` for Method A.
    pub is_valid: bool,
    /// Only set for survey-based estimates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_flag: Option<QualityFlag>,
    pub breakdown: Breakdown,
}

/// Gap between the two estimation methods for the same company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodComparison {
    /// Cost from the sector-ratio estimate.
    pub macro_cost: f64,
    /// Cost from the survey-based estimate.
    pub micro_cost: f64,
    /// `micro_cost - macro_cost`.
    pub difference: f64,
    /// `micro_cost / macro_cost`, absent when the macro cost is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}
