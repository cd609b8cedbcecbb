//! Tunable coefficients and settings loading.
//!
//! The `settings` module holds the coefficients of both estimation
//! methods and the cache timings.  Every field has a default so that a
//! settings file only needs to name the values it overrides.  Settings
//! are expected to be stored externally as JSON files, one file per
//! named profile (for instance one per sector).

use crate::error::{ensure_non_negative, ensure_positive, EngineError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming a JSON settings file.
pub const SETTINGS_ENV_VAR: &str = "PRESENTEEISM_SETTINGS";

/// Coefficients of the sector-ratio estimate (Method A).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MacroCoefficients {
    /// Presenteeism days per absenteeism day.
    pub pres_abs_coefficient: f64,
    /// Share of a presenteeism day that is lost productivity.
    pub productivity_loss_coeff: f64,
    pub working_days_per_year: f64,
}

impl Default for MacroCoefficients {
    fn default() -> Self {
        Self {
            pres_abs_coefficient: 1.3,
            productivity_loss_coeff: 0.33,
            working_days_per_year: 220.0,
        }
    }
}

impl MacroCoefficients {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("pres_abs_coefficient", self.pres_abs_coefficient)?;
        ensure_non_negative("productivity_loss_coeff", self.productivity_loss_coeff)?;
        ensure_positive("working_days_per_year", self.working_days_per_year)
    }
}

/// Respondent count below which a survey estimate is never valid nor
/// releasable.  Settings may raise the minimum but not lower it.
pub const HARD_MIN_RESPONDENTS: usize = 10;

/// Coefficients and thresholds of the survey-based estimate (Method B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MicroCoefficients {
    /// Multiplier correcting the self-report bias of the survey.
    pub error_correction_coeff: f64,
    /// Respondents required for the estimate to be flagged valid.  Never
    /// below [`HARD_MIN_RESPONDENTS`].
    pub min_respondents: usize,
    /// Response rate from which quality is HIGH.
    pub high_response_rate: f64,
    /// Response rate from which quality is MEDIUM.
    pub medium_response_rate: f64,
}

impl Default for MicroCoefficients {
    fn default() -> Self {
        Self {
            error_correction_coeff: 1.1,
            min_respondents: HARD_MIN_RESPONDENTS,
            high_response_rate: 0.30,
            medium_response_rate: 0.15,
        }
    }
}

impl MicroCoefficients {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("error_correction_coeff", self.error_correction_coeff)?;
        if self.min_respondents < HARD_MIN_RESPONDENTS {
            return Err(EngineError::invalid(
                "min_respondents",
                format!(
                    "must be at least {HARD_MIN_RESPONDENTS}, got {}",
                    self.min_respondents
                ),
            ));
        }
        ensure_non_negative("high_response_rate", self.high_response_rate)?;
        ensure_non_negative("medium_response_rate", self.medium_response_rate)?;
        if self.medium_response_rate > self.high_response_rate {
            return Err(EngineError::invalid(
                "medium_response_rate",
                format!(
                    "must not exceed high_response_rate ({} > {})",
                    self.medium_response_rate, self.high_response_rate
                ),
            ));
        }
        Ok(())
    }
}

/// Timings of the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            sweep_interval_seconds: 600,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Complete settings object handed over by the host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub macro_coefficients: MacroCoefficients,
    pub micro_coefficients: MicroCoefficients,
    pub cache: CacheSettings,
}

impl EngineSettings {
    /// Parse settings from a JSON document and check the coefficients.
    pub fn from_json(data: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(data)?;
        settings.macro_coefficients.validate()?;
        settings.micro_coefficients.validate()?;
        Ok(settings)
    }
}

/// Load settings from a single JSON file.
pub fn load_settings_from_file(path: &Path) -> anyhow::Result<EngineSettings> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    let settings = EngineSettings::from_json(&data)
        .with_context(|| format!("parsing settings file {}", path.display()))?;
    debug!(path = %path.display(), "loaded engine settings");
    Ok(settings)
}

/// Load the file named by [`SETTINGS_ENV_VAR`], or the defaults when
/// the variable is unset.
pub fn load_settings_from_env() -> anyhow::Result<EngineSettings> {
    match std::env::var_os(SETTINGS_ENV_VAR) {
        Some(path) => load_settings_from_file(Path::new(&path)),
        None => Ok(EngineSettings::default()),
    }
}

/// Load every `.json` settings profile in a directory, keyed by file
/// stem.
///
/// Files that fail to parse are skipped with a warning so that one bad
/// profile does not take the others down.  A missing directory yields
/// an empty map.
pub fn load_settings_from_dir(path: &Path) -> anyhow::Result<HashMap<String, EngineSettings>> {
    let mut profiles = HashMap::new();
    if !path.is_dir() {
        return Ok(profiles);
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let Some(name) = file.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
            continue;
        };
        match load_settings_from_file(&file) {
            Ok(settings) => {
                profiles.insert(name, settings);
            }
            Err(err) => warn!(path = %file.display(), error = %err, "skipping settings profile"),
        }
    }
    Ok(profiles)
}
