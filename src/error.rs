//! Error types for the presenteeism engine.
//!
//! Only caller contract violations are errors.  A survey with too few
//! respondents is not an error: the estimate is still returned and
//! carries `is_valid = false`.

use thiserror::Error;

/// Errors raised by the estimators and the settings loader.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A numeric input that must be positive (or non-negative) was not.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// Efficiency answers are restricted to 100, 90, 80, 70, 60 or 50.
    #[error("invalid efficiency percentage {0}, expected one of 100, 90, 80, 70, 60, 50")]
    InvalidEfficiency(u8),

    /// Settings could not be decoded.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be > 0, got {value}")))
    }
}

/// Fails unless `value` is finite and not negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be >= 0, got {value}")))
    }
}

/// Fails unless `value` lies in `[0, 1]`.
pub(crate) fn ensure_fraction(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be within [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_guard() {
        assert!(ensure_positive("headcount", 1.0).is_ok());
        assert!(ensure_positive("headcount", 0.0).is_err());
        assert!(ensure_positive("headcount", f64::NAN).is_err());
        assert!(ensure_non_negative("coeff", 0.0).is_ok());
        assert!(ensure_non_negative("coeff", -0.1).is_err());
        assert!(ensure_fraction("prevalence", 1.0).is_ok());
        assert!(ensure_fraction("prevalence", 1.01).is_err());
        assert!(ensure_fraction("prevalence", f64::NAN).is_err());
    }

    #[test]
    fn test_message_names_parameter() {
        let err = ensure_positive("working_days_per_year", 0.0).unwrap_err();
        assert!(err.to_string().contains("working_days_per_year"));
    }
}
