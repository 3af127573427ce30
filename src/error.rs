//! Unified error type for hrvrank
//!
//! Every failure in the core is a deterministic validation or domain error. Nothing here is
//! transient, so there is no retry classification; callers decide whether to re-prompt or exit.

use thiserror::Error;

/// Top-level error type for lookups, estimation and table handling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HrvError {
    /// Age is not covered by any band of the normative table
    #[error("Age {age} is outside the study's range ({min}-{max} years)")]
    OutOfRange { age: u32, min: u32, max: u32 },

    /// Gender is not one of the supported values
    #[error("Invalid gender '{input}': must be 'male' or 'female'")]
    InvalidGender { input: String },

    /// Metric name is not one of the supported HRV metrics
    #[error("Unknown HRV metric '{input}': expected sdNN, RMSSD or HF")]
    UnknownMetric { input: String },

    /// Matched stratum cannot standardise a value
    #[error("Degenerate stratum: standard deviation is {standard_deviation}")]
    DegenerateStratum { standard_deviation: f64 },

    /// Matched stratum is too small for a t-based interval
    #[error("Insufficient sample: n={sample_size}, at least 2 required")]
    InsufficientSample { sample_size: u32 },

    /// Inverse query target is outside the open interval (0, 100)
    #[error("Invalid percentile {percentile}: must be strictly between 0 and 100")]
    InvalidPercentile { percentile: f64 },

    /// Observed metric value is NaN or infinite
    #[error("Invalid metric value {value}: must be a finite number")]
    InvalidValue { value: f64 },

    /// Inputs were valid but the loaded table has no matching entry
    #[error("No normative data for a {age}-year-old {gender} ({metric})")]
    StratumNotFound {
        age: u32,
        gender: String,
        metric: String,
    },

    /// A custom normative table failed validation
    #[error("Invalid normative table: {0}")]
    InvalidTable(String),

    /// Statistical distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),
}

/// Result type alias for hrvrank operations
pub type Result<T> = std::result::Result<T, HrvError>;

impl HrvError {
    /// Whether the error was caused by user input rather than by the reference data
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HrvError::OutOfRange { .. }
                | HrvError::InvalidGender { .. }
                | HrvError::UnknownMetric { .. }
                | HrvError::InvalidPercentile { .. }
                | HrvError::InvalidValue { .. }
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_input_error() {
            return ErrorSeverity::Warning;
        }
        match self {
            HrvError::Distribution(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Process exit status for single-shot commands
    ///
    /// Input errors exit with 2 (usage), reference data problems with 1.
    pub fn exit_code(&self) -> i32 {
        if self.is_input_error() {
            2
        } else {
            1
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HrvError::OutOfRange { min, max, .. } => {
                format!("Error: Age is outside the study's range ({}-{} years).", min, max)
            }
            HrvError::InvalidGender { .. } => {
                "Error: Gender must be 'male' or 'female'.".to_string()
            }
            HrvError::StratumNotFound { age, gender, metric } => format!(
                "Error: The metric '{}' is not available for a {}-year-old {} in the loaded table.",
                metric, age, gender
            ),
            HrvError::DegenerateStratum { .. } => {
                "Error: Standard deviation is zero, cannot calculate percentile.".to_string()
            }
            _ => format!("Error: {}", self),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Internal failure of the numerical backend
    Critical,
    /// Reference data cannot answer the query
    Error,
    /// Bad user input, recoverable by asking again
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = HrvError::OutOfRange { age: 10, min: 25, max: 74 };
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = HrvError::DegenerateStratum { standard_deviation: 0.0 };
        assert_eq!(err.severity(), ErrorSeverity::Error);

        let err = HrvError::Distribution("bad".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(HrvError::UnknownMetric { input: "LF".to_string() }.exit_code(), 2);
        assert_eq!(HrvError::InsufficientSample { sample_size: 1 }.exit_code(), 1);
    }

    #[test]
    fn test_user_messages() {
        let err = HrvError::OutOfRange { age: 80, min: 25, max: 74 };
        assert_eq!(
            err.user_message(),
            "Error: Age is outside the study's range (25-74 years)."
        );

        let err = HrvError::InvalidGender { input: "other".to_string() };
        assert!(err.user_message().contains("'male' or 'female'"));

        let err = HrvError::InvalidPercentile { percentile: 100.0 };
        assert!(err.user_message().contains("strictly between 0 and 100"));
    }
}
