use crate::ConfigurationError;
use serde::Serialize;
use std::time::Duration;

/// Run-level pass/fail condition over aggregated metrics.
///
/// Evaluated once at the end of a run; the overall verdict is the logical AND
/// of every configured assertion. A violated assertion never aborts a run
/// mid-flight, it only fails the verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Assertion {
    MaxResponseTimeLt(Duration),
    MeanResponseTimeLt(Duration),
    ResponseTimePercentileLt { quantile: f64, limit: Duration },
    FailedRequestsPercentLt(f64),
}

impl Assertion {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Assertion::ResponseTimePercentileLt { quantile, .. }
                if !(*quantile > 0. && *quantile < 1.) =>
            {
                Err(ConfigurationError::InvalidQuantile(*quantile))
            }
            Assertion::FailedRequestsPercentLt(pct) if !(0. ..=100.).contains(pct) => {
                Err(ConfigurationError::InvalidPercent(*pct))
            }
            _ => Ok(()),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Assertion::MaxResponseTimeLt(_) => "max response time".to_string(),
            Assertion::MeanResponseTimeLt(_) => "mean response time".to_string(),
            Assertion::ResponseTimePercentileLt { quantile, .. } => {
                format!("p{:.0} response time", quantile * 100.)
            }
            Assertion::FailedRequestsPercentLt(_) => "failed requests percent".to_string(),
        }
    }
}

/// Result of evaluating one [`Assertion`]: measured vs. expected, and whether
/// it held.
#[derive(Debug, Clone, Serialize)]
pub struct AssertionOutcome {
    pub description: String,
    pub measured: String,
    pub expected: String,
    pub passed: bool,
}

impl std::fmt::Display for AssertionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: measured {} (expected {}) .. {}",
            self.description,
            self.measured,
            self.expected,
            if self.passed { "ok" } else { "VIOLATED" },
        )
    }
}
