use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated statistics for a completed run.
///
/// Computed once by the metrics aggregator after all virtual users have
/// terminated; latency quantiles are estimates (t-digest), the max is exact.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Failed requests as a percentage of total (0..=100).
    pub failed_percent: f64,
    pub max_latency: Duration,
    pub mean_latency: Duration,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p99: Duration,
    /// Per-request-name breakdown, keyed by `scenario / step`.
    pub per_step: BTreeMap<String, StepStatistics>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StepStatistics {
    pub count: u64,
    pub failed: u64,
}

impl RunStatistics {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            failed_requests: 0,
            failed_percent: 0.,
            max_latency: Duration::ZERO,
            mean_latency: Duration::ZERO,
            latency_p50: Duration::ZERO,
            latency_p90: Duration::ZERO,
            latency_p99: Duration::ZERO,
            per_step: BTreeMap::new(),
        }
    }
}

impl std::fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} failed={} ({:.2}%), max={}, mean={}, p50={}, p90={}, p99={}",
            self.total_requests,
            self.failed_requests,
            self.failed_percent,
            humantime::format_duration(self.max_latency),
            humantime::format_duration(self.mean_latency),
            humantime::format_duration(self.latency_p50),
            humantime::format_duration(self.latency_p90),
            humantime::format_duration(self.latency_p99),
        )
    }
}
