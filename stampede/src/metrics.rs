//! Outcome collection and end-of-run aggregation.
//!
//! Virtual-user tasks only ever append: outcomes go into a lock-free
//! [`AtomicBucket`] and counters are plain atomics, so recording never blocks
//! a task and a cancelled run keeps everything recorded up to that point.
//! Aggregation into [`RunStatistics`] and assertion evaluation happen once,
//! after the scheduler has drained.

use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use serde::Serialize;
use stampede_core::{
    Assertion, AssertionOutcome, RequestOutcome, RunStatistics, StepStatistics, UserTally,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

#[derive(Clone)]
pub(crate) struct MetricsSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    outcomes: AtomicBucket<RequestOutcome>,
    success: AtomicU64,
    error: AtomicU64,
    users_started: AtomicU64,
    users_completed: AtomicU64,
    users_failed: AtomicU64,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                outcomes: AtomicBucket::new(),
                success: AtomicU64::new(0),
                error: AtomicU64::new(0),
                users_started: AtomicU64::new(0),
                users_completed: AtomicU64::new(0),
                users_failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn record(&self, outcome: RequestOutcome) {
        if outcome.status.is_failure() {
            self.inner.error.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.success.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.outcomes.push(outcome);
    }

    pub fn user_started(&self) {
        self.inner.users_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_completed(&self) {
        self.inner.users_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_failed(&self) {
        self.inner.users_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Users that started but never reached a terminal state were cancelled.
    pub fn user_tally(&self) -> UserTally {
        let started = self.inner.users_started.load(Ordering::Relaxed);
        let completed = self.inner.users_completed.load(Ordering::Relaxed);
        let failed = self.inner.users_failed.load(Ordering::Relaxed);
        UserTally {
            started,
            completed,
            failed,
            aborted: started.saturating_sub(completed + failed),
        }
    }

    pub(crate) fn aggregate(&self) -> Aggregated {
        let mut outcomes = Vec::new();
        self.inner
            .outcomes
            .clear_with(|chunk| outcomes.extend_from_slice(chunk));
        outcomes.sort_by_key(|o| o.offset);

        if outcomes.is_empty() {
            return Aggregated {
                statistics: RunStatistics::empty(),
                digest: default_tdigest(),
                outcomes,
                users: self.user_tally(),
            };
        }

        let total = outcomes.len() as u64;
        let failed = outcomes.iter().filter(|o| o.status.is_failure()).count() as u64;

        let mut digest = default_tdigest();
        let mut max = Duration::ZERO;
        let mut sum_nanos: u128 = 0;
        let mut per_step = std::collections::BTreeMap::new();
        for outcome in &outcomes {
            digest.insert(outcome.latency.as_secs_f64());
            max = max.max(outcome.latency);
            sum_nanos += outcome.latency.as_nanos();
            let entry: &mut StepStatistics = per_step
                .entry(format!("{} / {}", outcome.scenario, outcome.step))
                .or_default();
            entry.count += 1;
            if outcome.status.is_failure() {
                entry.failed += 1;
            }
        }

        let mean = if total > 0 {
            Duration::from_nanos((sum_nanos / total as u128) as u64)
        } else {
            Duration::ZERO
        };

        let statistics = RunStatistics {
            total_requests: total,
            failed_requests: failed,
            failed_percent: if total > 0 {
                failed as f64 / total as f64 * 100.
            } else {
                0.
            },
            max_latency: max,
            mean_latency: mean,
            latency_p50: quantile(&digest, 0.5, total),
            latency_p90: quantile(&digest, 0.9, total),
            latency_p99: quantile(&digest, 0.99, total),
            per_step,
        };

        Aggregated {
            statistics,
            digest,
            outcomes,
            users: self.user_tally(),
        }
    }
}

pub(crate) struct Aggregated {
    pub statistics: RunStatistics,
    pub outcomes: Vec<RequestOutcome>,
    pub users: UserTally,
    digest: TDigest<K1>,
}

impl Aggregated {
    pub fn check(&self, assertion: &Assertion) -> AssertionOutcome {
        let (measured, expected, passed) = match assertion {
            Assertion::MaxResponseTimeLt(limit) => duration_check(self.statistics.max_latency, *limit),
            Assertion::MeanResponseTimeLt(limit) => {
                duration_check(self.statistics.mean_latency, *limit)
            }
            Assertion::ResponseTimePercentileLt { quantile: q, limit } => duration_check(
                quantile(&self.digest, *q, self.statistics.total_requests),
                *limit,
            ),
            Assertion::FailedRequestsPercentLt(limit) => (
                format!("{:.2}%", self.statistics.failed_percent),
                format!("< {limit:.2}%"),
                self.statistics.failed_percent < *limit,
            ),
        };
        AssertionOutcome {
            description: assertion.description(),
            measured,
            expected,
            passed,
        }
    }

    pub fn into_report(self, assertions: &[Assertion]) -> RunReport {
        let assertions = assertions.iter().map(|a| self.check(a)).collect();
        RunReport {
            statistics: self.statistics,
            assertions,
            users: self.users,
            outcomes: self.outcomes,
        }
    }
}

fn duration_check(measured: Duration, limit: Duration) -> (String, String, bool) {
    (
        humantime::format_duration(measured).to_string(),
        format!("< {}", humantime::format_duration(limit)),
        measured < limit,
    )
}

fn quantile(digest: &TDigest<K1>, q: f64, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let secs = digest.quantile(q);
    // The t-digest occasionally reports NaN on degenerate input.
    if secs.is_finite() && secs >= 0. {
        Duration::from_secs_f64(secs)
    } else {
        error!("non-finite latency quantile from t-digest");
        Duration::ZERO
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

/// Machine-readable summary of a finished run. The process-level exit status
/// reflects only the assertion verdict, never individual request failures.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub assertions: Vec<AssertionOutcome>,
    pub users: UserTally,
    /// Every recorded outcome, ordered by offset from run start.
    pub outcomes: Vec<RequestOutcome>,
}

impl RunReport {
    /// Logical AND of all configured assertions.
    pub fn passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}
