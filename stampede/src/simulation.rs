//! The run surface: a simulation is a set of populations plus global
//! assertions. Setup is validated in full before any virtual user starts;
//! the run itself always completes and reports aggregate statistics, and only
//! the assertion verdict (or a setup error) is reflected in the exit code.

use crate::metrics::{MetricsSink, RunReport};
use crate::runner::run_populations;
use crate::scenario::Population;
use crate::HttpClient;
use stampede_core::{Assertion, ConfigurationError, InjectionProfile};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{info, warn};

#[derive(Default)]
pub struct Simulation {
    populations: Vec<Population>,
    assertions: Vec<Assertion>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population(mut self, population: Population) -> Self {
        self.populations.push(population);
        self
    }

    pub fn assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Runs every population to completion and evaluates the assertions.
    ///
    /// Per-request failures are recorded, never propagated; the only error
    /// this returns is a malformed setup, raised before any user starts.
    pub async fn run(self, client: Arc<dyn HttpClient>) -> Result<RunReport, ConfigurationError> {
        self.validate()?;

        let Simulation {
            populations,
            assertions,
        } = self;
        let sink = MetricsSink::new();
        let run_start = Instant::now();
        run_populations(populations, client, sink.clone(), run_start).await;
        Ok(finish(sink, run_start, &assertions))
    }

    /// Like [`Simulation::run`], but stops early when `shutdown` resolves.
    ///
    /// Cancellation aborts all in-flight virtual users promptly; outcomes
    /// recorded before the signal remain in the report, and assertions are
    /// evaluated over them.
    pub async fn run_with_shutdown(
        self,
        client: Arc<dyn HttpClient>,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<RunReport, ConfigurationError> {
        self.validate()?;

        let Simulation {
            populations,
            assertions,
        } = self;
        let sink = MetricsSink::new();
        let run_start = Instant::now();

        let run = run_populations(populations, client, sink.clone(), run_start);
        tokio::pin!(run);
        tokio::select! {
            _ = &mut run => {}
            _ = shutdown => {
                // Dropping the run future aborts every spawned task.
                warn!("shutdown signal received; aborting in-flight users");
            }
        }

        Ok(finish(sink, run_start, &assertions))
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.populations.is_empty() {
            return Err(ConfigurationError::NoPopulations);
        }
        for population in &self.populations {
            let name = population.scenario.name();
            match &population.profile {
                InjectionProfile::OpenAtOnce { users } | InjectionProfile::OpenRamp { users, .. } => {
                    if *users == 0 {
                        return Err(ConfigurationError::NoUsers(name.to_string()));
                    }
                }
                InjectionProfile::Closed {
                    concurrent_users,
                    duration,
                } => {
                    if *concurrent_users == 0 {
                        return Err(ConfigurationError::NoUsers(name.to_string()));
                    }
                    if duration.is_zero() {
                        return Err(ConfigurationError::ZeroDuration(name.to_string()));
                    }
                }
            }
            if population.protocol.base_url().is_empty() {
                return Err(ConfigurationError::EmptyBaseUrl(name.to_string()));
            }
            if population.scenario.chain().is_empty() {
                return Err(ConfigurationError::EmptyChain(name.to_string()));
            }
            population.scenario.chain().validate(name)?;
        }
        for assertion in &self.assertions {
            assertion.validate()?;
        }
        Ok(())
    }
}

fn finish(sink: MetricsSink, run_start: Instant, assertions: &[Assertion]) -> RunReport {
    let elapsed: Duration = run_start.elapsed();
    let aggregated = sink.aggregate();
    info!(
        "Run complete in {}: {}",
        humantime::format_duration(elapsed),
        aggregated.statistics
    );
    let report = aggregated.into_report(assertions);
    for assertion in &report.assertions {
        if assertion.passed {
            info!("{assertion}");
        } else {
            warn!("{assertion}");
        }
    }
    report
}
