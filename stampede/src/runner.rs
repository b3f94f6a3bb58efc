//! The scheduler: turns injection profiles into running virtual-user tasks.
//!
//! Every virtual user is one tokio task. Open profiles precompute start
//! offsets and sleep until theirs comes up; the closed profile keeps a fixed
//! number of tasks alive and replaces each one as it finishes until the
//! window closes, then drains. Populations run concurrently and share only
//! the metrics sink. Cancellation rides on `JoinSet`'s abort-on-drop: when
//! the caller drops the run future, every in-flight user task is aborted and
//! everything already recorded stays recorded.

use crate::executor::{execute_chain, ExecutionContext};
use crate::metrics::MetricsSink;
use crate::scenario::Population;
use crate::HttpClient;
use stampede_core::{InjectionProfile, Session};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, info, instrument, trace, warn};

pub(crate) async fn run_populations(
    populations: Vec<Population>,
    client: Arc<dyn HttpClient>,
    sink: MetricsSink,
    run_start: Instant,
) {
    let mut drivers = JoinSet::new();
    for population in populations {
        let ctx = Arc::new(ExecutionContext {
            client: client.clone(),
            protocol: population.protocol.clone(),
            sink: sink.clone(),
            run_start,
        });
        drivers.spawn(run_population(population, ctx));
    }
    while let Some(result) = drivers.join_next().await {
        if let Err(err) = result {
            if err.is_panic() {
                warn!("population driver panicked: {err}");
            }
        }
    }
}

#[instrument(name = "population", skip_all, fields(scenario = %population.scenario.name()))]
async fn run_population(population: Population, ctx: Arc<ExecutionContext>) {
    info!(
        "Running {} with profile {:?}",
        population.scenario.name(),
        population.profile
    );

    let mut users = JoinSet::new();
    match &population.profile {
        InjectionProfile::OpenAtOnce { .. } | InjectionProfile::OpenRamp { .. } => {
            // Validation guarantees open profiles have a schedule.
            let offsets = population.profile.start_offsets().unwrap_or_default();
            let start = Instant::now();
            for (user_id, offset) in offsets.into_iter().enumerate() {
                let ctx = ctx.clone();
                let scenario = population.scenario.clone();
                let wake_at = start + offset;
                users.spawn(async move {
                    tokio::time::sleep_until(wake_at).await;
                    run_user(user_id as u64, scenario, ctx).await;
                });
            }
            drain(&mut users).await;
        }
        InjectionProfile::Closed {
            concurrent_users,
            duration,
        } => {
            let deadline = Instant::now() + *duration;
            let mut next_user_id = 0u64;
            let mut spawn_user = |users: &mut JoinSet<()>| {
                let ctx = ctx.clone();
                let scenario = population.scenario.clone();
                let user_id = next_user_id;
                next_user_id += 1;
                users.spawn(async move {
                    run_user(user_id, scenario, ctx).await;
                });
            };

            for _ in 0..*concurrent_users {
                spawn_user(&mut users);
            }
            while let Some(result) = users.join_next().await {
                log_join_error(result);
                if Instant::now() < deadline {
                    spawn_user(&mut users);
                }
            }
        }
    }

    debug!("population drained");
}

async fn drain(users: &mut JoinSet<()>) {
    while let Some(result) = users.join_next().await {
        log_join_error(result);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            warn!("virtual user panicked: {err}");
        }
    }
}

async fn run_user(user_id: u64, scenario: crate::scenario::Scenario, ctx: Arc<ExecutionContext>) {
    ctx.sink.user_started();
    trace!(user_id, "virtual user started");

    let mut session = Session::new(user_id, scenario.name());
    let _control = execute_chain(scenario.chain().steps(), ctx.as_ref(), &mut session).await;

    if session.is_failed() {
        trace!(user_id, "virtual user failed");
        ctx.sink.user_failed();
    } else {
        trace!(user_id, "virtual user completed");
        ctx.sink.user_completed();
    }
}
