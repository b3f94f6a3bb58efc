//! Chain execution for a single virtual user.
//!
//! Steps run strictly in order against the user's own session. A failed
//! request or check never unwinds the chain by itself; it records a failed
//! outcome, flags the session, and execution continues unless an
//! `exit_here_if_failed` marker (or an exhausted retry around one) cuts the
//! chain short. Only pauses, retry back-off and the HTTP round-trip suspend
//! the task.

use crate::chain::{Chain, RequestStep, Step};
use crate::client::{BoxFuture, HttpClient, HttpRequest};
use crate::metrics::MetricsSink;
use rand::Rng;
use stampede_core::{Protocol, RequestOutcome, RequestStatus, Session, SessionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, trace, warn};

pub(crate) struct ExecutionContext {
    pub client: Arc<dyn HttpClient>,
    pub protocol: Protocol,
    pub sink: MetricsSink,
    pub run_start: Instant,
}

/// Whether the remainder of the enclosing chain should still run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainControl {
    Continue,
    Exit,
}

pub(crate) fn execute_chain<'a>(
    steps: &'a [Step],
    ctx: &'a ExecutionContext,
    session: &'a mut Session,
) -> BoxFuture<'a, ChainControl> {
    Box::pin(async move {
        for step in steps {
            match step {
                Step::Request(request) => execute_request(request, ctx, session).await,
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
                Step::Feed(feeder) => match feeder.next() {
                    Ok(record) => record.apply_to(session),
                    Err(err) => {
                        warn!(user = session.user_id(), "{err}; aborting user");
                        session.mark_failed();
                        return ChainControl::Exit;
                    }
                },
                Step::Conditional {
                    predicate,
                    then_chain,
                    else_chain,
                } => {
                    let branch = if predicate(session) {
                        Some(then_chain)
                    } else {
                        else_chain.as_ref()
                    };
                    if let Some(chain) = branch {
                        if run_nested(chain, ctx, session).await == ChainControl::Exit {
                            return ChainControl::Exit;
                        }
                    }
                }
                Step::Loop { count, body } => {
                    for _ in 0..*count {
                        if run_nested(body, ctx, session).await == ChainControl::Exit {
                            return ChainControl::Exit;
                        }
                    }
                }
                Step::Retry {
                    max_attempts,
                    pause,
                    body,
                } => {
                    // An Exit raised inside the body is treated as "attempt
                    // failed, try again" until attempts run out, and only then
                    // propagated, which is what makes
                    // `try_max(n, .., exec(..).exit_here_if_failed())` retry
                    // before cutting the chain.
                    let mut exited = false;
                    for attempt in 1..=*max_attempts {
                        session.mark_succeeded();
                        exited = run_nested(body, ctx, session).await == ChainControl::Exit;
                        if !session.is_failed() {
                            break;
                        }
                        trace!(user = session.user_id(), attempt, "retry attempt failed");
                        if attempt < *max_attempts {
                            tokio::time::sleep(*pause).await;
                        }
                    }
                    if session.is_failed() && exited {
                        return ChainControl::Exit;
                    }
                }
                Step::WeightedBranch(branches) => {
                    let chain = pick_branch(branches, rand::thread_rng().gen::<f64>());
                    if run_nested(chain, ctx, session).await == ChainControl::Exit {
                        return ChainControl::Exit;
                    }
                }
                Step::ExitHereIfFailed => {
                    if session.is_failed() {
                        debug!(user = session.user_id(), "chain exited early after failure");
                        return ChainControl::Exit;
                    }
                }
            }
        }
        ChainControl::Continue
    })
}

async fn run_nested(chain: &Chain, ctx: &ExecutionContext, session: &mut Session) -> ChainControl {
    execute_chain(chain.steps(), ctx, session).await
}

/// Selects a branch by normalized weight; `roll` is uniform in [0, 1).
fn pick_branch(branches: &[(f64, Chain)], roll: f64) -> &Chain {
    let total: f64 = branches.iter().map(|(weight, _)| *weight).sum();
    let mut remaining = roll * total;
    for (weight, chain) in branches {
        remaining -= weight;
        if remaining < 0. {
            return chain;
        }
    }
    // Rounding can leave a sliver at the top end.
    &branches[branches.len() - 1].1
}

async fn execute_request(request: &RequestStep, ctx: &ExecutionContext, session: &mut Session) {
    let started = Instant::now();
    let (status, latency) = match render_request(request, &ctx.protocol, session) {
        Ok(http_request) => {
            trace!(step = request.name, url = http_request.url, "issuing request");
            match ctx.client.send(http_request).await {
                Ok(response) => {
                    let latency = response.latency;
                    (run_checks(request, &response, session), latency)
                }
                Err(err) => (
                    RequestStatus::TransportError(err.to_string()),
                    started.elapsed(),
                ),
            }
        }
        // Missing/mistyped session keys make the request itself unbuildable;
        // that is a failure of this step, not of the run.
        Err(err) => (
            RequestStatus::TransportError(format!("failed to render request: {err}")),
            Duration::ZERO,
        ),
    };

    if status.is_failure() {
        debug!(step = request.name, ?status, "request failed");
        session.mark_failed();
    }

    ctx.sink.record(RequestOutcome {
        scenario: session.scenario().to_string(),
        step: request.name.clone(),
        status,
        latency,
        offset: ctx.run_start.elapsed(),
    });
}

fn render_request(
    request: &RequestStep,
    protocol: &Protocol,
    session: &Session,
) -> Result<HttpRequest, SessionError> {
    let path = request.url.render(session)?;
    let mut headers: Vec<(String, String)> = protocol.default_headers().to_vec();
    for (name, template) in &request.headers {
        headers.push((name.clone(), template.render(session)?));
    }
    let body = match &request.body {
        Some(template) => Some(template.render(session)?),
        None => None,
    };
    Ok(HttpRequest {
        method: request.method,
        url: protocol.url_for(&path),
        headers,
        body,
    })
}

/// Declaration-order evaluation; first failure short-circuits, but values
/// already extracted by earlier checks stay committed to the session.
fn run_checks(
    request: &RequestStep,
    response: &crate::client::HttpResponse,
    session: &mut Session,
) -> RequestStatus {
    for check in &request.checks {
        match check.evaluate(response) {
            Ok(Some(value)) => {
                if let Some(key) = check.save_key() {
                    session.set(key.to_string(), value);
                }
            }
            Ok(None) => {}
            Err(failure) => {
                debug!(step = request.name, %failure, "check failed");
                return RequestStatus::CheckFailed(response.status);
            }
        }
    }
    RequestStatus::Ok(response.status)
}
