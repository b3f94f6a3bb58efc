//! Steps and chains.
//!
//! A [`Chain`] is an immutable, ordered sequence of [`Step`]s assembled by a
//! [`ChainBuilder`]. Builders compose: conditionals, loops, retries and
//! weighted branches all nest whole chains. Once built, a chain is a plain
//! data structure that any number of scenarios (and virtual users) can share.

use crate::check::Check;
use crate::client::Method;
use crate::feeder::Feeder;
use crate::template::Template;
use stampede_core::{ConfigurationError, Session};
use std::sync::Arc;
use std::time::Duration;

pub type Predicate = Arc<dyn Fn(&Session) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Step {
    Request(RequestStep),
    Pause(Duration),
    Feed(Feeder),
    Conditional {
        predicate: Predicate,
        then_chain: Chain,
        else_chain: Option<Chain>,
    },
    Loop {
        count: usize,
        body: Chain,
    },
    Retry {
        max_attempts: usize,
        pause: Duration,
        body: Chain,
    },
    WeightedBranch(Vec<(f64, Chain)>),
    ExitHereIfFailed,
}

#[derive(Clone)]
pub(crate) struct RequestStep {
    pub name: String,
    pub method: Method,
    pub url: Template,
    pub headers: Vec<(String, Template)>,
    pub body: Option<Template>,
    pub checks: Vec<Check>,
}

/// Starts a named request definition: `http("[GET] All Posts").get("/posts")`.
pub fn http(name: impl Into<String>) -> RequestNamer {
    RequestNamer { name: name.into() }
}

pub struct RequestNamer {
    name: String,
}

impl RequestNamer {
    pub fn get(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Get, url)
    }

    pub fn post(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Post, url)
    }

    pub fn put(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Put, url)
    }

    pub fn delete(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Delete, url)
    }

    pub fn patch(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Patch, url)
    }

    pub fn head(self, url: impl Into<Template>) -> RequestBuilder {
        self.method(Method::Head, url)
    }

    fn method(self, method: Method, url: impl Into<Template>) -> RequestBuilder {
        RequestBuilder {
            step: RequestStep {
                name: self.name,
                method,
                url: url.into(),
                headers: Vec::new(),
                body: None,
                checks: Vec::new(),
            },
        }
    }
}

pub struct RequestBuilder {
    step: RequestStep,
}

impl RequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Template>) -> Self {
        self.step.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Template>) -> Self {
        self.step.body = Some(body.into());
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.step.checks.push(check);
        self
    }
}

/// Entry point mirroring the scenario DSL: `exec(http("x").get("/"))`.
pub fn exec(request: impl Into<ChainBuilder>) -> ChainBuilder {
    request.into()
}

/// Standalone feed block, for feeding inside loops:
/// `repeat(3, feed(feeder).exec(...))`.
pub fn feed(feeder: Feeder) -> ChainBuilder {
    ChainBuilder::new().feed(feeder)
}

#[derive(Default)]
pub struct ChainBuilder {
    steps: Vec<Step>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request, another builder, or a previously built chain.
    pub fn exec(mut self, next: impl Into<ChainBuilder>) -> Self {
        self.steps.extend(next.into().steps);
        self
    }

    /// Suspends the virtual user for `duration` without blocking others.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Draws one record from `feeder` and merges it into the session.
    pub fn feed(mut self, feeder: Feeder) -> Self {
        self.steps.push(Step::Feed(feeder));
        self
    }

    /// Executes `then` only when the predicate holds for the session.
    pub fn do_if<P>(self, predicate: P, then: impl Into<ChainBuilder>) -> Self
    where
        P: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.conditional(Arc::new(predicate), then.into().build(), None)
    }

    /// Executes exactly one of `then`/`otherwise` depending on the predicate.
    pub fn do_if_else<P>(
        self,
        predicate: P,
        then: impl Into<ChainBuilder>,
        otherwise: impl Into<ChainBuilder>,
    ) -> Self
    where
        P: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.conditional(
            Arc::new(predicate),
            then.into().build(),
            Some(otherwise.into().build()),
        )
    }

    fn conditional(
        mut self,
        predicate: Predicate,
        then_chain: Chain,
        else_chain: Option<Chain>,
    ) -> Self {
        self.steps.push(Step::Conditional {
            predicate,
            then_chain,
            else_chain,
        });
        self
    }

    /// Executes `body` exactly `count` times, carrying the session across
    /// iterations.
    pub fn repeat(mut self, count: usize, body: impl Into<ChainBuilder>) -> Self {
        self.steps.push(Step::Loop {
            count,
            body: body.into().build(),
        });
        self
    }

    /// Executes `body` up to `max_attempts` times total, pausing `pause`
    /// between attempts, until an attempt finishes without failing.
    pub fn try_max(
        mut self,
        max_attempts: usize,
        pause: Duration,
        body: impl Into<ChainBuilder>,
    ) -> Self {
        self.steps.push(Step::Retry {
            max_attempts,
            pause,
            body: body.into().build(),
        });
        self
    }

    /// Executes exactly one branch per pass, selected by weight. Weights are
    /// normalized before selection and need not sum to 100.
    pub fn random_switch(
        mut self,
        branches: impl IntoIterator<Item = (f64, ChainBuilder)>,
    ) -> Self {
        self.steps.push(Step::WeightedBranch(
            branches
                .into_iter()
                .map(|(weight, builder)| (weight, builder.build()))
                .collect(),
        ));
        self
    }

    /// Aborts the remaining chain if the session is in a failed state when
    /// execution reaches this marker.
    pub fn exit_here_if_failed(mut self) -> Self {
        self.steps.push(Step::ExitHereIfFailed);
        self
    }

    pub fn build(self) -> Chain {
        Chain {
            steps: self.steps.into(),
        }
    }
}

impl From<RequestBuilder> for ChainBuilder {
    fn from(request: RequestBuilder) -> Self {
        ChainBuilder {
            steps: vec![Step::Request(request.step)],
        }
    }
}

impl From<Chain> for ChainBuilder {
    fn from(chain: Chain) -> Self {
        ChainBuilder {
            steps: chain.steps.to_vec(),
        }
    }
}

impl From<&Chain> for ChainBuilder {
    fn from(chain: &Chain) -> Self {
        chain.clone().into()
    }
}

#[derive(Clone)]
pub struct Chain {
    steps: Arc<[Step]>,
}

impl Chain {
    pub(crate) fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Structural validation run once at simulation setup, before any user
    /// starts.
    pub(crate) fn validate(&self, scenario: &str) -> Result<(), ConfigurationError> {
        for step in self.steps.iter() {
            match step {
                Step::Conditional {
                    then_chain,
                    else_chain,
                    ..
                } => {
                    then_chain.validate(scenario)?;
                    if let Some(chain) = else_chain {
                        chain.validate(scenario)?;
                    }
                }
                Step::Loop { count, body } => {
                    if *count == 0 {
                        return Err(ConfigurationError::ZeroCount(scenario.to_string()));
                    }
                    body.validate(scenario)?;
                }
                Step::Retry {
                    max_attempts, body, ..
                } => {
                    if *max_attempts == 0 {
                        return Err(ConfigurationError::ZeroCount(scenario.to_string()));
                    }
                    body.validate(scenario)?;
                }
                Step::WeightedBranch(branches) => {
                    let total: f64 = branches.iter().map(|(w, _)| *w).sum();
                    if branches.is_empty()
                        || total <= 0.
                        || branches.iter().any(|(w, _)| *w < 0.)
                    {
                        return Err(ConfigurationError::InvalidWeights(scenario.to_string()));
                    }
                    for (_, chain) in branches {
                        chain.validate(scenario)?;
                    }
                }
                Step::Request(_) | Step::Pause(_) | Step::Feed(_) | Step::ExitHereIfFailed => {}
            }
        }
        Ok(())
    }
}
