//! Stampede is a scenario-driven HTTP load-generation engine.
//!
//! A load test is described declaratively: request chains with lazy
//! session-templated URLs, headers and bodies; checks that assert on
//! responses and extract values back into the session; feeders that supply
//! per-user data; and injection profiles that open or close virtual-user
//! populations over time. The engine schedules one lightweight task per
//! virtual user, records every request outcome into a lock-free sink, and
//! evaluates run-level assertions at the end.
//!
//! The HTTP transport is pluggable: anything implementing [`HttpClient`]
//! works, from a `reqwest` wrapper in production to a scripted stub in
//! tests.
//!
//! # Example
//!
//! ```no_run
//! use stampede::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn client() -> Arc<dyn HttpClient> { unimplemented!() }
//! # #[tokio::main]
//! # async fn main() -> Result<(), stampede::ConfigurationError> {
//! let feeder = Feeder::random(Feeder::records_from_json(&serde_json::json!([
//!     {"id": 1, "title": "a", "body": "b", "userId": 1},
//! ])).unwrap());
//!
//! let crud = scenario("Full CRUD")
//!     .feed(feeder)
//!     .exec(http("[GET] All Posts").get("/posts").check(Check::status_is(200)))
//!     .pause(Duration::from_secs(1))
//!     .exec(
//!         http("[POST] Create Post")
//!             .post("/posts")
//!             .body(r##"{"title": "#{title}", "body": "#{body}", "userId": #{userId}}"##)
//!             .check(Check::status_in([200, 201]))
//!             .check(Check::json_path("$.id").save_as("newPostId")),
//!     );
//!
//! let report = Simulation::new()
//!     .population(
//!         crud.inject(InjectionProfile::ramp_users(3, Duration::from_secs(10)))
//!             .protocols(Protocol::new("https://jsonplaceholder.typicode.com")),
//!     )
//!     .assertion(Assertion::MaxResponseTimeLt(Duration::from_millis(1500)))
//!     .assertion(Assertion::FailedRequestsPercentLt(5.))
//!     .run(client())
//!     .await?;
//!
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod chain;
pub mod check;
pub mod client;
pub mod feeder;
pub mod metrics;
pub mod scenario;
pub mod simulation;
pub mod template;

pub(crate) mod executor;
pub(crate) mod runner;

pub use chain::{exec, feed, http, Chain, ChainBuilder};
pub use check::{Check, CheckFailure};
pub use client::{BoxFuture, HttpClient, HttpRequest, HttpResponse, Method, TransportError};
pub use feeder::{Feeder, FeederError, FeederRecord};
pub use metrics::RunReport;
pub use scenario::{scenario, Population, Scenario, ScenarioBuilder};
pub use simulation::Simulation;
pub use template::Template;

pub use stampede_core::{
    Assertion, AssertionOutcome, ConfigurationError, InjectionProfile, Protocol, RequestOutcome,
    RequestStatus, RunStatistics, Session, SessionError, UserTally, Value,
};

pub mod prelude {
    pub use crate::chain::{exec, feed, http, ChainBuilder};
    pub use crate::check::Check;
    pub use crate::client::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};
    pub use crate::feeder::{Feeder, FeederRecord};
    pub use crate::metrics::RunReport;
    pub use crate::scenario::scenario;
    pub use crate::simulation::Simulation;
    pub use crate::template::Template;
    pub use stampede_core::{
        Assertion, InjectionProfile, Protocol, RequestStatus, Session, Value,
    };
}
