//! Scenario definitions.
//!
//! A scenario is a named chain plus its initial feeder bindings; binding an
//! injection profile and a protocol to it yields a [`Population`], the unit
//! the scheduler actually runs.

use crate::chain::{Chain, ChainBuilder};
use crate::feeder::Feeder;
use stampede_core::{InjectionProfile, Protocol, Session};
use std::sync::Arc;
use std::time::Duration;

/// Starts a scenario definition: `scenario("Full CRUD").feed(..).exec(..)`.
pub fn scenario(name: impl Into<String>) -> ScenarioBuilder {
    ScenarioBuilder {
        name: name.into(),
        chain: ChainBuilder::new(),
    }
}

/// Builder mirroring [`ChainBuilder`]'s combinators, carrying a name.
pub struct ScenarioBuilder {
    name: String,
    chain: ChainBuilder,
}

impl ScenarioBuilder {
    pub fn feed(self, feeder: Feeder) -> Self {
        self.map(|chain| chain.feed(feeder))
    }

    pub fn exec(self, next: impl Into<ChainBuilder>) -> Self {
        self.map(|chain| chain.exec(next))
    }

    pub fn pause(self, duration: Duration) -> Self {
        self.map(|chain| chain.pause(duration))
    }

    pub fn do_if<P>(self, predicate: P, then: impl Into<ChainBuilder>) -> Self
    where
        P: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.map(|chain| chain.do_if(predicate, then))
    }

    pub fn do_if_else<P>(
        self,
        predicate: P,
        then: impl Into<ChainBuilder>,
        otherwise: impl Into<ChainBuilder>,
    ) -> Self
    where
        P: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.map(|chain| chain.do_if_else(predicate, then, otherwise))
    }

    pub fn repeat(self, count: usize, body: impl Into<ChainBuilder>) -> Self {
        self.map(|chain| chain.repeat(count, body))
    }

    pub fn try_max(
        self,
        max_attempts: usize,
        pause: Duration,
        body: impl Into<ChainBuilder>,
    ) -> Self {
        self.map(|chain| chain.try_max(max_attempts, pause, body))
    }

    pub fn random_switch(self, branches: impl IntoIterator<Item = (f64, ChainBuilder)>) -> Self {
        self.map(|chain| chain.random_switch(branches))
    }

    pub fn exit_here_if_failed(self) -> Self {
        self.map(|chain| chain.exit_here_if_failed())
    }

    fn map(mut self, f: impl FnOnce(ChainBuilder) -> ChainBuilder) -> Self {
        self.chain = f(self.chain);
        self
    }

    pub fn build(self) -> Scenario {
        Scenario {
            name: self.name.into(),
            chain: self.chain.build(),
        }
    }

    /// Binds an injection profile, producing a population once a protocol is
    /// attached. Feeder mode and injection model are orthogonal; neither
    /// implies the other.
    pub fn inject(self, profile: InjectionProfile) -> PopulationBuilder {
        self.build().inject(profile)
    }
}

/// An immutable virtual-user journey template. Cheap to clone; the chain is
/// shared, never copied per user.
#[derive(Clone)]
pub struct Scenario {
    name: Arc<str>,
    chain: Chain,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn inject(self, profile: InjectionProfile) -> PopulationBuilder {
        PopulationBuilder {
            scenario: self,
            profile,
        }
    }
}

pub struct PopulationBuilder {
    scenario: Scenario,
    profile: InjectionProfile,
}

impl PopulationBuilder {
    pub fn protocols(self, protocol: Protocol) -> Population {
        Population {
            scenario: self.scenario,
            profile: self.profile,
            protocol,
        }
    }
}

/// One scenario bound to one injection profile and one protocol.
pub struct Population {
    pub(crate) scenario: Scenario,
    pub(crate) profile: InjectionProfile,
    pub(crate) protocol: Protocol,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{exec, http};

    #[test]
    fn builder_produces_named_population() {
        let population = scenario("Full CRUD")
            .exec(http("[GET] All Posts").get("/posts"))
            .pause(Duration::from_secs(1))
            .inject(InjectionProfile::at_once_users(3))
            .protocols(Protocol::new("https://jsonplaceholder.typicode.com"));

        assert_eq!(population.scenario.name(), "Full CRUD");
        assert_eq!(population.scenario.chain().steps().len(), 2);
        assert_eq!(population.profile, InjectionProfile::at_once_users(3));
    }

    #[test]
    fn built_scenario_is_shareable() {
        let built = scenario("shared").exec(exec(http("r").get("/"))).build();
        let a = built.clone().inject(InjectionProfile::at_once_users(1));
        let b = built.inject(InjectionProfile::at_once_users(2));
        drop((a, b));
    }
}
