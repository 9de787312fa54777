//! Scenarios: the ordered actions performed by one virtual user.
//!
//! A [`ScenarioBuilder`] is created by passing a non-empty name to [`scenario`]. Actions
//! are appended with [`exec`](struct.ScenarioBuilder.html#method.exec), and every virtual
//! user running the scenario performs them one time, in the order they were appended.
//!
//! ```rust
//! use flock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let scn = scenario("Browse")?
//!         .exec(http("Home")?.get("http://localhost/")?.check(status().is(200)?))
//!         .exec(http("About")?.get("http://localhost/about")?);
//!
//!     let labels: Vec<&str> = scn.actions().iter().map(|a| a.label()).collect();
//!     assert_eq!(labels, vec!["Home", "About"]);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Injecting users
//!
//! A scenario does nothing until users are injected into it with
//! [`inject_open`](struct.ScenarioBuilder.html#method.inject_open). The resulting
//! [`ScenarioWithInjection`] is registered into a
//! [`Registry`](../workload/struct.Registry.html).

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::injection::{self, InjectionProfile};
use crate::FlockError;

/// Begins describing a scenario named `name`. The name can not be empty.
pub fn scenario(name: &str) -> Result<ScenarioBuilder, FlockError> {
    trace!("scenario({:?})", name);
    if name.is_empty() {
        return Err(FlockError::InvalidArgument {
            call: "scenario()".to_string(),
            value: name.to_string(),
            detail: "a scenario name can not be empty".to_string(),
        });
    }
    Ok(ScenarioBuilder {
        name: name.to_string(),
        actions: Vec::new(),
    })
}

/// Accumulates actions into a named sequence, returned by [`scenario`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioBuilder {
    name: String,
    actions: Vec<Action>,
}
impl ScenarioBuilder {
    /// Appends an action. Actions run in the order they are appended.
    pub fn exec<A>(mut self, action: A) -> Self
    where
        A: Into<Action>,
    {
        let action = action.into();
        trace!("{} exec: {}", self.name, action.label());
        self.actions.push(action);
        self
    }

    /// The name of the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All actions appended so far, in order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Completes the scenario.
    ///
    /// Returns [`FlockError::InvalidArgument`](../enum.FlockError.html#variant.InvalidArgument)
    /// if no action was appended.
    pub fn build(self) -> Result<Scenario, FlockError> {
        if self.actions.is_empty() {
            return Err(FlockError::InvalidArgument {
                call: "exec()".to_string(),
                value: self.name,
                detail: "a scenario requires at least one action".to_string(),
            });
        }
        Ok(Scenario {
            name: self.name,
            actions: self.actions,
        })
    }

    /// Completes the scenario and attaches one or more injection steps. The steps run
    /// one after the other, in the order given.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use flock::prelude::*;
    ///
    /// fn main() -> Result<(), FlockError> {
    ///     let population = scenario("Example")?
    ///         .exec(http("Home")?.get("http://localhost/")?)
    ///         .inject_open(vec![
    ///             at_once_users(1)?,
    ///             nothing_for(Duration::from_secs(5)),
    ///             ramp_users(10)?.during(Duration::from_secs(10))?,
    ///         ])?;
    ///
    ///     assert_eq!(population.total_users(), 11);
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn inject_open<I>(self, profiles: I) -> Result<ScenarioWithInjection, FlockError>
    where
        I: IntoIterator<Item = InjectionProfile>,
    {
        let injection: Vec<InjectionProfile> = profiles.into_iter().collect();
        trace!("{} inject_open: {:?}", self.name, injection);
        if injection.is_empty() {
            return Err(FlockError::InvalidArgument {
                call: "inject_open()".to_string(),
                value: self.name,
                detail: "at least one injection profile is required".to_string(),
            });
        }
        injection::validate_steps("inject_open()", &injection)?;
        Ok(ScenarioWithInjection {
            scenario: self.build()?,
            injection,
        })
    }
}

/// A complete, immutable scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    name: String,
    actions: Vec<Action>,
}
impl Scenario {
    /// The name of the scenario, unique within a workload.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actions every virtual user performs, in order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// A scenario together with the steps injecting its users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioWithInjection {
    scenario: Scenario,
    injection: Vec<InjectionProfile>,
}
impl ScenarioWithInjection {
    /// The injected scenario.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The injection steps, in the order they run.
    pub fn injection(&self) -> &[InjectionProfile] {
        &self.injection
    }

    /// The total number of users launched by all injection steps.
    pub fn total_users(&self) -> usize {
        self.injection.iter().map(|p| p.users()).sum()
    }

    /// Launch offsets of every user, see [`injection::schedule`].
    pub fn schedule(&self) -> Vec<std::time::Duration> {
        injection::schedule(&self.injection)
    }
}
