//! Workloads: the closed set of scenarios and injection profiles for one run.
//!
//! Scenarios with their injection profiles are registered into an explicit
//! [`Registry`]. Calling [`Registry::set_up`] freezes the workload and returns a
//! [`WorkloadHandle`] that a runner consumes.
//!
//! A registry moves through the following states:
//!
//! - [`WorkloadState::Empty`]: nothing registered yet.
//! - [`WorkloadState::Configuring`]: at least one scenario was registered with
//!   [`Registry::register`].
//! - [`WorkloadState::Frozen`]: `set_up` succeeded. This state is terminal, any
//!   further change fails.
//!
//! ```rust
//! use flock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let scn = scenario("Basic Example")?.exec(
//!         http("Get README.md")?
//!             .get("https://raw.githubusercontent.com/steadybit/extension-gatling/refs/heads/main/README.md")?
//!             .check(status().is(200)?),
//!     );
//!
//!     let mut registry = Registry::new();
//!     let _workload = registry.set_up(vec![scn.clone().inject_open(vec![at_once_users(1)?])?])?;
//!
//!     // A workload can only be set up once.
//!     assert!(registry
//!         .set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
//!         .is_err());
//!
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::injection;
use crate::scenario::{Scenario, ScenarioWithInjection};
use crate::FlockError;

/// The lifecycle of a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadState {
    /// No scenario has been registered.
    Empty,
    /// One or more scenarios were registered, `set_up` has not been called.
    Configuring,
    /// `set_up` succeeded, the workload can no longer change.
    Frozen,
}

/// An immutable workload: every scenario with its injection profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    populations: Vec<ScenarioWithInjection>,
}
impl Workload {
    /// All scenarios with their injection profiles, in registration order.
    pub fn populations(&self) -> &[ScenarioWithInjection] {
        &self.populations
    }

    /// Find a scenario by name.
    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.populations
            .iter()
            .map(|p| p.scenario())
            .find(|s| s.name() == name)
    }

    /// The total number of users launched by all scenarios.
    pub fn total_users(&self) -> usize {
        self.populations.iter().map(|p| p.total_users()).sum()
    }
}

/// An opaque handle to a frozen workload, returned by [`Registry::set_up`].
///
/// The handle is cheap to clone and can be shared with a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadHandle {
    workload: Arc<Workload>,
}
impl WorkloadHandle {
    /// The frozen workload.
    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    /// The total number of users launched by the workload.
    pub fn total_users(&self) -> usize {
        self.workload.total_users()
    }

    /// Serialize the workload so it can be handed to another runner.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self.workload.as_ref())
    }

    /// Rebuild a frozen workload from [`to_json`](#method.to_json) output.
    ///
    /// The decoded workload is held to every rule the builders enforce: labels, URLs,
    /// status codes, user counts, ramp durations, the total injection time, and unique
    /// scenario names.
    pub fn from_json(json: &str) -> Result<WorkloadHandle, FlockError> {
        let workload: Workload =
            serde_json::from_str(json).map_err(|e| FlockError::InvalidArgument {
                call: "WorkloadHandle::from_json()".to_string(),
                value: crate::util::truncate_string(json, 64),
                detail: format!("failed to decode workload: {}", e),
            })?;
        validate("WorkloadHandle::from_json()", &workload.populations)?;
        Ok(WorkloadHandle {
            workload: Arc::new(workload),
        })
    }
}

/// Collects scenarios into a workload, and freezes it with [`set_up`](#method.set_up).
///
/// A registry is owned by whoever runs the workload, usually the
/// [`Runner`](../runner/struct.Runner.html), and passed to the
/// [`Simulation`] describing it.
///
/// A registry also carries the `KEY=VALUE` parameters passed to the runner with
/// `--parameter`, so a simulation can be pointed at a different target without being
/// rebuilt.
#[derive(Debug)]
pub struct Registry {
    state: WorkloadState,
    populations: Vec<ScenarioWithInjection>,
    parameters: BTreeMap<String, String>,
}
impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::with_parameters(BTreeMap::new())
    }

    /// Create an empty registry carrying simulation parameters.
    ///
    /// # Example
    /// ```rust
    /// use std::collections::BTreeMap;
    ///
    /// use flock::prelude::*;
    ///
    /// let mut parameters = BTreeMap::new();
    /// parameters.insert("base_url".to_string(), "http://localhost:8080".to_string());
    ///
    /// let registry = Registry::with_parameters(parameters);
    /// assert_eq!(registry.parameter("base_url"), Some("http://localhost:8080"));
    /// assert_eq!(registry.parameter("users"), None);
    /// ```
    pub fn with_parameters(parameters: BTreeMap<String, String>) -> Self {
        Registry {
            state: WorkloadState::Empty,
            populations: Vec::new(),
            parameters,
        }
    }

    /// The value of simulation parameter `key`, if it was passed.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// All simulation parameters, sorted by key.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &WorkloadState {
        &self.state
    }

    /// Register one scenario ahead of [`set_up`](#method.set_up).
    ///
    /// Returns [`FlockError::Frozen`](../enum.FlockError.html#variant.Frozen) once the
    /// workload has been set up.
    pub fn register(&mut self, population: ScenarioWithInjection) -> Result<(), FlockError> {
        trace!("register: {}", population.scenario().name());
        if self.state == WorkloadState::Frozen {
            return Err(FlockError::Frozen {
                call: "register()".to_string(),
            });
        }
        self.populations.push(population);
        self.state = WorkloadState::Configuring;
        Ok(())
    }

    /// Add `populations` to anything already registered, and freeze the workload.
    ///
    /// Fails with [`FlockError::AlreadyConfigured`](../enum.FlockError.html#variant.AlreadyConfigured)
    /// if called a second time, and with
    /// [`FlockError::InvalidArgument`](../enum.FlockError.html#variant.InvalidArgument) if
    /// the workload would be empty or two scenarios share a name. A failed call leaves
    /// the registry unchanged.
    pub fn set_up<I>(&mut self, populations: I) -> Result<WorkloadHandle, FlockError>
    where
        I: IntoIterator<Item = ScenarioWithInjection>,
    {
        if self.state == WorkloadState::Frozen {
            return Err(FlockError::AlreadyConfigured {
                detail: "set_up() can only be invoked one time".to_string(),
            });
        }

        let mut all = self.populations.clone();
        all.extend(populations);
        validate("set_up()", &all)?;

        self.populations.clear();
        self.state = WorkloadState::Frozen;

        let workload = Workload { populations: all };
        info!(
            "workload set up: {} scenario(s), {} user(s)",
            workload.populations.len(),
            workload.total_users()
        );
        Ok(WorkloadHandle {
            workload: Arc::new(workload),
        })
    }
}

fn validate(call: &str, populations: &[ScenarioWithInjection]) -> Result<(), FlockError> {
    if populations.is_empty() {
        return Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: "[]".to_string(),
            detail: "a workload requires at least one scenario".to_string(),
        });
    }

    let mut names = HashSet::new();
    for population in populations {
        let name = population.scenario().name();
        // Builders already guarantee these, decoded workloads may not.
        if name.is_empty()
            || population.scenario().actions().is_empty()
            || population.injection().is_empty()
        {
            return Err(FlockError::InvalidArgument {
                call: call.to_string(),
                value: name.to_string(),
                detail: "a scenario requires a name, an action and an injection profile"
                    .to_string(),
            });
        }
        if !names.insert(name) {
            return Err(FlockError::InvalidArgument {
                call: call.to_string(),
                value: name.to_string(),
                detail: "scenario names must be unique within a workload".to_string(),
            });
        }
        for action in population.scenario().actions() {
            action.validate(call)?;
        }
        for step in population.injection() {
            step.validate(call)?;
        }
        injection::validate_steps(call, population.injection())?;
    }
    Ok(())
}

/// A load test simulation: describes its workload when the runner sets it up.
///
/// # Example
/// ```rust
/// use flock::prelude::*;
///
/// struct BasicSimulation;
///
/// impl Simulation for BasicSimulation {
///     fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
///         let scn = scenario("Basic Example")?
///             .exec(http("Home")?.get("http://localhost/")?.check(status().is(200)?));
///         registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
///     }
/// }
///
/// let mut registry = Registry::new();
/// let workload = BasicSimulation.set_up(&mut registry).unwrap();
/// assert_eq!(workload.total_users(), 1);
/// ```
pub trait Simulation {
    /// Describe the workload, calling [`Registry::set_up`] exactly once.
    fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError>;
}
