pub use crate::action::{http, Action, HttpMethod, HttpRequest};
pub use crate::check::{status, Check, CheckFailure};
pub use crate::config::{RunnerConfiguration, RunnerDefault, RunnerDefaultType};
pub use crate::injection::{at_once_users, nothing_for, ramp_users, InjectionProfile};
pub use crate::metrics::{RequestKey, RequestMetric, RunMetrics};
pub use crate::runner::Runner;
pub use crate::scenario::{scenario, Scenario, ScenarioBuilder, ScenarioWithInjection};
pub use crate::workload::{Registry, Simulation, WorkloadHandle, WorkloadState};
pub use crate::FlockError;
