//! # Flock
//!
//! Flock describes HTTP load tests as plain, immutable Rust values.
//!
//! A load test, called a workload, is built leaves-first:
//!
//! - An [`HttpRequest`](./action/struct.HttpRequest.html) names one request and the
//!   [`Check`](./check/enum.Check.html)s its response must pass.
//! - A [`Scenario`](./scenario/struct.Scenario.html) is the ordered list of actions a
//!   single virtual user performs.
//! - An [`InjectionProfile`](./injection/enum.InjectionProfile.html) decides how many
//!   virtual users run a scenario, and when they are launched.
//! - A [`Workload`](./workload/struct.Workload.html) is the closed set of scenarios and
//!   their injection profiles, frozen by
//!   [`Registry::set_up`](./workload/struct.Registry.html#method.set_up).
//!
//! The frozen workload can be serialized and handed to any runner. Flock also ships a
//! small reference [`Runner`](./runner/struct.Runner.html) which launches the virtual
//! users with [`tokio`](https://docs.rs/tokio/) and sends requests with
//! [`reqwest`](https://docs.rs/reqwest/).
//!
//! ## Describing a workload
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
//!     let workload = registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])?;
//!
//!     assert_eq!(workload.total_users(), 1);
//!     assert_eq!(registry.state(), &WorkloadState::Frozen);
//!
//!     Ok(())
//! }
//! ```
//!
//! Every builder validates its input immediately, returning a
//! [`FlockError`](./enum.FlockError.html) that names the offending call. A workload can
//! only be set up once per [`Registry`](./workload/struct.Registry.html).
//!
//! ## Running a workload
//!
//! Implement [`Simulation`](./workload/trait.Simulation.html) and hand it to the runner:
//!
//! ```rust,no_run
//! use flock::prelude::*;
//!
//! struct BasicSimulation;
//!
//! impl Simulation for BasicSimulation {
//!     fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
//!         let scn = scenario("Basic Example")?
//!             .exec(http("Get index")?.get("http://localhost:8080/")?.check(status().is(200)?));
//!         registry.set_up(vec![scn.inject_open(vec![at_once_users(10)?])?])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FlockError> {
//!     let metrics = Runner::initialize()?
//!         .execute_simulation(&BasicSimulation)
//!         .await?;
//!
//!     if metrics.check_failures() > 0 {
//!         std::process::exit(1);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Pass `-h` to the compiled load test to see all run-time options.
//!
//! ## License
//!
//! Copyright 2020-2026 Jeremy Andrews
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod action;
pub mod check;
pub mod config;
pub mod injection;
mod logger;
pub mod metrics;
pub mod prelude;
pub mod runner;
pub mod scenario;
mod user;
pub mod util;
pub mod workload;

use lazy_static::lazy_static;
use std::sync::RwLock;
use std::{fmt, io};

pub use crate::config::RunnerConfiguration;

lazy_static! {
    /// Set when the run is canceled by ctrl-c.
    static ref CANCELED: RwLock<bool> = RwLock::new(false);
}

/// An enumeration of all errors Flock can return.
///
/// The first four variants are configuration errors raised while a workload is being
/// described. They are always fatal to the workload being built and are never retried.
#[derive(Debug)]
pub enum FlockError {
    /// A builder was called with an invalid value.
    InvalidArgument {
        /// The builder call that failed, for example `status().is()`.
        call: String,
        /// The rejected value.
        value: String,
        /// An explanation of the error.
        detail: String,
    },
    /// A request target is not an absolute `http` or `https` URL.
    InvalidUrl {
        /// The builder call that failed, for example `get()`.
        call: String,
        /// The rejected URL.
        url: String,
        /// An explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html), if
        /// the URL failed to parse at all.
        parse_error: Option<url::ParseError>,
    },
    /// [`Registry::set_up`](./workload/struct.Registry.html#method.set_up) was invoked
    /// more than once.
    AlreadyConfigured {
        /// An explanation of the error.
        detail: String,
    },
    /// The workload was changed after it was frozen by `set_up`.
    Frozen {
        /// The builder call that failed.
        call: String,
    },
    /// Invalid runner option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An explanation of the error.
        detail: String,
    },
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a [`tokio::task::JoinError`](https://docs.rs/tokio/*/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
}
/// Implement a helper to provide a text description of all possible types of errors.
impl FlockError {
    fn describe(&self) -> &str {
        match *self {
            FlockError::InvalidArgument { .. } => "invalid argument",
            FlockError::InvalidUrl { .. } => "invalid url",
            FlockError::AlreadyConfigured { .. } => "workload already configured",
            FlockError::Frozen { .. } => "workload is frozen",
            FlockError::InvalidOption { .. } => "invalid option or value specified",
            FlockError::Io(_) => "io::Error",
            FlockError::Reqwest(_) => "reqwest::Error",
            FlockError::TokioJoin(_) => "tokio::task::JoinError",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for FlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FlockError::InvalidArgument {
                ref call,
                ref value,
                ref detail,
            } => write!(
                f,
                "FlockError: {} in {} ({:?}): {}",
                self.describe(),
                call,
                value,
                detail
            ),
            FlockError::InvalidUrl {
                ref call,
                ref url,
                ref detail,
                ..
            } => write!(
                f,
                "FlockError: {} in {} ({:?}): {}",
                self.describe(),
                call,
                url,
                detail
            ),
            FlockError::AlreadyConfigured { ref detail } => {
                write!(f, "FlockError: {}: {}", self.describe(), detail)
            }
            FlockError::Frozen { ref call } => {
                write!(f, "FlockError: {}, {} not allowed", self.describe(), call)
            }
            FlockError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "FlockError: {} {} ({:?}): {}",
                self.describe(),
                option,
                value,
                detail
            ),
            FlockError::Io(ref source) => write!(f, "FlockError: {} ({})", self.describe(), source),
            FlockError::Reqwest(ref source) => {
                write!(f, "FlockError: {} ({})", self.describe(), source)
            }
            FlockError::TokioJoin(ref source) => {
                write!(f, "FlockError: {} ({})", self.describe(), source)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for FlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            FlockError::Io(ref source) => Some(source),
            FlockError::Reqwest(ref source) => Some(source),
            FlockError::TokioJoin(ref source) => Some(source),
            FlockError::InvalidUrl {
                parse_error: Some(ref parse_error),
                ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for FlockError {
    fn from(err: reqwest::Error) -> FlockError {
        FlockError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for FlockError {
    fn from(err: io::Error) -> FlockError {
        FlockError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for FlockError {
    fn from(err: tokio::task::JoinError) -> FlockError {
        FlockError::TokioJoin(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_call() {
        let error = FlockError::InvalidArgument {
            call: "scenario()".to_string(),
            value: "".to_string(),
            detail: "a scenario name can not be empty".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "FlockError: invalid argument in scenario() (\"\"): a scenario name can not be empty"
        );

        let error = FlockError::Frozen {
            call: "register()".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "FlockError: workload is frozen, register() not allowed"
        );
    }

    #[test]
    fn error_source() {
        use std::error::Error;

        let parse_error = url::Url::parse("not a url").unwrap_err();
        let error = FlockError::InvalidUrl {
            call: "get()".to_string(),
            url: "not a url".to_string(),
            detail: "failed to parse url".to_string(),
            parse_error: Some(parse_error),
        };
        assert!(error.source().is_some());

        let error = FlockError::AlreadyConfigured {
            detail: "set_up() was already invoked".to_string(),
        };
        assert!(error.source().is_none());
    }
}
