//! Injection profiles: rules that produce virtual users over time.
//!
//! A scenario is injected with one or more steps. Steps run one after the other, each
//! starting where the previous one ended:
//!
//! - [`at_once_users`] launches all of its users at the start of the step, and takes
//!   no time.
//! - [`nothing_for`] launches nobody for a while.
//! - [`ramp_users`] launches its users evenly spread over a duration.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use flock::injection::schedule;
//! use flock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let steps = vec![
//!         at_once_users(2)?,
//!         nothing_for(Duration::from_secs(10)),
//!         ramp_users(2)?.during(Duration::from_secs(4))?,
//!     ];
//!
//!     assert_eq!(
//!         schedule(&steps),
//!         vec![
//!             Duration::from_secs(0),
//!             Duration::from_secs(0),
//!             Duration::from_secs(10),
//!             Duration::from_secs(12),
//!         ]
//!     );
//!
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::FlockError;

/// One injection step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectionProfile {
    /// Launch `count` users at once.
    AtOnce { count: usize },
    /// Launch nobody for `duration`.
    NothingFor { duration: Duration },
    /// Launch `count` users evenly spread over `during`.
    RampUsers { count: usize, during: Duration },
}
impl InjectionProfile {
    /// How many users this step launches.
    pub fn users(&self) -> usize {
        match self {
            InjectionProfile::AtOnce { count } => *count,
            InjectionProfile::NothingFor { .. } => 0,
            InjectionProfile::RampUsers { count, .. } => *count,
        }
    }

    /// How long this step lasts before the next step starts.
    pub fn duration(&self) -> Duration {
        match self {
            InjectionProfile::AtOnce { .. } => Duration::ZERO,
            InjectionProfile::NothingFor { duration } => *duration,
            InjectionProfile::RampUsers { during, .. } => *during,
        }
    }

    /// Launch offsets of this step's users, relative to the start of the step.
    fn offsets(&self) -> Vec<Duration> {
        match self {
            InjectionProfile::AtOnce { count } => vec![Duration::ZERO; *count],
            InjectionProfile::NothingFor { .. } => Vec::new(),
            InjectionProfile::RampUsers { count, during } => {
                let total = during.as_nanos();
                let count = *count as u128;
                (0..count)
                    .map(|i| {
                        // during * i / count, split so the product never exceeds u128.
                        let offset = (total / count) * i + (total % count) * i / count;
                        Duration::new(
                            (offset / NANOS_PER_SEC) as u64,
                            (offset % NANOS_PER_SEC) as u32,
                        )
                    })
                    .collect()
            }
        }
    }

    /// Re-checks a step that was not built through [`at_once_users`] or
    /// [`ramp_users`], for example one decoded from JSON.
    pub(crate) fn validate(&self, call: &str) -> Result<(), FlockError> {
        match self {
            InjectionProfile::AtOnce { count } => validate_user_count(call, *count),
            InjectionProfile::NothingFor { .. } => Ok(()),
            InjectionProfile::RampUsers { count, during } => {
                validate_user_count(call, *count)?;
                validate_ramp_duration(call, *during)
            }
        }
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Launch all `count` users at time zero of the step.
///
/// Returns [`FlockError::InvalidArgument`](../enum.FlockError.html#variant.InvalidArgument)
/// if `count` is 0.
pub fn at_once_users(count: usize) -> Result<InjectionProfile, FlockError> {
    trace!("at_once_users({})", count);
    validate_user_count("at_once_users()", count)?;
    Ok(InjectionProfile::AtOnce { count })
}

/// Launch nobody for `duration`.
pub fn nothing_for(duration: Duration) -> InjectionProfile {
    trace!("nothing_for({:?})", duration);
    InjectionProfile::NothingFor { duration }
}

/// Begin a ramp of `count` users, completed with [`RampUsers::during`].
pub fn ramp_users(count: usize) -> Result<RampUsers, FlockError> {
    trace!("ramp_users({})", count);
    validate_user_count("ramp_users()", count)?;
    Ok(RampUsers { count })
}

/// A ramp missing its duration, returned by [`ramp_users`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampUsers {
    count: usize,
}
impl RampUsers {
    /// Spread the users evenly over `duration`, which can not be zero.
    pub fn during(self, duration: Duration) -> Result<InjectionProfile, FlockError> {
        trace!("ramp_users({}).during({:?})", self.count, duration);
        validate_ramp_duration("ramp_users().during()", duration)?;
        Ok(InjectionProfile::RampUsers {
            count: self.count,
            during: duration,
        })
    }
}

fn validate_user_count(call: &str, count: usize) -> Result<(), FlockError> {
    if count < 1 {
        return Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: count.to_string(),
            detail: "at least one user is required".to_string(),
        });
    }
    Ok(())
}

fn validate_ramp_duration(call: &str, duration: Duration) -> Result<(), FlockError> {
    if duration.is_zero() {
        return Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: format!("{:?}", duration),
            detail: "a ramp duration must be greater than zero, use at_once_users() instead"
                .to_string(),
        });
    }
    Ok(())
}

/// Rejects steps whose combined duration does not fit in a [`Duration`].
pub(crate) fn validate_steps(call: &str, steps: &[InjectionProfile]) -> Result<(), FlockError> {
    let mut total = Duration::ZERO;
    for step in steps {
        total = match total.checked_add(step.duration()) {
            Some(total) => total,
            None => {
                return Err(FlockError::InvalidArgument {
                    call: call.to_string(),
                    value: format!("{:?}", steps),
                    detail: "the injection steps last longer than the maximum duration"
                        .to_string(),
                })
            }
        };
    }
    Ok(())
}

/// Expand injection steps into the launch offset of every user, in launch order.
///
/// Steps are sequential: each step starts when the previous step ends. Offsets past
/// [`Duration::MAX`] saturate, such steps are rejected by
/// [`inject_open`](../scenario/struct.ScenarioBuilder.html#method.inject_open).
pub fn schedule(steps: &[InjectionProfile]) -> Vec<Duration> {
    let mut launches = Vec::with_capacity(steps.iter().map(|s| s.users()).sum());
    let mut step_start = Duration::ZERO;
    for step in steps {
        launches.extend(
            step.offsets()
                .into_iter()
                .map(|o| step_start.saturating_add(o)),
        );
        step_start = step_start.saturating_add(step.duration());
    }
    launches
}
