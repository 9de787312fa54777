//! Response checks.
//!
//! A [`Check`] is a predicate evaluated against the response of an
//! [`HttpRequest`](../action/struct.HttpRequest.html). Checks are built with [`status()`]:
//!
//! ```rust
//! use flock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let ok = status().is(200)?;
//!     let not_found = status().is_not(404)?;
//!     let redirected = status().is_in(vec![301, 302, 307, 308])?;
//!
//!     assert_eq!(ok, Check::StatusIs { expected: 200 });
//!
//!     Ok(())
//! }
//! ```
//!
//! A failing check is reported against its request. It never aborts the scenario.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FlockError;

/// The lowest status code a check may reference.
pub const MIN_STATUS_CODE: u16 = 100;
/// The highest status code a check may reference.
pub const MAX_STATUS_CODE: u16 = 599;

/// A predicate evaluated against a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Check {
    /// The response status must equal `expected`.
    StatusIs { expected: u16 },
    /// The response status must not equal `unexpected`.
    StatusIsNot { unexpected: u16 },
    /// The response status must be one of `codes`.
    StatusIn { codes: Vec<u16> },
}
impl Check {
    /// Evaluate the check against the status of a fully received response.
    ///
    /// # Example
    /// ```rust
    /// use flock::prelude::*;
    /// use http::StatusCode;
    ///
    /// let check = status().is(200).unwrap();
    /// assert!(check.evaluate(StatusCode::OK).is_ok());
    ///
    /// let failure = check.evaluate(StatusCode::NOT_FOUND).unwrap_err();
    /// assert_eq!(failure.actual, 404);
    /// ```
    pub fn evaluate(&self, status: StatusCode) -> Result<(), CheckFailure> {
        let actual = status.as_u16();
        let passed = match self {
            Check::StatusIs { expected } => actual == *expected,
            Check::StatusIsNot { unexpected } => actual != *unexpected,
            Check::StatusIn { codes } => codes.contains(&actual),
        };

        if passed {
            Ok(())
        } else {
            Err(CheckFailure {
                check: self.clone(),
                actual,
            })
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Check::StatusIs { expected } => write!(f, "status.is({})", expected),
            Check::StatusIsNot { unexpected } => write!(f, "status.not({})", unexpected),
            Check::StatusIn { codes } => {
                let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                write!(f, "status.in({})", codes.join(", "))
            }
        }
    }
}

/// A check that did not pass, and the status code actually returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// The check that failed.
    pub check: Check,
    /// The status code returned by the server.
    pub actual: u16,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, but actually found {}", self.check, self.actual)
    }
}

/// Begins a response status check.
pub fn status() -> StatusCheck {
    StatusCheck {}
}

/// Builds checks against the response status code, returned by [`status()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCheck {}
impl StatusCheck {
    /// The response status must equal `code`.
    ///
    /// Returns [`FlockError::InvalidArgument`](../enum.FlockError.html#variant.InvalidArgument)
    /// if `code` is outside of 100-599.
    pub fn is(&self, code: u16) -> Result<Check, FlockError> {
        trace!("status().is({})", code);
        validate_status_code("status().is()", code)?;
        Ok(Check::StatusIs { expected: code })
    }

    /// The response status must not equal `code`.
    pub fn is_not(&self, code: u16) -> Result<Check, FlockError> {
        trace!("status().is_not({})", code);
        validate_status_code("status().is_not()", code)?;
        Ok(Check::StatusIsNot { unexpected: code })
    }

    /// The response status must be one of `codes`. At least one code is required.
    pub fn is_in<I>(&self, codes: I) -> Result<Check, FlockError>
    where
        I: IntoIterator<Item = u16>,
    {
        let codes: Vec<u16> = codes.into_iter().collect();
        trace!("status().is_in({:?})", codes);
        validate_status_codes("status().is_in()", &codes)?;
        Ok(Check::StatusIn { codes })
    }
}

impl Check {
    /// Re-checks a check that was not built through [`status()`], for example one
    /// decoded from JSON.
    pub(crate) fn validate(&self, call: &str) -> Result<(), FlockError> {
        match self {
            Check::StatusIs { expected } => validate_status_code(call, *expected),
            Check::StatusIsNot { unexpected } => validate_status_code(call, *unexpected),
            Check::StatusIn { codes } => validate_status_codes(call, codes),
        }
    }
}

fn validate_status_codes(call: &str, codes: &[u16]) -> Result<(), FlockError> {
    if codes.is_empty() {
        return Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: "[]".to_string(),
            detail: "at least one status code is required".to_string(),
        });
    }
    for code in codes {
        validate_status_code(call, *code)?;
    }
    Ok(())
}

fn validate_status_code(call: &str, code: u16) -> Result<(), FlockError> {
    if (MIN_STATUS_CODE..=MAX_STATUS_CODE).contains(&code) {
        Ok(())
    } else {
        Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: code.to_string(),
            detail: format!(
                "status code must be between {} and {}",
                MIN_STATUS_CODE, MAX_STATUS_CODE
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is() {
        assert_eq!(status().is(200).unwrap(), Check::StatusIs { expected: 200 });
        assert!(status().is(100).is_ok());
        assert!(status().is(599).is_ok());

        for code in [0, 99, 600, 999] {
            match status().is(code) {
                Err(FlockError::InvalidArgument { call, value, .. }) => {
                    assert_eq!(call, "status().is()");
                    assert_eq!(value, code.to_string());
                }
                other => panic!("unexpected result for {}: {:?}", code, other),
            }
        }
    }

    #[test]
    fn status_is_not_and_in() {
        assert_eq!(
            status().is_not(500).unwrap(),
            Check::StatusIsNot { unexpected: 500 }
        );
        assert!(status().is_not(600).is_err());

        assert_eq!(
            status().is_in(vec![200, 204]).unwrap(),
            Check::StatusIn {
                codes: vec![200, 204]
            }
        );
        assert!(status().is_in(Vec::new()).is_err());
        assert!(status().is_in(vec![200, 42]).is_err());
    }

    #[test]
    fn evaluate() {
        let check = status().is(200).unwrap();
        assert_eq!(check.evaluate(StatusCode::OK), Ok(()));
        assert_eq!(
            check.evaluate(StatusCode::INTERNAL_SERVER_ERROR),
            Err(CheckFailure {
                check: check.clone(),
                actual: 500
            })
        );

        let check = status().is_not(404).unwrap();
        assert!(check.evaluate(StatusCode::OK).is_ok());
        assert!(check.evaluate(StatusCode::NOT_FOUND).is_err());

        let check = status().is_in(vec![301, 302]).unwrap();
        assert!(check.evaluate(StatusCode::FOUND).is_ok());
        assert!(check.evaluate(StatusCode::OK).is_err());
    }

    #[test]
    fn display() {
        let failure = status()
            .is(200)
            .unwrap()
            .evaluate(StatusCode::SERVICE_UNAVAILABLE)
            .unwrap_err();
        assert_eq!(failure.to_string(), "status.is(200), but actually found 503");
        assert_eq!(
            status().is_in(vec![200, 201]).unwrap().to_string(),
            "status.in(200, 201)"
        );
    }

    #[test]
    fn validate_decoded_checks() {
        for check in [
            Check::StatusIs { expected: 42 },
            Check::StatusIsNot { unexpected: 600 },
            Check::StatusIn { codes: Vec::new() },
            Check::StatusIn {
                codes: vec![200, 1000],
            },
        ] {
            match check.validate("from_json()") {
                Err(FlockError::InvalidArgument { call, .. }) => assert_eq!(call, "from_json()"),
                other => panic!("unexpected result for {}: {:?}", check, other),
            }
        }
        assert!(status().is(200).unwrap().validate("from_json()").is_ok());
    }
}
