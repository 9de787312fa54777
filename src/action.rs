//! Actions performed by virtual users.
//!
//! The only action is an HTTP request, described with a fluent builder:
//!
//! - [`http`] names the request, returning a [`PartialRequest`].
//! - [`PartialRequest::get`] (or `post`, `put`, ...) sets the method and the absolute
//!   target URL, returning a [`RequestWithMethod`].
//! - [`RequestWithMethod::check`] appends a response check, returning an
//!   [`HttpRequest`]. Further checks can be appended to the [`HttpRequest`].
//!
//! ```rust
//! use flock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let request = http("Get README.md")?
//!         .get("https://raw.githubusercontent.com/steadybit/extension-gatling/refs/heads/main/README.md")?
//!         .check(status().is(200)?);
//!
//!     assert_eq!(request.label(), "Get README.md");
//!     assert_eq!(request.method(), HttpMethod::Get);
//!     assert_eq!(request.checks(), &[Check::StatusIs { expected: 200 }]);
//!
//!     Ok(())
//! }
//! ```
//!
//! Checks keep the order they were added in. The same check can be added more than
//! once, in which case it is evaluated once per occurrence.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use url::Url;

use crate::check::Check;
use crate::util;
use crate::FlockError;

/// Supported HTTP methods.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> http::Method {
        match method {
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
        }
    }
}

/// Begins describing an HTTP request named `label`.
///
/// The label identifies the request in metrics and logs. It can not be empty.
pub fn http(label: &str) -> Result<PartialRequest, FlockError> {
    trace!("http({:?})", label);
    validate_label("http()", label)?;
    Ok(PartialRequest {
        label: label.to_string(),
    })
}

fn validate_label(call: &str, label: &str) -> Result<(), FlockError> {
    if label.is_empty() {
        return Err(FlockError::InvalidArgument {
            call: call.to_string(),
            value: label.to_string(),
            detail: "a request label can not be empty".to_string(),
        });
    }
    Ok(())
}

/// A named request without a method or target, returned by [`http`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRequest {
    label: String,
}
impl PartialRequest {
    /// Sets the method to GET and the target to the absolute `url`.
    ///
    /// Returns [`FlockError::InvalidUrl`](../enum.FlockError.html#variant.InvalidUrl)
    /// unless `url` is an absolute `http` or `https` URL.
    pub fn get(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Get, url)
    }

    /// Sets the method to POST and the target to the absolute `url`.
    pub fn post(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Post, url)
    }

    /// Sets the method to PUT and the target to the absolute `url`.
    pub fn put(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Put, url)
    }

    /// Sets the method to PATCH and the target to the absolute `url`.
    pub fn patch(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Patch, url)
    }

    /// Sets the method to DELETE and the target to the absolute `url`.
    pub fn delete(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Delete, url)
    }

    /// Sets the method to HEAD and the target to the absolute `url`.
    pub fn head(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Head, url)
    }

    /// Sets the method to OPTIONS and the target to the absolute `url`.
    pub fn options(self, url: &str) -> Result<RequestWithMethod, FlockError> {
        self.method(HttpMethod::Options, url)
    }

    /// Sets an arbitrary supported method and the target to the absolute `url`.
    pub fn method(self, method: HttpMethod, url: &str) -> Result<RequestWithMethod, FlockError> {
        trace!("{} {}({:?})", self.label, method, url);
        let call = format!("{}()", method.to_string().to_lowercase());
        let url = util::parse_http_url(&call, url)?;
        Ok(RequestWithMethod {
            label: self.label,
            method,
            url,
        })
    }
}

/// A request with a method and target but no checks yet.
///
/// It can be executed as is, or completed with [`check`](#method.check).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestWithMethod {
    label: String,
    method: HttpMethod,
    url: Url,
}
impl RequestWithMethod {
    /// Appends one check, completing the request.
    pub fn check(self, check: Check) -> HttpRequest {
        self.check_all(vec![check])
    }

    /// Appends all `checks` in order, completing the request.
    pub fn check_all<I>(self, checks: I) -> HttpRequest
    where
        I: IntoIterator<Item = Check>,
    {
        HttpRequest {
            label: self.label,
            method: self.method,
            url: self.url,
            checks: Vec::new(),
        }
        .check_all(checks)
    }
}

/// A complete, immutable request description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    label: String,
    method: HttpMethod,
    url: Url,
    checks: Vec<Check>,
}
impl HttpRequest {
    /// Appends one more check after the existing ones.
    pub fn check(self, check: Check) -> HttpRequest {
        self.check_all(vec![check])
    }

    /// Appends `checks` in order after the existing ones.
    pub fn check_all<I>(mut self, checks: I) -> HttpRequest
    where
        I: IntoIterator<Item = Check>,
    {
        for check in checks {
            trace!("{} check: {}", self.label, check);
            self.checks.push(check);
        }
        self
    }

    /// The name of the request.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The request method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The absolute target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All checks, in the order they were added.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Re-checks a request that was not built through [`http`], for example one
    /// decoded from JSON.
    pub(crate) fn validate(&self, call: &str) -> Result<(), FlockError> {
        validate_label(call, &self.label)?;
        util::parse_http_url(call, self.url.as_str())?;
        for check in &self.checks {
            check.validate(call)?;
        }
        Ok(())
    }
}

impl From<RequestWithMethod> for HttpRequest {
    fn from(request: RequestWithMethod) -> HttpRequest {
        request.check_all(Vec::new())
    }
}

/// A single step performed by a virtual user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Send an HTTP request and evaluate its checks.
    HttpRequest(HttpRequest),
}
impl Action {
    /// The label identifying this action in metrics and logs.
    pub fn label(&self) -> &str {
        match self {
            Action::HttpRequest(request) => request.label(),
        }
    }

    pub(crate) fn validate(&self, call: &str) -> Result<(), FlockError> {
        match self {
            Action::HttpRequest(request) => request.validate(call),
        }
    }
}

impl From<HttpRequest> for Action {
    fn from(request: HttpRequest) -> Action {
        Action::HttpRequest(request)
    }
}

impl From<RequestWithMethod> for Action {
    fn from(request: RequestWithMethod) -> Action {
        Action::HttpRequest(request.into())
    }
}
