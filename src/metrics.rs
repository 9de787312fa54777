//! Optional metrics collected and aggregated during a run.
//!
//! Each virtual user sends a [`RequestMetric`] to the runner after every request, and a
//! [`UserMetric`] when it finishes its scenario. The runner aggregates these into
//! [`RunMetrics`], which is returned by
//! [`Runner::execute`](../runner/struct.Runner.html#method.execute) and, unless the
//! `--no-print-metrics` option is set, displayed at the end of the run.
//!
//! A request fails when no response is received, or when any of its checks fails. A
//! failed check never interrupts the scenario, the user continues with its next action.

use chrono::prelude::*;
use http::StatusCode;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::action::{HttpMethod, HttpRequest};
use crate::check::CheckFailure;
use crate::util;

/// Metrics sent from virtual users to the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum FlockMetric {
    Request(RequestMetric),
    User(UserMetric),
}

/// The outcome of one request made by one virtual user.
///
/// When the `--request-log` option is set, every `RequestMetric` is also written to the
/// request log as one line of JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetric {
    /// How many milliseconds the run had been going when the request started.
    pub elapsed: u64,
    /// Which virtual user made the request.
    pub user: usize,
    /// The name of the scenario the request belongs to.
    pub scenario: String,
    /// The label of the request.
    pub label: String,
    /// The method of the request.
    pub method: HttpMethod,
    /// The URL that was requested.
    pub url: String,
    /// The HTTP response status code, or 0 if no response was received.
    pub status_code: u16,
    /// How many milliseconds the request took, including reading the body.
    pub response_time: u64,
    /// Whether a response was received and every check passed.
    pub success: bool,
    /// Every check that did not pass, in the order the checks were declared.
    pub check_failures: Vec<CheckFailure>,
    /// The transport error that prevented a response, if any.
    pub error: String,
}
impl RequestMetric {
    pub(crate) fn new(scenario: &str, request: &HttpRequest, elapsed: u128, user: usize) -> Self {
        RequestMetric {
            elapsed: elapsed as u64,
            user,
            scenario: scenario.to_string(),
            label: request.label().to_string(),
            method: request.method(),
            url: request.url().to_string(),
            status_code: 0,
            response_time: 0,
            success: true,
            check_failures: Vec::new(),
            error: "".to_string(),
        }
    }

    // Record how long the `response_time` took.
    pub(crate) fn set_response_time(&mut self, response_time: u128) {
        self.response_time = response_time as u64;
    }

    // Record the returned `status_code`.
    pub(crate) fn set_status_code(&mut self, status_code: Option<StatusCode>) {
        self.status_code = match status_code {
            Some(status_code) => status_code.as_u16(),
            None => 0,
        };
    }

    // Record a transport error, no response was received.
    pub(crate) fn set_error(&mut self, error: &str) {
        self.success = false;
        self.error = error.to_string();
    }

    // Record a failed check.
    pub(crate) fn add_check_failure(&mut self, failure: CheckFailure) {
        self.success = false;
        self.check_failures.push(failure);
    }

    /// The key under which this request is aggregated.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.scenario, &self.label, self.method)
    }
}

/// Identifies one aggregated request: its scenario, label and method.
///
/// The parts are kept apart, so a label or scenario name containing `" / "` can not
/// collide with another pair, and the same label requested with two methods is
/// aggregated twice.
///
/// # Example
/// ```rust
/// use flock::metrics::RequestKey;
/// use flock::prelude::*;
///
/// let key = RequestKey::new("Browse", "Home", HttpMethod::Get);
/// assert_eq!(key.to_string(), "GET Browse / Home");
/// assert_ne!(key, RequestKey::new("Browse", "Home", HttpMethod::Head));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// The scenario name.
    pub scenario: String,
    /// The request label.
    pub label: String,
    /// The request method.
    pub method: HttpMethod,
}
impl RequestKey {
    pub fn new(scenario: &str, label: &str, method: HttpMethod) -> Self {
        RequestKey {
            scenario: scenario.to_string(),
            label: label.to_string(),
            method,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} / {}", self.method, self.scenario, self.label)
    }
}

/// Sent by a virtual user when it stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetric {
    /// Which virtual user stopped.
    pub user: usize,
    /// The scenario the user ran.
    pub scenario: String,
    /// How many actions the user performed.
    pub executed: usize,
    /// How many actions were skipped because the run was canceled.
    pub skipped: usize,
    /// Whether the user was told to exit before finishing its scenario.
    pub canceled: bool,
}

/// Metrics aggregated for one [`RequestKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAggregate {
    /// The scenario name.
    pub scenario: String,
    /// The request label.
    pub label: String,
    /// The request method.
    pub method: HttpMethod,
    /// The shortest response time seen so far, in milliseconds.
    pub min_response_time: usize,
    /// The longest response time seen so far, in milliseconds.
    pub max_response_time: usize,
    /// Total combined response times seen so far.
    pub total_response_time: usize,
    /// Total number of response times seen so far.
    pub response_time_counter: usize,
    /// Per-status-code counters, 0 counting requests that got no response.
    pub status_code_counts: BTreeMap<u16, usize>,
    /// How many requests received a response and passed all checks.
    pub success_count: usize,
    /// How many requests failed.
    pub fail_count: usize,
    /// How many checks failed, a single request can fail more than one check.
    pub check_failures: usize,
    /// How many requests got no response.
    pub errors: usize,
}
impl RequestAggregate {
    pub(crate) fn new(key: &RequestKey) -> Self {
        trace!("new request aggregate: {}", key);
        RequestAggregate {
            scenario: key.scenario.clone(),
            label: key.label.clone(),
            method: key.method,
            min_response_time: 0,
            max_response_time: 0,
            total_response_time: 0,
            response_time_counter: 0,
            status_code_counts: BTreeMap::new(),
            success_count: 0,
            fail_count: 0,
            check_failures: 0,
            errors: 0,
        }
    }

    /// Fold one request outcome into the aggregate.
    pub(crate) fn record(&mut self, metric: &RequestMetric) {
        self.set_response_time(metric.response_time);
        *self.status_code_counts.entry(metric.status_code).or_insert(0) += 1;
        if metric.success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.check_failures += metric.check_failures.len();
        if !metric.error.is_empty() {
            self.errors += 1;
        }
    }

    /// Track response time.
    fn set_response_time(&mut self, response_time: u64) {
        let response_time = response_time as usize;
        self.min_response_time = update_min_time(self.min_response_time, response_time);
        self.max_response_time = update_max_time(self.max_response_time, response_time);
        self.total_response_time += response_time;
        self.response_time_counter += 1;
    }

    /// The total number of requests.
    pub fn total_count(&self) -> usize {
        self.success_count + self.fail_count
    }

    /// The average response time in milliseconds.
    pub fn average_response_time(&self) -> f32 {
        match self.response_time_counter {
            0 => 0.0,
            _ => self.total_response_time as f32 / self.response_time_counter as f32,
        }
    }
}

/// Everything that happened during one run.
///
/// # Example
/// ```rust,no_run
/// use flock::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), FlockError> {
///     let scn = scenario("Example")?
///         .exec(http("Home")?.get("http://localhost/")?.check(status().is(200)?));
///     let workload = Registry::new().set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])?;
///
///     let metrics = Runner::initialize()?.execute(&workload).await?;
///     assert_eq!(metrics.users, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct RunMetrics {
    /// When the run started.
    pub started: Option<DateTime<Utc>>,
    /// When the run stopped.
    pub stopped: Option<DateTime<Utc>>,
    /// Total number of seconds the run took.
    pub duration: usize,
    /// Total number of virtual users launched.
    pub users: usize,
    /// Number of users that ran their whole scenario.
    pub users_completed: usize,
    /// Number of users told to exit before finishing their scenario.
    pub users_canceled: usize,
    /// Number of users never launched because the run was canceled first.
    pub users_not_launched: usize,
    /// Number of actions skipped because the run was canceled.
    pub skipped_actions: usize,
    /// Aggregated requests.
    pub requests: HashMap<RequestKey, RequestAggregate>,
    /// How often each failure message was seen, per request.
    pub failures: BTreeMap<(RequestKey, String), usize>,
    /// Flag indicating whether or not to display metrics.
    pub(crate) display_metrics: bool,
}
impl RunMetrics {
    /// Fold one metric sent by a virtual user into the run metrics.
    pub(crate) fn record(&mut self, metric: FlockMetric) {
        match metric {
            FlockMetric::Request(request) => self.record_request(&request),
            FlockMetric::User(user) => {
                debug!(
                    "user {} stopped [{}]: {} executed, {} skipped",
                    user.user, user.scenario, user.executed, user.skipped
                );
                if user.canceled {
                    self.users_canceled += 1;
                } else {
                    self.users_completed += 1;
                }
                self.skipped_actions += user.skipped;
            }
        }
    }

    fn record_request(&mut self, request: &RequestMetric) {
        let key = request.key();
        self.requests
            .entry(key.clone())
            .or_insert_with(|| RequestAggregate::new(&key))
            .record(request);

        if !request.error.is_empty() {
            *self
                .failures
                .entry((key.clone(), request.error.clone()))
                .or_insert(0) += 1;
        }
        for failure in &request.check_failures {
            *self
                .failures
                .entry((key.clone(), failure.to_string()))
                .or_insert(0) += 1;
        }
    }

    /// The total number of requests made.
    pub fn total_requests(&self) -> usize {
        self.requests.values().map(|r| r.total_count()).sum()
    }

    /// The total number of failed requests.
    pub fn failed_requests(&self) -> usize {
        self.requests.values().map(|r| r.fail_count).sum()
    }

    /// The total number of checks that did not pass.
    pub fn check_failures(&self) -> usize {
        self.requests.values().map(|r| r.check_failures).sum()
    }

    /// The total number of requests that got no response.
    pub fn errors(&self) -> usize {
        self.requests.values().map(|r| r.errors).sum()
    }

    /// Consumes and displays the metrics of a completed run.
    pub fn print(&self) {
        if self.display_metrics {
            info!("printing final metrics after {} seconds...", self.duration);
            print!("{}", self);
        }
    }

    /// Prepares a table of requests and fails.
    fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let mut aggregate_fail_count = 0;
        let mut aggregate_total_count = 0;
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let total_count = request.total_count();
            let name = request_key.to_string();
            self.fmt_request_row(fmt, &name, total_count, request.fail_count)?;
            aggregate_total_count += total_count;
            aggregate_fail_count += request.fail_count;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+---------------+----------------+----------+--------"
            )?;
            self.fmt_request_row(fmt, "Aggregated", aggregate_total_count, aggregate_fail_count)?;
        }

        Ok(())
    }

    fn fmt_request_row(
        &self,
        fmt: &mut fmt::Formatter<'_>,
        name: &str,
        total_count: usize,
        fail_count: usize,
    ) -> fmt::Result {
        let fail_percent = if fail_count > 0 {
            fail_count as f32 / total_count as f32 * 100.0
        } else {
            0.0
        };
        let (reqs, fails) = per_second_calculations(self.duration, total_count, fail_count);
        // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
        let fails_column = if fail_percent as usize == 100 || fail_percent as usize == 0 {
            format!("{} ({}%)", format_number(fail_count), fail_percent as usize)
        } else {
            format!("{} ({:.1}%)", format_number(fail_count), fail_percent)
        };
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8.reqs_p$} | {:>7.fails_p$}",
            util::truncate_string(name, 24),
            format_number(total_count),
            fails_column,
            reqs,
            fails,
            reqs_p = determine_precision(reqs),
            fails_p = determine_precision(fails),
        )
    }

    /// Prepares a table of response times.
    fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>10} | {:>10} | {:>11}",
            "Name", "Avg (ms)", "Min", "Max", "Status codes"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let average = request.average_response_time();
            let status_codes = request
                .status_code_counts
                .iter()
                .map(|(code, count)| format!("{} [{}]", format_number(*count), code))
                .join(", ");
            writeln!(
                fmt,
                " {:<24} | {:>11.avg_precision$} | {:>10} | {:>10} | {}",
                util::truncate_string(&request_key.to_string(), 24),
                average,
                format_number(request.min_response_time),
                format_number(request.max_response_time),
                status_codes,
                avg_precision = determine_precision(average),
            )?;
        }

        Ok(())
    }

    /// Prepares a table of failed checks and transport errors.
    fn fmt_failures(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.failures.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === FAILURES ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<11} | Failure", "Count")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for ((key, failure), count) in self.failures.iter().sorted_by(|a, b| b.1.cmp(a.1)) {
            writeln!(fmt, " {:<11} | {}: {}", format_number(*count), key, failure)?;
        }

        Ok(())
    }

    /// Prepares an overview of the users.
    fn fmt_overview(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            "\n === OVERVIEW ===\n ------------------------------------------------------------------------------"
        )?;
        if let (Some(started), Some(stopped)) = (self.started, self.stopped) {
            writeln!(
                fmt,
                " {:<24} {} - {} ({} seconds)",
                "Run:",
                started.format("%Y-%m-%d %H:%M:%S"),
                stopped.format("%H:%M:%S"),
                format_number(self.duration)
            )?;
        }
        writeln!(
            fmt,
            " {:<24} {} launched, {} completed, {} canceled, {} not launched",
            "Users:",
            format_number(self.users),
            format_number(self.users_completed),
            format_number(self.users_canceled),
            format_number(self.users_not_launched)
        )?;
        writeln!(
            fmt,
            " {:<24} {} requests, {} failed checks, {} errors, {} skipped actions",
            "Actions:",
            format_number(self.total_requests()),
            format_number(self.check_failures()),
            format_number(self.errors()),
            format_number(self.skipped_actions)
        )
    }
}

/// Implement format trait to allow displaying metrics.
impl fmt::Display for RunMetrics {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_overview(fmt)?;
        self.fmt_requests(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_failures(fmt)
    }
}

/// Helper to calculate requests and fails per seconds.
fn per_second_calculations(duration: usize, total: usize, fail: usize) -> (f32, f32) {
    if duration == 0 {
        (0.0, 0.0)
    } else {
        (total as f32 / duration as f32, fail as f32 / duration as f32)
    }
}

fn determine_precision(value: f32) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format large number in locale appropriate style.
fn format_number(number: usize) -> String {
    number.to_formatted_string(&Locale::en)
}

/// A helper function to update the minimum time, 0 meaning none was seen yet.
fn update_min_time(mut global_min: usize, min: usize) -> usize {
    if global_min == 0 || (min > 0 && min < global_min) {
        global_min = min;
    }
    global_min
}

/// A helper function to update the maximum time.
fn update_max_time(mut global_max: usize, max: usize) -> usize {
    if global_max < max {
        global_max = max;
    }
    global_max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::http;
    use crate::check::status;

    fn home() -> RequestKey {
        RequestKey::new("Browse", "Home", HttpMethod::Get)
    }

    fn request_metric(status_code: u16, response_time: u128) -> RequestMetric {
        let request = http("Home")
            .unwrap()
            .get("http://localhost/")
            .unwrap()
            .check(status().is(200).unwrap());
        let metric = RequestMetric::new("Browse", &request, 0, 0);
        finish_metric(metric, &request, status_code, response_time)
    }

    fn finish_metric(
        mut metric: RequestMetric,
        request: &HttpRequest,
        status_code: u16,
        response_time: u128,
    ) -> RequestMetric {
        metric.set_response_time(response_time);
        metric.set_status_code(StatusCode::from_u16(status_code).ok());
        for check in request.checks() {
            if let Err(failure) = check.evaluate(StatusCode::from_u16(status_code).unwrap()) {
                metric.add_check_failure(failure);
            }
        }
        metric
    }

    #[test]
    fn min_max_time() {
        assert_eq!(update_min_time(0, 10), 10);
        assert_eq!(update_min_time(10, 5), 5);
        assert_eq!(update_min_time(5, 0), 5);
        assert_eq!(update_max_time(0, 10), 10);
        assert_eq!(update_max_time(10, 5), 10);
    }

    #[test]
    fn per_second() {
        assert_eq!(per_second_calculations(0, 10, 5), (0.0, 0.0));
        assert_eq!(per_second_calculations(2, 10, 5), (5.0, 2.5));
        assert_eq!(determine_precision(999.0), 2);
        assert_eq!(determine_precision(1000.0), 0);
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn aggregate_requests() {
        let mut metrics = RunMetrics::default();
        metrics.record(FlockMetric::Request(request_metric(200, 10)));
        metrics.record(FlockMetric::Request(request_metric(200, 30)));
        metrics.record(FlockMetric::Request(request_metric(503, 5)));

        let mut error = request_metric(200, 1);
        error.set_status_code(None);
        error.check_failures.clear();
        error.set_error("connection refused");
        metrics.record(FlockMetric::Request(error));

        assert_eq!(metrics.requests.len(), 1);
        let aggregate = &metrics.requests[&home()];
        assert_eq!(aggregate.method, HttpMethod::Get);
        assert_eq!(aggregate.total_count(), 4);
        assert_eq!(aggregate.success_count, 2);
        assert_eq!(aggregate.fail_count, 2);
        assert_eq!(aggregate.check_failures, 1);
        assert_eq!(aggregate.errors, 1);
        assert_eq!(aggregate.min_response_time, 1);
        assert_eq!(aggregate.max_response_time, 30);
        assert_eq!(aggregate.status_code_counts[&200], 2);
        assert_eq!(aggregate.status_code_counts[&503], 1);
        assert_eq!(aggregate.status_code_counts[&0], 1);

        assert_eq!(metrics.total_requests(), 4);
        assert_eq!(metrics.failed_requests(), 2);
        assert_eq!(metrics.check_failures(), 1);
        assert_eq!(metrics.errors(), 1);
        assert_eq!(
            metrics.failures[&(
                home(),
                "status.is(200), but actually found 503".to_string()
            )],
            1
        );
        assert_eq!(
            metrics.failures[&(home(), "connection refused".to_string())],
            1
        );
    }

    #[test]
    fn keys_do_not_collide() {
        // Scenario "a / b" with label "c", and scenario "a" with label "b / c".
        let first: HttpRequest = http("c").unwrap().get("http://localhost/").unwrap().into();
        let second: HttpRequest = http("b / c")
            .unwrap()
            .get("http://localhost/")
            .unwrap()
            .into();
        // The same scenario and label, with another method.
        let third: HttpRequest = http("c").unwrap().post("http://localhost/").unwrap().into();

        let mut metrics = RunMetrics::default();
        metrics.record(FlockMetric::Request(finish_metric(
            RequestMetric::new("a / b", &first, 0, 0),
            &first,
            200,
            1,
        )));
        metrics.record(FlockMetric::Request(finish_metric(
            RequestMetric::new("a", &second, 0, 0),
            &second,
            200,
            1,
        )));
        metrics.record(FlockMetric::Request(finish_metric(
            RequestMetric::new("a / b", &third, 0, 0),
            &third,
            200,
            1,
        )));

        assert_eq!(metrics.requests.len(), 3);
        for key in [
            RequestKey::new("a / b", "c", HttpMethod::Get),
            RequestKey::new("a", "b / c", HttpMethod::Get),
            RequestKey::new("a / b", "c", HttpMethod::Post),
        ] {
            assert_eq!(metrics.requests[&key].total_count(), 1, "{}", key);
        }
    }

    #[test]
    fn aggregate_users() {
        let mut metrics = RunMetrics::default();
        metrics.record(FlockMetric::User(UserMetric {
            user: 0,
            scenario: "Browse".to_string(),
            executed: 3,
            skipped: 0,
            canceled: false,
        }));
        metrics.record(FlockMetric::User(UserMetric {
            user: 1,
            scenario: "Browse".to_string(),
            executed: 1,
            skipped: 2,
            canceled: true,
        }));
        assert_eq!(metrics.users_completed, 1);
        assert_eq!(metrics.users_canceled, 1);
        assert_eq!(metrics.skipped_actions, 2);
    }

    #[test]
    fn display() {
        let mut metrics = RunMetrics::default();
        metrics.record(FlockMetric::Request(request_metric(503, 5)));
        let output = metrics.to_string();
        assert!(output.contains("PER REQUEST METRICS"));
        assert!(output.contains("GET Browse / Home"));
        assert!(output.contains("1 [503]"));
        assert!(output.contains("status.is(200), but actually found 503"));
    }
}
