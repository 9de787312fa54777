//! Utility functions used by Flock, and available when writing load tests.

use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;
use std::time;
use url::Url;

use crate::{FlockError, CANCELED};

lazy_static! {
    static ref TIMESPAN: Regex =
        Regex::new(r"^((?P<hours>\d+?)h)?((?P<minutes>\d+?)m)?((?P<seconds>\d+?)s)?$")
            .expect("timespan regex is valid");
}

/// Parse a string representing a time span and return the number of seconds.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", and "s", in that order, indicating
/// "hours", "minutes", and "seconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
///
/// # Example
/// ```rust
/// use flock::util;
///
/// // 1 hour 2 minutes and 3 seconds is 3,723 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), 3_723);
///
/// // 45 seconds is 45 seconds.
/// assert_eq!(util::parse_timespan("45"), 45);
///
/// // Invalid value is 0 seconds.
/// assert_eq!(util::parse_timespan("foo"), 0);
/// ```
pub fn parse_timespan(time_str: &str) -> usize {
    match usize::from_str(time_str) {
        // If an integer is passed in, assume it's seconds
        Ok(t) => {
            trace!("{} is integer: {} seconds", time_str, t);
            t
        }
        // Otherwise use a regex to extract hours, minutes and seconds from string.
        Err(_) => {
            let time_matches = match TIMESPAN.captures(time_str) {
                Some(c) => c,
                None => return 0,
            };
            let extract = |name: &str| -> usize {
                time_matches
                    .name(name)
                    .and_then(|m| usize::from_str(m.as_str()).ok())
                    .unwrap_or(0)
            };
            let hours = extract("hours");
            let minutes = extract("minutes");
            let seconds = extract("seconds");
            let total = hours
                .saturating_mul(60 * 60)
                .saturating_add(minutes.saturating_mul(60))
                .saturating_add(seconds);
            trace!(
                "{} hours {} minutes {} seconds: {} seconds",
                hours,
                minutes,
                seconds,
                total
            );
            total
        }
    }
}

/// Returns `true` if `time_str` is a timespan [`parse_timespan`] understands, including
/// zero spans such as "0", "0s" or "0m".
///
/// # Example
/// ```rust
/// use flock::util;
///
/// assert!(util::is_timespan("0s"));
/// assert!(util::is_timespan("1h30m"));
/// assert!(!util::is_timespan("soon"));
/// assert!(!util::is_timespan(""));
/// ```
pub fn is_timespan(time_str: &str) -> bool {
    usize::from_str(time_str).is_ok() || (!time_str.is_empty() && TIMESPAN.is_match(time_str))
}

/// Truncate strings when they're too long to display.
///
/// If a string is longer than the specified max length, this function removes extra
/// characters and replaces the last two with a double-period ellipsis.
///
/// # Example
/// ```rust
/// use flock::util;
///
/// // All but 7 characters are truncated, with ".." appended.
/// assert_eq!(util::truncate_string("this is a long string", 9), "this is..");
///
/// // All characters are returned as the string is less than 15 characters long.
/// assert_eq!(util::truncate_string("shorter string", 15), "shorter string");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if str_to_truncate.char_indices().count() > max_length {
        match str_to_truncate.char_indices().nth(max_length.saturating_sub(2)) {
            None => str_to_truncate.to_string(),
            Some((idx, _)) => format!("{}..", &str_to_truncate[..idx]),
        }
    } else {
        str_to_truncate.to_string()
    }
}

/// Determine if a timer expired, with second granularity.
///
/// A `run_time` of 0 never expires.
pub fn timer_expired(started: time::Instant, run_time: usize) -> bool {
    run_time > 0 && started.elapsed().as_secs() >= run_time as u64
}

/// Parse `url` as an absolute `http` or `https` URL.
///
/// The `call` names the builder that received the URL, and is included in the error.
///
/// # Example
/// ```rust
/// use flock::util;
///
/// // Hostname is a valid URL.
/// assert!(util::parse_http_url("get()", "http://localhost/").is_ok());
///
/// // URL with path is a valid URL.
/// assert!(util::parse_http_url("get()", "https://example.com/foo").is_ok());
///
/// // Scheme is required.
/// assert!(util::parse_http_url("get()", "example.com/").is_err());
///
/// // Only http and https are supported.
/// assert!(util::parse_http_url("get()", "ftp://example.com/").is_err());
/// ```
pub fn parse_http_url(call: &str, url: &str) -> Result<Url, FlockError> {
    let parsed = Url::parse(url).map_err(|parse_error| FlockError::InvalidUrl {
        call: call.to_string(),
        url: url.to_string(),
        detail: format!("failed to parse url: {}", parse_error),
        parse_error: Some(parse_error),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FlockError::InvalidUrl {
            call: call.to_string(),
            url: url.to_string(),
            detail: format!(
                "unsupported scheme {:?}, expected \"http\" or \"https\"",
                parsed.scheme()
            ),
            parse_error: None,
        });
    }

    if !parsed.has_host() {
        return Err(FlockError::InvalidUrl {
            call: call.to_string(),
            url: url.to_string(),
            detail: "url has no host".to_string(),
            parse_error: None,
        });
    }

    Ok(parsed)
}

/// Returns `true` once the run has been canceled.
pub(crate) fn canceled() -> bool {
    match CANCELED.read() {
        Ok(canceled) => *canceled,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Flag the run as canceled, or reset the flag before a new run.
pub(crate) fn set_canceled(value: bool) {
    match CANCELED.write() {
        Ok(mut canceled) => *canceled = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

// Internal helper to configure the control-c handler. Shutdown cleanly on the first
// ctrl-c. Exit abruptly on the second ctrl-c.
pub(crate) fn setup_ctrlc_handler() {
    match ctrlc::set_handler(move || {
        // We've caught a ctrl-c, determine if it's the first time or an additional time.
        if canceled() {
            warn!("caught another ctrl-c, exiting immediately...");
            std::process::exit(1);
        } else {
            warn!("caught ctrl-c, stopping...");
            set_canceled(true);
        }
    }) {
        Ok(_) => (),
        Err(e) => {
            // The handler can only be installed once per process, for example when
            // running multiple tests. Reset CANCELED so each run starts fresh.
            set_canceled(false);
            info!("reset ctrl-c handler: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespan() {
        assert_eq!(parse_timespan("0"), 0);
        assert_eq!(parse_timespan("foo"), 0);
        assert_eq!(parse_timespan("1"), 1);
        assert_eq!(parse_timespan("1s"), 1);
        assert_eq!(parse_timespan("1m"), 60);
        assert_eq!(parse_timespan("61"), 61);
        assert_eq!(parse_timespan("1m1s"), 61);
        assert_eq!(parse_timespan("10m"), 600);
        assert_eq!(parse_timespan("1h"), 3600);
        assert_eq!(parse_timespan("1h1m1s"), 3661);
        assert_eq!(parse_timespan("1h30m"), 5400);
    }

    #[test]
    fn zero_timespans_are_timespans() {
        for valid in ["0", "0s", "0m", "0h", "0h0m0s", "15", "1h30m"] {
            assert!(is_timespan(valid), "{}", valid);
        }
        for invalid in ["", "soon", "1d", "m", "-5", "1s1m"] {
            assert!(!is_timespan(invalid), "{}", invalid);
        }
        // Huge spans saturate instead of overflowing.
        assert_eq!(parse_timespan("99999999999999999h"), usize::MAX);
    }

    #[test]
    fn truncate() {
        assert_eq!(truncate_string("the quick brown fox", 25), "the quick brown fox");
        assert_eq!(truncate_string("the quick brown fox", 10), "the quic..");
        assert_eq!(truncate_string("abcde", 5), "abcde");
        assert_eq!(truncate_string("abcde", 4), "ab..");
    }

    #[test]
    fn timer() {
        let started = time::Instant::now();
        // A run time of 0 never expires.
        assert!(!timer_expired(started, 0));
        assert!(!timer_expired(started, 60));
    }

    #[test]
    fn http_url() {
        let url = parse_http_url("get()", "https://example.com/README.md").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/README.md");

        assert!(parse_http_url("get()", "http://127.0.0.1:8080").is_ok());

        match parse_http_url("get()", "not a url") {
            Err(FlockError::InvalidUrl {
                call, parse_error, ..
            }) => {
                assert_eq!(call, "get()");
                assert!(parse_error.is_some());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match parse_http_url("post()", "mailto:someone@example.com") {
            Err(FlockError::InvalidUrl {
                call, parse_error, ..
            }) => {
                assert_eq!(call, "post()");
                assert!(parse_error.is_none());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // Relative paths are not absolute URLs.
        assert!(parse_http_url("get()", "/README.md").is_err());
    }
}
