//! Functions and structures related to configuring the reference runner.
//!
//! The runner can be configured at run time by passing in the options and flags defined
//! by the [`RunnerConfiguration`] structure.
//!
//! The runner can be configured programmatically with [`RunnerDefaultType::set_default`].
//! An option passed at run time always wins over a programmatic default.

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::Runner;
use crate::util;
use crate::FlockError;

/// Request timeout used when none is configured.
const DEFAULT_TIMEOUT: &str = "60";

/// Runtime options available when running a workload with the reference runner.
///
/// Custom defaults can be programmatically set for these options using
/// [`RunnerDefaultType::set_default`].
///
/// Help is generated for all of these options by passing a `-h` flag to an application
/// built with Flock. Flock leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive the
/// help from the below structure.
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"Flock runs declarative HTTP(S) workloads.

The following runtime options are available when running a workload:"#
)]
pub struct RunnerConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Lists all simulations and scenarios and exits
    #[options(short = "l")]
    pub list: bool,
    /// Selects the simulation to run, if more than one is registered
    #[options(no_short, meta = "NAME")]
    pub simulation: String,
    /// Passes a parameter to the simulation (repeatable)
    // Add a blank line after this option
    #[options(
        short = "p",
        meta = "KEY=VALUE",
        help = "Passes a parameter to the simulation (repeatable)\n"
    )]
    pub parameter: Vec<String>,

    /// Cancels the run after (30s, 20m, 3h, 1h30m, etc)
    #[options(short = "t", meta = "TIME")]
    pub run_time: String,
    /// Sets per-request timeout (default: 60s)
    #[options(no_short, meta = "TIME")]
    pub timeout: String,
    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        // Add a blank line and then a 'Metrics:' header after this option
        help = "Increases verbosity (-v, -vv, etc)\n\nMetrics:"
    )]
    pub verbose: u8,

    /// Sets request log file name, one JSON object per line
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Doesn't display metrics at end of run
    // Add a blank line and then an 'Advanced:' header after this option
    #[options(no_short, help = "Doesn't display metrics at end of run\n\nAdvanced:")]
    pub no_print_metrics: bool,
    /// Disables validation of https certificates
    #[options(no_short)]
    pub accept_invalid_certs: bool,
}

/// Optional default values for runner options, set with
/// [`RunnerDefaultType::set_default`].
#[derive(Clone, Debug, Default)]
pub(crate) struct RunnerDefaults {
    /// An optional default run time.
    pub run_time: Option<usize>,
    /// An optional default request timeout.
    pub timeout: Option<String>,
    /// An optional default log file name.
    pub log_file: Option<String>,
    /// An optional default log file level.
    pub log_level: Option<u8>,
    /// An optional default quiet level.
    pub quiet: Option<u8>,
    /// An optional default verbosity level.
    pub verbose: Option<u8>,
    /// An optional default request log file name.
    pub request_log: Option<String>,
    /// An optional default for not displaying metrics at the end of the run.
    pub no_print_metrics: Option<bool>,
    /// An optional default for accepting invalid certificates.
    pub accept_invalid_certs: Option<bool>,
}

/// Keys for the runner options that can have a programmatic default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerDefault {
    /// An optional default number of seconds before the run is canceled.
    RunTime,
    /// An optional default request timeout (30s, 2m, etc).
    Timeout,
    /// An optional default log file name.
    LogFile,
    /// An optional default log file level.
    LogLevel,
    /// An optional default quiet level.
    Quiet,
    /// An optional default verbosity level.
    Verbose,
    /// An optional default request log file name.
    RequestLog,
    /// An optional default for not displaying metrics at the end of the run.
    NoPrintMetrics,
    /// An optional default for accepting invalid https certificates.
    AcceptInvalidCerts,
}

impl fmt::Display for RunnerDefault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RunnerDefault::{:?}", self)
    }
}

/// Set a programmatic default for a [`RunnerDefault`] key.
///
/// # Example
/// ```rust
/// use flock::prelude::*;
///
/// fn main() -> Result<(), FlockError> {
///     let configuration = RunnerConfiguration::default();
///     let _runner = Runner::initialize_with_config(configuration)?
///         .set_default(RunnerDefault::Timeout, "30s")?
///         .set_default(RunnerDefault::RunTime, 120)?
///         .set_default(RunnerDefault::NoPrintMetrics, true)?;
///
///     Ok(())
/// }
/// ```
pub trait RunnerDefaultType<T> {
    /// Set `key` to `value`, failing if `key` does not accept this type of value.
    fn set_default(self, key: RunnerDefault, value: T) -> Result<Self, FlockError>
    where
        Self: Sized;
}
impl RunnerDefaultType<&str> for Runner {
    fn set_default(mut self, key: RunnerDefault, value: &str) -> Result<Self, FlockError> {
        match key {
            RunnerDefault::Timeout => self.defaults.timeout = Some(value.to_string()),
            RunnerDefault::LogFile => self.defaults.log_file = Some(value.to_string()),
            RunnerDefault::RequestLog => self.defaults.request_log = Some(value.to_string()),
            RunnerDefault::RunTime
            | RunnerDefault::LogLevel
            | RunnerDefault::Quiet
            | RunnerDefault::Verbose => {
                return Err(wrong_type(key, value, "usize", "&str"));
            }
            RunnerDefault::NoPrintMetrics | RunnerDefault::AcceptInvalidCerts => {
                return Err(wrong_type(key, value, "bool", "&str"));
            }
        }
        Ok(self)
    }
}
impl RunnerDefaultType<usize> for Runner {
    fn set_default(mut self, key: RunnerDefault, value: usize) -> Result<Self, FlockError> {
        match key {
            RunnerDefault::RunTime => self.defaults.run_time = Some(value),
            RunnerDefault::LogLevel => self.defaults.log_level = Some(counted_level(key, value)?),
            RunnerDefault::Quiet => self.defaults.quiet = Some(counted_level(key, value)?),
            RunnerDefault::Verbose => self.defaults.verbose = Some(counted_level(key, value)?),
            RunnerDefault::Timeout | RunnerDefault::LogFile | RunnerDefault::RequestLog => {
                return Err(wrong_type(key, value, "&str", "usize"));
            }
            RunnerDefault::NoPrintMetrics | RunnerDefault::AcceptInvalidCerts => {
                return Err(wrong_type(key, value, "bool", "usize"));
            }
        }
        Ok(self)
    }
}
impl RunnerDefaultType<bool> for Runner {
    fn set_default(mut self, key: RunnerDefault, value: bool) -> Result<Self, FlockError> {
        match key {
            RunnerDefault::NoPrintMetrics => self.defaults.no_print_metrics = Some(value),
            RunnerDefault::AcceptInvalidCerts => self.defaults.accept_invalid_certs = Some(value),
            RunnerDefault::Timeout | RunnerDefault::LogFile | RunnerDefault::RequestLog => {
                return Err(wrong_type(key, value, "&str", "bool"));
            }
            RunnerDefault::RunTime
            | RunnerDefault::LogLevel
            | RunnerDefault::Quiet
            | RunnerDefault::Verbose => {
                return Err(wrong_type(key, value, "usize", "bool"));
            }
        }
        Ok(self)
    }
}

fn wrong_type<V: fmt::Display>(
    key: RunnerDefault,
    value: V,
    expected: &str,
    received: &str,
) -> FlockError {
    FlockError::InvalidOption {
        option: key.to_string(),
        value: value.to_string(),
        detail: format!(
            "set_default({}, {}) expected {} value, received {}",
            key, value, expected, received
        ),
    }
}

// Levels are counted flags, stored as u8.
fn counted_level(key: RunnerDefault, value: usize) -> Result<u8, FlockError> {
    u8::try_from(value).map_err(|_| FlockError::InvalidOption {
        option: key.to_string(),
        value: value.to_string(),
        detail: format!(
            "set_default({}, {}) expected a value no greater than {}",
            key,
            value,
            u8::MAX
        ),
    })
}

/// One candidate for a configuration value, in order of precedence.
pub(crate) struct RunnerValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Skip this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level log message.
    pub(crate) message: &'a str,
}

/// Return the first candidate that is set and not filtered.
pub(crate) fn get_value<T: fmt::Debug>(values: Vec<RunnerValue<T>>) -> Option<T> {
    for value in values {
        if let Some(v) = value.value {
            if value.filter {
                continue;
            }
            if !value.message.is_empty() {
                info!("{} = {:?}", value.message, v)
            }
            return Some(v);
        }
    }
    None
}

impl RunnerConfiguration {
    /// Implement precedence rules for all [`RunnerConfiguration`] values: a run-time
    /// option wins over a programmatic default, which wins over the built-in default.
    pub(crate) fn configure(&mut self, defaults: &RunnerDefaults) {
        // Configure `quiet`.
        self.quiet = get_value(vec![
            RunnerValue {
                value: Some(self.quiet),
                filter: self.quiet == 0,
                message: "",
            },
            RunnerValue {
                value: defaults.quiet,
                filter: defaults.quiet.is_none(),
                message: "",
            },
        ])
        .unwrap_or(0);

        // Configure `verbose`.
        self.verbose = get_value(vec![
            RunnerValue {
                value: Some(self.verbose),
                filter: self.verbose == 0,
                message: "",
            },
            RunnerValue {
                value: defaults.verbose,
                filter: defaults.verbose.is_none(),
                message: "",
            },
        ])
        .unwrap_or(0);

        // Configure `log_level`.
        self.log_level = get_value(vec![
            RunnerValue {
                value: Some(self.log_level),
                filter: self.log_level == 0,
                message: "",
            },
            RunnerValue {
                value: defaults.log_level,
                filter: defaults.log_level.is_none(),
                message: "",
            },
        ])
        .unwrap_or(0);

        // Configure `log_file`.
        self.log_file = get_value(vec![
            RunnerValue {
                value: Some(self.log_file.to_string()),
                filter: self.log_file.is_empty(),
                message: "",
            },
            RunnerValue {
                value: defaults.log_file.clone(),
                filter: defaults.log_file.is_none(),
                message: "",
            },
        ])
        .unwrap_or_default();

        // Configure `run_time`.
        self.run_time = get_value(vec![
            RunnerValue {
                value: Some(self.run_time.to_string()),
                filter: self.run_time.is_empty(),
                message: "run_time",
            },
            RunnerValue {
                value: defaults.run_time.map(|r| r.to_string()),
                filter: defaults.run_time.is_none(),
                message: "run_time",
            },
        ])
        .unwrap_or_else(|| "0".to_string());

        // Configure `timeout`.
        self.timeout = get_value(vec![
            RunnerValue {
                value: Some(self.timeout.to_string()),
                filter: self.timeout.is_empty(),
                message: "timeout",
            },
            RunnerValue {
                value: defaults.timeout.clone(),
                filter: defaults.timeout.is_none(),
                message: "timeout",
            },
        ])
        .unwrap_or_else(|| DEFAULT_TIMEOUT.to_string());

        // Configure `request_log`.
        self.request_log = get_value(vec![
            RunnerValue {
                value: Some(self.request_log.to_string()),
                filter: self.request_log.is_empty(),
                message: "request_log",
            },
            RunnerValue {
                value: defaults.request_log.clone(),
                filter: defaults.request_log.is_none(),
                message: "request_log",
            },
        ])
        .unwrap_or_default();

        // Configure `no_print_metrics`.
        self.no_print_metrics = get_value(vec![
            RunnerValue {
                value: Some(self.no_print_metrics),
                filter: !self.no_print_metrics,
                message: "no_print_metrics",
            },
            RunnerValue {
                value: defaults.no_print_metrics,
                filter: defaults.no_print_metrics.is_none(),
                message: "no_print_metrics",
            },
        ])
        .unwrap_or(false);

        // Configure `accept_invalid_certs`.
        self.accept_invalid_certs = get_value(vec![
            RunnerValue {
                value: Some(self.accept_invalid_certs),
                filter: !self.accept_invalid_certs,
                message: "accept_invalid_certs",
            },
            RunnerValue {
                value: defaults.accept_invalid_certs,
                filter: defaults.accept_invalid_certs.is_none(),
                message: "accept_invalid_certs",
            },
        ])
        .unwrap_or(false);
    }

    /// Validate configured [`RunnerConfiguration`] values.
    pub(crate) fn validate(&self) -> Result<(), FlockError> {
        if !util::is_timespan(&self.run_time) {
            return Err(FlockError::InvalidOption {
                option: "`configuration.run_time`".to_string(),
                value: self.run_time.to_string(),
                detail: "`configuration.run_time` must be a timespan such as 30s, 20m, or 1h30m."
                    .to_string(),
            });
        }

        if !util::is_timespan(&self.timeout) || util::parse_timespan(&self.timeout) == 0 {
            return Err(FlockError::InvalidOption {
                option: "`configuration.timeout`".to_string(),
                value: self.timeout.to_string(),
                detail: "`configuration.timeout` must be at least 1 second.".to_string(),
            });
        }

        if self.quiet > 0 && self.verbose > 0 {
            return Err(FlockError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set together with `configuration.quiet`."
                    .to_string(),
            });
        }

        self.parameters()?;

        Ok(())
    }

    /// The `--parameter` values as a map. A key passed more than once keeps its last
    /// value.
    pub(crate) fn parameters(&self) -> Result<BTreeMap<String, String>, FlockError> {
        let mut parameters = BTreeMap::new();
        for parameter in &self.parameter {
            match parameter.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    parameters.insert(key.trim().to_string(), value.to_string());
                }
                _ => {
                    return Err(FlockError::InvalidOption {
                        option: "`configuration.parameter`".to_string(),
                        value: parameter.to_string(),
                        detail: "`configuration.parameter` must be formatted as KEY=VALUE."
                            .to_string(),
                    });
                }
            }
        }
        Ok(parameters)
    }

    /// The configured run time in seconds, 0 meaning the run is never canceled.
    pub(crate) fn run_time_seconds(&self) -> usize {
        util::parse_timespan(&self.run_time)
    }

    /// The configured per-request timeout.
    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(util::parse_timespan(&self.timeout) as u64)
    }

    /// Initialize the logger which writes to standard out and optionally to a log file.
    pub(crate) fn initialize_logger(&self) -> Result<(), FlockError> {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                1 => LevelFilter::Warn,
                _ => LevelFilter::Error,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];
        if let Some(log_to_file) = log_file.as_ref() {
            loggers.push(WriteLogger::new(
                log_level,
                Config::default(),
                std::fs::File::create(log_to_file)?,
            ));
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                // Only one logger per process, for example when running tests.
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }

        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }
        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);

        Ok(())
    }
}
