//! The reference runner: executes a frozen workload.
//!
//! Every virtual user is an independent tokio task running its scenario's actions one
//! time, in order. Users are launched at the offsets computed from their scenario's
//! injection steps, see [`injection::schedule`](../injection/fn.schedule.html). All users
//! share one [`reqwest::Client`] and so one connection pool.
//!
//! The run ends when every user has finished. It is canceled early by ctrl-c, or when
//! the `--run-time` expires: users still running are told to exit, any request in flight
//! is aborted, and their remaining actions are counted as skipped.
//!
//! ```rust,no_run
//! use flock::prelude::*;
//!
//! struct BasicSimulation;
//!
//! impl Simulation for BasicSimulation {
//!     fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
//!         let scn = scenario("Basic Example")?
//!             .exec(http("Home")?.get("http://localhost/")?.check(status().is(200)?));
//!         registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FlockError> {
//!     let metrics = Runner::initialize()?
//!         .set_default(RunnerDefault::RunTime, 60)?
//!         .execute_simulation(&BasicSimulation)
//!         .await?;
//!     if metrics.check_failures() > 0 {
//!         std::process::exit(1);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Registering simulations
//!
//! An application can ship several simulations and pick one at run time with
//! `--simulation NAME`. Values passed with `--parameter KEY=VALUE` are handed to the
//! simulation through [`Registry::parameter`](../workload/struct.Registry.html#method.parameter).
//!
//! ```rust,no_run
//! use flock::prelude::*;
//!
//! struct Browse;
//!
//! impl Simulation for Browse {
//!     fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
//!         let url = registry.parameter("url").unwrap_or("http://localhost/").to_string();
//!         let scn = scenario("Browse")?.exec(http("Home")?.get(&url)?);
//!         registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
//!     }
//! }
//!
//! struct Search;
//!
//! impl Simulation for Search {
//!     fn set_up(&self, registry: &mut Registry) -> Result<WorkloadHandle, FlockError> {
//!         let scn = scenario("Search")?.exec(http("Query")?.get("http://localhost/?q=x")?);
//!         registry.set_up(vec![scn.inject_open(vec![at_once_users(1)?])?])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FlockError> {
//!     // cargo run -- --simulation search
//!     Runner::initialize()?
//!         .register_simulation("browse", Browse)?
//!         .register_simulation("search", Search)?
//!         .execute_registered()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use chrono::prelude::*;
use futures::future::join_all;
use gumdrop::Options;
use std::sync::Arc;
use std::time::{self, Duration};
use tokio::task::JoinHandle;

use crate::config::{RunnerConfiguration, RunnerDefaults};
use crate::logger::LoggerMessage;
use crate::metrics::{FlockMetric, RunMetrics};
use crate::scenario::Scenario;
use crate::user::{self, UserCommand, VirtualUser};
use crate::util;
use crate::workload::{Registry, Simulation, WorkloadHandle};
use crate::FlockError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// How often the runner wakes to collect metrics and check for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One scheduled user: when to launch it, and which scenario it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Launch {
    offset: Duration,
    scenario: Arc<Scenario>,
}

/// A launched user: its task, and the channel used to tell it to exit.
struct RunningUser {
    handle: JoinHandle<()>,
    commands: flume::Sender<UserCommand>,
}

/// A simulation registered by name with [`Runner::register_simulation`].
type NamedSimulation = (String, Box<dyn Simulation + Send + Sync>);

/// Runs a frozen workload, configured with [`RunnerConfiguration`].
pub struct Runner {
    /// Configuration parsed from the command line, or provided programmatically.
    pub(crate) configuration: RunnerConfiguration,
    /// Programmatic defaults, overridden by the configuration.
    pub(crate) defaults: RunnerDefaults,
    /// Simulations selectable with `--simulation`, in registration order.
    simulations: Vec<NamedSimulation>,
}
impl Runner {
    /// Load configuration from the command line and initialize a [`Runner`].
    ///
    /// Prints the help and exits if `-h` or an invalid option is passed.
    pub fn initialize() -> Result<Runner, FlockError> {
        Ok(Runner {
            configuration: RunnerConfiguration::parse_args_default_or_exit(),
            defaults: RunnerDefaults::default(),
            simulations: Vec::new(),
        })
    }

    /// Initialize a [`Runner`] with an already loaded configuration.
    ///
    /// # Example
    /// ```rust
    /// use flock::prelude::*;
    /// use gumdrop::Options;
    ///
    /// let configuration = RunnerConfiguration::parse_args_default(&["--no-print-metrics"]).unwrap();
    /// let runner = Runner::initialize_with_config(configuration);
    /// assert!(runner.is_ok());
    /// ```
    pub fn initialize_with_config(
        configuration: RunnerConfiguration,
    ) -> Result<Runner, FlockError> {
        Ok(Runner {
            configuration,
            defaults: RunnerDefaults::default(),
            simulations: Vec::new(),
        })
    }

    /// Register a simulation that can be selected with `--simulation NAME`.
    ///
    /// Returns [`FlockError::InvalidArgument`](../enum.FlockError.html#variant.InvalidArgument)
    /// if `name` is empty or already registered.
    pub fn register_simulation<S>(mut self, name: &str, simulation: S) -> Result<Self, FlockError>
    where
        S: Simulation + Send + Sync + 'static,
    {
        trace!("register_simulation({:?})", name);
        if name.is_empty() || self.simulations.iter().any(|(n, _)| n == name) {
            return Err(FlockError::InvalidArgument {
                call: "register_simulation()".to_string(),
                value: name.to_string(),
                detail: "a simulation requires a unique, non-empty name".to_string(),
            });
        }
        self.simulations.push((name.to_string(), Box::new(simulation)));
        Ok(self)
    }

    /// Set up the simulation selected with `--simulation`, then execute its workload.
    ///
    /// The name can be omitted when only one simulation is registered. With `--list`,
    /// the registered simulations are printed before the selected simulation's
    /// scenarios.
    pub async fn execute_registered(mut self) -> Result<RunMetrics, FlockError> {
        let simulations = std::mem::take(&mut self.simulations);
        if self.configuration.list {
            print_simulations(&simulations);
            // Listing alone needs no selection.
            if self.configuration.simulation.is_empty() && simulations.len() != 1 {
                return Ok(RunMetrics::default());
            }
        }
        let simulation = select_simulation(&simulations, &self.configuration.simulation)?;
        self.execute_simulation(&**simulation).await
    }

    /// Set up `simulation` with a fresh [`Registry`] carrying the `--parameter`
    /// values, then execute the workload.
    pub async fn execute_simulation<S: Simulation + ?Sized>(
        self,
        simulation: &S,
    ) -> Result<RunMetrics, FlockError> {
        let mut registry = Registry::with_parameters(self.configuration.parameters()?);
        let workload = simulation.set_up(&mut registry)?;
        self.execute(&workload).await
    }

    /// Execute a frozen workload, returning the metrics of the run.
    pub async fn execute(mut self, workload: &WorkloadHandle) -> Result<RunMetrics, FlockError> {
        self.configuration.configure(&self.defaults);
        self.configuration.validate()?;
        self.configuration.initialize_logger()?;

        // Display scenarios and actions, then exit.
        if self.configuration.list {
            print_list(workload);
            return Ok(RunMetrics::default());
        }

        let launches = launch_plan(workload);
        let client = self.build_client()?;

        // Launch the request logger, if enabled.
        let (logger_handle, logger) = if self.configuration.request_log.is_empty() {
            (None, None)
        } else {
            let (logger_tx, logger_rx) = flume::unbounded::<LoggerMessage>();
            let handle = tokio::spawn(self.configuration.clone().logger_main(logger_rx));
            (Some(handle), Some(logger_tx))
        };

        util::setup_ctrlc_handler();
        util::set_canceled(false);

        let (metrics_tx, metrics_rx) = flume::unbounded::<FlockMetric>();
        let mut metrics = RunMetrics {
            started: Some(Utc::now()),
            display_metrics: !self.configuration.no_print_metrics,
            ..Default::default()
        };
        let run_time = self.configuration.run_time_seconds();
        let started = time::Instant::now();
        info!(
            "launching {} user(s) from {} scenario(s)...",
            launches.len(),
            workload.workload().populations().len()
        );

        let mut pending = launches.into_iter().peekable();
        let mut users: Vec<RunningUser> = Vec::new();
        loop {
            // Launch every user whose offset has been reached.
            while let Some(launch) = pending.next_if(|l| started.elapsed() >= l.offset) {
                let (commands, receiver) = flume::unbounded();
                let virtual_user = VirtualUser {
                    number: users.len(),
                    scenario: launch.scenario,
                    client: client.clone(),
                    channel_to_parent: metrics_tx.clone(),
                    logger: logger.clone(),
                    started,
                };
                users.push(RunningUser {
                    handle: tokio::spawn(user::user_main(virtual_user, receiver)),
                    commands,
                });
            }

            while let Ok(metric) = metrics_rx.try_recv() {
                metrics.record(metric);
            }

            if util::canceled() || util::timer_expired(started, run_time) {
                info!("stopping after {} seconds...", started.elapsed().as_secs());
                for user in &users {
                    // A user that already exited has dropped its receiver.
                    let _ = user.commands.send(UserCommand::Exit);
                }
                metrics.users_not_launched = pending.count();
                break;
            }

            if pending.peek().is_none() && users.iter().all(|u| u.handle.is_finished()) {
                break;
            }

            // Sleep until the next launch, waking regularly to collect metrics.
            let sleep_duration = match pending.peek() {
                Some(next) => next
                    .offset
                    .saturating_sub(started.elapsed())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            tokio::time::sleep(sleep_duration).await;
        }

        metrics.users = users.len();
        let handles: Vec<JoinHandle<()>> = users.into_iter().map(|u| u.handle).collect();
        for result in join_all(handles).await {
            result?;
        }
        while let Ok(metric) = metrics_rx.try_recv() {
            metrics.record(metric);
        }

        // Tell the logger to flush and exit.
        if let (Some(handle), Some(logger)) = (logger_handle, logger) {
            let _ = logger.send(None);
            handle.await??;
        }

        metrics.stopped = Some(Utc::now());
        metrics.duration = started.elapsed().as_secs() as usize;
        metrics.print();

        Ok(metrics)
    }

    fn build_client(&self) -> Result<reqwest::Client, FlockError> {
        Ok(reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .gzip(true)
            .timeout(self.configuration.request_timeout())
            .danger_accept_invalid_certs(self.configuration.accept_invalid_certs)
            .build()?)
    }
}

/// Expand every population into one launch per user, ordered by offset. Users
/// launched at the same offset keep registration order.
fn launch_plan(workload: &WorkloadHandle) -> Vec<Launch> {
    let mut launches = Vec::with_capacity(workload.total_users());
    for population in workload.workload().populations() {
        let scenario = Arc::new(population.scenario().clone());
        launches.extend(population.schedule().into_iter().map(|offset| Launch {
            offset,
            scenario: Arc::clone(&scenario),
        }));
    }
    launches.sort_by_key(|l| l.offset);
    launches
}

/// Find the simulation named `name`, or the only one registered if `name` is empty.
fn select_simulation<'a, T>(
    registered: &'a [(String, T)],
    name: &str,
) -> Result<&'a T, FlockError> {
    let available = || {
        registered
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<&str>>()
            .join(", ")
    };

    if registered.is_empty() {
        return Err(FlockError::InvalidArgument {
            call: "execute_registered()".to_string(),
            value: name.to_string(),
            detail: "no simulation is registered, use register_simulation()".to_string(),
        });
    }

    if name.is_empty() {
        return match registered {
            [(_, simulation)] => Ok(simulation),
            _ => Err(FlockError::InvalidOption {
                option: "`configuration.simulation`".to_string(),
                value: name.to_string(),
                detail: format!(
                    "more than one simulation is registered, select one with --simulation: {}",
                    available()
                ),
            }),
        };
    }

    match registered.iter().find(|(n, _)| n == name) {
        Some((_, simulation)) => {
            info!("simulation = {:?}", name);
            Ok(simulation)
        }
        None => Err(FlockError::InvalidOption {
            option: "`configuration.simulation`".to_string(),
            value: name.to_string(),
            detail: format!("unknown simulation, available: {}", available()),
        }),
    }
}

fn print_simulations(simulations: &[NamedSimulation]) {
    println!("Available simulations:");
    for (name, _) in simulations {
        println!(" - {}", name);
    }
}

fn print_list(workload: &WorkloadHandle) {
    println!("Available scenarios:");
    for population in workload.workload().populations() {
        println!(
            " - {}: {} user(s)",
            population.scenario().name(),
            population.total_users()
        );
        for action in population.scenario().actions() {
            println!("    o {}", action.label());
        }
    }
}
