use std::sync::Arc;
use std::time;

use crate::action::{Action, HttpRequest};
use crate::logger::LoggerMessage;
use crate::metrics::{FlockMetric, RequestMetric, UserMetric};
use crate::scenario::Scenario;

/// Commands sent from the runner to virtual users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UserCommand {
    /// Tell the user to stop, skipping any actions it has not run yet.
    Exit,
}

/// Everything one virtual user needs to run its scenario.
pub(crate) struct VirtualUser {
    /// A unique number identifying this user within the run.
    pub(crate) number: usize,
    /// The scenario this user runs, shared read-only with every other user of it.
    pub(crate) scenario: Arc<Scenario>,
    /// A clone of the runner's client, sharing its connection pool.
    pub(crate) client: reqwest::Client,
    /// Channel used to send metrics to the runner.
    pub(crate) channel_to_parent: flume::Sender<FlockMetric>,
    /// Channel to the logger task, when the request log is enabled.
    pub(crate) logger: Option<flume::Sender<LoggerMessage>>,
    /// When the run started.
    pub(crate) started: time::Instant,
}

/// The result of running one action.
enum Outcome {
    Completed,
    Canceled,
}

pub(crate) async fn user_main(user: VirtualUser, receiver: flume::Receiver<UserCommand>) {
    info!(
        "launching user {} from {}...",
        user.number,
        user.scenario.name()
    );

    let actions = user.scenario.actions();
    let mut executed = 0;
    let mut canceled = false;
    for action in actions {
        if received_exit(&receiver) {
            canceled = true;
            break;
        }
        debug!(
            "[user {}]: launching {} action from {}",
            user.number,
            action.label(),
            user.scenario.name()
        );
        let outcome = match action {
            Action::HttpRequest(request) => invoke_request(&user, request, &receiver).await,
        };
        match outcome {
            Outcome::Completed => executed += 1,
            Outcome::Canceled => {
                canceled = true;
                break;
            }
        }
    }

    let skipped = actions.len() - executed;
    if skipped > 0 {
        info!(
            "user {} from {} canceled, skipping {} action(s)",
            user.number,
            user.scenario.name(),
            skipped
        );
    }
    // Best effort metrics.
    let _ = user.channel_to_parent.send(FlockMetric::User(UserMetric {
        user: user.number,
        scenario: user.scenario.name().to_string(),
        executed,
        skipped,
        canceled,
    }));

    info!(
        "exiting user {} from {}...",
        user.number,
        user.scenario.name()
    );
}

// Determine if the runner has sent a UserCommand::Exit message.
fn received_exit(receiver: &flume::Receiver<UserCommand>) -> bool {
    while let Ok(command) = receiver.try_recv() {
        match command {
            UserCommand::Exit => return true,
        }
    }
    false
}

// Make the request, read the whole body, then evaluate every check. An exit command
// received while waiting aborts the request, which is then not recorded.
async fn invoke_request(
    user: &VirtualUser,
    request: &HttpRequest,
    receiver: &flume::Receiver<UserCommand>,
) -> Outcome {
    let mut metric = RequestMetric::new(
        user.scenario.name(),
        request,
        user.started.elapsed().as_millis(),
        user.number,
    );
    let request_builder = user
        .client
        .request(request.method().into(), request.url().clone());

    let started = time::Instant::now();
    let send = async {
        let response = request_builder.send().await?;
        let status = response.status();
        response.bytes().await?;
        Ok::<_, reqwest::Error>(status)
    };
    let result = tokio::select! {
        result = send => result,
        _ = receiver.recv_async() => {
            debug!(
                "[user {}]: aborting in-flight request {}",
                user.number,
                request.label()
            );
            return Outcome::Canceled;
        }
    };
    metric.set_response_time(started.elapsed().as_millis());

    match result {
        Ok(status) => {
            metric.set_status_code(Some(status));
            for check in request.checks() {
                if let Err(failure) = check.evaluate(status) {
                    warn!(
                        "{} / {}: check failed: {}",
                        user.scenario.name(),
                        request.label(),
                        failure
                    );
                    metric.add_check_failure(failure);
                }
            }
        }
        Err(e) => {
            warn!(
                "{} / {}: request failed: {}",
                user.scenario.name(),
                request.label(),
                e
            );
            metric.set_status_code(e.status());
            metric.set_error(&e.to_string());
        }
    }

    // If the request log is enabled, send a copy of the metric to the logger task.
    if let Some(logger) = user.logger.as_ref() {
        if let Err(e) = logger.send(Some(metric.clone())) {
            warn!("failed to send request to logger: {}", e);
        }
    }

    // Best effort metrics.
    let _ = user.channel_to_parent.send(FlockMetric::Request(metric));

    Outcome::Completed
}
