//! Optional request log.
//!
//! The request log is enabled with the `--request-log` run-time option, or the
//! [`RunnerDefault::RequestLog`](../config/enum.RunnerDefault.html#variant.RequestLog)
//! default configuration option. When enabled, a logger task is launched and every
//! virtual user gets a channel to it, so request outcomes are written to file without
//! blocking the users. The logger uses Tokio's asynchronous
//! [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html).
//!
//! Each [`RequestMetric`](../metrics/struct.RequestMetric.html) is written as one line
//! of JSON, for example:
//! ```json
//! {"elapsed":3,"user":0,"scenario":"Basic Example","label":"Get README.md","method":"Get","url":"https://raw.githubusercontent.com/steadybit/extension-gatling/refs/heads/main/README.md","status_code":200,"response_time":41,"success":true,"check_failures":[],"error":""}
//! ```

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::RunnerConfiguration;
use crate::metrics::RequestMetric;
use crate::FlockError;

/// Messages sent to the logger task, `None` telling it to flush and exit.
pub(crate) type LoggerMessage = Option<RequestMetric>;

impl RunnerConfiguration {
    /// Logger task, opens the request log and waits for messages from virtual users.
    pub(crate) async fn logger_main(
        self: RunnerConfiguration,
        receiver: flume::Receiver<LoggerMessage>,
    ) -> Result<(), FlockError> {
        let mut request_log = match File::create(&self.request_log).await {
            Ok(f) => {
                info!("writing requests to request_log: {}", &self.request_log);
                BufWriter::with_capacity(64 * 1024, f)
            }
            Err(e) => {
                error!("failed to create request_log ({}): {}", self.request_log, e);
                return Err(e.into());
            }
        };

        // Loop waiting for and writing request logs from virtual users.
        while let Ok(message) = receiver.recv_async().await {
            if let Some(request) = message {
                let formatted_log = match serde_json::to_string(&request) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("failed to serialize request: {}", e);
                        continue;
                    }
                };
                if let Err(e) = request_log
                    .write_all(format!("{}\n", formatted_log).as_ref())
                    .await
                {
                    warn!("failed to write to {}: {}", &self.request_log, e);
                }
            } else {
                // Empty message means it's time to exit.
                break;
            }
        }

        // Cleanup and flush the log to disk.
        info!("flushing request_log: {}", &self.request_log);
        request_log.flush().await?;

        Ok(())
    }
}
