use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Result, SwarmExecError};
use crate::exec::{run_streamed, OutputMultiplexer};
use crate::service::DockerCli;

/// Phrases the Docker CLI uses when the service is already gone.
const NOT_FOUND_HINTS: [&str; 2] = ["no such service", "not found"];

/// Result of a cleanup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// This call removed the service
    Removed,
    /// The service was removed earlier, by us or by someone else
    AlreadyRemoved,
}

enum Attempt {
    Removed,
    NotFound,
    Failed(Option<i32>),
}

/// Owns the teardown of one session's service.
///
/// `cleanup` may be called any number of times from any task; at most one
/// removal actually runs; later callers wait for it and get
/// [`CleanupOutcome::AlreadyRemoved`].
#[derive(Debug)]
pub struct CleanupController {
    docker: DockerCli,
    name: String,
    multiplexer: OutputMultiplexer,
    retry_delay: Duration,
    done: Mutex<bool>,
}

impl CleanupController {
    pub fn new(docker: DockerCli, name: impl Into<String>, echo: bool, retry_delay: Duration) -> Self {
        Self {
            docker,
            name: name.into(),
            multiplexer: OutputMultiplexer::new(echo),
            retry_delay,
            done: Mutex::new(false),
        }
    }

    /// Remove the service, retrying once after `retry_delay` on failure.
    pub async fn cleanup(&self) -> Result<CleanupOutcome> {
        let mut done = self.done.lock().await;
        if *done {
            tracing::debug!(service = %self.name, "Cleanup already done");
            return Ok(CleanupOutcome::AlreadyRemoved);
        }

        let outcome = match self.remove_once().await? {
            Attempt::Removed => CleanupOutcome::Removed,
            Attempt::NotFound => CleanupOutcome::AlreadyRemoved,
            Attempt::Failed(code) => {
                tracing::warn!(service = %self.name, exit_code = ?code, "Service removal failed, retrying once");
                tokio::time::sleep(self.retry_delay).await;
                match self.remove_once().await? {
                    Attempt::Removed => CleanupOutcome::Removed,
                    Attempt::NotFound => CleanupOutcome::AlreadyRemoved,
                    Attempt::Failed(exit_code) => {
                        return Err(SwarmExecError::Cleanup {
                            name: self.name.clone(),
                            exit_code,
                        })
                    }
                }
            }
        };

        *done = true;
        tracing::info!(service = %self.name, outcome = ?outcome, "Cleanup finished");
        Ok(outcome)
    }

    async fn remove_once(&self) -> Result<Attempt> {
        let outcome = run_streamed(
            self.docker.remove_command(&self.name),
            self.multiplexer,
            &self.docker.program(),
        )
        .await?;
        // rm prints a line or two; wait for them so the hints can be checked
        let captured = outcome.drains.join().await;

        if outcome.success {
            Ok(Attempt::Removed)
        } else if NOT_FOUND_HINTS.iter().any(|hint| captured.mentions(hint)) {
            Ok(Attempt::NotFound)
        } else {
            Ok(Attempt::Failed(outcome.exit_code))
        }
    }
}
