use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Result, SwarmExecError};
use crate::exec::output::{DrainHandles, OutputMultiplexer};
use crate::service::{DockerCli, ServiceTemplate};

/// Result of a streamed child process.
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Still-running (or finished) drain tasks of the child's output
    pub drains: DrainHandles,
}

/// Spawn `cmd` with both streams piped into `multiplexer` and wait for the
/// child to exit.
///
/// Returns as soon as the exit status is known. The drain tasks may still be
/// printing at that point; join [`RunOutcome::drains`] if the output matters.
pub async fn run_streamed(
    mut cmd: Command,
    multiplexer: OutputMultiplexer,
    program: &str,
) -> Result<RunOutcome> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| SwarmExecError::Spawn {
        program: program.to_string(),
        source,
    })?;
    let drains = multiplexer.attach(&mut child);
    let status = child.wait().await?;

    Ok(RunOutcome {
        exit_code: status.code(),
        success: status.success(),
        drains,
    })
}

/// Creates the ephemeral service.
///
/// This only runs `docker service create`, which returns once the service is
/// registered; the workload itself keeps running on the nodes afterwards.
/// Even when the call fails the service may already exist, so callers should
/// still clean up.
#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    docker: DockerCli,
    multiplexer: OutputMultiplexer,
}

impl ServiceLauncher {
    pub fn new(docker: DockerCli, echo: bool) -> Self {
        Self {
            docker,
            multiplexer: OutputMultiplexer::new(echo),
        }
    }

    pub async fn launch(&self, template: &ServiceTemplate) -> Result<DrainHandles> {
        let program = self.docker.program();
        tracing::info!(service = %template.name, mode = %template.mode, image = %template.image, "Creating service");

        let outcome = run_streamed(
            self.docker.create_command(template),
            self.multiplexer,
            &program,
        )
        .await?;

        if !outcome.success {
            tracing::warn!(
                service = %template.name,
                exit_code = ?outcome.exit_code,
                "Service creation failed"
            );
            return Err(SwarmExecError::Launch {
                command: template.render(&program),
                exit_code: outcome.exit_code,
            });
        }

        tracing::info!(service = %template.name, "Service created");
        Ok(outcome.drains)
    }
}
