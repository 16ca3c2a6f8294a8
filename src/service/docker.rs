use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Result, SwarmExecError};
use crate::service::template::ServiceTemplate;
use crate::session::ServiceMode;

/// Thin wrapper around the Docker CLI's `service` verbs.
///
/// Only builds commands and parses the one answer we need back (the replica
/// count). Running them and streaming their output is the caller's job.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn program(&self) -> String {
        self.binary.display().to_string()
    }

    fn base(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// `docker service create ...` for the given template.
    pub fn create_command(&self, template: &ServiceTemplate) -> Command {
        let mut cmd = self.base();
        cmd.args(template.args());
        cmd
    }

    /// `docker service logs <name> --follow`, stdout piped.
    ///
    /// The follow never ends on its own, so the child is killed when its
    /// handle is dropped.
    pub fn logs_follow_command(&self, name: &str) -> Command {
        let mut cmd = self.base();
        cmd.args(["service", "logs", name, "--follow"])
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    /// `docker service rm <name>`.
    pub fn remove_command(&self, name: &str) -> Command {
        let mut cmd = self.base();
        cmd.args(["service", "rm", name]);
        cmd
    }

    /// Desired replica count of the service, as reported by `docker service ls`.
    ///
    /// In global mode this equals the number of eligible nodes.
    pub async fn replica_count(&self, name: &str, mode: ServiceMode) -> Result<u32> {
        let name_filter = format!("name={}", name);
        let mode_filter = format!("mode={}", mode);
        let output = self
            .base()
            .args([
                "service",
                "ls",
                "--filter",
                name_filter.as_str(),
                "--filter",
                mode_filter.as_str(),
                "--format",
                "{{.Replicas}}",
            ])
            .output()
            .await
            .map_err(|source| SwarmExecError::Spawn {
                program: self.program(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SwarmExecError::ReplicaQuery(format!(
                "service ls exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let replicas = parse_replicas(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(service = name, mode = %mode, replicas, "Queried replica count");
        Ok(replicas)
    }
}

/// Parse the `{{.Replicas}}` column (`running/desired`, optionally followed by
/// a note such as `(max 1 per node)`) and return the desired count.
pub fn parse_replicas(output: &str) -> Result<u32> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SwarmExecError::ReplicaQuery("service not listed".to_string()))?;

    let desired = line
        .split_once('/')
        .map(|(_, rest)| rest)
        .ok_or_else(|| SwarmExecError::ReplicaQuery(format!("unexpected replicas '{}'", line)))?;

    let digits: String = desired
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits
        .parse()
        .map_err(|_| SwarmExecError::ReplicaQuery(format!("unexpected replicas '{}'", line)))
}
