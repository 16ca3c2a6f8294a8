use std::borrow::Cow;

use crate::config::DockerConfig;
use crate::protocol;
use crate::session::{ServiceMode, Session};

/// Keeps the container alive after the command so its logs stay readable
/// until the service is removed.
pub const IDLE_TAIL: &str = "while true; do sleep 3600; done";

/// A fully built `docker service create` invocation.
///
/// # Privileges
///
/// Every task runs with `--cap-add=ALL` and the host's Docker socket
/// bind-mounted at the same path, so the user command has root-equivalent
/// control over the node and can drive the Docker API itself. This grant is
/// intentional and always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTemplate {
    pub name: String,
    pub mode: ServiceMode,
    pub image: String,
    pub socket_path: String,
    /// The `sh -c` script each task runs
    pub script: String,
}

impl ServiceTemplate {
    /// Arguments passed to the Docker CLI, starting at `service create`.
    pub fn args(&self) -> Vec<String> {
        vec![
            "service".to_string(),
            "create".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--mode".to_string(),
            self.mode.to_string(),
            "--cap-add=ALL".to_string(),
            "--mount".to_string(),
            format!(
                "type=bind,source={},target={}",
                self.socket_path, self.socket_path
            ),
            "--restart-condition".to_string(),
            "none".to_string(),
            self.image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            self.script.clone(),
        ]
    }

    /// Shell-quoted rendering of the full command line, for display.
    pub fn render(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.args())
            .map(|arg| shell_escape::escape(Cow::Owned(arg)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds the wrapped workload for a session.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    docker: DockerConfig,
}

impl TemplateBuilder {
    pub fn new(docker: DockerConfig) -> Self {
        Self { docker }
    }

    pub fn build(&self, session: &Session) -> ServiceTemplate {
        ServiceTemplate {
            name: session.name.clone(),
            mode: session.mode,
            image: self.docker.image.clone(),
            socket_path: self.docker.socket_path.clone(),
            script: wrap_command(&session.command),
        }
    }
}

/// `(<command>) ; echo <marker> && <idle tail>`
///
/// The user command runs in a subshell on its own lines so that `exit`, a
/// trailing comment or a failing status cannot skip the marker.
pub fn wrap_command(command: &str) -> String {
    format!(
        "(\n{}\n) ; {} && {}",
        command,
        protocol::marker_statement(),
        IDLE_TAIL
    )
}
