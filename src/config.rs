use std::path::PathBuf;
use std::time::Duration;

use crate::session::ServiceMode;

/// How the platform CLI is invoked and what the workload container runs on.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Docker CLI binary (looked up in PATH when not absolute)
    pub binary: PathBuf,
    /// Image the workload container is started from. Must ship a `docker` CLI
    /// if the user command wants to talk to the bind-mounted socket.
    pub image: String,
    /// Host path of the container-control socket bind-mounted into every task.
    pub socket_path: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            image: "docker:cli".to_string(),
            socket_path: "/var/run/docker.sock".to_string(),
        }
    }
}

/// Completion watching behaviour.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Print non-marker log lines as `LOG:` output while waiting
    pub echo_workload: bool,
    /// Upper bound on the whole watch. `None` waits until every replica reports.
    pub timeout: Option<Duration>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            echo_workload: true,
            timeout: None,
        }
    }
}

/// Everything one invocation needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub docker: DockerConfig,
    pub watch: WatchConfig,
    pub mode: ServiceMode,
    /// Remove the service once the session ends (`--rm`)
    pub remove: bool,
    /// Follow the service logs until every node reports completion (`--logs`)
    pub follow_logs: bool,
    pub verbose: bool,
    /// Suppress echoing of platform CLI output during launch and cleanup
    pub quiet: bool,
    /// Pause before removal so the platform can settle; also the retry delay.
    pub settle_delay: Duration,
    /// How long a cancelled session waits for an in-flight `service create`
    /// before removing the service.
    pub launch_grace: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            docker: DockerConfig::default(),
            watch: WatchConfig::default(),
            mode: ServiceMode::Global,
            remove: false,
            follow_logs: false,
            verbose: false,
            quiet: false,
            settle_delay: Duration::from_secs(1),
            launch_grace: Duration::from_secs(30),
        }
    }
}

impl ExecConfig {
    pub fn new(mode: ServiceMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_docker_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.docker.binary = binary.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.docker.image = image.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    pub fn with_watch_timeout(mut self, timeout: Duration) -> Self {
        self.watch.timeout = Some(timeout);
        self
    }

    /// Whether platform CLI output (create/rm) is echoed with `OUT:`/`ERR:` prefixes.
    pub fn echo_platform_output(&self) -> bool {
        !self.quiet
    }
}
