use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::cleanup::{CleanupController, CleanupOutcome};
use crate::config::ExecConfig;
use crate::error::{Result, SwarmExecError};
use crate::exec::{DrainHandles, ServiceLauncher};
use crate::service::{DockerCli, TemplateBuilder};
use crate::session::{Session, SessionState};
use crate::watcher::CompletionWatcher;

/// What happened to a session, printed as JSON with `--output json`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    #[serde(flatten)]
    pub session: Session,
    pub state: SessionState,
    pub cancelled: bool,
    /// Set when `docker service create` exited non-zero. Not fatal.
    pub launch_error: Option<String>,
    pub finished: Option<u32>,
    pub expected: Option<u32>,
    pub cleanup: Option<CleanupOutcome>,
    /// Watch or cleanup failure. Makes the process exit non-zero.
    pub error: Option<String>,
}

impl SessionReport {
    fn new(session: Session) -> Self {
        Self {
            session,
            state: SessionState::Init,
            cancelled: false,
            launch_error: None,
            finished: None,
            expected: None,
            cleanup: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

type LaunchTask = JoinHandle<Result<DrainHandles>>;

/// Drives one session through its lifecycle.
///
/// ## Phases
/// 1. **Launch**: build the template and run `docker service create`. A failed
///    create is printed and the session carries on, since the service may
///    exist anyway and still needs watching or removing.
/// 2. **Watch** (`--logs`): count completion markers until every replica has
///    reported.
/// 3. **Remove** (`--rm`, or after cancellation): tear the service down once.
///
/// Phases 1 and 2 race the cancellation token. When it fires the watch is
/// dropped (the log follower with it) and removal runs regardless of `--rm`.
/// The create call runs on its own task and is never dropped: a cancelled
/// session waits up to `launch_grace` for it to exit first, otherwise the
/// removal could run before the service exists. Removal itself is never
/// interrupted.
pub struct SessionOrchestrator {
    config: ExecConfig,
    session: Session,
    state: SessionState,
    docker: DockerCli,
    cleanup: CleanupController,
}

impl SessionOrchestrator {
    pub fn new(command: impl Into<String>, config: ExecConfig) -> Self {
        let session = Session::new(command, config.mode);
        Self::with_session(session, config)
    }

    pub fn with_session(session: Session, config: ExecConfig) -> Self {
        let docker = DockerCli::new(config.docker.binary.clone());
        let cleanup = CleanupController::new(
            docker.clone(),
            session.name.clone(),
            config.echo_platform_output(),
            config.settle_delay,
        );
        Self {
            config,
            session,
            state: SessionState::Init,
            docker,
            cleanup,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn run(mut self, cancel: CancellationToken) -> SessionReport {
        let mut report = SessionReport::new(self.session.clone());
        let mut launch: Option<LaunchTask> = None;

        let cancelled = tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = self.run_phases(&mut report, &mut launch) => false,
        };

        if cancelled {
            self.transition(SessionState::Cancelled);
            report.cancelled = true;
            if self.config.verbose {
                println!("Cleaning up...");
            }
            if let Some(task) = launch.take() {
                self.settle_launch(task, &mut report).await;
            }
        }

        if cancelled || self.config.remove {
            if !cancelled {
                tokio::time::sleep(self.config.settle_delay).await;
            }
            if self.config.verbose {
                println!("Removing service: {}", self.session.name);
            }
            match self.cleanup.cleanup().await {
                Ok(outcome) => {
                    report.cleanup = Some(outcome);
                    self.transition(SessionState::Removed);
                }
                Err(e) => {
                    println!("{}", e);
                    report.error.get_or_insert_with(|| e.to_string());
                    self.transition(SessionState::LeftRunning);
                }
            }
        } else {
            self.transition(SessionState::LeftRunning);
        }

        report.state = self.state;
        report
    }

    async fn run_phases(&mut self, report: &mut SessionReport, launch: &mut Option<LaunchTask>) {
        let template = TemplateBuilder::new(self.config.docker.clone()).build(&self.session);
        if self.config.verbose && !self.config.quiet {
            self.print_banner(&template.render(&self.docker.program()));
        }

        self.transition(SessionState::Launching);
        let launcher = ServiceLauncher::new(self.docker.clone(), self.config.echo_platform_output());
        let task = launch.insert(tokio::spawn(async move { launcher.launch(&template).await }));
        let joined = task.await;
        *launch = None;
        self.record_launch(joined, report);
        self.transition(SessionState::Running);

        if self.config.follow_logs {
            self.transition(SessionState::Watching);
            let watcher = CompletionWatcher::new(self.docker.clone(), self.config.watch.clone());
            match watcher.watch(&self.session).await {
                Ok(outcome) => {
                    let (finished, expected) = outcome.counts();
                    report.finished = Some(finished);
                    report.expected = Some(expected);
                    if !outcome.is_completed() {
                        report.error = Some(format!(
                            "log stream closed after {} of {} replicas reported",
                            finished, expected
                        ));
                        return;
                    }
                }
                Err(e) => {
                    println!("{}", e);
                    report.error = Some(e.to_string());
                    return;
                }
            }
        }

        self.transition(SessionState::Completed);
    }

    /// Wait for an interrupted create call so removal does not race it.
    async fn settle_launch(&self, task: LaunchTask, report: &mut SessionReport) {
        tracing::info!(service = %self.session.name, "Waiting for service create before removal");
        match tokio::time::timeout(self.config.launch_grace, task).await {
            Ok(joined) => self.record_launch(joined, report),
            Err(_) => tracing::warn!(
                service = %self.session.name,
                grace = ?self.config.launch_grace,
                "Service create still running, removing anyway"
            ),
        }
    }

    fn record_launch(
        &self,
        joined: std::result::Result<Result<DrainHandles>, JoinError>,
        report: &mut SessionReport,
    ) {
        match joined {
            // Launch output keeps draining in the background; it is not awaited
            Ok(Ok(drains)) => {
                tracing::debug!(
                    service = %self.session.name,
                    drained = drains.is_finished(),
                    "Service create exited"
                );
            }
            Ok(Err(e @ SwarmExecError::Launch { .. })) => {
                println!("{}", e);
                report.launch_error = Some(e.to_string());
            }
            Ok(Err(e)) => {
                println!("{}", e);
                tracing::error!(service = %self.session.name, error = %e, "Could not run service create");
                report.launch_error = Some(e.to_string());
            }
            Err(e) => {
                tracing::error!(service = %self.session.name, error = %e, "Service create task failed");
                report.launch_error = Some(e.to_string());
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(service = %self.session.name, from = %self.state, to = %next, "Unexpected state transition");
        }
        tracing::debug!(service = %self.session.name, from = %self.state, to = %next, "Session state");
        if self.config.verbose {
            println!("[{}] {} -> {}", self.session.name, self.state, next);
        }
        self.state = next;
    }

    fn print_banner(&self, rendered: &str) {
        let rule = "#".repeat(80);
        println!("{}", rule);
        println!("Executing command: {}", self.session.command);
        println!("{}", rule);
        println!("Template command:\n{}", rendered);
        println!("{}", rule);
    }
}
