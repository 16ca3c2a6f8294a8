use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::WatchConfig;
use crate::error::{Result, SwarmExecError};
use crate::protocol;
use crate::service::DockerCli;
use crate::session::Session;

/// Per-session completion counter.
///
/// `finished` never exceeds `expected`; markers arriving after completion
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionState {
    finished: u32,
    expected: u32,
}

/// What a single log line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Marker,
    Output,
}

impl CompletionState {
    /// Zero expected replicas would mean waiting on a signal that can never
    /// arrive, so it is rejected up front.
    pub fn new(expected: u32) -> Result<Self> {
        if expected == 0 {
            return Err(SwarmExecError::WatchIndefinite(
                "service reports zero expected replicas".to_string(),
            ));
        }
        Ok(Self {
            finished: 0,
            expected,
        })
    }

    pub fn record(&mut self, line: &str) -> LineKind {
        if protocol::is_completion_marker(line) {
            if self.finished < self.expected {
                self.finished += 1;
            }
            LineKind::Marker
        } else {
            LineKind::Output
        }
    }

    pub fn is_complete(&self) -> bool {
        self.finished >= self.expected
    }

    pub fn finished(&self) -> u32 {
        self.finished
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }
}

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Every expected replica printed its marker
    Completed { finished: u32, expected: u32 },
    /// The log stream closed first (service removed underneath us, CLI died)
    StreamClosed { finished: u32, expected: u32 },
}

impl WatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WatchOutcome::Completed { .. })
    }

    pub fn counts(&self) -> (u32, u32) {
        match *self {
            WatchOutcome::Completed { finished, expected }
            | WatchOutcome::StreamClosed { finished, expected } => (finished, expected),
        }
    }
}

/// Feed log lines into `state` until it completes or the stream ends.
///
/// Returns `true` on completion. Non-marker lines are printed as `LOG:`
/// output when `echo` is set.
pub async fn follow_lines<R>(mut reader: R, state: &mut CompletionState, echo: bool) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(false);
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        if state.record(line) == LineKind::Output && echo {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "LOG: {}", line);
            let _ = stdout.flush();
        }

        if state.is_complete() {
            return Ok(true);
        }
    }
}

/// Follows the aggregated service logs until every node has reported.
#[derive(Debug, Clone)]
pub struct CompletionWatcher {
    docker: DockerCli,
    config: WatchConfig,
}

impl CompletionWatcher {
    pub fn new(docker: DockerCli, config: WatchConfig) -> Self {
        Self { docker, config }
    }

    /// Tail `docker service logs --follow` for the session and count markers.
    ///
    /// The replica count is queried once, after the follow has started. If it
    /// cannot be obtained or is zero the watch fails immediately with
    /// [`SwarmExecError::WatchIndefinite`]. With a configured timeout the
    /// whole watch is bounded and fails with [`SwarmExecError::WatchTimeout`].
    pub async fn watch(&self, session: &Session) -> Result<WatchOutcome> {
        let mut child = self
            .docker
            .logs_follow_command(&session.name)
            .spawn()
            .map_err(|source| SwarmExecError::Spawn {
                program: self.docker.program(),
                source,
            })?;

        let expected = match self.docker.replica_count(&session.name, session.mode).await {
            Ok(n) => n,
            Err(e) => return Err(SwarmExecError::WatchIndefinite(e.to_string())),
        };
        let mut state = CompletionState::new(expected)?;
        tracing::info!(service = %session.name, expected, "Waiting for completion markers");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SwarmExecError::WatchIndefinite("log stream not piped".to_string()))?;
        let reader = BufReader::new(stdout);
        let echo = self.config.echo_workload;

        let completed = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, follow_lines(reader, &mut state, echo))
                .await
                .map_err(|_| SwarmExecError::WatchTimeout {
                    name: session.name.clone(),
                    waited: limit,
                })??,
            None => follow_lines(reader, &mut state, echo).await?,
        };

        // `service logs --follow` never exits by itself
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "Log follower already gone");
        }

        let (finished, expected) = (state.finished(), state.expected());
        if completed {
            println!("Command finished.");
            tracing::info!(service = %session.name, finished, "All replicas reported completion");
            Ok(WatchOutcome::Completed { finished, expected })
        } else {
            tracing::warn!(
                service = %session.name,
                finished,
                expected,
                "Log stream closed before every replica reported"
            );
            Ok(WatchOutcome::StreamClosed { finished, expected })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_line(node: u32) -> String {
        format!("svc.{node}.task@node-{node} | DOCKER_SWARM_COMMAND_STATUS=1\n")
    }

    #[test]
    fn zero_expected_is_rejected() {
        assert!(matches!(
            CompletionState::new(0),
            Err(SwarmExecError::WatchIndefinite(_))
        ));
    }

    #[test]
    fn fewer_markers_never_complete() {
        let mut state = CompletionState::new(3).unwrap();
        state.record("hello");
        state.record(&marker_line(1));
        state.record(&marker_line(2));
        assert!(!state.is_complete());
        assert_eq!(state.finished(), 2);
    }

    #[test]
    fn count_clamps_at_expected() {
        let mut state = CompletionState::new(2).unwrap();
        for node in 0..5 {
            assert_eq!(state.record(&marker_line(node)), LineKind::Marker);
        }
        assert!(state.is_complete());
        assert_eq!(state.finished(), 2);
    }

    #[tokio::test]
    async fn follow_stops_at_nth_marker() {
        let input = format!(
            "svc.1 | hi\n{}svc.2 | hi\n{}{}svc.3 | never read\n",
            marker_line(1),
            marker_line(2),
            marker_line(3)
        );
        let mut reader = BufReader::new(input.as_bytes());
        let mut state = CompletionState::new(3).unwrap();

        let completed = follow_lines(&mut reader, &mut state, false).await.unwrap();
        assert!(completed);
        assert_eq!(state.finished(), 3);

        // The line after the third marker is left unread
        let mut rest = String::new();
        reader.read_line(&mut rest).await.unwrap();
        assert_eq!(rest, "svc.3 | never read\n");
    }

    #[tokio::test]
    async fn follow_reports_stream_end_before_completion() {
        let input = format!("{}svc | still working\n", marker_line(1));
        let mut state = CompletionState::new(2).unwrap();
        let completed = follow_lines(BufReader::new(input.as_bytes()), &mut state, false)
            .await
            .unwrap();
        assert!(!completed);
        assert_eq!(state.finished(), 1);
    }

    #[tokio::test]
    async fn duplicate_markers_complete_once() {
        let input = marker_line(1).repeat(4);
        let mut reader = BufReader::new(input.as_bytes());
        let mut state = CompletionState::new(2).unwrap();

        assert!(follow_lines(&mut reader, &mut state, false).await.unwrap());
        assert_eq!(state.finished(), 2);
        // Two duplicates remain in the stream; nothing consumed them
        let mut rest = String::new();
        reader.read_line(&mut rest).await.unwrap();
        assert!(protocol::is_completion_marker(&rest));
    }

    #[test]
    fn outcome_counts() {
        let outcome = WatchOutcome::StreamClosed {
            finished: 1,
            expected: 3,
        };
        assert!(!outcome.is_completed());
        assert_eq!(outcome.counts(), (1, 3));
    }
}
