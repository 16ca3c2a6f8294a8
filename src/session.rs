use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix of every service created by this tool.
pub const SESSION_PREFIX: &str = "swarm-exec";

/// Swarm scheduling mode of the ephemeral service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// One task per node
    Global,
    /// A fixed number of tasks, placed wherever the scheduler likes
    Replicated,
}

impl std::fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceMode::Global => write!(f, "global"),
            ServiceMode::Replicated => write!(f, "replicated"),
        }
    }
}

/// Lifecycle of a session.
///
/// `Init -> Launching -> Running -> [Watching] -> (Completed | Cancelled) -> [Removed]`.
/// Without removal the session ends in `LeftRunning`; the service and its
/// idle containers stay up until someone removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Launching,
    Running,
    Watching,
    Completed,
    Cancelled,
    Removed,
    LeftRunning,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Removed | SessionState::LeftRunning)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        if next == Cancelled {
            return !self.is_terminal() && *self != Cancelled;
        }
        matches!(
            (self, next),
            (Init, Launching)
                | (Launching, Running)
                | (Running, Watching)
                | (Running, Completed)
                | (Watching, Completed)
                | (Completed, Removed)
                | (Completed, LeftRunning)
                | (Cancelled, Removed)
                | (Cancelled, LeftRunning)
                // watch abandoned after an error
                | (Running | Watching, Removed | LeftRunning)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Init => "init",
            SessionState::Launching => "launching",
            SessionState::Running => "running",
            SessionState::Watching => "watching",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Removed => "removed",
            SessionState::LeftRunning => "left_running",
        };
        write!(f, "{}", s)
    }
}

/// Identity of one invocation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub mode: ServiceMode,
    pub command: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(command: impl Into<String>, mode: ServiceMode) -> Self {
        let created_at = Utc::now();
        Self {
            name: generate_session_name(created_at, &mut rand::thread_rng()),
            mode,
            command: command.into(),
            created_at,
        }
    }

    /// Build a session with a fixed name (used when re-attaching or in tests).
    pub fn with_name(
        name: impl Into<String>,
        command: impl Into<String>,
        mode: ServiceMode,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            mode,
            command: command.into(),
            created_at,
        }
    }
}

/// `swarm-exec_<YYYY-MM-DD_HHMMSS>_<8 hex digits>`.
///
/// The timestamp alone only has second resolution, so the random suffix is
/// what keeps two invocations started in the same second apart.
pub fn generate_session_name<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: u32 = rng.gen();
    format!(
        "{}_{}_{:08x}",
        SESSION_PREFIX,
        now.format("%Y-%m-%d_%H%M%S"),
        suffix
    )
}
