//! Completion protocol between the workload and the controlling process.
//!
//! Each node prints [`COMPLETION_MARKER`] once its command has finished.
//! Nothing else travels back: no exit status, no node identity. Both sides
//! of the contract live here so a structured replacement only touches this
//! module.

/// Literal token a task prints after the user command returns.
pub const COMPLETION_MARKER: &str = "DOCKER_SWARM_COMMAND_STATUS=1";

/// Shell statement that emits the marker.
pub fn marker_statement() -> String {
    format!("echo {}", COMPLETION_MARKER)
}

/// True when a log line carries a node's completion marker.
///
/// `docker service logs` prefixes every line with the task name and node,
/// so this is a substring match rather than an equality check.
pub fn is_completion_marker(line: &str) -> bool {
    line.contains(COMPLETION_MARKER)
}
