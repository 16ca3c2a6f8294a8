use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwarmExecError {
    #[error("Command '{command}' returned non-zero exit status {}", display_code(.exit_code))]
    Launch {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Cannot wait for completion: {0}")]
    WatchIndefinite(String),

    #[error("Service {name} did not report completion within {waited:?}")]
    WatchTimeout { name: String, waited: Duration },

    #[error("Failed to remove service {name} (exit status {})", display_code(.exit_code))]
    Cleanup {
        name: String,
        exit_code: Option<i32>,
    },

    #[error("Replica query failed: {0}")]
    ReplicaQuery(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown (killed by signal)".to_string(), |c| c.to_string())
}

pub type Result<T> = std::result::Result<T, SwarmExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_names_command_and_code() {
        let err = SwarmExecError::Launch {
            command: "docker service create --name x".to_string(),
            exit_code: Some(125),
        };
        assert_eq!(
            err.to_string(),
            "Command 'docker service create --name x' returned non-zero exit status 125"
        );
    }

    #[test]
    fn missing_exit_code_is_explained() {
        let err = SwarmExecError::Cleanup {
            name: "svc".to_string(),
            exit_code: None,
        };
        assert!(err.to_string().contains("killed by signal"));
    }
}
