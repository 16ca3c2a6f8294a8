pub mod cleanup;
pub mod config;
pub mod error;
pub mod exec;
pub mod orchestrator;
pub mod protocol;
pub mod service;
pub mod session;
pub mod shutdown;
pub mod watcher;

pub use error::{Result, SwarmExecError};
pub use orchestrator::{SessionOrchestrator, SessionReport};
