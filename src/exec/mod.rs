//! Running platform CLI calls as child processes.
//!
//! - [`OutputMultiplexer`]: drains a child's stdout/stderr on two tasks and
//!   echoes them as `OUT:`/`ERR:` lines
//! - [`ServiceLauncher`]: runs `docker service create` through the multiplexer
//!   and turns a non-zero exit into [`SwarmExecError::Launch`]
//!
//! [`SwarmExecError::Launch`]: crate::error::SwarmExecError::Launch

pub mod launcher;
pub mod output;

pub use launcher::{run_streamed, RunOutcome, ServiceLauncher};
pub use output::{CapturedOutput, DrainHandles, OutputMultiplexer, StreamLabel};
