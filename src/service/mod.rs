//! The ephemeral Swarm service: what it runs and how it is driven.
//!
//! - [`TemplateBuilder`] wraps the user command into a [`ServiceTemplate`]
//!   (privileged, restart-disabled, marker-emitting, idling afterwards)
//! - [`DockerCli`] builds the `docker service create/logs/ls/rm` commands

pub mod docker;
pub mod template;

pub use docker::DockerCli;
pub use template::{ServiceTemplate, TemplateBuilder};
