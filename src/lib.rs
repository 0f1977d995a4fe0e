//! Stratus Deploy - stack deployment orchestrator
//!
//! This crate drives an application's infrastructure stack through create,
//! update and teardown, uploads its code artifacts to the provisioned bucket,
//! resolves stack exports for file substitution and fires post-deployment
//! functions.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod naming;
pub mod provider;
pub mod types;

pub use config::{DeployConfig, PollPolicy};
pub use deploy::{DeployError, DeploymentOrchestrator, Providers};
pub use types::*;
