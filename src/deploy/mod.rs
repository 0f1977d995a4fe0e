pub mod error;
pub mod exports;
pub mod hooks;
pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod substitution;
pub mod upload;

pub use error::*;
pub use exports::{ExportResolver, OutputMessage, ResolvedExports, SubstitutionMap};
pub use hooks::{HookOutcome, HookResult, PostDeploymentHookRunner};
pub use lifecycle::{EnsureCreated, StackLifecycleController};
pub use orchestrator::{DeploymentOrchestrator, Providers};
pub use report::{DeployReport, DestroyReport};
pub use substitution::SubstitutionEngine;
pub use upload::{ArtifactPaths, ArtifactUploadCoordinator, FileUploadResult, UploadedArtifact};
