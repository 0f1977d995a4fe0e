use crate::provider::ProviderError;
use crate::types::StackStatus;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The workflow step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    LoadDescriptor,
    CreateStack,
    ResolveBucket,
    UploadArtifacts,
    UploadTemplate,
    UpdateStack,
    UploadFiles,
    InvokeHooks,
    EmptyBucket,
    DeleteStack,
    PollStack,
    Configure,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to load deployment descriptor {path}: {source}")]
    DescriptorLoad {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unable to create stack {stack}: {source}")]
    StackCreateFailed {
        stack: String,
        #[source]
        source: ProviderError,
    },

    #[error("Unable to find deployment bucket export {export}, does the stack exist?")]
    MissingBucketExport { export: String },

    #[error("Failed uploading {path} to {bucket}/{key}: {source}")]
    ArtifactUploadFailed {
        bucket: String,
        key: String,
        path: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("Failed uploading update template {path} to {bucket}: {source}")]
    TemplateUploadFailed {
        bucket: String,
        path: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("Unable to update stack {stack}: {source}")]
    StackUpdateRejected {
        stack: String,
        #[source]
        source: ProviderError,
    },

    #[error("Unable to delete stack {stack}: {source}")]
    StackDeleteRejected {
        stack: String,
        #[source]
        source: ProviderError,
    },

    #[error("Stack {stack} failed with status {status}")]
    StackFailed { stack: String, status: StackStatus },

    #[error("Stack {stack} settled on {actual}, expected {expected}")]
    UnexpectedStatus {
        stack: String,
        expected: String,
        actual: StackStatus,
    },

    #[error("Timed out after {elapsed:?} waiting for stack {stack}")]
    PollTimeout { stack: String, elapsed: Duration },

    #[error("Stopped waiting for stack {stack}: cancelled")]
    PollCancelled { stack: String },

    #[error("Run for stack {stack} cancelled before step {step:?}")]
    Cancelled { stack: String, step: DeployStep },

    #[error("Status of stack {stack} unavailable after {attempts} failed queries: {source}")]
    PollTransport {
        stack: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn step(&self) -> DeployStep {
        match self {
            DeployError::DescriptorLoad { .. } => DeployStep::LoadDescriptor,
            DeployError::StackCreateFailed { .. } => DeployStep::CreateStack,
            DeployError::MissingBucketExport { .. } => DeployStep::ResolveBucket,
            DeployError::ArtifactUploadFailed { .. } => DeployStep::UploadArtifacts,
            DeployError::TemplateUploadFailed { .. } => DeployStep::UploadTemplate,
            DeployError::StackUpdateRejected { .. } => DeployStep::UpdateStack,
            DeployError::StackDeleteRejected { .. } => DeployStep::DeleteStack,
            DeployError::Cancelled { step, .. } => *step,
            DeployError::StackFailed { .. }
            | DeployError::UnexpectedStatus { .. }
            | DeployError::PollTimeout { .. }
            | DeployError::PollCancelled { .. }
            | DeployError::PollTransport { .. } => DeployStep::PollStack,
            DeployError::Configuration(_) | DeployError::Io(_) => DeployStep::Configure,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
