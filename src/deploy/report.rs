use crate::deploy::exports::OutputMessage;
use crate::deploy::hooks::{HookOutcome, HookResult};
use crate::deploy::upload::{FileUploadResult, UploadedArtifact};
use crate::provider::UpdateOutcome;
use crate::types::{StackIdentity, StackStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DeployReport {
    pub run_id: String,
    pub stack: StackIdentity,
    pub stage: String,
    pub bucket: String,
    pub stack_created: bool,
    pub update: UpdateOutcome,
    pub final_status: StackStatus,
    pub artifacts: Vec<UploadedArtifact>,
    pub file_uploads: Vec<FileUploadResult>,
    pub hooks: Vec<HookResult>,
    /// Operator-facing messages paired with resolved export values, in
    /// declaration order.
    pub outputs: Vec<OutputMessage>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl DeployReport {
    /// Best-effort steps that did not go through.
    pub fn warnings(&self) -> Vec<String> {
        let uploads = self
            .file_uploads
            .iter()
            .filter(|upload| !upload.succeeded())
            .map(|upload| {
                format!(
                    "File upload {} -> {}/{} failed: {}",
                    upload.local_file,
                    upload.bucket,
                    upload.target_file,
                    upload.errors.join("; ")
                )
            });

        let hooks = self.hooks.iter().filter_map(|hook| match &hook.outcome {
            HookOutcome::Invoked => None,
            HookOutcome::Failed { error } => Some(format!(
                "After-deployment function {} failed: {error}",
                hook.function_name
            )),
        });

        uploads.chain(hooks).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct DestroyReport {
    pub run_id: String,
    pub stack: StackIdentity,
    pub bucket: String,
    /// Whether emptying and removing the bucket succeeded.
    pub bucket_removed: bool,
    pub final_status: StackStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
