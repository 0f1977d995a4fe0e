use crate::config::DeployConfig;
use crate::deploy::exports::{ExportResolver, ResolvedExports};
use crate::deploy::hooks::PostDeploymentHookRunner;
use crate::deploy::lifecycle::StackLifecycleController;
use crate::deploy::report::{DeployReport, DestroyReport};
use crate::deploy::substitution::SubstitutionEngine;
use crate::deploy::upload::{ArtifactPaths, ArtifactUploadCoordinator};
use crate::deploy::{DeployError, DeployStep, Result};
use crate::naming;
use crate::provider::{FunctionInvoker, ObjectStore, StackProvider};
use crate::types::{DeploymentDescriptor, StackIdentity, StackStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// The remote systems a run talks to.
#[derive(Clone)]
pub struct Providers {
    pub stacks: Arc<dyn StackProvider>,
    pub store: Arc<dyn ObjectStore>,
    pub invoker: Arc<dyn FunctionInvoker>,
}

/// Runs the deploy and destroy workflows for one project and stage.
///
/// Every step gates the next; fatal failures return immediately and
/// best-effort steps only show up in the report. Once the cancellation token
/// fires no further step that changes remote state is started.
pub struct DeploymentOrchestrator {
    config: DeployConfig,
    cancel: CancellationToken,
    lifecycle: StackLifecycleController,
    exports: ExportResolver,
    uploads: ArtifactUploadCoordinator,
    hooks: PostDeploymentHookRunner,
    store: Arc<dyn ObjectStore>,
}

impl DeploymentOrchestrator {
    pub fn new(config: DeployConfig, providers: Providers) -> Self {
        let lifecycle = StackLifecycleController::new(providers.stacks.clone(), config.poll.clone());
        let exports = ExportResolver::new(providers.stacks);
        let uploads = ArtifactUploadCoordinator::new(providers.store.clone(), config.upload_concurrency);
        let hooks = PostDeploymentHookRunner::new(providers.invoker);

        Self {
            config,
            cancel: CancellationToken::new(),
            lifecycle,
            exports,
            uploads,
            hooks,
            store: providers.store,
        }
    }

    /// Cancelling the token stops any stack poll in progress and keeps the
    /// remaining steps from starting.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.lifecycle = self.lifecycle.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub async fn load_descriptor(&self) -> Result<DeploymentDescriptor> {
        let descriptor = DeploymentDescriptor::load(&self.config.descriptor_path()).await?;
        if let Some(timestamp) = &descriptor.compilation_timestamp {
            info!(project = %descriptor.project_name, compiled_at = %timestamp, "loaded deployment descriptor");
        }
        Ok(descriptor)
    }

    pub async fn deploy(&self, descriptor: &DeploymentDescriptor) -> Result<DeployReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let stage = self.config.stage.as_str();
        let stack = naming::stack_identity(&descriptor.project_name, stage);

        info!(
            project = %descriptor.project_name,
            stage,
            run_id = %run_id,
            "Beginning deployment"
        );

        let create_template = self
            .config
            .compiled_source_path
            .join(naming::create_template_file(stage));
        self.check_cancelled(&stack, DeployStep::CreateStack)?;
        let ensured = self
            .lifecycle
            .ensure_created(&stack, stage, &create_template)
            .await?;

        if ensured.created {
            info!("Polling stack create progress");
            self.lifecycle
                .wait_for(&stack, &[StackStatus::CreateComplete])
                .await?;
            info!("Stack created");
        }

        let bucket = self.resolve_bucket(descriptor).await?;

        let paths = ArtifactPaths {
            single_artifact: self.config.artifact_path.clone(),
            assembled_dir: self.config.assembled_dir.clone(),
        };
        self.check_cancelled(&stack, DeployStep::UploadArtifacts)?;
        let artifacts = self.uploads.upload_code(descriptor, &bucket, &paths).await?;

        let update_template = self
            .config
            .compiled_source_path
            .join(naming::update_template_file(stage));
        self.check_cancelled(&stack, DeployStep::UploadTemplate)?;
        let template_url = self.uploads.upload_template(&bucket, &update_template).await?;

        self.check_cancelled(&stack, DeployStep::UpdateStack)?;
        let update = self.lifecycle.apply_update(&stack, &template_url).await?;
        let final_status = self
            .lifecycle
            .wait_for(
                &stack,
                &[StackStatus::CreateComplete, StackStatus::UpdateComplete],
            )
            .await?;
        info!(stack = %stack, status = %final_status, "Updated stack successfully");

        let ResolvedExports {
            substitutions,
            outputs,
        } = self
            .exports
            .resolve_bindings(descriptor.exports_for(stage))
            .await;
        let engine = SubstitutionEngine::new(substitutions);

        self.check_cancelled(&stack, DeployStep::UploadFiles)?;
        let file_uploads = self
            .uploads
            .upload_declared_files(descriptor.uploads_for(stage), &engine)
            .await;

        self.check_cancelled(&stack, DeployStep::InvokeHooks)?;
        let hooks = self.hooks.run_all(descriptor.hooks_for(stage)).await;

        info!("Deployment completed");
        for output in &outputs {
            info!("{}{}", output.message, output.value);
        }

        Ok(DeployReport {
            run_id,
            stack,
            stage: stage.to_string(),
            bucket,
            stack_created: ensured.created,
            update,
            final_status,
            artifacts,
            file_uploads,
            hooks,
            outputs,
            started_at,
            completed_at: Utc::now(),
        })
    }

    pub async fn destroy(&self, descriptor: &DeploymentDescriptor) -> Result<DestroyReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let stage = self.config.stage.as_str();
        let stack = naming::stack_identity(&descriptor.project_name, stage);

        info!(stack = %stack, run_id = %run_id, "Beginning teardown");

        let bucket = self.resolve_bucket(descriptor).await?;

        self.check_cancelled(&stack, DeployStep::EmptyBucket)?;
        info!(bucket = %bucket, "Found deployment bucket, about to empty");
        let bucket_removed = match self.store.empty_and_delete_bucket(&bucket).await {
            Ok(()) => {
                info!(bucket = %bucket, "Emptied deployment bucket");
                true
            }
            Err(e) => {
                warn!(bucket = %bucket, error = %e, "Failed to empty deployment bucket");
                false
            }
        };

        self.check_cancelled(&stack, DeployStep::DeleteStack)?;
        self.lifecycle.delete_stack(&stack).await?;
        let final_status = self
            .lifecycle
            .wait_for(
                &stack,
                &[StackStatus::DeleteComplete, StackStatus::NotExists],
            )
            .await?;
        info!(stack = %stack, "Deleted stack successfully");

        Ok(DestroyReport {
            run_id,
            stack,
            bucket,
            bucket_removed,
            final_status,
            started_at,
            completed_at: Utc::now(),
        })
    }

    fn check_cancelled(&self, stack: &StackIdentity, step: DeployStep) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!(stack = %stack, ?step, "run cancelled, not starting step");
            return Err(DeployError::Cancelled {
                stack: stack.to_string(),
                step,
            });
        }
        Ok(())
    }

    async fn resolve_bucket(&self, descriptor: &DeploymentDescriptor) -> Result<String> {
        let export = naming::qualified_export(
            &descriptor.project_name,
            &self.config.stage,
            &self.config.bucket_export_suffix,
        );

        self.exports
            .find_export(&export)
            .await
            .ok_or(DeployError::MissingBucketExport { export })
    }
}
