use crate::deploy::substitution::SubstitutionEngine;
use crate::deploy::{DeployError, Result};
use crate::naming;
use crate::provider::{ObjectStore, ProviderError};
use crate::types::{DeploymentDescriptor, FileUploadSpec};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

/// Where the build left the code artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    /// The one deployable used outside assemble mode.
    pub single_artifact: PathBuf,
    /// Directory holding one artifact per handler.
    pub assembled_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedArtifact {
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Result of one declared file upload. Directory uploads cover many objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUploadResult {
    pub bucket: String,
    pub local_file: String,
    pub target_file: String,
    pub uploaded_objects: usize,
    pub errors: Vec<String>,
}

impl FileUploadResult {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ArtifactUploadCoordinator {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl ArtifactUploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn upload_artifact(
        &self,
        bucket: &str,
        local_path: &Path,
        key: &str,
    ) -> std::result::Result<(), ProviderError> {
        debug!(bucket, key, path = %local_path.display(), "uploading file");
        self.store.put_file(bucket, local_path, key).await
    }

    /// Reads the file, passes its content through `transform` and uploads the
    /// result.
    pub async fn upload_with_transform<F>(
        &self,
        bucket: &str,
        local_path: &Path,
        key: &str,
        transform: F,
    ) -> std::result::Result<(), ProviderError>
    where
        F: FnOnce(Vec<u8>) -> Vec<u8> + Send,
    {
        let content = tokio::fs::read(local_path).await?;
        debug!(bucket, key, path = %local_path.display(), "uploading transformed file");
        self.store.put_bytes(bucket, transform(content), key).await
    }

    /// Uploads the code for the deployment.
    ///
    /// Outside assemble mode exactly one artifact is uploaded, whatever the
    /// handler list says. In assemble mode every handler artifact is
    /// uploaded in order and the first failure stops the rest.
    pub async fn upload_code(
        &self,
        descriptor: &DeploymentDescriptor,
        bucket: &str,
        paths: &ArtifactPaths,
    ) -> Result<Vec<UploadedArtifact>> {
        if !descriptor.assemble_mode {
            info!("Uploading function code");
            let artifact = self
                .upload_code_artifact(bucket, &paths.single_artifact, naming::SINGLE_ARTIFACT_KEY)
                .await?;
            return Ok(vec![artifact]);
        }

        let total = descriptor.handlers.len();
        let mut uploaded = Vec::with_capacity(total);

        for (index, handler) in descriptor.handlers.iter().enumerate() {
            info!("Uploading function handler {}/{}", index + 1, total);
            let path = paths.assembled_dir.join(&handler.artifact_file_name);
            let artifact = self
                .upload_code_artifact(bucket, &path, &handler.artifact_file_name)
                .await
                .inspect_err(|_| warn!("Handler upload failed, has the assemble step run?"))?;
            uploaded.push(artifact);
        }

        Ok(uploaded)
    }

    async fn upload_code_artifact(
        &self,
        bucket: &str,
        path: &Path,
        key: &str,
    ) -> Result<UploadedArtifact> {
        let upload_failed = |source: ProviderError| DeployError::ArtifactUploadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            path: path.to_path_buf(),
            source,
        };

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| upload_failed(ProviderError::Io(e)))?;
        let sha256 = format!("{:x}", Sha256::digest(&content));
        let size = content.len() as u64;
        drop(content);

        self.upload_artifact(bucket, path, key)
            .await
            .map_err(upload_failed)?;

        Ok(UploadedArtifact {
            key: key.to_string(),
            path: path.to_path_buf(),
            size,
            sha256,
        })
    }

    /// Uploads the stack update template and returns the URL to update from.
    pub async fn upload_template(&self, bucket: &str, template_path: &Path) -> Result<Url> {
        info!("Uploading stack update template");
        let template_failed = |source: ProviderError| DeployError::TemplateUploadFailed {
            bucket: bucket.to_string(),
            path: template_path.to_path_buf(),
            source,
        };

        self.upload_artifact(bucket, template_path, naming::UPDATE_TEMPLATE_KEY)
            .await
            .map_err(template_failed)?;

        self.store
            .object_url(bucket, naming::UPDATE_TEMPLATE_KEY)
            .map_err(template_failed)
    }

    /// Best-effort upload of the files declared for a stage.
    ///
    /// Each declaration is attempted regardless of how the others fare.
    /// Results come back in declaration order.
    pub async fn upload_declared_files(
        &self,
        uploads: Vec<(String, FileUploadSpec)>,
        engine: &SubstitutionEngine,
    ) -> Vec<FileUploadResult> {
        if uploads.is_empty() {
            return Vec::new();
        }
        info!("Starting file uploads");

        let mut results = stream::iter(uploads.into_iter().enumerate())
            .map(|(index, (bucket, spec))| async move {
                (index, self.upload_declared_file(bucket, spec, engine).await)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn upload_declared_file(
        &self,
        bucket: String,
        spec: FileUploadSpec,
        engine: &SubstitutionEngine,
    ) -> FileUploadResult {
        let mut result = FileUploadResult {
            bucket: bucket.clone(),
            local_file: spec.local_file.clone(),
            target_file: spec.target_file.clone(),
            uploaded_objects: 0,
            errors: Vec::new(),
        };

        let objects = match collect_objects(Path::new(&spec.local_file), &spec.target_file).await {
            Ok(objects) => objects,
            Err(e) => {
                warn!(file = %spec.local_file, error = %e, "cannot read file to upload");
                result.errors.push(e.to_string());
                return result;
            }
        };

        for (path, key) in objects {
            let outcome = if spec.substitute_variables {
                self.upload_with_transform(&bucket, &path, &key, |content| engine.render(&content))
                    .await
            } else {
                self.upload_artifact(&bucket, &path, &key).await
            };

            match outcome {
                Ok(()) => result.uploaded_objects += 1,
                Err(e) => {
                    warn!(bucket = %bucket, key = %key, error = %e, "file upload failed");
                    result.errors.push(format!("{key}: {e}"));
                }
            }
        }

        info!(
            bucket = %bucket,
            file = %spec.local_file,
            uploaded = result.uploaded_objects,
            success = result.succeeded(),
            "file upload finished"
        );
        result
    }
}

/// Expands a declared upload into `(local path, key)` pairs.
///
/// A directory maps every file below it to `target/relative/path`. The walk
/// runs on the blocking pool.
async fn collect_objects(local: &Path, target: &str) -> std::io::Result<Vec<(PathBuf, String)>> {
    let metadata = tokio::fs::metadata(local).await?;
    if !metadata.is_dir() {
        return Ok(vec![(local.to_path_buf(), target.to_string())]);
    }

    let root = local.to_path_buf();
    let target = target.to_string();
    tokio::task::spawn_blocking(move || walk_directory(&root, &target))
        .await
        .map_err(std::io::Error::other)?
}

fn walk_directory(root: &Path, target: &str) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut objects = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?;
        objects.push((entry.path().to_path_buf(), naming::nested_key(target, relative)));
    }

    Ok(objects)
}
