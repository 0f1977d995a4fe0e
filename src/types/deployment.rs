use crate::deploy::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Build-generated description of what to deploy.
///
/// The field names on the wire follow the format written by the build step,
/// which is why several of them are renamed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDescriptor {
    pub project_name: String,
    #[serde(default, rename = "compilationTimeStamp")]
    pub compilation_timestamp: Option<String>,
    #[serde(default, rename = "assemble")]
    pub assemble_mode: bool,
    #[serde(default, rename = "handlerFiles")]
    pub handlers: Vec<HandlerInfo>,
    #[serde(default)]
    pub exports: BTreeMap<String, Vec<ExportBinding>>,
    #[serde(default)]
    pub file_uploads: BTreeMap<String, BTreeMap<String, Vec<FileUploadSpec>>>,
    #[serde(default, rename = "afterDeployments")]
    pub after_deploy_hooks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    #[serde(rename = "handlerFile")]
    pub artifact_file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBinding {
    pub export_name: String,
    pub substitution_variable: String,
    #[serde(rename = "exportMessage")]
    pub output_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadSpec {
    pub local_file: String,
    pub target_file: String,
    #[serde(default)]
    pub substitute_variables: bool,
}

impl DeploymentDescriptor {
    /// Reads and parses the descriptor from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading deployment descriptor");

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| DeployError::DescriptorLoad {
                    path: path.to_path_buf(),
                    source: Box::new(e),
                })?;

        Self::from_json(&content).map_err(|e| DeployError::DescriptorLoad {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn exports_for(&self, stage: &str) -> &[ExportBinding] {
        self.exports.get(stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn hooks_for(&self, stage: &str) -> &[String] {
        self.after_deploy_hooks
            .get(stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Declared uploads for a stage, flattened to `(bucket, spec)` pairs in
    /// declaration order.
    pub fn uploads_for(&self, stage: &str) -> Vec<(String, FileUploadSpec)> {
        self.file_uploads
            .get(stage)
            .into_iter()
            .flat_map(|buckets| {
                buckets.iter().flat_map(|(bucket, specs)| {
                    specs.iter().map(move |spec| (bucket.clone(), spec.clone()))
                })
            })
            .collect()
    }
}
