//! Deployment configuration.
//!
//! Defaults match the layout the build step produces. A config file (YAML or
//! JSON) may override any of them, and CLI flags override the file.

use crate::deploy::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub region: String,
    pub stage: String,
    /// Single deployable used when the descriptor is not in assemble mode.
    pub artifact_path: PathBuf,
    /// Directory holding one artifact per handler in assemble mode.
    pub assembled_dir: PathBuf,
    /// Directory with the generated templates and the descriptor.
    pub compiled_source_path: PathBuf,
    pub descriptor_file: String,
    pub bucket_export_suffix: String,
    pub upload_concurrency: usize,
    pub poll: PollPolicy,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            stage: "dev".to_string(),
            artifact_path: PathBuf::from("target/functions.jar"),
            assembled_dir: PathBuf::from("target/"),
            compiled_source_path: PathBuf::from("target/generated-sources/annotations/"),
            descriptor_file: "deployment-state.json".to_string(),
            bucket_export_suffix: "DeploymentBucketName".to_string(),
            upload_concurrency: 4,
            poll: PollPolicy::default(),
        }
    }
}

impl DeployConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                DeployError::Configuration(format!("Invalid config {}: {e}", path.display()))
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                DeployError::Configuration(format!("Invalid config {}: {e}", path.display()))
            })?,
            _ => {
                return Err(DeployError::Configuration(format!(
                    "Unsupported config format: {}",
                    path.display()
                )))
            }
        };

        Ok(config)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.compiled_source_path.join(&self.descriptor_file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stage.is_empty() {
            return Err(DeployError::Configuration("stage must not be empty".to_string()));
        }
        if self.upload_concurrency == 0 {
            return Err(DeployError::Configuration(
                "upload_concurrency must be at least 1".to_string(),
            ));
        }
        self.poll.validate()
    }
}

/// How long and how often to wait for a stack to settle.
///
/// "Still running" answers are re-queried every `interval`. Failed queries
/// back off exponentially from `initial_backoff` up to `max_backoff` and give
/// up after `max_consecutive_errors` failures in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    #[serde(with = "serde_millis")]
    pub interval: Duration,
    #[serde(with = "serde_millis")]
    pub initial_backoff: Duration,
    #[serde(with = "serde_millis")]
    pub max_backoff: Duration,
    pub max_consecutive_errors: u32,
    #[serde(with = "serde_millis_opt")]
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_consecutive_errors: 5,
            deadline: None,
        }
    }
}

impl PollPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay before the next query after `consecutive_errors` failures.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }

    fn validate(&self) -> Result<()> {
        if self.max_consecutive_errors == 0 {
            return Err(DeployError::Configuration(
                "poll.max_consecutive_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod serde_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod serde_millis_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
