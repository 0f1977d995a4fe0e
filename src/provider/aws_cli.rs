//! Providers backed by the `aws` command-line client.
//!
//! Every call spawns the client with `--output json` and the configured
//! region. Credentials come from the client's usual environment and profile
//! resolution.

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use super::{CreateOutcome, FunctionInvoker, ObjectStore, ProviderError, StackProvider, UpdateOutcome};
use crate::types::{StackIdentity, StackStatus};

const STACK_CAPABILITIES: &str = "CAPABILITY_NAMED_IAM";

#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
}

#[derive(Debug)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
        }
    }

    /// Uses a different client executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn run<I, S>(&self, args: I) -> Result<CliOutput, ProviderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .arg("--region")
            .arg(&self.region)
            .arg("--output")
            .arg("json");

        debug!(command = ?cmd.as_std(), "running aws client");

        let output = cmd
            .output()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to run {}: {e}", self.program)))?;

        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    stacks: Vec<StackDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackDescription {
    stack_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListExportsResponse {
    #[serde(default)]
    exports: Vec<ExportEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExportEntry {
    name: String,
    value: String,
}

pub struct AwsCliStackProvider {
    cli: AwsCli,
}

impl AwsCliStackProvider {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl StackProvider for AwsCliStackProvider {
    async fn create_stack(
        &self,
        stack: &StackIdentity,
        stage: &str,
        template_path: &Path,
    ) -> Result<CreateOutcome, ProviderError> {
        let template_body = format!("file://{}", template_path.display());
        let stage_tag = format!("Key=Stage,Value={stage}");

        let output = self
            .cli
            .run([
                "cloudformation",
                "create-stack",
                "--stack-name",
                stack.as_str(),
                "--template-body",
                template_body.as_str(),
                "--capabilities",
                STACK_CAPABILITIES,
                "--tags",
                stage_tag.as_str(),
            ])
            .await?;

        if output.success {
            Ok(CreateOutcome::Accepted)
        } else if output.stderr.contains("AlreadyExistsException") {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            Err(ProviderError::rejected("create-stack", output.stderr))
        }
    }

    async fn update_stack(
        &self,
        stack: &StackIdentity,
        template_url: &Url,
    ) -> Result<UpdateOutcome, ProviderError> {
        let output = self
            .cli
            .run([
                "cloudformation",
                "update-stack",
                "--stack-name",
                stack.as_str(),
                "--template-url",
                template_url.as_str(),
                "--capabilities",
                STACK_CAPABILITIES,
            ])
            .await?;

        if output.success {
            Ok(UpdateOutcome::Accepted)
        } else if output.stderr.contains("No updates are to be performed") {
            Ok(UpdateOutcome::NoChanges)
        } else {
            Err(ProviderError::rejected("update-stack", output.stderr))
        }
    }

    async fn delete_stack(&self, stack: &StackIdentity) -> Result<(), ProviderError> {
        let output = self
            .cli
            .run(["cloudformation", "delete-stack", "--stack-name", stack.as_str()])
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(ProviderError::rejected("delete-stack", output.stderr))
        }
    }

    async fn stack_status(&self, stack: &StackIdentity) -> Result<StackStatus, ProviderError> {
        let output = self
            .cli
            .run(["cloudformation", "describe-stacks", "--stack-name", stack.as_str()])
            .await?;

        if !output.success {
            if output.stderr.contains("does not exist") {
                return Ok(StackStatus::NotExists);
            }
            return Err(ProviderError::Transport(output.stderr));
        }

        parse_stack_status(&output.stdout)
    }

    async fn find_export(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let output = self.cli.run(["cloudformation", "list-exports"]).await?;

        if !output.success {
            return Err(ProviderError::Transport(output.stderr));
        }

        let response: ListExportsResponse = serde_json::from_str(&output.stdout)?;
        Ok(response
            .exports
            .into_iter()
            .find(|export| export.name == name)
            .map(|export| export.value))
    }
}

fn parse_stack_status(stdout: &str) -> Result<StackStatus, ProviderError> {
    let response: DescribeStacksResponse = serde_json::from_str(stdout)?;
    let Some(stack) = response.stacks.first() else {
        return Ok(StackStatus::NotExists);
    };

    StackStatus::from_provider(&stack.stack_status).ok_or_else(|| {
        ProviderError::MalformedResponse(format!("Unknown stack status {}", stack.stack_status))
    })
}

pub struct AwsCliObjectStore {
    cli: AwsCli,
}

impl AwsCliObjectStore {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl ObjectStore for AwsCliObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        local_path: &Path,
        key: &str,
    ) -> Result<(), ProviderError> {
        let output = self
            .cli
            .run([
                OsStr::new("s3api"),
                OsStr::new("put-object"),
                OsStr::new("--bucket"),
                OsStr::new(bucket),
                OsStr::new("--key"),
                OsStr::new(key),
                OsStr::new("--body"),
                local_path.as_os_str(),
            ])
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(ProviderError::rejected("put-object", output.stderr))
        }
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        content: Vec<u8>,
        key: &str,
    ) -> Result<(), ProviderError> {
        let temp_file = tempfile::NamedTempFile::new()?;
        tokio::fs::write(temp_file.path(), &content).await?;

        self.put_file(bucket, temp_file.path(), key).await
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ProviderError> {
        let base = format!("https://{bucket}.s3.{}.amazonaws.com/", self.cli.region());
        let mut url = Url::parse(&base)
            .map_err(|e| ProviderError::MalformedResponse(format!("Invalid bucket URL {base}: {e}")))?;

        url.path_segments_mut()
            .map_err(|_| ProviderError::MalformedResponse(format!("Cannot append key to {base}")))?
            .pop_if_empty()
            .extend(key.split('/'));

        Ok(url)
    }

    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<(), ProviderError> {
        let target = format!("s3://{bucket}");
        let output = self.cli.run(["s3", "rb", target.as_str(), "--force"]).await?;

        if output.success {
            Ok(())
        } else {
            Err(ProviderError::rejected("remove-bucket", output.stderr))
        }
    }
}

pub struct AwsCliFunctionInvoker {
    cli: AwsCli,
}

impl AwsCliFunctionInvoker {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl FunctionInvoker for AwsCliFunctionInvoker {
    async fn invoke(&self, function_name: &str) -> Result<(), ProviderError> {
        // The client insists on somewhere to write the (empty) response.
        let response_file = tempfile::NamedTempFile::new()?;

        let output = self
            .cli
            .run([
                OsStr::new("lambda"),
                OsStr::new("invoke"),
                OsStr::new("--function-name"),
                OsStr::new(function_name),
                OsStr::new("--invocation-type"),
                OsStr::new("Event"),
                response_file.path().as_os_str(),
            ])
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(ProviderError::rejected("invoke", output.stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stack_status() {
        let stdout = r#"{"Stacks": [{"StackName": "shop-dev", "StackStatus": "UPDATE_IN_PROGRESS"}]}"#;
        assert_eq!(
            parse_stack_status(stdout).unwrap(),
            StackStatus::UpdateInProgress
        );
    }

    #[test]
    fn test_parse_stack_status_empty_list() {
        assert_eq!(
            parse_stack_status(r#"{"Stacks": []}"#).unwrap(),
            StackStatus::NotExists
        );
    }

    #[test]
    fn test_parse_unknown_status_is_malformed() {
        let stdout = r#"{"Stacks": [{"StackStatus": "TELEPORTING"}]}"#;
        assert!(matches!(
            parse_stack_status(stdout),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_object_url_encodes_key_segments() {
        let store = AwsCliObjectStore::new(AwsCli::new("eu-west-1"));
        let url = store.object_url("shop-dev-deploy", "site/my file.html").unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop-dev-deploy.s3.eu-west-1.amazonaws.com/site/my%20file.html"
        );
    }

    #[test]
    fn test_object_url_simple_key() {
        let store = AwsCliObjectStore::new(AwsCli::new("us-east-1"));
        let url = store.object_url("bucket", "update-template").unwrap();
        assert_eq!(url.as_str(), "https://bucket.s3.us-east-1.amazonaws.com/update-template");
    }

    #[tokio::test]
    async fn test_missing_client_is_transport_error() {
        let cli = AwsCli::new("eu-west-1").with_program("definitely-not-an-aws-client");
        let provider = AwsCliStackProvider::new(cli);

        let result = provider.stack_status(&StackIdentity::new("shop-dev")).await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }
}
