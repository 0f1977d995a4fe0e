//! Capability traits for the remote systems a deployment talks to.
//!
//! The orchestrator only ever sees these traits. [`aws_cli`] drives the real
//! services through the `aws` command-line client and [`memory`] provides
//! scriptable in-process fakes.

pub mod aws_cli;
pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use url::Url;

use crate::types::{StackIdentity, StackStatus};

pub use aws_cli::{AwsCliFunctionInvoker, AwsCliObjectStore, AwsCliStackProvider};
pub use error::ProviderError;
pub use memory::{MemoryFunctionInvoker, MemoryObjectStore, MemoryStackProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Accepted,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    Accepted,
    /// The submitted template matches the live stack.
    NoChanges,
}

/// Infrastructure stack management.
#[async_trait]
pub trait StackProvider: Send + Sync {
    async fn create_stack(
        &self,
        stack: &StackIdentity,
        stage: &str,
        template_path: &Path,
    ) -> Result<CreateOutcome, ProviderError>;

    /// Submits an update from a template stored at `template_url`.
    async fn update_stack(
        &self,
        stack: &StackIdentity,
        template_url: &Url,
    ) -> Result<UpdateOutcome, ProviderError>;

    async fn delete_stack(&self, stack: &StackIdentity) -> Result<(), ProviderError>;

    async fn stack_status(&self, stack: &StackIdentity) -> Result<StackStatus, ProviderError>;

    /// Looks up a cross-stack export. `Ok(None)` when no export has the name.
    async fn find_export(&self, name: &str) -> Result<Option<String>, ProviderError>;
}

/// Object storage holding code artifacts, templates and uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_file(&self, bucket: &str, local_path: &Path, key: &str)
        -> Result<(), ProviderError>;

    async fn put_bytes(&self, bucket: &str, content: Vec<u8>, key: &str)
        -> Result<(), ProviderError>;

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ProviderError>;

    /// Removes every object in the bucket, then the bucket itself.
    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<(), ProviderError>;
}

/// Invokes deployed functions without a payload and without awaiting their
/// result.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str) -> Result<(), ProviderError>;
}
