//! Shared fixtures for the workflow tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stratus_deploy::provider::{MemoryFunctionInvoker, MemoryObjectStore, MemoryStackProvider};
use stratus_deploy::{
    DeployConfig, DeploymentDescriptor, DeploymentOrchestrator, HandlerInfo, PollPolicy, Providers,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const PROJECT: &str = "shop";
pub const STAGE: &str = "dev";
pub const STACK: &str = "shop-dev";
pub const BUCKET_EXPORT: &str = "shop-dev-DeploymentBucketName";
pub const BUCKET: &str = "shop-dev-deployment";

/// A build output directory with templates and artifacts on disk.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let compiled = dir.path().join("generated");
        std::fs::create_dir_all(&compiled).unwrap();
        std::fs::create_dir_all(dir.path().join("assembled")).unwrap();

        std::fs::write(
            compiled.join("cloudformation-stack-create-dev.json"),
            r#"{"Resources": {"DeploymentBucket": {}}}"#,
        )
        .unwrap();
        std::fs::write(
            compiled.join("cloudformation-stack-update-dev.json"),
            r#"{"Resources": {"DeploymentBucket": {}, "Function": {}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("functions.jar"), b"PK\x03\x04shaded").unwrap();

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn compiled(&self) -> PathBuf {
        self.dir.path().join("generated")
    }

    pub fn add_handler_artifact(&self, name: &str) {
        std::fs::write(self.dir.path().join("assembled").join(name), name.as_bytes()).unwrap();
    }

    pub fn write_file(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> DeployConfig {
        DeployConfig {
            stage: STAGE.to_string(),
            artifact_path: self.dir.path().join("functions.jar"),
            assembled_dir: self.dir.path().join("assembled"),
            compiled_source_path: self.compiled(),
            poll: PollPolicy {
                interval: Duration::from_millis(1),
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                max_consecutive_errors: 3,
                deadline: Some(Duration::from_secs(30)),
            },
            ..DeployConfig::default()
        }
    }
}

pub struct Harness {
    pub stacks: Arc<MemoryStackProvider>,
    pub store: Arc<MemoryObjectStore>,
    pub invoker: Arc<MemoryFunctionInvoker>,
    pub orchestrator: DeploymentOrchestrator,
}

impl Harness {
    pub fn new(
        config: DeployConfig,
        stacks: MemoryStackProvider,
        store: MemoryObjectStore,
        invoker: MemoryFunctionInvoker,
    ) -> Self {
        let stacks = Arc::new(stacks);
        let store = Arc::new(store);
        let invoker = Arc::new(invoker);

        let providers = Providers {
            stacks: stacks.clone(),
            store: store.clone(),
            invoker: invoker.clone(),
        };

        Self {
            stacks,
            store,
            invoker,
            orchestrator: DeploymentOrchestrator::new(config, providers),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.orchestrator = self.orchestrator.with_cancellation(cancel);
        self
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.store.puts().into_iter().map(|put| put.key).collect()
    }
}

pub fn descriptor() -> DeploymentDescriptor {
    DeploymentDescriptor {
        project_name: PROJECT.to_string(),
        ..DeploymentDescriptor::default()
    }
}

pub fn handlers(names: &[&str]) -> Vec<HandlerInfo> {
    names
        .iter()
        .map(|name| HandlerInfo {
            artifact_file_name: name.to_string(),
        })
        .collect()
}
