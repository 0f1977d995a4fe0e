//! In-process providers with scripted behaviour and a call log.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use url::Url;

use super::{CreateOutcome, FunctionInvoker, ObjectStore, ProviderError, StackProvider, UpdateOutcome};
use crate::types::{StackIdentity, StackStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Create {
        stack: String,
        stage: String,
        template: PathBuf,
    },
    Update {
        stack: String,
        template_url: String,
    },
    Delete {
        stack: String,
    },
    Status {
        stack: String,
    },
    FindExport {
        name: String,
    },
}

#[derive(Debug, Default)]
struct StackState {
    current: HashMap<String, StackStatus>,
    script: VecDeque<Result<StackStatus, String>>,
    exports: HashMap<String, String>,
    create_rejection: Option<String>,
    update_rejection: Option<String>,
    delete_rejection: Option<String>,
    export_lookup_error: Option<String>,
    update_without_changes: bool,
    calls: Vec<StackCall>,
}

/// Stack provider whose answers are set up by the test.
///
/// Status queries first consume the scripted sequence; once it is exhausted
/// they report the status the last accepted operation settled on.
#[derive(Debug, Default)]
pub struct MemoryStackProvider {
    state: Mutex<StackState>,
}

impl MemoryStackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_stack(self, stack: &str, status: StackStatus) -> Self {
        lock(&self.state).current.insert(stack.to_string(), status);
        self
    }

    pub fn with_export(self, name: &str, value: &str) -> Self {
        lock(&self.state)
            .exports
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = StackStatus>) -> Self {
        lock(&self.state).script.extend(statuses.into_iter().map(Ok));
        self
    }

    /// Queues a failed status query.
    pub fn with_status_error(self, message: &str) -> Self {
        lock(&self.state).script.push_back(Err(message.to_string()));
        self
    }

    pub fn rejecting_create(self, reason: &str) -> Self {
        lock(&self.state).create_rejection = Some(reason.to_string());
        self
    }

    pub fn rejecting_update(self, reason: &str) -> Self {
        lock(&self.state).update_rejection = Some(reason.to_string());
        self
    }

    pub fn rejecting_delete(self, reason: &str) -> Self {
        lock(&self.state).delete_rejection = Some(reason.to_string());
        self
    }

    pub fn failing_export_lookups(self, message: &str) -> Self {
        lock(&self.state).export_lookup_error = Some(message.to_string());
        self
    }

    pub fn without_update_changes(self) -> Self {
        lock(&self.state).update_without_changes = true;
        self
    }

    pub fn calls(&self) -> Vec<StackCall> {
        lock(&self.state).calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.count(|c| matches!(c, StackCall::Create { .. }))
    }

    pub fn update_calls(&self) -> usize {
        self.count(|c| matches!(c, StackCall::Update { .. }))
    }

    pub fn delete_calls(&self) -> usize {
        self.count(|c| matches!(c, StackCall::Delete { .. }))
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| matches!(c, StackCall::Status { .. }))
    }

    pub fn export_lookups(&self) -> Vec<String> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                StackCall::FindExport { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&StackCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| predicate(c)).count()
    }
}

#[async_trait]
impl StackProvider for MemoryStackProvider {
    async fn create_stack(
        &self,
        stack: &StackIdentity,
        stage: &str,
        template_path: &Path,
    ) -> Result<CreateOutcome, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Create {
            stack: stack.to_string(),
            stage: stage.to_string(),
            template: template_path.to_path_buf(),
        });

        if let Some(reason) = &state.create_rejection {
            return Err(ProviderError::rejected("create-stack", reason.clone()));
        }

        let exists = matches!(
            state.current.get(stack.as_str()),
            Some(status) if !matches!(status, StackStatus::NotExists | StackStatus::DeleteComplete)
        );
        if exists {
            return Ok(CreateOutcome::AlreadyExists);
        }

        state
            .current
            .insert(stack.to_string(), StackStatus::CreateComplete);
        Ok(CreateOutcome::Accepted)
    }

    async fn update_stack(
        &self,
        stack: &StackIdentity,
        template_url: &Url,
    ) -> Result<UpdateOutcome, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Update {
            stack: stack.to_string(),
            template_url: template_url.to_string(),
        });

        if let Some(reason) = &state.update_rejection {
            return Err(ProviderError::rejected("update-stack", reason.clone()));
        }

        if state.update_without_changes {
            return Ok(UpdateOutcome::NoChanges);
        }

        state
            .current
            .insert(stack.to_string(), StackStatus::UpdateComplete);
        Ok(UpdateOutcome::Accepted)
    }

    async fn delete_stack(&self, stack: &StackIdentity) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Delete {
            stack: stack.to_string(),
        });

        if let Some(reason) = &state.delete_rejection {
            return Err(ProviderError::rejected("delete-stack", reason.clone()));
        }

        state
            .current
            .insert(stack.to_string(), StackStatus::DeleteComplete);
        Ok(())
    }

    async fn stack_status(&self, stack: &StackIdentity) -> Result<StackStatus, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Status {
            stack: stack.to_string(),
        });

        match state.script.pop_front() {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(ProviderError::Transport(message)),
            None => Ok(state
                .current
                .get(stack.as_str())
                .copied()
                .unwrap_or(StackStatus::NotExists)),
        }
    }

    async fn find_export(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::FindExport {
            name: name.to_string(),
        });

        if let Some(message) = &state.export_lookup_error {
            return Err(ProviderError::Transport(message.clone()));
        }

        Ok(state.exports.get(name).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<(String, String), Vec<u8>>,
    puts: Vec<PutRecord>,
    failing_keys: HashSet<String>,
    failing_buckets: HashSet<String>,
    removed_buckets: Vec<String>,
}

/// Object store keeping uploaded content in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put to `key` fails, in any bucket.
    pub fn failing_key(self, key: &str) -> Self {
        lock(&self.state).failing_keys.insert(key.to_string());
        self
    }

    /// Every operation on `bucket` fails.
    pub fn failing_bucket(self, bucket: &str) -> Self {
        lock(&self.state).failing_buckets.insert(bucket.to_string());
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, content: &[u8]) -> Self {
        lock(&self.state)
            .objects
            .insert((bucket.to_string(), key.to_string()), content.to_vec());
        self
    }

    /// Every put attempted, failed ones included, in call order.
    pub fn puts(&self) -> Vec<PutRecord> {
        lock(&self.state).puts.clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        lock(&self.state)
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    pub fn removed_buckets(&self) -> Vec<String> {
        lock(&self.state).removed_buckets.clone()
    }

    fn store(&self, bucket: &str, key: &str, content: Vec<u8>) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        let fails = state.failing_keys.contains(key) || state.failing_buckets.contains(bucket);

        state.puts.push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            succeeded: !fails,
        });

        if fails {
            return Err(ProviderError::rejected(
                "put-object",
                format!("access denied to {bucket}/{key}"),
            ));
        }

        state
            .objects
            .insert((bucket.to_string(), key.to_string()), content);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        local_path: &Path,
        key: &str,
    ) -> Result<(), ProviderError> {
        let content = tokio::fs::read(local_path).await?;
        self.store(bucket, key, content)
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        content: Vec<u8>,
        key: &str,
    ) -> Result<(), ProviderError> {
        self.store(bucket, key, content)
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ProviderError> {
        let raw = format!("https://{bucket}.objects.invalid/{key}");
        Url::parse(&raw).map_err(|e| ProviderError::MalformedResponse(format!("{raw}: {e}")))
    }

    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        if state.failing_buckets.contains(bucket) {
            return Err(ProviderError::rejected(
                "remove-bucket",
                format!("access denied to {bucket}"),
            ));
        }

        state.objects.retain(|(b, _), _| b != bucket);
        state.removed_buckets.push(bucket.to_string());
        Ok(())
    }
}

/// Function invoker recording the names it was asked to invoke.
#[derive(Debug, Default)]
pub struct MemoryFunctionInvoker {
    invoked: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryFunctionInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, function_name: &str) -> Self {
        lock(&self.failing).insert(function_name.to_string());
        self
    }

    /// Names of every attempted invocation, in call order.
    pub fn invoked(&self) -> Vec<String> {
        lock(&self.invoked).clone()
    }
}

#[async_trait]
impl FunctionInvoker for MemoryFunctionInvoker {
    async fn invoke(&self, function_name: &str) -> Result<(), ProviderError> {
        lock(&self.invoked).push(function_name.to_string());

        if lock(&self.failing).contains(function_name) {
            return Err(ProviderError::rejected(
                "invoke",
                format!("function {function_name} not found"),
            ));
        }
        Ok(())
    }
}
