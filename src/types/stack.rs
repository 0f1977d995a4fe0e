use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a stack as known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackIdentity(String);

impl StackIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackStatus {
    NotExists,
    CreateInProgress,
    CreateComplete,
    UpdateInProgress,
    UpdateComplete,
    DeleteInProgress,
    DeleteComplete,
    Failed,
}

impl StackStatus {
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            StackStatus::CreateInProgress
                | StackStatus::UpdateInProgress
                | StackStatus::DeleteInProgress
        )
    }

    /// Whether polling can stop on this status.
    ///
    /// `NotExists` is not terminal: right after a create is accepted the
    /// provider may not know the stack yet. Callers that wait for a deletion
    /// accept it explicitly.
    pub fn is_terminal(self) -> bool {
        self.is_complete() || self == StackStatus::Failed
    }

    pub fn is_complete(self) -> bool {
        matches!(
            self,
            StackStatus::CreateComplete | StackStatus::UpdateComplete | StackStatus::DeleteComplete
        )
    }

    /// Maps a raw CloudFormation stack status.
    ///
    /// Rollbacks report the in-progress state of the operation that triggered
    /// them; a finished rollback is a failure from the deployment's point of
    /// view.
    pub fn from_provider(raw: &str) -> Option<Self> {
        let status = match raw {
            "CREATE_IN_PROGRESS" | "ROLLBACK_IN_PROGRESS" | "REVIEW_IN_PROGRESS" => {
                StackStatus::CreateInProgress
            }
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "UPDATE_IN_PROGRESS"
            | "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"
            | "UPDATE_ROLLBACK_IN_PROGRESS"
            | "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            | "IMPORT_IN_PROGRESS"
            | "IMPORT_ROLLBACK_IN_PROGRESS" => StackStatus::UpdateInProgress,
            "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::UpdateComplete,
            "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
            "DELETE_COMPLETE" => StackStatus::DeleteComplete,
            "CREATE_FAILED"
            | "ROLLBACK_FAILED"
            | "ROLLBACK_COMPLETE"
            | "UPDATE_FAILED"
            | "UPDATE_ROLLBACK_FAILED"
            | "UPDATE_ROLLBACK_COMPLETE"
            | "DELETE_FAILED"
            | "IMPORT_ROLLBACK_FAILED"
            | "IMPORT_ROLLBACK_COMPLETE" => StackStatus::Failed,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StackStatus::NotExists => "NOT_EXISTS",
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
