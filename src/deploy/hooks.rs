use crate::provider::FunctionInvoker;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HookOutcome {
    Invoked,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookResult {
    pub function_name: String,
    pub outcome: HookOutcome,
}

/// Fires the post-deployment functions declared for a stage.
///
/// Invocations are asynchronous on the provider side: success only means the
/// invocation was accepted. Failures are reported, never raised.
pub struct PostDeploymentHookRunner {
    invoker: Arc<dyn FunctionInvoker>,
}

impl PostDeploymentHookRunner {
    pub fn new(invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self { invoker }
    }

    pub async fn invoke(&self, function_name: &str) -> HookResult {
        let outcome = match self.invoker.invoke(function_name).await {
            Ok(()) => {
                info!(function = function_name, "invoked after-deployment function");
                HookOutcome::Invoked
            }
            Err(e) => {
                warn!(function = function_name, error = %e, "after-deployment function invocation failed");
                HookOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        HookResult {
            function_name: function_name.to_string(),
            outcome,
        }
    }

    /// Invokes each function in declaration order.
    pub async fn run_all(&self, function_names: &[String]) -> Vec<HookResult> {
        if function_names.is_empty() {
            return Vec::new();
        }
        info!("Starting after deployment functions");

        let mut results = Vec::with_capacity(function_names.len());
        for name in function_names {
            results.push(self.invoke(name).await);
        }
        results
    }
}
