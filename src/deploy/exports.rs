use crate::provider::StackProvider;
use crate::types::ExportBinding;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Looks up cross-stack exports.
///
/// A miss is never an error here. Callers decide whether a missing export is
/// fatal (the deployment bucket) or simply skipped (operator outputs).
#[derive(Clone)]
pub struct ExportResolver {
    provider: Arc<dyn StackProvider>,
}

impl ExportResolver {
    pub fn new(provider: Arc<dyn StackProvider>) -> Self {
        Self { provider }
    }

    pub async fn find_export(&self, name: &str) -> Option<String> {
        match self.provider.find_export(name).await {
            Ok(Some(value)) => {
                debug!(export = name, "export resolved");
                Some(value)
            }
            Ok(None) => {
                debug!(export = name, "export not found");
                None
            }
            Err(e) => {
                warn!(export = name, error = %e, "export lookup failed");
                None
            }
        }
    }

    /// Resolves every binding it can. Unresolvable bindings are left out of
    /// both the substitution map and the output messages.
    pub async fn resolve_bindings(&self, bindings: &[ExportBinding]) -> ResolvedExports {
        let mut resolved = ResolvedExports::default();

        for binding in bindings {
            match self.find_export(&binding.export_name).await {
                Some(value) => resolved.insert(binding, value),
                None => debug!(
                    export = %binding.export_name,
                    "skipping unresolved export binding"
                ),
            }
        }

        resolved
    }
}

/// Token to value mapping fed to the substitution engine.
pub type SubstitutionMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMessage {
    pub message: String,
    pub value: String,
}

/// Values resolved after a successful update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedExports {
    pub substitutions: SubstitutionMap,
    /// In declaration order.
    pub outputs: Vec<OutputMessage>,
}

impl ResolvedExports {
    fn insert(&mut self, binding: &ExportBinding, value: String) {
        self.substitutions
            .insert(binding.substitution_variable.clone(), value.clone());
        self.outputs.push(OutputMessage {
            message: binding.output_message.clone(),
            value,
        });
    }
}
