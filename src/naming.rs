//! Identifier conventions shared by the deploy and destroy workflows.
//!
//! Stack names, export names and artifact keys are all derived from the
//! project name and the target stage. Keeping the derivation here means the
//! conventions can be checked without touching a provider.

use crate::types::StackIdentity;

/// Object key of the single deployable in single-artifact mode.
pub const SINGLE_ARTIFACT_KEY: &str = "lambdacode";

/// Object key the rendered update template is uploaded to.
pub const UPDATE_TEMPLATE_KEY: &str = "update-template";

const CREATE_TEMPLATE_PREFIX: &str = "cloudformation-stack-create";
const UPDATE_TEMPLATE_PREFIX: &str = "cloudformation-stack-update";

/// `project-stage`, the sole key for every stack operation.
pub fn stack_identity(project: &str, stage: &str) -> StackIdentity {
    StackIdentity::new(format!("{project}-{stage}"))
}

/// `project-stage-suffix`, the convention for stack-scoped exports.
pub fn qualified_export(project: &str, stage: &str, suffix: &str) -> String {
    format!("{project}-{stage}-{suffix}")
}

pub fn create_template_file(stage: &str) -> String {
    format!("{CREATE_TEMPLATE_PREFIX}-{stage}.json")
}

pub fn update_template_file(stage: &str) -> String {
    format!("{UPDATE_TEMPLATE_PREFIX}-{stage}.json")
}

/// Key for a file found below a directory upload.
///
/// Separators are normalised to `/` so keys are the same on every platform.
pub fn nested_key(target_prefix: &str, relative: &std::path::Path) -> String {
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let prefix = target_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative
    } else {
        format!("{prefix}/{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_stack_identity_joins_project_and_stage() {
        let stack = stack_identity("shop", "dev");
        assert_eq!(stack.as_str(), "shop-dev");
    }

    #[test]
    fn test_qualified_export() {
        assert_eq!(
            qualified_export("shop", "prod", "DeploymentBucketName"),
            "shop-prod-DeploymentBucketName"
        );
    }

    #[test]
    fn test_template_file_names_carry_stage() {
        assert_eq!(create_template_file("dev"), "cloudformation-stack-create-dev.json");
        assert_eq!(update_template_file("prod"), "cloudformation-stack-update-prod.json");
    }

    #[test]
    fn test_nested_key() {
        assert_eq!(
            nested_key("site/", Path::new("css/main.css")),
            "site/css/main.css"
        );
        assert_eq!(nested_key("", Path::new("index.html")), "index.html");
    }
}
