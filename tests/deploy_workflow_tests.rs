mod common;

use common::*;
use std::collections::BTreeMap;
use stratus_deploy::deploy::{DeployStep, HookOutcome};
use stratus_deploy::provider::memory::StackCall;
use stratus_deploy::provider::{
    MemoryFunctionInvoker, MemoryObjectStore, MemoryStackProvider, UpdateOutcome,
};
use stratus_deploy::{DeployError, ExportBinding, FileUploadSpec, StackStatus};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn fresh_stack() -> MemoryStackProvider {
    MemoryStackProvider::new()
        .with_statuses([
            StackStatus::NotExists,
            StackStatus::CreateInProgress,
            StackStatus::CreateComplete,
            StackStatus::UpdateInProgress,
            StackStatus::UpdateComplete,
        ])
        .with_export(BUCKET_EXPORT, BUCKET)
}

fn existing_stack() -> MemoryStackProvider {
    MemoryStackProvider::new()
        .with_existing_stack(STACK, StackStatus::UpdateComplete)
        .with_export(BUCKET_EXPORT, BUCKET)
}

#[tokio::test]
async fn test_first_deployment_creates_then_updates() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        fresh_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor()).await);

    assert!(report.stack_created);
    assert_eq!(report.stack.as_str(), STACK);
    assert_eq!(report.bucket, BUCKET);
    assert_eq!(report.update, UpdateOutcome::Accepted);
    assert_eq!(report.final_status, StackStatus::UpdateComplete);
    assert!(report.warnings().is_empty());

    assert_eq!(harness.stacks.create_calls(), 1);
    assert_eq!(harness.stacks.update_calls(), 1);
    assert_eq!(harness.stacks.export_lookups(), vec![BUCKET_EXPORT.to_string()]);
    assert_eq!(harness.put_keys(), vec!["lambdacode", "update-template"]);
    assert!(harness.invoker.invoked().is_empty());

    assert_eq!(
        harness.store.object(BUCKET, "lambdacode").unwrap(),
        b"PK\x03\x04shaded"
    );
}

#[tokio::test]
async fn test_update_uses_uploaded_template_url() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        fresh_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    assert_ok!(harness.orchestrator.deploy(&descriptor()).await);

    let update_url = harness
        .stacks
        .calls()
        .into_iter()
        .find_map(|call| match call {
            StackCall::Update { template_url, .. } => Some(template_url),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        update_url,
        format!("https://{BUCKET}.objects.invalid/update-template")
    );

    let template = harness.store.object(BUCKET, "update-template").unwrap();
    let on_disk =
        std::fs::read(workspace.compiled().join("cloudformation-stack-update-dev.json")).unwrap();
    assert_eq!(template, on_disk);
}

#[tokio::test]
async fn test_stack_not_yet_visible_after_create_keeps_polling() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        MemoryStackProvider::new()
            .with_statuses([
                StackStatus::NotExists,
                StackStatus::NotExists,
                StackStatus::CreateInProgress,
                StackStatus::CreateComplete,
            ])
            .with_export(BUCKET_EXPORT, BUCKET),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor()).await);

    assert!(report.stack_created);
    assert_eq!(report.final_status, StackStatus::UpdateComplete);
    assert_eq!(harness.stacks.create_calls(), 1);
    assert_eq!(harness.stacks.update_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_deploy_changes_nothing() {
    let workspace = Workspace::new();
    let cancel = CancellationToken::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    )
    .with_cancellation(cancel.clone());
    cancel.cancel();

    let err = assert_err!(harness.orchestrator.deploy(&descriptor()).await);

    assert_eq!(err.step(), DeployStep::CreateStack);
    assert!(matches!(err, DeployError::Cancelled { .. }));
    assert_eq!(harness.stacks.create_calls(), 0);
    assert_eq!(harness.stacks.update_calls(), 0);
    assert!(harness.store.puts().is_empty());
}

#[tokio::test]
async fn test_cancel_during_create_skips_uploads_and_update() {
    let workspace = Workspace::new();
    let cancel = CancellationToken::new();
    let harness = Harness::new(
        workspace.config(),
        MemoryStackProvider::new()
            .with_statuses([StackStatus::NotExists])
            .with_statuses(std::iter::repeat(StackStatus::CreateInProgress).take(100_000))
            .with_export(BUCKET_EXPORT, BUCKET),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    )
    .with_cancellation(cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });
    let err = assert_err!(harness.orchestrator.deploy(&descriptor()).await);
    canceller.await.unwrap();

    assert!(matches!(err, DeployError::PollCancelled { .. }));
    assert_eq!(harness.stacks.create_calls(), 1);
    assert_eq!(harness.stacks.update_calls(), 0);
    assert!(harness.store.puts().is_empty());
}

#[tokio::test]
async fn test_existing_stack_is_updated_without_create() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor()).await);

    assert!(!report.stack_created);
    assert_eq!(harness.stacks.create_calls(), 0);
    assert_eq!(harness.stacks.update_calls(), 1);
}

#[tokio::test]
async fn test_update_without_changes_is_accepted() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack().without_update_changes(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor()).await);

    assert_eq!(report.update, UpdateOutcome::NoChanges);
    assert_eq!(report.final_status, StackStatus::UpdateComplete);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["update"], "no_changes");
    assert_eq!(json["stack"], STACK);
}

#[tokio::test]
async fn test_single_mode_ignores_handler_list() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.handlers = handlers(&["orders.jar", "payments.jar"]);

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].key, "lambdacode");
    assert_eq!(harness.put_keys(), vec!["lambdacode", "update-template"]);
}

#[tokio::test]
async fn test_assemble_mode_uploads_each_handler_in_order() {
    let workspace = Workspace::new();
    for name in ["orders.jar", "payments.jar", "refunds.jar"] {
        workspace.add_handler_artifact(name);
    }
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.assemble_mode = true;
    descriptor.handlers = handlers(&["orders.jar", "payments.jar", "refunds.jar"]);

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert_eq!(
        harness.put_keys(),
        vec!["orders.jar", "payments.jar", "refunds.jar", "update-template"]
    );
    let keys: Vec<_> = report.artifacts.iter().map(|a| a.key.as_str()).collect();
    assert_eq!(keys, vec!["orders.jar", "payments.jar", "refunds.jar"]);
    assert_eq!(harness.store.object(BUCKET, "payments.jar").unwrap(), b"payments.jar");
}

#[tokio::test]
async fn test_assemble_mode_stops_at_first_failed_handler() {
    let workspace = Workspace::new();
    for name in ["orders.jar", "payments.jar", "refunds.jar"] {
        workspace.add_handler_artifact(name);
    }
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new().failing_key("payments.jar"),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.assemble_mode = true;
    descriptor.handlers = handlers(&["orders.jar", "payments.jar", "refunds.jar"]);

    let err = assert_err!(harness.orchestrator.deploy(&descriptor).await);

    match &err {
        DeployError::ArtifactUploadFailed { key, bucket, .. } => {
            assert_eq!(key, "payments.jar");
            assert_eq!(bucket, BUCKET);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.step(), DeployStep::UploadArtifacts);
    assert_eq!(harness.put_keys(), vec!["orders.jar", "payments.jar"]);
    assert_eq!(harness.stacks.update_calls(), 0);
}

#[tokio::test]
async fn test_missing_handler_artifact_aborts_before_update() {
    let workspace = Workspace::new();
    workspace.add_handler_artifact("orders.jar");
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.assemble_mode = true;
    descriptor.handlers = handlers(&["orders.jar", "missing.jar"]);

    let err = assert_err!(harness.orchestrator.deploy(&descriptor).await);

    assert!(matches!(err, DeployError::ArtifactUploadFailed { ref key, .. } if key == "missing.jar"));
    assert_eq!(harness.put_keys(), vec!["orders.jar"]);
    assert_eq!(harness.stacks.update_calls(), 0);
}

#[tokio::test]
async fn test_missing_bucket_export_aborts_before_uploads() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        MemoryStackProvider::new().with_existing_stack(STACK, StackStatus::CreateComplete),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let err = assert_err!(harness.orchestrator.deploy(&descriptor()).await);

    match &err {
        DeployError::MissingBucketExport { export } => assert_eq!(export, BUCKET_EXPORT),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.step(), DeployStep::ResolveBucket);
    assert!(harness.store.puts().is_empty());
    assert_eq!(harness.stacks.update_calls(), 0);
}

#[tokio::test]
async fn test_rejected_create_aborts() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        MemoryStackProvider::new()
            .rejecting_create("template invalid")
            .with_export(BUCKET_EXPORT, BUCKET),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let err = assert_err!(harness.orchestrator.deploy(&descriptor()).await);

    assert_eq!(err.step(), DeployStep::CreateStack);
    assert!(harness.stacks.export_lookups().is_empty());
    assert!(harness.store.puts().is_empty());
}

#[tokio::test]
async fn test_failed_update_is_reported() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack().with_statuses([
            StackStatus::UpdateComplete,
            StackStatus::UpdateInProgress,
            StackStatus::Failed,
        ]),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor
        .after_deploy_hooks
        .insert(STAGE.to_string(), vec!["seedDatabase".to_string()]);

    let err = assert_err!(harness.orchestrator.deploy(&descriptor).await);

    match &err {
        DeployError::StackFailed { stack, status } => {
            assert_eq!(stack, STACK);
            assert_eq!(*status, StackStatus::Failed);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.invoker.invoked().is_empty());
}

#[tokio::test]
async fn test_rejected_update_aborts() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack().rejecting_update("stack is in UPDATE_ROLLBACK_FAILED state"),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let err = assert_err!(harness.orchestrator.deploy(&descriptor()).await);

    assert!(matches!(err, DeployError::StackUpdateRejected { .. }));
    assert_eq!(err.step(), DeployStep::UpdateStack);
}

#[tokio::test]
async fn test_exports_feed_outputs_and_substitution() {
    let workspace = Workspace::new();
    let page = workspace.write_file(
        "site/index.html",
        b"<a href=\"${REST_API_URL}/orders\">${REST_API_URL}</a> ${MISSING}",
    );
    let harness = Harness::new(
        workspace.config(),
        existing_stack().with_export("shop-dev-RestApiUrl", "https://api.example.com"),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.exports.insert(
        STAGE.to_string(),
        vec![
            ExportBinding {
                export_name: "shop-dev-RestApiUrl".to_string(),
                substitution_variable: "${REST_API_URL}".to_string(),
                output_message: "REST API URL: ".to_string(),
            },
            ExportBinding {
                export_name: "shop-dev-Missing".to_string(),
                substitution_variable: "${MISSING}".to_string(),
                output_message: "Missing: ".to_string(),
            },
        ],
    );
    descriptor.file_uploads.insert(
        STAGE.to_string(),
        BTreeMap::from([(
            "shop-website".to_string(),
            vec![FileUploadSpec {
                local_file: page.display().to_string(),
                target_file: "index.html".to_string(),
                substitute_variables: true,
            }],
        )]),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].message, "REST API URL: ");
    assert_eq!(report.outputs[0].value, "https://api.example.com");

    let rendered = harness.store.object("shop-website", "index.html").unwrap();
    assert_eq!(
        String::from_utf8(rendered).unwrap(),
        "<a href=\"https://api.example.com/orders\">https://api.example.com</a> ${MISSING}"
    );
    assert!(report.warnings().is_empty());
}

#[tokio::test]
async fn test_declared_directory_uploads_every_file() {
    let workspace = Workspace::new();
    workspace.write_file("site/index.html", b"<html>");
    workspace.write_file("site/css/main.css", b"body {}");
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.file_uploads.insert(
        STAGE.to_string(),
        BTreeMap::from([(
            "shop-website".to_string(),
            vec![FileUploadSpec {
                local_file: workspace.path().join("site").display().to_string(),
                target_file: String::new(),
                substitute_variables: false,
            }],
        )]),
    );

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert_eq!(report.file_uploads.len(), 1);
    assert_eq!(report.file_uploads[0].uploaded_objects, 2);
    assert_eq!(harness.store.object_count("shop-website"), 2);
    assert_eq!(
        harness.store.object("shop-website", "css/main.css").unwrap(),
        b"body {}"
    );
}

#[tokio::test]
async fn test_failed_file_upload_is_a_warning() {
    let workspace = Workspace::new();
    let good = workspace.write_file("assets/good.txt", b"good");
    let bad = workspace.write_file("assets/bad.txt", b"bad");
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new().failing_bucket("locked-bucket"),
        MemoryFunctionInvoker::new(),
    );

    let mut descriptor = descriptor();
    descriptor.file_uploads.insert(
        STAGE.to_string(),
        BTreeMap::from([
            (
                "assets-bucket".to_string(),
                vec![FileUploadSpec {
                    local_file: good.display().to_string(),
                    target_file: "good.txt".to_string(),
                    substitute_variables: false,
                }],
            ),
            (
                "locked-bucket".to_string(),
                vec![FileUploadSpec {
                    local_file: bad.display().to_string(),
                    target_file: "bad.txt".to_string(),
                    substitute_variables: false,
                }],
            ),
        ]),
    );
    descriptor
        .after_deploy_hooks
        .insert(STAGE.to_string(), vec!["seedDatabase".to_string()]);

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert!(report.file_uploads[0].succeeded());
    assert!(!report.file_uploads[1].succeeded());
    assert_eq!(harness.store.object("assets-bucket", "good.txt").unwrap(), b"good");

    let warnings = report.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("locked-bucket"));
    assert_eq!(harness.invoker.invoked(), vec!["seedDatabase".to_string()]);
}

#[tokio::test]
async fn test_failing_hook_does_not_stop_the_others() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new().failing("warmCache"),
    );

    let mut descriptor = descriptor();
    descriptor.after_deploy_hooks.insert(
        STAGE.to_string(),
        vec![
            "seedDatabase".to_string(),
            "warmCache".to_string(),
            "notifyTeam".to_string(),
        ],
    );
    descriptor
        .after_deploy_hooks
        .insert("prod".to_string(), vec!["prodOnly".to_string()]);

    let report = assert_ok!(harness.orchestrator.deploy(&descriptor).await);

    assert_eq!(
        harness.invoker.invoked(),
        vec!["seedDatabase", "warmCache", "notifyTeam"]
    );
    assert_eq!(report.hooks.len(), 3);
    assert_eq!(report.hooks[0].outcome, HookOutcome::Invoked);
    assert!(matches!(report.hooks[1].outcome, HookOutcome::Failed { .. }));
    assert_eq!(report.hooks[2].outcome, HookOutcome::Invoked);
    assert_eq!(report.warnings().len(), 1);
}

#[tokio::test]
async fn test_load_descriptor_from_compiled_output() {
    let workspace = Workspace::new();
    std::fs::write(
        workspace.compiled().join("deployment-state.json"),
        r#"{
            "projectName": "shop",
            "compilationTimeStamp": "20240101120000",
            "afterDeployments": { "dev": ["seedDatabase"] }
        }"#,
    )
    .unwrap();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let descriptor = assert_ok!(harness.orchestrator.load_descriptor().await);

    assert_eq!(descriptor.project_name, PROJECT);
    assert_eq!(descriptor.hooks_for(STAGE), ["seedDatabase".to_string()]);
    assert!(!descriptor.assemble_mode);
}

#[tokio::test]
async fn test_missing_descriptor_is_a_load_error() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        workspace.config(),
        existing_stack(),
        MemoryObjectStore::new(),
        MemoryFunctionInvoker::new(),
    );

    let err = assert_err!(harness.orchestrator.load_descriptor().await);

    assert_eq!(err.step(), DeployStep::LoadDescriptor);
}
