use crate::deploy::{DeployReport, DestroyReport, HookOutcome};
use crate::provider::UpdateOutcome;
use serde::Serialize;

/// Print deployment results in human-readable format
pub fn print_deploy_report(report: &DeployReport) {
    println!("🚀 Deployment of {} ({})", report.stack, report.stage);
    println!("================================================");

    if report.stack_created {
        println!("  ✅ Stack created");
    }
    match report.update {
        UpdateOutcome::Accepted => println!("  ✅ Stack updated: {}", report.final_status),
        UpdateOutcome::NoChanges => println!("  ✅ Stack unchanged: {}", report.final_status),
    }
    println!("  📦 Deployment bucket: {}", report.bucket);

    println!();
    println!("📦 Code artifacts ({}):", report.artifacts.len());
    for artifact in &report.artifacts {
        println!(
            "  • {} ({} bytes, sha256 {})",
            artifact.key,
            artifact.size,
            &artifact.sha256[..12.min(artifact.sha256.len())]
        );
    }

    if !report.file_uploads.is_empty() {
        println!();
        println!("📁 File uploads:");
        for upload in &report.file_uploads {
            let icon = if upload.succeeded() { "✅" } else { "❌" };
            println!(
                "  {} {} → {}/{} ({} objects)",
                icon, upload.local_file, upload.bucket, upload.target_file, upload.uploaded_objects
            );
        }
    }

    if !report.hooks.is_empty() {
        println!();
        println!("⚡ After-deployment functions:");
        for hook in &report.hooks {
            match &hook.outcome {
                HookOutcome::Invoked => println!("  ✅ {}", hook.function_name),
                HookOutcome::Failed { error } => {
                    println!("  ⚠️  {}: {}", hook.function_name, error)
                }
            }
        }
    }

    let warnings = report.warnings();
    if !warnings.is_empty() {
        println!();
        println!("⚠️  Warnings:");
        for warning in &warnings {
            println!("  • {warning}");
        }
    }

    if !report.outputs.is_empty() {
        println!();
        for output in &report.outputs {
            println!("{}{}", output.message, output.value);
        }
    }

    let elapsed = report.completed_at - report.started_at;
    println!();
    println!("✅ Deployment completed in {}s", elapsed.num_seconds());
}

pub fn print_destroy_report(report: &DestroyReport) {
    println!("🗑️  Teardown of {}", report.stack);
    println!("================================================");

    if report.bucket_removed {
        println!("  ✅ Emptied and removed bucket {}", report.bucket);
    } else {
        println!("  ⚠️  Could not empty bucket {}", report.bucket);
    }
    println!("  ✅ Stack deleted: {}", report.final_status);

    let elapsed = report.completed_at - report.started_at;
    println!();
    println!("✅ Teardown completed in {}s", elapsed.num_seconds());
}

/// Print any run report as pretty JSON
pub fn print_report_json<T: Serialize>(report: &T) -> Result<(), serde_json::Error> {
    let json_output = serde_json::to_string_pretty(report)?;
    println!("{json_output}");
    Ok(())
}
