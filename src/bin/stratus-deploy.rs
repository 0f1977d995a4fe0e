use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use stratus_deploy::cli::{
    print_deploy_report, print_destroy_report, print_report_json, Commands, StratusDeployCli,
};
use stratus_deploy::provider::aws_cli::AwsCli;
use stratus_deploy::provider::{AwsCliFunctionInvoker, AwsCliObjectStore, AwsCliStackProvider};
use stratus_deploy::{DeployConfig, DeployError, DeploymentOrchestrator, Providers};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StratusDeployCli::parse();

    let level = match cli.verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting stratus-deploy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => DeployConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DeployConfig::default(),
    };

    match &cli.command {
        Commands::Deploy(args) => args.apply(&mut config),
        Commands::Destroy(args) => args.apply(&mut config),
    }
    config.validate()?;

    let json = match cli.format.as_str() {
        "text" => false,
        "json" => true,
        other => anyhow::bail!("Unknown report format '{other}', expected text or json"),
    };

    let orchestrator = build_orchestrator(config);
    let descriptor = orchestrator.load_descriptor().await?;

    match cli.command {
        Commands::Deploy(_) => {
            let report = orchestrator.deploy(&descriptor).await.inspect_err(log_failure)?;
            if json {
                print_report_json(&report)?;
            } else {
                print_deploy_report(&report);
            }
        }
        Commands::Destroy(_) => {
            let report = orchestrator.destroy(&descriptor).await.inspect_err(log_failure)?;
            if json {
                print_report_json(&report)?;
            } else {
                print_destroy_report(&report);
            }
        }
    }

    Ok(())
}

fn log_failure(e: &DeployError) {
    error!(step = ?e.step(), "{e}");
}

fn build_orchestrator(config: DeployConfig) -> DeploymentOrchestrator {
    let cli = AwsCli::new(config.region.clone());
    let providers = Providers {
        stacks: Arc::new(AwsCliStackProvider::new(cli.clone())),
        store: Arc::new(AwsCliObjectStore::new(cli.clone())),
        invoker: Arc::new(AwsCliFunctionInvoker::new(cli)),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, stopping before the next step (press Ctrl-C again to abort)");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Interrupted twice, aborting");
            std::process::exit(130);
        }
    });

    DeploymentOrchestrator::new(config, providers).with_cancellation(cancel)
}
