use crate::config::DeployConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Deploys a packaged application to its infrastructure stack
#[derive(Parser)]
#[command(name = "stratus-deploy")]
#[command(about = "Create, update and tear down application stacks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct StratusDeployCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML or JSON); flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Report format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update the stack and upload the application
    Deploy(DeployArgs),

    /// Empty the deployment bucket and delete the stack
    Destroy(StackArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// Region to deploy to [default: eu-west-1]
    #[arg(long)]
    pub region: Option<String>,

    /// Stage to deploy [default: dev]
    #[arg(long)]
    pub stage: Option<String>,

    /// Directory with the generated templates and descriptor
    /// [default: target/generated-sources/annotations/]
    #[arg(long)]
    pub compiled_source_path: Option<PathBuf>,

    /// Give up waiting for the stack after this many seconds
    #[arg(long)]
    pub poll_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Single deployable artifact [default: target/functions.jar]
    #[arg(long)]
    pub artifact_path: Option<PathBuf>,

    /// Directory of per-handler artifacts [default: target/]
    #[arg(long)]
    pub assembled_dir: Option<PathBuf>,
}

impl StackArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(stage) = &self.stage {
            config.stage = stage.clone();
        }
        if let Some(path) = &self.compiled_source_path {
            config.compiled_source_path = path.clone();
        }
        if let Some(secs) = self.poll_timeout {
            config.poll.deadline = Some(Duration::from_secs(secs));
        }
    }
}

impl DeployArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        self.stack.apply(config);
        if let Some(path) = &self.artifact_path {
            config.artifact_path = path.clone();
        }
        if let Some(dir) = &self.assembled_dir {
            config.assembled_dir = dir.clone();
        }
    }
}
