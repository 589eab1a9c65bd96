//! Command-line interface for stackdeploy.
//!
//! Provides commands for deploying a template, checking a stack's
//! status, and showing the resolved configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::{
    CodePackager, CommandPackager, ConsoleReporter, HttpStackService, StackService,
    TerminalPrompter, UnconfiguredPackager,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    locate, AbortReason, DeployOutcome, DeployRequest, Orchestrator, ParameterOverrides,
};
use crate::domain::Template;

/// Packaging a single function may take a while on large sources
const PACKAGER_TIMEOUT: Duration = Duration::from_secs(600);

/// stackdeploy - Change-set driven stack deployer
#[derive(Parser, Debug)]
#[command(name = "stackdeploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a template to a stack
    Deploy {
        /// Stack to create or update
        #[arg(short, long)]
        stack_name: String,

        /// Template file (YAML or JSON)
        #[arg(short, long, default_value = "template.yml")]
        template: PathBuf,

        /// Override a template parameter (key=value, repeatable)
        #[arg(short, long = "parameter-override", value_name = "KEY=VALUE")]
        parameter_override: Vec<String>,

        /// Answer yes to every confirmation
        #[arg(short = 'y', long)]
        assume_yes: bool,

        /// Stop waiting for the stack after this many seconds
        #[arg(long, value_name = "SECONDS")]
        poll_timeout: Option<u64>,
    },

    /// Show the current status of a stack
    Status {
        #[arg(short, long)]
        stack_name: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Deploy {
                stack_name,
                template,
                parameter_override,
                assume_yes,
                poll_timeout,
            } => {
                deploy(
                    &stack_name,
                    &template,
                    &parameter_override,
                    assume_yes,
                    poll_timeout,
                )
                .await
            }
            Commands::Status { stack_name } => show_status(&stack_name).await,
            Commands::Config => show_config(),
        }
    }
}

fn stack_service(cfg: &ResolvedConfig) -> Arc<dyn StackService> {
    Arc::new(HttpStackService::new(
        cfg.endpoint.clone(),
        cfg.profile.region.clone(),
        cfg.token.clone(),
    ))
}

fn code_packager(cfg: &ResolvedConfig) -> Result<Arc<dyn CodePackager>> {
    match &cfg.packager_command {
        Some(command) => Ok(Arc::new(CommandPackager::from_command_line(
            command,
            PACKAGER_TIMEOUT,
        )?)),
        None => Ok(Arc::new(UnconfiguredPackager)),
    }
}

/// Deploy a template
async fn deploy(
    stack_name: &str,
    template_path: &Path,
    overrides: &[String],
    assume_yes: bool,
    poll_timeout: Option<u64>,
) -> Result<()> {
    let cfg = config::config()?;

    let template = Template::from_file(template_path)?;
    let parameter_overrides = ParameterOverrides::parse_all(overrides.iter().map(String::as_str))?;

    let template_path = template_path
        .canonicalize()
        .with_context(|| format!("Failed to resolve template path: {}", template_path.display()))?;
    let base_dir = template_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = cfg.deploy.clone();
    if poll_timeout.is_some() {
        settings.poll_timeout_seconds = poll_timeout;
    }

    let orchestrator = Orchestrator::new(
        stack_service(cfg),
        code_packager(cfg)?,
        Arc::new(TerminalPrompter::new()),
        Arc::new(ConsoleReporter::new()),
        settings,
    );

    info!(stack = %stack_name, region = %cfg.profile.region, "Deploying");

    let outcome = orchestrator
        .deploy(DeployRequest {
            stack_name: stack_name.to_string(),
            template,
            template_path: Some(template_path),
            base_dir,
            parameter_overrides,
            assume_yes,
            profile: cfg.profile.clone(),
            packaged_template_path: cfg.packaged_template_path.clone(),
            remote_template_path: cfg.remote_template_path(),
        })
        .await?;

    match outcome {
        DeployOutcome::Deployed(report) => {
            let took = report.completed_at - report.started_at;
            println!(
                "\nStack '{}' deployed with {} change set {} in {}s",
                report.stack_name,
                report.change_set_type,
                report.change_set_id,
                took.num_seconds()
            );
            println!("Template snapshot: {}", report.remote_template_path.display());
        }
        DeployOutcome::UpToDate { stack_name } => {
            println!("No need to update, stack '{}' is already up to date", stack_name);
        }
        DeployOutcome::Aborted(AbortReason::DeclinedCleanup { status }) => {
            println!("Deployment aborted: stack left in status {}", status);
        }
        DeployOutcome::Aborted(AbortReason::DeclinedChangeSet) => {
            println!("Deployment aborted: change set discarded");
        }
    }

    Ok(())
}

/// Show the status of a stack
async fn show_status(stack_name: &str) -> Result<()> {
    let cfg = config::config()?;
    let service = stack_service(cfg);

    match locate(service.as_ref(), stack_name, cfg.deploy.stack_page_size).await? {
        Some(stack) => {
            println!("Stack:  {}", stack_name);
            println!("ID:     {}", stack.stack_id);
            println!("Status: {}", stack.status);
        }
        None => {
            println!("Stack '{}' not found in {}", stack_name, cfg.profile.region);
        }
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using defaults)".to_string()));
    println!();
    println!("Profile:");
    println!("  Region:     {}", cfg.profile.region);
    println!("  Account ID: {}", if cfg.profile.account_id.is_empty() { "(unset)" } else { cfg.profile.account_id.as_str() });
    println!("  Endpoint:   {}", cfg.endpoint);
    println!("  Token:      {}", if cfg.token.is_some() { "(set)" } else { "(unset)" });
    println!();
    println!("Paths:");
    println!("  Home:              {}", cfg.home.display());
    println!("  Work dir:          {}", cfg.work_dir.display());
    println!("  Packaged template: {}", cfg.packaged_template_path.display());
    println!("  Remote template:   {}", cfg.remote_template_path().display());
    println!("  Packager:          {}", cfg.packager_command.as_deref().unwrap_or("(none)"));
    println!();
    println!("Deploy settings:");
    let deploy = serde_yaml::to_string(&cfg.deploy).context("Failed to render deploy settings")?;
    for line in deploy.lines() {
        println!("  {}", line);
    }

    Ok(())
}
