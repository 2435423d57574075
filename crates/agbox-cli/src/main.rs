//! agbox - run an AI coding agent inside a macOS sandbox.
//!
//! Builds a Seatbelt profile from the workspace, the agent, the security
//! mode and any explicit grants, then launches the command under
//! `sandbox-exec` and exits with the command's status.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use agbox_exec::{ChildExit, Phase, RunError, SupervisorConfig, run_sandboxed};
use agbox_policy::{AgentTag, LayerRegistry, Mode, PermissionFlag};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

pub mod config_bridge;
mod launch;

use config_bridge::CliOverrides;

/// Exit status for failures of agbox itself, as opposed to the child.
const FAILURE_EXIT: u8 = 125;

/// agbox - sandboxed launcher for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "agbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Security mode: strict, balanced or permissive
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Agent profile to apply (detected from the command name by default)
    #[arg(short, long)]
    agent: Option<String>,

    /// Workspace directory granted read/write (defaults to the current directory)
    #[arg(short = 'w', long)]
    work_dir: Option<PathBuf>,

    /// Allow reading SSH private keys
    #[arg(long)]
    allow_ssh_keys: bool,

    /// Allow reading `~/.env`, `~/.envrc` and `~/.env.*`
    #[arg(long)]
    allow_env_read: bool,

    /// Allow reading `~/.aws`
    #[arg(long)]
    allow_aws_config: bool,

    /// Allow reading Azure, Google Cloud and Kubernetes credentials
    #[arg(long)]
    allow_cloud_config: bool,

    /// Allow reading `~/.gnupg`
    #[arg(long)]
    allow_gpg_keys: bool,

    /// Allow reading git credential stores
    #[arg(long)]
    allow_git_credentials: bool,

    /// Extra path to allow reading (repeatable)
    #[arg(long = "allow-read", value_name = "PATH")]
    allow_read: Vec<String>,

    /// Extra path to allow reading and writing (repeatable)
    #[arg(long = "allow-write", value_name = "PATH")]
    allow_write: Vec<String>,

    /// Print the context and profile instead of running the command
    #[arg(long)]
    dry_run: bool,

    /// Write the profile to FILE instead of running the command
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enforcement facility (defaults to /usr/bin/sandbox-exec)
    #[arg(long, value_name = "PATH")]
    facility: Option<String>,

    /// Command to run inside the sandbox, followed by its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command_line: Vec<String>,
}

impl Cli {
    fn command(&self) -> &str {
        self.command_line.first().map_or("", String::as_str)
    }

    fn args(&self) -> &[String] {
        self.command_line.get(1..).unwrap_or_default()
    }

    fn flags(&self) -> Vec<PermissionFlag> {
        [
            (self.allow_ssh_keys, PermissionFlag::AllowSshKeys),
            (self.allow_env_read, PermissionFlag::AllowEnvRead),
            (self.allow_aws_config, PermissionFlag::AllowAwsConfig),
            (self.allow_cloud_config, PermissionFlag::AllowCloudConfig),
            (self.allow_gpg_keys, PermissionFlag::AllowGpgKeys),
            (self.allow_git_credentials, PermissionFlag::AllowGitCredentials),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(exit)) => ExitCode::from(u8::try_from(exit.code()).unwrap_or(u8::MAX)),
        Err(e) => {
            match e.downcast_ref::<RunError>() {
                Some(run_error) => eprintln!("agbox: {run_error}"),
                None => eprintln!("agbox: {e:#}"),
            }
            ExitCode::from(FAILURE_EXIT)
        },
    }
}

/// Returns `None` when nothing was executed.
async fn run(cli: Cli) -> Result<Option<ChildExit>> {
    let work_dir = match &cli.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read the current directory")?,
    };
    let work_dir = work_dir
        .canonicalize()
        .with_context(|| format!("workspace {} is not accessible", work_dir.display()))?;

    let resolved = agbox_config::Config::load(Some(&work_dir))?;
    let config = resolved.config;
    let home = agbox_config::loader::home_directory()?;

    let log_level_from_env = std::env::var_os("AGBOX_LOG").is_some();
    let log_config =
        config_bridge::to_log_config(&config, cli.verbose && !log_level_from_env, &home)?;
    if let Err(e) = agbox_telemetry::setup_logging(&log_config) {
        eprintln!("agbox: failed to initialize logging: {e}");
    }
    for path in &resolved.loaded_files {
        debug!(path = %path.display(), "Config file applied");
    }
    for notice in &resolved.notices {
        warn!("{notice}");
    }

    let registry = LayerRegistry::builtin();
    let agent = match &cli.agent {
        Some(name) => Some(AgentTag::new(name.as_str())),
        None => launch::detect_agent(cli.command(), &registry),
    };

    let overrides = CliOverrides {
        mode: cli.mode,
        agent,
        flags: cli.flags(),
        read_paths: cli.allow_read.clone(),
        write_paths: cli.allow_write.clone(),
        facility: cli.facility.clone(),
    };
    let ssh_agent_socket = config_bridge::ssh_agent_socket(std::env::var_os("SSH_AUTH_SOCK"));
    let ctx = config_bridge::to_compilation_context(
        &config,
        &overrides,
        work_dir,
        home,
        ssh_agent_socket,
    )?;

    if cli.dry_run || cli.output.is_some() {
        let profile = preview(&ctx, &registry)?;
        if let Some(path) = &cli.output {
            std::fs::write(path, &profile)
                .with_context(|| format!("failed to write profile to {}", path.display()))?;
            info!(path = %path.display(), "Profile written");
        }
        if cli.dry_run {
            print!("{}", launch::summary(&ctx)?);
            println!();
            print!("{profile}");
        }
        return Ok(None);
    }

    let args = launch::agent_args(cli.command(), cli.args().to_vec());
    let (command, args) = if launch::is_on_path(cli.command()) {
        (cli.command().to_owned(), args)
    } else {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| launch::FALLBACK_SHELL.to_owned());
        debug!(command = cli.command(), shell = %shell, "Command not on PATH, running through the shell");
        launch::through_shell(&shell, cli.command(), &args)
    };

    let supervisor = SupervisorConfig::new(config_bridge::facility(&config, &overrides));
    info!(
        mode = %ctx.mode(),
        agent = ctx.agent().map(AgentTag::as_str),
        work_dir = %ctx.work_dir().display(),
        "Starting sandbox"
    );
    let exit = run_sandboxed(&ctx, &registry, &supervisor, &command, &args).await?;
    Ok(Some(exit))
}

fn preview(
    ctx: &agbox_policy::CompilationContext,
    registry: &LayerRegistry,
) -> std::result::Result<String, RunError> {
    let policy =
        agbox_policy::compile(ctx, registry).map_err(|e| RunError::new(Phase::Compile, e))?;
    agbox_policy::render(&policy).map_err(|e| RunError::new(Phase::Render, e))
}
