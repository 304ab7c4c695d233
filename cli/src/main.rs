//! runguard CLI - run a command under a deadline.
//!
//! ```text
//! main() -> load config -> init_tracing() -> GuardSettings::resolve()
//!                                                   |
//!                                                   v
//!                          ExecutionGuard::run(root scope, child process)
//!                                                   |
//!                                                   v
//!                                 exit code (child's own, 124, 125, 127, 130)
//! ```
//!
//! Ctrl-C cancels the root scope; the run settles as cancelled and the child is
//! killed.

mod exec;

use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use runguard_config::{GuardSettings, RunguardConfig, config_path};
use runguard_core::{CancelScope, ExecutionGuard};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "runguard", version, about = "Run a command under a deadline")]
struct Cli {
    /// Config file. Defaults to $RUNGUARD_CONFIG, then ~/.runguard/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run PROGRAM, giving up after the deadline.
    Exec {
        /// Deadline in milliseconds. Overrides RUNGUARD_TIMEOUT_MS and the config file.
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Program and arguments, after `--`.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Print the effective guard settings and where they came from.
    Settings {
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing(config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(stderr().is_terminal()),
        )
        .with(env_filter)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<Option<RunguardConfig>> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            RunguardConfig::load_from(path).context("failed to load config")
        }
        None => RunguardConfig::load().context("failed to load config"),
    }
}

fn spawn_interrupt_handler(root: &CancelScope) {
    let scope = root.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received; cancelling run");
                scope.cancel();
            }
            Err(err) => tracing::warn!("Failed to listen for Ctrl-C: {err}"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            // No usable logging section; report with the default filter.
            init_tracing(None);
            tracing::error!("{err:#}");
            return Err(err);
        }
    };
    init_tracing(config.as_ref().and_then(RunguardConfig::log_filter));

    match cli.command {
        Command::Exec { timeout_ms, argv } => {
            let settings = GuardSettings::resolve(config.as_ref(), timeout_ms)?;
            let guard = ExecutionGuard::new(settings.deadline);

            let root = CancelScope::new();
            spawn_interrupt_handler(&root);

            Ok(exec::run(guard, &root, argv).await)
        }
        Command::Settings { timeout_ms } => {
            let settings = GuardSettings::resolve(config.as_ref(), timeout_ms)?;
            let path = cli
                .config
                .or_else(config_path)
                .map_or_else(|| "<none>".to_string(), |p| p.display().to_string());

            println!("config     {path}");
            println!("timeout_ms {}", settings.deadline.as_millis());
            println!("source     {}", settings.source);
            Ok(ExitCode::SUCCESS)
        }
    }
}
