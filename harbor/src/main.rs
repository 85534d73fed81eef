//! Harbormaster - Entry Point
//!
//! Commands:
//! - `harbor init` - Write a default `harbor.toml`
//! - `harbor deploy` - Deploy the app and wait for the rollout
//! - `harbor destroy` - Remove the app from the swarm
//! - `harbor info` - Show the deployed state of the app
//! - `harbor prune` - Remove unused objects from the swarm manager
//! - `harbor version` - Print build information

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use harbormaster::config::CONFIG_FILE;
use harbormaster::deploy::scope::CancelScope;
use harbormaster::logs::{init_logging, LogLevel, LogOptions};
use tracing::{error, info};

use commands::{Context, DeployArgs, DestroyArgs, InitArgs, PruneArgs};

/// Deploy containerized apps to a Docker Swarm
#[derive(Parser)]
#[command(name = "harbor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Log in JSON format
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new app config
    Init(InitArgs),

    /// Deploy the app to the swarm
    Deploy(DeployArgs),

    /// Destroy the app and remove it from the swarm
    Destroy(DestroyArgs),

    /// Display information about the app
    Info,

    /// Remove unused containers, images, volumes and networks
    Prune(PruneArgs),

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_options = LogOptions {
        log_level: if cli.debug { LogLevel::Debug } else { LogLevel::default() },
        json_format: cli.log_json,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let interrupt = CancelScope::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            await_shutdown_signal().await;
            interrupt.cancel();
        });
    }

    let ctx = Context {
        config_path: cli.config,
        interrupt,
    };

    if let Err(e) = run(cli.command, &ctx).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Init(args) => commands::init::run(args, ctx).await,
        Commands::Deploy(args) => commands::deploy::run(args, ctx).await,
        Commands::Destroy(args) => commands::destroy::run(args, ctx).await,
        Commands::Info => commands::info::run(ctx).await,
        Commands::Prune(args) => commands::prune::run(args, ctx).await,
        Commands::Version => commands::version::run(),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    wait_ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, interrupting...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, interrupting...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, interrupting...");
            }
        }
    }

    #[cfg(not(unix))]
    wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, interrupting..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
