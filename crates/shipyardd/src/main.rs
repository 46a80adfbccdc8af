//! shipyardd — the Shipyard daemon.
//!
//! Assembles the Shipyard subsystems around one `shipyard.toml`:
//! - State store (redb)
//! - Routing registry (names persisted in the state store)
//! - Env regeneration queue (newline-delimited JSON over TCP) and its worker
//!
//! # Usage
//!
//! ```text
//! shipyardd check-config --config /etc/shipyard/shipyard.toml
//! shipyardd apps --config /etc/shipyard/shipyard.toml --team red
//! shipyardd worker --config /etc/shipyard/shipyard.toml --ssh-user ubuntu
//! shipyardd regenerate --config /etc/shipyard/shipyard.toml myapp
//! shipyardd regenerate --config /etc/shipyard/shipyard.toml --queue myapp
//! ```

mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use shipyard_app::{App, Platform, PlatformConfig, User, handle_message, run_worker};
use shipyard_queue::{Enqueuer, Message, TcpDialer};
use shipyard_router::{MemoryRouter, MemoryRouterConfig};
use shipyard_state::StateStore;

use crate::local::{ShellExecutor, Unmanaged};

#[derive(Parser)]
#[command(name = "shipyardd", about = "Shipyard daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a config file and print the effective configuration.
    CheckConfig {
        #[arg(long, default_value = "/etc/shipyard/shipyard.toml")]
        config: PathBuf,
    },

    /// List persisted apps as JSON, one per line.
    Apps {
        #[arg(long, default_value = "/etc/shipyard/shipyard.toml")]
        config: PathBuf,

        /// Only show apps shared with these teams. All apps when omitted.
        #[arg(long = "team")]
        teams: Vec<String>,
    },

    /// Consume env regeneration requests until interrupted.
    Worker {
        #[arg(long, default_value = "/etc/shipyard/shipyard.toml")]
        config: PathBuf,

        /// Reach units over ssh as this user instead of the local shell.
        #[arg(long)]
        ssh_user: Option<String>,
    },

    /// Rewrite the env file on every unit of the given apps.
    Regenerate {
        #[arg(long, default_value = "/etc/shipyard/shipyard.toml")]
        config: PathBuf,

        #[arg(long)]
        ssh_user: Option<String>,

        /// Hand the requests to the running worker instead of applying them here.
        #[arg(long)]
        queue: bool,

        #[arg(required = true)]
        apps: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shipyard=debug,shipyardd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { config } => check_config(&config),
        Command::Apps { config, teams } => list_apps(&config, teams),
        Command::Worker { config, ssh_user } => run_daemon_worker(&config, ssh_user).await,
        Command::Regenerate {
            config,
            ssh_user,
            queue,
            apps,
        } => regenerate(&config, ssh_user, queue, &apps),
    }
}

fn load_config(path: &Path) -> anyhow::Result<PlatformConfig> {
    PlatformConfig::from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

/// Wire a platform around the configured store. Queued work is published
/// over TCP to `queue.server`.
fn build_platform(config: PlatformConfig, ssh_user: Option<String>) -> anyhow::Result<Platform> {
    if let Some(dir) = config.state.path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = StateStore::open(&config.state.path)?;
    info!(path = ?config.state.path, "state store opened");

    let router = MemoryRouter::new(
        Arc::new(store.clone()),
        MemoryRouterConfig {
            domain: config.router.domain.clone(),
            ..Default::default()
        },
    );
    info!(domain = %config.router.domain, "router initialized");

    let enqueuer = Enqueuer::new(Arc::new(TcpDialer), config.queue.server.clone());
    let unmanaged = Arc::new(Unmanaged);

    let platform = Platform {
        config,
        store,
        router: Arc::new(router),
        enqueuer,
        provisioner: unmanaged.clone(),
        storage: unmanaged.clone(),
        repository: unmanaged.clone(),
        executor: Arc::new(ShellExecutor::new(ssh_user)),
        unbinder: unmanaged,
    };
    Ok(platform)
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    if config.queue.server.is_none() {
        warn!("queue.server is not set; queued env propagation will fail");
    }
    if config.git.unit_repo.is_none() {
        warn!("git.unit_repo is not set; restart hooks cannot be loaded");
    }
    print!("{}", config.to_toml_string()?);
    info!(path = %path.display(), "config ok");
    Ok(())
}

fn list_apps(path: &Path, teams: Vec<String>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let platform = build_platform(config, None)?;
    let user = User {
        admin: teams.is_empty(),
        teams,
        ..Default::default()
    };
    for app in App::list(&platform, &user)? {
        println!("{}", serde_json::to_string(&app.view(&platform))?);
    }
    Ok(())
}

async fn run_daemon_worker(path: &Path, ssh_user: Option<String>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let server = config
        .queue
        .server
        .clone()
        .context("queue.server must be set to run the worker")?;
    let platform = build_platform(config, ssh_user)?;
    let (addr, subscription) = shipyard_queue::listen(&server)
        .await
        .with_context(|| format!("listening on {server}"))?;
    info!(%addr, "worker listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(Arc::new(platform), subscription, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    worker.await?;

    info!("shipyardd worker stopped");
    Ok(())
}

fn regenerate(
    path: &Path,
    ssh_user: Option<String>,
    queue: bool,
    apps: &[String],
) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let platform = build_platform(config, ssh_user)?;
    for app in apps {
        if queue {
            platform
                .enqueuer
                .enqueue_env_regeneration(app)
                .with_context(|| format!("enqueueing env regeneration for {app}"))?;
            continue;
        }
        handle_message(&platform, &Message::regenerate_apprc(app))
            .with_context(|| format!("regenerating env for {app}"))?;
        info!(app = %app, "env regenerated");
    }
    Ok(())
}
