//! CLI command implementations.

pub mod deploy;
pub mod destroy;
pub mod info;
pub mod init;
pub mod prune;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use harbormaster::config::AppConfig;
use harbormaster::deploy::scope::CancelScope;
use harbormaster::docker::client::{normalize_host, Options};
use harbormaster::docker::{ControlPlane, DockerClient};

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// App name (default: current directory name).
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    /// Give up waiting for the rollout after this long (e.g. `5m`).
    #[arg(long, value_parser = harbormaster::config::duration::parse_duration)]
    pub timeout: Option<std::time::Duration>,
}

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the prune command.
#[derive(Args)]
pub struct PruneArgs {
    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// State shared by all commands
pub struct Context {
    pub config_path: PathBuf,

    /// Cancelled when the operator interrupts the process
    pub interrupt: CancelScope,
}

impl Context {
    pub async fn app_config(&self) -> Result<AppConfig> {
        Ok(AppConfig::load(&self.config_path).await?)
    }

    /// Directory relative secret file paths are resolved against
    pub fn config_dir(&self) -> &Path {
        match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

/// Engine client for the app's docker host
pub fn connect(config: &AppConfig) -> Result<Arc<dyn ControlPlane>> {
    let options = Options {
        host: config.docker_host()?,
        ..Default::default()
    };
    let client = DockerClient::new(&options)
        .with_context(|| format!("failed to connect to {}", options.host))?;
    Ok(Arc::new(client))
}

/// Engine client for the local image store, `None` when it is the swarm
/// manager itself
pub fn connect_local(config: &AppConfig) -> Result<Option<Arc<dyn ControlPlane>>> {
    let Some(local) = config.local_docker_host() else {
        return Ok(None);
    };
    if normalize_host(&local)? == normalize_host(&config.docker_host()?)? {
        return Ok(None);
    }

    let options = Options {
        host: local,
        ..Default::default()
    };
    let client = DockerClient::new(&options)
        .with_context(|| format!("failed to connect to local engine {}", options.host))?;
    Ok(Some(Arc::new(client)))
}

/// Address other swarm nodes reach the manager at
pub fn advertise_host(config: &AppConfig) -> Result<String> {
    let host = normalize_host(&config.docker_host()?)?;
    let url = url::Url::parse(&host).with_context(|| format!("invalid docker host {}", host))?;
    url.host_str()
        .map(str::to_string)
        .with_context(|| format!("docker host {} has no host name", host))
}
