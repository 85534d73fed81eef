//! App configuration file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretSlice;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::duration::GoDuration;
use crate::deploy::secrets::SecretPayloads;
use crate::deploy::spec::{AppDescription, HealthCheck, VolumeMount};
use crate::errors::HarborError;
use crate::filesys::file::File;
use crate::proxy::ProxyRoute;

pub const CONFIG_FILE: &str = "harbor.toml";
pub const DEFAULT_IMAGE: &str = "hashicorp/http-echo:latest";
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
pub const LOCAL_DOCKER_HOST_ENV: &str = "HARBOR_LOCAL_DOCKER_HOST";

/// Secrets whose key ends with this are read from the file named by the value
pub const SECRET_FILE_SUFFIX: &str = "_file";

/// Contents of `harbor.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub image: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub replicas: u64,

    /// Docker Engine endpoint, `DOCKER_HOST` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_host: Option<String>,

    /// Engine the image is built on, sent to `docker_host` before deploying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_docker_host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<PublicConfig>,

    /// Volume name to container path
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub label: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheckConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicConfig {
    pub address: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub test: Vec<String>,
    pub interval: GoDuration,
    pub timeout: GoDuration,
    pub start_period: GoDuration,
    pub start_interval: GoDuration,
    pub retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// `stop-first` or `start-first`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// How long swarm watches each updated task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<GoDuration>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl AppConfig {
    /// Default config for a new app
    pub fn new_default(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: DEFAULT_IMAGE.to_string(),
            ..Default::default()
        }
    }

    /// Read and validate the config file at `path`
    pub async fn load(path: &Path) -> Result<Self, HarborError> {
        let file = File::new(path);
        if !file.exists().await {
            return Err(HarborError::ConfigError(
                "config file does not exist, please run 'harbor init' first".to_string(),
            ));
        }

        let config = Self::parse(&file.read_string().await?)?;
        debug!("Loaded config for app {} from {}", config.name, path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, HarborError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarborError> {
        if self.name.trim().is_empty() {
            return Err(HarborError::ConfigError("'name' is required".to_string()));
        }
        if self.image.trim().is_empty() {
            return Err(HarborError::ConfigError("'image' is required".to_string()));
        }
        Ok(())
    }

    /// Write the config to `path`, owner-readable only
    pub async fn save(&self, path: &Path) -> Result<(), HarborError> {
        let contents =
            toml::to_string(self).map_err(|e| HarborError::ConfigError(e.to_string()))?;
        File::new(path).write_private(contents.as_bytes()).await
    }

    pub fn public_address(&self) -> Option<&str> {
        self.public
            .as_ref()
            .map(|p| p.address.as_str())
            .filter(|a| !a.is_empty())
    }

    /// Engine endpoint from the config or the environment
    pub fn docker_host(&self) -> Result<String, HarborError> {
        resolve_docker_host(
            self.docker_host.as_deref(),
            std::env::var(DOCKER_HOST_ENV).ok(),
        )
    }

    /// Engine to send the image from, if there is one
    pub fn local_docker_host(&self) -> Option<String> {
        self.local_docker_host
            .clone()
            .or_else(|| std::env::var(LOCAL_DOCKER_HOST_ENV).ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
    }

    /// Proxy routes for the public address, if any
    pub fn routes(&self) -> Vec<ProxyRoute> {
        self.public
            .iter()
            .filter(|p| !p.address.is_empty())
            .map(|p| ProxyRoute {
                address: p.address.clone(),
                target_port: p.target_port,
            })
            .collect()
    }

    pub fn to_description(&self) -> AppDescription {
        AppDescription {
            name: self.name.clone(),
            image: self.image.clone(),
            replicas: self.replicas,
            env: self.env.clone(),
            labels: self.label.clone(),
            health_check: self.healthcheck.as_ref().map(|hc| HealthCheck {
                test: hc.test.clone(),
                interval: hc.interval.into(),
                timeout: hc.timeout.into(),
                start_period: hc.start_period.into(),
                start_interval: hc.start_interval.into(),
                retries: hc.retries,
            }),
            volumes: self
                .volumes
                .iter()
                .map(|(source, target)| VolumeMount {
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect(),
            public_address: self.public_address().map(str::to_string),
            update_order: self.deploy.as_ref().and_then(|d| d.order.clone()),
            monitor_window: self
                .deploy
                .as_ref()
                .and_then(|d| d.monitor)
                .map(Into::into),
        }
    }

    /// Load secret payloads.
    ///
    /// Empty values are skipped. For keys ending in `_file` the value is a
    /// path, relative to `base_dir`, whose contents become the payload of
    /// the key without the suffix.
    pub async fn load_secrets(&self, base_dir: &Path) -> Result<SecretPayloads, HarborError> {
        let mut payloads = SecretPayloads::new();

        for (key, value) in &self.secrets {
            if value.is_empty() {
                continue;
            }

            match key.strip_suffix(SECRET_FILE_SUFFIX) {
                Some(name) => {
                    let path = resolve_path(base_dir, value);
                    let data = File::new(&path).read_bytes().await.map_err(|e| {
                        HarborError::ConfigError(format!(
                            "failed to read secret file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                    payloads.insert(name.to_string(), SecretSlice::from(data));
                }
                None => {
                    payloads.insert(key.clone(), SecretSlice::from(value.as_bytes().to_vec()));
                }
            }
        }

        Ok(payloads)
    }
}

pub fn resolve_docker_host(
    configured: Option<&str>,
    from_env: Option<String>,
) -> Result<String, HarborError> {
    configured
        .map(str::to_string)
        .or(from_env)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            HarborError::ConfigError(format!(
                "no docker host configured, set 'docker_host' in {} or {}",
                CONFIG_FILE, DOCKER_HOST_ENV
            ))
        })
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
