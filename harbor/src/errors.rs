//! Error types for harbormaster

use thiserror::Error;

/// Main error type for harbormaster
#[derive(Error, Debug)]
pub enum HarborError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("invalid update order: {0} (expected start-first or stop-first)")]
    InvalidUpdateOrder(String),

    #[error("creating secret '{key}': {source}")]
    SecretCreationFailed {
        key: String,
        #[source]
        source: ControlPlaneError,
    },

    #[error("service '{service}' changed since it was read, re-run the deploy: {message}")]
    UpdateConflict { service: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cluster error: {0}")]
    ClusterError(String),

    #[error("Proxy error: {0}")]
    ProxyError(String),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Failures reported by the cluster control plane
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("control plane returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid docker host: {0}")]
    InvalidHost(String),
}

impl ControlPlaneError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ControlPlaneError::Conflict(_))
    }
}
