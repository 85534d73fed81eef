//! Deployment of an app as a swarm service

pub mod monitor;
pub mod progress;
pub mod reconcile;
pub mod rollout;
pub mod scope;
pub mod secrets;
pub mod spec;
pub mod wait;
pub mod watcher;

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::docker::ControlPlane;
use crate::errors::HarborError;

use self::progress::ProgressSink;
use self::rollout::RolloutOutcome;
use self::scope::CancelScope;
use self::secrets::{SecretNamer, SecretPayloads};
use self::spec::AppDescription;
use self::wait::WaitOptions;

/// Final result of a deploy call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Rollout completed
    Success,

    /// Rollout paused by the swarm
    Paused,

    /// Update failed and was rolled back
    RolledBack,

    /// Update failed and the rollback paused
    RollbackPaused,

    /// Interrupted by the operator
    Cancelled,

    /// Cancelled by the caller
    ContextCancelled,

    /// Wait ended without an outcome from the swarm
    Failed(String),
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Success)
    }
}

impl From<RolloutOutcome> for DeployOutcome {
    fn from(outcome: RolloutOutcome) -> Self {
        match outcome {
            RolloutOutcome::Completed => DeployOutcome::Success,
            RolloutOutcome::Paused => DeployOutcome::Paused,
            RolloutOutcome::RollbackPaused => DeployOutcome::RollbackPaused,
            RolloutOutcome::RolledBack => DeployOutcome::RolledBack,
        }
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Success => f.write_str("deployed successfully"),
            DeployOutcome::Paused => f.write_str("update paused"),
            DeployOutcome::RolledBack => f.write_str("update failed and was rolled back"),
            DeployOutcome::RollbackPaused => f.write_str("update failed and the rollback paused"),
            DeployOutcome::Cancelled => f.write_str("interrupted"),
            DeployOutcome::ContextCancelled => f.write_str("cancelled"),
            DeployOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything needed to deploy one app
#[derive(Debug, Default)]
pub struct DeployRequest {
    pub app: AppDescription,
    pub secrets: SecretPayloads,
}

/// Deploy `request.app` and wait for the swarm to finish rolling it out.
///
/// The update order is validated before any control-plane call. Secrets are
/// created first, then the service is created or updated, then the rollout
/// is watched until it settles or one of the scopes is cancelled.
pub async fn deploy_app(
    client: Arc<dyn ControlPlane>,
    request: &DeployRequest,
    options: WaitOptions,
    sink: &dyn ProgressSink,
    parent: &CancelScope,
    interrupt: &CancelScope,
) -> Result<DeployOutcome, HarborError> {
    let app = &request.app;
    app.update_order()?;

    let secrets =
        secrets::provision(client.as_ref(), &app.name, &request.secrets, &SecretNamer).await?;
    let service_spec = spec::build_service_spec(app, &secrets)?;

    let (handle, line) = reconcile::reconcile(client.as_ref(), &service_spec).await?;
    sink.line(&line);
    info!("Waiting for rollout of {} ({})", handle.name, handle.id);

    Ok(wait::wait_for_rollout(client, &handle.id, options, sink, parent, interrupt).await)
}
