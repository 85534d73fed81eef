//! Create-or-update of the app's service

use swarm_api::ServiceSpec;
use tracing::info;

use crate::deploy::progress;
use crate::docker::ControlPlane;
use crate::errors::{ControlPlaneError, HarborError};

/// Identity of a reconciled service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub id: String,
    pub name: String,

    /// Version the update was submitted against, unset for a fresh create
    pub version: Option<u64>,
}

/// Find a service by exact name
pub async fn find_service(
    client: &dyn ControlPlane,
    name: &str,
) -> Result<Option<swarm_api::Service>, HarborError> {
    let services = client.list_services(name).await?;
    Ok(services.into_iter().find(|s| s.spec.name == name))
}

/// Create the service described by `spec`, or update it if it exists.
///
/// The service is looked up once; the version used for the update comes
/// from that read. Returns the handle and the progress line to show.
pub async fn reconcile(
    client: &dyn ControlPlane,
    spec: &ServiceSpec,
) -> Result<(ServiceHandle, String), HarborError> {
    let name = spec.name.clone();

    match find_service(client, &name).await? {
        Some(existing) => {
            let version = existing.version.index;
            info!("Updating service {} ({}) at version {}", name, existing.id, version);

            client
                .update_service(&existing.id, version, spec)
                .await
                .map_err(|e| match e {
                    ControlPlaneError::Conflict(message) => HarborError::UpdateConflict {
                        service: name.clone(),
                        message,
                    },
                    other => HarborError::ControlPlane(other),
                })?;

            let line = progress::harbor(format!("updating service '{}'...", name));
            Ok((
                ServiceHandle {
                    id: existing.id,
                    name,
                    version: Some(version),
                },
                line,
            ))
        }
        None => {
            info!("Creating service {}", name);
            let id = client.create_service(spec).await?;

            let line = progress::harbor(format!("creating service '{}'...", name));
            Ok((
                ServiceHandle {
                    id,
                    name,
                    version: None,
                },
                line,
            ))
        }
    }
}
