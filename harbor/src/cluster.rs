//! Swarm and network preparation

use std::collections::BTreeMap;

use swarm_api::{LocalNodeState, NetworkCreateRequest, SwarmInitRequest, SwarmSpec};
use tracing::info;

use crate::deploy::progress::{self, ProgressSink};
use crate::docker::ControlPlane;
use crate::errors::{ControlPlaneError, HarborError};

/// Network every app service is attached to
pub const INTERNAL_NETWORK: &str = "harbor-internal";

/// Network shared between public apps and the reverse proxy
pub const PUBLIC_NETWORK: &str = "harbor-public";

/// Label set on swarms initialised by harbormaster
pub const SWARM_LABEL: &str = "harbor.managed";

pub const SWARM_LISTEN_ADDR: &str = "0.0.0.0:2377";

/// Make sure the node is a swarm manager and the overlay networks exist
pub async fn prepare(
    client: &dyn ControlPlane,
    advertise_host: &str,
    sink: &dyn ProgressSink,
) -> Result<(), HarborError> {
    if is_swarm_inactive(client).await? {
        sink.line(&progress::harbor("initializing swarm..."));
        init_swarm(client, advertise_host).await?;
    }

    for name in [INTERNAL_NETWORK, PUBLIC_NETWORK] {
        if create_network_if_missing(client, name).await? {
            sink.line(&progress::harbor(format!("created network '{}'", name)));
        }
    }
    Ok(())
}

pub async fn is_swarm_inactive(client: &dyn ControlPlane) -> Result<bool, HarborError> {
    let info = client
        .system_info()
        .await
        .map_err(|e| HarborError::ClusterError(format!("failed to get info: {}", e)))?;
    Ok(info.swarm.local_node_state == LocalNodeState::Inactive)
}

pub async fn init_swarm(client: &dyn ControlPlane, advertise_host: &str) -> Result<(), HarborError> {
    let request = SwarmInitRequest {
        listen_addr: SWARM_LISTEN_ADDR.to_string(),
        advertise_addr: advertise_host.to_string(),
        spec: SwarmSpec {
            labels: BTreeMap::from([(SWARM_LABEL.to_string(), "true".to_string())]),
        },
    };

    client
        .init_swarm(&request)
        .await
        .map_err(|e| HarborError::ClusterError(format!("failed to initialize swarm: {}", e)))?;
    info!("Initialized swarm advertising {}", advertise_host);
    Ok(())
}

/// Returns true if the network had to be created
pub async fn create_network_if_missing(
    client: &dyn ControlPlane,
    name: &str,
) -> Result<bool, HarborError> {
    let networks = client
        .list_networks()
        .await
        .map_err(|e| HarborError::ClusterError(format!("failed to list networks: {}", e)))?;
    if networks.iter().any(|n| n.name == name) {
        return Ok(false);
    }

    let id = client
        .create_network(&NetworkCreateRequest::overlay(name))
        .await
        .map_err(|e| {
            HarborError::ClusterError(format!("failed to create network {}: {}", name, e))
        })?;
    info!("Created overlay network {} ({})", name, id);
    Ok(true)
}

/// Remove unused containers, images, volumes and networks on the node
pub async fn prune(
    client: &dyn ControlPlane,
    sink: &dyn ProgressSink,
) -> Result<(), HarborError> {
    sink.line(&progress::harbor("prune containers..."));
    let report = client
        .prune_containers()
        .await
        .map_err(|e| prune_error("containers", e))?;
    sink.line(&deleted_line(
        "containers",
        report.containers_deleted.unwrap_or_default(),
    ));

    sink.line(&progress::harbor("prune images..."));
    let report = client
        .prune_images()
        .await
        .map_err(|e| prune_error("images", e))?;
    let count = report.images_deleted.map_or(0, |items| items.len());
    sink.line(&progress::harbor(if count == 0 {
        "no images deleted".to_string()
    } else {
        format!("deleted images: {}", count)
    }));

    sink.line(&progress::harbor("prune volumes..."));
    let report = client
        .prune_volumes()
        .await
        .map_err(|e| prune_error("volumes", e))?;
    sink.line(&deleted_line("volumes", report.volumes_deleted.unwrap_or_default()));

    sink.line(&progress::harbor("prune networks..."));
    let report = client
        .prune_networks()
        .await
        .map_err(|e| prune_error("networks", e))?;
    sink.line(&deleted_line("networks", report.networks_deleted.unwrap_or_default()));

    info!("Pruned unused objects on the node");
    Ok(())
}

fn prune_error(what: &str, e: ControlPlaneError) -> HarborError {
    HarborError::ClusterError(format!("failed to prune {}: {}", what, e))
}

fn deleted_line(what: &str, deleted: Vec<String>) -> String {
    if deleted.is_empty() {
        progress::harbor(format!("no {} deleted", what))
    } else {
        progress::harbor(format!("deleted {}: {}", what, deleted.join(", ")))
    }
}
