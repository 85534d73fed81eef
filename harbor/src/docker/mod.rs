//! Cluster control-plane access

pub mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use swarm_api::{
    ContainerInspect, ContainersPruneReport, EventMessage, ExecInspect, ImageInspect,
    ImageSummary, ImagesPruneReport, Network, NetworkCreateRequest, NetworksPruneReport,
    SecretSpec, Service, ServiceSpec, SwarmInitRequest, SystemInfo, Task, VolumesPruneReport,
};

use crate::errors::ControlPlaneError;

pub use client::DockerClient;

/// Live feed of engine events
pub type EventStream = BoxStream<'static, Result<EventMessage, ControlPlaneError>>;

/// Image tarball as produced by `save_image` and consumed by `load_image`
pub type ImageArchive = BoxStream<'static, Result<Bytes, ControlPlaneError>>;

/// Operations harbormaster needs from the swarm control plane.
///
/// Implementations must be cheap to share between tasks; the deploy
/// pipeline holds them as `Arc<dyn ControlPlane>`.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Services whose name matches the engine's name filter. The filter is
    /// a prefix match, callers compare names themselves.
    async fn list_services(&self, name: &str) -> Result<Vec<Service>, ControlPlaneError>;

    async fn create_service(&self, spec: &ServiceSpec) -> Result<String, ControlPlaneError>;

    async fn update_service(
        &self,
        id: &str,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ControlPlaneError>;

    async fn inspect_service(&self, id: &str) -> Result<Service, ControlPlaneError>;

    async fn remove_service(&self, id: &str) -> Result<(), ControlPlaneError>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ControlPlaneError>;

    async fn create_secret(&self, spec: &SecretSpec) -> Result<String, ControlPlaneError>;

    async fn subscribe_events(&self, filter: &EventFilter)
        -> Result<EventStream, ControlPlaneError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, ControlPlaneError>;

    async fn system_info(&self) -> Result<SystemInfo, ControlPlaneError>;

    async fn init_swarm(&self, request: &SwarmInitRequest) -> Result<(), ControlPlaneError>;

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError>;

    async fn create_network(&self, request: &NetworkCreateRequest)
        -> Result<String, ControlPlaneError>;

    async fn create_exec(&self, container_id: &str, cmd: &[String])
        -> Result<String, ControlPlaneError>;

    async fn start_exec(&self, exec_id: &str) -> Result<(), ControlPlaneError>;

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect, ControlPlaneError>;

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect, ControlPlaneError>;

    async fn list_images(&self) -> Result<Vec<ImageSummary>, ControlPlaneError>;

    /// Export `name` as a tar archive, streamed
    async fn save_image(&self, name: &str) -> Result<ImageArchive, ControlPlaneError>;

    /// Import an archive produced by `save_image`
    async fn load_image(&self, archive: ImageArchive) -> Result<(), ControlPlaneError>;

    async fn prune_containers(&self) -> Result<ContainersPruneReport, ControlPlaneError>;

    async fn prune_images(&self) -> Result<ImagesPruneReport, ControlPlaneError>;

    async fn prune_volumes(&self) -> Result<VolumesPruneReport, ControlPlaneError>;

    async fn prune_networks(&self) -> Result<NetworksPruneReport, ControlPlaneError>;
}

/// Filter for `list_tasks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub service: Option<String>,
    pub desired_state: Option<String>,
}

impl TaskFilter {
    pub fn service(service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            desired_state: None,
        }
    }

    pub fn running(mut self) -> Self {
        self.desired_state = Some("running".to_string());
        self
    }

    /// Engine `filters` query value
    pub fn to_query(&self) -> String {
        let mut filters = BTreeMap::new();
        if let Some(service) = &self.service {
            filters.insert("service", vec![service.as_str()]);
        }
        if let Some(state) = &self.desired_state {
            filters.insert("desired-state", vec![state.as_str()]);
        }
        encode_filters(&filters)
    }
}

/// Filter for `subscribe_events`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: Option<String>,
}

impl EventFilter {
    pub fn containers() -> Self {
        Self {
            event_type: Some("container".to_string()),
        }
    }

    pub fn to_query(&self) -> String {
        let mut filters = BTreeMap::new();
        if let Some(event_type) = &self.event_type {
            filters.insert("type", vec![event_type.as_str()]);
        }
        encode_filters(&filters)
    }
}

pub(crate) fn encode_filters(filters: &BTreeMap<&str, Vec<&str>>) -> String {
    // a map of string slices always serializes
    serde_json::to_string(filters).unwrap_or_else(|_| "{}".to_string())
}
