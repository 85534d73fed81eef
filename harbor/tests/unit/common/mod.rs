//! Scripted in-memory control plane shared by the tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use harbormaster::deploy::progress::ProgressSink;
use harbormaster::docker::{ControlPlane, EventFilter, EventStream, ImageArchive, TaskFilter};
use harbormaster::errors::ControlPlaneError;
use swarm_api::{
    ContainerInspect, ContainersPruneReport, EventActor, EventMessage, ExecInspect,
    ImageInspect, ImageSummary, ImagesPruneReport, LocalNodeState, Network, NetworkCreateRequest,
    NetworksPruneReport, ObjectVersion, SecretSpec, Service, ServiceSpec, ServiceUpdateStatus,
    SwarmInitRequest, SystemInfo, Task, TaskState, TaskStatus, UpdateState, VolumesPruneReport,
    SERVICE_ID_ATTRIBUTE,
};

/// Result of one `inspect_service` call
#[derive(Debug, Clone)]
pub enum Poll {
    Status(UpdateState, &'static str),
    NoStatus,
    Error,
}

impl Poll {
    pub fn state(state: UpdateState) -> Self {
        Poll::Status(state, "")
    }
}

#[derive(Default)]
pub struct FakeState {
    pub services: Vec<Service>,

    /// Consumed one per inspection, the last entry repeats
    pub polls: VecDeque<Poll>,

    pub tasks: Vec<Task>,
    pub fail_task_lookup: bool,

    /// Delivered on every subscription, then the feed stays open
    pub events: Vec<EventMessage>,
    /// Number of subscriptions to refuse before accepting
    pub refuse_subscriptions: usize,
    pub subscriptions: usize,

    pub containers: HashMap<String, ContainerInspect>,

    /// Secret key whose creation fails
    pub fail_secret: Option<String>,
    pub created_secrets: Vec<SecretSpec>,

    pub conflict_on_update: bool,
    pub created_services: Vec<ServiceSpec>,
    pub updates: Vec<(String, u64, ServiceSpec)>,
    pub removed: Vec<String>,

    pub node_state: LocalNodeState,
    pub swarm_inits: Vec<SwarmInitRequest>,
    pub networks: Vec<Network>,

    /// Commands run through `create_exec`
    pub execs: Vec<Vec<String>>,

    pub images: Vec<ImageSummary>,
    /// Served by `save_image`, in chunks
    pub image_archive: Vec<Vec<u8>>,
    /// Archives received by `load_image`
    pub loaded_images: Vec<Vec<u8>>,
    pub fail_image_load: bool,

    pub containers_prune: ContainersPruneReport,
    pub images_prune: ImagesPruneReport,
    pub volumes_prune: VolumesPruneReport,
    pub networks_prune: NetworksPruneReport,
    pub fail_prune: bool,

    /// Every call, by method name
    pub calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state(f: impl FnOnce(&mut FakeState)) -> Arc<Self> {
        let fake = Self::default();
        f(&mut fake.state.lock().unwrap());
        Arc::new(fake)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        state
    }
}

pub fn service(id: &str, name: &str, version: u64) -> Service {
    let mut service = Service {
        id: id.to_string(),
        version: ObjectVersion { index: version },
        ..Default::default()
    };
    service.spec.name = name.to_string();
    service
}

pub fn failed_task(service_id: &str, created_secs: i64, err: &str) -> Task {
    Task {
        id: format!("task-{}", created_secs),
        service_id: service_id.to_string(),
        created_at: chrono::DateTime::from_timestamp(created_secs, 0),
        status: TaskStatus {
            state: Some(TaskState::Failed),
            err: err.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn image(id: &str, tag: &str) -> ImageSummary {
    ImageSummary {
        id: id.to_string(),
        repo_tags: Some(vec![tag.to_string()]),
    }
}

pub fn container_event(service_id: &str, container: &str, action: &str) -> EventMessage {
    EventMessage {
        event_type: "container".to_string(),
        action: action.to_string(),
        actor: EventActor {
            id: container.to_string(),
            attributes: HashMap::from([
                (SERVICE_ID_ATTRIBUTE.to_string(), service_id.to_string()),
                ("name".to_string(), format!("{}.name", container)),
            ]),
        },
        ..Default::default()
    }
}

fn api_error(message: &str) -> ControlPlaneError {
    ControlPlaneError::Api {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_services(&self, name: &str) -> Result<Vec<Service>, ControlPlaneError> {
        let state = self.record("list_services");
        // the engine filter is a prefix match
        Ok(state
            .services
            .iter()
            .filter(|s| s.spec.name.starts_with(name))
            .cloned()
            .collect())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<String, ControlPlaneError> {
        let mut state = self.record("create_service");
        let id = format!("svc-{}", state.services.len() + 1);
        let mut created = service(&id, &spec.name, 1);
        created.spec = spec.clone();
        state.services.push(created);
        state.created_services.push(spec.clone());
        Ok(id)
    }

    async fn update_service(
        &self,
        id: &str,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.record("update_service");
        if state.conflict_on_update {
            return Err(ControlPlaneError::Conflict(
                "update out of sequence".to_string(),
            ));
        }
        let existing = state
            .services
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
        existing.version.index += 1;
        existing.spec = spec.clone();
        state.updates.push((id.to_string(), version, spec.clone()));
        Ok(())
    }

    async fn inspect_service(&self, id: &str) -> Result<Service, ControlPlaneError> {
        let mut state = self.record("inspect_service");
        let poll = if state.polls.len() > 1 {
            state.polls.pop_front()
        } else {
            state.polls.front().cloned()
        };

        let mut found = state
            .services
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;

        found.update_status = match poll {
            Some(Poll::Error) => return Err(api_error("engine unavailable")),
            Some(Poll::Status(state, message)) => Some(ServiceUpdateStatus {
                state: Some(state),
                message: message.to_string(),
                ..Default::default()
            }),
            Some(Poll::NoStatus) | None => None,
        };
        Ok(found)
    }

    async fn remove_service(&self, id: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.record("remove_service");
        state.services.retain(|s| s.id != id);
        state.removed.push(id.to_string());
        Ok(())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ControlPlaneError> {
        let state = self.record("list_tasks");
        if state.fail_task_lookup {
            return Err(api_error("task listing failed"));
        }
        Ok(state
            .tasks
            .iter()
            .filter(|t| filter.service.as_deref().is_none_or(|s| t.service_id == s))
            .cloned()
            .collect())
    }

    async fn create_secret(&self, spec: &SecretSpec) -> Result<String, ControlPlaneError> {
        let mut state = self.record("create_secret");
        let key = spec.labels.get("harbor.secret.key").cloned().unwrap_or_default();
        if state.fail_secret.as_deref() == Some(key.as_str()) {
            return Err(api_error("secret store full"));
        }
        state.created_secrets.push(spec.clone());
        Ok(format!("secret-{}", state.created_secrets.len()))
    }

    async fn subscribe_events(
        &self,
        _filter: &EventFilter,
    ) -> Result<EventStream, ControlPlaneError> {
        let mut state = self.record("subscribe_events");
        state.subscriptions += 1;
        if state.subscriptions <= state.refuse_subscriptions {
            return Err(api_error("event stream unavailable"));
        }
        let events: Vec<Result<EventMessage, ControlPlaneError>> =
            state.events.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(events)
            .chain(futures::stream::pending())
            .boxed())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, ControlPlaneError> {
        let state = self.record("inspect_container");
        state
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))
    }

    async fn system_info(&self) -> Result<SystemInfo, ControlPlaneError> {
        let state = self.record("system_info");
        let mut info = SystemInfo::default();
        info.swarm.local_node_state = state.node_state;
        Ok(info)
    }

    async fn init_swarm(&self, request: &SwarmInitRequest) -> Result<(), ControlPlaneError> {
        let mut state = self.record("init_swarm");
        state.swarm_inits.push(request.clone());
        state.node_state = LocalNodeState::Active;
        Ok(())
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError> {
        Ok(self.record("list_networks").networks.clone())
    }

    async fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> Result<String, ControlPlaneError> {
        let mut state = self.record("create_network");
        let id = format!("net-{}", state.networks.len() + 1);
        state.networks.push(Network {
            id: id.clone(),
            name: request.name.clone(),
            driver: request.driver.clone(),
        });
        Ok(id)
    }

    async fn create_exec(
        &self,
        _container_id: &str,
        cmd: &[String],
    ) -> Result<String, ControlPlaneError> {
        let mut state = self.record("create_exec");
        state.execs.push(cmd.to_vec());
        Ok(format!("exec-{}", state.execs.len()))
    }

    async fn start_exec(&self, _exec_id: &str) -> Result<(), ControlPlaneError> {
        self.record("start_exec");
        Ok(())
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect, ControlPlaneError> {
        self.record("inspect_exec");
        Ok(ExecInspect {
            id: exec_id.to_string(),
            running: false,
            exit_code: Some(0),
        })
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect, ControlPlaneError> {
        let state = self.record("inspect_image");
        state
            .images
            .iter()
            .find(|i| i.repo_tags.iter().flatten().any(|t| t == name))
            .map(|i| ImageInspect {
                id: i.id.clone(),
                repo_tags: i.repo_tags.clone(),
            })
            .ok_or_else(|| ControlPlaneError::NotFound(format!("No such image: {}", name)))
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, ControlPlaneError> {
        Ok(self.record("list_images").images.clone())
    }

    async fn save_image(&self, _name: &str) -> Result<ImageArchive, ControlPlaneError> {
        let state = self.record("save_image");
        let chunks: Vec<Result<Bytes, ControlPlaneError>> = state
            .image_archive
            .iter()
            .map(|c| Ok(Bytes::from(c.clone())))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn load_image(&self, mut archive: ImageArchive) -> Result<(), ControlPlaneError> {
        self.record("load_image");
        let mut data = Vec::new();
        while let Some(chunk) = archive.next().await {
            data.extend_from_slice(&chunk?);
        }

        let mut state = self.state();
        if state.fail_image_load {
            return Err(api_error("unexpected EOF"));
        }
        state.loaded_images.push(data);
        Ok(())
    }

    async fn prune_containers(&self) -> Result<ContainersPruneReport, ControlPlaneError> {
        let state = self.record("prune_containers");
        if state.fail_prune {
            return Err(api_error("a prune operation is already running"));
        }
        Ok(state.containers_prune.clone())
    }

    async fn prune_images(&self) -> Result<ImagesPruneReport, ControlPlaneError> {
        Ok(self.record("prune_images").images_prune.clone())
    }

    async fn prune_volumes(&self) -> Result<VolumesPruneReport, ControlPlaneError> {
        Ok(self.record("prune_volumes").volumes_prune.clone())
    }

    async fn prune_networks(&self) -> Result<NetworksPruneReport, ControlPlaneError> {
        Ok(self.record("prune_networks").networks_prune.clone())
    }
}

/// Collects progress lines
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }
}

impl ProgressSink for MemorySink {
    fn line(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}
