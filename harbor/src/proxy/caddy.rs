//! Caddy reverse proxy running as a swarm service

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swarm_api::{
    ContainerSpec, EndpointSpec, Mount, MountType, NetworkAttachmentConfig, PortConfig,
    PortProtocol, PublishMode, ReplicatedService, RestartCondition, RestartPolicy, ServiceMode,
    ServiceSpec, TaskSpec, TaskState,
};
use tracing::{debug, info, warn};

use crate::cluster::PUBLIC_NETWORK;
use crate::deploy::progress::{self, ProgressSink};
use crate::deploy::reconcile::find_service;
use crate::deploy::scope::CancelScope;
use crate::deploy::spec::local_log_driver;
use crate::docker::{ControlPlane, TaskFilter};
use crate::errors::HarborError;
use crate::proxy::{ProxyRoute, ProxyWriter};

pub const SERVICE_NAME: &str = "harbor-caddy";
pub const IMAGE: &str = "caddy:latest";
pub const DATA_VOLUME: &str = "caddy_data";
pub const SITES_VOLUME: &str = "caddy_sites";
pub const SITES_DIR: &str = "/etc/caddy/sites";
pub const CADDYFILE: &str = "/etc/caddy/Caddyfile";

/// Caddy proxy options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between exec inspections
    pub exec_poll_interval: Duration,

    /// Interval between task listings while waiting for the proxy to start
    pub ready_poll_interval: Duration,

    /// How long a freshly created proxy may take to get a running task
    pub ready_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            exec_poll_interval: Duration::from_millis(500),
            ready_poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(120),
        }
    }
}

/// Proxy backed by the `harbor-caddy` service.
///
/// Each app owns one site fragment under `/etc/caddy/sites`, imported by
/// the main Caddyfile. Fragments are written by running commands inside the
/// proxy container.
pub struct CaddyProxy {
    client: Arc<dyn ControlPlane>,
    options: Options,
}

impl CaddyProxy {
    pub fn new(client: Arc<dyn ControlPlane>, options: Options) -> Self {
        Self { client, options }
    }

    /// Create the proxy service if it does not exist and wait for it to run
    pub async fn ensure_service(
        &self,
        sink: &dyn ProgressSink,
        scope: &CancelScope,
    ) -> Result<(), HarborError> {
        if find_service(self.client.as_ref(), SERVICE_NAME).await?.is_some() {
            debug!("Proxy service {} already exists", SERVICE_NAME);
            return Ok(());
        }

        sink.line(&progress::harbor(format!(
            "creating proxy service '{}'...",
            SERVICE_NAME
        )));
        let id = self
            .client
            .create_service(&service_spec())
            .await
            .map_err(|e| HarborError::ProxyError(format!("failed to create Caddy service: {}", e)))?;
        info!("Created proxy service {} ({})", SERVICE_NAME, id);

        let ready = tokio::select! {
            _ = scope.cancelled() => {
                Err(HarborError::ProxyError("cancelled while waiting for the proxy".to_string()))
            }
            ready = tokio::time::timeout(self.options.ready_timeout, self.wait_running(&id)) => {
                ready.unwrap_or_else(|_| Err(HarborError::ProxyError(format!(
                    "proxy service did not start within {:?}",
                    self.options.ready_timeout
                ))))
            }
        };
        ready?;

        sink.line(&progress::harbor(format!("proxy service '{}' is running.", SERVICE_NAME)));
        Ok(())
    }

    async fn wait_running(&self, service_id: &str) -> Result<(), HarborError> {
        let filter = TaskFilter::service(service_id).running();
        loop {
            match self.client.list_tasks(&filter).await {
                Ok(tasks) if tasks.iter().any(|t| t.state() == Some(TaskState::Running)) => {
                    return Ok(())
                }
                Ok(_) => debug!("Proxy service has no running task yet"),
                Err(e) => warn!("Failed to list proxy tasks: {}", e),
            }
            tokio::time::sleep(self.options.ready_poll_interval).await;
        }
    }

    async fn container_id(&self) -> Result<String, HarborError> {
        let service = find_service(self.client.as_ref(), SERVICE_NAME)
            .await?
            .ok_or_else(|| HarborError::ProxyError("Caddy service not found".to_string()))?;

        let tasks = self
            .client
            .list_tasks(&TaskFilter::service(&service.id).running())
            .await?;
        tasks
            .iter()
            .find_map(|t| t.container_id())
            .map(str::to_string)
            .ok_or_else(|| {
                HarborError::ProxyError("no running tasks found for Caddy service".to_string())
            })
    }

    /// Run `cmd` in the proxy container and wait for it to exit
    pub async fn exec(&self, cmd: &[&str]) -> Result<(), HarborError> {
        let container_id = self.container_id().await?;
        let cmd: Vec<String> = cmd.iter().map(|s| s.to_string()).collect();
        debug!("Running {:?} in proxy container {}", cmd, container_id);

        let exec_id = self
            .client
            .create_exec(&container_id, &cmd)
            .await
            .map_err(|e| HarborError::ProxyError(format!("failed to create exec: {}", e)))?;
        self.client
            .start_exec(&exec_id)
            .await
            .map_err(|e| HarborError::ProxyError(format!("failed to start exec: {}", e)))?;

        let mut ticker = tokio::time::interval(self.options.exec_poll_interval);
        loop {
            ticker.tick().await;
            let inspect = self
                .client
                .inspect_exec(&exec_id)
                .await
                .map_err(|e| HarborError::ProxyError(format!("failed to inspect exec: {}", e)))?;
            if inspect.running {
                continue;
            }
            return match inspect.exit_code.unwrap_or(0) {
                0 => Ok(()),
                code => Err(HarborError::ProxyError(format!(
                    "command {:?} exited with code {}",
                    cmd, code
                ))),
            };
        }
    }

    async fn reload(&self) -> Result<(), HarborError> {
        self.exec(&["caddy", "reload", "--config", CADDYFILE])
            .await
            .map_err(|e| HarborError::ProxyError(format!("failed to reload Caddy: {}", e)))
    }
}

#[async_trait]
impl ProxyWriter for CaddyProxy {
    async fn write_routes(
        &self,
        app_id: &str,
        upstream: &str,
        routes: &[ProxyRoute],
    ) -> Result<(), HarborError> {
        let path = site_path(app_id);
        let content = render_site(routes, upstream);

        self.exec(&["mkdir", "-p", SITES_DIR]).await?;
        self.exec(&["sh", "-c", &write_file_command(&path, &content)])
            .await?;
        info!("Wrote proxy routes for {} to {}", app_id, path);

        self.reload().await
    }

    async fn remove_routes(&self, app_id: &str) -> Result<(), HarborError> {
        let path = site_path(app_id);
        if let Err(e) = self.exec(&["rm", "-f", &path]).await {
            warn!("Failed to remove proxy routes of {}: {}", app_id, e);
        }
        self.reload().await
    }
}

pub fn site_path(app_id: &str) -> String {
    format!("{}/{}.conf", SITES_DIR, app_id)
}

/// One site block per route with an address
pub fn render_site(routes: &[ProxyRoute], upstream: &str) -> String {
    routes
        .iter()
        .filter(|r| !r.address.is_empty())
        .map(|r| {
            let target = match r.target_port {
                Some(port) if port != 0 => format!("{}:{}", upstream, port),
                _ => upstream.to_string(),
            };
            format!("{} {{\n\treverse_proxy {}\n}}\n\n", r.address, target)
        })
        .collect()
}

/// Escape `s` for use inside a single-quoted shell string
/// `sh -c` script writing `content` to `path`, both single-quoted
pub fn write_file_command(path: &str, content: &str) -> String {
    format!(
        "printf '%s' '{}' > '{}'",
        escape_for_shell(content),
        escape_for_shell(path)
    )
}

pub fn escape_for_shell(s: &str) -> String {
    s.replace('\'', r"'\''")
}

/// Spec of the proxy service
pub fn service_spec() -> ServiceSpec {
    let ports = [PortProtocol::Tcp, PortProtocol::Udp]
        .into_iter()
        .flat_map(|protocol| {
            [80, 443].map(|port| PortConfig {
                protocol,
                target_port: port,
                published_port: port,
                publish_mode: PublishMode::Ingress,
            })
        })
        .collect();

    ServiceSpec {
        name: SERVICE_NAME.to_string(),
        task_template: TaskSpec {
            container_spec: Some(ContainerSpec {
                image: IMAGE.to_string(),
                command: vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    format!(
                        "echo 'import sites/*.conf' > {0} && caddy run --config {0} --adapter caddyfile",
                        CADDYFILE
                    ),
                ],
                mounts: vec![
                    Mount {
                        source: DATA_VOLUME.to_string(),
                        target: "/data".to_string(),
                        mount_type: MountType::Volume,
                        read_only: false,
                    },
                    Mount {
                        source: SITES_VOLUME.to_string(),
                        target: SITES_DIR.to_string(),
                        mount_type: MountType::Volume,
                        read_only: false,
                    },
                ],
                ..Default::default()
            }),
            networks: vec![NetworkAttachmentConfig {
                target: PUBLIC_NETWORK.to_string(),
                aliases: Vec::new(),
            }],
            log_driver: Some(local_log_driver()),
            restart_policy: Some(RestartPolicy {
                condition: Some(RestartCondition::Any),
            }),
        },
        mode: Some(ServiceMode {
            replicated: Some(ReplicatedService { replicas: 1 }),
        }),
        endpoint_spec: Some(EndpointSpec { ports }),
        ..Default::default()
    }
}
