//! Translation of an app description into a swarm service spec

use std::collections::BTreeMap;
use std::time::Duration;

use swarm_api::{
    ContainerSpec, Driver, FailureAction, HealthConfig, Mount, MountType,
    NetworkAttachmentConfig, ReplicatedService, ServiceMode, ServiceSpec, TaskSpec, UpdateConfig,
    UpdateOrder,
};

use crate::cluster::{INTERNAL_NETWORK, PUBLIC_NETWORK};
use crate::deploy::secrets::SecretRef;
use crate::errors::HarborError;

/// How long swarm watches each updated task before judging the update
pub const DEFAULT_MONITOR_WINDOW: Duration = Duration::from_secs(10);

/// Declarative description of an app, as read from the config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppDescription {
    pub name: String,
    pub image: String,

    /// 0 is treated as 1
    pub replicas: u64,

    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub health_check: Option<HealthCheck>,
    pub volumes: Vec<VolumeMount>,

    /// Attaches the service to the public network when set
    pub public_address: Option<String>,

    /// `stop-first` when unset
    pub update_order: Option<String>,

    pub monitor_window: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub start_period: Duration,
    pub start_interval: Duration,
    pub retries: u32,
}

/// Named volume mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
}

impl AppDescription {
    /// Validated update order
    pub fn update_order(&self) -> Result<UpdateOrder, HarborError> {
        parse_update_order(self.update_order.as_deref())
    }

    pub fn replicas(&self) -> u64 {
        self.replicas.max(1)
    }

    /// Networks the service attaches to
    pub fn networks(&self) -> Vec<String> {
        let mut networks = vec![INTERNAL_NETWORK.to_string()];
        if self.public_address.as_deref().is_some_and(|a| !a.is_empty()) {
            networks.push(PUBLIC_NETWORK.to_string());
        }
        networks
    }
}

pub fn parse_update_order(order: Option<&str>) -> Result<UpdateOrder, HarborError> {
    match order.map(str::trim) {
        None | Some("") | Some("stop-first") | Some("stop_first") => Ok(UpdateOrder::StopFirst),
        Some("start-first") | Some("start_first") => Ok(UpdateOrder::StartFirst),
        Some(other) => Err(HarborError::InvalidUpdateOrder(other.to_string())),
    }
}

/// Build the service spec for `app`. Pure, fails only on an invalid order.
pub fn build_service_spec(
    app: &AppDescription,
    secrets: &[SecretRef],
) -> Result<ServiceSpec, HarborError> {
    let order = app.update_order()?;
    let monitor = nanos(app.monitor_window.unwrap_or(DEFAULT_MONITOR_WINDOW));

    let container_spec = ContainerSpec {
        image: app.image.clone(),
        env: app.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        mounts: app
            .volumes
            .iter()
            .map(|v| Mount {
                source: v.source.clone(),
                target: v.target.clone(),
                mount_type: MountType::Volume,
                read_only: false,
            })
            .collect(),
        health_check: app
            .health_check
            .as_ref()
            .filter(|hc| !hc.test.is_empty())
            .map(health_config),
        secrets: secrets.iter().map(SecretRef::to_reference).collect(),
        ..Default::default()
    };

    Ok(ServiceSpec {
        name: app.name.clone(),
        labels: app.labels.clone(),
        task_template: TaskSpec {
            container_spec: Some(container_spec),
            networks: app
                .networks()
                .into_iter()
                .map(|target| NetworkAttachmentConfig {
                    target,
                    aliases: Vec::new(),
                })
                .collect(),
            log_driver: Some(local_log_driver()),
            restart_policy: None,
        },
        mode: Some(ServiceMode {
            replicated: Some(ReplicatedService {
                replicas: app.replicas(),
            }),
        }),
        update_config: Some(UpdateConfig {
            parallelism: 1,
            delay: 0,
            failure_action: FailureAction::Rollback,
            monitor,
            max_failure_ratio: 0.0,
            order,
        }),
        rollback_config: Some(UpdateConfig {
            parallelism: 1,
            delay: 0,
            failure_action: FailureAction::Pause,
            monitor,
            max_failure_ratio: 0.0,
            order,
        }),
        endpoint_spec: None,
    })
}

/// Bounded local log driver so replicas cannot fill the node's disk
pub fn local_log_driver() -> Driver {
    Driver {
        name: "local".to_string(),
        options: BTreeMap::from([
            ("max-size".to_string(), "100m".to_string()),
            ("max-file".to_string(), "3".to_string()),
        ]),
    }
}

fn health_config(hc: &HealthCheck) -> HealthConfig {
    HealthConfig {
        test: hc.test.clone(),
        interval: nanos(hc.interval),
        timeout: nanos(hc.timeout),
        retries: i64::from(hc.retries),
        start_period: nanos(hc.start_period),
        start_interval: nanos(hc.start_interval),
    }
}

fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
