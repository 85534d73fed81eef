//! Engine system info and swarm initialisation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Subset of `GET /info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub name: String,
    pub server_version: String,
    pub swarm: SwarmInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmInfo {
    #[serde(rename = "NodeID")]
    pub node_id: String,

    pub local_node_state: LocalNodeState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalNodeState {
    #[default]
    #[serde(rename = "")]
    Unset,
    Inactive,
    Pending,
    Active,
    Error,
    Locked,
}

/// Body of `POST /swarm/init`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmInitRequest {
    pub listen_addr: String,
    pub advertise_addr: String,
    pub spec: SwarmSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmSpec {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
