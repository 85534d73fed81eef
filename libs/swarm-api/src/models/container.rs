//! Container inspection

use serde::{Deserialize, Serialize};

/// Subset of `GET /containers/{id}/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerInspect {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Health {
    pub status: String,
    pub failing_streak: i64,
    pub log: Vec<HealthLog>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthLog {
    pub exit_code: i64,
    pub output: String,
}

impl ContainerInspect {
    /// Output of the most recent health check when the container is unhealthy
    pub fn latest_health_failure(&self) -> Option<&str> {
        let health = self.state.health.as_ref()?;
        if health.status != "unhealthy" {
            return None;
        }
        health
            .log
            .last()
            .map(|entry| entry.output.as_str())
            .filter(|output| !output.is_empty())
    }
}
