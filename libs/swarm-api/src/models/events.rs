//! Engine event stream messages

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Attribute set by swarm on containers it schedules for a service
pub const SERVICE_ID_ATTRIBUTE: &str = "com.docker.swarm.service.id";

/// One message of `GET /events`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMessage {
    #[serde(rename = "Type")]
    pub event_type: String,

    #[serde(rename = "Action")]
    pub action: String,

    #[serde(rename = "Actor")]
    pub actor: EventActor,

    pub scope: String,

    pub time: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventActor {
    #[serde(rename = "ID")]
    pub id: String,

    pub attributes: HashMap<String, String>,
}

impl EventMessage {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.actor.attributes.get(key).map(String::as_str)
    }

    /// Swarm service the event's container belongs to
    pub fn service_id(&self) -> Option<&str> {
        self.attribute(SERVICE_ID_ATTRIBUTE)
    }
}
