//! Image objects

use serde::{Deserialize, Serialize};

/// One entry of `GET /images/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSummary {
    #[serde(rename = "Id")]
    pub id: String,

    /// `null` for dangling images
    pub repo_tags: Option<Vec<String>>,
}

/// Subset of `GET /images/{name}/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageInspect {
    #[serde(rename = "Id")]
    pub id: String,

    pub repo_tags: Option<Vec<String>>,
}

/// One message of the `POST /images/load` progress stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLoadMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
