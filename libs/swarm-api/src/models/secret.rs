//! Secret objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /secrets/create`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecretSpec {
    pub name: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Base64 encoded payload
    pub data: String,
}
