//! Docker Engine swarm API models
//!
//! Serde representations of the objects harbormaster exchanges with the
//! Docker Engine API. Field names follow the engine's JSON (PascalCase with
//! a few exceptions), so these types are the wire contract and are not
//! meant to be redesigned.

pub mod models;

pub use models::container::*;
pub use models::events::*;
pub use models::exec::*;
pub use models::image::*;
pub use models::network::*;
pub use models::prune::*;
pub use models::secret::*;
pub use models::service::*;
pub use models::system::*;
pub use models::task::*;

/// Error body returned by the engine on non-2xx responses
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
}

/// Response to create calls that only return an identifier
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IdResponse {
    #[serde(rename = "ID", alias = "Id")]
    pub id: String,

    #[serde(rename = "Warnings", skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}
