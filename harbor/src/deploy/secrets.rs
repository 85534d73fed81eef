//! Secret provisioning

use std::collections::BTreeMap;

use base64::Engine;
use secrecy::{ExposeSecret, SecretSlice};
use swarm_api::{SecretReference, SecretReferenceFileTarget, SecretSpec};
use tracing::{debug, info};

use crate::docker::ControlPlane;
use crate::errors::HarborError;
use crate::utils::sha256_hash;

pub const APP_LABEL: &str = "harbor.app";
pub const SECRET_KEY_LABEL: &str = "harbor.secret.key";
pub const SECRET_DIGEST_LABEL: &str = "harbor.secret.sha256";

/// Secret payloads keyed by the file name they are exposed as
pub type SecretPayloads = BTreeMap<String, SecretSlice<u8>>;

/// A created swarm secret, referenced from the service spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub id: String,

    /// Generated, unique swarm-side name
    pub name: String,

    /// Config key that owns the secret
    pub key: String,

    pub file: SecretFileTarget,
}

/// File the secret is mounted as under `/run/secrets`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFileTarget {
    pub name: String,
    pub uid: String,
    pub gid: String,
    pub mode: u32,
}

impl SecretRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: id.into(),
            name: name.into(),
            file: SecretFileTarget {
                name: key.clone(),
                uid: "0".to_string(),
                gid: "0".to_string(),
                mode: 0o444,
            },
            key,
        }
    }

    pub fn to_reference(&self) -> SecretReference {
        SecretReference {
            file: Some(SecretReferenceFileTarget {
                name: self.file.name.clone(),
                uid: self.file.uid.clone(),
                gid: self.file.gid.clone(),
                mode: self.file.mode,
            }),
            secret_id: self.id.clone(),
            secret_name: self.name.clone(),
        }
    }
}

/// Generates swarm secret names.
///
/// Secret payloads are immutable once created, so each deploy creates new
/// secrets under fresh names: `<key>-<unix seconds>-<random hex>`. The random
/// part keeps two deploys within the same second apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretNamer;

impl SecretNamer {
    pub fn name_for(&self, key: &str) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}", key, chrono::Utc::now().timestamp(), &suffix[..8])
    }
}

/// Create one swarm secret per non-empty payload.
///
/// Stops at the first failure. Secrets created before it are left in place
/// and nothing is retried.
pub async fn provision(
    client: &dyn ControlPlane,
    app_name: &str,
    payloads: &SecretPayloads,
    namer: &SecretNamer,
) -> Result<Vec<SecretRef>, HarborError> {
    let mut refs = Vec::with_capacity(payloads.len());

    for (key, payload) in payloads {
        let data = payload.expose_secret();
        if data.is_empty() {
            debug!("Skipping empty secret: {}", key);
            continue;
        }

        let name = namer.name_for(key);
        let spec = SecretSpec {
            name: name.clone(),
            labels: BTreeMap::from([
                (APP_LABEL.to_string(), app_name.to_string()),
                (SECRET_KEY_LABEL.to_string(), key.clone()),
                (SECRET_DIGEST_LABEL.to_string(), sha256_hash(data)),
            ]),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        };

        let id = client
            .create_secret(&spec)
            .await
            .map_err(|source| HarborError::SecretCreationFailed {
                key: key.clone(),
                source,
            })?;

        info!("Created secret {} ({})", name, id);
        refs.push(SecretRef::new(id, name, key.clone()));
    }

    Ok(refs)
}
