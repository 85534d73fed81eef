//! Image transfer between engines
//!
//! Apps are often built on a workstation engine that the swarm cannot pull
//! from. Before deploying, the image is streamed from that engine into the
//! swarm manager unless the manager already holds the same image ID.

use tracing::{debug, info};

use crate::deploy::progress::{self, ProgressSink};
use crate::docker::ControlPlane;
use crate::errors::HarborError;

/// Send `image` from `local` to `remote`.
///
/// Returns false when the remote already has an image with the same ID.
pub async fn send_image(
    local: &dyn ControlPlane,
    remote: &dyn ControlPlane,
    image: &str,
    sink: &dyn ProgressSink,
) -> Result<bool, HarborError> {
    let inspect = local.inspect_image(image).await.map_err(|e| {
        HarborError::ImageError(format!("failed to inspect image on local engine: {}", e))
    })?;

    let remote_images = remote.list_images().await.map_err(|e| {
        HarborError::ImageError(format!("failed to list images on remote engine: {}", e))
    })?;
    if remote_images.iter().any(|i| i.id == inspect.id) {
        sink.line(&progress::harbor(format!(
            "image {} is already on the remote host",
            image
        )));
        return Ok(false);
    }

    debug!("Sending image {} ({})", image, inspect.id);
    let archive = local
        .save_image(image)
        .await
        .map_err(|e| HarborError::ImageError(format!("failed to save image: {}", e)))?;
    remote.load_image(archive).await.map_err(|e| {
        HarborError::ImageError(format!("failed to load image on remote engine: {}", e))
    })?;

    info!("Sent image {} to the remote engine", image);
    sink.line(&progress::harbor(format!("sent image {}", image)));
    Ok(true)
}
