//! Replay command

use crate::capture::transport::DeviceTransport;
use crate::project::bundle::{read_manifest, read_script, verify_blobs};
use crate::project::schema::ReplayManifest;
use crate::utils::error::AppResult;
use std::path::Path;

/// Run a saved bundle's script on the device.
///
/// With `push`, the blobs are transferred again first, for devices whose
/// remote directory was cleared since the capture.
pub async fn replay(
    bundle_dir: &Path,
    transport: &dyn DeviceTransport,
    push: bool,
) -> AppResult<ReplayManifest> {
    let manifest = read_manifest(bundle_dir)?;
    verify_blobs(&manifest)?;
    let script = read_script(bundle_dir)?;

    if push {
        transport.make_remote_dir(&manifest.remote_dir).await?;
        for blob in &manifest.blobs {
            transport.push(&blob.local_path, &manifest.remote_dir).await?;
        }
    }

    tracing::info!(
        "Replaying {} blobs ({} bytes) onto {}",
        manifest.summary.cluster_count,
        manifest.summary.payload_bytes,
        manifest.device_node
    );
    transport.run_script(&script).await?;

    Ok(manifest)
}
