//! Replay bundle read/write operations
//!
//! A bundle is the local working directory of a capture:
//! - `<index>.bin`: one blob per cluster, the raw frames it replays
//! - replay.sh: the script fed to the device shell
//! - plan.json: the manifest describing blobs and commands
//! - capture.raw: the frozen capture buffer, for re-planning offline

use super::schema::ReplayManifest;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Manifest file name
pub const MANIFEST_FILE: &str = "plan.json";

/// Script file name
pub const SCRIPT_FILE: &str = "replay.sh";

/// Raw capture file name
pub const RAW_FILE: &str = "capture.raw";

/// Bundle-related errors
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Missing required file: {0}")]
    MissingFile(String),
}

/// Write the manifest and script into a bundle directory
pub fn write_bundle(bundle_path: &Path, manifest: &ReplayManifest, script: &[u8]) -> Result<(), BundleError> {
    if !bundle_path.exists() {
        fs::create_dir_all(bundle_path)?;
    }

    let manifest_content = serde_json::to_string_pretty(manifest)?;
    fs::write(bundle_path.join(MANIFEST_FILE), manifest_content)?;
    fs::write(bundle_path.join(SCRIPT_FILE), script)?;

    tracing::debug!(
        "Saved replay bundle with {} blobs to {:?}",
        manifest.blobs.len(),
        bundle_path
    );

    Ok(())
}

/// Keep the captured bytes next to the plan
pub fn write_raw_capture(bundle_path: &Path, bytes: &[u8]) -> Result<(), BundleError> {
    fs::create_dir_all(bundle_path)?;
    fs::write(bundle_path.join(RAW_FILE), bytes)?;
    Ok(())
}

/// Read the captured bytes of a bundle
pub fn read_raw_capture(bundle_path: &Path) -> Result<Vec<u8>, BundleError> {
    let raw_path = bundle_path.join(RAW_FILE);
    if !raw_path.exists() {
        return Err(BundleError::MissingFile(RAW_FILE.to_string()));
    }

    Ok(fs::read(raw_path)?)
}

/// Read the manifest of a bundle
pub fn read_manifest(bundle_path: &Path) -> Result<ReplayManifest, BundleError> {
    if !bundle_path.is_dir() {
        return Err(BundleError::InvalidBundle(
            "Path is not a directory".to_string(),
        ));
    }

    let manifest_path = bundle_path.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(BundleError::MissingFile(MANIFEST_FILE.to_string()));
    }

    let content = fs::read_to_string(&manifest_path)?;
    let manifest: ReplayManifest = serde_json::from_str(&content)?;

    Ok(manifest)
}

/// Read the replay script of a bundle
pub fn read_script(bundle_path: &Path) -> Result<Vec<u8>, BundleError> {
    let script_path = bundle_path.join(SCRIPT_FILE);
    if !script_path.exists() {
        return Err(BundleError::MissingFile(SCRIPT_FILE.to_string()));
    }

    Ok(fs::read(script_path)?)
}

/// Check that every blob the manifest lists is present with its recorded size
pub fn verify_blobs(manifest: &ReplayManifest) -> Result<(), BundleError> {
    for blob in &manifest.blobs {
        let len = fs::metadata(&blob.local_path)
            .map_err(|_| BundleError::MissingFile(blob.local_path.to_string_lossy().to_string()))?
            .len();
        if len != blob.byte_len as u64 {
            return Err(BundleError::InvalidBundle(format!(
                "{:?} is {} bytes, manifest says {}",
                blob.local_path, len, blob.byte_len
            )));
        }
    }
    Ok(())
}

/// Check if a path is a replay bundle
pub fn is_valid_bundle(path: &Path) -> bool {
    path.is_dir() && path.join(MANIFEST_FILE).exists() && path.join(SCRIPT_FILE).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::types::{PlanSummary, PlannedBlob};
    use crate::project::schema::BundleMeta;
    use chrono::Utc;
    use tempfile::tempdir;

    fn manifest(blob_path: std::path::PathBuf, byte_len: usize) -> ReplayManifest {
        ReplayManifest {
            meta: BundleMeta::default(),
            device_node: "/dev/input/event1".to_string(),
            remote_dir: "/sdcard/evreplay".to_string(),
            capture_started_at: Utc::now(),
            capture_stopped_at: Utc::now(),
            summary: PlanSummary {
                record_count: 2,
                group_count: 1,
                cluster_count: 1,
                payload_bytes: byte_len,
            },
            blobs: vec![PlannedBlob {
                local_path: blob_path,
                remote_path: "/sdcard/evreplay/0.bin".to_string(),
                byte_len,
                command: format!("dd bs={} if=/sdcard/evreplay/0.bin of=/dev/input/event1", byte_len),
            }],
            commands: vec![format!("dd bs={} if=/sdcard/evreplay/0.bin of=/dev/input/event1", byte_len)],
            warnings: vec![],
        }
    }

    #[test]
    fn test_write_and_read_bundle() {
        let dir = tempdir().unwrap();
        let bundle_path = dir.path().join("capture");
        let blob_path = bundle_path.join("0.bin");

        let manifest = manifest(blob_path.clone(), 48);
        write_bundle(&bundle_path, &manifest, b"su -- dd bs=48").unwrap();
        fs::write(&blob_path, [0u8; 48]).unwrap();

        assert!(is_valid_bundle(&bundle_path));
        let loaded = read_manifest(&bundle_path).unwrap();
        assert_eq!(loaded.summary, manifest.summary);
        assert_eq!(loaded.blobs, manifest.blobs);
        assert_eq!(read_script(&bundle_path).unwrap(), b"su -- dd bs=48".to_vec());
        assert!(verify_blobs(&loaded).is_ok());
    }

    #[test]
    fn test_raw_capture_round_trip() {
        let dir = tempdir().unwrap();
        assert!(matches!(read_raw_capture(dir.path()), Err(BundleError::MissingFile(_))));

        write_raw_capture(dir.path(), &[9u8; 30]).unwrap();
        assert_eq!(read_raw_capture(dir.path()).unwrap(), vec![9u8; 30]);
    }

    #[test]
    fn test_verify_detects_size_mismatch() {
        let dir = tempdir().unwrap();
        let blob_path = dir.path().join("0.bin");
        fs::write(&blob_path, [0u8; 24]).unwrap();

        let err = verify_blobs(&manifest(blob_path, 48)).unwrap_err();
        assert!(matches!(err, BundleError::InvalidBundle(_)));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        assert!(!is_valid_bundle(dir.path()));
        assert!(matches!(read_manifest(dir.path()), Err(BundleError::MissingFile(_))));
        assert!(matches!(
            read_manifest(&dir.path().join("nope")),
            Err(BundleError::InvalidBundle(_))
        ));
    }
}
