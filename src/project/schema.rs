//! Configuration and bundle schema
//!
//! The JSON shapes of the replay configuration file and of the `plan.json`
//! manifest written next to the replay blobs.

use crate::capture::state::{CaptureOptions, CapturedStream};
use crate::planning::planner::PlannerOptions;
use crate::planning::segmenter::BoundaryStrategy;
use crate::planning::types::{PlanSummary, PlannedBlob, ReplayPlan};
use crate::utils::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayConfig {
    /// Path to the `adb` binary
    pub adb_path: String,

    /// Device serial, required when several devices are attached
    pub device_serial: Option<String>,

    /// Input node to capture and replay, e.g. `/dev/input/event3`
    pub device_node: String,

    /// Device directory receiving the blobs
    pub remote_dir: String,

    /// Local working directory (a fresh temporary directory when unset)
    pub local_dir: Option<PathBuf>,

    /// Target number of event groups per blob
    pub groups_per_cluster: usize,

    /// Append synchronization-reset commands after the blobs
    pub add_closing_commands: bool,

    /// Privilege elevation prepended to the script
    pub elevation_prefix: String,

    /// How the event stream is split into groups
    pub boundary: BoundaryStrategy,

    /// Bound on waiting for the capture to wind down
    pub stop_timeout_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_serial: None,
            device_node: String::new(),
            remote_dir: "/sdcard/evreplay".to_string(),
            local_dir: None,
            groups_per_cluster: 16,
            add_closing_commands: true,
            elevation_prefix: "su -- ".to_string(),
            boundary: BoundaryStrategy::default(),
            stop_timeout_ms: 2000,
        }
    }
}

impl ReplayConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReplayConfig = serde_json::from_str(&content)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject settings the capture or the script cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.device_node.trim().is_empty() {
            return Err(AppError::Config("deviceNode is required".to_string()));
        }
        if self.remote_dir.trim().is_empty() {
            return Err(AppError::Config("remoteDir must not be empty".to_string()));
        }
        if let BoundaryStrategy::StopTimeThreshold { ratio } = self.boundary {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(AppError::Config(format!(
                    "boundary ratio must be a positive number (got {})",
                    ratio
                )));
            }
        }
        Ok(())
    }

    /// The configured working directory, or a new kept temporary one
    pub fn resolve_local_dir(&self) -> AppResult<PathBuf> {
        match &self.local_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let dir = tempfile::Builder::new().prefix("evreplay-").tempdir()?;
                Ok(dir.keep())
            }
        }
    }

    pub fn capture_options(&self, local_dir: PathBuf) -> CaptureOptions {
        CaptureOptions {
            device_node: self.device_node.clone(),
            local_dir,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        }
    }

    pub fn planner_options(&self, local_dir: PathBuf) -> PlannerOptions {
        PlannerOptions {
            device_node: self.device_node.clone(),
            local_dir,
            remote_dir: self.remote_dir.clone(),
            add_closing_commands: self.add_closing_commands,
            elevation_prefix: self.elevation_prefix.clone(),
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    pub version: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

impl Default for BundleMeta {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "evreplay-v1".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Description of a replay bundle, stored as `plan.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayManifest {
    pub meta: BundleMeta,
    pub device_node: String,
    pub remote_dir: String,
    pub capture_started_at: DateTime<Utc>,
    pub capture_stopped_at: DateTime<Utc>,
    pub summary: PlanSummary,
    pub blobs: Vec<PlannedBlob>,
    pub commands: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ReplayManifest {
    pub fn new(config: &ReplayConfig, stream: &CapturedStream, plan: &ReplayPlan) -> Self {
        Self {
            meta: BundleMeta::default(),
            device_node: config.device_node.clone(),
            remote_dir: config.remote_dir.clone(),
            capture_started_at: stream.started_at,
            capture_stopped_at: stream.stopped_at,
            summary: plan.summary,
            blobs: plan.blobs.clone(),
            commands: plan.commands.clone(),
            warnings: stream.warnings.clone(),
        }
    }
}
