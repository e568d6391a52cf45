//! Capture state management
//!
//! Defines the capture state machine and the frozen result of a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    /// Nothing started yet
    Idle,
    /// Upstream read running, bytes accumulating
    Recording,
    /// Stop requested, tearing down the process and reader
    Stopping,
    /// Buffer frozen
    Stopped,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Settings for one capture session
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Input node to read, e.g. `/dev/input/event3`
    pub device_node: String,

    /// Local working directory that later receives the replay blobs
    pub local_dir: PathBuf,

    /// Upper bound on waiting for the process and the reader to exit
    pub stop_timeout: Duration,
}

/// Everything a stopped session hands over to decoding
#[derive(Debug, Clone)]
pub struct CapturedStream {
    /// Raw bytes in arrival order
    pub bytes: Vec<u8>,

    /// Wall-clock time the upstream read was started
    pub started_at: DateTime<Utc>,

    /// Wall-clock time the buffer was frozen
    pub stopped_at: DateTime<Utc>,

    /// Local working directory of the session
    pub local_dir: PathBuf,

    /// Non-fatal problems hit while stopping
    pub warnings: Vec<String>,
}

impl CapturedStream {
    /// Capture duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.stopped_at - self.started_at).num_milliseconds()
    }
}
