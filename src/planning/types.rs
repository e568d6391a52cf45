//! Planning types and errors
//!
//! Shared between the segmenter, clusterer and replay planner.

use super::partition::PartitionError;
use crate::capture::transport::TransportError;
use crate::events::DecodedRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A contiguous run of records treated as one captured interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    pub records: Vec<DecodedRecord>,
}

impl EventGroup {
    pub fn new(records: Vec<DecodedRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A batch of groups that becomes one blob and one replay command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Position of this cluster in the plan, also the blob file stem
    pub index: usize,
    pub groups: Vec<EventGroup>,
}

impl Cluster {
    /// Total number of records across all groups
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(EventGroup::len).sum()
    }

    /// Raw frames of every record, concatenated in order
    pub fn blob(&self) -> Vec<u8> {
        self.groups
            .iter()
            .flat_map(|g| g.records.iter())
            .flat_map(|r| r.raw)
            .collect()
    }
}

/// One written and transferred blob, with the command that replays it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBlob {
    /// Local blob path
    pub local_path: PathBuf,

    /// Path of the blob on the device
    pub remote_path: String,

    /// Blob length in bytes
    pub byte_len: usize,

    /// Device command writing the blob onto the input node
    pub command: String,
}

/// Counts describing a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub record_count: usize,
    pub group_count: usize,
    pub cluster_count: usize,
    pub payload_bytes: usize,
}

/// The finished replay plan
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    /// Blobs in replay order
    pub blobs: Vec<PlannedBlob>,

    /// Every device command, in order, without the elevation prefix
    pub commands: Vec<String>,

    /// The assembled script sent to the device shell
    pub script: Vec<u8>,

    /// Every transferred byte, in order
    pub payload: Vec<u8>,

    pub summary: PlanSummary,
}

impl ReplayPlan {
    /// The script as text
    pub fn script_text(&self) -> String {
        String::from_utf8_lossy(&self.script).into_owned()
    }
}

/// Planning errors
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid partition: {0}")]
    Partition(#[from] PartitionError),

    #[error("Failed to write blob {path:?}: {source}")]
    BlobWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to transfer blob {path:?}: {source}")]
    Transfer {
        path: PathBuf,
        #[source]
        source: TransportError,
    },
}

/// Result type for planning operations
pub type PlanResult<T> = Result<T, PlanError>;
