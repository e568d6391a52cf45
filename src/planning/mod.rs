//! Replay planning
//!
//! Segmentation of decoded records into groups, batching of groups into
//! clusters, and generation of the blobs and device script that replay them.

pub mod clusterer;
pub mod partition;
pub mod pipeline;
pub mod planner;
pub mod segmenter;
pub mod types;

pub use clusterer::cluster;
pub use partition::{split_at_indices, split_into_sections, PartitionError};
pub use pipeline::ReplayPipeline;
pub use planner::{PlannerOptions, ReplayPlanner};
pub use segmenter::{boundary_indices, segment, BoundaryStrategy};
pub use types::{Cluster, EventGroup, PlanError, PlanSummary, PlannedBlob, ReplayPlan};
