//! Replay pipeline orchestration
//!
//! Chains decoding, segmentation, clustering and planning for one frozen
//! capture buffer.

use super::clusterer::cluster;
use super::planner::ReplayPlanner;
use super::segmenter::{segment, BoundaryStrategy};
use super::types::{PlanResult, ReplayPlan};
use crate::capture::state::CapturedStream;
use crate::events::decode_records;

/// Pipeline from captured bytes to a replay plan
pub struct ReplayPipeline {
    boundary: BoundaryStrategy,
    groups_per_cluster: usize,
    planner: ReplayPlanner,
}

impl ReplayPipeline {
    pub fn new(boundary: BoundaryStrategy, groups_per_cluster: usize, planner: ReplayPlanner) -> Self {
        Self {
            boundary,
            groups_per_cluster,
            planner,
        }
    }

    /// Run the pipeline
    pub async fn run(&self, stream: &CapturedStream) -> PlanResult<ReplayPlan> {
        tracing::info!(
            "Planning replay for {} captured bytes into {:?}",
            stream.bytes.len(),
            self.planner.options().local_dir
        );

        let records = decode_records(&stream.bytes);
        let groups = segment(&records, self.boundary, stream.stopped_at);
        let clusters = cluster(groups, self.groups_per_cluster)?;

        tracing::info!(
            "{} records, {} clusters at {} groups per cluster",
            records.len(),
            clusters.len(),
            self.groups_per_cluster
        );

        self.planner.plan(&clusters).await
    }
}
