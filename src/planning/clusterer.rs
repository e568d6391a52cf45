//! Batch clustering
//!
//! Regroups event groups into contiguous clusters so that each transfer and
//! each `dd` invocation carries several interactions at once.

use super::partition::split_into_sections;
use super::types::{Cluster, EventGroup, PlanResult};

/// Pack `groups` into clusters of about `groups_per_cluster` groups each.
///
/// The cluster count is `groups.len() / groups_per_cluster`, with the
/// remainder spread one extra group at a time over the first clusters. When
/// that count is zero (no groups, `groups_per_cluster == 0`, or fewer groups
/// than one cluster's worth) every group goes into a single cluster, and no
/// groups means no clusters.
pub fn cluster(groups: Vec<EventGroup>, groups_per_cluster: usize) -> PlanResult<Vec<Cluster>> {
    let total = groups.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let sections = match total.checked_div(groups_per_cluster) {
        Some(n) if n > 0 => n,
        _ => {
            tracing::debug!(
                "{} groups at {} per cluster: packing into a single cluster",
                total,
                groups_per_cluster
            );
            1
        }
    };

    let clusters: Vec<Cluster> = split_into_sections(&groups, sections)?
        .into_iter()
        .filter(|piece| !piece.is_empty())
        .enumerate()
        .map(|(index, piece)| Cluster {
            index,
            groups: piece.to_vec(),
        })
        .collect();

    tracing::debug!("Clustered {} groups into {} clusters", total, clusters.len());

    Ok(clusters)
}
