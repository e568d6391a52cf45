//! Stream segmentation
//!
//! Splitting happens in two passes: [`boundary_indices`] marks split points
//! with the configured [`BoundaryStrategy`], then [`segment`] cuts the record
//! sequence there and drops empty groups.

use super::partition::split_at_indices;
use super::types::EventGroup;
use crate::events::DecodedRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How split points between groups are chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BoundaryStrategy {
    /// Split before every record whose seconds field exceeds `ratio` times
    /// the wall-clock time at which capture stopped.
    ///
    /// Matches recordings made by earlier tooling. On devices whose event
    /// clock is the Unix epoch this marks nearly every record; on a monotonic
    /// clock it marks none.
    StopTimeThreshold { ratio: f64 },

    /// Split before a record that follows its predecessor by more than
    /// `gap_micros` microseconds.
    IdleGap {
        #[serde(rename = "gapMicros")]
        gap_micros: u64,
    },

    /// Never split
    None,
}

impl Default for BoundaryStrategy {
    fn default() -> Self {
        Self::StopTimeThreshold { ratio: 0.95 }
    }
}

/// Pass 1: indices of records that start a new group, ascending
pub fn boundary_indices(
    records: &[DecodedRecord],
    strategy: BoundaryStrategy,
    stopped_at: DateTime<Utc>,
) -> Vec<usize> {
    match strategy {
        BoundaryStrategy::StopTimeThreshold { ratio } => {
            let threshold = stopped_at.timestamp_millis() as f64 / 1000.0 * ratio;
            records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.seconds as f64 > threshold)
                .map(|(i, _)| i)
                .collect()
        }
        BoundaryStrategy::IdleGap { gap_micros } => records
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].timestamp_micros() - pair[0].timestamp_micros() > gap_micros as i128)
            .map(|(i, _)| i + 1)
            .collect(),
        BoundaryStrategy::None => Vec::new(),
    }
}

/// Pass 2: cut at the boundaries and keep the non-empty groups
pub fn segment(
    records: &[DecodedRecord],
    strategy: BoundaryStrategy,
    stopped_at: DateTime<Utc>,
) -> Vec<EventGroup> {
    let boundaries = boundary_indices(records, strategy, stopped_at);

    let groups: Vec<EventGroup> = split_at_indices(records, &boundaries)
        .into_iter()
        .filter(|piece| !piece.is_empty())
        .map(|piece| EventGroup::new(piece.to_vec()))
        .collect();

    tracing::debug!(
        "Segmented {} records into {} groups ({} boundaries, {:?})",
        records.len(),
        groups.len(),
        boundaries.len(),
        strategy
    );

    groups
}
