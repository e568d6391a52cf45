//! Contiguous sequence partitioning
//!
//! Two ways to cut a slice into contiguous, order-preserving pieces: at
//! explicit indices, or into a fixed number of near-equal sections.

use thiserror::Error;

/// Partitioning errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("number of sections must be larger than 0 (got {0})")]
    InvalidSectionCount(usize),
}

/// Cut `items` before every index in `indices`.
///
/// Always yields `indices.len() + 1` slices, some possibly empty. Indices past
/// the end are clamped to the end, and an index smaller than its predecessor
/// yields an empty slice rather than reordering anything.
pub fn split_at_indices<'a, T>(items: &'a [T], indices: &[usize]) -> Vec<&'a [T]> {
    let mut pieces = Vec::with_capacity(indices.len() + 1);
    let mut start = 0;

    for &index in indices {
        let end = index.clamp(start, items.len());
        pieces.push(&items[start..end]);
        start = end;
    }
    pieces.push(&items[start..]);

    pieces
}

/// Section sizes for `total` items over `sections` sections.
///
/// The first `total % sections` sections get one extra item.
pub fn section_sizes(total: usize, sections: usize) -> Result<Vec<usize>, PartitionError> {
    if sections == 0 {
        return Err(PartitionError::InvalidSectionCount(sections));
    }

    let base = total / sections;
    let extras = total % sections;

    Ok((0..sections)
        .map(|i| if i < extras { base + 1 } else { base })
        .collect())
}

/// Split `items` into exactly `sections` contiguous, near-equal slices
pub fn split_into_sections<T>(items: &[T], sections: usize) -> Result<Vec<&[T]>, PartitionError> {
    let sizes = section_sizes(items.len(), sections)?;

    let mut pieces = Vec::with_capacity(sections);
    let mut start = 0;
    for size in sizes {
        pieces.push(&items[start..start + size]);
        start += size;
    }

    Ok(pieces)
}
