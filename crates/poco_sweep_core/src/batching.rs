use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;

/// Contiguous half-open range of work item indices processed together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchAssignment {
    pub batch_id: usize,
    pub start_index: usize,
    pub end_index_exclusive: usize,
}

impl BatchAssignment {
    pub fn len(&self) -> usize {
        self.end_index_exclusive - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> Range<usize> {
        self.start_index..self.end_index_exclusive
    }
}

/// Position of a work item among `replicates` replicates per combination.
///
/// Items are numbered combination-major, so a batch may span the end of one
/// combination and the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicateSlot {
    /// Index into the list of combinations being run.
    pub combination: usize,
    pub replicate: usize,
}

impl ReplicateSlot {
    /// `replicates` must be positive.
    pub fn of_item(item: usize, replicates: usize) -> Self {
        Self {
            combination: item / replicates,
            replicate: item % replicates,
        }
    }
}

/// Split `total_items` into batches of at most `batch_size` items.
///
/// The plan depends only on its inputs, so the same run always checks for
/// cancellation at the same item boundaries. Zero items yield an empty plan.
pub fn plan_batches(
    total_items: usize,
    batch_size: usize,
) -> Result<Vec<BatchAssignment>, ValidationError> {
    if batch_size == 0 {
        return Err(ValidationError::new("batch_size must be a positive integer"));
    }
    if total_items == 0 {
        return Ok(Vec::new());
    }

    let batch_count = total_items.div_ceil(batch_size);
    let mut assignments = Vec::with_capacity(batch_count);
    let mut cursor = 0usize;

    for batch_id in 0..batch_count {
        let end_index_exclusive = (cursor + batch_size).min(total_items);
        assignments.push(BatchAssignment {
            batch_id,
            start_index: cursor,
            end_index_exclusive,
        });
        cursor = end_index_exclusive;
    }

    Ok(assignments)
}
