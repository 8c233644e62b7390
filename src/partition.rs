//! Row-block domain decomposition.
//!
//! Interior rows `1..=R-2` are split into `P` contiguous blocks whose sizes
//! differ by at most one. The same pure functions drive both the
//! message-passing scatter/gather and the shared-memory thread ranges.

use crate::stencil_error::StencilError;
use std::ops::Range;

/// First interior-row index (0-based within the interior) owned by `id`.
#[inline]
pub fn block_low(id: usize, workers: usize, units: usize) -> usize {
    id * units / workers
}

/// Number of interior rows owned by `id`.
#[inline]
pub fn block_size(id: usize, workers: usize, units: usize) -> usize {
    block_low(id + 1, workers, units) - block_low(id, workers, units)
}

/// Check that every worker can be handed at least one row.
pub fn check_workers(workers: usize, units: usize) -> Result<(), StencilError> {
    if workers == 0 {
        return Err(StencilError::Configuration(
            "worker count must be at least 1".into(),
        ));
    }
    if workers > units {
        return Err(StencilError::TooManyWorkers {
            workers,
            rows: units,
        });
    }
    Ok(())
}

/// One worker's share of the interior rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowBlock {
    pub id: usize,
    /// Offset of the first owned row within the interior.
    pub low: usize,
    /// Number of owned rows.
    pub size: usize,
}

impl RowBlock {
    /// Compute the block of worker `id` out of `workers` over `units` interior rows.
    ///
    /// # Errors
    /// `Configuration`/`TooManyWorkers` if `workers` is 0 or exceeds `units`,
    /// or `id` is out of range.
    pub fn new(id: usize, workers: usize, units: usize) -> Result<Self, StencilError> {
        check_workers(workers, units)?;
        if id >= workers {
            return Err(StencilError::Configuration(format!(
                "worker id {id} out of range for {workers} workers"
            )));
        }
        Ok(Self {
            id,
            low: block_low(id, workers, units),
            size: block_size(id, workers, units),
        })
    }

    /// Owned rows as global matrix row indices.
    pub fn global_rows(&self) -> Range<usize> {
        self.low + 1..self.low + 1 + self.size
    }

    /// Rows in the padded local block (owned rows plus two halo rows).
    pub fn padded_rows(&self) -> usize {
        self.size + 2
    }
}

/// Per-worker `(offset, count)` pairs in elements from the matrix start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionTable {
    pub offsets: Vec<usize>,
    pub counts: Vec<usize>,
}

impl PartitionTable {
    /// Padded blocks: each block's owned rows plus the row above and below.
    pub fn scatter(workers: usize, rows: usize, cols: usize) -> Result<Self, StencilError> {
        Self::build(workers, rows, |b| (b.low * cols, b.padded_rows() * cols))
    }

    /// Interior rows only, as written back into the global matrix.
    pub fn gather(workers: usize, rows: usize, cols: usize) -> Result<Self, StencilError> {
        Self::build(workers, rows, |b| ((b.low + 1) * cols, b.size * cols))
    }

    fn build(
        workers: usize,
        rows: usize,
        f: impl Fn(&RowBlock) -> (usize, usize),
    ) -> Result<Self, StencilError> {
        let units = rows.saturating_sub(2);
        check_workers(workers, units)?;
        let (offsets, counts) = (0..workers)
            .map(|id| {
                f(&RowBlock {
                    id,
                    low: block_low(id, workers, units),
                    size: block_size(id, workers, units),
                })
            })
            .unzip();
        Ok(Self { offsets, counts })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
