//! Moving the global matrix between the coordinator and the blocks.
//!
//! The coordinator broadcasts a [`RunHeader`], then every rank receives its
//! padded block through a variable-count scatter. Interior rows travel back
//! through a variable-count gather, once at the end and, when snapshots are
//! taken, once per iteration.

use crate::comm::Communicator;
use crate::config::DebugLevel;
use crate::grid::{MIN_EXTENT, try_alloc};
use crate::partition::{PartitionTable, RowBlock};
use crate::stencil_error::StencilError;

/// What every rank needs to know before the first sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunHeader {
    pub rows: usize,
    pub cols: usize,
    pub iterations: usize,
    pub debug_level: DebugLevel,
    /// Whether interior rows are gathered after every iteration.
    pub snapshots: bool,
}

impl RunHeader {
    const WORDS: usize = 5;

    fn encode(&self) -> [u64; Self::WORDS] {
        [
            self.rows as u64,
            self.cols as u64,
            self.iterations as u64,
            u64::from(u8::from(self.debug_level)),
            u64::from(self.snapshots),
        ]
    }

    fn decode(words: [u64; Self::WORDS]) -> Result<Self, StencilError> {
        let to_usize = |v: u64| {
            usize::try_from(v)
                .map_err(|_| StencilError::Configuration(format!("header value {v} overflows")))
        };
        let header = Self {
            rows: to_usize(words[0])?,
            cols: to_usize(words[1])?,
            iterations: to_usize(words[2])?,
            debug_level: DebugLevel::try_from(words[3])?,
            snapshots: words[4] != 0,
        };
        if header.rows < MIN_EXTENT || header.cols < MIN_EXTENT {
            return Err(StencilError::Configuration(format!(
                "broadcast matrix[{}x{}] is degenerate",
                header.rows, header.cols
            )));
        }
        Ok(header)
    }

    /// Share the coordinator's header with every rank.
    ///
    /// `mine` is `Some` on `root` and ignored elsewhere.
    pub fn broadcast<C: Communicator>(
        comm: &C,
        root: usize,
        mine: Option<&RunHeader>,
    ) -> Result<RunHeader, StencilError> {
        let mut words = match mine {
            Some(h) if comm.rank() == root => h.encode(),
            _ => [0; Self::WORDS],
        };
        comm.broadcast(root, &mut words)?;
        Self::decode(words)
    }
}

/// One rank's view of the decomposition.
#[derive(Clone, Debug)]
pub struct Distribution {
    pub block: RowBlock,
    pub rows: usize,
    pub cols: usize,
    root: usize,
    is_root: bool,
    gather_table: Option<PartitionTable>,
}

impl Distribution {
    /// Compute this rank's block; the root also derives the gather table.
    pub fn new<C: Communicator>(
        comm: &C,
        root: usize,
        header: &RunHeader,
    ) -> Result<Self, StencilError> {
        let units = header.rows - 2;
        let block = RowBlock::new(comm.rank(), comm.size(), units)?;
        let is_root = comm.rank() == root;
        let gather_table = if is_root {
            Some(PartitionTable::gather(comm.size(), header.rows, header.cols)?)
        } else {
            None
        };
        Ok(Self {
            block,
            rows: header.rows,
            cols: header.cols,
            root,
            is_root,
            gather_table,
        })
    }

    /// Elements in this rank's padded block.
    pub fn padded_len(&self) -> usize {
        self.block.padded_rows() * self.cols
    }

    /// Receive this rank's padded block from the root's global matrix.
    pub fn scatter<C: Communicator>(
        &self,
        comm: &C,
        global: Option<&[f64]>,
    ) -> Result<Vec<f64>, StencilError> {
        let mut block = try_alloc(self.padded_len(), "block")?;
        if self.is_root {
            let global = global.ok_or_else(|| {
                StencilError::Configuration("coordinator has no matrix to scatter".into())
            })?;
            let table = PartitionTable::scatter(comm.size(), self.rows, self.cols)?;
            comm.scatter_varcount(self.root, Some((global, &table)), &mut block)?;
        } else {
            comm.scatter_varcount(self.root, None, &mut block)?;
        }
        log::debug!(
            "rank {} received rows {:?} ({} padded)",
            comm.rank(),
            self.block.global_rows(),
            self.block.padded_rows()
        );
        Ok(block)
    }

    /// Send the owned rows of `block` into the root's global matrix.
    pub fn gather<C: Communicator>(
        &self,
        comm: &C,
        block: &[f64],
        global: Option<&mut [f64]>,
    ) -> Result<(), StencilError> {
        let owned = &block[self.cols..(self.block.size + 1) * self.cols];
        match (&self.gather_table, global) {
            (Some(table), Some(global)) => {
                comm.gather_varcount(self.root, owned, Some((global, table)))?
            }
            (Some(_), None) => {
                return Err(StencilError::Configuration(
                    "coordinator has no matrix to gather into".into(),
                ));
            }
            (None, _) => comm.gather_varcount(self.root, owned, None)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use crate::grid::Grid;
    use std::thread;

    fn header(rows: usize, cols: usize) -> RunHeader {
        RunHeader {
            rows,
            cols,
            iterations: 3,
            debug_level: DebugLevel::Summary,
            snapshots: true,
        }
    }

    #[test]
    fn decode_rejects_bad_words() {
        assert!(RunHeader::decode([2, 5, 1, 0, 0]).is_err());
        assert!(RunHeader::decode([5, 5, 1, 7, 0]).is_err());
        let h = header(6, 4);
        assert_eq!(RunHeader::decode(h.encode()).unwrap(), h);
    }

    #[test]
    fn scatter_then_gather_restores_the_matrix() {
        let (rows, cols) = (9, 4);
        let source: Vec<f64> = (0..rows * cols).map(|v| v as f64).collect();
        let gathered: Vec<Option<Vec<f64>>> = thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(3)
                .into_iter()
                .map(|comm| {
                    let source = source.clone();
                    s.spawn(move || {
                        let root = comm.coordinator();
                        let is_root = comm.rank() == root;
                        let mine = header(rows, cols);
                        let h = RunHeader::broadcast(&comm, root, is_root.then_some(&mine)).unwrap();
                        assert_eq!(h, mine);

                        let dist = Distribution::new(&comm, root, &h).unwrap();
                        let block = dist
                            .scatter(&comm, is_root.then_some(&source[..]))
                            .unwrap();
                        let first = dist.block.low * cols;
                        assert_eq!(block, source[first..first + dist.padded_len()]);

                        let mut out = Grid::initial(rows, cols).unwrap().into_vec();
                        dist.gather(&comm, &block, is_root.then_some(&mut out[..]))
                            .unwrap();
                        is_root.then_some(out)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let out = gathered[2].as_ref().unwrap();
        // interior rows came back; boundary rows are whatever the root had
        assert_eq!(&out[cols..(rows - 1) * cols], &source[cols..(rows - 1) * cols]);
        assert!(gathered[0].is_none() && gathered[1].is_none());
    }
}
