//! Border-row exchange between adjacent message-passing blocks.
//!
//! Blocks form a chain ordered by rank. A padded block with `n` owned rows
//! has local layout
//!
//! ```text
//! row 0      top halo     (upper neighbour's bottom owned row, or boundary row)
//! rows 1..=n owned rows
//! row n+1    bottom halo  (lower neighbour's top owned row, or boundary row)
//! ```
//!
//! Each exchange is one combined send-and-receive. Even ranks talk to their
//! lower neighbour first and odd ranks to their upper neighbour first, so
//! pairs `(2i, 2i+1)` and then `(2i+1, 2i+2)` meet in lockstep even when the
//! paired operation is built from blocking halves.

use crate::comm::{CommTag, Communicator};
use crate::stencil_error::CommError;

/// The chain neighbours of one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbors {
    pub upper: Option<usize>,
    pub lower: Option<usize>,
}

impl Neighbors {
    pub fn of(rank: usize, size: usize) -> Self {
        Self {
            upper: rank.checked_sub(1),
            lower: (rank + 1 < size).then_some(rank + 1),
        }
    }
}

/// Which side of a block an exchange refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
}

/// Exchanges halo rows of one padded block per iteration.
#[derive(Clone, Copy, Debug)]
pub struct HaloExchanger {
    rank: usize,
    neighbors: Neighbors,
    cols: usize,
    owned_rows: usize,
}

impl HaloExchanger {
    pub fn new(rank: usize, size: usize, cols: usize, owned_rows: usize) -> Self {
        Self {
            rank,
            neighbors: Neighbors::of(rank, size),
            cols,
            owned_rows,
        }
    }

    pub fn neighbors(&self) -> Neighbors {
        self.neighbors
    }

    /// Refresh both halo rows of `block` from the neighbours' owned rows.
    ///
    /// Must run after the sweep that wrote `block` and before the next sweep
    /// reads it. Domain-end halos keep the boundary row they were scattered with.
    pub fn exchange<C: Communicator>(&self, comm: &C, block: &mut [f64]) -> Result<(), CommError> {
        debug_assert_eq!(block.len(), (self.owned_rows + 2) * self.cols);
        let order = if self.rank % 2 == 0 {
            [Side::Bottom, Side::Top]
        } else {
            [Side::Top, Side::Bottom]
        };
        for side in order {
            self.exchange_side(comm, block, side)?;
        }
        Ok(())
    }

    fn exchange_side<C: Communicator>(
        &self,
        comm: &C,
        block: &mut [f64],
        side: Side,
    ) -> Result<(), CommError> {
        let c = self.cols;
        let n = self.owned_rows;
        match side {
            Side::Top => {
                // send row 1, receive into row 0
                let (halo, rest) = block.split_at_mut(c);
                comm.send_receive(self.neighbors.upper, CommTag::HALO, &rest[..c], halo)
            }
            Side::Bottom => {
                // send row n, receive into row n+1
                let (head, halo) = block.split_at_mut((n + 1) * c);
                comm.send_receive(self.neighbors.lower, CommTag::HALO, &head[n * c..], halo)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalComm, NoComm};
    use std::thread;

    #[test]
    fn chain_ends_have_one_neighbour() {
        assert_eq!(Neighbors::of(0, 3), Neighbors { upper: None, lower: Some(1) });
        assert_eq!(Neighbors::of(1, 3), Neighbors { upper: Some(0), lower: Some(2) });
        assert_eq!(Neighbors::of(2, 3), Neighbors { upper: Some(1), lower: None });
        assert_eq!(Neighbors::of(0, 1), Neighbors { upper: None, lower: None });
    }

    #[test]
    fn single_block_keeps_boundary_halos() {
        let mut block = vec![7.0, 7.0, 1.0, 1.0, 9.0, 9.0];
        HaloExchanger::new(0, 1, 2, 1)
            .exchange(&NoComm, &mut block)
            .unwrap();
        assert_eq!(block, vec![7.0, 7.0, 1.0, 1.0, 9.0, 9.0]);
    }

    #[test]
    fn halos_receive_neighbour_edge_rows() {
        // Four ranks, 2 columns, rank r owns r+1 rows filled with r.
        let blocks: Vec<Vec<f64>> = thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(4)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let rank = comm.rank();
                        let n = rank + 1;
                        let mut block = vec![-1.0; (n + 2) * 2];
                        block[2..(n + 1) * 2].fill(rank as f64);
                        HaloExchanger::new(rank, comm.size(), 2, n)
                            .exchange(&comm, &mut block)
                            .unwrap();
                        block
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (rank, block) in blocks.iter().enumerate() {
            let n = rank + 1;
            let top = if rank == 0 { -1.0 } else { rank as f64 - 1.0 };
            let bottom = if rank == 3 { -1.0 } else { rank as f64 + 1.0 };
            assert_eq!(&block[..2], &[top, top], "rank {rank} top halo");
            assert_eq!(&block[(n + 1) * 2..], &[bottom, bottom], "rank {rank} bottom halo");
        }
    }
}
