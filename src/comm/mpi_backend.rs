//! MPI backend (feature `mpi-support`).
//!
//! Every operation maps onto one native MPI call: `MPI_Sendrecv` for halos,
//! `MPI_Bcast`, `MPI_Scatterv`, `MPI_Gatherv`, `MPI_Reduce(MAX)` and
//! `MPI_Abort`. The world communicator keeps the default fatal error
//! handler, so a failed call terminates the job instead of returning.

use super::{CommTag, Communicator, check_len, check_table, missing_root};
use crate::partition::PartitionTable;
use crate::stencil_error::{CommError, CommErrorClass};
use ::mpi::collective::SystemOperation;
use ::mpi::datatype::{Partition, PartitionMut};
use ::mpi::environment::Universe;
use ::mpi::topology::{Rank, SimpleCommunicator};
use ::mpi::traits::*;
use ::mpi::Count;

/// Owns the MPI environment; dropping it finalizes MPI.
pub struct MpiComm {
    pub world: SimpleCommunicator,
    rank: usize,
    size: usize,
    // Declared last so `world` is released before finalization.
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI and wrap `MPI_COMM_WORLD`.
    pub fn new() -> Result<Self, CommError> {
        let universe = ::mpi::initialize().ok_or_else(|| {
            CommError::new(
                "MPI_Init",
                0,
                CommErrorClass::Init,
                1,
                "MPI was already initialized",
            )
        })?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(Self {
            world,
            rank,
            size,
            _universe: universe,
        })
    }

    /// Wall-clock seconds, as `MPI_Wtime`.
    pub fn time() -> f64 {
        ::mpi::time()
    }

    fn counts(&self, location: &'static str, values: &[usize]) -> Result<Vec<Count>, CommError> {
        values
            .iter()
            .map(|&v| {
                Count::try_from(v).map_err(|_| {
                    CommError::new(
                        location,
                        self.rank,
                        CommErrorClass::Count,
                        7,
                        format!("{v} elements exceed the MPI count range"),
                    )
                })
            })
            .collect()
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_receive(
        &self,
        peer: Option<usize>,
        tag: CommTag,
        send: &[f64],
        recv: &mut [f64],
    ) -> Result<(), CommError> {
        let Some(peer) = peer else { return Ok(()) };
        let process = self.world.process_at_rank(peer as Rank);
        let status = ::mpi::point_to_point::send_receive_into_with_tags(
            send,
            &process,
            tag.as_i32(),
            recv,
            &process,
            tag.as_i32(),
        );
        check_len(
            "MPI_Sendrecv",
            self.rank,
            recv.len(),
            status.count(f64::equivalent_datatype()) as usize,
        )
    }

    fn broadcast(&self, root: usize, buf: &mut [u64]) -> Result<(), CommError> {
        self.world
            .process_at_rank(root as Rank)
            .broadcast_into(buf);
        Ok(())
    }

    fn scatter_varcount(
        &self,
        root: usize,
        send: Option<(&[f64], &PartitionTable)>,
        recv: &mut [f64],
    ) -> Result<(), CommError> {
        let root_process = self.world.process_at_rank(root as Rank);
        if self.rank != root {
            root_process.scatter_varcount_into(recv);
            return Ok(());
        }
        let (data, table) = send.ok_or_else(|| missing_root("MPI_Scatterv", self.rank))?;
        check_table("MPI_Scatterv", self.rank, self.size, table, data.len())?;
        let counts = self.counts("MPI_Scatterv", &table.counts)?;
        let displs = self.counts("MPI_Scatterv", &table.offsets)?;
        let partition = Partition::new(data, counts, displs);
        root_process.scatter_varcount_into_root(&partition, recv);
        Ok(())
    }

    fn gather_varcount(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<(&mut [f64], &PartitionTable)>,
    ) -> Result<(), CommError> {
        let root_process = self.world.process_at_rank(root as Rank);
        if self.rank != root {
            root_process.gather_varcount_into(send);
            return Ok(());
        }
        let (data, table) = recv.ok_or_else(|| missing_root("MPI_Gatherv", self.rank))?;
        check_table("MPI_Gatherv", self.rank, self.size, table, data.len())?;
        let counts = self.counts("MPI_Gatherv", &table.counts)?;
        let displs = self.counts("MPI_Gatherv", &table.offsets)?;
        let mut partition = PartitionMut::new(data, counts, displs);
        root_process.gather_varcount_into_root(send, &mut partition);
        Ok(())
    }

    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, CommError> {
        let root_process = self.world.process_at_rank(root as Rank);
        if self.rank == root {
            let mut max = 0.0f64;
            root_process.reduce_into_root(&value, &mut max, SystemOperation::max());
            Ok(Some(max))
        } else {
            root_process.reduce_into(&value, SystemOperation::max());
            Ok(None)
        }
    }

    fn abort(&self, code: i32) {
        self.world.abort(code)
    }
}
