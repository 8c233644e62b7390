//! Thin façade over in-process or inter-process (MPI) message passing.
//!
//! A [`Communicator`] is the explicit execution context of a
//! message-passing worker: its rank, the group size, and the operations the
//! stencil engine needs (paired halo exchange, broadcast, variable-count
//! scatter/gather, max-reduction, abort). Backends:
//!
//! - [`NoComm`]: a group of one, for serial runs and unit tests.
//! - [`LocalComm`]: ranks are threads of one process exchanging through a
//!   shared mailbox; lets the message-passing engine run without MPI.
//! - `MpiComm` (feature `mpi-support`): native MPI collectives via `mpi`.

pub mod local;
#[cfg(feature = "mpi-support")]
pub mod mpi_backend;

pub use local::LocalComm;
#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

use crate::partition::PartitionTable;
use crate::stencil_error::{CommError, CommErrorClass};

/// Message tag; every protocol phase uses its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const HALO: CommTag = CommTag(99);
    pub const BROADCAST: CommTag = CommTag(0x1000);
    pub const SCATTER: CommTag = CommTag(0x1001);
    pub const GATHER: CommTag = CommTag(0x1002);
    pub const REDUCE: CommTag = CommTag(0x1003);

    pub fn base(self) -> u16 {
        self.0
    }

    pub fn as_i32(self) -> i32 {
        i32::from(self.0)
    }
}

/// Operations a message-passing worker performs on its group.
///
/// Collective methods must be called by every rank of the group; root-only
/// arguments are `Some` on the root and `None` elsewhere.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Rank that owns the global matrix: the highest rank, not rank 0.
    fn coordinator(&self) -> usize {
        self.size() - 1
    }

    /// Send `send` to `peer` and receive `recv` from it as one operation.
    /// A `None` peer (domain end) makes this a no-op.
    fn send_receive(
        &self,
        peer: Option<usize>,
        tag: CommTag,
        send: &[f64],
        recv: &mut [f64],
    ) -> Result<(), CommError>;

    /// Copy `buf` from `root` to every rank.
    fn broadcast(&self, root: usize, buf: &mut [u64]) -> Result<(), CommError>;

    /// Hand segment `r` of the root's buffer (as described by the table) to rank `r`.
    fn scatter_varcount(
        &self,
        root: usize,
        send: Option<(&[f64], &PartitionTable)>,
        recv: &mut [f64],
    ) -> Result<(), CommError>;

    /// Place each rank's `send` into its table segment of the root's buffer.
    fn gather_varcount(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<(&mut [f64], &PartitionTable)>,
    ) -> Result<(), CommError>;

    /// Maximum of `value` over all ranks, delivered on `root` only.
    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, CommError>;

    /// Terminate the whole group. Blocked peers must not hang afterwards.
    fn abort(&self, code: i32);
}

/// Validate a root's partition table against its buffer and the group size.
pub(crate) fn check_table(
    location: &'static str,
    rank: usize,
    size: usize,
    table: &PartitionTable,
    len: usize,
) -> Result<(), CommError> {
    if table.len() != size {
        return Err(CommError::new(
            location,
            rank,
            CommErrorClass::Count,
            1,
            format!("table has {} entries for {} ranks", table.len(), size),
        ));
    }
    for (r, (&off, &cnt)) in table.offsets.iter().zip(&table.counts).enumerate() {
        if off + cnt > len {
            return Err(CommError::new(
                location,
                rank,
                CommErrorClass::Count,
                2,
                format!("segment {r} [{off}, {}) exceeds buffer of {len}", off + cnt),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_len(
    location: &'static str,
    rank: usize,
    expected: usize,
    found: usize,
) -> Result<(), CommError> {
    if expected != found {
        return Err(CommError::new(
            location,
            rank,
            CommErrorClass::Truncate,
            3,
            format!("message of {found} elements, expected {expected}"),
        ));
    }
    Ok(())
}

fn missing_root(location: &'static str, rank: usize) -> CommError {
    CommError::new(
        location,
        rank,
        CommErrorClass::Root,
        4,
        "root rank called without its root buffer",
    )
}

/// Compile-time no-op comm: a group of exactly one rank.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl NoComm {
    fn check_peer(&self, peer: Option<usize>) -> Result<(), CommError> {
        match peer {
            None => Ok(()),
            Some(p) => Err(CommError::new(
                "NoComm",
                0,
                CommErrorClass::Rank,
                5,
                format!("no peer {p} in a group of one"),
            )),
        }
    }
}

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn is_no_comm(&self) -> bool {
        true
    }

    fn send_receive(
        &self,
        peer: Option<usize>,
        _tag: CommTag,
        _send: &[f64],
        _recv: &mut [f64],
    ) -> Result<(), CommError> {
        self.check_peer(peer)
    }

    fn broadcast(&self, root: usize, _buf: &mut [u64]) -> Result<(), CommError> {
        self.check_peer(Some(root).filter(|&r| r != 0))
    }

    fn scatter_varcount(
        &self,
        _root: usize,
        send: Option<(&[f64], &PartitionTable)>,
        recv: &mut [f64],
    ) -> Result<(), CommError> {
        let (data, table) = send.ok_or_else(|| missing_root("NoComm::scatter", 0))?;
        check_table("NoComm::scatter", 0, 1, table, data.len())?;
        let (off, cnt) = (table.offsets[0], table.counts[0]);
        check_len("NoComm::scatter", 0, cnt, recv.len())?;
        recv.copy_from_slice(&data[off..off + cnt]);
        Ok(())
    }

    fn gather_varcount(
        &self,
        _root: usize,
        send: &[f64],
        recv: Option<(&mut [f64], &PartitionTable)>,
    ) -> Result<(), CommError> {
        let (data, table) = recv.ok_or_else(|| missing_root("NoComm::gather", 0))?;
        check_table("NoComm::gather", 0, 1, table, data.len())?;
        let (off, cnt) = (table.offsets[0], table.counts[0]);
        check_len("NoComm::gather", 0, cnt, send.len())?;
        data[off..off + cnt].copy_from_slice(send);
        Ok(())
    }

    fn reduce_max(&self, _root: usize, value: f64) -> Result<Option<f64>, CommError> {
        Ok(Some(value))
    }

    fn abort(&self, code: i32) {
        log::debug!("NoComm abort requested with code {code}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_a_group_of_one() {
        let comm = NoComm;
        assert!(comm.is_no_comm());
        assert_eq!(comm.coordinator(), 0);
        let mut recv = [0.0; 2];
        comm.send_receive(None, CommTag::HALO, &[1.0, 2.0], &mut recv)
            .unwrap();
        assert_eq!(recv, [0.0, 0.0]);
        assert!(comm.send_receive(Some(1), CommTag::HALO, &[], &mut []).is_err());
        assert_eq!(comm.reduce_max(0, 2.5).unwrap(), Some(2.5));
    }

    #[test]
    fn no_comm_scatter_then_gather_uses_segment_zero() {
        let comm = NoComm;
        let table = PartitionTable {
            offsets: vec![1],
            counts: vec![2],
        };
        let data = [9.0, 1.0, 2.0, 9.0];
        let mut block = [0.0; 2];
        comm.scatter_varcount(0, Some((&data, &table)), &mut block)
            .unwrap();
        assert_eq!(block, [1.0, 2.0]);

        let mut out = [0.0; 4];
        comm.gather_varcount(0, &[5.0, 6.0], Some((&mut out, &table)))
            .unwrap();
        assert_eq!(out, [0.0, 5.0, 6.0, 0.0]);
    }
}
