//! In-process message passing: each rank is a thread, messages go through a
//! shared mailbox keyed by `(src, dst, tag)`.
//!
//! Sends are buffered (they never block), receives block until a matching
//! message arrives or the group is aborted. Collectives are built from
//! point-to-point messages to and from the root.

use super::{CommTag, Communicator, check_len, check_table, missing_root};
use crate::partition::PartitionTable;
use crate::stencil_error::{CommError, CommErrorClass};
use bytemuck::{Pod, cast_slice, cast_slice_mut};
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct MailboxState {
    slots: HashMap<Key, VecDeque<Bytes>>,
    aborted: Option<(usize, i32)>,
}

#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    arrived: Condvar,
}

/// One rank of an in-process group created by [`LocalComm::universe`].
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// Create a group of `size` ranks sharing one mailbox; element `r` is rank `r`.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    fn aborted(&self, location: &'static str, by: usize, code: i32) -> CommError {
        CommError::new(
            location,
            self.rank,
            CommErrorClass::Aborted,
            code,
            format!("group aborted by rank {by}"),
        )
    }

    fn check_rank(&self, location: &'static str, peer: usize) -> Result<(), CommError> {
        if peer >= self.size {
            return Err(CommError::new(
                location,
                self.rank,
                CommErrorClass::Rank,
                6,
                format!("peer {peer} outside group of {}", self.size),
            ));
        }
        Ok(())
    }

    /// Buffered send of raw bytes.
    pub fn post(&self, dest: usize, tag: CommTag, buf: &[u8]) -> Result<(), CommError> {
        self.check_rank("LocalComm::post", dest)?;
        let mut state = self.mailbox.state.lock();
        if let Some((by, code)) = state.aborted {
            return Err(self.aborted("LocalComm::post", by, code));
        }
        state
            .slots
            .entry((self.rank, dest, tag.base()))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        drop(state);
        self.mailbox.arrived.notify_all();
        Ok(())
    }

    /// Blocking receive of exactly `out.len()` bytes from `source`.
    pub fn take(&self, source: usize, tag: CommTag, out: &mut [u8]) -> Result<(), CommError> {
        self.check_rank("LocalComm::take", source)?;
        let key = (source, self.rank, tag.base());
        let mut state = self.mailbox.state.lock();
        let msg = loop {
            if let Some((by, code)) = state.aborted {
                return Err(self.aborted("LocalComm::take", by, code));
            }
            if let Some(msg) = state.slots.get_mut(&key).and_then(VecDeque::pop_front) {
                break msg;
            }
            self.mailbox.arrived.wait(&mut state);
        };
        drop(state);
        check_len("LocalComm::take", self.rank, out.len(), msg.len())?;
        out.copy_from_slice(&msg);
        Ok(())
    }

    fn send_pod<T: Pod>(&self, dest: usize, tag: CommTag, buf: &[T]) -> Result<(), CommError> {
        self.post(dest, tag, cast_slice(buf))
    }

    fn recv_pod<T: Pod>(&self, source: usize, tag: CommTag, buf: &mut [T]) -> Result<(), CommError> {
        self.take(source, tag, cast_slice_mut(buf))
    }
}

impl Communicator for LocalComm {
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
        // Sends are buffered, so posting first cannot deadlock.
        self.send_pod(peer, tag, send)?;
        self.recv_pod(peer, tag, recv)
    }

    fn broadcast(&self, root: usize, buf: &mut [u64]) -> Result<(), CommError> {
        self.check_rank("LocalComm::broadcast", root)?;
        if self.rank == root {
            for r in (0..self.size).filter(|&r| r != root) {
                self.send_pod(r, CommTag::BROADCAST, buf)?;
            }
            Ok(())
        } else {
            self.recv_pod(root, CommTag::BROADCAST, buf)
        }
    }

    fn scatter_varcount(
        &self,
        root: usize,
        send: Option<(&[f64], &PartitionTable)>,
        recv: &mut [f64],
    ) -> Result<(), CommError> {
        self.check_rank("LocalComm::scatter", root)?;
        if self.rank != root {
            return self.recv_pod(root, CommTag::SCATTER, recv);
        }
        let (data, table) = send.ok_or_else(|| missing_root("LocalComm::scatter", self.rank))?;
        check_table("LocalComm::scatter", self.rank, self.size, table, data.len())?;
        for (r, (&off, &cnt)) in table.offsets.iter().zip(&table.counts).enumerate() {
            let segment = &data[off..off + cnt];
            if r == root {
                check_len("LocalComm::scatter", self.rank, cnt, recv.len())?;
                recv.copy_from_slice(segment);
            } else {
                self.send_pod(r, CommTag::SCATTER, segment)?;
            }
        }
        Ok(())
    }

    fn gather_varcount(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<(&mut [f64], &PartitionTable)>,
    ) -> Result<(), CommError> {
        self.check_rank("LocalComm::gather", root)?;
        if self.rank != root {
            return self.send_pod(root, CommTag::GATHER, send);
        }
        let (data, table) = recv.ok_or_else(|| missing_root("LocalComm::gather", self.rank))?;
        check_table("LocalComm::gather", self.rank, self.size, table, data.len())?;
        for (r, (&off, &cnt)) in table.offsets.iter().zip(&table.counts).enumerate() {
            let segment = &mut data[off..off + cnt];
            if r == root {
                check_len("LocalComm::gather", self.rank, cnt, send.len())?;
                segment.copy_from_slice(send);
            } else {
                self.recv_pod(r, CommTag::GATHER, segment)?;
            }
        }
        Ok(())
    }

    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, CommError> {
        self.check_rank("LocalComm::reduce", root)?;
        if self.rank != root {
            self.send_pod(root, CommTag::REDUCE, &[value])?;
            return Ok(None);
        }
        let mut max = value;
        for r in (0..self.size).filter(|&r| r != root) {
            let mut v = [0.0f64];
            self.recv_pod(r, CommTag::REDUCE, &mut v)?;
            max = max.max(v[0]);
        }
        Ok(Some(max))
    }

    fn abort(&self, code: i32) {
        let mut state = self.mailbox.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some((self.rank, code));
        }
        drop(state);
        self.mailbox.arrived.notify_all();
    }
}
