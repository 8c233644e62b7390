//! Double buffering for stencil sweeps.
//!
//! [`DoubleBuffer`] owns (or borrows) exactly two buffers and an active index;
//! [`swap`](DoubleBuffer::swap) flips the roles without moving data.
//! [`SharedGrid`] is the buffer handed to worker threads in shared-memory
//! mode: many readers, disjoint row-range writers, phases separated by the
//! barrier.

use crate::stencil_error::StencilError;
use static_assertions::assert_impl_all;
use std::cell::UnsafeCell;
use std::ops::Range;

/// Two buffers with alternating "current" (read) and "next" (write) roles.
#[derive(Clone, Debug)]
pub struct DoubleBuffer<T> {
    bufs: [T; 2],
    active: usize,
}

impl<T> DoubleBuffer<T> {
    /// `current` starts as the read buffer, `next` as the write buffer.
    pub fn new(current: T, next: T) -> Self {
        Self {
            bufs: [current, next],
            active: 0,
        }
    }

    pub fn current(&self) -> &T {
        &self.bufs[self.active]
    }

    pub fn next(&self) -> &T {
        &self.bufs[1 - self.active]
    }

    pub fn next_mut(&mut self) -> &mut T {
        &mut self.bufs[1 - self.active]
    }

    /// Read access to "current" and write access to "next" at the same time.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.bufs;
        if self.active == 0 { (&*a, b) } else { (&*b, a) }
    }

    /// Flip roles: the buffer just written becomes "current".
    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    /// Index (0 or 1) of the buffer currently holding the latest state.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Consume the pair and return the latest state.
    pub fn into_current(self) -> T {
        let [a, b] = self.bufs;
        if self.active == 0 { a } else { b }
    }
}

impl DoubleBuffer<Vec<f64>> {
    /// Pair `data` with a copy of itself, so that rows and columns never
    /// recomputed (boundaries, domain-end halos) are valid in both roles.
    pub fn mirrored(data: Vec<f64>, what: &'static str) -> Result<Self, StencilError> {
        let mut next = Vec::new();
        next.try_reserve_exact(data.len())
            .map_err(|_| StencilError::Allocation {
                what,
                bytes: data.len() * std::mem::size_of::<f64>(),
            })?;
        next.extend_from_slice(&data);
        Ok(Self::new(data, next))
    }
}

/// A row-major buffer shared by reference between worker threads.
///
/// Nothing here synchronizes: callers guarantee that during a compute phase
/// the buffer is either only read, or written in row ranges no other thread
/// touches, and that phases are separated by a barrier.
pub struct SharedGrid {
    // Never resized or reborrowed while shared; `ptr` stays valid.
    data: UnsafeCell<Vec<f64>>,
    ptr: *mut f64,
    len: usize,
    cols: usize,
}

// SAFETY: all access goes through the unsafe accessors below, whose contracts
// require phase separation and disjoint writers.
unsafe impl Sync for SharedGrid {}
unsafe impl Send for SharedGrid {}

assert_impl_all!(SharedGrid: Sync, Send);
assert_impl_all!(DoubleBuffer<&'static SharedGrid>: Send);

impl SharedGrid {
    pub fn new(mut data: Vec<f64>, cols: usize) -> Self {
        debug_assert_eq!(data.len() % cols, 0);
        let ptr = data.as_mut_ptr();
        let len = data.len();
        Self {
            data: UnsafeCell::new(data),
            ptr,
            len,
            cols,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whole buffer, read-only.
    ///
    /// # Safety
    /// No thread may write to this buffer while the returned slice is alive.
    pub unsafe fn as_slice(&self) -> &[f64] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Rows `rows` of the buffer, writable.
    ///
    /// # Safety
    /// The rows must not overlap any other live slice of this buffer, and
    /// nobody may read this buffer while the returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn rows_mut(&self, rows: Range<usize>) -> &mut [f64] {
        let start = rows.start * self.cols;
        let len = rows.len() * self.cols;
        assert!(start + len <= self.len, "row range {rows:?} out of bounds");
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), len) }
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flips_roles_without_copying() {
        let mut db = DoubleBuffer::new(vec![1.0], vec![2.0]);
        let before = db.next().as_ptr();
        db.swap();
        assert_eq!(db.current().as_ptr(), before);
        assert_eq!(db.current()[0], 2.0);
        assert_eq!(db.active(), 1);
        assert_eq!(db.into_current(), vec![2.0]);
    }

    #[test]
    fn split_never_aliases() {
        let mut db = DoubleBuffer::mirrored(vec![0.5; 4], "test").unwrap();
        for _ in 0..3 {
            let (cur, next) = db.split();
            assert_ne!(cur.as_ptr(), next.as_ptr());
            next[0] = cur[0] + 1.0;
            db.swap();
        }
        assert_eq!(db.current()[0], 3.5);
    }

    #[test]
    fn shared_grid_disjoint_rows_round_trip() {
        let g = SharedGrid::new(vec![0.0; 12], 3);
        unsafe {
            g.rows_mut(0..2).fill(1.0);
            g.rows_mut(2..4).fill(2.0);
            assert_eq!(g.as_slice()[5], 1.0);
            assert_eq!(g.as_slice()[6], 2.0);
        }
        assert_eq!(g.into_vec().iter().sum::<f64>(), 18.0);
    }
}
