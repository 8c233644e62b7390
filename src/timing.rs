//! Compute-time accounting.
//!
//! Only time spent inside the stencil kernel is counted. The reported figure
//! for a run is the slowest worker's total.

use crate::comm::Communicator;
use crate::stencil_error::CommError;
use std::time::{Duration, Instant};

/// Accumulates wall-clock time over repeated measured sections.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComputeTimer {
    total: Duration,
}

impl ComputeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, adding its wall-clock duration to the total.
    #[inline]
    pub fn measure<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.total += start.elapsed();
        out
    }

    pub fn elapsed(&self) -> Duration {
        self.total
    }

    pub fn seconds(&self) -> f64 {
        self.total.as_secs_f64()
    }
}

/// Fold per-thread totals into the run's compute time.
pub fn max_of(times: impl IntoIterator<Item = f64>) -> f64 {
    times.into_iter().fold(0.0, f64::max)
}

/// Max of every rank's `local` seconds, delivered on `root`.
pub fn reduce_compute_time<C: Communicator>(
    comm: &C,
    root: usize,
    local: f64,
) -> Result<Option<f64>, CommError> {
    comm.reduce_max(root, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalComm, NoComm};
    use std::thread;

    #[test]
    fn measure_accumulates_across_sections() {
        let mut t = ComputeTimer::new();
        let v = t.measure(|| {
            thread::sleep(Duration::from_millis(2));
            7
        });
        t.measure(|| thread::sleep(Duration::from_millis(2)));
        assert_eq!(v, 7);
        assert!(t.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn max_of_handles_empty_and_mixed() {
        assert_eq!(max_of([]), 0.0);
        assert_eq!(max_of([0.5, 2.0, 1.0]), 2.0);
    }

    #[test]
    fn reduction_lands_on_root_only() {
        assert_eq!(reduce_compute_time(&NoComm, 0, 1.5).unwrap(), Some(1.5));
        let out: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(3)
                .into_iter()
                .map(|c| s.spawn(move || reduce_compute_time(&c, 2, c.rank() as f64 * 0.5 + 1.0)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });
        assert_eq!(out, vec![None, None, Some(2.0)]);
    }
}
