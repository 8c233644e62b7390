//! Thread-parallel run on one shared buffer pair.
//!
//! Worker `r` owns interior rows `block_low(r)+1 ..` of both buffers. In
//! iteration `k` every worker reads the "current" buffer and writes only its
//! own rows of "next", then meets the others at the phase barrier. Rank 0
//! is the owner: snapshots and debug prints run inside its barrier window,
//! while all other workers are parked and nothing is being written.
//!
//! Threads are spawned before the work is planned. If only `m` of the
//! requested threads start, the partition and the barrier are built for `m`.

use super::{Observer, RunOutput, Sink};
use crate::barrier::PhaseBarrier;
use crate::buffer::{DoubleBuffer, SharedGrid};
use crate::config::DebugLevel;
use crate::grid::{Grid, GridView, try_alloc};
use crate::partition::{RowBlock, check_workers};
use crate::stencil::sweep_rows;
use crate::stencil_error::StencilError;
use crate::timing::{ComputeTimer, max_of};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, Scope, ScopedJoinHandle};

/// Work handed to a thread once the effective worker count is known.
struct Plan {
    block: RowBlock,
    barrier: Arc<PhaseBarrier>,
}

/// Fixed per-run parameters every worker reads.
#[derive(Clone, Copy)]
struct Shape {
    rows: usize,
    cols: usize,
    iterations: usize,
}

/// Breaks the barrier if the worker leaves early, by error or by panic.
struct AbandonGuard<'b> {
    barrier: &'b PhaseBarrier,
    completed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.barrier.abandon();
        }
    }
}

/// Apply `iterations` sweeps to `grid` with `threads` worker threads.
///
/// # Errors
/// `TooManyWorkers` if `threads` exceeds the interior row count. A failed
/// snapshot stops every worker; the snapshot error is returned.
pub fn run(
    grid: Grid,
    iterations: usize,
    threads: usize,
    debug_level: DebugLevel,
    sink: Sink<'_>,
) -> Result<RunOutput, StencilError> {
    run_with_spawn_limit(grid, iterations, threads, debug_level, sink, None)
}

/// As [`run`], but thread creation fails for every rank `>= spawn_limit`.
pub(crate) fn run_with_spawn_limit(
    grid: Grid,
    iterations: usize,
    threads: usize,
    debug_level: DebugLevel,
    sink: Sink<'_>,
    spawn_limit: Option<usize>,
) -> Result<RunOutput, StencilError> {
    let shape = Shape {
        rows: grid.rows(),
        cols: grid.cols(),
        iterations,
    };
    check_workers(threads, grid.interior_rows())?;

    let mut observer = Observer::new(sink, debug_level);
    observer.observe(0, grid.view())?;

    let current = grid.into_vec();
    let mut next = try_alloc(current.len(), "matrix")?;
    next.copy_from_slice(&current);
    let grids = [
        SharedGrid::new(current, shape.cols),
        SharedGrid::new(next, shape.cols),
    ];

    let (workers, results) = thread::scope(|s| {
        let mut owner_slot = Some(&mut observer);
        let mut started = Vec::with_capacity(threads);
        for rank in 0..threads {
            let (tx, rx) = mpsc::channel();
            let owner = if rank == 0 { owner_slot.take() } else { None };
            match spawn_worker(s, rank, spawn_limit, rx, &grids, shape, owner) {
                Ok(handle) => started.push((handle, tx)),
                Err(e) if rank == 0 => return (0, vec![Ok(Err(e))]),
                Err(e) => {
                    log::warn!("created {rank} of {threads} worker threads: {e}");
                    break;
                }
            }
        }

        let workers = started.len();
        let plan = PhaseBarrier::new(workers).map(Arc::new);
        for (rank, (_, tx)) in started.iter().enumerate() {
            let sent = match &plan {
                Ok(barrier) => RowBlock::new(rank, workers, shape.rows - 2)
                    .map(|block| tx.send(Plan {
                        block,
                        barrier: Arc::clone(barrier),
                    })),
                Err(_) => Ok(Ok(())),
            };
            if !matches!(sent, Ok(Ok(()))) {
                if let Ok(barrier) = &plan {
                    barrier.abandon();
                }
            }
        }
        // Dropping the senders releases any thread that got no plan.
        let results = started
            .into_iter()
            .map(|(handle, tx)| {
                drop(tx);
                handle.join()
            })
            .collect::<Vec<_>>();
        (workers, results)
    });

    let mut times = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(Ok(t)) => times.push(t),
            Ok(Err(e)) => errors.push(e),
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
    if !errors.is_empty() {
        let pos = errors.iter().position(|e| !e.is_secondary()).unwrap_or(0);
        log::debug!("{} of {workers} workers failed", errors.len());
        return Err(errors.swap_remove(pos));
    }

    let [a, b] = grids;
    let latest = if iterations % 2 == 0 { a } else { b };
    Ok(RunOutput {
        grid: Grid::from_vec(shape.rows, shape.cols, latest.into_vec())?,
        compute_time: max_of(times),
        workers,
    })
}

fn spawn_worker<'scope, 'env>(
    s: &'scope Scope<'scope, 'env>,
    rank: usize,
    spawn_limit: Option<usize>,
    plans: Receiver<Plan>,
    grids: &'scope [SharedGrid; 2],
    shape: Shape,
    owner: Option<&'scope mut Observer<'_>>,
) -> Result<ScopedJoinHandle<'scope, Result<f64, StencilError>>, StencilError> {
    if spawn_limit.is_some_and(|limit| rank >= limit) {
        return Err(StencilError::ThreadSpawn {
            rank,
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "thread limit reached"),
        });
    }
    thread::Builder::new()
        .name(format!("stencil-{rank}"))
        .spawn_scoped(s, move || {
            let plan = plans.recv().map_err(|_| StencilError::Synchronization {
                location: "shared_memory::worker",
                reason: "no work plan received".into(),
            })?;
            if rank == 0 {
                log::info!(
                    "running {} stencil iterations with {} threads",
                    shape.iterations,
                    plan.barrier.parties()
                );
            }
            let mut guard = AbandonGuard {
                barrier: &plan.barrier,
                completed: false,
            };
            let out = sweep_block(&plan, grids, shape, rank == 0, owner);
            guard.completed = out.is_ok();
            out
        })
        .map_err(|source| StencilError::ThreadSpawn { rank, source })
}

fn sweep_block(
    plan: &Plan,
    grids: &[SharedGrid; 2],
    shape: Shape,
    is_owner: bool,
    mut observer: Option<&mut Observer<'_>>,
) -> Result<f64, StencilError> {
    let Shape {
        rows,
        cols,
        iterations,
    } = shape;
    let owned = plan.block.global_rows();
    let mut buf = DoubleBuffer::new(&grids[0], &grids[1]);
    let mut timer = ComputeTimer::new();
    for k in 1..=iterations {
        let (current, next) = (*buf.current(), *buf.next());
        // SAFETY: during the compute phase `current` is only read and every
        // worker writes a disjoint row range of `next`.
        let (src, dst) = unsafe { (current.as_slice(), next.rows_mut(owned.clone())) };
        timer.measure(|| sweep_rows(src, dst, cols, owned.start));

        if is_owner {
            plan.barrier.wait_owner(|| match observer.as_deref_mut() {
                // SAFETY: every other worker is parked in the barrier.
                Some(obs) => obs.observe(k, GridView::new(rows, cols, unsafe { next.as_slice() })),
                None => Ok(()),
            })?;
        } else {
            plan.barrier.wait()?;
        }
        buf.swap();
    }
    Ok(timer.seconds())
}
