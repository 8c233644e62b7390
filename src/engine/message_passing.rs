//! Row-block run over a [`Communicator`].
//!
//! The coordinator (highest rank) owns the global matrix. Each rank sweeps
//! its padded block, refreshes its halo rows from its chain neighbours, and
//! swaps buffers. Interior rows are gathered at the coordinator after every
//! iteration only when someone looks at the snapshots.
//!
//! Any failure after setup is fatal for the whole group: the rank that sees
//! it logs it, aborts the communicator, and returns the error. Under MPI the
//! abort ends the process, so that log line is the only report; callers must
//! not print the returned error again. Peers blocked in a collective then
//! return an abort error, which they do not log.

use super::{Observer, RunOutput, Sink, serial};
use crate::buffer::DoubleBuffer;
use crate::comm::Communicator;
use crate::config::DebugLevel;
use crate::distribute::{Distribution, RunHeader};
use crate::grid::{Grid, GridView};
use crate::halo::HaloExchanger;
use crate::partition::check_workers;
use crate::stencil::sweep_rows;
use crate::stencil_error::StencilError;
use crate::timing::{ComputeTimer, reduce_compute_time};

/// Exit code passed to [`Communicator::abort`].
pub const ABORT_CODE: i32 = 1;

/// Inputs only the coordinator has.
pub struct Coordinator<'a> {
    pub grid: Grid,
    pub iterations: usize,
    pub debug_level: DebugLevel,
    pub sink: Sink<'a>,
}

/// Run the stencil on every rank of `comm`.
///
/// The coordinator passes `Some`, every other rank `None`. Returns
/// `Some(output)` on the coordinator and `None` elsewhere. With a single rank
/// the serial engine runs directly on the coordinator's matrix.
pub fn run<C: Communicator>(
    comm: &C,
    coordinator: Option<Coordinator<'_>>,
) -> Result<Option<RunOutput>, StencilError> {
    let root = comm.coordinator();
    let is_root = comm.rank() == root;
    let outcome = match coordinator {
        Some(c) if is_root => {
            let mut observer = Observer::new(c.sink, c.debug_level);
            if comm.size() == 1 {
                serial::run_observed(c.grid, c.iterations, &mut observer).map(Some)
            } else {
                let header = RunHeader {
                    rows: c.grid.rows(),
                    cols: c.grid.cols(),
                    iterations: c.iterations,
                    debug_level: c.debug_level,
                    snapshots: observer.is_active(),
                };
                check_workers(comm.size(), c.grid.interior_rows()).and_then(|()| {
                    let root_state = RootState {
                        global: c.grid.into_vec(),
                        observer,
                    };
                    drive(comm, root, Some(header), Some(root_state))
                })
            }
        }
        Some(_) => Err(StencilError::Configuration(format!(
            "rank {} is not the coordinator (rank {root})",
            comm.rank()
        ))),
        None if is_root => Err(StencilError::Configuration(
            "coordinator called without a matrix".into(),
        )),
        None => drive(comm, root, None, None),
    };

    outcome.map_err(|e| {
        if !e.is_secondary() {
            log::error!("rank {}: {e}", comm.rank());
            comm.abort(ABORT_CODE);
        }
        e
    })
}

struct RootState<'a> {
    global: Vec<f64>,
    observer: Observer<'a>,
}

fn drive<C: Communicator>(
    comm: &C,
    root: usize,
    header: Option<RunHeader>,
    mut root_state: Option<RootState<'_>>,
) -> Result<Option<RunOutput>, StencilError> {
    let header = RunHeader::broadcast(comm, root, header.as_ref())?;
    let (rows, cols) = (header.rows, header.cols);
    let dist = Distribution::new(comm, root, &header)?;
    let block = dist.scatter(comm, root_state.as_ref().map(|s| &s.global[..]))?;
    let n = dist.block.size;

    if let Some(s) = root_state.as_mut() {
        log::info!(
            "running {} stencil iterations with {} processes",
            header.iterations,
            comm.size()
        );
        if header.snapshots {
            s.observer.observe(0, GridView::new(rows, cols, &s.global))?;
        }
    }

    let halo = HaloExchanger::new(comm.rank(), comm.size(), cols, n);
    let mut buf = DoubleBuffer::mirrored(block, "block")?;
    let mut timer = ComputeTimer::new();
    for k in 1..=header.iterations {
        let (current, next) = buf.split();
        timer.measure(|| sweep_rows(current, &mut next[cols..(n + 1) * cols], cols, 1));
        halo.exchange(comm, buf.next_mut())?;
        if header.snapshots {
            dist.gather(comm, buf.next(), root_state.as_mut().map(|s| &mut s.global[..]))?;
            if let Some(s) = root_state.as_mut() {
                s.observer.observe(k, GridView::new(rows, cols, &s.global))?;
            }
        }
        buf.swap();
    }

    let mut global = root_state.map(|s| s.global);
    dist.gather(comm, buf.current(), global.as_deref_mut())?;
    let compute_time = reduce_compute_time(comm, root, timer.seconds())?;
    log::debug!(
        "rank {} finished rows {:?} in {:?}",
        comm.rank(),
        dist.block.global_rows(),
        timer.elapsed()
    );

    match (global, compute_time) {
        (Some(global), Some(compute_time)) => Ok(Some(RunOutput {
            grid: Grid::from_vec(rows, cols, global)?,
            compute_time,
            workers: comm.size(),
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalComm, NoComm};
    use std::thread;

    fn run_local(grid: &Grid, ranks: usize, iterations: usize) -> Vec<Result<Option<RunOutput>, StencilError>> {
        thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(ranks)
                .into_iter()
                .map(|comm| {
                    let grid = grid.clone();
                    s.spawn(move || {
                        let coord = (comm.rank() == comm.coordinator()).then(|| Coordinator {
                            grid,
                            iterations,
                            debug_level: DebugLevel::Silent,
                            sink: None,
                        });
                        run(&comm, coord)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn single_rank_matches_serial() {
        let g = Grid::with_border(5, 7, 1.0).unwrap();
        let expected = serial::run(g.clone(), 4, DebugLevel::Silent, None).unwrap();
        let out = run(
            &NoComm,
            Some(Coordinator {
                grid: g,
                iterations: 4,
                debug_level: DebugLevel::Silent,
                sink: None,
            }),
        )
        .unwrap()
        .unwrap();
        assert_eq!(out.grid, expected.grid);
    }

    #[test]
    fn three_ranks_match_serial() {
        let g = Grid::with_border(8, 5, 1.0).unwrap();
        let expected = serial::run(g.clone(), 6, DebugLevel::Silent, None).unwrap();
        let results = run_local(&g, 3, 6);
        assert!(results[0].as_ref().unwrap().is_none());
        assert!(results[1].as_ref().unwrap().is_none());
        let out = results[2].as_ref().unwrap().as_ref().unwrap();
        assert_eq!(out.grid, expected.grid);
        assert_eq!(out.workers, 3);
    }

    #[test]
    fn too_many_ranks_aborts_everyone() {
        let g = Grid::with_border(4, 4, 1.0).unwrap();
        let results = run_local(&g, 3, 1);
        assert!(matches!(
            results[2],
            Err(StencilError::TooManyWorkers { workers: 3, rows: 2 })
        ));
        for r in &results[..2] {
            let e = r.as_ref().unwrap_err();
            assert!(e.is_secondary(), "{e}");
        }
    }
}
