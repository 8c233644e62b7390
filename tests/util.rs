#![allow(dead_code)]
use halo_stencil::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::thread;

/// Generated layout (1.0 side columns) plus seeded noise everywhere.
pub fn random_grid(rows: usize, cols: usize, seed: u64) -> Grid {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut g = Grid::initial(rows, cols).unwrap();
    for v in g.as_mut_slice() {
        *v += rng.gen_range(-1.0..1.0);
    }
    g
}

/// Run the message-passing engine on `ranks` in-process ranks and return
/// every rank's result, indexed by rank.
pub fn run_local(
    grid: &Grid,
    ranks: usize,
    iterations: usize,
) -> Vec<Result<Option<RunOutput>, StencilError>> {
    run_local_with(grid, ranks, iterations, |_| None::<Vec<Grid>>)
        .into_iter()
        .map(|(r, _)| r)
        .collect()
}

/// As [`run_local`], with a sink built by `make_sink` on the coordinator.
pub fn run_local_with<S, F>(
    grid: &Grid,
    ranks: usize,
    iterations: usize,
    make_sink: F,
) -> Vec<(Result<Option<RunOutput>, StencilError>, Option<S>)>
where
    S: SnapshotSink + Send,
    F: Fn(usize) -> Option<S> + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = LocalComm::universe(ranks)
            .into_iter()
            .map(|comm| {
                let make_sink = &make_sink;
                s.spawn(move || {
                    let is_root = comm.rank() == comm.coordinator();
                    let mut sink = if is_root { make_sink(comm.rank()) } else { None };
                    let coord = is_root.then(|| Coordinator {
                        grid: grid.clone(),
                        iterations,
                        debug_level: DebugLevel::Silent,
                        sink: sink.as_mut().map(|s| s as &mut (dyn SnapshotSink + Send)),
                    });
                    let result = message_passing::run(&comm, coord);
                    (result, sink)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Output of the coordinator (highest rank).
pub fn coordinator_output(results: Vec<Result<Option<RunOutput>, StencilError>>) -> RunOutput {
    let n = results.len();
    for (rank, r) in results.iter().enumerate().take(n - 1) {
        assert!(matches!(r, Ok(None)), "rank {rank} returned {r:?}");
    }
    results.into_iter().last().unwrap().unwrap().unwrap()
}

/// A fresh path under the system temp dir, unique per process and name.
pub fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("halo-stencil-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}
