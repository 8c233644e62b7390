//! MPI 9-point stencil run. The highest rank reads the input, writes the
//! outputs and reports; any failure aborts the whole job.
//!
//! ```sh
//! mpirun -np 4 mpi-stencil-2d 100 in.dat out.dat 1 trace.raw
//! ```

use clap::Parser;
use halo_stencil::comm::{Communicator, MpiComm};
use halo_stencil::config::DebugLevel;
use halo_stencil::engine::SnapshotSink;
use halo_stencil::engine::message_passing::{self, ABORT_CODE, Coordinator};
use halo_stencil::grid::Grid;
use halo_stencil::io::{TraceWriter, read_matrix, write_matrix};
use halo_stencil::partition::check_workers;
use halo_stencil::report::{
    MatrixState, print_data_file_info, print_stacked_file_info, print_times,
};
use halo_stencil::stencil_error::StencilError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mpi-stencil-2d")]
#[command(about = "Run 9-point stencil iterations on MPI ranks")]
#[command(version)]
struct Args {
    /// Number of iterations (at least 1).
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_iterations: u32,
    /// Input data file, read by the coordinator.
    infile: PathBuf,
    /// Output data file for the final state.
    outfile: PathBuf,
    /// 0: timing only, 1: summaries, 2: print every iteration.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
    debug_level: u8,
    /// Optional trace file: initial state plus every iteration.
    all_stacked_file: Option<PathBuf>,
}

/// Coordinator-side setup; on failure the caller aborts the world.
fn prepare(args: &Args, ranks: usize) -> Result<(Grid, Option<TraceWriter>), StencilError> {
    let grid = read_matrix(&args.infile)?;
    check_workers(ranks, grid.interior_rows())?;
    let trace = args
        .all_stacked_file
        .as_ref()
        .map(|path| TraceWriter::create(path, grid.rows(), grid.cols()))
        .transpose()?;
    Ok((grid, trace))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let comm = MpiComm::new()?;
    let start = MpiComm::time();
    let args = Args::parse();
    let debug_level = DebugLevel::try_from(args.debug_level)?;
    let iterations = args.num_iterations as usize;
    let is_root = comm.rank() == comm.coordinator();

    let (grid, mut trace) = if is_root {
        match prepare(&args, comm.size()) {
            Ok((grid, trace)) => (Some(grid), trace),
            Err(e) => {
                log::error!("{e}");
                comm.abort(ABORT_CODE);
                std::process::exit(ABORT_CODE);
            }
        }
    } else {
        (None, None)
    };
    let (rows, cols) = grid.as_ref().map_or((0, 0), |g| (g.rows(), g.cols()));

    if is_root && debug_level.is_on() {
        println!(
            "Running {iterations} stencil iterations with {} processes...",
            comm.size()
        );
    }
    let coordinator = grid.map(|grid| Coordinator {
        grid,
        iterations,
        debug_level,
        sink: trace.as_mut().map(|t| t as &mut (dyn SnapshotSink + Send)),
    });
    // the engine already logged the root cause and aborted the world
    let Ok(result) = message_passing::run(&comm, coordinator) else {
        std::process::exit(ABORT_CODE);
    };
    let Some(out) = result else {
        return Ok(());
    };
    if let Some(trace) = trace {
        trace.finish()?;
    }
    write_matrix(&args.outfile, out.grid.view())?;

    let mut stdout = std::io::stdout().lock();
    if debug_level.is_on() {
        print_data_file_info(&mut stdout, &args.outfile, rows, cols, MatrixState::Final)?;
        if let Some(path) = &args.all_stacked_file {
            print_stacked_file_info(&mut stdout, path, rows, cols, iterations)?;
        }
    }
    print_times(&mut stdout, MpiComm::time() - start, out.compute_time)?;
    Ok(())
}
