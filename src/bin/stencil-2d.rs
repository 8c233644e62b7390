//! Serial 9-point stencil run.

use clap::Parser;
use halo_stencil::config::DebugLevel;
use halo_stencil::engine::{SnapshotSink, serial};
use halo_stencil::io::{TraceWriter, read_matrix, write_matrix};
use halo_stencil::report::{
    MatrixState, print_data_file_info, print_stacked_file_info, print_times,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "stencil-2d")]
#[command(about = "Run 9-point stencil iterations on one thread")]
#[command(version)]
struct Args {
    /// Number of iterations (at least 1).
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_iterations: u32,
    /// Input data file.
    infile: PathBuf,
    /// Output data file for the final state.
    outfile: PathBuf,
    /// Optional trace file: initial state plus every iteration.
    all_stacked_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let start = Instant::now();
    let args = Args::parse();
    let iterations = args.num_iterations as usize;

    let grid = read_matrix(&args.infile)?;
    let (rows, cols) = (grid.rows(), grid.cols());
    let mut trace = args
        .all_stacked_file
        .as_ref()
        .map(|path| TraceWriter::create(path, rows, cols))
        .transpose()?;

    println!("Running {iterations} serial stencil iterations...");
    let out = serial::run(
        grid,
        iterations,
        DebugLevel::Silent,
        trace.as_mut().map(|t| t as &mut (dyn SnapshotSink + Send)),
    )?;
    if let Some(trace) = trace {
        trace.finish()?;
    }
    write_matrix(&args.outfile, out.grid.view())?;

    let mut stdout = std::io::stdout().lock();
    print_data_file_info(&mut stdout, &args.outfile, rows, cols, MatrixState::Final)?;
    if let Some(path) = &args.all_stacked_file {
        print_stacked_file_info(&mut stdout, path, rows, cols, iterations)?;
    }
    print_times(&mut stdout, start.elapsed().as_secs_f64(), out.compute_time)?;
    Ok(())
}
