//! Thread-parallel 9-point stencil run.

use clap::Parser;
use halo_stencil::config::{DebugLevel, StencilConfig};
use halo_stencil::engine::{SnapshotSink, shared_memory};
use halo_stencil::io::{TraceWriter, read_matrix, write_matrix};
use halo_stencil::report::{
    MatrixState, print_data_file_info, print_stacked_file_info, print_times,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pth-stencil-2d")]
#[command(about = "Run 9-point stencil iterations on a pool of threads")]
#[command(version)]
struct Args {
    /// Number of iterations (at least 1).
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_iterations: u32,
    /// Input data file.
    infile: PathBuf,
    /// Output data file for the final state.
    outfile: PathBuf,
    /// 0: timing only, 1: summaries, 2: print every iteration.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
    debug_level: u8,
    /// Worker threads (at least 1, at most rows - 2).
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_threads: u32,
    /// Optional trace file: initial state plus every iteration.
    all_stacked_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let start = Instant::now();
    let args = Args::parse();
    let config = StencilConfig {
        iterations: args.num_iterations as usize,
        debug_level: DebugLevel::try_from(args.debug_level)?,
        workers: args.num_threads as usize,
        trace_path: args.all_stacked_file.clone(),
    };

    let grid = read_matrix(&args.infile)?;
    let (rows, cols) = (grid.rows(), grid.cols());
    config.validate(rows)?;
    let mut trace = config
        .trace_path
        .as_ref()
        .map(|path| TraceWriter::create(path, rows, cols))
        .transpose()?;

    if config.debug_level.is_on() {
        println!(
            "Running {} stencil iterations with {} threads...",
            config.iterations, config.workers
        );
    }
    let out = shared_memory::run(
        grid,
        config.iterations,
        config.workers,
        config.debug_level,
        trace.as_mut().map(|t| t as &mut (dyn SnapshotSink + Send)),
    )?;
    if let Some(trace) = trace {
        trace.finish()?;
    }
    write_matrix(&args.outfile, out.grid.view())?;

    let mut stdout = std::io::stdout().lock();
    if config.debug_level.is_on() {
        print_data_file_info(&mut stdout, &args.outfile, rows, cols, MatrixState::Final)?;
        if let Some(path) = &config.trace_path {
            print_stacked_file_info(&mut stdout, path, rows, cols, config.iterations)?;
        }
    }
    print_times(&mut stdout, start.elapsed().as_secs_f64(), out.compute_time)?;
    Ok(())
}
