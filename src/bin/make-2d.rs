//! Create a matrix with 1.0 side columns and a zero interior, and write it
//! to a data file.

use anyhow::Context;
use clap::Parser;
use halo_stencil::grid::{Grid, MIN_EXTENT};
use halo_stencil::io::write_matrix;
use halo_stencil::report::{MatrixState, print_data_file_info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "make-2d")]
#[command(about = "Write an initial stencil matrix to a data file")]
#[command(version)]
struct Args {
    /// Number of rows (at least 3).
    #[arg(value_parser = clap::value_parser!(u32).range(MIN_EXTENT as i64..))]
    num_rows: u32,
    /// Number of columns (at least 3).
    #[arg(value_parser = clap::value_parser!(u32).range(MIN_EXTENT as i64..))]
    num_cols: u32,
    /// Output data file.
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let (rows, cols) = (args.num_rows as usize, args.num_cols as usize);

    let grid = Grid::initial(rows, cols)?;
    write_matrix(&args.output, grid.view())
        .with_context(|| format!("writing '{}'", args.output.display()))?;
    print_data_file_info(
        std::io::stdout().lock(),
        &args.output,
        rows,
        cols,
        MatrixState::Initial,
    )?;
    Ok(())
}
