//! Print the contents of a data file to the console.

use clap::Parser;
use halo_stencil::io::read_matrix;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "print-2d")]
#[command(about = "Print a stencil matrix data file")]
#[command(version)]
struct Args {
    /// Input data file.
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    println!("Reading data from '{}'", args.input.display());
    let grid = read_matrix(&args.input)?;
    grid.view().print_to(std::io::stdout().lock())?;
    Ok(())
}
