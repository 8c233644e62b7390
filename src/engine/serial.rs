//! Single-worker reference run.

use super::{Observer, RunOutput, Sink};
use crate::buffer::DoubleBuffer;
use crate::config::DebugLevel;
use crate::grid::{Grid, GridView};
use crate::stencil::sweep_interior;
use crate::stencil_error::StencilError;
use crate::timing::ComputeTimer;

/// Apply `iterations` sweeps to `grid` on the calling thread.
///
/// The sink sees the initial state and then every iteration. Zero
/// iterations returns the input unchanged.
pub fn run(
    grid: Grid,
    iterations: usize,
    debug_level: DebugLevel,
    sink: Sink<'_>,
) -> Result<RunOutput, StencilError> {
    let mut observer = Observer::new(sink, debug_level);
    run_observed(grid, iterations, &mut observer)
}

pub(crate) fn run_observed(
    grid: Grid,
    iterations: usize,
    observer: &mut Observer<'_>,
) -> Result<RunOutput, StencilError> {
    let (rows, cols) = (grid.rows(), grid.cols());
    observer.observe(0, grid.view())?;

    let mut buf = DoubleBuffer::mirrored(grid.into_vec(), "matrix")?;
    let mut timer = ComputeTimer::new();
    for k in 1..=iterations {
        let (current, next) = buf.split();
        timer.measure(|| sweep_interior(current, next, rows, cols));
        observer.observe(k, GridView::new(rows, cols, buf.next()))?;
        buf.swap();
    }
    log::debug!("serial run finished {iterations} iterations in {:?}", timer.elapsed());

    Ok(RunOutput {
        grid: Grid::from_vec(rows, cols, buf.into_current())?,
        compute_time: timer.seconds(),
        workers: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iterations_is_identity() {
        let g = Grid::with_border(4, 6, 2.5).unwrap();
        let out = run(g.clone(), 0, DebugLevel::Silent, None).unwrap();
        assert_eq!(out.grid, g);
    }

    #[test]
    fn sink_sees_initial_plus_each_iteration() {
        let g = Grid::with_border(5, 5, 1.0).unwrap();
        let mut frames: Vec<Grid> = Vec::new();
        let out = run(g.clone(), 3, DebugLevel::Silent, Some(&mut frames)).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], g);
        assert_eq!(frames[3], out.grid);
        assert_eq!(frames[1].get(1, 1), 5.0 / 9.0);
    }

    #[test]
    fn boundaries_survive_many_iterations() {
        let mut g = Grid::initial(6, 5).unwrap();
        for (k, v) in g.as_mut_slice().iter_mut().enumerate() {
            *v += k as f64 * 0.125;
        }
        let out = run(g.clone(), 25, DebugLevel::Silent, None).unwrap();
        for i in 0..6 {
            assert_eq!(out.grid.get(i, 0), g.get(i, 0));
            assert_eq!(out.grid.get(i, 4), g.get(i, 4));
        }
        assert_eq!(out.grid.row(0), g.row(0));
        assert_eq!(out.grid.row(5), g.row(5));
    }
}
