//! Run drivers, one per execution substrate.
//!
//! - [`serial`]: reference implementation on one buffer pair.
//! - [`message_passing`]: row blocks on the ranks of a [`Communicator`](crate::comm::Communicator),
//!   halos exchanged every iteration.
//! - [`shared_memory`]: row ranges of one shared buffer pair, one scoped
//!   thread per range, iterations separated by a phase barrier.
//!
//! All three call the same kernel in the same order and therefore return
//! bit-identical matrices for the same input and iteration count.

pub mod message_passing;
pub mod serial;
pub mod shared_memory;

use crate::config::DebugLevel;
use crate::grid::{Grid, GridView};
use crate::stencil_error::StencilError;

/// Receives the full matrix once before the first sweep and once after
/// every iteration, in iteration order.
pub trait SnapshotSink {
    /// `iteration` is 0 for the initial state.
    fn record(&mut self, iteration: usize, view: GridView<'_>) -> Result<(), StencilError>;
}

/// Keeps every snapshot in memory.
impl SnapshotSink for Vec<Grid> {
    fn record(&mut self, _iteration: usize, view: GridView<'_>) -> Result<(), StencilError> {
        self.push(Grid::from_vec(view.rows, view.cols, view.data.to_vec())?);
        Ok(())
    }
}

/// Optional sink handed to an engine.
pub type Sink<'a> = Option<&'a mut (dyn SnapshotSink + Send)>;

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub grid: Grid,
    /// Seconds in the kernel, maximum over workers.
    pub compute_time: f64,
    /// Workers that actually took part.
    pub workers: usize,
}

/// Everything that happens to a full-matrix snapshot: the sink, plus a
/// console print at debug level 2.
pub(crate) struct Observer<'a> {
    sink: Sink<'a>,
    print: bool,
}

impl<'a> Observer<'a> {
    pub(crate) fn new(sink: Sink<'a>, debug_level: DebugLevel) -> Self {
        Self {
            sink,
            print: debug_level.prints_state(),
        }
    }

    /// Whether any snapshot will be looked at.
    pub(crate) fn is_active(&self) -> bool {
        self.sink.is_some() || self.print
    }

    pub(crate) fn observe(&mut self, iteration: usize, view: GridView<'_>) -> Result<(), StencilError> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.record(iteration, view)?;
        }
        if self.print {
            view.print_to(std::io::stdout().lock())
                .map_err(|e| StencilError::io("Observer::observe", "<stdout>", e))?;
        }
        Ok(())
    }
}
