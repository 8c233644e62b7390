#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-stencil
//!
//! halo-stencil runs iterative 9-point averaging over a 2-D grid of doubles,
//! either on one thread, on a pool of threads sharing one buffer pair, or on
//! cooperating ranks that each own a block of rows and exchange halo rows
//! every iteration. All three produce bit-identical matrices.
//!
//! ## Features
//! - Row-block decomposition whose block sizes differ by at most one
//! - Double-buffered sweeps with O(1) role swap
//! - Deadlock-free halo exchange (combined send/receive, parity staggered)
//! - Phase barrier with an owner-only window for snapshots
//! - Pluggable communication backends: in-process (`LocalComm`) and MPI
//! - Binary matrix and trace files compatible with the `make-2d` tool family
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! halo-stencil = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use halo_stencil::prelude::*;
//!
//! let grid = Grid::with_border(5, 5, 1.0)?;
//! let out = shared_memory::run(grid, 1, 3, DebugLevel::Silent, None)?;
//! assert_eq!(out.grid.get(1, 1), 5.0 / 9.0);
//! # Ok::<(), halo_stencil::stencil_error::StencilError>(())
//! ```

pub mod barrier;
pub mod buffer;
pub mod comm;
pub mod config;
pub mod distribute;
pub mod engine;
pub mod grid;
pub mod halo;
pub mod io;
pub mod partition;
pub mod report;
pub mod stencil;
pub mod stencil_error;
pub mod timing;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, LocalComm, NoComm};
    pub use crate::config::{DebugLevel, StencilConfig};
    pub use crate::engine::message_passing::{self, Coordinator};
    pub use crate::engine::{RunOutput, SnapshotSink, serial, shared_memory};
    pub use crate::grid::{Grid, GridView};
    pub use crate::io::{TraceWriter, read_matrix, read_trace, write_matrix};
    pub use crate::partition::{PartitionTable, RowBlock};
    pub use crate::stencil_error::{CommError, StencilError};
}
