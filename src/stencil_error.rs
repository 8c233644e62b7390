//! StencilError: unified error type for halo-stencil public APIs.
//!
//! Every fallible operation in the crate returns `Result<_, StencilError>`.
//! Communication failures carry a [`CommError`] with the class, code, rank and
//! message of the failed operation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for stencil runs.
#[derive(Debug, Error)]
pub enum StencilError {
    /// An argument or derived quantity is out of its valid range.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// More workers were requested than there are interior rows to hand out.
    #[error("Configuration error: worker count {workers} > partitionable rows {rows}")]
    TooManyWorkers { workers: usize, rows: usize },
    /// Opening, reading or writing a file failed.
    #[error("I/O error [{location}] on '{}': {source}", .path.display())]
    Io {
        location: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A read or write moved fewer elements than expected.
    #[error("I/O error [{location}]: count returned [{count}] != expected [{expected}]")]
    ShortTransfer {
        location: &'static str,
        count: usize,
        expected: usize,
    },
    /// A matrix buffer could not be reserved.
    #[error("Allocation error: cannot allocate space for {what}[{bytes}]")]
    Allocation { what: &'static str, bytes: usize },
    /// A point-to-point or collective operation failed.
    #[error(transparent)]
    Communication(#[from] CommError),
    /// Not even one worker thread could be started.
    #[error("Thread error: cannot create worker {rank}: {source}")]
    ThreadSpawn {
        rank: usize,
        #[source]
        source: std::io::Error,
    },
    /// A barrier wait ended without every participant completing the phase.
    #[error("Synchronization error [{location}]: {reason}")]
    Synchronization {
        location: &'static str,
        reason: String,
    },
}

impl StencilError {
    /// Shorthand for an I/O error with location and path context.
    pub fn io(location: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StencilError::Io {
            location,
            path: path.into(),
            source,
        }
    }

    /// `true` if this error only reports that a peer already gave up.
    ///
    /// Workers that observe such an error stay silent; the root cause is
    /// reported by whoever produced it.
    pub fn is_secondary(&self) -> bool {
        match self {
            StencilError::Communication(e) => e.class == CommErrorClass::Aborted,
            StencilError::Synchronization { .. } => true,
            _ => false,
        }
    }
}

/// Coarse classification of communication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommErrorClass {
    /// The group was aborted by some rank.
    Aborted,
    /// A peer rank outside `0..size` was addressed.
    Rank,
    /// A message did not fit the posted receive buffer.
    Truncate,
    /// Counts/displacements do not describe the buffers supplied.
    Count,
    /// A root-only argument was missing or supplied on a non-root rank.
    Root,
    /// The communication environment could not be set up.
    Init,
}

impl fmt::Display for CommErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommErrorClass::Aborted => "ERR_ABORTED",
            CommErrorClass::Rank => "ERR_RANK",
            CommErrorClass::Truncate => "ERR_TRUNCATE",
            CommErrorClass::Count => "ERR_COUNT",
            CommErrorClass::Root => "ERR_ROOT",
            CommErrorClass::Init => "ERR_INIT",
        };
        f.write_str(s)
    }
}

/// A failed communication call, as seen by one rank.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Communication error [{location}]: rank = {rank}, class = {class}, errcode = {code}, {message}")]
pub struct CommError {
    pub location: &'static str,
    pub rank: usize,
    pub class: CommErrorClass,
    pub code: i32,
    pub message: String,
}

impl CommError {
    pub fn new(
        location: &'static str,
        rank: usize,
        class: CommErrorClass,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location,
            rank,
            class,
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_error_message_names_rank_and_class() {
        let e = CommError::new("halo", 3, CommErrorClass::Truncate, 15, "short message");
        let s = StencilError::from(e).to_string();
        assert!(s.contains("rank = 3"), "{s}");
        assert!(s.contains("ERR_TRUNCATE"), "{s}");
        assert!(s.contains("[halo]"), "{s}");
    }

    #[test]
    fn only_abort_and_barrier_errors_are_secondary() {
        let aborted = StencilError::from(CommError::new("x", 0, CommErrorClass::Aborted, 1, ""));
        assert!(aborted.is_secondary());
        let sync = StencilError::Synchronization {
            location: "barrier",
            reason: "broken".into(),
        };
        assert!(sync.is_secondary());
        assert!(!StencilError::Configuration("bad".into()).is_secondary());
    }
}
