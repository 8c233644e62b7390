//! Run configuration shared by the engines and front-ends.

use crate::partition::check_workers;
use crate::stencil_error::StencilError;
use std::path::PathBuf;

/// How much a run reports on the console.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum DebugLevel {
    /// Timing block only.
    #[default]
    Silent,
    /// Run banner and file summaries.
    Summary,
    /// Additionally print the matrix after every iteration.
    PrintEach,
}

impl DebugLevel {
    pub fn is_on(self) -> bool {
        self != DebugLevel::Silent
    }

    pub fn prints_state(self) -> bool {
        self == DebugLevel::PrintEach
    }
}

impl TryFrom<u8> for DebugLevel {
    type Error = StencilError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(DebugLevel::Silent),
            1 => Ok(DebugLevel::Summary),
            2 => Ok(DebugLevel::PrintEach),
            _ => Err(StencilError::Configuration(format!(
                "debug level {v} outside [0-2]"
            ))),
        }
    }
}

impl TryFrom<u64> for DebugLevel {
    type Error = StencilError;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        u8::try_from(v)
            .map_err(|_| StencilError::Configuration(format!("debug level {v} outside [0-2]")))?
            .try_into()
    }
}

impl From<DebugLevel> for u8 {
    fn from(level: DebugLevel) -> u8 {
        level as u8
    }
}

/// Parameters of one stencil run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StencilConfig {
    pub iterations: usize,
    pub debug_level: DebugLevel,
    /// Threads (shared memory) or ranks (message passing).
    pub workers: usize,
    /// Where to write the initial state plus every iteration, if anywhere.
    pub trace_path: Option<PathBuf>,
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            debug_level: DebugLevel::Silent,
            workers: 1,
            trace_path: None,
        }
    }
}

impl StencilConfig {
    /// Check the configuration against a matrix with `rows` rows.
    pub fn validate(&self, rows: usize) -> Result<(), StencilError> {
        check_workers(self.workers, rows.saturating_sub(2))
    }

    pub fn snapshots_enabled(&self) -> bool {
        self.trace_path.is_some() || self.debug_level.prints_state()
    }
}
