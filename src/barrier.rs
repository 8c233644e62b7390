//! Reusable phase barrier with an owner-only serial window.
//!
//! Every worker thread calls the barrier exactly once per iteration. The
//! owner's call runs its serial action after all parties have arrived and
//! before any of them is released into the next phase, so the action sees
//! a buffer nobody is writing.
//!
//! A thread that stops participating breaks the barrier; everyone waiting,
//! or arriving later, leaves with a `Synchronization` error instead of
//! stalling forever.

use crate::stencil_error::StencilError;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct PhaseState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

#[derive(Debug)]
pub struct PhaseBarrier {
    parties: usize,
    state: Mutex<PhaseState>,
    released: Condvar,
}

impl PhaseBarrier {
    pub fn new(parties: usize) -> Result<Self, StencilError> {
        if parties == 0 {
            return Err(StencilError::Configuration(
                "barrier needs at least one party".into(),
            ));
        }
        Ok(Self {
            parties,
            state: Mutex::new(PhaseState::default()),
            released: Condvar::new(),
        })
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Completed phases so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    fn broken_error(location: &'static str) -> StencilError {
        StencilError::Synchronization {
            location,
            reason: "barrier broken by a worker that stopped participating".into(),
        }
    }

    /// Arrive as a non-owner and wait for the phase to be released.
    pub fn wait(&self) -> Result<(), StencilError> {
        let mut state = self.state.lock();
        if state.broken {
            return Err(Self::broken_error("PhaseBarrier::wait"));
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            // wake the owner
            self.released.notify_all();
        }
        while state.generation == generation && !state.broken {
            self.released.wait(&mut state);
        }
        if state.generation == generation {
            return Err(Self::broken_error("PhaseBarrier::wait"));
        }
        Ok(())
    }

    /// Arrive as the owner, run `serial` once all parties are here, then
    /// release the phase.
    ///
    /// If `serial` fails the barrier is broken and the error is returned.
    pub fn wait_owner<R>(
        &self,
        serial: impl FnOnce() -> Result<R, StencilError>,
    ) -> Result<R, StencilError> {
        let mut state = self.state.lock();
        if state.broken {
            return Err(Self::broken_error("PhaseBarrier::wait_owner"));
        }
        state.arrived += 1;
        while state.arrived < self.parties && !state.broken {
            self.released.wait(&mut state);
        }
        if state.broken {
            return Err(Self::broken_error("PhaseBarrier::wait_owner"));
        }
        // Everyone else is parked until the generation moves.
        drop(state);
        let outcome = serial();
        let mut state = self.state.lock();
        match outcome {
            Ok(value) => {
                state.arrived = 0;
                state.generation += 1;
                drop(state);
                self.released.notify_all();
                Ok(value)
            }
            Err(e) => {
                state.broken = true;
                drop(state);
                self.released.notify_all();
                Err(e)
            }
        }
    }

    /// Stop participating: wake every waiter with an error.
    pub fn abandon(&self) {
        self.state.lock().broken = true;
        self.released.notify_all();
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }
}
