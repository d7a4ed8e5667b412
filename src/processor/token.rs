//! # Job Generation Token
//!
//! Cancellazione cooperativa tramite un contatore monotono.
//! Ogni `start()` / `stop()` emette un nuovo token; un job in volo
//! confronta il token catturato con quello live dopo ogni punto di
//! sospensione e, se diversi, abbandona senza toccare lo stato.

use serde::Serialize;

/// Snapshot of the job generation, compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunToken {
    pub generation: u64,
}

/// Live generation counter owned by the session.
#[derive(Debug, Default)]
pub struct JobGeneration {
    current: u64,
}

impl JobGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding token and issue a fresh one.
    pub fn advance(&mut self) -> RunToken {
        self.current += 1;
        self.current()
    }

    pub fn current(&self) -> RunToken {
        RunToken {
            generation: self.current,
        }
    }

    pub fn is_live(&self, token: RunToken) -> bool {
        self.current == token.generation
    }
}
