//! # Progress Tracking Module
//!
//! Statistiche derivate del run corrente e stima ETA per item.
//!
//! ## ETA
//! `eta = (target - iterazione_raggiunta) × tempo_medio_per_passata`, dove la
//! media è calcolata solo sulle passate di QUESTO job (dal punto di reset o
//! resume), mai sull'intero batch: un reset per cambio qualità non sporca la
//! media con tempi vecchi.
//!
//! I contatori `completed_items` / `total_items` avanzano una volta per item
//! finito, indipendentemente dai checkpoint delle singole passate.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Derived run statistics, recomputed while a run is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub total_items: usize,
    pub completed_items: usize,
    /// Target pass count of the item in flight.
    pub target_iterations: u32,
    pub is_processing: bool,
    pub current_item_name: Option<String>,
    pub time_elapsed_ms: u64,
    pub eta_ms: Option<u64>,
}

impl ProcessingStats {
    pub(crate) fn begin_run(&mut self, total_items: usize) {
        *self = Self {
            total_items,
            is_processing: true,
            ..Self::default()
        };
    }

    pub(crate) fn begin_item(&mut self, name: &str, target_iterations: u32) {
        self.current_item_name = Some(name.to_string());
        self.target_iterations = target_iterations;
        self.eta_ms = None;
    }

    pub(crate) fn record_eta(&mut self, eta: Option<Duration>) {
        self.eta_ms = eta.map(|d| d.as_millis() as u64);
    }

    pub(crate) fn finish_item(&mut self) {
        self.completed_items += 1;
        self.eta_ms = None;
    }

    /// Run is over (completed, stopped or halted).
    pub(crate) fn end_run(&mut self) {
        self.is_processing = false;
        self.eta_ms = None;
        self.current_item_name = None;
    }

    /// Completion ratio in `[0, 1]` for progress bars.
    pub fn fraction(&self) -> f64 {
        self.completed_items as f64 / self.total_items.max(1) as f64
    }
}

/// Wall clock for one item job, started at its reset or resume point.
#[derive(Debug, Clone, Copy)]
pub struct JobClock {
    started_at: Instant,
    start_iteration: u32,
    target_iterations: u32,
}

impl JobClock {
    pub fn start(start_iteration: u32, target_iterations: u32) -> Self {
        Self {
            started_at: Instant::now(),
            start_iteration,
            target_iterations,
        }
    }

    /// Remaining time once `reached` passes are baked into the item.
    pub fn eta(&self, reached: u32) -> Option<Duration> {
        estimate_remaining(
            self.started_at.elapsed(),
            reached.saturating_sub(self.start_iteration),
            self.target_iterations.saturating_sub(reached),
        )
    }
}

/// `passes_left × (elapsed / passes_done)`; `None` before the first pass.
pub fn estimate_remaining(elapsed: Duration, passes_done: u32, passes_left: u32) -> Option<Duration> {
    if passes_done == 0 {
        return None;
    }
    Some((elapsed / passes_done) * passes_left)
}
