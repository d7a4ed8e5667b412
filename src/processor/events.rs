//! Events broadcast by a running batch for live UIs.

use crate::item::{ItemId, StartPoint};
use crate::processor::token::RunToken;
use crate::settings::Quality;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    RunStarted {
        token: RunToken,
        total_items: usize,
    },
    ItemStarted {
        id: ItemId,
        name: String,
        start: StartPoint,
        from_iteration: u32,
        target_iterations: u32,
        quality: Quality,
    },
    /// A sampled intermediate state was committed to the item.
    Checkpoint {
        id: ItemId,
        iteration: u32,
        target_iterations: u32,
        eta_ms: Option<u64>,
    },
    ItemFinished {
        id: ItemId,
        name: String,
        iterations: u32,
        quality: Quality,
        original_size: usize,
        size_bytes: usize,
        completed_items: usize,
        total_items: usize,
    },
    RunCompleted {
        completed_items: usize,
        total_items: usize,
        elapsed_ms: u64,
    },
    /// A codec failure stopped the run; the item stays pending.
    RunHalted {
        id: ItemId,
        error: String,
    },
    RunStopped,
}

impl BatchEvent {
    /// True for events after which the run emits nothing more.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunHalted { .. } | Self::RunStopped
        )
    }
}
