//! # Batch Item Module
//!
//! Un'immagine ingerita e la sua traiettoria di degrado.
//!
//! ## Responsabilità:
//! - `BatchItem`: stato attuale (`current_*`) vs stato desiderato (`target_*`)
//! - `ItemStatus`: macchina a stati `pending → processing → done`
//! - Predicati reset/resume usati dallo scheduler
//! - Commit dei checkpoint e del completamento
//!
//! ## Invariante:
//! `processed` riflette sempre esattamente `current_iterations` passate a
//! `current_quality` partendo da `original` (oppure è `original` intatto
//! quando `current_iterations == 0`).
//!
//! ## Reset vs resume:
//! - **Reset** (riparte da `original`) se la qualità è cambiata oppure se
//!   `current_iterations > target_iterations`: le passate non sono reversibili
//! - **Resume** da `processed` altrimenti

use crate::codec::ImageBytes;
use crate::processor::token::RunToken;
use crate::settings::{ProcessorSettings, Quality};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque item identifier, stable for the item's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Per-item lifecycle. `Processing` always carries the run token it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ItemStatus {
    Pending,
    Processing { token: RunToken },
    Done,
}

impl ItemStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }
}

/// Where a job starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartPoint {
    /// Replay from `original` at iteration 0.
    Reset,
    /// Chain onto `processed` at `current_iterations`.
    Resume,
}

/// One ingested image and its decay trajectory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: ItemId,
    pub name: String,
    pub dimensions: Option<(u32, u32)>,
    #[serde(skip)]
    pub original: ImageBytes,
    #[serde(skip)]
    pub processed: ImageBytes,
    pub current_iterations: u32,
    /// `None` until the first pass has been committed.
    pub current_quality: Option<Quality>,
    pub target_iterations: u32,
    pub target_quality: Quality,
    pub status: ItemStatus,
    pub is_selected: bool,
}

impl BatchItem {
    /// Fresh, never-processed item targeting `settings`.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        original: ImageBytes,
        dimensions: Option<(u32, u32)>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            dimensions,
            processed: original.clone(),
            original,
            current_iterations: 0,
            current_quality: None,
            target_iterations: settings.iterations,
            target_quality: settings.quality,
            status: ItemStatus::Pending,
            is_selected: true,
        }
    }

    /// True if the baked passes cannot be extended to reach the target.
    pub fn needs_reset(&self) -> bool {
        let quality_changed = self
            .current_quality
            .is_some_and(|q| q != self.target_quality);
        quality_changed || self.current_iterations > self.target_iterations
    }

    /// True if actual state diverges from desired state.
    pub fn needs_work(&self) -> bool {
        self.needs_reset() || self.current_iterations != self.target_iterations
    }

    /// Where the next job starts, or `None` if already at target.
    pub fn start_point(&self) -> Option<StartPoint> {
        if self.needs_reset() {
            Some(StartPoint::Reset)
        } else if self.current_iterations < self.target_iterations {
            Some(StartPoint::Resume)
        } else {
            None
        }
    }

    /// Copy the desired state from the settings surface.
    pub fn retarget(&mut self, settings: ProcessorSettings) {
        self.target_iterations = settings.iterations;
        self.target_quality = settings.quality;
    }

    /// Commit a consistent intermediate `(iterations, processed)` pair.
    pub(crate) fn commit_checkpoint(&mut self, processed: ImageBytes, iterations: u32, quality: Quality) {
        self.processed = processed;
        self.current_iterations = iterations;
        self.current_quality = Some(quality);
    }

}
