//! # Batch Session Module
//!
//! Handle condiviso (clonabile) su tutto lo stato mutabile del batch:
//! item store, modello di selezione, impostazioni, token di generazione e
//! statistiche del run.
//!
//! ## Modello di concorrenza:
//! - Scheduling cooperativo: un solo job di compressione in volo
//! - Il lock viene preso solo per brevi sezioni sincrone e MAI tenuto
//!   attraverso un `.await`, quindi UI e scheduler si alternano sugli stessi
//!   turni cooperativi senza contesa reale
//! - Le operazioni di scheduling (`start`, `stop`, `drive`, `run`,
//!   `update_settings`) sono in `processor::scheduler`
//!
//! ## Esempio:
//! ```rust,ignore
//! let session = BatchSession::new(&Config::default());
//! session.ingest(vec![NewImage::new("cat.png", bytes)])?;
//! session.select_all();
//! session.run(&JpegCodec::new()).await?;
//! ```

use crate::config::Config;
use crate::error::DecayError;
use crate::item::{BatchItem, ItemId, ItemStatus};
use crate::processor::checkpoint::CheckpointPolicy;
use crate::processor::events::BatchEvent;
use crate::processor::progress_tracker::ProcessingStats;
use crate::processor::token::{JobGeneration, RunToken};
use crate::selection::{PaintGesture, SelectionModel};
use crate::settings::ProcessorSettings;
use crate::store::{IngestReport, ItemStore, NewImage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything a run reads and writes.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) store: ItemStore,
    pub(crate) selection: SelectionModel,
    pub(crate) settings: ProcessorSettings,
    pub(crate) generation: JobGeneration,
    pub(crate) stats: ProcessingStats,
    pub(crate) run_started: Option<Instant>,
}

impl SessionState {
    /// Demote `processing` items whose token is no longer live.
    pub(crate) fn demote_stale(&mut self) {
        let generation = &self.generation;
        for item in self.store.items_mut() {
            if let ItemStatus::Processing { token } = item.status {
                if !generation.is_live(token) {
                    item.status = ItemStatus::Pending;
                }
            }
        }
    }

    /// Copy current settings onto an item and requeue it if it now diverges.
    /// Returns true if the item newly entered the queue.
    pub(crate) fn retarget(item: &mut BatchItem, settings: ProcessorSettings) -> bool {
        item.retarget(settings);
        if item.status.is_processing() {
            // finishes with its captured targets, requeued on completion
            return false;
        }
        let was_pending = item.status.is_pending();
        item.status = if item.needs_work() {
            ItemStatus::Pending
        } else {
            ItemStatus::Done
        };
        item.status.is_pending() && !was_pending
    }

    /// While a run is active, `total_items` is what has finished plus what is
    /// still queued or in flight among the selected items.
    pub(crate) fn recount_run(&mut self) {
        if !self.stats.is_processing {
            return;
        }
        let remaining = self
            .store
            .items()
            .iter()
            .filter(|item| {
                item.status.is_processing() || (item.is_selected && item.status.is_pending())
            })
            .count();
        self.stats.total_items = self.stats.completed_items + remaining;
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.run_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Cloneable handle over a batch of images and its scheduler.
#[derive(Debug, Clone)]
pub struct BatchSession {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<BatchEvent>,
    checkpoints: CheckpointPolicy,
}

impl BatchSession {
    pub fn new(config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = SessionState {
            store: ItemStore::new(config.max_batch_size),
            selection: SelectionModel::new(),
            settings: config.default_settings,
            generation: JobGeneration::new(),
            stats: ProcessingStats::default(),
            run_started: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            events,
            checkpoints: config.checkpoints,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: BatchEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Live event feed for progress displays.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    pub fn checkpoints(&self) -> CheckpointPolicy {
        self.checkpoints
    }

    pub(crate) fn is_live(&self, token: RunToken) -> bool {
        self.lock().generation.is_live(token)
    }

    // -- item store --

    /// Add images to the batch, selected and pending, targeting current settings.
    pub fn ingest(&self, images: Vec<NewImage>) -> Result<IngestReport, DecayError> {
        let mut state = self.lock();
        let settings = state.settings;
        let report = state.store.ingest(images, settings)?;
        state.selection.on_ingested(&report.added);
        state.recount_run();
        debug!("Ingested {} images ({} rejected)", report.added.len(), report.rejected);
        Ok(report)
    }

    /// Remove an item. An in-flight job on it abandons at its next checkpoint.
    pub fn remove(&self, id: ItemId) -> Result<BatchItem, DecayError> {
        let mut state = self.lock();
        let (index, item) = state.store.remove(id)?;
        let SessionState { store, selection, .. } = &mut *state;
        selection.on_removed(store, id, index);
        state.recount_run();
        Ok(item)
    }

    pub fn reorder(&self, from: usize, to: usize) -> Result<(), DecayError> {
        self.lock().store.reorder(from, to)
    }

    /// Stop any run and drop every item.
    pub fn clear(&self) {
        self.stop();
        let mut state = self.lock();
        state.store.clear();
        state.selection.clear();
        state.stats = ProcessingStats::default();
        state.run_started = None;
        info!("Batch cleared");
    }

    pub fn items(&self) -> Vec<BatchItem> {
        self.lock().store.items().to_vec()
    }

    pub fn item(&self, id: ItemId) -> Option<BatchItem> {
        self.lock().store.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.lock()
            .store
            .items()
            .iter()
            .filter(|item| item.is_selected)
            .count()
    }

    /// True if any item waits for a run.
    pub fn has_pending(&self) -> bool {
        self.lock()
            .store
            .items()
            .iter()
            .any(|item| item.status.is_pending())
    }

    pub fn settings(&self) -> ProcessorSettings {
        self.lock().settings
    }

    pub fn stats(&self) -> ProcessingStats {
        let state = self.lock();
        let mut stats = state.stats.clone();
        if stats.is_processing {
            stats.time_elapsed_ms = state.elapsed_ms();
        }
        stats
    }

    // -- selection --

    /// Run a selection operation; items that become selected pick up the
    /// current settings as their targets.
    fn with_selection<T>(
        &self,
        op: impl FnOnce(&mut SelectionModel, &mut ItemStore) -> Result<T, DecayError>,
    ) -> Result<T, DecayError> {
        let mut state = self.lock();
        let state = &mut *state;
        let before: Vec<bool> = state.store.items().iter().map(|i| i.is_selected).collect();
        let result = op(&mut state.selection, &mut state.store);

        let settings = state.settings;
        for (item, was_selected) in state.store.items_mut().iter_mut().zip(before) {
            if item.is_selected && !was_selected {
                SessionState::retarget(item, settings);
            }
        }
        state.recount_run();
        result
    }

    pub fn select(&self, id: ItemId, extend_range: bool, toggle: bool) -> Result<(), DecayError> {
        self.with_selection(|sel, store| sel.select(store, id, extend_range, toggle))
    }

    pub fn begin_paint(&self, id: ItemId) -> Result<bool, DecayError> {
        self.with_selection(|sel, store| sel.begin_paint(store, id))
    }

    pub fn paint_over(&self, id: ItemId) -> Result<(), DecayError> {
        self.with_selection(|sel, store| sel.paint_over(store, id))
    }

    pub fn end_paint(&self) {
        self.lock().selection.end_paint();
    }

    pub fn paint_select(&self, start: ItemId, end: ItemId) -> Result<bool, DecayError> {
        self.with_selection(|sel, store| sel.paint_select(store, start, end))
    }

    pub fn range_select(&self, end: ItemId, value: bool) -> Result<(), DecayError> {
        self.with_selection(|sel, store| sel.range_select(store, end, value))
    }

    pub fn select_all(&self) {
        let _ = self.with_selection(|sel, store| {
            sel.select_all(store);
            Ok(())
        });
    }

    pub fn deselect_all(&self) {
        let mut state = self.lock();
        let SessionState { store, selection, .. } = &mut *state;
        selection.deselect_all(store);
        state.recount_run();
    }

    pub fn anchor(&self) -> Option<ItemId> {
        self.lock().selection.anchor()
    }

    pub fn active(&self) -> Option<ItemId> {
        self.lock().selection.active()
    }

    pub fn paint_gesture(&self) -> PaintGesture {
        self.lock().selection.paint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::FakeCodec;
    use crate::processor::session_with;

    #[test]
    fn test_ingest_sets_active_and_respects_capacity() {
        let config = Config {
            max_batch_size: 3,
            ..Default::default()
        };
        let session = BatchSession::new(&config);
        let report = session
            .ingest(vec![NewImage::new("a.png", vec![1u8]), NewImage::new("b.png", vec![2u8])])
            .unwrap();
        assert_eq!(session.active(), Some(report.added[0]));
        assert_eq!(session.anchor(), Some(report.added[0]));

        let report = session
            .ingest(vec![NewImage::new("c.png", vec![3u8]), NewImage::new("d.png", vec![4u8])])
            .unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.rejected, 1);
        assert!(matches!(
            session.ingest(vec![NewImage::new("e.png", vec![5u8])]),
            Err(DecayError::CapacityExceeded { limit: 3 })
        ));
    }

    #[tokio::test]
    async fn test_deselected_items_keep_old_targets() {
        let (session, ids) = session_with(2, 5, 0.5);
        session.run(&FakeCodec::new()).await.unwrap();

        session.select(ids[0], false, false).unwrap();
        session
            .update_settings(ProcessorSettings::new(8, 0.5).unwrap())
            .unwrap();

        let selected = session.item(ids[0]).unwrap();
        assert_eq!(selected.target_iterations, 8);
        assert_eq!(selected.status, ItemStatus::Pending);

        let other = session.item(ids[1]).unwrap();
        assert_eq!(other.target_iterations, 5);
        assert_eq!(other.status, ItemStatus::Done);
    }

    #[tokio::test]
    async fn test_selecting_item_picks_up_current_settings() {
        let (session, ids) = session_with(2, 5, 0.5);
        session.select(ids[0], false, false).unwrap();
        session.run(&FakeCodec::new()).await.unwrap();
        session
            .update_settings(ProcessorSettings::new(5, 0.3).unwrap())
            .unwrap();

        // ids[1] was never processed; toggling it in retargets it
        session.select(ids[1], false, true).unwrap();
        let item = session.item(ids[1]).unwrap();
        assert_eq!(item.target_quality.percent(), 30);
        assert!(item.status.is_pending());
        assert_eq!(session.selected_count(), 2);
    }

    #[tokio::test]
    async fn test_reselecting_matching_item_is_done() {
        let (session, ids) = session_with(1, 3, 0.5);
        session.run(&FakeCodec::new()).await.unwrap();
        session.deselect_all();
        session.select_all();
        assert_eq!(session.item(ids[0]).unwrap().status, ItemStatus::Done);
        assert!(!session.has_pending());
    }

    #[test]
    fn test_remove_reassigns_active() {
        let (session, ids) = session_with(3, 5, 0.5);
        session.select(ids[2], false, false).unwrap();
        let removed = session.remove(ids[2]).unwrap();
        assert_eq!(removed.id, ids[2]);
        assert_eq!(session.active(), Some(ids[1]));
        assert_eq!(session.anchor(), Some(ids[1]));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_paint_through_session() {
        let (session, ids) = session_with(4, 5, 0.5);
        session.deselect_all();
        assert!(session.begin_paint(ids[1]).unwrap());
        assert!(session.paint_gesture().active);
        session.paint_over(ids[2]).unwrap();
        session.end_paint();
        assert!(!session.paint_gesture().active);

        let selected: Vec<bool> = session.items().iter().map(|i| i.is_selected).collect();
        assert_eq!(selected, vec![false, true, true, false]);

        session.range_select(ids[3], true).unwrap();
        assert_eq!(session.selected_count(), 3);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (session, _) = session_with(3, 5, 0.5);
        session.clear();
        assert!(session.is_empty());
        assert_eq!(session.active(), None);
        assert_eq!(session.anchor(), None);
        assert_eq!(session.stats(), ProcessingStats::default());
    }
}
