//! # Batch Scheduler Module
//!
//! Orchestratore single-flight del batch: un solo job di compressione alla
//! volta, scelto in ordine posizionale tra gli item selezionati e pending.
//!
//! ## Responsabilità:
//! - `start`: conta il lavoro, emette un nuovo token, inizializza le statistiche
//! - `stop`: invalida il token live, riporta a pending gli item in volo
//! - `drive`: loop che prende il prossimo item e ne lancia il job
//! - `update_settings`: propaga i nuovi target agli item selezionati
//!
//! ## Stop vs completamento:
//! Un run che finisce da solo emette `RunCompleted`; un run interrotto
//! (`stop`, `clear`, nuovo `start`) termina in silenzio con
//! `RunOutcome::Cancelled`, senza scrivere nulla dopo l'invalidazione.
//!
//! ## Errori:
//! Un errore del codec su un item ferma l'intero run: l'item torna pending
//! con l'ultimo checkpoint committato e l'errore viene propagato al chiamante.

use crate::codec::ImageCodec;
use crate::error::DecayError;
use crate::item::{ItemId, ItemStatus};
use crate::processor::events::BatchEvent;
use crate::processor::item_job::{advance, AdvanceOutcome};
use crate::processor::token::RunToken;
use crate::session::{BatchSession, SessionState};
use crate::settings::ProcessorSettings;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No selected item needed work; nothing was started.
    NothingToDo,
    /// Every selected item reached its target.
    Completed { completed_items: usize },
    /// The token was invalidated by `stop` or a newer `start`.
    Cancelled,
}

enum NextJob {
    Item(ItemId),
    /// A job from this run is still marked in flight.
    Wait,
    Finished {
        completed_items: usize,
        total_items: usize,
        elapsed_ms: u64,
    },
    Cancelled,
}

impl BatchSession {
    /// Begin a run over the selected items that diverge from their targets.
    ///
    /// Returns `None`, leaving everything untouched, if there is nothing to do.
    /// Calling it while a run is active restarts: the old token dies.
    pub fn start(&self) -> Option<RunToken> {
        let (token, total) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let total = state
                .store
                .items()
                .iter()
                .filter(|item| item.is_selected && item.needs_work())
                .count();
            if total == 0 {
                debug!("Nothing to process");
                return None;
            }

            let token = state.generation.advance();
            state.demote_stale();
            for item in state.store.items_mut() {
                if !item.is_selected {
                    continue;
                }
                if item.needs_work() {
                    item.status = ItemStatus::Pending;
                } else if item.status.is_pending() {
                    item.status = ItemStatus::Done;
                }
            }
            state.stats.begin_run(total);
            state.run_started = Some(Instant::now());
            (token, total)
        };

        info!("Starting run {} over {} images", token.generation, total);
        self.emit(BatchEvent::RunStarted {
            token,
            total_items: total,
        });
        Some(token)
    }

    /// Invalidate the live token. In-flight work abandons at its next
    /// suspension point; its item goes back to pending.
    pub fn stop(&self) {
        let was_processing = {
            let mut state = self.lock();
            state.generation.advance();
            state.demote_stale();
            let was_processing = state.stats.is_processing;
            state.stats.end_run();
            was_processing
        };

        if was_processing {
            info!("Run stopped");
            self.emit(BatchEvent::RunStopped);
        }
    }

    /// Change the settings surface. Selected items pick up the new targets;
    /// an item in flight finishes with its captured targets and is requeued.
    pub fn update_settings(&self, settings: ProcessorSettings) -> Result<(), DecayError> {
        settings.validate()?;

        let mut guard = self.lock();
        let state = &mut *guard;
        state.settings = settings;

        let mut newly_pending = 0;
        for item in state.store.items_mut() {
            if item.is_selected && SessionState::retarget(item, settings) {
                newly_pending += 1;
            }
        }
        state.recount_run();
        debug!("Settings now {} ({} images requeued)", settings, newly_pending);
        Ok(())
    }

    /// Convenience: `start` then `drive` until the run ends.
    pub async fn run<C: ImageCodec>(&self, codec: &C) -> Result<RunOutcome, DecayError> {
        match self.start() {
            Some(token) => self.drive(codec, token).await,
            None => Ok(RunOutcome::NothingToDo),
        }
    }

    /// Process pending items one at a time until none remain or `token` dies.
    pub async fn drive<C: ImageCodec>(
        &self,
        codec: &C,
        token: RunToken,
    ) -> Result<RunOutcome, DecayError> {
        loop {
            let id = match self.next_job(token) {
                NextJob::Item(id) => id,
                NextJob::Wait => {
                    tokio::task::yield_now().await;
                    continue;
                }
                NextJob::Cancelled => return Ok(RunOutcome::Cancelled),
                NextJob::Finished {
                    completed_items,
                    total_items,
                    elapsed_ms,
                } => {
                    info!(
                        "Run complete: {}/{} images in {}ms",
                        completed_items, total_items, elapsed_ms
                    );
                    self.emit(BatchEvent::RunCompleted {
                        completed_items,
                        total_items,
                        elapsed_ms,
                    });
                    return Ok(RunOutcome::Completed { completed_items });
                }
            };

            match advance(self, codec, token, id).await {
                Ok(AdvanceOutcome::Cancelled) => {
                    if !self.is_live(token) {
                        return Ok(RunOutcome::Cancelled);
                    }
                    // item removed under the job; keep going
                    debug!("{} abandoned, run continues", id);
                }
                Ok(_) => {}
                Err(e) => {
                    return if self.halt(token, id, &e) {
                        Err(e)
                    } else {
                        Ok(RunOutcome::Cancelled)
                    };
                }
            }
        }
    }

    fn next_job(&self, token: RunToken) -> NextJob {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.generation.is_live(token) {
            return NextJob::Cancelled;
        }

        state.demote_stale();
        if state.store.items().iter().any(|item| item.status.is_processing()) {
            return NextJob::Wait;
        }

        let picked = state
            .store
            .items_mut()
            .iter_mut()
            .find(|item| item.is_selected && item.status.is_pending())
            .map(|item| {
                item.status = ItemStatus::Processing { token };
                (item.id, item.name.clone(), item.target_iterations)
            });

        match picked {
            Some((id, name, target_iterations)) => {
                debug!("Next up: {} {}", id, name);
                state.stats.begin_item(&name, target_iterations);
                NextJob::Item(id)
            }
            None => {
                state.stats.end_run();
                NextJob::Finished {
                    completed_items: state.stats.completed_items,
                    total_items: state.stats.total_items,
                    elapsed_ms: state.elapsed_ms(),
                }
            }
        }
    }

    /// Stop the run after a codec failure on `id`. False if the run was
    /// already cancelled, in which case the error is moot.
    fn halt(&self, token: RunToken, id: ItemId, error: &DecayError) -> bool {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if !state.generation.is_live(token) {
                return false;
            }
            if let Some(item) = state.store.get_mut(id) {
                if item.status == (ItemStatus::Processing { token }) {
                    item.status = ItemStatus::Pending;
                }
            }
            state.generation.advance();
            state.stats.end_run();
        }

        warn!("Run halted on {}: {}", id, error);
        self.emit(BatchEvent::RunHalted {
            id,
            error: error.to_string(),
        });
        true
    }
}
