//! # Item Job Module
//!
//! Worker per l'avanzamento di un singolo item verso il suo target.
//! Separato dallo scheduler come il `task_optimizer` lo era dall'orchestratore.
//!
//! ## Flusso:
//! 1. Snapshot del piano (`JobPlan`): reset da `original` o resume da `processed`
//! 2. Decode della sorgente
//! 3. Passate concatenate: encode → decode, ognuna sull'output precedente
//! 4. Commit ai checkpoint campionati dalla `CheckpointPolicy`
//! 5. Commit finale atomico: immagine, contatori e stato
//!
//! Dopo ogni punto di sospensione (decode, encode, checkpoint) il token
//! catturato viene confrontato con quello live: se diverso il job abbandona
//! in silenzio, senza scrivere nulla.

use crate::codec::{ImageBytes, ImageCodec};
use crate::error::DecayError;
use crate::item::{BatchItem, ItemId, ItemStatus, StartPoint};
use crate::processor::events::BatchEvent;
use crate::processor::progress_tracker::JobClock;
use crate::processor::token::RunToken;
use crate::session::{BatchSession, SessionState};
use crate::settings::Quality;
use std::time::Duration;
use tracing::debug;

/// Result of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// All passes ran and the final state was committed.
    Finished { passes: u32 },
    /// Actual state already matched the target.
    AlreadyAtTarget,
    /// Token invalidated or item gone; nothing further was written.
    Cancelled,
}

/// What a job will do, captured when the item starts.
/// Later settings changes never reach a job already in flight.
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub id: ItemId,
    pub name: String,
    pub start: StartPoint,
    pub source: ImageBytes,
    pub from_iteration: u32,
    pub target_iterations: u32,
    pub quality: Quality,
}

impl JobPlan {
    /// `None` when the item is already at its target.
    pub fn for_item(item: &BatchItem) -> Option<Self> {
        let start = item.start_point()?;
        let (source, from_iteration) = match start {
            StartPoint::Reset => (item.original.clone(), 0),
            StartPoint::Resume => (item.processed.clone(), item.current_iterations),
        };
        Some(Self {
            id: item.id,
            name: item.name.clone(),
            start,
            source,
            from_iteration,
            target_iterations: item.target_iterations,
            quality: item.target_quality,
        })
    }

    pub fn passes(&self) -> u32 {
        self.target_iterations - self.from_iteration
    }
}

/// A consistent `(processed, iterations, quality)` triple.
struct Baked {
    bytes: ImageBytes,
    iterations: u32,
    quality: Quality,
}

/// Drive item `id` (already marked `processing` under `token`) to its target.
pub async fn advance<C: ImageCodec>(
    session: &BatchSession,
    codec: &C,
    token: RunToken,
    id: ItemId,
) -> Result<AdvanceOutcome, DecayError> {
    let plan = {
        let state = session.lock();
        if !state.generation.is_live(token) {
            return Ok(AdvanceOutcome::Cancelled);
        }
        match state.store.get(id) {
            Some(item) => JobPlan::for_item(item),
            None => return Ok(AdvanceOutcome::Cancelled),
        }
    };

    let Some(plan) = plan else {
        return Ok(match finish(session, token, id, None) {
            Some(event) => {
                session.emit(event);
                AdvanceOutcome::AlreadyAtTarget
            }
            None => AdvanceOutcome::Cancelled,
        });
    };

    debug!(
        "{} {}: {:?} from pass {} to {} @ {}",
        plan.id, plan.name, plan.start, plan.from_iteration, plan.target_iterations, plan.quality
    );
    session.emit(BatchEvent::ItemStarted {
        id,
        name: plan.name.clone(),
        start: plan.start,
        from_iteration: plan.from_iteration,
        target_iterations: plan.target_iterations,
        quality: plan.quality,
    });

    let policy = session.checkpoints();
    let clock = JobClock::start(plan.from_iteration, plan.target_iterations);

    let Some(mut image) = settle(session, token, codec.decode(plan.source.clone()).await)? else {
        return Ok(AdvanceOutcome::Cancelled);
    };
    let mut latest = plan.source.clone();

    for pass in plan.from_iteration..plan.target_iterations {
        let Some(encoded) = settle(session, token, codec.encode_pass(&image, plan.quality).await)?
        else {
            return Ok(AdvanceOutcome::Cancelled);
        };
        let Some(decoded) = settle(session, token, codec.decode(encoded.clone()).await)? else {
            return Ok(AdvanceOutcome::Cancelled);
        };
        image = decoded;
        latest = encoded;

        let reached = pass + 1;
        // the final pass is committed together with the status in `finish`
        if reached < plan.target_iterations && policy.should_commit(pass, plan.target_iterations) {
            let eta = clock.eta(reached);
            let baked = Baked {
                bytes: latest.clone(),
                iterations: reached,
                quality: plan.quality,
            };
            if !commit_checkpoint(session, token, id, baked, eta) {
                return Ok(AdvanceOutcome::Cancelled);
            }
            session.emit(BatchEvent::Checkpoint {
                id,
                iteration: reached,
                target_iterations: plan.target_iterations,
                eta_ms: eta.map(|d| d.as_millis() as u64),
            });

            tokio::task::yield_now().await;
            if !session.is_live(token) {
                return Ok(AdvanceOutcome::Cancelled);
            }
        }
    }

    let baked = Baked {
        bytes: latest,
        iterations: plan.target_iterations,
        quality: plan.quality,
    };
    match finish(session, token, id, Some(baked)) {
        Some(event) => {
            session.emit(event);
            Ok(AdvanceOutcome::Finished {
                passes: plan.passes(),
            })
        }
        None => Ok(AdvanceOutcome::Cancelled),
    }
}

/// Cancellation check after a suspension point. `Ok(None)` means abandon:
/// a stale job swallows even codec errors.
fn settle<T>(
    session: &BatchSession,
    token: RunToken,
    result: Result<T, DecayError>,
) -> Result<Option<T>, DecayError> {
    if !session.is_live(token) {
        return Ok(None);
    }
    result.map(Some)
}

fn commit_checkpoint(
    session: &BatchSession,
    token: RunToken,
    id: ItemId,
    baked: Baked,
    eta: Option<Duration>,
) -> bool {
    let mut guard = session.lock();
    let state = &mut *guard;
    if !state.generation.is_live(token) {
        return false;
    }
    let Some(item) = state.store.get_mut(id) else {
        return false;
    };
    if item.status != (ItemStatus::Processing { token }) {
        return false;
    }
    item.commit_checkpoint(baked.bytes, baked.iterations, baked.quality);
    state.stats.record_eta(eta);
    true
}

/// Final commit. The item becomes `done`, or `pending` again if its targets
/// moved while the job ran.
fn finish(
    session: &BatchSession,
    token: RunToken,
    id: ItemId,
    baked: Option<Baked>,
) -> Option<BatchEvent> {
    let mut guard = session.lock();
    let state: &mut SessionState = &mut guard;
    if !state.generation.is_live(token) {
        return None;
    }
    let item = state.store.get_mut(id)?;
    if item.status != (ItemStatus::Processing { token }) {
        return None;
    }

    if let Some(baked) = baked {
        item.commit_checkpoint(baked.bytes, baked.iterations, baked.quality);
    }
    let requeued = item.needs_work();
    item.status = if requeued {
        ItemStatus::Pending
    } else {
        ItemStatus::Done
    };
    let name = item.name.clone();
    let iterations = item.current_iterations;
    let quality = item.current_quality.unwrap_or(item.target_quality);
    let original_size = item.original.len();
    let size_bytes = item.processed.len();

    state.stats.finish_item();
    state.recount_run();
    if requeued {
        debug!("{} targets changed mid-job, requeued", id);
    }

    Some(BatchEvent::ItemFinished {
        id,
        name,
        iterations,
        quality,
        original_size,
        size_bytes,
        completed_items: state.stats.completed_items,
        total_items: state.stats.total_items,
    })
}
