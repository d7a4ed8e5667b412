//! # Processor Module
//!
//! Motore di re-encoding iterativo, separato in sottomoduli:
//! - `scheduler`: Orchestratore single-flight (`start` / `stop` / `drive`)
//! - `item_job`: Worker per singolo item (reset o resume fino al target)
//! - `checkpoint`: Policy di campionamento dei commit intermedi
//! - `progress_tracker`: Statistiche del run e stima ETA
//! - `token`: Token di generazione per la cancellazione
//! - `events`: Eventi broadcast verso le UI

pub mod checkpoint;
pub mod events;
pub mod item_job;
pub mod progress_tracker;
pub mod scheduler;
pub mod token;

pub use checkpoint::CheckpointPolicy;
pub use events::BatchEvent;
pub use item_job::{advance, AdvanceOutcome, JobPlan};
pub use progress_tracker::{estimate_remaining, JobClock, ProcessingStats};
pub use scheduler::RunOutcome;
pub use token::{JobGeneration, RunToken};

/// Session holding `n` selected one-byte images at the given settings.
#[cfg(test)]
pub(crate) fn session_with(
    n: usize,
    iterations: u32,
    quality: f32,
) -> (crate::session::BatchSession, Vec<crate::item::ItemId>) {
    use crate::settings::ProcessorSettings;
    use crate::store::NewImage;

    let config = crate::config::Config {
        default_settings: ProcessorSettings::new(iterations, quality).unwrap(),
        ..Default::default()
    };
    let session = crate::session::BatchSession::new(&config);
    let images = (0..n)
        .map(|i| NewImage::new(format!("img-{}.png", i), vec![b'a' + i as u8]))
        .collect();
    let ids = session.ingest(images).unwrap().added;
    (session, ids)
}
