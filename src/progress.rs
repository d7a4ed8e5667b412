//! # Progress Display and Summary Module
//!
//! Questo modulo traduce gli eventi del batch in feedback visivo per la CLI.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` pilotata dai `BatchEvent`
//! - Messaggi di stato per item (reset/resume, passata corrente, ETA)
//! - Listener asincrono sul canale broadcast della sessione
//! - Riepilogo finale dei file scritti e della dimensione risultante
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 6/10 (60%) cat.png 34/50 ETA 4s
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let progress = ProgressManager::new(session.len() as u64);
//! let listener = tokio::spawn(follow_events(session.subscribe(), move |e| progress.handle(e)));
//! session.run(&codec).await?;
//! listener.await?;
//! ```

use crate::file_manager::FileManager;
use crate::processor::events::BatchEvent;
use crate::utils::format_eta;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// Feed every event of one run to `sink`, returning after the run ends.
pub async fn follow_events<F>(mut events: broadcast::Receiver<BatchEvent>, mut sink: F)
where
    F: FnMut(&BatchEvent),
{
    loop {
        match events.recv().await {
            Ok(event) => {
                sink(&event);
                if event.ends_run() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Progress display skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Manages the progress bar of a batch run
pub struct ProgressManager {
    bar: ProgressBar,
    current: Option<String>,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_items: u64) -> Self {
        let bar = ProgressBar::new(total_items);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar, current: None }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            current: None,
        }
    }

    /// Apply one batch event to the bar.
    pub fn handle(&mut self, event: &BatchEvent) {
        match event {
            BatchEvent::RunStarted { total_items, .. } => {
                self.bar.reset();
                self.bar.set_length(*total_items as u64);
                self.bar.set_position(0);
            }
            BatchEvent::ItemStarted {
                name,
                start,
                from_iteration,
                target_iterations,
                quality,
                ..
            } => {
                self.current = Some(name.clone());
                self.bar.set_message(format!(
                    "{} {:?} {}→{} @ {}",
                    name, start, from_iteration, target_iterations, quality
                ));
            }
            BatchEvent::Checkpoint {
                iteration,
                target_iterations,
                eta_ms,
                ..
            } => {
                let name = self.current.as_deref().unwrap_or("");
                let eta = eta_ms
                    .map(|ms| format!(" ETA {}", format_eta(ms)))
                    .unwrap_or_default();
                self.bar
                    .set_message(format!("{} {}/{}{}", name, iteration, target_iterations, eta));
            }
            BatchEvent::ItemFinished {
                name,
                original_size,
                size_bytes,
                completed_items,
                total_items,
                ..
            } => {
                self.bar.set_length(*total_items as u64);
                self.bar.set_position(*completed_items as u64);
                self.bar.set_message(format!(
                    "✅ {}: {} ({:+.1}%)",
                    name,
                    FileManager::format_size(*size_bytes as u64),
                    -FileManager::calculate_reduction(*original_size as u64, *size_bytes as u64)
                ));
            }
            BatchEvent::RunCompleted {
                completed_items,
                elapsed_ms,
                ..
            } => {
                self.bar.finish_with_message(format!(
                    "{} images in {}",
                    completed_items,
                    format_eta(*elapsed_ms)
                ));
            }
            BatchEvent::RunHalted { error, .. } => {
                let name = self.current.as_deref().unwrap_or("image");
                self.bar.abandon_with_message(format!("❌ {}: {}", name, error));
            }
            BatchEvent::RunStopped => {
                self.bar.abandon_with_message("Stopped");
            }
        }
    }
}

/// Totals across every file written by the CLI
#[derive(Debug, Default)]
pub struct RunSummary {
    pub stages_run: usize,
    pub files_written: usize,
    pub total_original_size: u64,
    pub total_output_size: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_written(&mut self, original_size: u64, output_size: u64) {
        self.files_written += 1;
        self.total_original_size += original_size;
        self.total_output_size += output_size;
    }

    /// Output size relative to input, in percent (100 = unchanged).
    pub fn size_ratio_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_output_size as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Stages: {} | Files written: {} | Input: {} | Output: {} ({:.1}% of input)",
            self.stages_run,
            self.files_written,
            FileManager::format_size(self.total_original_size),
            FileManager::format_size(self.total_output_size),
            self.size_ratio_percent()
        )
    }
}
