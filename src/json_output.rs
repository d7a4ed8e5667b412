//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico
//! (una riga JSON per messaggio su stdout).
//!
//! ## Responsabilità:
//! - Emette messaggi JSON strutturati per gli eventi del batch
//! - Traduce i `BatchEvent` della sessione in messaggi stabili per i consumer
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del processo con immagini e stage
//! - `stage`: Inizio di uno stage (nuove impostazioni applicate)
//! - `file_start`: Inizio elaborazione di un'immagine (reset o resume)
//! - `progress`: Checkpoint committato (passata corrente, ETA)
//! - `file_complete`: Immagine arrivata al target
//! - `saved`: File scritto su disco
//! - `complete`: Fine processo con statistiche finali
//! - `error`: Errore durante elaborazione

use crate::item::StartPoint;
use crate::processor::events::BatchEvent;
use crate::settings::ProcessorSettings;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del processo
    #[serde(rename = "start")]
    Start {
        total_images: usize,
        rejected_images: usize,
        output_dir: PathBuf,
        stages: Vec<JsonStage>,
    },

    /// Inizio di uno stage
    #[serde(rename = "stage")]
    Stage { index: usize, stage: JsonStage },

    /// Inizio elaborazione di un'immagine
    #[serde(rename = "file_start")]
    FileStart {
        name: String,
        start: StartPoint,
        from_iteration: u32,
        target_iterations: u32,
    },

    /// Checkpoint dell'immagine in corso
    #[serde(rename = "progress")]
    Progress {
        name: Option<String>,
        iteration: u32,
        target_iterations: u32,
        percentage: f64,
        eta_ms: Option<u64>,
    },

    /// Immagine completata
    #[serde(rename = "file_complete")]
    FileComplete {
        name: String,
        iterations: u32,
        quality_percent: u8,
        original_size: usize,
        output_size: usize,
        completed: usize,
        total: usize,
    },

    /// File scritto su disco
    #[serde(rename = "saved")]
    Saved { path: PathBuf, size: u64 },

    /// Processo completato
    #[serde(rename = "complete")]
    Complete {
        stages_run: usize,
        files_written: usize,
        total_original_size: u64,
        total_output_size: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Stage settings for JSON output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonStage {
    pub iterations: u32,
    pub quality_percent: u8,
}

impl From<&ProcessorSettings> for JsonStage {
    fn from(settings: &ProcessorSettings) -> Self {
        Self {
            iterations: settings.iterations,
            quality_percent: settings.quality.percent(),
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

/// Stateful translator from batch events to JSON messages.
#[derive(Debug, Default)]
pub struct JsonReporter {
    current: Option<String>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message for `event`, if consumers care about it.
    pub fn translate(&mut self, event: &BatchEvent) -> Option<JsonMessage> {
        match event {
            BatchEvent::ItemStarted {
                name,
                start,
                from_iteration,
                target_iterations,
                ..
            } => {
                self.current = Some(name.clone());
                Some(JsonMessage::FileStart {
                    name: name.clone(),
                    start: *start,
                    from_iteration: *from_iteration,
                    target_iterations: *target_iterations,
                })
            }
            BatchEvent::Checkpoint {
                iteration,
                target_iterations,
                eta_ms,
                ..
            } => Some(JsonMessage::Progress {
                name: self.current.clone(),
                iteration: *iteration,
                target_iterations: *target_iterations,
                percentage: f64::from(*iteration) / f64::from((*target_iterations).max(1)) * 100.0,
                eta_ms: *eta_ms,
            }),
            BatchEvent::ItemFinished {
                name,
                iterations,
                quality,
                original_size,
                size_bytes,
                completed_items,
                total_items,
                ..
            } => {
                self.current = None;
                Some(JsonMessage::FileComplete {
                    name: name.clone(),
                    iterations: *iterations,
                    quality_percent: quality.percent(),
                    original_size: *original_size,
                    output_size: *size_bytes,
                    completed: *completed_items,
                    total: *total_items,
                })
            }
            BatchEvent::RunHalted { error, .. } => Some(JsonMessage::error(
                format!("Processing failed on {}", self.current.as_deref().unwrap_or("image")),
                Some(error.clone()),
            )),
            BatchEvent::RunStarted { .. }
            | BatchEvent::RunCompleted { .. }
            | BatchEvent::RunStopped => None,
        }
    }

    /// Translate and print.
    pub fn handle(&mut self, event: &BatchEvent) {
        if let Some(message) = self.translate(event) {
            message.emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;
    use crate::settings::Quality;

    #[test]
    fn test_checkpoint_carries_current_name() {
        let mut reporter = JsonReporter::new();
        reporter.translate(&BatchEvent::ItemStarted {
            id: ItemId(1),
            name: "cat.png".to_string(),
            start: StartPoint::Resume,
            from_iteration: 10,
            target_iterations: 40,
            quality: Quality::new(0.5).unwrap(),
        });

        let message = reporter
            .translate(&BatchEvent::Checkpoint {
                id: ItemId(1),
                iteration: 20,
                target_iterations: 40,
                eta_ms: Some(1200),
            })
            .unwrap();
        assert_eq!(
            message,
            JsonMessage::Progress {
                name: Some("cat.png".to_string()),
                iteration: 20,
                target_iterations: 40,
                percentage: 50.0,
                eta_ms: Some(1200),
            }
        );
    }

    #[test]
    fn test_message_tags() {
        let json = serde_json::to_value(JsonMessage::Saved {
            path: PathBuf::from("out/jpegified_cat.jpg"),
            size: 42,
        })
        .unwrap();
        assert_eq!(json["type"], "saved");
        assert_eq!(json["size"], 42);

        let json = serde_json::to_value(JsonMessage::FileStart {
            name: "a.png".to_string(),
            start: StartPoint::Reset,
            from_iteration: 0,
            target_iterations: 5,
        })
        .unwrap();
        assert_eq!(json["type"], "file_start");
        assert_eq!(json["start"], "reset");
    }

    #[test]
    fn test_run_boundaries_are_silent() {
        let mut reporter = JsonReporter::new();
        assert_eq!(reporter.translate(&BatchEvent::RunStopped), None);
        let halted = reporter.translate(&BatchEvent::RunHalted {
            id: ItemId(3),
            error: "Decode error: bad".to_string(),
        });
        assert!(matches!(halted, Some(JsonMessage::Error { .. })));
    }
}
