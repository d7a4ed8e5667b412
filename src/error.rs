//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `DecayError` enum per categorizzare gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Decode` / `Encode`: Fallimenti del codec, fatali per il run corrente
//!   (recuperabili rilanciando `start()`)
//! - `CapacityExceeded`: Batch pieno al momento dell'ingestione
//! - `UnknownItem` / `InvalidReorder`: Operazioni su item inesistenti
//! - `InvalidSettings`: Parametri fuori range
//!
//! Gli errori di I/O (`file_manager`, `config`) viaggiano come `anyhow::Error`.
//!
//! Un job annullato tramite token NON è un errore: il percorso di abbandono
//! è rappresentato da `AdvanceOutcome::Cancelled` e non produce alcun
//! cambiamento di stato.
//!
//! ## Esempio:
//! ```rust,ignore
//! if store.len() >= limit {
//!     return Err(DecayError::CapacityExceeded { limit });
//! }
//! ```

use crate::item::ItemId;

/// Custom error types for batch re-encoding
#[derive(thiserror::Error, Debug)]
pub enum DecayError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Maximum batch size of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Cannot move item from {from} to {to} in a batch of {len}")]
    InvalidReorder { from: usize, to: usize, len: usize },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
