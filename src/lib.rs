//! # Jpegifier Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `settings`: Passate e qualità target (`ProcessorSettings`, `Quality`)
//! - `codec`: Contratto verso il codec e implementazione JPEG
//! - `item`: Item del batch e macchina a stati reset/resume
//! - `store`: Collezione ordinata degli item con limite di capacità
//! - `selection`: Modello di selezione (anchor, range, toggle, paint)
//! - `session`: Handle condiviso su tutto lo stato del batch
//! - `processor`: Scheduler single-flight, job per item, checkpoint, ETA
//! - `file_manager`: Discovery, lettura e scrittura dei file
//! - `progress` / `json_output`: Feedback per la CLI
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use jpegifier::{BatchSession, Config, JpegCodec, NewImage};
//!
//! let session = BatchSession::new(&Config::default());
//! session.ingest(vec![NewImage::new("cat.png", bytes)])?;
//! session.run(&JpegCodec::new()).await?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod item;
pub mod json_output;
pub mod processor;
pub mod progress;
pub mod selection;
pub mod session;
pub mod settings;
pub mod store;
pub mod utils;

pub use codec::{ImageBytes, ImageCodec, JpegCodec};
pub use config::Config;
pub use error::DecayError;
pub use item::{BatchItem, ItemId, ItemStatus, StartPoint};
pub use processor::{BatchEvent, CheckpointPolicy, ProcessingStats, RunOutcome, RunToken};
pub use session::BatchSession;
pub use settings::{ProcessorSettings, Quality};
pub use store::{IngestReport, NewImage};
