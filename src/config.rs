//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri di default del batch
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `default_settings`: Passate e qualità iniziali (default: 20 passate @ 50%)
//! - `max_batch_size`: Numero massimo di immagini nel batch (default: 10)
//! - `checkpoints`: Policy di campionamento dei checkpoint (5 / 20 / ogni 10)
//! - `output_path`: Directory di output (default: None = directory corrente)
//! - `save_stages`: Salva un file per ogni stage (default: false)
//! - `json_output`: Eventi JSON su stdout invece della progress bar
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     max_batch_size: 25,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::processor::checkpoint::CheckpointPolicy;
use crate::settings::ProcessorSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a re-encoding session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings applied to newly ingested items
    pub default_settings: ProcessorSettings,
    /// Maximum number of images held in the batch
    pub max_batch_size: usize,
    /// Which passes commit visible intermediate state
    pub checkpoints: CheckpointPolicy,
    /// Output directory for re-encoded files (None = current directory)
    pub output_path: Option<PathBuf>,
    /// Write one file per stage instead of only the final result
    pub save_stages: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_settings: ProcessorSettings::default(),
            max_batch_size: 10,
            checkpoints: CheckpointPolicy::default(),
            output_path: None,
            save_stages: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.default_settings.validate()?;

        if self.max_batch_size == 0 {
            return Err(anyhow::anyhow!("Maximum batch size must be greater than 0"));
        }

        self.checkpoints.validate()?;

        // Validate output path if specified
        if let Some(ref output_path) = self.output_path {
            if !output_path.exists() {
                return Err(anyhow::anyhow!("Output path does not exist: {}", output_path.display()));
            }
            if !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    /// Default location: `<config dir>/jpegifier/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jpegifier").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Quality;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_batch_size = 0;
        assert!(config.validate().is_err());

        config.max_batch_size = 10;
        config.default_settings.iterations = 0;
        assert!(config.validate().is_err());

        config.default_settings.iterations = 20;
        config.checkpoints.stride = 0;
        assert!(config.validate().is_err());

        config.checkpoints = CheckpointPolicy::default();
        config.output_path = Some(PathBuf::from("/definitely/not/here"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_settings.iterations, 20);
        assert_eq!(config.default_settings.quality.percent(), 50);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.checkpoints, CheckpointPolicy::default());
        assert!(!config.json_output);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            default_settings: ProcessorSettings {
                iterations: 100,
                quality: Quality::new(0.2).unwrap(),
            },
            max_batch_size: 4,
            save_stages: true,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.default_settings, original_config.default_settings);
        assert_eq!(loaded_config.max_batch_size, 4);
        assert!(loaded_config.save_stages);
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{"max_batch_size": 3}"#).await.unwrap();

        let loaded = Config::from_file(&config_path).await.unwrap();
        assert_eq!(loaded.max_batch_size, 3);
        assert_eq!(loaded.default_settings, ProcessorSettings::default());
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded.max_batch_size, 10);
    }
}
