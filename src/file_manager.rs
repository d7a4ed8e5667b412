//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file attorno al batch.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva delle immagini in input (file singoli o directory)
//! - Lettura delle immagini con rilevamento delle dimensioni
//! - Calcolo dei nomi di output (`jpegified_<stem>.jpg`)
//! - Scrittura atomica dei risultati tramite file temporaneo + rename
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati in input:
//! - JPG, JPEG, PNG, WebP
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_images(&[PathBuf::from("/path/to/photos")])?;
//! for file in files {
//!     let image = FileManager::read_image(&file).await?;
//!     // ingest into the session
//! }
//! ```

use crate::codec::ImageBytes;
use crate::settings::Quality;
use crate::store::NewImage;
use crate::utils::stage_label;
use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of every file written by the tool.
pub const OUTPUT_PREFIX: &str = "jpegified_";

/// Manages file discovery, reading and output
pub struct FileManager;

impl FileManager {
    /// Expand inputs (files or directories) into image paths.
    ///
    /// Directories are walked recursively and sorted; explicit non-image
    /// files are skipped with a warning.
    pub fn find_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                let mut found: Vec<PathBuf> = WalkDir::new(input)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|path| Self::is_image(path) && !Self::is_own_output(path))
                    .collect();
                found.sort();
                debug!("Found {} images in {}", found.len(), input.display());
                files.extend(found);
            } else if input.is_file() {
                if Self::is_image(input) {
                    files.push(input.clone());
                } else {
                    warn!("Skipping non-image file: {}", input.display());
                }
            } else {
                return Err(anyhow::anyhow!("Input does not exist: {}", input.display()));
            }
        }

        Ok(files)
    }

    /// Check if a file is a supported image
    pub fn is_image(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "jpg" | "jpeg" | "png" | "webp")
        } else {
            false
        }
    }

    /// True for files this tool wrote on an earlier run.
    fn is_own_output(path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with(OUTPUT_PREFIX))
            .unwrap_or(false)
    }

    /// Read an image file into an ingestable batch entry.
    pub async fn read_image(path: &Path) -> Result<NewImage> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let dimensions = Self::probe_dimensions(&bytes);
        if dimensions.is_none() {
            warn!("Could not read dimensions of {}", name);
        }

        let image = NewImage::new(name, ImageBytes::from(bytes));
        Ok(match dimensions {
            Some((width, height)) => image.with_dimensions(width, height),
            None => image,
        })
    }

    /// Width and height from the image header, without a full decode.
    pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
        image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    /// Output file name for an item: `jpegified_<stem>.jpg`, or
    /// `jpegified_<stem>_<N>x_q<P>.jpg` for a saved stage.
    pub fn output_name(name: &str, stage: Option<(u32, Quality)>) -> String {
        let stem = Path::new(name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        match stage {
            Some((iterations, quality)) => format!(
                "{}{}_{}.jpg",
                OUTPUT_PREFIX,
                stem,
                stage_label(iterations, quality)
            ),
            None => format!("{}{}.jpg", OUTPUT_PREFIX, stem),
        }
    }

    /// Write `bytes` to `dir/file_name` atomically (temp file + rename).
    pub async fn write_output(dir: &Path, file_name: &str, bytes: ImageBytes) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let dir = dir.to_path_buf();
        let target = dir.join(file_name);

        let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&bytes)?;
            temp.flush()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(target)
        })
        .await??;

        debug!("Wrote {}", written.display());
        Ok(written)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Size change in percent; positive when the output is smaller
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
