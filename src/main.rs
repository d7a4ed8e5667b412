//! # Jpegify - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (file + override da CLI)
//! - Ingestione delle immagini e avvio degli stage di re-encoding
//! - Scrittura dei risultati (`jpegified_<nome>.jpg`)
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, passate, qualità, stage aggiuntivi)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica la configurazione e applica gli override
//! 4. Trova e legge le immagini, le ingerisce nella sessione
//! 5. Per ogni stage: applica le impostazioni, lancia il run, salva i file
//!
//! Ogni stage riparte dallo stato già calcolato: più passate alla stessa
//! qualità continuano da dove si era arrivati, meno passate o una qualità
//! diversa ripartono dall'originale.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! jpegify ./photos -i 50 -q 40 --stage 100@40 --stage 20@10 --save-stages
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jpegifier::file_manager::FileManager;
use jpegifier::json_output::{JsonMessage, JsonReporter, JsonStage};
use jpegifier::progress::{follow_events, ProgressManager, RunSummary};
use jpegifier::{BatchSession, Config, JpegCodec, ProcessorSettings, Quality, RunOutcome};

#[derive(Parser)]
#[command(name = "jpegify")]
#[command(about = "Re-encode images over and over and watch the generation loss pile up")]
struct Args {
    /// Image files or directories containing images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JPEG quality of every pass (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Number of re-encoding passes
    #[arg(short, long)]
    iterations: Option<u32>,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra stage run after the first, as PASSES@QUALITY (e.g. 100@30)
    #[arg(long = "stage", value_name = "PASSES@QUALITY")]
    stages: Vec<ProcessorSettings>,

    /// Configuration file (default: <config dir>/jpegifier/config.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration back to the configuration file
    #[arg(long)]
    save_config: bool,

    /// Maximum number of images in the batch
    #[arg(long)]
    max_batch: Option<usize>,

    /// Save one file per stage instead of only the final result
    #[arg(long)]
    save_stages: bool,

    /// Output progress as JSON lines for programmatic use
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout stays reserved for JSON output
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let json = args.json;
    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) if json => {
            JsonMessage::error("jpegify failed".to_string(), Some(format!("{:#}", e))).emit();
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = load_config(args.config.as_deref()).await?;

    // Validate and create output directory if specified
    if let Some(ref output_dir) = args.output {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
            info!("Created output directory: {}", output_dir.display());
        }
        config.output_path = Some(output_dir.clone());
    }
    if let Some(quality) = args.quality {
        config.default_settings.quality = Quality::from_percent(quality)?;
    }
    if let Some(iterations) = args.iterations {
        config.default_settings.iterations = iterations;
    }
    if let Some(max_batch) = args.max_batch {
        config.max_batch_size = max_batch;
    }
    config.save_stages |= args.save_stages;
    config.json_output |= args.json;
    config.validate()?;

    if args.save_config {
        if let Some(ref path) = config_path {
            config.save_to_file(path).await?;
            info!("Saved configuration to {}", path.display());
        }
    }

    let stages: Vec<ProcessorSettings> = std::iter::once(config.default_settings)
        .chain(args.stages.iter().copied())
        .collect();
    let output_dir = match config.output_path {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    // Discover and ingest
    let files = FileManager::find_images(&args.inputs)?;
    if files.is_empty() {
        return Err(anyhow::anyhow!("No images found in the given inputs"));
    }

    let session = BatchSession::new(&config);
    let mut images = Vec::with_capacity(files.len());
    for file in &files {
        match FileManager::read_image(file).await {
            Ok(image) => images.push(image),
            Err(e) => warn!("Skipping {}: {:#}", file.display(), e),
        }
    }
    let report = session.ingest(images)?;
    info!("Loaded {} images", report.added.len());

    if config.json_output {
        JsonMessage::Start {
            total_images: report.added.len(),
            rejected_images: report.rejected,
            output_dir: output_dir.clone(),
            stages: stages.iter().map(JsonStage::from).collect(),
        }
        .emit();
    }

    // First Ctrl-C stops the run and skips later stages; a second one exits
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let stopper = session.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if flag.swap(true, Ordering::SeqCst) {
                warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            stopper.stop();
        }
    });

    let started = Instant::now();
    let mut summary = RunSummary::new();
    run_stages(
        &session,
        &JpegCodec::new(),
        &stages,
        &config,
        &output_dir,
        &interrupted,
        &mut summary,
    )
    .await?;

    if config.json_output {
        JsonMessage::Complete {
            stages_run: summary.stages_run,
            files_written: summary.files_written,
            total_original_size: summary.total_original_size,
            total_output_size: summary.total_output_size,
            duration_seconds: started.elapsed().as_secs_f64(),
        }
        .emit();
    } else {
        info!("{}", summary.format_summary());
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            Config::from_file(path).await
        }
        None => match Config::default_path() {
            Some(path) => Config::from_file(&path).await,
            None => Ok(Config::default()),
        },
    }
}

/// Apply each stage in turn. Once `interrupted` is set no new stage starts;
/// whatever is already baked is written before returning.
async fn run_stages(
    session: &BatchSession,
    codec: &JpegCodec,
    stages: &[ProcessorSettings],
    config: &Config,
    output_dir: &Path,
    interrupted: &AtomicBool,
    summary: &mut RunSummary,
) -> Result<()> {
    let mut unwritten = false;

    for (index, stage) in stages.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            warn!("Interrupted before stage {}", index + 1);
            if unwritten {
                write_outputs(session, output_dir, config.save_stages, config.json_output, summary)
                    .await?;
            }
            return Ok(());
        }

        let is_last = index + 1 == stages.len();
        session.update_settings(*stage)?;
        info!("Stage {}/{}: {}", index + 1, stages.len(), stage);
        if config.json_output {
            JsonMessage::Stage {
                index,
                stage: JsonStage::from(stage),
            }
            .emit();
        }

        let outcome = run_stage(session, codec, config.json_output).await?;
        summary.stages_run += 1;

        let stopped = outcome == RunOutcome::Cancelled || interrupted.load(Ordering::SeqCst);
        unwritten = !(config.save_stages || is_last || stopped);
        if !unwritten {
            write_outputs(session, output_dir, config.save_stages, config.json_output, summary)
                .await?;
        }
        if stopped {
            warn!("Interrupted during stage {}", index + 1);
            break;
        }
    }
    Ok(())
}

/// Run one stage with a progress listener attached.
async fn run_stage(session: &BatchSession, codec: &JpegCodec, json: bool) -> Result<RunOutcome> {
    let events = session.subscribe();
    let Some(token) = session.start() else {
        info!("Every image already matches this stage");
        return Ok(RunOutcome::NothingToDo);
    };

    let listener = if json {
        let mut reporter = JsonReporter::new();
        tokio::spawn(follow_events(events, move |event| reporter.handle(event)))
    } else {
        let mut progress = ProgressManager::new(session.selected_count() as u64);
        tokio::spawn(follow_events(events, move |event| progress.handle(event)))
    };

    let outcome = session.drive(codec, token).await;
    match outcome {
        Ok(RunOutcome::Cancelled) => listener.abort(),
        _ => listener.await?,
    }
    Ok(outcome?)
}

/// Write every processed image; `tagged` adds the baked stage to the file name.
async fn write_outputs(
    session: &BatchSession,
    output_dir: &Path,
    tagged: bool,
    json: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    for item in session.items() {
        if item.current_iterations == 0 {
            continue;
        }
        let stage = item
            .current_quality
            .filter(|_| tagged)
            .map(|quality| (item.current_iterations, quality));
        let file_name = FileManager::output_name(&item.name, stage);
        let path = FileManager::write_output(output_dir, &file_name, item.processed.clone()).await?;

        let size = item.processed.len() as u64;
        summary.add_written(item.original.len() as u64, size);
        if json {
            JsonMessage::Saved { path, size }.emit();
        } else {
            info!("Saved {} ({})", path.display(), FileManager::format_size(size));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use jpegifier::{BatchEvent, NewImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png(shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([shade, 90, 200]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn session() -> BatchSession {
        let session = BatchSession::new(&Config::default());
        session
            .ingest(vec![NewImage::new("a.png", png(10)), NewImage::new("b.png", png(240))])
            .unwrap();
        session
    }

    fn stages() -> Vec<ProcessorSettings> {
        vec![
            ProcessorSettings::new(1, 0.5).unwrap(),
            ProcessorSettings::new(3, 0.5).unwrap(),
        ]
    }

    fn written(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_all_stages_write_final_result() {
        let session = session();
        let out = TempDir::new().unwrap();
        let mut summary = RunSummary::new();

        run_stages(
            &session,
            &JpegCodec::new(),
            &stages(),
            &Config::default(),
            out.path(),
            &AtomicBool::new(false),
            &mut summary,
        )
        .await
        .unwrap();

        assert_eq!(summary.stages_run, 2);
        assert_eq!(summary.files_written, 2);
        assert_eq!(written(out.path()), vec!["jpegified_a.jpg", "jpegified_b.jpg"]);
        assert!(session.items().iter().all(|item| item.current_iterations == 3));
    }

    #[tokio::test]
    async fn test_interrupt_outside_a_run_starts_nothing() {
        let session = session();
        let out = TempDir::new().unwrap();
        let mut summary = RunSummary::new();

        // Ctrl-C lands while no run is active
        let interrupted = AtomicBool::new(false);
        interrupted.store(true, Ordering::SeqCst);
        session.stop();

        run_stages(
            &session,
            &JpegCodec::new(),
            &stages(),
            &Config::default(),
            out.path(),
            &interrupted,
            &mut summary,
        )
        .await
        .unwrap();

        assert_eq!(summary.stages_run, 0);
        assert!(written(out.path()).is_empty());
        assert!(session.items().iter().all(|item| item.current_iterations == 0));
    }

    #[tokio::test]
    async fn test_interrupt_between_stages_writes_baked_result() {
        let session = session();
        let out = TempDir::new().unwrap();
        let mut summary = RunSummary::new();
        let interrupted = Arc::new(AtomicBool::new(false));

        // raise the flag once the first stage has completed
        let mut events = session.subscribe();
        let flag = Arc::clone(&interrupted);
        let watcher = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if matches!(event, BatchEvent::RunCompleted { .. }) {
                    flag.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });

        run_stages(
            &session,
            &JpegCodec::new(),
            &stages(),
            &Config::default(),
            out.path(),
            &interrupted,
            &mut summary,
        )
        .await
        .unwrap();
        watcher.await.unwrap();

        assert_eq!(summary.stages_run, 1);
        assert_eq!(written(out.path()), vec!["jpegified_a.jpg", "jpegified_b.jpg"]);
        assert!(session.items().iter().all(|item| item.current_iterations == 1));
    }
}
