//! # Media Compactor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento opzionale della configurazione da file JSON
//! - Creazione della configurazione e avvio dell'optimizer
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (cartella, crf, qualità, overwrite, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` ha la precedenza)
//! 3. Carica `--config` se presente e applica sopra gli argomenti espliciti
//! 4. Istanzia MediaOptimizer e avvia la compressione
//! 5. Stampa il riepilogo delle statistiche
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-compactor /path/to/media --crf 28 --quality 80 --recursive --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_compactor::utils::{parse_resolution, parse_size};
use media_compactor::{Config, MediaOptimizer};

#[derive(Parser)]
#[command(name = "media-compactor")]
#[command(about = "Compress videos and images with FFmpeg, keeping only smaller results")]
struct Args {
    /// Directory containing media files to compress
    source_folder: PathBuf,

    /// Video CRF value (0-51, lower = better quality)
    #[arg(long)]
    crf: Option<u8>,

    /// x264 preset (ultrafast ... veryslow)
    #[arg(long)]
    preset: Option<String>,

    /// Target video resolution ("1920x1080", "720p", "4k", ...)
    #[arg(long, value_parser = check_resolution)]
    resolution: Option<String>,

    /// Image quality (0-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Resize images to this percentage of their size (1-100)
    #[arg(long)]
    resize: Option<u8>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Replace originals in place
    #[arg(long)]
    overwrite: bool,

    /// Recompress even when the output already exists
    #[arg(short, long)]
    force: bool,

    /// Keep compressed results even when larger than the original
    #[arg(long)]
    keep_if_larger: bool,

    /// Keep images in their original format instead of converting to JPEG
    #[arg(long)]
    preserve_format: bool,

    /// Do not copy timestamps from originals onto mirrored outputs
    #[arg(long)]
    no_preserve_timestamps: bool,

    /// Copy the source folder here before processing
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Output directory (default: <source>/compressed)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip files smaller than this ("500KB", "10MB", ...)
    #[arg(long, value_parser = parse_size)]
    min_size: Option<u64>,

    /// Skip files larger than this ("500KB", "10MB", ...)
    #[arg(long, value_parser = parse_size)]
    max_size: Option<u64>,

    /// Path to the FFmpeg binary
    #[arg(long)]
    ffmpeg_path: Option<PathBuf>,

    /// Seconds between encoder progress lines
    #[arg(long)]
    progress_interval: Option<f64>,

    /// Load base settings from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn check_resolution(value: &str) -> Result<String> {
    parse_resolution(value)?;
    Ok(value.to_string())
}

impl Args {
    /// Apply explicit CLI values on top of `base`
    fn into_config(self, base: Config) -> Config {
        Config {
            source_folder: self.source_folder,
            video_crf: self.crf.unwrap_or(base.video_crf),
            video_preset: self.preset.unwrap_or(base.video_preset),
            video_resolution: self.resolution.or(base.video_resolution),
            image_quality: self.quality.unwrap_or(base.image_quality),
            image_resize: self.resize.or(base.image_resize),
            recursive: self.recursive || base.recursive,
            overwrite: self.overwrite || base.overwrite,
            force: self.force || base.force,
            ffmpeg_path: self.ffmpeg_path.or(base.ffmpeg_path),
            progress_interval: self.progress_interval.unwrap_or(base.progress_interval),
            keep_if_larger: self.keep_if_larger || base.keep_if_larger,
            backup_dir: self.backup_dir.or(base.backup_dir),
            preserve_format: self.preserve_format || base.preserve_format,
            preserve_timestamps: base.preserve_timestamps && !self.no_preserve_timestamps,
            min_size: self.min_size.or(base.min_size),
            max_size: self.max_size.or(base.max_size),
            output_dir: self.output.or(base.output_dir),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let base = match args.config {
        Some(ref path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path).await?
        }
        None => Config::default(),
    };
    let config = args.into_config(base);

    let stats = MediaOptimizer::new(config)?.run().await?;

    info!("{}", stats.format_summary());
    if stats.counters().errors > 0 {
        warn!("{} files failed, see the log above", stats.counters().errors);
    }

    Ok(())
}
