//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione di una singola esecuzione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione dei parametri (`validate_*` singoli + `Config::validate`)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri principali:
//! - `video_crf`: CRF video (0-51, default: 23, più basso = migliore qualità)
//! - `video_preset`: preset x264 (default: "medium")
//! - `image_quality`: Qualità immagini (0-100, default: 100)
//! - `image_resize`: Ridimensionamento immagini in percentuale (1-100)
//! - `video_resolution`: Risoluzione target ("1920x1080", "720p", "4k", ...)
//! - `overwrite`: Sostituisce gli originali tramite staging file
//! - `keep_if_larger`: Accetta anche risultati più grandi dell'originale
//! - `output_dir`: Directory di output (default: `<source>/compressed`)
//!
//! ## Validazione:
//! - Range di CRF, qualità e resize
//! - Preset tra quelli supportati da x264
//! - `output_dir` diversa dalla sorgente e incompatibile con `overwrite`
//! - `min_size <= max_size`
//!
//! ## Esempio:
//! ```rust
//! use media_compactor::Config;
//!
//! let config = Config {
//!     video_crf: 28,
//!     recursive: true,
//!     ..Config::new("/path/to/media")
//! };
//! assert!(config.validate().is_ok());
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CompressError;
use crate::utils::parse_resolution;

/// x264 presets accepted by `video_preset`
pub const VIDEO_PRESETS: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Default name of the mirrored output tree, created inside the source folder
pub const DEFAULT_OUTPUT_FOLDER: &str = "compressed";

/// Configuration for one compaction run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder containing the media to compress
    pub source_folder: PathBuf,
    /// Video CRF value (0-51, lower = better quality)
    pub video_crf: u8,
    /// x264 preset
    pub video_preset: String,
    /// Target video resolution
    pub video_resolution: Option<String>,
    /// Image quality (0-100)
    pub image_quality: u8,
    /// Image resize percentage (1-100)
    pub image_resize: Option<u8>,
    /// Walk the whole subtree instead of the direct children only
    pub recursive: bool,
    /// Replace originals in place
    pub overwrite: bool,
    /// Recompress even if the destination already exists
    pub force: bool,
    /// Explicit FFmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Seconds between encoder progress lines
    pub progress_interval: f64,
    /// Accept results that are not smaller than the original
    pub keep_if_larger: bool,
    /// Copy the whole source tree here before touching anything
    pub backup_dir: Option<PathBuf>,
    /// Keep image formats instead of converting to JPEG
    pub preserve_format: bool,
    /// Copy source timestamps onto mirrored outputs (default: on)
    pub preserve_timestamps: bool,
    /// Ignore files smaller than this many bytes
    pub min_size: Option<u64>,
    /// Ignore files larger than this many bytes
    pub max_size: Option<u64>,
    /// Mirrored output root (None = `<source>/compressed`)
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_folder: PathBuf::from("."),
            video_crf: 23,
            video_preset: "medium".to_string(),
            video_resolution: None,
            image_quality: 100,
            image_resize: None,
            recursive: false,
            overwrite: false,
            force: false,
            ffmpeg_path: None,
            progress_interval: 5.0,
            keep_if_larger: false,
            backup_dir: None,
            preserve_format: false,
            preserve_timestamps: true,
            min_size: None,
            max_size: None,
            output_dir: None,
        }
    }
}

impl Config {
    /// Default configuration for a given source folder
    pub fn new(source_folder: impl Into<PathBuf>) -> Self {
        Self {
            source_folder: source_folder.into(),
            ..Self::default()
        }
    }

    /// Root of the mirrored output tree
    pub fn target_root(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.source_folder.join(DEFAULT_OUTPUT_FOLDER))
    }

    /// Progress interval as a `Duration`, falling back to 5s when out of range
    pub fn progress_interval_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.progress_interval).unwrap_or(Duration::from_secs(5))
    }

    /// Validate configuration parameters, failing on the first violation
    pub fn validate(&self) -> Result<()> {
        validate_video_crf(self.video_crf)?;
        validate_image_quality(self.image_quality)?;
        validate_video_preset(&self.video_preset)?;
        validate_image_resize(self.image_resize)?;
        validate_video_resolution(self.video_resolution.as_deref())?;
        validate_progress_interval(self.progress_interval)?;
        validate_size_range(self.min_size, self.max_size)?;
        validate_output_dir(&self.source_folder, self.output_dir.as_deref(), self.overwrite)?;
        Ok(())
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
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn invalid(message: String) -> anyhow::Error {
    CompressError::Validation(message).into()
}

pub fn validate_video_crf(video_crf: u8) -> Result<()> {
    if video_crf > 51 {
        return Err(invalid(format!("video_crf must be between 0 and 51, got {}", video_crf)));
    }
    Ok(())
}

pub fn validate_image_quality(image_quality: u8) -> Result<()> {
    if image_quality > 100 {
        return Err(invalid(format!(
            "image_quality must be between 0 and 100, got {}",
            image_quality
        )));
    }
    Ok(())
}

pub fn validate_video_preset(video_preset: &str) -> Result<()> {
    if !VIDEO_PRESETS.contains(&video_preset) {
        return Err(invalid(format!(
            "video_preset must be one of {:?}, got {}",
            VIDEO_PRESETS, video_preset
        )));
    }
    Ok(())
}

pub fn validate_image_resize(image_resize: Option<u8>) -> Result<()> {
    match image_resize {
        Some(resize) if !(1..=100).contains(&resize) => Err(invalid(format!(
            "image_resize must be between 1 and 100, got {}",
            resize
        ))),
        _ => Ok(()),
    }
}

pub fn validate_video_resolution(video_resolution: Option<&str>) -> Result<()> {
    if let Some(resolution) = video_resolution {
        parse_resolution(resolution)?;
    }
    Ok(())
}

pub fn validate_progress_interval(progress_interval: f64) -> Result<()> {
    if !progress_interval.is_finite() || progress_interval <= 0.0 {
        return Err(invalid(format!(
            "progress_interval must be a positive number of seconds, got {}",
            progress_interval
        )));
    }
    Ok(())
}

pub fn validate_size_range(min_size: Option<u64>, max_size: Option<u64>) -> Result<()> {
    if let (Some(min), Some(max)) = (min_size, max_size) {
        if min > max {
            return Err(invalid(format!(
                "min_size ({}) cannot be greater than max_size ({})",
                min, max
            )));
        }
    }
    Ok(())
}

pub fn validate_output_dir(source: &Path, output_dir: Option<&Path>, overwrite: bool) -> Result<()> {
    let Some(output_dir) = output_dir else {
        return Ok(());
    };

    if overwrite {
        return Err(invalid(
            "output_dir cannot be combined with overwrite mode".to_string(),
        ));
    }

    let same = match (source.canonicalize(), output_dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == output_dir,
    };
    if same {
        return Err(invalid(format!(
            "output_dir must differ from the source folder: {}",
            output_dir.display()
        )));
    }

    Ok(())
}
