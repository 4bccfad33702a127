//! # Run Statistics Module
//!
//! Questo modulo accumula le statistiche di una singola esecuzione.
//!
//! ## Responsabilità:
//! - Contatori globali (file totali, processati, saltati, errori, byte)
//! - Contatori per tipo (video/immagini) e per formato (estensione)
//! - Bucket per cartella quando la scansione è ricorsiva
//! - Lista ordinata dei record per file
//!
//! ## Regole di accumulo:
//! - `processed` e `skipped` sommano dimensione compressa e byte risparmiati
//! - `error` non somma né dimensione compressa né risparmio
//! - I contatori per tipo sommano sempre la dimensione originale
//! - Il breakdown per formato viene aggiornato solo per `processed`
//!
//! Ogni aggiornamento passa da un'unica funzione applicata al bucket globale
//! e, se presente, al bucket della cartella: la somma dei bucket per cartella
//! coincide sempre con il totale globale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::file_manager::{FileManager, MediaType};

/// Folder key used for top-level files
pub const ROOT_FOLDER: &str = "root";

/// Outcome of one file as seen by the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Processed,
    Skipped,
    Error,
}

/// Status stored in a per-file record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Skipped,
    Error,
}

impl From<Outcome> for FileStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Processed => FileStatus::Success,
            Outcome::Skipped => FileStatus::Skipped,
            Outcome::Error => FileStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total_files: u64,
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total_original_size: u64,
    pub total_compressed_size: u64,
    pub space_saved: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounters {
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub space_saved: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatStats {
    pub count: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub space_saved: i64,
}

/// One entry of the per-file list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the source root
    pub name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub space_saved: i64,
    /// Percentage saved, negative when the result grew
    pub compression_ratio: f64,
    /// Seconds spent on this file
    pub processing_time: f64,
    pub status: FileStatus,
    pub media_type: Option<MediaType>,
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Sizes and classification of one finished file
#[derive(Debug, Clone, Copy)]
pub struct OutcomeUpdate<'a> {
    pub outcome: Outcome,
    pub original_size: u64,
    pub compressed_size: u64,
    pub saved: i64,
    pub media_type: Option<MediaType>,
    pub extension: Option<&'a str>,
}

/// Counters for one scope (the whole run or a single folder)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBucket {
    #[serde(flatten)]
    pub counters: Counters,
    pub videos: TypeCounters,
    pub images: TypeCounters,
    pub format_stats: BTreeMap<String, FormatStats>,
    pub files: Vec<FileRecord>,
}

impl StatsBucket {
    fn register(&mut self, size: u64) {
        self.counters.total_files += 1;
        self.counters.total_original_size += size;
    }

    fn apply(&mut self, update: &OutcomeUpdate<'_>) {
        let counts_result = update.outcome != Outcome::Error;

        match update.outcome {
            Outcome::Processed => self.counters.processed += 1,
            Outcome::Skipped => self.counters.skipped += 1,
            Outcome::Error => self.counters.errors += 1,
        }
        if counts_result {
            self.counters.total_compressed_size += update.compressed_size;
            self.counters.space_saved += update.saved;
        }

        if let Some(media_type) = update.media_type {
            let by_type = match media_type {
                MediaType::Video => &mut self.videos,
                MediaType::Image => &mut self.images,
            };
            match update.outcome {
                Outcome::Processed => by_type.processed += 1,
                Outcome::Skipped => by_type.skipped += 1,
                Outcome::Error => by_type.errors += 1,
            }
            by_type.original_size += update.original_size;
            if counts_result {
                by_type.compressed_size += update.compressed_size;
                by_type.space_saved += update.saved;
            }
        }

        if update.outcome == Outcome::Processed {
            if let Some(extension) = update.extension {
                let format = self.format_stats.entry(extension.to_lowercase()).or_default();
                format.count += 1;
                format.original_size += update.original_size;
                format.compressed_size += update.compressed_size;
                format.space_saved += update.saved;
            }
        }
    }
}

/// Aggregated result of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(flatten)]
    pub totals: StatsBucket,
    /// Present only when folders are tracked
    pub folder_stats: Option<BTreeMap<String, StatsBucket>>,
    /// Wall-clock seconds for the whole run
    pub total_processing_time: f64,
}

impl RunStats {
    pub fn counters(&self) -> &Counters {
        &self.totals.counters
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.totals.files
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        let counters = self.counters();
        if counters.total_original_size > 0 {
            (counters.space_saved as f64 / counters.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        let counters = self.counters();
        let saved = if counters.space_saved >= 0 {
            FileManager::format_size(counters.space_saved as u64)
        } else {
            format!("-{}", FileManager::format_size(counters.space_saved.unsigned_abs()))
        };
        format!(
            "Files: {} | Processed: {} | Skipped: {} | Errors: {} | Total saved: {} ({:.2}%) in {:.1}s",
            counters.total_files,
            counters.processed,
            counters.skipped,
            counters.errors,
            saved,
            self.overall_reduction_percent(),
            self.total_processing_time
        )
    }
}

/// In-memory statistics for one run
#[derive(Debug)]
pub struct StatisticsTracker {
    stats: RunStats,
}

impl StatisticsTracker {
    pub fn new(track_folders: bool) -> Self {
        Self {
            stats: RunStats {
                folder_stats: track_folders.then(BTreeMap::new),
                ..Default::default()
            },
        }
    }

    pub fn tracks_folders(&self) -> bool {
        self.stats.folder_stats.is_some()
    }

    fn folder_bucket(&mut self, folder: Option<&str>) -> Option<&mut StatsBucket> {
        let folders = self.stats.folder_stats.as_mut()?;
        Some(folders.entry(folder?.to_string()).or_default())
    }

    pub fn register_candidate(&mut self, size: u64, folder: Option<&str>) {
        self.stats.totals.register(size);
        if let Some(bucket) = self.folder_bucket(folder) {
            bucket.register(size);
        }
    }

    pub fn record_outcome(&mut self, update: &OutcomeUpdate<'_>, folder: Option<&str>) {
        self.stats.totals.apply(update);
        if let Some(bucket) = self.folder_bucket(folder) {
            bucket.apply(update);
        }
    }

    pub fn append_file_record(&mut self, record: FileRecord, folder: Option<&str>) {
        if let Some(bucket) = self.folder_bucket(folder) {
            bucket.files.push(record.clone());
        }
        self.stats.totals.files.push(record);
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Stamp the total run time and hand the stats back
    pub fn finish(mut self, total_processing_time: f64) -> RunStats {
        self.stats.total_processing_time = total_processing_time;
        self.stats
    }
}
