//! # Task Optimizer Module
//!
//! Worker per la compressione di un singolo file.
//!
//! ## Stati per file:
//! `Pending → Compressing → {Skipped, Kept, Discarded, Swapped, Errored}`
//!
//! ## Politica dimensione (`decide`):
//! - risultato più piccolo, oppure `keep_if_larger`: accettato
//!   (`Kept` in modalità mirrored, `Swapped` in overwrite)
//! - altrimenti `Discarded` con una di due politiche:
//!   - `RestoreOriginalCopy` (mirrored): l'originale viene copiato nella destinazione
//!   - `LeaveOriginalUntouched` (overwrite): lo staging file viene eliminato
//!
//! Qualsiasi errore dopo `Pending` viene catturato al confine del file:
//! l'eventuale output parziale viene eliminato e il file risulta `Errored`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::CompressError,
    file_manager::{FileManager, MediaType},
    optimizer::{path_resolver::PathResolver, MediaProcessor},
    stats::{FileRecord, Outcome, OutcomeUpdate},
};

/// What happens to a result that is not smaller than its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardPolicy {
    /// Mirrored mode: the destination receives a copy of the original
    RestoreOriginalCopy,
    /// Overwrite mode: the staging file is dropped, the original stays
    LeaveOriginalUntouched,
}

/// Result of the size comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    Keep,
    Swap,
    Discard(DiscardPolicy),
}

/// Size policy: accept when smaller or when larger results are allowed
pub fn decide(original_size: u64, result_size: u64, keep_if_larger: bool, overwrite: bool) -> SizeDecision {
    let accepted = result_size < original_size || keep_if_larger;
    match (accepted, overwrite) {
        (true, false) => SizeDecision::Keep,
        (true, true) => SizeDecision::Swap,
        (false, false) => SizeDecision::Discard(DiscardPolicy::RestoreOriginalCopy),
        (false, true) => SizeDecision::Discard(DiscardPolicy::LeaveOriginalUntouched),
    }
}

/// Per-file lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Compressing,
    Skipped,
    Kept,
    Discarded(DiscardPolicy),
    Swapped,
    Errored,
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileState::Pending | FileState::Compressing)
    }

    /// Counter bucket of a terminal state
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            FileState::Pending | FileState::Compressing => None,
            FileState::Skipped | FileState::Discarded(DiscardPolicy::LeaveOriginalUntouched) => Some(Outcome::Skipped),
            FileState::Kept | FileState::Swapped | FileState::Discarded(DiscardPolicy::RestoreOriginalCopy) => {
                Some(Outcome::Processed)
            }
            FileState::Errored => Some(Outcome::Error),
        }
    }
}

impl From<SizeDecision> for FileState {
    fn from(decision: SizeDecision) -> Self {
        match decision {
            SizeDecision::Keep => FileState::Kept,
            SizeDecision::Swap => FileState::Swapped,
            SizeDecision::Discard(policy) => FileState::Discarded(policy),
        }
    }
}

/// Outcome of one file, ready for the statistics tracker
#[derive(Debug, Clone)]
pub struct FileReport {
    pub state: FileState,
    pub original_size: u64,
    pub compressed_size: u64,
    pub saved: i64,
    pub media_type: Option<MediaType>,
    pub extension: Option<String>,
    /// Seconds spent on the file
    pub processing_time: f64,
    pub note: Option<String>,
}

impl FileReport {
    fn new(state: FileState, original_size: u64, compressed_size: u64) -> Self {
        Self {
            state,
            original_size,
            compressed_size,
            saved: original_size as i64 - compressed_size as i64,
            media_type: None,
            extension: None,
            processing_time: 0.0,
            note: None,
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome().unwrap_or(Outcome::Error)
    }

    pub fn update(&self) -> OutcomeUpdate<'_> {
        OutcomeUpdate {
            outcome: self.outcome(),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            saved: self.saved,
            media_type: self.media_type,
            extension: self.extension.as_deref(),
        }
    }

    pub fn into_record(self, name: String) -> FileRecord {
        let outcome = self.outcome();
        let compression_ratio = if outcome == Outcome::Error {
            0.0
        } else {
            FileManager::calculate_reduction(self.original_size, self.compressed_size)
        };

        FileRecord {
            name,
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            space_saved: self.saved,
            compression_ratio,
            processing_time: self.processing_time,
            status: outcome.into(),
            media_type: self.media_type,
            extension: self.extension,
            note: self.note,
        }
    }
}

/// Worker per elaborazione singoli file
pub struct TaskOptimizer {
    config: Config,
    target_root: PathBuf,
    video_processor: Box<dyn MediaProcessor>,
    image_processor: Box<dyn MediaProcessor>,
}

impl TaskOptimizer {
    pub fn new(
        config: Config,
        video_processor: Box<dyn MediaProcessor>,
        image_processor: Box<dyn MediaProcessor>,
    ) -> Self {
        let target_root = config.target_root();
        Self {
            config,
            target_root,
            video_processor,
            image_processor,
        }
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    fn convert_images(&self) -> bool {
        !self.config.preserve_format
    }

    /// Processa un singolo file; gli errori non escono mai da qui
    pub async fn process_file(&self, input: &Path, original_size: u64) -> FileReport {
        let started = Instant::now();
        let media_type = MediaType::from_path(input);
        let extension = FileManager::extension_of(input);

        let mut partial: Option<PathBuf> = None;
        let result = self.advance(input, original_size, media_type, &mut partial).await;

        let mut report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!("❌ Failed to compress {}: {:#}", input.display(), e);
                if let Some(ref path) = partial {
                    Self::remove_partial(path).await;
                }
                FileReport {
                    saved: 0,
                    ..FileReport::new(FileState::Errored, original_size, 0)
                }
                .with_note(format!("{:#}", e))
            }
        };

        report.media_type = media_type;
        report.extension = extension;
        report.processing_time = started.elapsed().as_secs_f64();
        debug!("{} -> {:?}", input.display(), report.state);
        report
    }

    async fn remove_partial(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed partial output {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
        }
    }

    /// Drive one file from `Pending` to a terminal state
    async fn advance(
        &self,
        input: &Path,
        original_size: u64,
        media_type: Option<MediaType>,
        partial: &mut Option<PathBuf>,
    ) -> Result<FileReport> {
        let media_type = media_type.ok_or_else(|| {
            CompressError::UnsupportedFormat(format!("Unsupported file type: {}", input.display()))
        })?;

        let overwrite = self.config.overwrite;
        let output = PathResolver::determine_output_path(
            input,
            &self.config.source_folder,
            &self.target_root,
            overwrite,
            self.convert_images(),
        )
        .await?;

        if !overwrite && !self.config.force && output.exists() {
            debug!("[SKIP] Output already exists: {}", output.display());
            return Ok(FileReport::new(FileState::Skipped, original_size, original_size).with_note("output exists"));
        }

        let promotion_target = if overwrite {
            let target = PathResolver::promotion_target(input, self.convert_images())?;
            // A case-only rename resolves to the input itself on some filesystems
            let replaces_input = target == input || FileManager::same_file(input, &target);
            if !replaces_input && target.exists() {
                return Err(Self::already_exists("conversion target", &target));
            }
            if output.exists() {
                return Err(Self::already_exists("staging file", &output));
            }
            Some((target, replaces_input))
        } else {
            None
        };

        // Captured before the encoder touches the file
        let original_times = if overwrite {
            match FileManager::read_timestamps(input) {
                Ok(times) => Some(times),
                Err(e) => {
                    warn!("Failed to read timestamps of {}: {}", input.display(), e);
                    None
                }
            }
        } else {
            None
        };

        *partial = Some(output.clone());
        debug!("{} -> {:?}", input.display(), FileState::Compressing);

        let processor = match media_type {
            MediaType::Video => &self.video_processor,
            MediaType::Image => &self.image_processor,
        };
        processor.compress(input, &output).await?;

        let result_size = fs::metadata(&output).await?.len();
        let decision = decide(original_size, result_size, self.config.keep_if_larger, overwrite);

        let report = match decision {
            SizeDecision::Keep => {
                *partial = None;
                if self.config.preserve_timestamps {
                    FileManager::preserve_timestamps(input, &output);
                }
                Self::accepted(decision, original_size, result_size)
            }
            SizeDecision::Swap => {
                let (target, replaces_input) = promotion_target.unwrap_or_else(|| (input.to_path_buf(), true));
                FileManager::promote_temp_to_original(&target, &output).await?;
                *partial = None;

                if let Some(ref times) = original_times {
                    FileManager::apply_timestamps(&target, times);
                }
                if !replaces_input {
                    if let Err(e) = fs::remove_file(input).await {
                        warn!("Failed to remove converted original {}: {}", input.display(), e);
                    }
                }
                Self::accepted(decision, original_size, result_size)
            }
            SizeDecision::Discard(DiscardPolicy::RestoreOriginalCopy) => {
                fs::remove_file(&output).await?;
                FileManager::copy_preserving(input, &output).await?;
                *partial = None;
                info!(
                    "Result for {} not smaller ({} >= {}), copied original",
                    input.display(),
                    result_size,
                    original_size
                );
                FileReport::new(decision.into(), original_size, original_size).with_note("copied original")
            }
            SizeDecision::Discard(DiscardPolicy::LeaveOriginalUntouched) => {
                fs::remove_file(&output).await?;
                *partial = None;
                info!(
                    "Result for {} not smaller ({} >= {}), original left untouched",
                    input.display(),
                    result_size,
                    original_size
                );
                FileReport::new(decision.into(), original_size, original_size).with_note("result not smaller")
            }
        };

        Ok(report)
    }

    fn already_exists(what: &str, path: &Path) -> anyhow::Error {
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} {} already exists", what, path.display()),
        )
        .into()
    }

    fn accepted(decision: SizeDecision, original_size: u64, result_size: u64) -> FileReport {
        let report = FileReport::new(decision.into(), original_size, result_size);
        if result_size >= original_size {
            report.with_note("kept larger result")
        } else {
            report
        }
    }
}
