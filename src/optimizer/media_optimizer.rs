//! # Media Optimizer Main Orchestrator
//!
//! Orchestratore principale: valida l'input, esegue il backup opzionale,
//! enumera i file e li passa uno alla volta al `TaskOptimizer`, accumulando
//! le statistiche dell'esecuzione.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    backup::create_backup,
    config::Config,
    error::CompressError,
    executor::FfmpegExecutor,
    file_manager::FileManager,
    image_processor::ImageProcessor,
    optimizer::{path_resolver::PathResolver, task_optimizer::TaskOptimizer, MediaProcessor},
    progress::ProgressManager,
    stats::{Outcome, RunStats, StatisticsTracker},
    video_processor::VideoProcessor,
};

/// Orchestratore principale
pub struct MediaOptimizer {
    config: Config,
    task_optimizer: TaskOptimizer,
    progress: ProgressManager,
}

impl MediaOptimizer {
    /// Validate the configuration, resolve FFmpeg and build both compressors
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let progress = ProgressManager::new();
        let executor = Arc::new(
            FfmpegExecutor::new(config.ffmpeg_path.as_deref())?.with_sink(Arc::new(progress.clone())),
        );
        debug!("Using FFmpeg at {}", executor.ffmpeg_path().display());

        let video = VideoProcessor::new(&config, executor.clone())?;
        let image = ImageProcessor::new(&config, executor);

        Ok(Self::assemble(config, Box::new(video), Box::new(image), progress))
    }

    /// Build with caller-supplied compressors
    pub fn with_processors(
        config: Config,
        video_processor: Box<dyn MediaProcessor>,
        image_processor: Box<dyn MediaProcessor>,
    ) -> Self {
        Self::assemble(config, video_processor, image_processor, ProgressManager::new())
    }

    fn assemble(
        config: Config,
        video_processor: Box<dyn MediaProcessor>,
        image_processor: Box<dyn MediaProcessor>,
        progress: ProgressManager,
    ) -> Self {
        let task_optimizer = TaskOptimizer::new(config.clone(), video_processor, image_processor);
        Self {
            config,
            task_optimizer,
            progress,
        }
    }

    /// Esegue la compressione e ritorna le statistiche
    pub async fn run(&self) -> Result<RunStats> {
        let start_time = Instant::now();
        let source = self.config.source_folder.as_path();

        if !source.is_dir() {
            return Err(CompressError::SourceMissing(source.to_path_buf()).into());
        }
        self.config.validate()?;

        if let Some(ref backup_root) = self.config.backup_dir {
            create_backup(source, backup_root).await?;
        }

        let files = self.collect_files()?;
        let mut tracker = StatisticsTracker::new(self.config.recursive);

        if files.is_empty() {
            info!("No media files found in {}", source.display());
            return Ok(tracker.finish(start_time.elapsed().as_secs_f64()));
        }

        self.log_configuration(files.len());
        if !self.config.overwrite {
            let target_root = self.task_optimizer.target_root();
            tokio::fs::create_dir_all(target_root)
                .await
                .with_context(|| format!("Failed to create output directory {}", target_root.display()))?;
        }

        self.progress.start(files.len() as u64);

        for file_path in &files {
            let folder = PathResolver::folder_key(file_path, source, self.config.recursive);
            let original_size = match tokio::fs::metadata(file_path).await {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Cannot stat {}: {}", file_path.display(), e);
                    0
                }
            };
            tracker.register_candidate(original_size, Some(&folder));

            let report = self.task_optimizer.process_file(file_path, original_size).await;
            tracker.record_outcome(&report.update(), Some(&folder));

            let name = PathResolver::relative_name(file_path, source);
            self.progress.update(&Self::status_message(&name, report.outcome(), report.saved, original_size));
            tracker.append_file_record(report.into_record(name), Some(&folder));
        }

        let stats = tracker.finish(start_time.elapsed().as_secs_f64());
        self.progress.finish(&stats.format_summary());
        Ok(stats)
    }

    /// Candidates in processing order
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let source = self.config.source_folder.as_path();
        // The default mirrored target lives inside the source tree
        let exclude = (!self.config.overwrite).then(|| self.task_optimizer.target_root().to_path_buf());

        let files = FileManager::find_media_files(source, self.config.recursive, exclude.as_deref())?;
        let found = files.len();
        let files = FileManager::apply_size_filters(files, self.config.min_size, self.config.max_size);
        if files.len() != found {
            info!("Size filters kept {} of {} files", files.len(), found);
        }
        Ok(files)
    }

    fn log_configuration(&self, file_count: usize) {
        info!("Starting media compaction in: {}", self.config.source_folder.display());
        if self.config.overwrite {
            info!("Mode: Replace files in place");
        } else {
            info!("Output directory: {}", self.task_optimizer.target_root().display());
            if self.config.force {
                info!("Force mode: existing outputs are recomputed");
            }
        }
        info!(
            "Video: CRF {} preset {} | Images: quality {}{}",
            self.config.video_crf,
            self.config.video_preset,
            self.config.image_quality,
            if self.config.preserve_format { " (original formats)" } else { " (JPEG)" }
        );
        info!("Found {} media files to process", file_count);
    }

    fn status_message(name: &str, outcome: Outcome, saved: i64, original_size: u64) -> String {
        match outcome {
            Outcome::Processed => {
                let percent = if original_size > 0 {
                    saved as f64 / original_size as f64 * 100.0
                } else {
                    0.0
                };
                format!("✅ {}: {:.1}% saved", name, percent)
            }
            Outcome::Skipped => format!("⏭ {}: skipped", name),
            Outcome::Error => format!("❌ {}: failed", name),
        }
    }
}

/// Convenience entry point: build an optimizer for `config` and run it
pub async fn run(config: Config) -> Result<RunStats> {
    MediaOptimizer::new(config)?.run().await
}
