//! # Video Processing Module
//!
//! Questo modulo gestisce la compressione di tutti i formati video supportati.
//!
//! ## Responsabilità:
//! - Compressione video con FFmpeg (libx264 + AAC)
//! - Controllo qualità tramite CRF (Constant Rate Factor)
//! - Ridimensionamento opzionale alla risoluzione target
//! - Preservazione dei metadata del container (`-map_metadata 0`)
//!
//! ## Formati supportati:
//! - **Input**: MP4, MOV, MKV, AVI
//! - **Output**: stesso container dell'input
//!
//! ## Controllo qualità (CRF):
//! - 0-17: Visualmente lossless (file grandi)
//! - 18-23: Alta qualità (default 23)
//! - 24-28: Buona qualità, bilanciato
//! - 29+: File piccoli, qualità in calo
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new(&config, executor.clone());
//! processor.compress(&input, &output).await?;
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::args;
use crate::config::Config;
use crate::executor::FfmpegExecutor;
use crate::optimizer::MediaProcessor;
use crate::utils::parse_resolution;

const AUDIO_BITRATE: &str = "128k";

/// Video compressor driving FFmpeg
pub struct VideoProcessor {
    executor: Arc<FfmpegExecutor>,
    crf: u8,
    preset: String,
    resolution: Option<(u32, u32)>,
    progress_interval: Duration,
}

impl VideoProcessor {
    /// Build from a validated configuration
    pub fn new(config: &Config, executor: Arc<FfmpegExecutor>) -> Result<Self> {
        let resolution = config
            .video_resolution
            .as_deref()
            .map(parse_resolution)
            .transpose()?;

        Ok(Self {
            executor,
            crf: config.video_crf,
            preset: config.video_preset.clone(),
            resolution,
            progress_interval: config.progress_interval_duration(),
        })
    }

    /// FFmpeg arguments for one video
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = args!["-i", input.display()];

        if let Some((width, height)) = self.resolution {
            args.extend(args!["-vf", format!("scale={}:{}", width, height)]);
        }

        args.extend(args!["-vcodec", "libx264", "-crf", self.crf, "-preset", self.preset]);
        args.extend(args!["-acodec", "aac", "-b:a", AUDIO_BITRATE]);
        args.extend(args!["-map_metadata", "0", "-y", output.display()]);
        args
    }
}

#[async_trait]
impl MediaProcessor for VideoProcessor {
    async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.build_args(input, output);
        let display_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.executor
            .run_with_progress(&args, self.progress_interval, &display_name)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(config: &Config) -> VideoProcessor {
        VideoProcessor::new(config, Arc::new(FfmpegExecutor::with_path("ffmpeg"))).unwrap()
    }

    #[test]
    fn test_default_args() {
        let config = Config::new("/media");
        let args = processor(&config).build_args(Path::new("/media/in.mp4"), Path::new("/out/in.mp4"));

        assert_eq!(
            args,
            vec![
                "-i", "/media/in.mp4", "-vcodec", "libx264", "-crf", "23", "-preset", "medium", "-acodec",
                "aac", "-b:a", "128k", "-map_metadata", "0", "-y", "/out/in.mp4",
            ]
        );
    }

    #[test]
    fn test_resolution_and_quality_knobs() {
        let config = Config {
            video_crf: 30,
            video_preset: "veryslow".to_string(),
            video_resolution: Some("720p".to_string()),
            ..Config::new("/media")
        };
        let args = processor(&config).build_args(Path::new("in.mov"), Path::new("out.mov"));

        assert_eq!(&args[2..4], &["-vf", "scale=1280:720"]);
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "30");
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "veryslow");
        assert_eq!(args.last().unwrap(), "out.mov");
    }

    #[test]
    fn test_invalid_resolution_fails_construction() {
        let config = Config {
            video_resolution: Some("huge".to_string()),
            ..Config::new("/media")
        };
        assert!(VideoProcessor::new(&config, Arc::new(FfmpegExecutor::with_path("ffmpeg"))).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compress_propagates_encoder_failure() {
        // `false` from PATH ignores its arguments and exits 1
        let executor = Arc::new(FfmpegExecutor::with_path("false"));
        let processor = VideoProcessor::new(&Config::new("/media"), executor).unwrap();

        let err = processor
            .compress(Path::new("in.mp4"), Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::CompressError>(),
            Some(crate::error::CompressError::Encoder { code: Some(1), .. })
        ));
    }
}
