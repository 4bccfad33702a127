//! # Image Processing Module
//!
//! Questo modulo gestisce la compressione delle immagini tramite FFmpeg.
//!
//! ## Responsabilità:
//! - Conversione di tutte le immagini in JPEG (default)
//! - Compressione nel formato originale con `preserve_format`
//! - Ridimensionamento percentuale con filtro lanczos
//! - Rimozione del canale alpha (PNG/WebP → JPEG) con `format=rgb24`
//!
//! ## Mapping qualità (`image_quality` 0-100):
//! - **JPEG**: qualità 1-95, poi scala `-q:v` 2-31 (più basso = migliore)
//! - **PNG**: `-compression_level` 0-9 (zlib)
//! - **WebP**: `-quality` 1-95
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = ImageProcessor::new(&config, executor.clone());
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
use crate::file_manager::FileManager;
use crate::optimizer::MediaProcessor;

/// Map `image_quality` to a JPEG quality in 1..=95
pub fn jpeg_quality(image_quality: u8) -> u8 {
    match image_quality {
        q if q >= 100 => 95,
        q if q >= 95 => q - 5,
        q => ((q as f64 / 94.0) * 90.0).clamp(1.0, 90.0) as u8,
    }
}

/// WebP uses the same curve as JPEG
pub fn webp_quality(image_quality: u8) -> u8 {
    jpeg_quality(image_quality)
}

/// Map a JPEG quality to FFmpeg's `-q:v` scale (2 best, 31 worst)
pub fn jpeg_qscale(jpeg_quality: u8) -> u8 {
    let q = 2.0 + 29.0 * (100.0 - jpeg_quality as f64) / 100.0;
    (q as u8).clamp(2, 31)
}

/// Map `image_quality` to a zlib level for PNG
pub fn png_compression_level(image_quality: u8) -> u8 {
    let quality = image_quality as f64;
    let level = ((9.0 - quality / 100.0 * 9.0) as i32).clamp(0, 9);
    if level >= 6 {
        return level as u8;
    }

    // Low levels barely compress: stretch 80-100 over 6-9 and 0-80 over 0-6
    let level = if image_quality >= 80 {
        (6.0 + (quality - 80.0) / 20.0 * 3.0) as i32
    } else {
        (quality / 80.0 * 6.0) as i32
    };
    level.clamp(0, 9) as u8
}

fn scale_filter(factor: f64) -> String {
    format!("scale=iw*{}:ih*{}:flags=lanczos", factor, factor)
}

/// Image compressor driving FFmpeg
pub struct ImageProcessor {
    executor: Arc<FfmpegExecutor>,
    image_quality: u8,
    image_resize: Option<u8>,
    preserve_format: bool,
    progress_interval: Duration,
}

impl ImageProcessor {
    pub fn new(config: &Config, executor: Arc<FfmpegExecutor>) -> Self {
        Self {
            executor,
            image_quality: config.image_quality,
            image_resize: config.image_resize,
            preserve_format: config.preserve_format,
            progress_interval: config.progress_interval_duration(),
        }
    }

    /// Resize factor, only when actually shrinking
    fn resize_factor(&self) -> Option<f64> {
        self.image_resize
            .filter(|percent| *percent < 100)
            .map(|percent| percent as f64 / 100.0)
    }

    /// FFmpeg arguments for one image
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input_ext = FileManager::extension_of(input).unwrap_or_default();
        let output_ext = FileManager::extension_of(output).unwrap_or_default();
        let mut args = args!["-i", input.display()];

        let converting_to_jpeg = !self.preserve_format && matches!(output_ext.as_str(), "jpg" | "jpeg");

        if converting_to_jpeg {
            let mut filters = Vec::new();
            if matches!(input_ext.as_str(), "png" | "webp") {
                // JPEG has no alpha channel
                filters.push("format=rgb24".to_string());
            }
            if let Some(factor) = self.resize_factor() {
                filters.push(scale_filter(factor));
            }
            if !filters.is_empty() {
                args.extend(args!["-vf", filters.join(",")]);
            }
            args.extend(args!["-q:v", jpeg_qscale(jpeg_quality(self.image_quality))]);
        } else if self.preserve_format {
            match input_ext.as_str() {
                "jpg" | "jpeg" => {
                    args.extend(args!["-q:v", jpeg_qscale(jpeg_quality(self.image_quality))]);
                }
                "png" => {
                    args.extend(args!["-compression_level", png_compression_level(self.image_quality)]);
                }
                "webp" => {
                    args.extend(args!["-quality", webp_quality(self.image_quality)]);
                }
                _ => {
                    args.extend(args!["-q:v", jpeg_qscale(self.image_quality)]);
                }
            }
            if let Some(factor) = self.resize_factor() {
                args.extend(args!["-vf", scale_filter(factor)]);
            }
        }

        args.extend(args!["-y", output.display()]);
        args
    }
}

#[async_trait]
impl MediaProcessor for ImageProcessor {
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
