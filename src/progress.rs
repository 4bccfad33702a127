//! # Progress Display Module
//!
//! Questo modulo gestisce il feedback visuale durante l'esecuzione.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif` per il loop sui file
//! - Messaggio di stato per ogni file completato
//! - Rendering delle righe di progresso di FFmpeg sopra la barra
//!
//! La barra resta nascosta finché `start` non riceve il numero di file:
//! le righe di progresso emesse prima vanno direttamente su stderr.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) ✅ photo.jpg: 45.2% saved
//!   clip.mp4 [Progress] Time: 00:01:10.00 | Frame: 1750 | FPS: 48 | Speed: 1.9x
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::executor::{render_line, EncoderProgress, ProgressSink};

/// Manages progress reporting for one run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a hidden progress manager; call `start` to show it
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Show the bar for `total_files` files
    pub fn start(&self, total_files: u64) {
        self.bar.set_length(total_files);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressManager {
    fn report(&self, display_name: &str, progress: &EncoderProgress) {
        let line = render_line(display_name, progress);
        if self.bar.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.bar.println(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_advances_position() {
        let progress = ProgressManager::new();
        progress.update("✅ a.jpg");
        progress.update("✅ b.jpg");
        assert_eq!(progress.position(), 2);
        progress.finish("done");
    }

    #[test]
    fn test_report_while_hidden_does_not_panic() {
        let progress = ProgressManager::new();
        progress.report("clip.mp4", &EncoderProgress::parse("frame=10").unwrap());
    }
}
