//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare gli errori possibili
//! - Distingue errori di configurazione, errori per singolo file ed errori infrastrutturali
//! - Integra con `thiserror` per automatic error conversion
//! - Gli errori viaggiano dentro `anyhow::Error` e vengono riconosciuti con `downcast_ref`
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Encoder`: FFmpeg terminato con exit code diverso da zero
//! - `EncoderNotFound`: binario FFmpeg non trovato
//! - `UnsupportedFormat`: Formato file non supportato
//! - `Validation`: Parametri di configurazione non validi
//! - `SourceMissing`: cartella sorgente inesistente
//! - `Backup`: errore durante la copia di backup
//!
//! ## Esempio:
//! ```rust,ignore
//! if !source.exists() {
//!     return Err(CompressError::SourceMissing(source.to_path_buf()).into());
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for media compaction
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg exited with {}: {stderr}", describe_exit(.code))]
    Encoder { code: Option<i32>, stderr: String },

    #[error("FFmpeg not found: {0}")]
    EncoderNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Source folder does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Backup failed: {0}")]
    Backup(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_error_message() {
        let err = CompressError::Encoder {
            code: Some(1),
            stderr: "Invalid data found".to_string(),
        };
        assert_eq!(err.to_string(), "FFmpeg exited with code 1: Invalid data found");

        let killed = CompressError::Encoder { code: None, stderr: String::new() };
        assert!(killed.to_string().contains("a signal"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = CompressError::Validation("video_crf".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::Validation(_))
        ));
    }
}
