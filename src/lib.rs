//! # Media Compactor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `tool_resolver`: Ricerca del binario FFmpeg
//! - `executor`: Esecuzione di FFmpeg con parsing del progresso
//! - `file_manager`: Operazioni sui file e discovery media
//! - `image_processor`: Compressione immagini (JPEG/PNG/WebP)
//! - `video_processor`: Compressione video (MP4/MOV/MKV/AVI)
//! - `backup`: Copia di sicurezza della sorgente
//! - `stats`: Statistiche aggregate per tipo, formato e cartella
//! - `optimizer`: Orchestratore principale del processo
//! - `progress`: Progress bar e righe di progresso dell'encoder
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use media_compactor::{Config, MediaOptimizer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config {
//!     recursive: true,
//!     ..Config::new("/path/to/media")
//! };
//! let stats = MediaOptimizer::new(config)?.run().await?;
//! println!("{}", stats.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_manager;
pub mod image_processor;
pub mod optimizer;
pub mod progress;
pub mod stats;
pub mod tool_resolver;
pub mod utils;
pub mod video_processor;

pub use config::Config;
pub use error::CompressError;
pub use optimizer::{run, MediaOptimizer, MediaProcessor};
pub use stats::RunStats;
