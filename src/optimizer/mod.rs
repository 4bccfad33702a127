//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `media_optimizer`: Orchestratore principale
//! - `task_optimizer`: Worker e macchina a stati per singoli file
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod media_optimizer;
pub mod path_resolver;
pub mod task_optimizer;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use media_optimizer::{run, MediaOptimizer};
pub use path_resolver::PathResolver;
pub use task_optimizer::{decide, DiscardPolicy, FileReport, FileState, SizeDecision, TaskOptimizer};

/// Type-specific compressor: writes a compressed `output` for `input`
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn compress(&self, input: &Path, output: &Path) -> Result<()>;
}
