//! # Backup Module
//!
//! Copia l'intero albero sorgente dentro `backup_root/<nome>` prima che
//! qualsiasi file venga toccato. Se la destinazione esiste già viene aggiunto
//! un suffisso `_%Y%m%d_%H%M%S`. Ogni errore è fatale per l'esecuzione.

use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::CompressError;

fn backup_error(action: &str, path: &Path, err: impl std::fmt::Display) -> anyhow::Error {
    CompressError::Backup(format!("{} {}: {}", action, path.display(), err)).into()
}

/// Pick `backup_root/<name>`, or a timestamped sibling if that exists
pub fn backup_destination(source: &Path, backup_root: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());

    let plain = backup_root.join(&name);
    if !plain.exists() {
        return plain;
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    backup_root.join(format!("{}_{}", name, timestamp))
}

/// Recursively copy `source` into `backup_root`, returning the backup path
pub async fn create_backup(source: &Path, backup_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_root)
        .await
        .map_err(|e| backup_error("cannot create", backup_root, e))?;

    let destination = backup_destination(source, backup_root);
    if destination.exists() {
        return Err(backup_error("destination already exists", &destination, "refusing to overwrite"));
    }

    info!("Creating backup to: {}", destination.display());

    // A backup root placed inside the source must not be copied into itself
    let skip = backup_root.canonicalize().ok();
    let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
        match (&skip, entry.file_type().is_dir()) {
            (Some(skip), true) => entry.path().canonicalize().map_or(true, |p| p != *skip),
            _ => true,
        }
    });

    let mut copied = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| backup_error("cannot read", source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| backup_error("cannot relativize", entry.path(), e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .await
                .map_err(|e| backup_error("cannot create", &target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .await
                .map_err(|e| backup_error("cannot copy", entry.path(), e))?;
            copied += 1;
        } else {
            debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }

    info!("✓ Backup created: {} ({} files)", destination.display(), copied);
    Ok(destination)
}
