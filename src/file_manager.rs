//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery di media.
//!
//! ## Responsabilità:
//! - Discovery (diretta o ricorsiva) di file media in una directory
//! - Classificazione file tramite estensione (immagine vs video)
//! - Filtri opzionali per dimensione minima/massima
//! - Promozione atomica dello staging file sopra l'originale
//! - Preservazione timestamp (accesso e modifica)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Video**: MP4, MOV, MKV, AVI
//! - **Immagini**: JPG, JPEG, PNG, WebP
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_media_files(&root, true, None)?;
//! for file in files {
//!     match MediaType::from_path(&file) {
//!         Some(MediaType::Video) => { /* encode video */ }
//!         Some(MediaType::Image) => { /* encode image */ }
//!         None => unreachable!(),
//!     }
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{FileTimes, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "mkv", "avi"];
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Extension every converted image ends up with
pub const CANONICAL_IMAGE_EXTENSION: &str = "jpg";

/// Media family of a supported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    /// Classify a path by its (case-insensitive) extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = FileManager::extension_of(path)?;
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access and modification times captured from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimestamps {
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Lowercase extension without the leading dot
    pub fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_supported_format(path: &Path) -> bool {
        MediaType::from_path(path).is_some()
    }

    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        MediaType::from_path(path) == Some(MediaType::Image)
    }

    /// Check if a file is a video
    pub fn is_video(path: &Path) -> bool {
        MediaType::from_path(path) == Some(MediaType::Video)
    }

    /// Find supported media files, sorted.
    ///
    /// Without `recursive` only the direct children of `media_dir` are
    /// considered. Directories resolving to `exclude` are not descended into.
    pub fn find_media_files(
        media_dir: &Path,
        recursive: bool,
        exclude: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let exclude = exclude.and_then(|dir| dir.canonicalize().ok());
        let max_depth = if recursive { usize::MAX } else { 1 };

        let mut files = Vec::new();
        let walker = WalkDir::new(media_dir)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| {
                let Some(ref excluded) = exclude else {
                    return true;
                };
                if !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().canonicalize() {
                    Ok(canonical) => canonical != *excluded,
                    Err(_) => true,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && Self::is_supported_format(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Found {} media files under {}", files.len(), media_dir.display());
        Ok(files)
    }

    /// Keep only files whose size lies within the optional bounds.
    ///
    /// Files whose metadata cannot be read are dropped when a bound is set.
    pub fn apply_size_filters(
        files: Vec<PathBuf>,
        min_size: Option<u64>,
        max_size: Option<u64>,
    ) -> Vec<PathBuf> {
        if min_size.is_none() && max_size.is_none() {
            return files;
        }

        files
            .into_iter()
            .filter(|path| match std::fs::metadata(path) {
                Ok(metadata) => {
                    let size = metadata.len();
                    min_size.map_or(true, |min| size >= min) && max_size.map_or(true, |max| size <= max)
                }
                Err(e) => {
                    debug!("Dropping {} from size filter: {}", path.display(), e);
                    false
                }
            })
            .collect()
    }

    /// Replace `original` with `temp` using rename semantics.
    ///
    /// No-op when `temp` does not exist.
    pub async fn promote_temp_to_original(original: &Path, temp: &Path) -> Result<()> {
        if !fs::try_exists(temp).await.unwrap_or(false) {
            debug!("Nothing to promote, {} is missing", temp.display());
            return Ok(());
        }

        if let Err(first) = fs::rename(temp, original).await {
            // Some filesystems refuse to rename over an existing file
            if fs::try_exists(original).await.unwrap_or(false) {
                fs::remove_file(original).await?;
                fs::rename(temp, original).await?;
            } else {
                return Err(first.into());
            }
        }

        debug!("Promoted {} -> {}", temp.display(), original.display());
        Ok(())
    }

    pub fn read_timestamps(path: &Path) -> std::io::Result<FileTimestamps> {
        let metadata = std::fs::metadata(path)?;
        Ok(FileTimestamps {
            accessed: metadata.accessed()?,
            modified: metadata.modified()?,
        })
    }

    /// Apply captured times to `dest`, logging instead of failing
    pub fn apply_timestamps(dest: &Path, timestamps: &FileTimestamps) {
        let result = OpenOptions::new().write(true).open(dest).and_then(|file| {
            file.set_times(
                FileTimes::new()
                    .set_accessed(timestamps.accessed)
                    .set_modified(timestamps.modified),
            )
        });

        if let Err(e) = result {
            warn!("Failed to preserve timestamps on {}: {}", dest.display(), e);
        }
    }

    /// Copy access and modification times from `source` onto `dest`. Never fails.
    pub fn preserve_timestamps(source: &Path, dest: &Path) {
        match Self::read_timestamps(source) {
            Ok(timestamps) => Self::apply_timestamps(dest, &timestamps),
            Err(e) => warn!("Failed to read timestamps of {}: {}", source.display(), e),
        }
    }

    /// Whether both paths name the same existing file.
    ///
    /// Catches aliases that differ only in case on case-insensitive filesystems.
    pub fn same_file(a: &Path, b: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            match (std::fs::metadata(a), std::fs::metadata(b)) {
                (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
                _ => false,
            }
        }
        #[cfg(not(unix))]
        {
            match (a.canonicalize(), b.canonicalize()) {
                (Ok(ca), Ok(cb)) => ca == cb,
                _ => false,
            }
        }
    }

    /// Copy `source` to `dest` keeping its timestamps
    pub async fn copy_preserving(source: &Path, dest: &Path) -> Result<u64> {
        let copied = fs::copy(source, dest).await?;
        Self::preserve_timestamps(source, dest);
        Ok(copied)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction (negative when the file grew)
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, bytes: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![b'0'; bytes]).unwrap();
    }

    #[test]
    fn test_classification() {
        assert_eq!(MediaType::from_path(Path::new("a.MP4")), Some(MediaType::Video));
        assert_eq!(MediaType::from_path(Path::new("a.mkv")), Some(MediaType::Video));
        assert_eq!(MediaType::from_path(Path::new("a.JPeG")), Some(MediaType::Image));
        assert_eq!(MediaType::from_path(Path::new("a.webp")), Some(MediaType::Image));
        assert_eq!(MediaType::from_path(Path::new("a.txt")), None);
        assert_eq!(MediaType::from_path(Path::new("noext")), None);
        assert!(FileManager::is_video(Path::new("clip.mov")));
        assert!(FileManager::is_image(Path::new("pic.png")));
    }

    #[test]
    fn test_find_media_files_non_recursive_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b.mp4"), 1);
        touch(&root.join("a.jpg"), 1);
        touch(&root.join("notes.txt"), 1);
        touch(&root.join("sub").join("c.png"), 1);

        let files = FileManager::find_media_files(root, false, None).unwrap();
        assert_eq!(files, vec![root.join("a.jpg"), root.join("b.mp4")]);
    }

    #[test]
    fn test_find_media_files_recursive_with_exclusion() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.jpg"), 1);
        touch(&root.join("sub").join("c.png"), 1);
        touch(&root.join("compressed").join("a.jpg"), 1);
        touch(&root.join("compressed").join("nested").join("x.mp4"), 1);

        let all = FileManager::find_media_files(root, true, None).unwrap();
        assert_eq!(all.len(), 4);

        let excluded = root.join("compressed");
        let files = FileManager::find_media_files(root, true, Some(&excluded)).unwrap();
        assert_eq!(files, vec![root.join("a.jpg"), root.join("sub").join("c.png")]);
    }

    #[test]
    fn test_apply_size_filters() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let small = root.join("small.jpg");
        let medium = root.join("medium.jpg");
        let large = root.join("large.jpg");
        touch(&small, 10);
        touch(&medium, 100);
        touch(&large, 1000);
        let files = vec![small.clone(), medium.clone(), large.clone(), root.join("gone.jpg")];

        let unfiltered = FileManager::apply_size_filters(files.clone(), None, None);
        assert_eq!(unfiltered.len(), 4);

        let filtered = FileManager::apply_size_filters(files.clone(), Some(50), None);
        assert_eq!(filtered, vec![medium.clone(), large.clone()]);

        let filtered = FileManager::apply_size_filters(files.clone(), None, Some(100));
        assert_eq!(filtered, vec![small.clone(), medium.clone()]);

        let filtered = FileManager::apply_size_filters(files, Some(50), Some(500));
        assert_eq!(filtered, vec![medium]);
    }

    #[tokio::test]
    async fn test_promote_temp_to_original() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("clip.mp4");
        let staging = temp_dir.path().join("clip_tmp.mp4");
        std::fs::write(&original, b"original").unwrap();
        std::fs::write(&staging, b"smaller").unwrap();

        FileManager::promote_temp_to_original(&original, &staging).await.unwrap();

        assert!(!staging.exists());
        assert_eq!(std::fs::read(&original).unwrap(), b"smaller");
    }

    #[tokio::test]
    async fn test_promote_without_temp_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("clip.mp4");
        std::fs::write(&original, b"original").unwrap();

        FileManager::promote_temp_to_original(&original, &temp_dir.path().join("missing_tmp.mp4"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&original).unwrap(), b"original");
    }

    #[test]
    fn test_preserve_timestamps() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.jpg");
        let dest = temp_dir.path().join("dest.jpg");
        touch(&source, 4);
        touch(&dest, 2);

        let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        FileManager::apply_timestamps(&source, &FileTimestamps { accessed: past, modified: past });

        FileManager::preserve_timestamps(&source, &dest);

        let stamps = FileManager::read_timestamps(&dest).unwrap();
        assert_eq!(stamps.modified, past);
        assert_eq!(stamps.accessed, past);
    }

    #[test]
    fn test_preserve_timestamps_never_panics_on_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        FileManager::preserve_timestamps(&temp_dir.path().join("a"), &temp_dir.path().join("b"));
    }

    #[test]
    fn test_same_file() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        touch(&a, 1);
        touch(&b, 1);

        assert!(FileManager::same_file(&a, &a));
        assert!(FileManager::same_file(&a, &temp_dir.path().join(".").join("a.jpg")));
        assert!(!FileManager::same_file(&a, &b));
        assert!(!FileManager::same_file(&a, &temp_dir.path().join("missing.jpg")));

        #[cfg(unix)]
        {
            let alias = temp_dir.path().join("alias.jpg");
            std::fs::hard_link(&a, &alias).unwrap();
            assert!(FileManager::same_file(&a, &alias));
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(1000, 500), 50.0);
        assert_eq!(FileManager::calculate_reduction(1000, 1500), -50.0);
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
    }
}
