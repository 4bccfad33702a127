//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//!
//! ## Modalità:
//! - **Mirrored**: `target_root/<path relativo alla sorgente>`
//! - **Overwrite**: staging file `<stem>_tmp<ext>` nella stessa cartella,
//!   promosso poi sopra l'originale
//!
//! Con la conversione immagini attiva l'estensione di output diventa `jpg`.

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::CompressError;
use crate::file_manager::{FileManager, CANONICAL_IMAGE_EXTENSION};
use crate::stats::ROOT_FOLDER;

const STAGING_SUFFIX: &str = "_tmp";

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Statistics bucket for a file: its parent relative to the source root.
    ///
    /// Top-level files, non-recursive runs and paths outside the root map to `"root"`.
    pub fn folder_key(input: &Path, source_root: &Path, recursive: bool) -> String {
        if !recursive {
            return ROOT_FOLDER.to_string();
        }

        let parent = input
            .strip_prefix(source_root)
            .ok()
            .and_then(Path::parent)
            .map(Self::slash_joined)
            .unwrap_or_default();

        if parent.is_empty() {
            ROOT_FOLDER.to_string()
        } else {
            parent
        }
    }

    /// Display name of a file: its path relative to the source root
    pub fn relative_name(input: &Path, source_root: &Path) -> String {
        match input.strip_prefix(source_root) {
            Ok(relative) => Self::slash_joined(relative),
            Err(_) => input.display().to_string(),
        }
    }

    fn slash_joined(path: &Path) -> String {
        path.components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Whether `input` gets the canonical image extension
    pub fn converts(input: &Path, convert_images: bool) -> bool {
        convert_images && FileManager::is_image(input)
    }

    fn output_file_name(input: &Path, stem_suffix: &str, convert: bool) -> Result<OsString> {
        let stem = input
            .file_stem()
            .ok_or_else(|| CompressError::UnsupportedFormat(format!("Invalid file name: {}", input.display())))?;

        let mut name = stem.to_os_string();
        name.push(stem_suffix);
        if convert {
            name.push(".");
            name.push(CANONICAL_IMAGE_EXTENSION);
        } else if let Some(ext) = input.extension() {
            name.push(".");
            name.push(ext);
        }
        Ok(name)
    }

    /// Same-directory scratch file for overwrite mode
    pub fn staging_path(input: &Path, convert_images: bool) -> Result<PathBuf> {
        let convert = Self::converts(input, convert_images);
        let name = Self::output_file_name(input, STAGING_SUFFIX, convert)?;
        Ok(input.with_file_name(name))
    }

    /// Where a staging file ends up; differs from `input` only when converting
    pub fn promotion_target(input: &Path, convert_images: bool) -> Result<PathBuf> {
        if !Self::converts(input, convert_images) {
            return Ok(input.to_path_buf());
        }
        let name = Self::output_file_name(input, "", true)?;
        Ok(input.with_file_name(name))
    }

    /// `target_root` + path of `input` under `source_root`
    pub fn mirrored_path(
        input: &Path,
        source_root: &Path,
        target_root: &Path,
        convert_images: bool,
    ) -> Result<PathBuf> {
        let convert = Self::converts(input, convert_images);
        let name = Self::output_file_name(input, "", convert)?;

        let relative_dir = match input.strip_prefix(source_root) {
            Ok(relative) => relative.parent().unwrap_or(Path::new("")),
            Err(e) => {
                debug!("{} is outside {}: {}", input.display(), source_root.display(), e);
                Path::new("")
            }
        };

        Ok(target_root.join(relative_dir).join(name))
    }

    /// Compute the output path for `input`, creating parent directories
    pub async fn determine_output_path(
        input: &Path,
        source_root: &Path,
        target_root: &Path,
        overwrite: bool,
        convert_images: bool,
    ) -> Result<PathBuf> {
        let output = if overwrite {
            Self::staging_path(input, convert_images)?
        } else {
            Self::mirrored_path(input, source_root, target_root, convert_images)?
        };

        Self::ensure_parent_dirs(&output).await?;
        debug!("Resolved output path: {} -> {}", input.display(), output.display());
        Ok(output)
    }

    /// Crea le directory parent se necessario
    pub async fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!("Failed to create parent directories for {}: {}", path.display(), e)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_folder_key() {
        let root = Path::new("/media");
        assert_eq!(PathResolver::folder_key(Path::new("/media/a.jpg"), root, true), "root");
        assert_eq!(PathResolver::folder_key(Path::new("/media/x/a.jpg"), root, true), "x");
        assert_eq!(PathResolver::folder_key(Path::new("/media/x/y/a.jpg"), root, true), "x/y");
        assert_eq!(PathResolver::folder_key(Path::new("/media/x/y/a.jpg"), root, false), "root");
        assert_eq!(PathResolver::folder_key(Path::new("/elsewhere/a.jpg"), root, true), "root");
    }

    #[test]
    fn test_relative_name() {
        let root = Path::new("/media");
        assert_eq!(PathResolver::relative_name(Path::new("/media/x/a.jpg"), root), "x/a.jpg");
        assert_eq!(PathResolver::relative_name(Path::new("/other/a.jpg"), root), "/other/a.jpg");
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            PathResolver::staging_path(Path::new("/m/clip.mp4"), true).unwrap(),
            Path::new("/m/clip_tmp.mp4")
        );
        assert_eq!(
            PathResolver::staging_path(Path::new("/m/pic.png"), false).unwrap(),
            Path::new("/m/pic_tmp.png")
        );
        assert_eq!(
            PathResolver::staging_path(Path::new("/m/pic.png"), true).unwrap(),
            Path::new("/m/pic_tmp.jpg")
        );
    }

    #[test]
    fn test_promotion_target() {
        assert_eq!(
            PathResolver::promotion_target(Path::new("/m/pic.png"), true).unwrap(),
            Path::new("/m/pic.jpg")
        );
        assert_eq!(
            PathResolver::promotion_target(Path::new("/m/pic.png"), false).unwrap(),
            Path::new("/m/pic.png")
        );
        assert_eq!(
            PathResolver::promotion_target(Path::new("/m/clip.mov"), true).unwrap(),
            Path::new("/m/clip.mov")
        );
    }

    #[test]
    fn test_mirrored_path() {
        let root = Path::new("/media");
        let target = Path::new("/media/compressed");

        assert_eq!(
            PathResolver::mirrored_path(Path::new("/media/x/clip.MOV"), root, target, true).unwrap(),
            Path::new("/media/compressed/x/clip.MOV")
        );
        assert_eq!(
            PathResolver::mirrored_path(Path::new("/media/x/pic.webp"), root, target, true).unwrap(),
            Path::new("/media/compressed/x/pic.jpg")
        );
        assert_eq!(
            PathResolver::mirrored_path(Path::new("/media/pic.webp"), root, target, false).unwrap(),
            Path::new("/media/compressed/pic.webp")
        );
    }

    #[tokio::test]
    async fn test_determine_output_path_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let target = root.join("out");
        let input = root.join("a").join("b").join("pic.png");

        let output = PathResolver::determine_output_path(&input, root, &target, false, true)
            .await
            .unwrap();

        assert_eq!(output, target.join("a").join("b").join("pic.jpg"));
        assert!(target.join("a").join("b").is_dir());

        let staging = PathResolver::determine_output_path(&input, root, &target, true, false)
            .await
            .unwrap();
        assert_eq!(staging, root.join("a").join("b").join("pic_tmp.png"));
    }
}
