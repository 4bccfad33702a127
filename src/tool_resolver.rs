//! # Tool Path Resolver
//!
//! Locates the FFmpeg binary used by the executor. Resolution order:
//! - explicit path from the configuration, used verbatim
//! - the first match in the system `PATH`
//! - a short list of platform-default install locations

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CompressError;

pub const FFMPEG: &str = "ffmpeg";

/// Tool path resolver
pub struct ToolPathResolver {
    /// Raw `PATH` value to search (captured at construction)
    search_path: Option<OsString>,
    /// Fallback locations checked after `PATH`
    default_locations: Vec<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver for the current process environment
    pub fn new() -> Self {
        Self {
            search_path: env::var_os("PATH"),
            default_locations: Self::platform_defaults(),
        }
    }

    /// Create a resolver with an explicit search path and fallback list
    pub fn with_search(search_path: Option<OsString>, default_locations: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            default_locations,
        }
    }

    fn platform_defaults() -> Vec<PathBuf> {
        if cfg!(windows) {
            vec![
                PathBuf::from(r"C:\ffmpeg\ffmpeg.exe"),
                PathBuf::from(r"C:\Program Files\ffmpeg\bin\ffmpeg.exe"),
                PathBuf::from(r"C:\Program Files (x86)\ffmpeg\bin\ffmpeg.exe"),
            ]
        } else {
            vec![
                PathBuf::from("/usr/local/bin/ffmpeg"),
                PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            ]
        }
    }

    /// Resolve the FFmpeg binary, failing with `EncoderNotFound`
    pub fn resolve_ffmpeg(&self, explicit: Option<&Path>) -> Result<PathBuf, CompressError> {
        if let Some(path) = explicit {
            debug!("Using configured FFmpeg path: {}", path.display());
            return Ok(path.to_path_buf());
        }

        if let Some(found) = self.find_in_system_path(FFMPEG) {
            debug!("Using FFmpeg from PATH: {}", found.display());
            return Ok(found);
        }

        if let Some(found) = self.default_locations.iter().find(|path| path.is_file()) {
            debug!("Using FFmpeg from default location: {}", found.display());
            return Ok(found.clone());
        }

        warn!("FFmpeg not found in PATH or default locations");
        Err(CompressError::EncoderNotFound(
            "install FFmpeg or set ffmpeg_path in the configuration".to_string(),
        ))
    }

    /// Find tool in the captured search path
    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        let extension = if cfg!(windows) { ".exe" } else { "" };
        let tool_with_ext = format!("{}{}", tool_name, extension);

        env::split_paths(self.search_path.as_ref()?)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}
