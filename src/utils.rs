//! # Utility Functions Module
//!
//! Helpers shared by the encoders and the CLI: argument-vector building and
//! parsing of human-written sizes and resolutions.

use anyhow::Result;

use crate::error::CompressError;

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// use media_compactor::utils::to_string_vec;
///
/// let crf = 23;
/// let args = to_string_vec(["-crf", &crf.to_string(), "-y"]);
/// assert_eq!(args, vec!["-crf", "23", "-y"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Macro for convenient argument building.
///
/// # Example
/// ```rust
/// use media_compactor::args;
///
/// let crf = 23;
/// let args = args!["-crf", crf, "-y"];
/// assert_eq!(args, vec!["-crf", "23", "-y"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Parses a size such as `"10MB"`, `"1.5GB"`, `"500k"` or `"1024"` into bytes.
///
/// Units are binary (1 KB = 1024 B) and case-insensitive.
pub fn parse_size(input: &str) -> Result<u64> {
    let normalized = input.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(CompressError::Validation(format!("Invalid size string: '{}'", input)).into());
    }

    let split_at = normalized
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split_at);

    let value: f64 = number.parse().map_err(|_| {
        CompressError::Validation(format!(
            "Invalid size format: '{}'. Expected format like '10MB', '1.5GB', '500KB'",
            input
        ))
    })?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024 * 1024 * 1024 * 1024,
        other => {
            return Err(CompressError::Validation(format!(
                "Invalid size unit: '{}'. Supported units: B, K, KB, M, MB, G, GB, T, TB",
                other
            ))
            .into())
        }
    };

    Ok((value * multiplier as f64) as u64)
}

/// Parses a target resolution: `"1920x1080"` or a named one (`"720p"`, `"4k"`, ...).
pub fn parse_resolution(input: &str) -> Result<(u32, u32)> {
    let normalized = input.trim().to_lowercase();

    let named = match normalized.as_str() {
        "480p" => Some((854, 480)),
        "720p" => Some((1280, 720)),
        "1080p" => Some((1920, 1080)),
        "1440p" => Some((2560, 1440)),
        "2160p" | "4k" => Some((3840, 2160)),
        "2k" => Some((2048, 1080)),
        "8k" => Some((7680, 4320)),
        _ => None,
    };
    if let Some(dimensions) = named {
        return Ok(dimensions);
    }

    let invalid = || {
        CompressError::Validation(format!(
            "Invalid resolution format: '{}'. Expected formats: '1920x1080', '720p', '1080p', '1440p', '2160p', '2k', '4k', '8k'",
            input
        ))
    };

    let (width, height) = normalized.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.parse().map_err(|_| invalid())?;
    let height: u32 = height.parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(CompressError::Validation(format!(
            "Resolution dimensions must be positive: '{}'",
            input
        ))
        .into());
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_vec_mixed_types() {
        let num = 42;
        let result = to_string_vec(["-crf", &num.to_string(), "-y"]);
        assert_eq!(result, vec!["-crf".to_string(), "42".to_string(), "-y".to_string()]);
    }

    #[test]
    fn test_to_string_vec_empty() {
        let result: Vec<String> = to_string_vec(Vec::<&str>::new());
        assert_eq!(result, Vec::<String>::new());
    }

    #[test]
    fn test_args_macro() {
        let crf = 28;
        let result = args!["-crf", crf, "-preset", "medium"];
        assert_eq!(result, vec!["-crf", "28", "-preset", "medium"]);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("10B").unwrap(), 10);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("2K").unwrap(), 2048);
        assert_eq!(parse_size("1.5MB").unwrap(), 1_572_864);
        assert_eq!(parse_size(" 1GB ").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("1T").unwrap(), 1_099_511_627_776);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("10XB").is_err());
        assert!(parse_size("-5MB").is_err());
        assert!(parse_size("1.2.3MB").is_err());
    }

    #[test]
    fn test_parse_resolution_named_and_explicit() {
        assert_eq!(parse_resolution("720p").unwrap(), (1280, 720));
        assert_eq!(parse_resolution("4K").unwrap(), (3840, 2160));
        assert_eq!(parse_resolution("2k").unwrap(), (2048, 1080));
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution(" 640X480 ").unwrap(), (640, 480));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("widexhigh").is_err());
        assert!(parse_resolution("").is_err());
    }
}
