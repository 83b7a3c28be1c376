//! Lexical path sandboxing for the project root.
//!
//! Every path the model or the architect hands us goes through
//! [`sandbox_path`] before it touches the file system. The check is purely
//! lexical so it also works for files that do not exist yet.

use std::path::PathBuf;

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathRejection {
    #[error("path is empty")]
    Empty,
    #[error("absolute paths are not allowed: {0}")]
    Absolute(String),
    #[error("path escapes the project root: {0}")]
    Escapes(String),
}

/// Normalize `raw` into a path relative to the project root.
///
/// `\` is treated as a separator, `.` segments are dropped and `..` pops one
/// segment. Absolute paths, drive prefixes and anything that would climb above
/// the root are rejected, as is a path that normalizes to the root itself.
pub fn sandbox_path(raw: &str) -> Result<PathBuf, PathRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathRejection::Empty);
    }
    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathRejection::Absolute(raw.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathRejection::Escapes(raw.to_string()));
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(PathRejection::Empty);
    }
    Ok(parts.iter().collect())
}

/// Render a root-relative path with `/` separators regardless of platform.
pub fn display_relative(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
