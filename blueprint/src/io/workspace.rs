//! Sandboxed project directory: the file-system half of the tool surface.
//!
//! Every operation resolves its path through
//! [`sandbox_path`](crate::core::path::sandbox_path) first, so nothing outside
//! the project root is ever read or written. Path rejections surface as
//! [`PathRejection`]; real file-system failures surface as I/O errors.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::core::path::{PathRejection, display_relative, sandbox_path};

/// Error from a sandboxed file operation.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// The requested path is outside the sandbox or malformed.
    #[error(transparent)]
    Rejected(#[from] PathRejection),
    /// The file system refused the operation.
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A project root directory that confines all reads and writes.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Ensure `root` exists (idempotent) and open it.
    ///
    /// The root is canonicalized once here; every later path is joined to it
    /// after lexical sandboxing.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("create project root {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve project root {}", root.display()))?;
        debug!(root = %root.display(), "project root ready");
        Ok(Self { root })
    }

    /// Absolute path of the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the root as text, for the model to orient itself.
    pub fn current_directory(&self) -> String {
        self.root.display().to_string()
    }

    /// Resolve `path` to an absolute location inside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        Ok(self.root.join(sandbox_path(path)?))
    }

    /// Read a file as text. A missing file reads as the empty string.
    pub fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(WorkspaceError::Io {
                op: "read",
                path: path.to_string(),
                source,
            }),
        }
    }

    /// Write `content` to `path`, creating parent directories and replacing any
    /// existing file.
    ///
    /// The bytes land in a sibling temp file first and are renamed into place,
    /// so readers never observe a half-written file.
    pub fn write_file(&self, path: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let relative = sandbox_path(path)?;
        let full = self.root.join(&relative);
        let io_err = |op: &'static str| {
            let path = display_relative(&relative);
            move |source| WorkspaceError::Io { op, path, source }
        };

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_err("create directory for"))?;
        }
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = full.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&tmp_path, content).map_err(io_err("write"))?;
        if let Err(err) = fs::rename(&tmp_path, &full) {
            // Leave no stray temp file behind if the rename fails.
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err("replace")(err));
        }
        debug!(path = %display_relative(&relative), bytes = content.len(), "wrote file");
        Ok(relative)
    }

    /// All files under the root, relative and `/`-separated, sorted.
    pub fn list_files(&self) -> Result<Vec<String>, WorkspaceError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                WorkspaceError::Io {
                    op: "list",
                    path,
                    source: err.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(display_relative(relative));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove every regular file under the root, keeping the directory tree.
    ///
    /// Returns the removed paths.
    pub fn clean(&self) -> Result<Vec<String>> {
        let files = self.list_files()?;
        for file in &files {
            let full = self.root.join(file);
            fs::remove_file(&full).with_context(|| format!("remove {}", full.display()))?;
        }
        Ok(files)
    }
}
