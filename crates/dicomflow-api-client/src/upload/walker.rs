//! Directory traversal for dropped files and folders.
//!
//! Depth-first over an explicit stack, so arbitrarily deep trees never grow the
//! call stack. Symlinks are not followed. A directory that cannot be listed is
//! logged, recorded in [`WalkReport::skipped`], and the walk carries on.

use dicomflow_core::validation::folder_path::folder_path_of;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A file found by the walker, addressed relative to the dropped root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    /// Path segments from the dropped item down to the file; the last one is the file name
    pub relative_path: Vec<String>,
    pub size_bytes: u64,
    pub extension: Option<String>,
}

impl UploadCandidate {
    pub fn new(path: PathBuf, relative_path: Vec<String>, size_bytes: u64) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        Self {
            path,
            relative_path,
            size_bytes,
            extension,
        }
    }

    pub fn file_name(&self) -> &str {
        self.relative_path.last().map(String::as_str).unwrap_or_default()
    }

    /// Parent segments joined with `/`; empty for a file dropped on its own
    pub fn folder_path(&self) -> String {
        folder_path_of(&self.relative_path)
    }

    pub fn relative_path_string(&self) -> String {
        self.relative_path.join("/")
    }
}

/// An entry the walker could not read
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct WalkReport {
    pub candidates: Vec<UploadCandidate>,
    pub skipped: Vec<SkippedEntry>,
}

impl WalkReport {
    fn skip(&mut self, path: &Path, error: impl std::fmt::Display) {
        tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable entry");
        self.skipped.push(SkippedEntry {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }

    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size_bytes).sum()
    }
}

fn display_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Leading segment for a dropped directory. `.`, `dir/..` and the like are
/// resolved to the directory they name; a filesystem root contributes nothing,
/// so its files sit directly under the drop.
async fn root_segments(root: &Path) -> Vec<String> {
    if let Some(name) = display_name(root) {
        return vec![name];
    }
    match fs::canonicalize(root).await {
        Ok(resolved) => display_name(&resolved).into_iter().collect(),
        Err(e) => {
            tracing::debug!(path = %root.display(), error = %e, "Cannot resolve dropped directory name");
            Vec::new()
        }
    }
}

/// Collect every regular file under `roots`.
///
/// A root that is a file yields `[name]`; files under a root directory `D` yield
/// `[D, ..., name]`. Sibling order follows the filesystem.
pub async fn walk(roots: &[PathBuf]) -> WalkReport {
    let mut report = WalkReport::default();
    let mut stack: Vec<(PathBuf, Vec<String>)> = Vec::new();

    for root in roots {
        let metadata = match fs::symlink_metadata(root).await {
            Ok(metadata) => metadata,
            Err(e) => {
                report.skip(root, e);
                continue;
            }
        };

        if metadata.is_file() {
            report.candidates.push(UploadCandidate::new(
                root.clone(),
                display_name(root).into_iter().collect(),
                metadata.len(),
            ));
        } else if metadata.is_dir() {
            stack.push((root.clone(), root_segments(root).await));
        } else {
            tracing::debug!(path = %root.display(), "Ignoring dropped item that is neither file nor directory");
        }
    }

    while let Some((dir, segments)) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                report.skip(&dir, e);
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report.skip(&dir, e);
                    break;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    report.skip(&path, e);
                    continue;
                }
            };

            let mut child_segments = segments.clone();
            child_segments.push(entry.file_name().to_string_lossy().into_owned());

            if file_type.is_dir() {
                stack.push((path, child_segments));
            } else if file_type.is_file() {
                match entry.metadata().await {
                    Ok(metadata) => report.candidates.push(UploadCandidate::new(
                        path,
                        child_segments,
                        metadata.len(),
                    )),
                    Err(e) => report.skip(&path, e),
                }
            }
        }
    }

    tracing::debug!(
        files = report.candidates.len(),
        skipped = report.skipped.len(),
        "Directory walk finished"
    );

    report
}
