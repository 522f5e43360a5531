//! File deletion primitives for library cleanup.
//!
//! # Overview
//!
//! This module provides:
//! - Permanent deletion (default for cleanup)
//! - Move to system trash (recoverable, via the trash crate)
//! - Batch result accounting
//! - Pruning of library folders left empty by a deletion
//!
//! # Example
//!
//! ```no_run
//! use linkvault::actions::delete::{delete_file, prune_empty_ancestors};
//! use std::path::Path;
//!
//! let library = Path::new("/data/library");
//! let master = library.join("ab").join("ab12").join("photo.jpg");
//! match delete_file(&master, false) {
//!     Ok(result) => {
//!         println!("Deleted {} ({} bytes)", result.path.display(), result.size);
//!         prune_empty_ancestors(&master, library, 3);
//!     }
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

use crate::scanner::hardlink::is_within;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0} - try running with elevated privileges")]
    PermissionDenied(PathBuf),

    /// The file gained a reference (or its count became unknown) since the audit.
    #[error("link count of {path} changed since audit ({links}); not deleting")]
    StillReferenced { path: PathBuf, links: String },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::StillReferenced { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_metadata_error(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, permanent: bool) -> Self {
        Self {
            path,
            size,
            permanent,
        }
    }
}

/// Results of a batch deletion.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Record a success.
    pub fn push_success(&mut self, result: DeleteResult) {
        self.bytes_freed += result.size;
        self.successes.push(result);
    }

    /// Record a failure.
    pub fn push_failure(&mut self, error: &DeleteError) {
        self.failures
            .push((error.path().to_path_buf(), error.to_string()));
    }

    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {}",
                self.success_count(),
                ByteSize(self.bytes_freed)
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {}",
                self.success_count(),
                self.failure_count(),
                ByteSize(self.bytes_freed)
            )
        }
    }
}

fn file_size(path: &Path) -> Result<u64, DeleteError> {
    fs::symlink_metadata(path)
        .map(|m| m.len())
        .map_err(|e| DeleteError::from_metadata_error(path, e))
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata can't be read
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult::new(path.to_path_buf(), size, false))
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata can't be read
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = file_size(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult::new(path.to_path_buf(), size, true))
}

/// Delete a file to the trash or permanently.
///
/// # Errors
///
/// See [`delete_to_trash`] and [`permanent_delete`].
pub fn delete_file(path: &Path, use_trash: bool) -> Result<DeleteResult, DeleteError> {
    if use_trash {
        delete_to_trash(path)
    } else {
        permanent_delete(path)
    }
}

/// Remove now-empty folders above a deleted file.
///
/// Walks up from `path`'s parent at most `max_levels` times, stopping at
/// `stop_at` (never removed), at anything outside it, or at the first
/// folder that is not empty. Returns the folders removed, deepest first.
pub fn prune_empty_ancestors(path: &Path, stop_at: &Path, max_levels: usize) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let mut current = path.parent();

    for _ in 0..max_levels {
        let Some(dir) = current else { break };
        if dir == stop_at || !is_within(dir, stop_at) {
            break;
        }

        match fs::remove_dir(dir) {
            Ok(()) => {
                log::debug!("Removed empty folder {}", dir.display());
                removed.push(dir.to_path_buf());
                current = dir.parent();
            }
            Err(e) => {
                log::trace!("Stopped pruning at {}: {}", dir.display(), e);
                break;
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_delete_error_path() {
        let err = DeleteError::NotFound(PathBuf::from("/test/file.txt"));
        assert_eq!(err.path(), Path::new("/test/file.txt"));

        let err = DeleteError::StillReferenced {
            path: PathBuf::from("/lib/ab/abcd/x.jpg"),
            links: "2 links".to_string(),
        };
        assert_eq!(err.path(), Path::new("/lib/ab/abcd/x.jpg"));
    }

    #[test]
    fn test_delete_error_display() {
        let err = DeleteError::PermissionDenied(PathBuf::from("/test"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_batch_delete_result_accounting() {
        let mut batch = BatchDeleteResult::default();
        batch.push_success(DeleteResult::new(PathBuf::from("/a"), 1000, true));
        batch.push_success(DeleteResult::new(PathBuf::from("/b"), 24, true));

        assert_eq!(batch.success_count(), 2);
        assert_eq!(batch.bytes_freed, 1024);
        assert!(batch.all_succeeded());

        batch.push_failure(&DeleteError::NotFound(PathBuf::from("/c")));
        assert_eq!(batch.failure_count(), 1);
        assert!(!batch.all_succeeded());
        assert!(batch.summary().contains("1 failed"));
    }

    #[test]
    fn test_permanent_delete_success() {
        let dir = TempDir::new().unwrap();
        let path = create_temp_file(dir.path(), "test.txt", b"hello world");

        let result = permanent_delete(&path).unwrap();

        assert_eq!(result.size, 11);
        assert!(result.permanent);
        assert!(!path.exists());
    }

    #[test]
    fn test_permanent_delete_not_found() {
        let dir = TempDir::new().unwrap();
        let result = permanent_delete(&dir.path().join("missing.txt"));
        assert!(matches!(result, Err(DeleteError::NotFound(_))));
    }

    #[test]
    fn test_delete_to_trash_not_found() {
        let dir = TempDir::new().unwrap();
        let result = delete_to_trash(&dir.path().join("missing.txt"));
        assert!(matches!(result, Err(DeleteError::NotFound(_))));
    }

    #[test]
    fn test_prune_removes_empty_digest_and_prefix_folders() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let folder = library.join("ab").join("abcd");
        let file = create_temp_file(&folder, "x.jpg", b"x");
        fs::remove_file(&file).unwrap();

        let removed = prune_empty_ancestors(&file, &library, 3);

        assert_eq!(removed, vec![folder.clone(), library.join("ab")]);
        assert!(library.is_dir());
    }

    #[test]
    fn test_prune_stops_at_non_empty_folder() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let folder = library.join("ab").join("abcd");
        let file = create_temp_file(&folder, "x.jpg", b"x");
        create_temp_file(&library.join("ab").join("abef"), "y.jpg", b"y");
        fs::remove_file(&file).unwrap();

        let removed = prune_empty_ancestors(&file, &library, 3);

        assert_eq!(removed, vec![folder]);
        assert!(library.join("ab").is_dir());
    }

    #[test]
    fn test_prune_respects_level_limit() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let deep = library.join("a").join("b").join("c").join("d");
        let file = create_temp_file(&deep, "x.jpg", b"x");
        fs::remove_file(&file).unwrap();

        let removed = prune_empty_ancestors(&file, &library, 3);

        assert_eq!(removed.len(), 3);
        assert!(library.join("a").is_dir());
    }

    #[test]
    fn test_prune_never_leaves_root() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let file = create_temp_file(&library, "stray.jpg", b"x");
        fs::remove_file(&file).unwrap();

        assert!(prune_empty_ancestors(&file, &library, 3).is_empty());
        assert!(library.is_dir());
    }
}
