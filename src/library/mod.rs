//! Content-addressed master library.
//!
//! This module provides functionality for:
//! - Mapping a digest to its folder: `<root>/<digest[0:2]>/<digest>/`
//! - Lazy, idempotent folder creation
//! - Finding the master already resident in a folder
//! - Best-effort name aliases (extra hard links inside a folder)
//! - Relocating a new master into the library
//!
//! Every filesystem mutation goes through an [`FsOps`] implementation so
//! tests can inject failures, and every mutation is replaced by a log line
//! in dry-run mode.
//!
//! # Layout
//!
//! ```text
//! <library>/
//!   ba/
//!     ba7816bf...15ad/
//!       holiday.jpg      <- master
//!       IMG_0001.jpg     <- alias (same storage object)
//! ```

pub mod swap;

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::scanner::ContentDigest;

pub use swap::{LinkSwap, LinkSwapper, SwapError, SwapOutcome, SwapState, BACKUP_EXTENSION};

/// Filesystem primitives used by the library store and the link swapper.
///
/// [`RealFs`] forwards to `std::fs`; tests wrap it to fail specific calls.
pub trait FsOps: Send + Sync {
    /// Rename `from` to `to` (same volume).
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Create a hard link at `link` referencing `target`'s storage object.
    fn hard_link(&self, target: &Path, link: &Path) -> io::Result<()>;
    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Check whether anything (file, dir or dangling link) occupies `path`.
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}

/// [`FsOps`] backed directly by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FsOps for RealFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn hard_link(&self, target: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(target, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// Errors raised by library store operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The digest folder (or its prefix parent) could not be created.
    #[error("cannot create library folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The digest folder exists but could not be listed.
    #[error("cannot list library folder {path}: {source}")]
    ReadFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Moving a new master into the library failed.
    #[error("cannot move {from} to {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a best-effort alias request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    /// A new hard link was created.
    Created,
    /// Something already occupied the alias path; nothing was done.
    AlreadyPresent,
    /// Dry run: the alias would have been created.
    Simulated,
    /// Creation failed; the failure was logged.
    Failed,
}

impl AliasOutcome {
    /// Whether the alias path now exists on disk.
    #[must_use]
    pub fn exists(self) -> bool {
        matches!(self, Self::Created | Self::AlreadyPresent)
    }
}

/// The content-addressed library rooted at one directory.
pub struct LibraryStore {
    root: PathBuf,
    dry_run: bool,
    fs: Arc<dyn FsOps>,
}

impl std::fmt::Debug for LibraryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryStore")
            .field("root", &self.root)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl LibraryStore {
    /// Create a store over `root` using the real filesystem.
    #[must_use]
    pub fn new(root: PathBuf, dry_run: bool) -> Self {
        Self::with_fs(root, dry_run, Arc::new(RealFs))
    }

    /// Create a store with a custom filesystem implementation.
    #[must_use]
    pub fn with_fs(root: PathBuf, dry_run: bool, fs: Arc<dyn FsOps>) -> Self {
        Self { root, dry_run, fs }
    }

    /// Library root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical folder for a digest: `root/prefix/digest`.
    #[must_use]
    pub fn folder_for(&self, digest: &ContentDigest) -> PathBuf {
        self.root.join(digest.prefix()).join(digest.as_str())
    }

    /// Create the library root itself if missing.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::CreateFolder`] if creation fails.
    pub fn ensure_root(&self) -> Result<(), LibraryError> {
        if self.fs.exists(&self.root) {
            return Ok(());
        }
        if self.dry_run {
            log::info!("[dry-run] Would create library root {}", self.root.display());
            return Ok(());
        }
        self.fs
            .create_dir_all(&self.root)
            .map_err(|source| LibraryError::CreateFolder {
                path: self.root.clone(),
                source,
            })?;
        log::info!("Created library root {}", self.root.display());
        Ok(())
    }

    /// Ensure the folder for `digest` exists, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::CreateFolder`] if creation fails.
    pub fn ensure_folder(&self, digest: &ContentDigest) -> Result<PathBuf, LibraryError> {
        let folder = self.folder_for(digest);
        if self.fs.exists(&folder) {
            return Ok(folder);
        }

        if self.dry_run {
            log::debug!("[dry-run] Would create folder {}", folder.display());
            return Ok(folder);
        }

        self.fs
            .create_dir_all(&folder)
            .map_err(|source| LibraryError::CreateFolder {
                path: folder.clone(),
                source,
            })?;
        log::debug!("Created folder {}", folder.display());
        Ok(folder)
    }

    /// Check whether anything occupies `path`.
    #[must_use]
    pub fn is_occupied(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }

    /// The master already resident in `folder`, if any.
    ///
    /// With several names present (aliases), the lexicographically first
    /// regular file is returned. Leftover swap backups are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ReadFolder`] if the folder exists but cannot
    /// be listed.
    pub fn existing_master(&self, folder: &Path) -> Result<Option<PathBuf>, LibraryError> {
        let read_dir = match fs::read_dir(folder) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LibraryError::ReadFolder {
                    path: folder.to_path_buf(),
                    source,
                })
            }
        };

        let mut files: Vec<PathBuf> = read_dir
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .filter(|path| !swap::is_backup_path(path))
            .collect();
        files.sort();

        Ok(files.into_iter().next())
    }

    /// Create a hard-linked alias named `name` inside `folder` for `target`.
    ///
    /// Best-effort and idempotent: an occupied alias path is left alone, and
    /// a failure is logged without being returned.
    pub fn create_alias(&self, folder: &Path, name: &OsStr, target: &Path) -> AliasOutcome {
        let alias = folder.join(name);

        if self.fs.exists(&alias) {
            log::trace!("Alias already present: {}", alias.display());
            return AliasOutcome::AlreadyPresent;
        }

        if self.dry_run {
            log::debug!(
                "[dry-run] Would alias {} -> {}",
                alias.display(),
                target.display()
            );
            return AliasOutcome::Simulated;
        }

        match self.fs.hard_link(target, &alias) {
            Ok(()) => {
                log::debug!("Aliased {} -> {}", alias.display(), target.display());
                AliasOutcome::Created
            }
            Err(e) => {
                log::warn!(
                    "Failed to create alias {} -> {}: {}",
                    alias.display(),
                    target.display(),
                    e
                );
                AliasOutcome::Failed
            }
        }
    }

    /// Move a new master from `from` into the library at `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Relocate`] if the rename fails; the source
    /// file is untouched in that case.
    pub fn relocate(&self, from: &Path, to: &Path) -> Result<(), LibraryError> {
        if self.dry_run {
            log::debug!("[dry-run] Would move {} -> {}", from.display(), to.display());
            return Ok(());
        }

        self.fs
            .rename(from, to)
            .map_err(|source| LibraryError::Relocate {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
        log::info!("Moved {} -> {}", from.display(), to.display());
        Ok(())
    }
}
