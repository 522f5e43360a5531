//! Crash-safe replacement of a regular file by a hard link.
//!
//! # Overview
//!
//! [`LinkSwap`] is a small state machine over one path:
//!
//! ```text
//! Pending --back_up--> BackedUp --link--> Linked --clean--> Cleaned
//!    |                    |
//!    | (rename fails)     | (link fails) --restore ok--> RolledBack
//!    v                    |              --restore err-> Inconsistent
//!  Pending                v
//! ```
//!
//! The backup is a sibling of the original (same directory, same volume)
//! so the new link lands exactly where the original was. Content is never
//! deleted before the link exists: an interruption between steps leaves at
//! worst a `*.lvbak` file next to the original path.
//!
//! A vacant path (the file was already moved into the library) skips the
//! backup; a link failure then leaves the path empty and the caller is
//! responsible for moving the master back.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use super::{FsOps, RealFs};

/// Extension carried by swap backup files.
pub const BACKUP_EXTENSION: &str = "lvbak";

static BACKUP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Errors raised by a link swap.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Step 1 failed: the original could not be renamed aside. Nothing changed.
    #[error("cannot back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Hard-link creation failed; the original was restored (or the path was vacant).
    #[error("cannot link {path} -> {target}: {source}")]
    Link {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Hard-link creation failed and the backup could not be renamed back.
    ///
    /// The original path may now be missing while the content survives at
    /// `backup`. Requires manual recovery.
    #[error(
        "INCONSISTENT: {path} is missing, content left at {backup} \
         (link error: {link_error}; restore error: {restore_error})"
    )]
    Inconsistent {
        path: PathBuf,
        backup: PathBuf,
        link_error: io::Error,
        restore_error: io::Error,
    },

    /// A step was called from the wrong state.
    #[error("swap step '{step}' called in state '{state}'")]
    OutOfOrder {
        step: &'static str,
        state: &'static str,
    },
}

impl SwapError {
    /// Whether this error left the filesystem inconsistent.
    #[must_use]
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::Inconsistent { .. })
    }
}

/// Successful swap results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The path is now a hard link to the target.
    Linked,
    /// Linked, but the backup could not be deleted and is orphaned.
    LinkedWithOrphan {
        /// Leftover backup file
        backup: PathBuf,
    },
    /// Dry run: nothing was touched.
    Simulated,
}

/// Position of a [`LinkSwap`] in its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapState {
    /// Nothing done yet.
    Pending,
    /// Original renamed aside (`None` when the path was vacant).
    BackedUp { backup: Option<PathBuf> },
    /// Hard link in place; backup not yet removed.
    Linked { backup: Option<PathBuf> },
    /// Backup removed (or orphaned with a warning). Terminal.
    Cleaned,
    /// Link failed and the original was restored. Terminal.
    RolledBack,
    /// Link failed and the restore failed too. Terminal.
    Inconsistent { backup: PathBuf },
}

impl SwapState {
    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BackedUp { .. } => "backed-up",
            Self::Linked { .. } => "linked",
            Self::Cleaned => "cleaned",
            Self::RolledBack => "rolled-back",
            Self::Inconsistent { .. } => "inconsistent",
        }
    }
}

/// One in-flight replacement of `path` by a link to `target`.
pub struct LinkSwap<'a> {
    path: &'a Path,
    target: &'a Path,
    fs: &'a dyn FsOps,
    state: SwapState,
}

impl<'a> LinkSwap<'a> {
    /// Start a swap in the `Pending` state.
    #[must_use]
    pub fn new(path: &'a Path, target: &'a Path, fs: &'a dyn FsOps) -> Self {
        Self {
            path,
            target,
            fs,
            state: SwapState::Pending,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SwapState {
        &self.state
    }

    /// Step 1: rename the original to a unique sibling backup name.
    ///
    /// # Errors
    ///
    /// [`SwapError::Backup`] if the rename fails; state stays `Pending`.
    pub fn back_up(&mut self) -> Result<(), SwapError> {
        if self.state != SwapState::Pending {
            return Err(self.out_of_order("back_up"));
        }

        if !self.fs.exists(self.path) {
            self.state = SwapState::BackedUp { backup: None };
            return Ok(());
        }

        let backup = backup_path(self.fs, self.path);
        self.fs
            .rename(self.path, &backup)
            .map_err(|source| SwapError::Backup {
                path: self.path.to_path_buf(),
                source,
            })?;
        log::trace!("Backed up {} -> {}", self.path.display(), backup.display());

        self.state = SwapState::BackedUp {
            backup: Some(backup),
        };
        Ok(())
    }

    /// Step 2: create the hard link, rolling back on failure.
    ///
    /// # Errors
    ///
    /// [`SwapError::Link`] after a successful rollback,
    /// [`SwapError::Inconsistent`] if the rollback fails too.
    pub fn link(&mut self) -> Result<(), SwapError> {
        let backup = match &self.state {
            SwapState::BackedUp { backup } => backup.clone(),
            _ => return Err(self.out_of_order("link")),
        };

        let link_error = match self.fs.hard_link(self.target, self.path) {
            Ok(()) => {
                self.state = SwapState::Linked { backup };
                return Ok(());
            }
            Err(e) => e,
        };

        log::error!(
            "Failed to link {} -> {}: {}",
            self.path.display(),
            self.target.display(),
            link_error
        );

        let Some(backup) = backup else {
            self.state = SwapState::RolledBack;
            return Err(SwapError::Link {
                path: self.path.to_path_buf(),
                target: self.target.to_path_buf(),
                source: link_error,
            });
        };

        match self.fs.rename(&backup, self.path) {
            Ok(()) => {
                log::info!("Restored original {}", self.path.display());
                self.state = SwapState::RolledBack;
                Err(SwapError::Link {
                    path: self.path.to_path_buf(),
                    target: self.target.to_path_buf(),
                    source: link_error,
                })
            }
            Err(restore_error) => {
                log::error!(
                    "FATAL: could not restore {} from {}: {}. Manual recovery required.",
                    self.path.display(),
                    backup.display(),
                    restore_error
                );
                self.state = SwapState::Inconsistent {
                    backup: backup.clone(),
                };
                Err(SwapError::Inconsistent {
                    path: self.path.to_path_buf(),
                    backup,
                    link_error,
                    restore_error,
                })
            }
        }
    }

    /// Step 3: delete the backup.
    ///
    /// A failed delete is a warning, not an error: the link is in place.
    ///
    /// # Errors
    ///
    /// Only [`SwapError::OutOfOrder`].
    pub fn clean(&mut self) -> Result<SwapOutcome, SwapError> {
        let backup = match &self.state {
            SwapState::Linked { backup } => backup.clone(),
            _ => return Err(self.out_of_order("clean")),
        };
        self.state = SwapState::Cleaned;

        let Some(backup) = backup else {
            return Ok(SwapOutcome::Linked);
        };

        match self.fs.remove_file(&backup) {
            Ok(()) => Ok(SwapOutcome::Linked),
            Err(e) => {
                log::warn!(
                    "Linked {} but could not delete backup {}: {}",
                    self.path.display(),
                    backup.display(),
                    e
                );
                Ok(SwapOutcome::LinkedWithOrphan { backup })
            }
        }
    }

    /// Run all three steps.
    ///
    /// # Errors
    ///
    /// The first failing step's error.
    pub fn run(mut self) -> Result<SwapOutcome, SwapError> {
        self.back_up()?;
        self.link()?;
        self.clean()
    }

    fn out_of_order(&self, step: &'static str) -> SwapError {
        SwapError::OutOfOrder {
            step,
            state: self.state.name(),
        }
    }
}

/// Entry point for swaps, honoring dry-run mode.
pub struct LinkSwapper {
    fs: Arc<dyn FsOps>,
    dry_run: bool,
}

impl std::fmt::Debug for LinkSwapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSwapper")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl LinkSwapper {
    /// Create a swapper on the real filesystem.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self::with_fs(Arc::new(RealFs), dry_run)
    }

    /// Create a swapper with a custom filesystem implementation.
    #[must_use]
    pub fn with_fs(fs: Arc<dyn FsOps>, dry_run: bool) -> Self {
        Self { fs, dry_run }
    }

    /// Replace `path` with a hard link to `target`'s storage object.
    ///
    /// In dry-run mode nothing is touched and [`SwapOutcome::Simulated`]
    /// is returned.
    ///
    /// # Errors
    ///
    /// See [`LinkSwap::back_up`] and [`LinkSwap::link`].
    pub fn swap(&self, path: &Path, target: &Path) -> Result<SwapOutcome, SwapError> {
        if self.dry_run {
            log::debug!(
                "[dry-run] Would link {} -> {}",
                path.display(),
                target.display()
            );
            return Ok(SwapOutcome::Simulated);
        }

        let outcome = LinkSwap::new(path, target, self.fs.as_ref()).run()?;
        log::debug!("Linked {} -> {}", path.display(), target.display());
        Ok(outcome)
    }
}

/// Pick an unused sibling name for backing up `path`.
fn backup_path(fs: &dyn FsOps, path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    let pid = std::process::id();

    loop {
        let seq = BACKUP_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);

        let mut name = OsString::from(&file_name);
        name.push(format!(".{pid}-{nanos}-{seq}.{BACKUP_EXTENSION}"));
        let candidate = path.with_file_name(name);
        if !fs.exists(&candidate) {
            return candidate;
        }
    }
}

/// Check whether a path looks like a swap backup.
#[must_use]
pub fn is_backup_path(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == BACKUP_EXTENSION)
}
