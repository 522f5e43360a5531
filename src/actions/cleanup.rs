//! Library cleanup auditor.
//!
//! # Overview
//!
//! A library master whose operating-system link count is exactly 1 has no
//! directory entry left outside its own library folder: every source copy
//! that pointed at it has been deleted. The auditor finds those masters,
//! asks for confirmation and removes them, pruning the digest and prefix
//! folders they leave empty.
//!
//! Only files at least two folder levels below the root (inside
//! `<prefix>/<digest>/`) are considered. A file whose link count cannot be
//! determined is never a candidate.
//!
//! # Example
//!
//! ```no_run
//! use linkvault::actions::cleanup::{CleanupAuditor, CleanupConfig};
//! use linkvault::prompt::AutoConfirm;
//! use std::path::PathBuf;
//!
//! let auditor = CleanupAuditor::new(CleanupConfig::new(PathBuf::from("/data/library")));
//! let report = auditor.run(&mut AutoConfirm).unwrap();
//! println!("{}", report.deleted.summary());
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytesize::ByteSize;
use thiserror::Error;
use walkdir::WalkDir;

use super::delete::{delete_file, prune_empty_ancestors, BatchDeleteResult, DeleteError, DeleteResult};
use crate::library::swap::is_backup_path;
use crate::progress::{ProgressCallback, PHASE_AUDIT, PHASE_DELETE};
use crate::scanner::{FsLinkCounter, LinkCounter};

/// Files must sit at least this deep below the root (`prefix/digest/file`).
pub const MIN_CANDIDATE_DEPTH: usize = 3;

/// Maximum number of empty ancestor folders removed per deleted file.
pub const MAX_PRUNE_LEVELS: usize = 3;

/// A library file with no remaining external reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupCandidate {
    /// Path inside the library
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupChoice {
    /// Delete every candidate.
    Delete,
    /// Show the candidates, then ask again.
    List,
    /// Leave everything in place.
    Cancel,
}

/// Interactive confirmation seam.
pub trait CleanupPrompt {
    /// Ask what to do with `count` candidates totalling `total_bytes`.
    ///
    /// # Errors
    ///
    /// Any I/O error talking to the user.
    fn choose(&mut self, count: usize, total_bytes: u64) -> io::Result<CleanupChoice>;

    /// Show the candidate list.
    ///
    /// # Errors
    ///
    /// Any I/O error talking to the user.
    fn show_list(&mut self, candidates: &[CleanupCandidate]) -> io::Result<()>;
}

/// Errors that abort a cleanup.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The library root does not exist.
    #[error("library not found: {0}")]
    LibraryNotFound(PathBuf),

    /// The library root is not a directory.
    #[error("library is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Talking to the user failed.
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] io::Error),
}

/// Configuration for the cleanup auditor.
#[derive(Clone)]
pub struct CleanupConfig {
    /// Library root to audit.
    pub library_root: PathBuf,
    /// Report projected deletions only.
    pub dry_run: bool,
    /// Send deleted masters to the system trash.
    pub use_trash: bool,
    /// Link-count capability.
    pub link_counter: Arc<dyn LinkCounter>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for CleanupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupConfig")
            .field("library_root", &self.library_root)
            .field("dry_run", &self.dry_run)
            .field("use_trash", &self.use_trash)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl CleanupConfig {
    /// Audit `library_root` with the operating system's link counts.
    #[must_use]
    pub fn new(library_root: PathBuf) -> Self {
        Self {
            library_root,
            dry_run: false,
            use_trash: false,
            link_counter: Arc::new(FsLinkCounter),
            progress_callback: None,
        }
    }

    /// Enable or disable simulate-only mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Send deletions to the system trash.
    #[must_use]
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Replace the link-count capability.
    #[must_use]
    pub fn with_link_counter(mut self, counter: Arc<dyn LinkCounter>) -> Self {
        self.link_counter = counter;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Findings of a library audit.
#[derive(Debug, Default)]
pub struct Audit {
    /// Files with link count exactly 1, in path order
    pub candidates: Vec<CleanupCandidate>,
    /// Files still referenced elsewhere
    pub referenced: usize,
    /// Files whose link count could not be determined
    pub unknown: Vec<PathBuf>,
    /// Entries the walk could not read
    pub walk_errors: usize,
}

impl Audit {
    /// Reclaimable bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size).sum()
    }
}

/// How a cleanup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupDecision {
    /// No candidates were found.
    NothingToDo,
    /// The user declined.
    Cancelled,
    /// Candidates were deleted (or would have been, in dry-run mode).
    Deleted,
}

/// Outcome of a cleanup run.
#[derive(Debug)]
pub struct CleanupReport {
    /// Audit findings
    pub audit: Audit,
    /// What was decided
    pub decision: CleanupDecision,
    /// Deletions performed (projected in dry-run mode)
    pub deleted: BatchDeleteResult,
    /// Empty folders removed
    pub pruned_folders: usize,
    /// Nothing was mutated
    pub dry_run: bool,
}

/// Finds and removes unreferenced library masters.
#[derive(Debug)]
pub struct CleanupAuditor {
    config: CleanupConfig,
}

impl CleanupAuditor {
    /// Create an auditor.
    #[must_use]
    pub fn new(config: CleanupConfig) -> Self {
        Self { config }
    }

    /// Walk the library and classify every master by link count.
    ///
    /// # Errors
    ///
    /// [`CleanupError::LibraryNotFound`] or [`CleanupError::NotADirectory`].
    pub fn find_candidates(&self) -> Result<Audit, CleanupError> {
        let root = &self.config.library_root;
        if !root.exists() {
            return Err(CleanupError::LibraryNotFound(root.clone()));
        }
        if !root.is_dir() {
            return Err(CleanupError::NotADirectory(root.clone()));
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_AUDIT, 0);
        }

        let mut audit = Audit::default();
        let walk = WalkDir::new(root)
            .min_depth(MIN_CANDIDATE_DEPTH)
            .follow_links(false)
            .sort_by_file_name();

        for (idx, entry) in walk.into_iter().enumerate() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Cannot read library entry: {}", e);
                    audit.walk_errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || is_backup_path(entry.path()) {
                continue;
            }

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(idx + 1, &entry.path().to_string_lossy());
            }

            match self.config.link_counter.link_count(entry.path()) {
                Some(1) => {
                    let size = match entry.metadata() {
                        Ok(m) => m.len(),
                        Err(e) => {
                            log::warn!("Cannot stat {}: {}", entry.path().display(), e);
                            audit.walk_errors += 1;
                            continue;
                        }
                    };
                    log::debug!("Unreferenced master: {}", entry.path().display());
                    audit.candidates.push(CleanupCandidate {
                        path: entry.path().to_path_buf(),
                        size,
                    });
                }
                Some(n) => {
                    log::trace!("{} has {} links", entry.path().display(), n);
                    audit.referenced += 1;
                }
                None => {
                    log::warn!(
                        "Link count unknown for {}; excluded from cleanup",
                        entry.path().display()
                    );
                    audit.unknown.push(entry.path().to_path_buf());
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_AUDIT);
        }

        log::info!(
            "Audit: {} unreferenced ({}), {} referenced, {} unknown",
            audit.candidates.len(),
            ByteSize(audit.total_bytes()),
            audit.referenced,
            audit.unknown.len()
        );
        Ok(audit)
    }

    /// Audit, confirm with `prompt`, and delete.
    ///
    /// The prompt is asked until it answers delete or cancel.
    ///
    /// # Errors
    ///
    /// Audit errors, or [`CleanupError::Prompt`].
    pub fn run(&self, prompt: &mut dyn CleanupPrompt) -> Result<CleanupReport, CleanupError> {
        let audit = self.find_candidates()?;
        let mut report = CleanupReport {
            audit,
            decision: CleanupDecision::NothingToDo,
            deleted: BatchDeleteResult::default(),
            pruned_folders: 0,
            dry_run: self.config.dry_run,
        };

        if report.audit.candidates.is_empty() {
            log::info!("No unreferenced masters found");
            return Ok(report);
        }

        loop {
            let choice = prompt
                .choose(report.audit.candidates.len(), report.audit.total_bytes())
                .map_err(CleanupError::Prompt)?;
            match choice {
                CleanupChoice::List => prompt
                    .show_list(&report.audit.candidates)
                    .map_err(CleanupError::Prompt)?,
                CleanupChoice::Cancel => {
                    log::info!("Cleanup cancelled");
                    report.decision = CleanupDecision::Cancelled;
                    return Ok(report);
                }
                CleanupChoice::Delete => break,
            }
        }

        let (deleted, pruned) = self.delete_candidates(&report.audit.candidates);
        report.deleted = deleted;
        report.pruned_folders = pruned;
        report.decision = CleanupDecision::Deleted;
        Ok(report)
    }

    /// Delete candidates, re-checking each link count first.
    ///
    /// Failures are recorded per file and never stop the batch. Returns
    /// the batch result and the number of folders pruned.
    pub fn delete_candidates(&self, candidates: &[CleanupCandidate]) -> (BatchDeleteResult, usize) {
        let mut batch = BatchDeleteResult::default();
        let mut pruned = 0;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_DELETE, candidates.len());
        }

        for (idx, candidate) in candidates.iter().enumerate() {
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(idx + 1, &candidate.path.to_string_lossy());
            }

            if let Err(e) = self.verify_unreferenced(&candidate.path) {
                log::warn!("{}", e);
                batch.push_failure(&e);
                continue;
            }

            if self.config.dry_run {
                log::info!(
                    "[dry-run] Would delete {} ({} bytes)",
                    candidate.path.display(),
                    candidate.size
                );
                batch.push_success(DeleteResult::new(
                    candidate.path.clone(),
                    candidate.size,
                    !self.config.use_trash,
                ));
                continue;
            }

            match delete_file(&candidate.path, self.config.use_trash) {
                Ok(result) => {
                    batch.push_success(result);
                    pruned += prune_empty_ancestors(
                        &candidate.path,
                        &self.config.library_root,
                        MAX_PRUNE_LEVELS,
                    )
                    .len();
                }
                Err(e) => batch.push_failure(&e),
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_DELETE);
        }

        log::info!("{}", batch.summary());
        (batch, pruned)
    }

    fn verify_unreferenced(&self, path: &Path) -> Result<(), DeleteError> {
        match self.config.link_counter.link_count(path) {
            Some(1) => Ok(()),
            Some(n) => Err(DeleteError::StillReferenced {
                path: path.to_path_buf(),
                links: format!("{n} links"),
            }),
            None => Err(DeleteError::StillReferenced {
                path: path.to_path_buf(),
                links: "unknown".to_string(),
            }),
        }
    }
}
