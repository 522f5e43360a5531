//! Per-file deduplication state machine.
//!
//! # Overview
//!
//! For each candidate, in scan order, the engine hashes the content and
//! routes the file by its digest `h`:
//!
//! 1. **`h` seen earlier in this run**: the file is a duplicate of the
//!    recorded master. Alias its name into the digest folder, then swap it
//!    for a hard link.
//! 2. **`h` new to this run, folder already holds a master** (prior run):
//!    record that master and treat the file as a duplicate.
//! 3. **`h` new, folder empty, link-only mode**: the file stays where it is
//!    and becomes the master; the library only gains an alias to it.
//! 4. **`h` new, folder empty, standard mode**: move the file into the
//!    folder and place a hard link back at its original path.
//!
//! Counters move only when a duplicate swap succeeds (or is simulated), so
//! `space_saved` is always the sum of duplicate sizes.
//!
//! # Example
//!
//! ```no_run
//! use linkvault::dedupe::{DedupEngine, EngineConfig};
//! use std::path::PathBuf;
//!
//! let config = EngineConfig::new(PathBuf::from("/data/library")).with_dry_run(true);
//! let mut engine = DedupEngine::new(config);
//! let summary = engine
//!     .run(&[PathBuf::from("/data/photos")], &["*.jpg".to_string()])
//!     .unwrap();
//! println!("{} files deduplicated", summary.deduped_count);
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use thiserror::Error;

use crate::library::{
    AliasOutcome, FsOps, LibraryError, LibraryStore, LinkSwapper, RealFs, SwapError, SwapOutcome,
};
use crate::progress::{ProgressCallback, PHASE_DEDUPE, PHASE_SCAN};
use crate::scanner::walker::absolutize;
use crate::scanner::{
    ContentDigest, FileEntry, Hasher, ScanConfig, ScanError, StorageId, VolumeId, Walker,
};

/// Configuration for a deduplication run.
#[derive(Clone)]
pub struct EngineConfig {
    /// Library root (created if absent).
    pub library_root: PathBuf,
    /// Simulate every mutation.
    pub dry_run: bool,
    /// Leave first-seen files in place as masters.
    pub link_only: bool,
    /// Optional shutdown flag, checked between files.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    /// Filesystem primitives shared by the store and the swapper.
    pub fs_ops: Arc<dyn FsOps>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("library_root", &self.library_root)
            .field("dry_run", &self.dry_run)
            .field("link_only", &self.link_only)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Create a configuration for the given library root.
    #[must_use]
    pub fn new(library_root: PathBuf) -> Self {
        Self {
            library_root,
            dry_run: false,
            link_only: false,
            shutdown_flag: None,
            progress_callback: None,
            fs_ops: Arc::new(RealFs),
        }
    }

    /// Enable or disable simulate-only mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable link-only mode.
    #[must_use]
    pub fn with_link_only(mut self, link_only: bool) -> Self {
        self.link_only = link_only;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Replace the filesystem primitives (failure injection in tests).
    #[must_use]
    pub fn with_fs_ops(mut self, fs_ops: Arc<dyn FsOps>) -> Self {
        self.fs_ops = fs_ops;
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Run-scoped digest -> master path map.
///
/// Created empty at run start, discarded at run end.
#[derive(Debug, Default, Clone)]
pub struct RunIndex {
    masters: HashMap<ContentDigest, PathBuf>,
}

impl RunIndex {
    /// Master recorded for `digest`, if any.
    #[must_use]
    pub fn get(&self, digest: &ContentDigest) -> Option<&Path> {
        self.masters.get(digest).map(PathBuf::as_path)
    }

    /// Record the master for `digest`. Keys are unique; the first record wins.
    pub fn insert(&mut self, digest: ContentDigest, master: PathBuf) {
        self.masters.entry(digest).or_insert(master);
    }

    /// Number of distinct digests recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masters.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    /// Iterate over `(digest, master)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentDigest, &Path)> {
        self.masters.iter().map(|(d, p)| (d, p.as_path()))
    }
}

/// Category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// File could not be read for hashing.
    Hash,
    /// Digest folder could not be created or listed.
    Folder,
    /// New master could not be moved into the library.
    Move,
    /// Hard link could not be created; the original was restored.
    Link,
    /// Hard link failed and restoring the original failed too.
    Inconsistent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Hash => "hash failure",
            Self::Folder => "folder failure",
            Self::Move => "move failure",
            Self::Link => "link failure",
            Self::Inconsistent => "FATAL inconsistency",
        };
        f.write_str(s)
    }
}

/// A file the engine could not process.
#[derive(Debug, Clone)]
pub struct FileFailure {
    /// Path of the file
    pub path: PathBuf,
    /// What went wrong
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file became the master for its digest.
    Master,
    /// The file was replaced by a hard link to the master.
    Deduplicated,
    /// The file already shared the master's storage object.
    AlreadyLinked,
    /// The file was skipped; see the run summary's failures.
    Failed(FailureKind),
}

/// Totals for one engine run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Candidates produced by the scanner
    pub files_found: usize,
    /// Candidates hashed successfully
    pub files_hashed: usize,
    /// Candidates that could not be hashed
    pub hash_failures: usize,
    /// Masters created in this run (moved in, or adopted in place)
    pub unique_masters: usize,
    /// Files replaced by a hard link (projected in dry-run mode)
    pub deduped_count: usize,
    /// Files already sharing their master's storage object
    pub already_linked: usize,
    /// Bytes reclaimed (projected in dry-run mode)
    pub space_saved: u64,
    /// Per-file failures
    pub failures: Vec<FileFailure>,
    /// Paths left in a FatalInconsistency state
    pub inconsistencies: Vec<PathBuf>,
    /// Swap backups that could not be deleted
    pub orphaned_backups: Vec<PathBuf>,
    /// Alias creations that failed
    pub alias_warnings: usize,
    /// Non-fatal scanner errors (missing roots, unreadable directories)
    pub scan_errors: Vec<ScanError>,
    /// The run stopped early on a shutdown request
    pub interrupted: bool,
    /// Nothing was mutated
    pub dry_run: bool,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Whether any file could not be processed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether the scan produced nothing to process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_found == 0
    }

    /// Human-readable bytes saved.
    #[must_use]
    pub fn space_saved_display(&self) -> String {
        ByteSize(self.space_saved).to_string()
    }

    fn record_failure(&mut self, path: &Path, kind: FailureKind, message: String) {
        log::error!("{} for {}: {}", kind, path.display(), message);
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            kind,
            message,
        });
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A source root lives on a different volume than the library.
    #[error(
        "source root {root} and library {library} are on different volumes; hard links cannot cross volumes"
    )]
    VolumeMismatch { root: PathBuf, library: PathBuf },

    /// The volume of a path could not be determined.
    #[error("cannot determine volume of {path}: {source}")]
    VolumeProbe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The library root could not be created.
    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// The deduplication engine. One instance owns one run's state.
pub struct DedupEngine {
    config: EngineConfig,
    store: LibraryStore,
    swapper: LinkSwapper,
    hasher: Hasher,
    index: RunIndex,
    summary: RunSummary,
}

impl DedupEngine {
    /// Create an engine for the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let library_root = absolutize(&config.library_root);
        let store = LibraryStore::with_fs(library_root, config.dry_run, config.fs_ops.clone());
        let swapper = LinkSwapper::with_fs(config.fs_ops.clone(), config.dry_run);

        Self {
            config,
            store,
            swapper,
            hasher: Hasher::new(),
            index: RunIndex::default(),
            summary: RunSummary::default(),
        }
    }

    /// The library store this engine writes to.
    #[must_use]
    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    /// The current run's digest index.
    #[must_use]
    pub fn index(&self) -> &RunIndex {
        &self.index
    }

    /// Verify every existing source root shares the library's volume.
    ///
    /// Missing roots are ignored here; the scanner reports them.
    ///
    /// # Errors
    ///
    /// [`EngineError::VolumeMismatch`] on the first root on another volume.
    pub fn check_volumes(&self, roots: &[PathBuf]) -> Result<(), EngineError> {
        let library = self.store.root();
        let library_volume = VolumeId::of(library).map_err(|source| EngineError::VolumeProbe {
            path: library.to_path_buf(),
            source,
        })?;

        for root in roots {
            if !root.exists() {
                continue;
            }
            let root_volume = VolumeId::of(root).map_err(|source| EngineError::VolumeProbe {
                path: root.clone(),
                source,
            })?;
            if root_volume != library_volume {
                return Err(EngineError::VolumeMismatch {
                    root: root.clone(),
                    library: library.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    /// Scan `roots` and process every candidate.
    ///
    /// Per-file failures are collected in the summary and never abort the
    /// run. A shutdown request stops the run between files.
    ///
    /// # Errors
    ///
    /// [`EngineError::VolumeMismatch`] before any mutation, or
    /// [`EngineError::Library`] if the library root cannot be created.
    pub fn run(
        &mut self,
        roots: &[PathBuf],
        patterns: &[String],
    ) -> Result<RunSummary, EngineError> {
        let start = Instant::now();
        self.index = RunIndex::default();
        self.summary = RunSummary {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        self.check_volumes(roots)?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_SCAN, 0);
        }
        let scan_config =
            ScanConfig::from_patterns(patterns).with_library_root(self.store.root().to_path_buf());
        let scan = Walker::new(roots.to_vec(), scan_config).scan();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_SCAN);
        }

        self.summary.files_found = scan.files.len();
        self.summary.scan_errors = scan.errors;

        if scan.files.is_empty() {
            log::info!("No matching files found");
            self.summary.duration = start.elapsed();
            return Ok(std::mem::take(&mut self.summary));
        }

        self.store.ensure_root()?;

        log::info!(
            "Processing {} file(s) into {}{}",
            scan.files.len(),
            self.store.root().display(),
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_DEDUPE, scan.files.len());
        }

        for (idx, entry) in scan.files.iter().enumerate() {
            if self.config.is_shutdown_requested() {
                log::warn!(
                    "Shutdown requested; stopping after {} of {} file(s)",
                    idx,
                    scan.files.len()
                );
                self.summary.interrupted = true;
                break;
            }

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(idx + 1, &entry.path.to_string_lossy());
            }

            self.process_file(entry);

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_item_completed(entry.size);
                callback.on_message(&format!(
                    "{} linked, {} saved",
                    self.summary.deduped_count,
                    self.summary.space_saved_display()
                ));
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_DEDUPE);
        }

        self.summary.duration = start.elapsed();
        log::info!(
            "Run complete: {} new master(s), {} deduplicated, {} already linked, {} {}, {} failure(s)",
            self.summary.unique_masters,
            self.summary.deduped_count,
            self.summary.already_linked,
            self.summary.space_saved_display(),
            if self.config.dry_run { "projected savings" } else { "saved" },
            self.summary.failures.len()
        );
        Ok(std::mem::take(&mut self.summary))
    }

    /// Route one file through the state machine.
    pub fn process_file(&mut self, entry: &FileEntry) -> FileOutcome {
        let digest = match self.hasher.full_hash(&entry.path) {
            Ok(d) => d,
            Err(e) => {
                self.summary.hash_failures += 1;
                self.summary
                    .record_failure(&entry.path, FailureKind::Hash, e.to_string());
                return FileOutcome::Failed(FailureKind::Hash);
            }
        };
        self.summary.files_hashed += 1;
        log::debug!("{} -> {}", entry.path.display(), digest);

        if let Some(master) = self.index.get(&digest).map(Path::to_path_buf) {
            return self.link_duplicate(entry, &digest, &master);
        }

        let folder = match self.store.ensure_folder(&digest) {
            Ok(f) => f,
            Err(e) => {
                self.summary
                    .record_failure(&entry.path, FailureKind::Folder, e.to_string());
                return FileOutcome::Failed(FailureKind::Folder);
            }
        };

        let existing = match self.store.existing_master(&folder) {
            Ok(m) => m,
            Err(e) => {
                self.summary
                    .record_failure(&entry.path, FailureKind::Folder, e.to_string());
                return FileOutcome::Failed(FailureKind::Folder);
            }
        };

        if let Some(master) = existing {
            log::debug!("Found library master {}", master.display());
            self.index.insert(digest.clone(), master.clone());
            return self.link_duplicate(entry, &digest, &master);
        }

        if self.config.link_only {
            self.adopt_in_place(entry, digest, &folder)
        } else {
            self.relocate_master(entry, digest, &folder)
        }
    }

    /// Replace `entry` with a hard link to `master`.
    fn link_duplicate(
        &mut self,
        entry: &FileEntry,
        digest: &ContentDigest,
        master: &Path,
    ) -> FileOutcome {
        if StorageId::same_object(&entry.path, master) {
            log::debug!("Already linked: {}", entry.path.display());
            self.summary.already_linked += 1;
            return FileOutcome::AlreadyLinked;
        }

        let folder = self.store.folder_for(digest);
        if let Some(name) = entry.path.file_name() {
            if self.store.create_alias(&folder, name, master) == AliasOutcome::Failed {
                self.summary.alias_warnings += 1;
            }
        }

        match self.swapper.swap(&entry.path, master) {
            Ok(outcome) => {
                if let SwapOutcome::LinkedWithOrphan { backup } = outcome {
                    self.summary.orphaned_backups.push(backup);
                }
                self.summary.deduped_count += 1;
                self.summary.space_saved += entry.size;
                log::info!(
                    "Deduplicated {} -> {} ({})",
                    entry.path.display(),
                    master.display(),
                    ByteSize(entry.size)
                );
                FileOutcome::Deduplicated
            }
            Err(e) => self.swap_failed(&entry.path, e),
        }
    }

    /// Link-only mode: the file stays put and the library aliases it.
    fn adopt_in_place(
        &mut self,
        entry: &FileEntry,
        digest: ContentDigest,
        folder: &Path,
    ) -> FileOutcome {
        let mut master = entry.path.clone();

        if let Some(name) = entry.path.file_name() {
            let alias = folder.join(name);
            match self.store.create_alias(folder, name, &entry.path) {
                AliasOutcome::Created => master = alias,
                AliasOutcome::AlreadyPresent if alias.is_file() => master = alias,
                AliasOutcome::Failed => self.summary.alias_warnings += 1,
                _ => {}
            }
        }

        log::info!(
            "New master (in place): {} recorded as {}",
            entry.path.display(),
            master.display()
        );
        self.index.insert(digest, master);
        self.summary.unique_masters += 1;
        FileOutcome::Master
    }

    /// Standard mode: move the file into the library and link it back.
    fn relocate_master(
        &mut self,
        entry: &FileEntry,
        digest: ContentDigest,
        folder: &Path,
    ) -> FileOutcome {
        let Some(name) = entry.path.file_name() else {
            self.summary.record_failure(
                &entry.path,
                FailureKind::Move,
                "path has no file name".to_string(),
            );
            return FileOutcome::Failed(FailureKind::Move);
        };
        let target = folder.join(name);

        if self.store.is_occupied(&target) {
            log::warn!(
                "Intended master path {} is already occupied; treating {} as a duplicate",
                target.display(),
                entry.path.display()
            );
            self.index.insert(digest.clone(), target.clone());
            return self.link_duplicate(entry, &digest, &target);
        }

        if let Err(e) = self.store.relocate(&entry.path, &target) {
            self.summary
                .record_failure(&entry.path, FailureKind::Move, e.to_string());
            return FileOutcome::Failed(FailureKind::Move);
        }

        match self.swapper.swap(&entry.path, &target) {
            Ok(_) => {
                log::info!("New master: {}", target.display());
                self.index.insert(digest, target);
                self.summary.unique_masters += 1;
                FileOutcome::Master
            }
            Err(link_error) => match self.store.relocate(&target, &entry.path) {
                Ok(()) => {
                    log::info!("Moved {} back after failed link", entry.path.display());
                    self.summary
                        .record_failure(&entry.path, FailureKind::Link, link_error.to_string());
                    FileOutcome::Failed(FailureKind::Link)
                }
                Err(restore_error) => {
                    self.summary.inconsistencies.push(entry.path.clone());
                    self.summary.record_failure(
                        &entry.path,
                        FailureKind::Inconsistent,
                        format!(
                            "original path is empty, content left at {} ({}; {})",
                            target.display(),
                            link_error,
                            restore_error
                        ),
                    );
                    FileOutcome::Failed(FailureKind::Inconsistent)
                }
            },
        }
    }

    fn swap_failed(&mut self, path: &Path, error: SwapError) -> FileOutcome {
        let kind = if error.is_inconsistent() {
            self.summary.inconsistencies.push(path.to_path_buf());
            FailureKind::Inconsistent
        } else {
            FailureKind::Link
        };
        self.summary.record_failure(path, kind, error.to_string());
        FileOutcome::Failed(kind)
    }
}

impl std::fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupEngine")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("indexed", &self.index.len())
            .finish()
    }
}
