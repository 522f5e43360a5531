//! Source-root walker built on walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating candidate
//! files under one or more source roots. Output is deduplicated by path and
//! sorted, so the same tree always yields the same sequence and therefore
//! the same choice of master among duplicates.
//!
//! # Features
//!
//! - Multiple roots; a missing root is reported and skipped
//! - Extension allow-list (case-insensitive)
//! - Library-root exclusion (case-insensitive prefix match)
//! - Symlinks and empty files are never candidates
//!
//! # Example
//!
//! ```no_run
//! use linkvault::scanner::{ScanConfig, Walker};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(vec![PathBuf::from("/home/user/Pictures")], ScanConfig::default());
//! let scan = walker.scan();
//! println!("{} candidates, {} errors", scan.files.len(), scan.errors.len());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::hardlink::is_within;
use super::{FileEntry, ScanConfig, ScanError};

/// Outcome of a scan: sorted candidates plus non-fatal errors.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Candidates in lexicographic path order, unique by path
    pub files: Vec<FileEntry>,
    /// Problems encountered along the way (missing roots, unreadable dirs)
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    /// Sum of all candidate sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Directory walker for candidate discovery.
#[derive(Debug)]
pub struct Walker {
    /// Source roots to walk
    roots: Vec<PathBuf>,
    /// Filter configuration
    config: ScanConfig,
}

impl Walker {
    /// Create a new walker over the given roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: ScanConfig) -> Self {
        Self { roots, config }
    }

    /// Walk every root and collect candidates.
    ///
    /// Errors never stop the scan; they are returned alongside the files.
    #[must_use]
    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();
        let mut found: BTreeMap<PathBuf, FileEntry> = BTreeMap::new();

        let library_root = self.config.library_root.as_deref().map(absolutize);

        for root in &self.roots {
            let root = match self.validate_root(root) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Skipping source root: {}", e);
                    result.errors.push(e);
                    continue;
                }
            };

            log::debug!("Scanning {}", root.display());
            self.walk_root(&root, library_root.as_deref(), &mut found, &mut result.errors);
        }

        result.files = found.into_values().collect();
        log::info!(
            "Found {} candidate file(s) under {} root(s)",
            result.files.len(),
            self.roots.len()
        );
        result
    }

    /// Resolve a root to an absolute directory path.
    fn validate_root(&self, root: &Path) -> Result<PathBuf, ScanError> {
        if !root.exists() {
            return Err(ScanError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        std::fs::canonicalize(root).map_err(|e| Self::io_error(root, e))
    }

    fn walk_root(
        &self,
        root: &Path,
        library_root: Option<&Path>,
        found: &mut BTreeMap<PathBuf, FileEntry>,
        errors: &mut Vec<ScanError>,
    ) {
        let walk = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match library_root {
                Some(lib) => !is_within(entry.path(), lib),
                None => true,
            });

        for entry in walk {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    let err = match e.into_io_error() {
                        Some(io) => Self::io_error(&path, io),
                        None => ScanError::Io {
                            path: path.clone(),
                            source: std::io::Error::other("filesystem loop"),
                        },
                    };
                    log::warn!("Walker error: {}", err);
                    errors.push(err);
                    continue;
                }
            };

            // Symlinks are reported as symlinks because follow_links is off
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.config.accepts_extension(path) {
                log::trace!("Skipping file due to extension filter: {}", path.display());
                continue;
            }

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    let err = match e.into_io_error() {
                        Some(io) => Self::io_error(path, io),
                        None => ScanError::NotFound(path.to_path_buf()),
                    };
                    log::warn!("Cannot stat file: {}", err);
                    errors.push(err);
                    continue;
                }
            };

            if size == 0 {
                log::debug!("Skipping empty file: {}", path.display());
                continue;
            }

            found
                .entry(path.to_path_buf())
                .or_insert_with(|| FileEntry::new(path.to_path_buf(), size));
        }
    }

    /// Classify an I/O error for a path.
    fn io_error(path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
            ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            _ => ScanError::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Canonicalize when possible, otherwise make absolute.
///
/// The library root may not exist yet on a first run.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
