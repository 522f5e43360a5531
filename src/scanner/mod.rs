//! Scanner module for candidate discovery and content hashing.
//!
//! This module provides functionality for:
//! - Deterministic, sorted directory walking across several source roots
//! - Extension allow-list filtering and library-root exclusion
//! - SHA-256 content hashing
//! - Storage-object identity, volume identity and link-count queries
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Source-root traversal and candidate discovery
//! - [`hasher`]: SHA-256 file hashing (streaming)
//! - [`hardlink`]: device/inode identity and OS link counts
//!
//! # Example
//!
//! ```no_run
//! use linkvault::scanner::{ScanConfig, Walker};
//! use std::path::PathBuf;
//!
//! let config = ScanConfig::from_patterns(&["*.jpg".to_string()])
//!     .with_library_root(PathBuf::from("/data/library"));
//!
//! let walker = Walker::new(vec![PathBuf::from("/data/photos")], config);
//! let scan = walker.scan();
//! for file in &scan.files {
//!     println!("{}: {} bytes", file.path.display(), file.size);
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use hardlink::{FsLinkCounter, LinkCounter, StorageId, VolumeId};
pub use hasher::{ContentDigest, Hasher};
pub use walker::{ScanResult, Walker};

/// A candidate file discovered under a source root.
///
/// Created once per matched file by the [`Walker`] and consumed once by
/// the deduplication engine. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Configuration for candidate discovery.
///
/// Controls the extension allow-list and which subtree (the library)
/// is excluded from the walk.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Lowercase extensions without the leading dot.
    /// Empty means every extension is accepted.
    pub extensions: Vec<String>,

    /// Library root; anything beneath it is never a candidate.
    pub library_root: Option<PathBuf>,
}

impl ScanConfig {
    /// Build a configuration from glob-style patterns such as `*.jpg`.
    ///
    /// A pattern of `*` or `*.*` accepts every file.
    #[must_use]
    pub fn from_patterns(patterns: &[String]) -> Self {
        Self {
            extensions: extensions_from_patterns(patterns),
            library_root: None,
        }
    }

    /// Exclude the given library root from the walk.
    #[must_use]
    pub fn with_library_root(mut self, root: PathBuf) -> Self {
        self.library_root = Some(root);
        self
    }

    /// Check whether a file name's extension is on the allow-list.
    #[must_use]
    pub fn accepts_extension(&self, path: &std::path::Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        self.extensions.iter().any(|e| *e == extension)
    }
}

/// Derive an extension allow-list from glob patterns.
///
/// Strips a leading `*.` (or `.`) and lowercases the rest. Any wildcard-only
/// pattern (`*`, `*.*`) yields an empty list, which accepts all files.
///
/// # Examples
///
/// ```
/// use linkvault::scanner::extensions_from_patterns;
///
/// let exts = extensions_from_patterns(&["*.JPG".to_string(), "png".to_string()]);
/// assert_eq!(exts, vec!["jpg", "png"]);
/// assert!(extensions_from_patterns(&["*.*".to_string()]).is_empty());
/// ```
#[must_use]
pub fn extensions_from_patterns(patterns: &[String]) -> Vec<String> {
    let mut extensions = Vec::new();

    for pattern in patterns {
        let trimmed = pattern.trim();
        let ext = trimmed
            .strip_prefix("*.")
            .or_else(|| trimmed.strip_prefix('.'))
            .unwrap_or(trimmed);

        if ext.is_empty() || ext == "*" {
            return Vec::new();
        }

        let ext = ext.to_lowercase();
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }

    extensions
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while hashing `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
