//! Storage-object identity, volume identity and hard-link counts.
//!
//! # Overview
//!
//! Hard links are multiple directory entries pointing to the same storage
//! object (inode) on disk. The library relies on that: every alias of a
//! master shares one object, and the operating system's own link count
//! tells the cleanup auditor whether anything outside the library still
//! references it.
//!
//! # Platform Support
//!
//! - **Unix**: (device_id, inode) pairs and `st_nlink` from file metadata
//! - **Windows/other**: identity and link counts are reported as unknown;
//!   volume identity falls back to the path prefix (drive letter / UNC share)
//!
//! # Example
//!
//! ```no_run
//! use linkvault::scanner::hardlink::{FsLinkCounter, LinkCounter, StorageId};
//! use std::path::Path;
//!
//! let a = StorageId::of(Path::new("/photos/a.jpg"));
//! let b = StorageId::of(Path::new("/library/ab/ab12/a.jpg"));
//! if a.is_some() && a == b {
//!     println!("already the same storage object");
//! }
//!
//! match FsLinkCounter.link_count(Path::new("/library/ab/ab12/a.jpg")) {
//!     Some(n) => println!("{n} links"),
//!     None => println!("link count unknown"),
//! }
//! ```

use std::fs::{File, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Identity of a storage object: device plus inode.
///
/// Two paths with equal `StorageId`s are hard links to the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId {
    /// Device the object lives on
    pub dev: u64,
    /// Inode number on that device
    pub ino: u64,
}

impl StorageId {
    /// Create an identity from metadata.
    ///
    /// Returns `None` if the platform doesn't expose inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Identity of the object at `path`, without following symlinks.
    #[must_use]
    pub fn of(path: &Path) -> Option<Self> {
        std::fs::symlink_metadata(path)
            .ok()
            .and_then(|m| Self::from_metadata(&m))
    }

    /// Check whether two paths are known to share one storage object.
    ///
    /// `false` when either identity is unknown.
    #[must_use]
    pub fn same_object(a: &Path, b: &Path) -> bool {
        match (Self::of(a), Self::of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

/// Identity of the filesystem volume a path lives on.
///
/// Hard links cannot cross volumes, so every source root must share the
/// library root's `VolumeId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeId {
    /// Unix device number
    Device(u64),
    /// Lowercased path prefix (drive letter or UNC share)
    Prefix(String),
}

impl VolumeId {
    /// Resolve the volume of `path`.
    ///
    /// If `path` does not exist yet, its nearest existing ancestor is used,
    /// so a library root that has not been created can still be checked
    /// without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error when no ancestor of `path` can be inspected.
    pub fn of(path: &Path) -> io::Result<Self> {
        let existing = nearest_existing_ancestor(path)?;
        Self::of_existing(&existing)
    }

    #[cfg(unix)]
    fn of_existing(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self::Device(std::fs::metadata(path)?.dev()))
    }

    #[cfg(not(unix))]
    fn of_existing(path: &Path) -> io::Result<Self> {
        let canonical = std::fs::canonicalize(path)?;
        let prefix = canonical
            .components()
            .find_map(|c| match c {
                Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().to_lowercase()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(Self::Prefix(prefix))
    }
}

/// Walk up from `path` until an existing entry is found.
fn nearest_existing_ancestor(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut current: &Path = &absolute;
    loop {
        if current.exists() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no existing ancestor for {}", path.display()),
                ))
            }
        }
    }
}

/// Check whether `path` lies at or beneath `root`, comparing components
/// case-insensitively.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    let normalize = |c: Component<'_>| c.as_os_str().to_string_lossy().to_lowercase();
    let mut path_components = path.components();
    for root_component in root.components() {
        match path_components.next() {
            Some(p) if normalize(p) == normalize(root_component) => {}
            _ => return false,
        }
    }
    true
}

/// Capability interface for querying an object's hard-link count.
///
/// `None` means "unknown" and must never be treated as a count of one.
pub trait LinkCounter: Send + Sync {
    /// Number of directory entries referencing the object at `path`.
    fn link_count(&self, path: &Path) -> Option<u64>;
}

/// [`LinkCounter`] backed by the operating system's file metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLinkCounter;

impl FsLinkCounter {
    /// Check if link counts are available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

impl LinkCounter for FsLinkCounter {
    fn link_count(&self, path: &Path) -> Option<u64> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Cannot open {} to count links: {}", path.display(), e);
                return None;
            }
        };
        let metadata = match file.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot read metadata for {}: {}", path.display(), e);
                return None;
            }
        };
        nlink(&metadata)
    }
}

#[cfg(unix)]
fn nlink(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.nlink())
}

// Windows exposes the count only through an unstable std API.
#[cfg(not(unix))]
fn nlink(_metadata: &Metadata) -> Option<u64> {
    None
}
