//! SHA-256 file hasher with streaming support.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing SHA-256 digests
//! of file contents using a fixed-size read buffer, and the [`ContentDigest`]
//! newtype that serves as the library's content address.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::HashError;

/// Read buffer size for streaming hashes (64 KiB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Identity of a file's byte content: lowercase hex SHA-256 (64 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Number of hex characters in a digest.
    pub const HEX_LEN: usize = 64;

    /// Parse a digest from its hex form.
    ///
    /// Returns `None` unless the input is exactly 64 hex characters.
    /// Uppercase input is normalized to lowercase.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() == Self::HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// The full hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-character fan-out prefix used for the library layout.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streaming SHA-256 hasher.
///
/// Stateless apart from its buffer size; digests are never cached across files.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 64 KiB read buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Override the read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Hash the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read to
    /// completion (locked, permission denied, vanished mid-scan).
    pub fn full_hash(&self, path: &Path) -> Result<ContentDigest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let digest = self
            .hash_reader(file)
            .map_err(|e| HashError::from_io(path, e))?;
        log::trace!("Hashed {} -> {}", path.display(), digest);
        Ok(digest)
    }

    /// Hash everything a reader yields.
    ///
    /// # Errors
    ///
    /// Propagates any read error other than `Interrupted`.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<ContentDigest> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(ContentDigest(format!("{:x}", hasher.finalize())))
    }

    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> ContentDigest {
        ContentDigest(format!("{:x}", Sha256::digest(data)))
    }
}
