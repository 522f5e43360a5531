//! File actions module.
//!
//! This module provides functionality for:
//! - Permanent deletion or move to system trash
//! - Pruning folders emptied by a deletion
//! - Auditing the library for unreferenced masters (cleanup mode)
//!
//! ```no_run
//! use linkvault::actions::{CleanupAuditor, CleanupConfig};
//! use std::path::PathBuf;
//!
//! let auditor = CleanupAuditor::new(CleanupConfig::new(PathBuf::from("/data/library")));
//! let audit = auditor.find_candidates().unwrap();
//! println!("{} unreferenced masters", audit.candidates.len());
//! ```

pub mod cleanup;
pub mod delete;

// Re-export commonly used types
pub use cleanup::{
    Audit, CleanupAuditor, CleanupCandidate, CleanupChoice, CleanupConfig, CleanupDecision,
    CleanupError, CleanupPrompt, CleanupReport,
};
pub use delete::{
    delete_file, delete_to_trash, permanent_delete, prune_empty_ancestors, BatchDeleteResult,
    DeleteError, DeleteResult,
};
