//! Structured error handling and exit codes.

use serde::Serialize;

use crate::actions::CleanupError;
use crate::dedupe::EngineError;

/// Process exit codes.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Nothing to do (no matching files, no cleanup candidates)
/// - 3: Partial success (some files failed)
/// - 4: A source root and the library are on different volumes
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Completed, but there was nothing to process.
    NothingToDo = 2,
    /// Completed with per-file failures.
    PartialSuccess = 3,
    /// Aborted before any mutation: hard links cannot cross volumes.
    VolumeMismatch = 4,
    /// Stopped between files by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LV000",
            Self::GeneralError => "LV001",
            Self::NothingToDo => "LV002",
            Self::PartialSuccess => "LV003",
            Self::VolumeMismatch => "LV004",
            Self::Interrupted => "LV130",
        }
    }

    /// Pick the exit code for an error that ended the run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(EngineError::VolumeMismatch { .. }) = err.downcast_ref::<EngineError>() {
            return Self::VolumeMismatch;
        }
        if let Some(CleanupError::LibraryNotFound(_)) = err.downcast_ref::<CleanupError>() {
            return Self::NothingToDo;
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "LV001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
