//! Deduplication engine.
//!
//! Drives scanner -> hasher -> library store / link swapper, one file at a
//! time, and accounts for every decision in a [`RunSummary`].

pub mod engine;

pub use engine::{
    DedupEngine, EngineConfig, EngineError, FailureKind, FileFailure, FileOutcome, RunIndex,
    RunSummary,
};
