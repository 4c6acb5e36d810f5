//! Error taxonomy. Every variant is recoverable: failures degrade the
//! result (partial data, flagged uncertainty) rather than aborting.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("no analyzer for language of {file}")]
    UnsupportedLanguage { file: PathBuf },

    #[error("unreadable content in {file}: {message}")]
    CorruptedFile { file: PathBuf, message: String },

    /// Carried per file as a diagnostic; resolution itself degrades the
    /// edge to `External` instead of failing.
    #[error("unresolved reference to `{name}` in {file}")]
    UnresolvedReference { file: PathBuf, name: String },

    #[error("cache snapshot unreadable: {0}")]
    CacheCorruption(String),

    #[error("cache schema version {found}, expected {expected}")]
    CacheVersionMismatch { found: u32, expected: u32 },

    /// Surfaced to callers as the `incomplete` flag on traversal results,
    /// never thrown mid-query.
    #[error("traversal budget exceeded")]
    TraversalBudgetExceeded,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
