//! Error types for relnotes.
//!
//! Library crates use [`RelnotesError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all relnotes operations.
#[derive(Debug, thiserror::Error)]
pub enum RelnotesError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a changelog source.
    #[error("network error: {0}")]
    Network(String),

    /// Changelog or wire-format parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad arguments, missing prerequisites, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The checkpoint on disk cannot be trusted; resuming over it is refused.
    #[error("malformed checkpoint at {path:?}: {message}")]
    MalformedCheckpoint { path: PathBuf, message: String },

    /// The oracle reported success but the checkpoint offset did not move.
    #[error("stalled batch: processed_offset still at {offset} after a successful oracle call")]
    StalledBatch { offset: usize },

    /// The oracle failed while classifying the batch starting at `offset`.
    #[error("batch at offset {offset} failed (exit code {code:?})")]
    BatchFailed { offset: usize, code: Option<i32> },

    /// The planner succeeded without assigning any new tracking refs.
    #[error("stalled planning: {pending} groups still lack a tracking ref")]
    StalledPlanning { pending: usize },

    /// A fatal oracle workflow returned a non-zero exit.
    #[error("{workflow} workflow failed (exit code {code:?})")]
    OracleFailed { workflow: String, code: Option<i32> },

    /// The oracle subprocess could not be spawned or awaited.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// The oracle subprocess exceeded its fixed timeout and was killed.
    #[error("{workflow} workflow timed out after {secs}s")]
    OracleTimeout { workflow: String, secs: u64 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RelnotesError>;

impl RelnotesError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Flag a checkpoint file as untrustworthy.
    pub fn malformed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::MalformedCheckpoint {
            path: path.into(),
            message: msg.into(),
        }
    }
}
