//! Error handling for the churn workflow.
//!
//! Every fallible library operation returns [`Result<T>`], whose error type is
//! the [`ChurnError`] enum. The variants follow the workflow's taxonomy:
//!
//! - [`ChurnError::Io`]: an input file or a persisted model artifact is
//!   missing, unreadable, or malformed.
//! - [`ChurnError::Config`]: the caller asked for something invalid (unknown
//!   column, missing target, feature/model mismatch, out-of-range option).
//! - [`ChurnError::Precondition`] and [`ChurnError::Stale`]: a workflow stage
//!   was started before the stage it depends on produced usable output. These
//!   are blocking messages for the user, never crashes.
//!
//! Optimizer non-convergence is deliberately *not* an error: it is reported
//! through the `converged` flag on the fitted model and a `tracing` warning.
//!
//! ## Matching on errors
//!
//! ```
//! use churnflow::error::ChurnError;
//!
//! fn describe(err: &ChurnError) -> &'static str {
//!     match err {
//!         ChurnError::Io(_) => "fix the input file",
//!         ChurnError::Precondition { .. } | ChurnError::Stale { .. } => "run an earlier step",
//!         _ => "check the selection",
//!     }
//! }
//! ```
//!
//! ## Adding context
//!
//! The [`ResultExt`] trait adds `.context()` to any result whose error
//! converts into [`ChurnError`]:
//!
//! ```no_run
//! use churnflow::error::ResultExt as _;
//!
//! fn read_notes() -> churnflow::error::Result<String> {
//!     std::fs::read_to_string("notes.txt").context("Failed to read notes")
//! }
//! ```

use std::fmt;

use crate::workflow::Stage;

/// Main error type for churn workflow operations.
#[derive(Debug)]
pub enum ChurnError {
    /// Missing, unreadable or malformed input file or model artifact
    Io(std::io::Error),

    /// Invalid column selection, target, options or feature/model mismatch
    Config(String),

    /// A stage ran before the stage it requires ever completed
    Precondition { stage: Stage, requires: Stage },

    /// A stage ran on output that an earlier re-run has invalidated
    Stale { stage: Stage, rerun: Stage },

    /// Data frame or estimator failures outside of loading
    DataProcessing(String),

    /// Generic error with context
    Other(String),
}

impl ChurnError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that only mean "complete an earlier step first".
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Precondition { .. } | Self::Stale { .. })
    }
}

impl fmt::Display for ChurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Precondition { stage, requires } => write!(
                f,
                "{stage} needs output from {requires}: complete the {requires} step first"
            ),
            Self::Stale { stage, rerun } => write!(
                f,
                "{stage} input is out of date: re-run the {rerun} step first"
            ),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ChurnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChurnError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for ChurnError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::DataProcessing(format!("Shape error: {err}"))
    }
}

/// Result type alias for churn workflow operations.
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ChurnError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| wrap(msg.into(), e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(f(), e.into()))
    }
}

// I/O errors keep their kind so callers can still tell a missing file apart.
fn wrap(msg: String, err: ChurnError) -> ChurnError {
    match err {
        ChurnError::Io(e) => ChurnError::Io(std::io::Error::new(e.kind(), format!("{msg}: {e}"))),
        ChurnError::Config(inner) => ChurnError::Config(format!("{msg}: {inner}")),
        other => ChurnError::Other(format!("{msg}: {other}")),
    }
}
