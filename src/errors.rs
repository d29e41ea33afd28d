//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, PgDumpError>;

/// Failure modes surfaced by the dump and listing operations.
///
/// None of these are retried internally; retry policy is a caller concern.
#[derive(Debug)]
pub enum PgDumpError {
    /// The child process could not be started at all, or its output
    /// pipes could not be captured.
    StartFailure(String),
    /// The wall-clock deadline elapsed before the operation completed.
    /// A best-effort kill was issued to the child process.
    Timeout,
    /// The child process exited with a non-zero code. Carries the exit
    /// code and the complete diagnostic text read from standard error.
    ProcessFailure {
        /// Exit code reported by the process (`-1` if it died to a signal).
        exit_code: i32,
        /// Accumulated standard-error text, best-effort.
        stderr: String,
    },
    /// The caller's own cancellation token fired. The caller asked to
    /// stop; this is a plain cancellation outcome, not a domain fault,
    /// and is never reported as [`PgDumpError::Timeout`].
    Cancelled,
    /// Stream or sink I/O failure while relaying process output.
    Io(String),
}

impl Display for PgDumpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartFailure(msg) => write!(f, "failed to start process: {msg}"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::ProcessFailure { exit_code, stderr } => {
                write!(f, "process failed with exit code {exit_code}: {stderr}")
            }
            Self::Cancelled => write!(f, "operation cancelled by caller"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for PgDumpError {}

impl From<std::io::Error> for PgDumpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
