//! Process starting seam.
//!
//! The orchestrators never talk to the operating system directly; they
//! depend on the [`ProcessStarter`] trait, which hands back a boxed
//! [`RunningProcess`]. Two implementations exist:
//!
//! - [`real::RealProcessStarter`] spawns actual OS processes via
//!   `tokio::process`.
//! - [`fake::FakeProcessStarter`] replays fixed output and a fixed exit
//!   code, making orchestrator behaviour deterministic in tests without
//!   an external binary.
//!
//! The starter is injected per client instance, never held as global
//! state.

pub mod fake;
pub mod real;

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::Result;

pub use fake::FakeProcessStarter;
pub use real::RealProcessStarter;

/// Byte stream captured from a child process pipe.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Everything needed to start one child process.
///
/// Constructed fresh per invocation and never reused. Credentials travel
/// only in `env`, never in `args`, so they stay out of the process list.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Executable name, resolved via `PATH`.
    pub program: String,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

/// One live child process, exclusively owned by the orchestrator call
/// that started it.
///
/// Both output pipes are captured at start; `take_stdout` / `take_stderr`
/// hand them over exactly once. Dropping the handle releases the process
/// (the real implementation kills the child on drop, so every exit path
/// cleans up).
pub trait RunningProcess: Send {
    /// Take ownership of the standard-output stream.
    ///
    /// Returns `None` on a second call or if the pipe was not captured.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take ownership of the standard-error stream.
    ///
    /// Returns `None` on a second call or if the pipe was not captured.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Forcibly terminate the process.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the signal cannot be
    /// delivered; callers on the timeout path swallow this, since the
    /// process may have already exited naturally.
    fn kill(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;

    /// Wait for the process to exit and return its exit code.
    ///
    /// Reports `-1` when the process was terminated by a signal and no
    /// code exists.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if waiting on the process fails.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<i32>> + Send + '_>>;
}

/// Starts child processes from a [`ProcessSpec`].
///
/// This is the single seam the orchestrators depend on; swapping it out
/// swaps the process backend for one client instance.
pub trait ProcessStarter: Send + Sync {
    /// Start a process with both output pipes captured.
    ///
    /// # Errors
    ///
    /// Returns [`PgDumpError::StartFailure`](crate::PgDumpError::StartFailure)
    /// when the process cannot be spawned or a pipe cannot be captured.
    fn start(&self, spec: &ProcessSpec) -> Result<Box<dyn RunningProcess>>;
}
