//! Deterministic fake process backend for tests.
//!
//! Replays a fixed standard-output byte sequence, fixed standard-error
//! text, and a fixed exit code, without touching the operating system.
//! The starter is `Clone` and shares its kill flag between clones, so a
//! test can hand one clone to a client and observe kill requests on the
//! other.

use std::future::Future;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use super::{OutputStream, ProcessSpec, ProcessStarter, RunningProcess};
use crate::Result;

/// Starts fake processes that replay canned output.
#[derive(Debug, Clone)]
pub struct FakeProcessStarter {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
    stalled: bool,
    kill_requested: Arc<AtomicBool>,
}

impl FakeProcessStarter {
    /// Fake whose processes emit `stdout` and exit with `exit_code`.
    #[must_use]
    pub fn new(stdout: impl Into<Vec<u8>>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            exit_code,
            stalled: false,
            kill_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the standard-error text the fake processes emit.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Make standard output hang forever after emitting its configured
    /// bytes, instead of reaching end of stream, so timeout handling can
    /// be exercised deterministically — including mid-relay, with some
    /// output already delivered.
    #[must_use]
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Whether any process started by this fake (or a clone of it)
    /// received a kill request.
    #[must_use]
    pub fn kill_requested(&self) -> bool {
        self.kill_requested.load(Ordering::SeqCst)
    }
}

impl ProcessStarter for FakeProcessStarter {
    fn start(&self, _spec: &ProcessSpec) -> Result<Box<dyn RunningProcess>> {
        let stdout: OutputStream = if self.stalled {
            Box::new(Cursor::new(self.stdout.clone()).chain(StalledReader))
        } else {
            Box::new(Cursor::new(self.stdout.clone()))
        };

        Ok(Box::new(FakeRunningProcess {
            stdout: Some(stdout),
            stderr: Some(Box::new(Cursor::new(self.stderr.clone()))),
            exit_code: self.exit_code,
            kill_requested: Arc::clone(&self.kill_requested),
        }))
    }
}

struct FakeRunningProcess {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit_code: i32,
    kill_requested: Arc<AtomicBool>,
}

impl RunningProcess for FakeRunningProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        self.kill_requested.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<i32>> + Send + '_>> {
        let code = self.exit_code;
        Box::pin(async move { Ok(code) })
    }
}

/// Reader that never yields data and never reaches end of stream.
struct StalledReader;

impl AsyncRead for StalledReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // Never completes; consumers must race it against a cancellation
        // token or a clock.
        Poll::Pending
    }
}
