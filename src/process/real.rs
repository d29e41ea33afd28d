//! Real process backend over `tokio::process`.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use super::{OutputStream, ProcessSpec, ProcessStarter, RunningProcess};
use crate::{PgDumpError, Result};

/// Starts actual operating-system processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProcessStarter;

impl RealProcessStarter {
    /// Construct the default starter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessStarter for RealProcessStarter {
    fn start(&self, spec: &ProcessSpec) -> Result<Box<dyn RunningProcess>> {
        debug!(program = %spec.program, "starting child process");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        // kill_on_drop guarantees the child is released on every exit
        // path, including caller cancellation and panics.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            PgDumpError::StartFailure(format!("could not spawn '{}': {err}", spec.program))
        })?;

        let stdout = child.stdout.take().map(|s| Box::new(s) as OutputStream);
        let stderr = child.stderr.take().map(|s| Box::new(s) as OutputStream);

        Ok(Box::new(RealRunningProcess {
            child,
            stdout,
            stderr,
        }))
    }
}

/// A live child process backed by [`tokio::process::Child`].
struct RealRunningProcess {
    child: Child,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

impl RunningProcess for RealRunningProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(self.child.kill())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<i32>> + Send + '_>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(status.code().unwrap_or(-1))
        })
    }
}
