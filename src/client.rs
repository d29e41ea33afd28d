//! Dump and listing orchestration.
//!
//! [`PgClient`] owns the process lifecycle for one `pg_dump` or `psql`
//! invocation: it links caller cancellation with a timeout clock, starts
//! the child through the [`ProcessStarter`] seam, relays standard output
//! while draining standard error, decides on kill-on-timeout, and
//! classifies the outcome.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::LinkedSignal;
use crate::options::{ConnectionOptions, DumpFormat};
use crate::output::OutputSink;
use crate::process::{
    OutputStream, ProcessSpec, ProcessStarter, RealProcessStarter, RunningProcess,
};
use crate::{PgDumpError, Result};

/// Environment variable `pg_dump` and `psql` read the password from.
///
/// Passing the credential through the environment keeps it out of the
/// process list, which command-line arguments would expose.
const PASSWORD_ENV: &str = "PGPASSWORD";

/// Query returning one non-template database name per line.
const LIST_DATABASES_QUERY: &str = "SELECT datname FROM pg_database WHERE datistemplate = false;";

/// Client for dumping a PostgreSQL database and listing server databases.
///
/// Each instance holds one set of [`ConnectionOptions`] and one process
/// starter. Calls share no state: every call owns its own process
/// specification, child process, linked cancellation signal, and
/// diagnostic buffer, so concurrent calls do not interfere.
pub struct PgClient {
    options: ConnectionOptions,
    starter: Box<dyn ProcessStarter>,
}

impl PgClient {
    /// Client backed by real operating-system processes.
    #[must_use]
    pub fn new(options: ConnectionOptions) -> Self {
        Self::with_starter(options, Box::new(RealProcessStarter::new()))
    }

    /// Client with an injected process starter.
    #[must_use]
    pub fn with_starter(options: ConnectionOptions, starter: Box<dyn ProcessStarter>) -> Self {
        Self { options, starter }
    }

    /// Dump the configured database into `sink` by supervising a
    /// `pg_dump` child process.
    ///
    /// `timeout` is a hard wall-clock deadline measured from call start;
    /// a process that is still emitting bytes when the deadline elapses
    /// is killed all the same. `cancel` is the caller's own token; pass
    /// a fresh [`CancellationToken`] when no external cancellation is
    /// needed.
    ///
    /// Standard output is relayed into `sink` while standard error is
    /// drained concurrently to completion, so diagnostic text is never
    /// truncated by the relay finishing first. The exit code is
    /// interpreted only after both streams are fully drained.
    ///
    /// # Errors
    ///
    /// - [`PgDumpError::StartFailure`] — `pg_dump` could not be started.
    /// - [`PgDumpError::Timeout`] — the deadline elapsed; the child was
    ///   killed best-effort.
    /// - [`PgDumpError::Cancelled`] — `cancel` fired before the deadline.
    /// - [`PgDumpError::ProcessFailure`] — non-zero exit, with the full
    ///   diagnostic text.
    /// - [`PgDumpError::Io`] — the sink or a stream failed.
    pub async fn dump(
        &self,
        sink: &mut dyn OutputSink,
        timeout: Duration,
        format: DumpFormat,
        cancel: CancellationToken,
    ) -> Result<()> {
        let signal = LinkedSignal::new(cancel, timeout);

        let spec = self.dump_spec(format);
        info!(
            database = %self.options.database,
            format = format.flag(),
            "starting pg_dump"
        );

        let mut process = self.starter.start(&spec)?;
        let mut stdout = take_stdout(process.as_mut())?;
        let stderr = take_stderr(process.as_mut())?;

        // The diagnostic drain runs to completion regardless of the
        // linked signal: an unread stderr pipe can deadlock the child,
        // and a failing process's text must not be lost to cancellation.
        let stderr_task = spawn_stderr_drain(stderr);

        let relayed = sink.write(stdout.as_mut(), signal.token()).await;

        if let Err(err) = relayed {
            // The drain task is detached here; it completes on its own
            // once the child's stderr pipe closes.
            return match err {
                PgDumpError::Cancelled if signal.timed_out() => {
                    // Only timeout expiry justifies the kill; errors are
                    // swallowed since the process may already be gone.
                    if let Err(kill_err) = process.kill().await {
                        warn!(%kill_err, "failed to kill timed-out pg_dump");
                    }
                    Err(PgDumpError::Timeout)
                }
                other => Err(other),
            };
        }

        let diagnostics = await_stderr_drain(stderr_task).await;
        let exit_code = process.wait().await?;

        if exit_code != 0 {
            info!(exit_code, "pg_dump exited with failure");
            return Err(PgDumpError::ProcessFailure {
                exit_code,
                stderr: diagnostics,
            });
        }

        debug!("pg_dump completed");
        Ok(())
    }

    /// List the names of all non-template databases on the server by
    /// supervising a `psql` child process.
    ///
    /// Output is read to end of stream before waiting for exit, so a
    /// producer blocked on a full pipe can never deadlock the wait.
    /// Lines are trimmed of surrounding whitespace and empty lines are
    /// dropped; order and duplicates are preserved exactly as produced.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`PgClient::dump`].
    pub async fn list_databases(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Vec<String>> {
        let signal = LinkedSignal::new(cancel, timeout);

        let spec = self.list_spec();
        info!(host = %self.options.host, "listing databases via psql");

        let mut process = self.starter.start(&spec)?;
        let mut stdout = take_stdout(process.as_mut())?;

        let mut raw = Vec::new();
        tokio::select! {
            read = stdout.read_to_end(&mut raw) => {
                read?;
            }
            () = signal.token().cancelled_owned() => {
                return Err(kill_and_classify(process.as_mut(), &signal).await);
            }
        }

        let waited = tokio::select! {
            code = process.wait() => Some(code),
            () = signal.token().cancelled_owned() => None,
        };
        let Some(code) = waited else {
            return Err(kill_and_classify(process.as_mut(), &signal).await);
        };
        let exit_code = code?;

        if exit_code != 0 {
            let diagnostics = match process.take_stderr() {
                Some(stderr) => drain_stream(stderr).await,
                None => String::new(),
            };
            info!(exit_code, "psql exited with failure");
            return Err(PgDumpError::ProcessFailure {
                exit_code,
                stderr: diagnostics,
            });
        }

        let output = String::from_utf8_lossy(&raw);
        let names = output
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Ok(names)
    }

    fn dump_spec(&self, format: DumpFormat) -> ProcessSpec {
        ProcessSpec {
            program: "pg_dump".to_owned(),
            args: vec![
                "-h".to_owned(),
                self.options.host.clone(),
                "-p".to_owned(),
                self.options.port.to_string(),
                "-U".to_owned(),
                self.options.username.clone(),
                "-d".to_owned(),
                self.options.database.clone(),
                "-F".to_owned(),
                format.flag().to_owned(),
            ],
            env: vec![(PASSWORD_ENV.to_owned(), self.options.password.clone())],
        }
    }

    fn list_spec(&self) -> ProcessSpec {
        // -A -t: unaligned, tuples-only output, so each line is exactly
        // one database name.
        ProcessSpec {
            program: "psql".to_owned(),
            args: vec![
                "-h".to_owned(),
                self.options.host.clone(),
                "-p".to_owned(),
                self.options.port.to_string(),
                "-U".to_owned(),
                self.options.username.clone(),
                "-d".to_owned(),
                "postgres".to_owned(),
                "-c".to_owned(),
                LIST_DATABASES_QUERY.to_owned(),
                "-At".to_owned(),
            ],
            env: vec![(PASSWORD_ENV.to_owned(), self.options.password.clone())],
        }
    }
}

fn take_stdout(process: &mut dyn RunningProcess) -> Result<OutputStream> {
    process
        .take_stdout()
        .ok_or_else(|| PgDumpError::StartFailure("failed to capture stdout".to_owned()))
}

fn take_stderr(process: &mut dyn RunningProcess) -> Result<OutputStream> {
    process
        .take_stderr()
        .ok_or_else(|| PgDumpError::StartFailure("failed to capture stderr".to_owned()))
}

/// Drain a diagnostic stream in the background.
fn spawn_stderr_drain(stderr: OutputStream) -> JoinHandle<String> {
    tokio::spawn(drain_stream(stderr))
}

/// Read a stream to end, keeping whatever arrived if the read fails.
async fn drain_stream(mut stream: OutputStream) -> String {
    let mut buf = Vec::new();
    if let Err(err) = stream.read_to_end(&mut buf).await {
        warn!(%err, "error draining diagnostic stream; keeping partial text");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn await_stderr_drain(task: JoinHandle<String>) -> String {
    match task.await {
        Ok(text) => text,
        Err(err) => {
            warn!(%err, "diagnostic drain task failed");
            String::new()
        }
    }
}

/// Best-effort kill after the linked signal fired, then classify the
/// firing: timeout expiry maps to `Timeout`, caller cancellation stays a
/// plain `Cancelled`.
async fn kill_and_classify(
    process: &mut dyn RunningProcess,
    signal: &LinkedSignal,
) -> PgDumpError {
    if let Err(kill_err) = process.kill().await {
        warn!(%kill_err, "failed to kill cancelled child process");
    }
    if signal.timed_out() {
        PgDumpError::Timeout
    } else {
        PgDumpError::Cancelled
    }
}
