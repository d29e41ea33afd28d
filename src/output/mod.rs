//! Output sinks consuming the dump byte stream.
//!
//! A sink receives the child process's standard-output stream and a
//! cancellation token. It must consume the stream fully on success and
//! may abort mid-stream on cancellation or I/O failure. Only one relay
//! writes to a sink per call.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::{PgDumpError, Result};

/// Destination for the dump byte stream.
pub trait OutputSink: Send {
    /// Consume `input` to end of stream, writing it to the destination.
    ///
    /// # Errors
    ///
    /// Returns [`PgDumpError::Cancelled`] when `cancel` fires before the
    /// stream is exhausted, or [`PgDumpError::Io`] on read/write failure.
    fn write<'a>(
        &'a mut self,
        input: &'a mut (dyn AsyncRead + Send + Unpin),
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Copy `input` into `output` until end of stream, racing the token.
///
/// Cancellation is observed at the next suspension point of the copy.
async fn copy_until_cancelled<R, W>(
    input: &mut R,
    output: &mut W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Send + Unpin + ?Sized,
    W: AsyncWrite + Send + Unpin,
{
    tokio::select! {
        // Checked first so an already-fired token aborts before any
        // bytes move.
        biased;
        () = cancel.cancelled_owned() => Err(PgDumpError::Cancelled),
        result = tokio::io::copy(input, output) => {
            result?;
            output.flush().await?;
            Ok(())
        }
    }
}

/// Sink that writes the dump to a file, created or truncated per call.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for FileSink {
    fn write<'a>(
        &'a mut self,
        input: &'a mut (dyn AsyncRead + Send + Unpin),
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut file = tokio::fs::File::create(&self.path).await.map_err(|err| {
                PgDumpError::Io(format!(
                    "failed to create dump file {}: {err}",
                    self.path.display()
                ))
            })?;
            copy_until_cancelled(input, &mut file, cancel).await
        })
    }
}

/// Sink that accumulates the dump in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buf: Vec<u8>,
}

impl BufferSink {
    /// Empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the sink, returning the accumulated bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl OutputSink for BufferSink {
    fn write<'a>(
        &'a mut self,
        input: &'a mut (dyn AsyncRead + Send + Unpin),
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(copy_until_cancelled(input, &mut self.buf, cancel))
    }
}
