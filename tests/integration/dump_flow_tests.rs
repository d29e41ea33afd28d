//! Dump orchestration flows against the fake process backend.

use std::future::Future;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pgdump::process::{OutputStream, ProcessSpec, RunningProcess};
use pgdump::{
    BufferSink, ConnectionOptions, DumpFormat, FakeProcessStarter, FileSink, PgClient, PgDumpError,
    ProcessStarter,
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

/// Known tar archive used for the byte-identical round-trip scenario.
const TAR_DUMP: &[u8] = include_bytes!("../fixtures/tar_dump.tar");

fn options() -> ConnectionOptions {
    ConnectionOptions::new("localhost", 5432, "user", "pass", "db")
}

fn client_with(starter: &FakeProcessStarter) -> PgClient {
    PgClient::with_starter(options(), Box::new(starter.clone()))
}

/// Every byte the process produces is observed by the sink, in order.
#[tokio::test]
async fn dump_relays_process_output_to_sink() {
    let starter = FakeProcessStarter::new(b"-- dump body --".to_vec(), 0);
    let client = client_with(&starter);
    let mut sink = BufferSink::new();

    client
        .dump(
            &mut sink,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await
        .expect("dump should succeed");

    assert_eq!(sink.bytes(), b"-- dump body --");
}

/// A process replaying a real tar archive produces sink output
/// byte-identical to the archive.
#[tokio::test]
async fn dump_of_tar_archive_is_byte_identical() {
    let starter = FakeProcessStarter::new(TAR_DUMP.to_vec(), 0);
    let client = client_with(&starter);
    let mut sink = BufferSink::new();

    client
        .dump(
            &mut sink,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await
        .expect("dump should succeed");

    assert_eq!(sink.bytes(), TAR_DUMP);
}

/// Dump into a file sink lands the exact bytes on disk.
#[tokio::test]
async fn dump_to_file_sink_writes_the_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("db.tar");
    let starter = FakeProcessStarter::new(TAR_DUMP.to_vec(), 0);
    let client = client_with(&starter);
    let mut sink = FileSink::new(&path);

    client
        .dump(
            &mut sink,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await
        .expect("dump should succeed");

    let written = std::fs::read(&path).expect("read back");
    assert_eq!(written, TAR_DUMP);
}

/// A non-zero exit fails with `ProcessFailure` carrying the exact code
/// and the diagnostic text, even though stdout relayed successfully.
#[tokio::test]
async fn dump_fails_with_exit_code_and_stderr_text() {
    let starter =
        FakeProcessStarter::new(b"partial".to_vec(), 3).with_stderr(b"disk full".to_vec());
    let client = client_with(&starter);
    let mut sink = BufferSink::new();

    let result = client
        .dump(
            &mut sink,
            Duration::from_secs(5),
            DumpFormat::Custom,
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(PgDumpError::ProcessFailure { exit_code, stderr }) => {
            assert_eq!(exit_code, 3);
            assert_eq!(stderr, "disk full");
        }
        other => panic!("expected ProcessFailure, got {other:?}"),
    }
}

/// Diagnostic text is best-effort: when the stderr read itself fails
/// mid-stream, a non-zero exit still fails with `ProcessFailure`
/// carrying whatever partial text was captured before the read error.
#[tokio::test]
async fn dump_failure_keeps_partial_stderr_when_the_drain_errors() {
    let client = PgClient::with_starter(
        options(),
        Box::new(BrokenStderrStarter {
            stderr_prefix: b"out of memory".to_vec(),
            exit_code: 2,
        }),
    );
    let mut sink = BufferSink::new();

    let result = client
        .dump(
            &mut sink,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(PgDumpError::ProcessFailure { exit_code, stderr }) => {
            assert_eq!(exit_code, 2);
            assert_eq!(stderr, "out of memory");
        }
        other => panic!("expected ProcessFailure, got {other:?}"),
    }
}

/// When the deadline elapses the result is `Timeout`, the child receives
/// a kill request, and no success is reported for already-relayed bytes.
#[tokio::test(start_paused = true)]
async fn dump_times_out_and_kills_the_process() {
    let starter = FakeProcessStarter::new(Vec::new(), 0).stalled();
    let client = client_with(&starter);
    let mut sink = BufferSink::new();

    let result = client
        .dump(
            &mut sink,
            Duration::from_secs(30),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(PgDumpError::Timeout)));
    assert!(starter.kill_requested(), "timeout must request a kill");
}

/// A timeout mid-relay is still a hard failure: bytes already delivered
/// to the sink do not turn the outcome into a partial success.
#[tokio::test(start_paused = true)]
async fn dump_times_out_after_partial_relay() {
    let starter = FakeProcessStarter::new(b"early bytes".to_vec(), 0).stalled();
    let client = client_with(&starter);
    let mut sink = BufferSink::new();

    let result = client
        .dump(
            &mut sink,
            Duration::from_secs(30),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(PgDumpError::Timeout)));
    assert!(starter.kill_requested(), "timeout must request a kill");
    assert_eq!(sink.bytes(), b"early bytes", "relay stops where it stalled");
}

/// Caller cancellation before the deadline surfaces as `Cancelled`, never
/// mislabelled as `Timeout`.
#[tokio::test(start_paused = true)]
async fn dump_reports_plain_cancellation_when_caller_cancels_first() {
    let starter = FakeProcessStarter::new(Vec::new(), 0).stalled();
    let client = client_with(&starter);
    let mut sink = BufferSink::new();
    let caller = CancellationToken::new();

    let (result, ()) = tokio::join!(
        client.dump(
            &mut sink,
            Duration::from_secs(3600),
            DumpFormat::Tar,
            caller.clone(),
        ),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            caller.cancel();
        }
    );

    assert!(matches!(result, Err(PgDumpError::Cancelled)));
}

/// Concurrent dumps against independent fakes do not interfere: each
/// call's sink receives exactly its own process's bytes.
#[tokio::test]
async fn concurrent_dumps_are_call_local() {
    let starter_a = FakeProcessStarter::new(b"archive-a".to_vec(), 0);
    let starter_b = FakeProcessStarter::new(b"archive-b".to_vec(), 0);
    let client_a = client_with(&starter_a);
    let client_b = client_with(&starter_b);
    let mut sink_a = BufferSink::new();
    let mut sink_b = BufferSink::new();

    let (res_a, res_b) = tokio::join!(
        client_a.dump(
            &mut sink_a,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        ),
        client_b.dump(
            &mut sink_b,
            Duration::from_secs(5),
            DumpFormat::Tar,
            CancellationToken::new(),
        )
    );

    res_a.expect("dump a");
    res_b.expect("dump b");
    assert_eq!(sink_a.bytes(), b"archive-a");
    assert_eq!(sink_b.bytes(), b"archive-b");
}

/// Starter whose processes emit some standard-error text and then fail
/// the stream with an I/O error, before exiting non-zero.
struct BrokenStderrStarter {
    stderr_prefix: Vec<u8>,
    exit_code: i32,
}

impl ProcessStarter for BrokenStderrStarter {
    fn start(&self, _spec: &ProcessSpec) -> pgdump::Result<Box<dyn RunningProcess>> {
        Ok(Box::new(BrokenStderrProcess {
            stdout: Some(Box::new(Cursor::new(Vec::new()))),
            stderr: Some(Box::new(FailingStream {
                prefix: self.stderr_prefix.clone(),
            })),
            exit_code: self.exit_code,
        }))
    }
}

struct BrokenStderrProcess {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit_code: i32,
}

impl RunningProcess for BrokenStderrProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<i32>> + Send + '_>> {
        let code = self.exit_code;
        Box::pin(async move { Ok(code) })
    }
}

/// Reader that yields its prefix and then returns a broken-pipe error
/// instead of end of stream.
struct FailingStream {
    prefix: Vec<u8>,
}

impl AsyncRead for FailingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.prefix.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stderr pipe broke",
            )));
        }
        let n = self.prefix.len().min(buf.remaining());
        buf.put_slice(&self.prefix[..n]);
        self.prefix.drain(..n);
        Poll::Ready(Ok(()))
    }
}
