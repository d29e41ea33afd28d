//! Supervise `pg_dump` and `psql` child processes from async Rust.
//!
//! The crate launches an external dump process, relays its standard
//! output into a caller-supplied [`OutputSink`], enforces a hard
//! wall-clock timeout, propagates caller cancellation, captures
//! diagnostic output, and maps process outcomes onto a small error
//! taxonomy ([`PgDumpError`]). A companion operation enumerates database
//! names from `psql` line output.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use pgdump::{ConnectionOptions, DumpFormat, FileSink, PgClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> pgdump::Result<()> {
//! let options = ConnectionOptions::new("localhost", 5432, "postgres", "secret", "app");
//! let client = PgClient::new(options);
//! let mut sink = FileSink::new("/tmp/app.dump");
//!
//! client
//!     .dump(
//!         &mut sink,
//!         Duration::from_secs(300),
//!         DumpFormat::Tar,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod cancel;
pub mod client;
pub mod errors;
pub mod options;
pub mod output;
pub mod process;

pub use client::PgClient;
pub use errors::{PgDumpError, Result};
pub use options::{ConnectionOptions, DumpFormat};
pub use output::{BufferSink, FileSink, OutputSink};
pub use process::{
    FakeProcessStarter, ProcessSpec, ProcessStarter, RealProcessStarter, RunningProcess,
};
