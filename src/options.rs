//! Connection parameters and dump format selection.

/// Connection parameters for the PostgreSQL server being dumped.
///
/// Immutable once constructed. No format-level validation is applied to
/// any field; `pg_dump` and `psql` report unusable values themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Hostname or IP address of the server.
    pub host: String,
    /// Port the server listens on.
    pub port: u16,
    /// Username used for authentication.
    pub username: String,
    /// Password used for authentication. Passed to child processes via
    /// the `PGPASSWORD` environment variable, never on the command line.
    pub password: String,
    /// Name of the database to dump.
    pub database: String,
}

impl ConnectionOptions {
    /// Build connection options for a single server and database.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

/// Output format produced by `pg_dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    /// Plain SQL script.
    Plain,
    /// Custom format archive.
    Custom,
    /// Directory format archive.
    Directory,
    /// Tar archive.
    #[default]
    Tar,
}

impl DumpFormat {
    /// Single-character value for the `-F` flag of `pg_dump`.
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Self::Plain => "p",
            Self::Custom => "c",
            Self::Directory => "d",
            Self::Tar => "t",
        }
    }
}
