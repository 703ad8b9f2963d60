//! Result database backends
//!
//! The importer talks to a [`ResultStore`]; which backend is used depends on
//! the `server` argument:
//! - `sqlite:<path>` (or `sqlite://<path>`) opens a local SQLite mirror of the
//!   TestResultWebApp tables
//! - anything else is a MySQL/MariaDB `host` or `host:port`
//!
//! Every store holds one transaction for the whole run. Nothing is visible to
//! other clients before [`ResultStore::finish`] commits.

mod dryrun;
mod mysql;
mod sqlite;

pub use dryrun::DryRun;
pub use mysql::MysqlStore;
pub use sqlite::SqliteStore;

use miette::Diagnostic;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::records::{CaseRecord, FileRecord, HeaderRecord, ResultRecord};

/// Default MySQL port
pub const MYSQL_DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Invalid server '{0}'")]
    #[diagnostic(
        code(robotresults2db::db::server),
        help("Use 'host', 'host:port' or 'sqlite:<path>'")
    )]
    InvalidServer(String),

    #[error("Could not connect to database: {0}")]
    #[diagnostic(code(robotresults2db::db::connect))]
    Connect(String),

    #[error("{context}: {source}")]
    #[diagnostic(code(robotresults2db::db::mysql))]
    Mysql {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: {source}")]
    #[diagnostic(code(robotresults2db::db::sqlite))]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("The database transaction of this run is already finished")]
    #[diagnostic(code(robotresults2db::db::finished))]
    Finished,
}

/// Values of an execution result that already exists in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingResult {
    pub project: String,
    pub version_sw_target: String,
}

/// Where the results go, parsed from the `server` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Server {
    Mysql { host: String, port: u16 },
    Sqlite(PathBuf),
}

impl Server {
    pub fn parse(server: &str) -> Result<Self, StoreError> {
        let server = server.trim();
        if let Some(path) = server
            .strip_prefix("sqlite://")
            .or_else(|| server.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                return Err(StoreError::InvalidServer(server.to_string()));
            }
            return Ok(Server::Sqlite(PathBuf::from(path)));
        }
        if server.is_empty() {
            return Err(StoreError::InvalidServer(server.to_string()));
        }

        match server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| StoreError::InvalidServer(server.to_string()))?;
                Ok(Server::Mysql {
                    host: host.to_string(),
                    port,
                })
            }
            Some(_) => Err(StoreError::InvalidServer(server.to_string())),
            None => Ok(Server::Mysql {
                host: server.to_string(),
                port: MYSQL_DEFAULT_PORT,
            }),
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Server::Mysql { host, port } => write!(f, "{}:{}", host, port),
            Server::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

/// Connection parameters from the command line
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub server: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Only lookups will be made (dry run); a SQLite file is never created
    pub read_only: bool,
}

/// Sink for one import run
///
/// Calls follow the order `existing_result`, `create_result` (skipped when
/// appending), then per test file `create_file`, `create_header` and
/// `create_case` for each test, and finally `finish`.
pub trait ResultStore {
    /// Short name of the backend for messages
    fn backend(&self) -> &'static str;

    /// Look up an execution result by its UUID
    fn existing_result(&mut self, test_result_id: &str) -> Result<Option<ExistingResult>, StoreError>;

    /// Insert the project (if absent) and the `in progress` execution result
    fn create_result(&mut self, result: &ResultRecord) -> Result<(), StoreError>;

    /// Insert a test file and return its `file_id`
    fn create_file(&mut self, file: &FileRecord) -> Result<i64, StoreError>;

    fn create_header(&mut self, file_id: i64, header: &HeaderRecord) -> Result<(), StoreError>;

    /// Insert a test case and return its id
    fn create_case(&mut self, file_id: i64, case: &CaseRecord) -> Result<i64, StoreError>;

    /// Refresh the evaluation tables, mark the result `new report` and commit
    fn finish(&mut self, test_result_id: &str, append: bool) -> Result<(), StoreError>;
}

impl<S: ResultStore + ?Sized> ResultStore for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn existing_result(&mut self, test_result_id: &str) -> Result<Option<ExistingResult>, StoreError> {
        (**self).existing_result(test_result_id)
    }

    fn create_result(&mut self, result: &ResultRecord) -> Result<(), StoreError> {
        (**self).create_result(result)
    }

    fn create_file(&mut self, file: &FileRecord) -> Result<i64, StoreError> {
        (**self).create_file(file)
    }

    fn create_header(&mut self, file_id: i64, header: &HeaderRecord) -> Result<(), StoreError> {
        (**self).create_header(file_id, header)
    }

    fn create_case(&mut self, file_id: i64, case: &CaseRecord) -> Result<i64, StoreError> {
        (**self).create_case(file_id, case)
    }

    fn finish(&mut self, test_result_id: &str, append: bool) -> Result<(), StoreError> {
        (**self).finish(test_result_id, append)
    }
}

/// Open the backend selected by `params.server`
///
/// A read-only SQLite store never touches the disk beyond reading; a MySQL
/// store always opens its transaction, which a dry run leaves to roll back.
pub fn connect(params: &ConnectParams) -> Result<Box<dyn ResultStore>, StoreError> {
    match Server::parse(&params.server)? {
        Server::Sqlite(path) if params.read_only => {
            log::debug!("opening sqlite store at {} read-only", path.display());
            Ok(Box::new(SqliteStore::open_read_only(&path)?))
        }
        Server::Sqlite(path) => {
            log::debug!("opening sqlite store at {}", path.display());
            Ok(Box::new(SqliteStore::open(&path)?))
        }
        Server::Mysql { host, port } => {
            log::debug!("connecting to mysql {}:{} as {}", host, port, params.user);
            Ok(Box::new(MysqlStore::connect(
                &host,
                port,
                &params.user,
                &params.password,
                &params.database,
            )?))
        }
    }
}
