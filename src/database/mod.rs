//! Relational database access: catalog introspection and ad-hoc queries.
//!
//! Backends open a fresh connection for every call and drop it before the
//! call returns, so nothing is held between pipeline stages or runs.

pub mod sqlite;
pub mod table;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use sqlite::SqliteDatabase;
pub use table::{Cell, ColumnInfo, ResultTable, StatementEvent};

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;

/// PostgreSQL connection parameters. Available without the `postgres`
/// feature so configuration parses the same either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "admin".into(),
            password: "admin".into(),
            database: "mydb".into(),
        }
    }
}

/// SQL flavour a backend understands, named in the query-generator prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

impl SqlDialect {
    pub fn display_name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::Postgres => "PostgreSQL",
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Driver error; displays the driver's own message.
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("empty SQL statement")]
    EmptyStatement,
    #[error("expected exactly one SQL statement, found more than one")]
    MultipleStatements,
}

#[async_trait]
pub trait Database: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Names of all user tables, sorted.
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError>;

    /// Columns of `table` in declaration order.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError>;

    /// Run one statement and materialize its full result set.
    async fn run_query(&self, sql: &str) -> Result<ResultTable, DatabaseError>;
}
