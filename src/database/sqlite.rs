//! SQLite backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OpenFlags, Statement};

use super::{Cell, ColumnInfo, Database, DatabaseError, ResultTable, SqlDialect};

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    read_only: bool,
}

impl SqliteDatabase {
    /// Point at a database file. The file must already exist; it is opened
    /// on each call, never created.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    /// Open connections with `SQLITE_OPEN_READ_ONLY`, so generated statements
    /// cannot modify the file.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn open(&self) -> Result<Connection, DatabaseError> {
        let mode = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let conn = Connection::open_with_flags(
            &self.path,
            mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// Open a scoped connection on the blocking pool, run `f`, and drop the
    /// connection before returning.
    async fn with_conn<F, R>(&self, f: F) -> Result<R, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<R, DatabaseError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open()?;
            f(&conn)
        })
        .await
        .map_err(|e| DatabaseError::Join(e.to_string()))?
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let table = table.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
            let columns = stmt
                .query_map([&table], |row| {
                    let name: String = row.get(0)?;
                    let declared: String = row.get(1)?;
                    Ok(ColumnInfo::new(name, declared_type(&declared)))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .await
    }

    async fn run_query(&self, sql: &str) -> Result<ResultTable, DatabaseError> {
        let sql = sql.to_string();
        self.with_conn(move |conn| {
            let mut stmt = prepare_single(conn, &sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = columns.len();

            let mut rows = Vec::new();
            let mut cursor = stmt.query([])?;
            while let Some(row) = cursor.next()? {
                let mut cells = Vec::with_capacity(width);
                for idx in 0..width {
                    cells.push(cell_from(row.get_ref(idx)?));
                }
                rows.push(cells);
            }
            Ok(ResultTable::new(columns, rows))
        })
        .await
    }
}

/// Prepare `sql`, which must hold exactly one statement. Trailing
/// semicolons, whitespace and comments are not statements.
fn prepare_single<'conn>(
    conn: &'conn Connection,
    sql: &str,
) -> Result<Statement<'conn>, DatabaseError> {
    let mut batch = Batch::new(conn, sql);
    let stmt = batch.next()?.ok_or(DatabaseError::EmptyStatement)?;
    if batch.next()?.is_some() {
        return Err(DatabaseError::MultipleStatements);
    }
    Ok(stmt)
}

fn declared_type(declared: &str) -> String {
    let trimmed = declared.trim();
    if trimmed.is_empty() {
        "ANY".to_string()
    } else {
        trimmed.to_uppercase()
    }
}

fn cell_from(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(v) => Cell::Integer(v),
        ValueRef::Real(v) => Cell::Real(v),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Cell::Blob(bytes.to_vec()),
    }
}
