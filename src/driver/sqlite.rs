//! SQLite driver backed by rusqlite.
//!
//! `database` is a file path (or `:memory:`); host, username and password are
//! accepted for interface parity and ignored by SQLite. Row-returning
//! statements are stepped to completion on execute and their rows buffered,
//! so the cursor never holds a borrow of the statement.

use super::{ConnectParams, Driver, DriverError, Handle, Statement};
use crate::core::value::{Params, Row, Value};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const MEMORY_DATABASE: &str = ":memory:";

/// Opens rusqlite connections.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    /// Relative database paths resolve against this directory when set
    base_dir: Option<PathBuf>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        SqliteDriver { base_dir: None }
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        SqliteDriver {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, database: &str) -> PathBuf {
        let path = Path::new(database);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Driver for SqliteDriver {
    type Handle = SqliteHandle;

    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, params: &ConnectParams) -> Result<SqliteHandle, DriverError> {
        let (conn, path) = if params.database == MEMORY_DATABASE {
            (Connection::open_in_memory()?, None)
        } else {
            let path = self.resolve(&params.database);
            (Connection::open(&path)?, Some(path))
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!(database = %params.database, persistent = params.persistent, "opened sqlite handle");

        Ok(SqliteHandle {
            conn,
            path,
            persistent: params.persistent,
        })
    }
}

/// A live SQLite connection.
#[derive(Debug)]
pub struct SqliteHandle {
    conn: Connection,
    path: Option<PathBuf>,
    persistent: bool,
}

impl SqliteHandle {
    /// The underlying rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Database file path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

impl Handle for SqliteHandle {
    type Statement<'h> = SqliteStatement<'h>;

    fn prepare(&self, text: &str) -> Result<SqliteStatement<'_>, DriverError> {
        let mut batch = Batch::new(&self.conn, text);
        let stmt = batch
            .next()?
            .ok_or_else(|| DriverError::new("no SQL statement to prepare"))?;
        // whitespace, comments and trailing semicolons yield nothing here
        if !matches!(batch.next(), Ok(None)) {
            return Err(DriverError::new(
                "query text contains more than one statement",
            ));
        }
        Ok(SqliteStatement::new(&self.conn, stmt))
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn begin_transaction(&self) -> Result<(), DriverError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn roll_back(&self) -> Result<(), DriverError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

/// A prepared rusqlite statement plus its buffered cursor.
pub struct SqliteStatement<'c> {
    conn: &'c Connection,
    stmt: rusqlite::Statement<'c>,
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
    row_count: u64,
    open: bool,
}

impl<'c> SqliteStatement<'c> {
    fn new(conn: &'c Connection, stmt: rusqlite::Statement<'c>) -> Self {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        SqliteStatement {
            conn,
            stmt,
            columns: columns.into(),
            rows: VecDeque::new(),
            row_count: 0,
            open: false,
        }
    }
}

impl Statement for SqliteStatement<'_> {
    fn execute(&mut self, params: &Params) -> Result<(), DriverError> {
        self.close_cursor();

        let columns = Arc::clone(&self.columns);
        let (rows, row_count) = match params {
            Params::None => run(self.conn, &mut self.stmt, &columns, params_from_iter(std::iter::empty::<&Value>()))?,
            Params::Positional(values) => run(self.conn, &mut self.stmt, &columns, params_from_iter(values.iter()))?,
            Params::Named(pairs) => {
                let names: Vec<String> = pairs.iter().map(|(name, _)| placeholder(name)).collect();
                let named: Vec<(&str, &dyn ToSql)> = names
                    .iter()
                    .zip(pairs)
                    .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
                    .collect();
                run(self.conn, &mut self.stmt, &columns, named.as_slice())?
            }
        };

        self.rows = rows;
        self.row_count = row_count;
        self.open = true;
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<Row>, DriverError> {
        if !self.open {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.to_vec()
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close_cursor(&mut self) {
        self.rows.clear();
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Binds and steps the statement. Statements without result columns report
/// their change count; row-returning ones report the number of rows produced.
fn run<P: rusqlite::Params>(
    conn: &Connection,
    stmt: &mut rusqlite::Statement<'_>,
    columns: &Arc<[String]>,
    params: P,
) -> rusqlite::Result<(VecDeque<Row>, u64)> {
    if stmt.column_count() == 0 {
        // sqlite3_changes() keeps the previous DML count across DDL, so only
        // trust it when this statement moved the connection's total
        let before = total_changes(conn)?;
        let changed = stmt.execute(params)?;
        let moved = total_changes(conn)? != before;
        return Ok((VecDeque::new(), if moved { changed as u64 } else { 0 }));
    }

    let mut buffered = VecDeque::new();
    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(Value::from(row.get_ref(idx)?));
        }
        buffered.push_back(Row::new(Arc::clone(columns), values));
    }
    let count = buffered.len() as u64;
    Ok((buffered, count))
}

fn total_changes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
}

/// SQLite wants the sigil as part of the parameter name.
fn placeholder(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            // TEXT that is not valid UTF-8 keeps its bytes
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => Value::Blob(t.to_vec()),
            },
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _) => {
                DriverError::with_code(err.to_string(), code.extended_code.to_string())
            }
            _ => DriverError::new(err.to_string()),
        }
    }
}
