//! Driver Capability Boundary
//!
//! The registry never talks to a database directly. It consumes a driver
//! through the three traits below: a [`Driver`] opens [`Handle`]s, a handle
//! prepares [`Statement`]s and owns transaction state, a statement binds,
//! executes and yields rows. Transport, dialect and result decoding all live
//! behind these traits.

pub mod sqlite;

use crate::core::value::{Params, Row};
use std::fmt;
use thiserror::Error;

pub use sqlite::{SqliteDriver, SqliteHandle, SqliteStatement};

/// An error reported by a driver primitive, passed through verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    /// Driver-specific error code, e.g. the SQLite extended result code
    code: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Everything a driver needs to open one handle.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Whether the driver should keep the physical connection around.
    /// Enforcement is entirely up to the driver.
    pub persistent: bool,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// Opens live handles.
pub trait Driver {
    type Handle: Handle;

    /// Short driver name used in log events.
    fn name(&self) -> &str;

    fn connect(&self, params: &ConnectParams) -> Result<Self::Handle, DriverError>;
}

/// A live connection. The handle is the sole owner of transaction state.
pub trait Handle {
    type Statement<'h>: Statement
    where
        Self: 'h;

    fn prepare(&self, text: &str) -> Result<Self::Statement<'_>, DriverError>;

    /// Identifier generated by the most recent successful insert on this handle.
    fn last_insert_id(&self) -> i64;

    fn begin_transaction(&self) -> Result<(), DriverError>;

    fn commit(&self) -> Result<(), DriverError>;

    fn roll_back(&self) -> Result<(), DriverError>;

    fn in_transaction(&self) -> bool;
}

/// A prepared statement and, once executed, its open cursor.
pub trait Statement {
    /// Binds `params` and runs the statement, opening its cursor.
    fn execute(&mut self, params: &Params) -> Result<(), DriverError>;

    /// Next row from the open cursor, `None` once exhausted or closed.
    fn fetch(&mut self) -> Result<Option<Row>, DriverError>;

    fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn column_names(&self) -> Vec<String>;

    /// Rows affected by the last execution.
    fn row_count(&self) -> u64;

    /// Releases the cursor. Must happen before the next statement on the same handle.
    fn close_cursor(&mut self);

    fn is_open(&self) -> bool;
}
