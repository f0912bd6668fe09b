//! Query Execution Module
//!
//! Runs parameterized queries against a named connection and shapes the
//! result according to a [`ReturnMode`]. No SQL is built or escaped here;
//! parameter binding belongs to the driver.

use crate::core::value::{Params, Row};
use crate::core::{ConnectionRegistry, ConnkeeperError, Result};
use crate::driver::{Driver, Handle, Statement};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// What `query` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// The executed statement with its cursor still open
    #[default]
    Statement,
    /// The id generated by the insert; the cursor is closed
    LastInsertId,
    /// The number of rows the statement touched; the cursor is closed
    AffectedRows,
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnMode::Statement => write!(f, "statement"),
            ReturnMode::LastInsertId => write!(f, "last-insert-id"),
            ReturnMode::AffectedRows => write!(f, "affected-rows"),
        }
    }
}

impl FromStr for ReturnMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "statement" | "stmt" => Ok(ReturnMode::Statement),
            "last-insert-id" | "insert-id" => Ok(ReturnMode::LastInsertId),
            "affected-rows" | "row-count" => Ok(ReturnMode::AffectedRows),
            other => Err(format!(
                "unknown return mode '{}' (expected statement, last-insert-id or affected-rows)",
                other
            )),
        }
    }
}

/// Result of [`ConnectionRegistry::query`], shaped by the requested mode.
pub enum QueryOutput<'h, H: Handle + 'h> {
    /// Open statement; the caller must close it (or drop it) before running
    /// another statement on the same connection.
    Statement(H::Statement<'h>),
    InsertId(i64),
    RowCount(u64),
}

impl<'h, H: Handle + 'h> QueryOutput<'h, H> {
    pub fn mode(&self) -> ReturnMode {
        match self {
            QueryOutput::Statement(_) => ReturnMode::Statement,
            QueryOutput::InsertId(_) => ReturnMode::LastInsertId,
            QueryOutput::RowCount(_) => ReturnMode::AffectedRows,
        }
    }

    pub fn into_statement(self) -> Option<H::Statement<'h>> {
        match self {
            QueryOutput::Statement(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn insert_id(&self) -> Option<i64> {
        match self {
            QueryOutput::InsertId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn row_count(&self) -> Option<u64> {
        match self {
            QueryOutput::RowCount(count) => Some(*count),
            _ => None,
        }
    }
}

impl<'h, H: Handle + 'h> fmt::Debug for QueryOutput<'h, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Statement(stmt) => f
                .debug_struct("Statement")
                .field("open", &stmt.is_open())
                .field("columns", &stmt.column_names())
                .finish(),
            QueryOutput::InsertId(id) => f.debug_tuple("InsertId").field(id).finish(),
            QueryOutput::RowCount(count) => f.debug_tuple("RowCount").field(count).finish(),
        }
    }
}

impl<D: Driver> ConnectionRegistry<D> {
    /// Executes `text` with `params` on the connection named `identifier`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Registered connection to run on; opened on first use
    /// * `text` - SQL text, passed to the driver untouched
    /// * `params` - Positional or named bind values
    /// * `mode` - How to shape the result
    ///
    /// # Errors
    ///
    /// `UnknownConnection` before the driver is touched if `identifier` is not
    /// registered; `ConnectionFailed` if the handle cannot be opened;
    /// `QueryExecution` carrying the identifier and `text` if the driver
    /// rejects prepare, bind or execute.
    pub fn query<P: Into<Params>>(
        &self,
        identifier: &str,
        text: &str,
        params: P,
        mode: ReturnMode,
    ) -> Result<QueryOutput<'_, D::Handle>> {
        let (handle, mut stmt) = self.run(identifier, text, params.into())?;

        Ok(match mode {
            ReturnMode::Statement => QueryOutput::Statement(stmt),
            ReturnMode::LastInsertId => {
                stmt.close_cursor();
                QueryOutput::InsertId(handle.last_insert_id())
            }
            ReturnMode::AffectedRows => {
                let count = stmt.row_count();
                stmt.close_cursor();
                QueryOutput::RowCount(count)
            }
        })
    }

    /// Runs a statement and returns the number of affected rows.
    pub fn execute<P: Into<Params>>(&self, identifier: &str, text: &str, params: P) -> Result<u64> {
        let (_, mut stmt) = self.run(identifier, text, params.into())?;
        let count = stmt.row_count();
        stmt.close_cursor();
        Ok(count)
    }

    /// Runs an insert and returns the id the driver reports for it.
    pub fn insert<P: Into<Params>>(&self, identifier: &str, text: &str, params: P) -> Result<i64> {
        let (handle, mut stmt) = self.run(identifier, text, params.into())?;
        stmt.close_cursor();
        Ok(handle.last_insert_id())
    }

    /// Runs a query and drains every row, closing the cursor afterwards.
    pub fn fetch_all<P: Into<Params>>(&self, identifier: &str, text: &str, params: P) -> Result<Vec<Row>> {
        let (_, mut stmt) = self.run(identifier, text, params.into())?;
        let rows = stmt
            .fetch_all()
            .map_err(|source| ConnkeeperError::query_execution(identifier, text, source))?;
        stmt.close_cursor();
        Ok(rows)
    }

    fn run(
        &self,
        identifier: &str,
        text: &str,
        params: Params,
    ) -> Result<(&D::Handle, <D::Handle as Handle>::Statement<'_>)> {
        let handle = self.connect(identifier)?;
        trace!(connection = identifier, params = params.len(), "executing query");

        let mut stmt = handle
            .prepare(text)
            .map_err(|source| ConnkeeperError::query_execution(identifier, text, source))?;
        stmt.execute(&params)
            .map_err(|source| ConnkeeperError::query_execution(identifier, text, source))?;
        Ok((handle, stmt))
    }
}
