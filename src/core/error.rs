//! Connkeeper Error Module
//!
//! Every failure the registry can produce, with enough context (connection
//! identifier, failing query text) to diagnose it without extra logging.
//! Nothing in the crate catches or retries these; they surface to the caller.

use crate::config::ConfigError;
use crate::core::transaction::TransactionOp;
use crate::driver::DriverError;
use thiserror::Error;

/// Error type for registry, query and transaction operations.
#[derive(Error, Debug)]
pub enum ConnkeeperError {
    /// A connection definition was incomplete or could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The identifier already owns a live driver handle
    #[error("Connection '{identifier}' already has a live handle")]
    DuplicateConnection { identifier: String },

    /// No record was registered under the identifier
    #[error("Unknown connection: {identifier}")]
    UnknownConnection { identifier: String },

    /// The driver refused to open a handle for the record
    #[error("Failed to open connection '{identifier}': {source}")]
    ConnectionFailed {
        identifier: String,
        #[source]
        source: DriverError,
    },

    /// The driver rejected prepare, bind or execute
    #[error("Query failed on connection '{identifier}': {source} (query: {query})")]
    QueryExecution {
        identifier: String,
        query: String,
        #[source]
        source: DriverError,
    },

    /// The driver rejected a transaction primitive in its current state
    #[error("Transaction {operation} rejected on connection '{identifier}': {source}")]
    TransactionState {
        identifier: String,
        operation: TransactionOp,
        #[source]
        source: DriverError,
    },
}

impl ConnkeeperError {
    pub fn duplicate_connection(identifier: impl Into<String>) -> Self {
        Self::DuplicateConnection {
            identifier: identifier.into(),
        }
    }

    pub fn unknown_connection(identifier: impl Into<String>) -> Self {
        Self::UnknownConnection {
            identifier: identifier.into(),
        }
    }

    pub fn connection_failed(identifier: impl Into<String>, source: DriverError) -> Self {
        Self::ConnectionFailed {
            identifier: identifier.into(),
            source,
        }
    }

    pub fn query_execution(
        identifier: impl Into<String>,
        query: impl Into<String>,
        source: DriverError,
    ) -> Self {
        Self::QueryExecution {
            identifier: identifier.into(),
            query: query.into(),
            source,
        }
    }

    pub fn transaction_state(
        identifier: impl Into<String>,
        operation: TransactionOp,
        source: DriverError,
    ) -> Self {
        Self::TransactionState {
            identifier: identifier.into(),
            operation,
            source,
        }
    }

    /// The connection identifier the error is about, when there is one.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Config(_) => None,
            Self::DuplicateConnection { identifier }
            | Self::UnknownConnection { identifier }
            | Self::ConnectionFailed { identifier, .. }
            | Self::QueryExecution { identifier, .. }
            | Self::TransactionState { identifier, .. } => Some(identifier),
        }
    }

    /// The underlying driver error, for the variants that wrap one.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::ConnectionFailed { source, .. }
            | Self::QueryExecution { source, .. }
            | Self::TransactionState { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Type alias for Result to use ConnkeeperError as the error type.
pub type Result<T> = std::result::Result<T, ConnkeeperError>;
