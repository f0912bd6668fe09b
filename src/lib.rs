// Core infrastructure modules
pub mod core;

// Collaborators: connection definitions and database drivers
pub mod config;
pub mod driver;

#[cfg(test)]
mod test_utils;

pub use crate::config::{ConfigError, ConfigLoader, ConnectionRecord, LoadOptions};
pub use crate::core::{
    ConnectionRegistry, ConnkeeperError, Params, QueryOutput, Result, ReturnMode, Row,
    TransactionOp, Value,
};
pub use crate::driver::{ConnectParams, Driver, DriverError, Handle, SqliteDriver, Statement};
