//! Core Module for connkeeper
//!
//! The registry and everything that dispatches through it: error taxonomy,
//! driver-neutral values, query execution and transaction control.

pub mod error;
pub mod query;
pub mod registry;
pub mod transaction;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{ConnkeeperError, Result};
pub use query::{QueryOutput, ReturnMode};
pub use registry::ConnectionRegistry;
pub use transaction::TransactionOp;
pub use value::{Params, Row, Value};
