//! Shared fixtures for unit tests.

use crate::config::ConnectionRecord;
use crate::core::ConnectionRegistry;
use crate::driver::SqliteDriver;

/// Registry over the SQLite driver with nothing registered.
pub fn memory_registry() -> ConnectionRegistry<SqliteDriver> {
    ConnectionRegistry::new(SqliteDriver::new())
}

/// A complete record pointing at a private in-memory database.
pub fn memory_record(identifier: &str) -> ConnectionRecord {
    ConnectionRecord::new(identifier, "localhost", ":memory:", "u", "p")
}

/// Registry with one in-memory connection holding table `t(id, v)`.
pub fn registry_with_table(identifier: &str) -> ConnectionRegistry<SqliteDriver> {
    let mut registry = memory_registry();
    registry
        .add_connection(memory_record(identifier))
        .expect("register fixture connection");
    registry
        .connect(identifier)
        .expect("open fixture connection")
        .connection()
        .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER);")
        .expect("create fixture table");
    registry
}
