#![allow(dead_code)]

pub mod fake_driver;

use connkeeper::ConnectionRecord;

/// A complete record for `identifier` pointed at `database`.
pub fn record(identifier: &str, database: &str) -> ConnectionRecord {
    ConnectionRecord::new(identifier, "localhost", database, "u", "p")
}
