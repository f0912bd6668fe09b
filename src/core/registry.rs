//! Connection Registry
//!
//! Stores connection records by identifier and opens one driver handle per
//! identifier on first use. Each entry owns its record and a lazily filled
//! handle cell; filling it is guarded by a presence check, not a lock, so the
//! registry is single-threaded (`!Sync`).

use crate::config::{ConfigLoader, ConnectionRecord, LoadOptions};
use crate::core::{ConnkeeperError, Result};
use crate::driver::Driver;
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One registered connection: its definition and, once connected, its handle.
struct Entry<H> {
    record: ConnectionRecord,
    handle: OnceCell<H>,
}

impl<H> Entry<H> {
    fn new(record: ConnectionRecord) -> Self {
        Entry {
            record,
            handle: OnceCell::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.handle.get().is_some()
    }
}

/// Named connections over a single driver.
///
/// # Examples
///
/// ```
/// use connkeeper::{ConnectionRecord, ConnectionRegistry, ReturnMode, SqliteDriver};
///
/// let mut registry = ConnectionRegistry::new(SqliteDriver::new());
/// registry.add_connection(ConnectionRecord::new("rw", "localhost", ":memory:", "u", "p"))?;
///
/// registry.query("rw", "CREATE TABLE t (id INTEGER, v INTEGER)", (), ReturnMode::AffectedRows)?;
/// let id = registry.insert("rw", "INSERT INTO t (id, v) VALUES (1, ?)", [42])?;
/// assert_eq!(id, 1);
/// # Ok::<(), connkeeper::ConnkeeperError>(())
/// ```
pub struct ConnectionRegistry<D: Driver> {
    driver: D,
    entries: HashMap<String, Entry<D::Handle>>,
}

impl<D: Driver> ConnectionRegistry<D> {
    pub fn new(driver: D) -> Self {
        ConnectionRegistry {
            driver,
            entries: HashMap::new(),
        }
    }

    /// Builds a registry from a config file or a directory of config files.
    ///
    /// With `strict == false` files with an unsupported extension are skipped.
    pub fn from_config_path(driver: D, path: impl AsRef<Path>, strict: bool) -> Result<Self> {
        let records = ConfigLoader::with_options(LoadOptions { strict }).load_path(path)?;
        let mut registry = Self::new(driver);
        registry.add_connections(records)?;
        Ok(registry)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Registers a connection definition.
    ///
    /// Re-registering an identifier that has not been connected yet replaces
    /// the stored definition. Once a handle exists the identifier is locked
    /// and this fails with `DuplicateConnection`.
    ///
    /// # Errors
    ///
    /// `Config` if the record fails validation, `DuplicateConnection` if the
    /// identifier already owns a live handle.
    pub fn add_connection(&mut self, record: ConnectionRecord) -> Result<()> {
        record.validate()?;

        if let Some(existing) = self.entries.get(&record.identifier) {
            if existing.is_connected() {
                return Err(ConnkeeperError::duplicate_connection(&record.identifier));
            }
            debug!(connection = %record.identifier, "replacing unconnected definition");
        } else {
            debug!(connection = %record.identifier, "registered connection");
        }

        self.entries
            .insert(record.identifier.clone(), Entry::new(record));
        Ok(())
    }

    /// Validates a raw key/value mapping and registers it.
    pub fn add_connection_map(&mut self, map: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        let record = ConnectionRecord::from_map(map, None)?;
        self.add_connection(record)
    }

    /// Registers records in order, stopping at the first failure.
    pub fn add_connections<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = ConnectionRecord>,
    {
        for record in records {
            self.add_connection(record)?;
        }
        Ok(())
    }

    /// Returns the handle for `identifier`, opening it on first use.
    ///
    /// Every later call returns the same handle instance. There is no
    /// reconnection or health check. A driver failure leaves the identifier
    /// unconnected.
    ///
    /// # Errors
    ///
    /// `UnknownConnection` if nothing is registered under `identifier`,
    /// `ConnectionFailed` if the driver cannot open the handle.
    pub fn connect(&self, identifier: &str) -> Result<&D::Handle> {
        let entry = self
            .entries
            .get(identifier)
            .ok_or_else(|| ConnkeeperError::unknown_connection(identifier))?;

        entry.handle.get_or_try_init(|| {
            debug!(connection = identifier, driver = self.driver.name(), "opening handle");
            self.driver
                .connect(&entry.record.connect_params())
                .map_err(|source| ConnkeeperError::connection_failed(identifier, source))
        })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Whether a handle has been opened for `identifier`.
    pub fn is_connected(&self, identifier: &str) -> bool {
        self.entries
            .get(identifier)
            .map(Entry::is_connected)
            .unwrap_or(false)
    }

    pub fn record(&self, identifier: &str) -> Option<&ConnectionRecord> {
        self.entries.get(identifier).map(|entry| &entry.record)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SqliteDriver;
    use crate::test_utils::{memory_record, memory_registry};

    #[test]
    fn test_reregister_before_connect_replaces() {
        let mut registry = memory_registry();
        registry.add_connection(memory_record("rw")).unwrap();
        registry
            .add_connection(memory_record("rw").with_extra("role", "primary"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let record = registry.record("rw").unwrap();
        assert_eq!(record.extra.get("role"), Some(&serde_json::json!("primary")));
    }

    #[test]
    fn test_reregister_after_connect_fails() {
        let mut registry = memory_registry();
        registry.add_connection(memory_record("rw")).unwrap();
        registry.connect("rw").unwrap();

        match registry.add_connection(memory_record("rw")) {
            Err(ConnkeeperError::DuplicateConnection { identifier }) => assert_eq!(identifier, "rw"),
            other => panic!("Expected DuplicateConnection, got {:?}", other),
        }
    }

    #[test]
    fn test_connect_is_identity_stable() {
        let mut registry = memory_registry();
        registry.add_connection(memory_record("rw")).unwrap();
        assert!(!registry.is_connected("rw"));

        let first = registry.connect("rw").unwrap();
        let second = registry.connect("rw").unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(registry.is_connected("rw"));
    }

    #[test]
    fn test_connect_unknown() {
        let registry = memory_registry();
        match registry.connect("missing") {
            Err(ConnkeeperError::UnknownConnection { identifier }) => assert_eq!(identifier, "missing"),
            other => panic!("Expected UnknownConnection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_connect_failure_leaves_entry_unconnected() {
        let mut registry = ConnectionRegistry::new(SqliteDriver::new());
        registry
            .add_connection(ConnectionRecord::new("bad", "localhost", "/nonexistent/dir/db.sqlite", "u", "p"))
            .unwrap();

        let err = registry.connect("bad").map(|_| ()).unwrap_err();
        assert!(matches!(err, ConnkeeperError::ConnectionFailed { .. }));
        assert!(!registry.is_connected("bad"));

        // still re-registrable because no handle exists
        registry.add_connection(memory_record("bad")).unwrap();
        registry.connect("bad").unwrap();
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let mut registry = memory_registry();
        let err = registry.add_connection(memory_record("")).unwrap_err();
        assert!(matches!(
            err,
            ConnkeeperError::Config(crate::config::ConfigError::InvalidValue { field: "identifier", .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_connection_map_names_missing_field() {
        let mut registry = memory_registry();
        let map = match serde_json::json!({"identifier": "rw", "host": "localhost", "database": ":memory:", "username": "u"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        match registry.add_connection_map(&map) {
            Err(ConnkeeperError::Config(err)) => assert_eq!(err.missing_field_name(), Some("password")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_identifiers_sorted() {
        let mut registry = memory_registry();
        registry
            .add_connections(vec![memory_record("zeta"), memory_record("alpha")])
            .unwrap();
        assert_eq!(registry.identifiers(), vec!["alpha", "zeta"]);
        assert!(registry.contains("alpha"));
        assert!(!registry.contains("beta"));
    }
}
