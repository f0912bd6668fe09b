use super::ConfigError;
use crate::driver::ConnectParams;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys the registry reads. Anything else in a mapping lands in `extra`.
const IDENTIFIER_KEYS: [&str; 2] = ["connection_id", "identifier"];
const HOST: &str = "host";
const DATABASE: &str = "database";
const USERNAME: &str = "username";
const PASSWORD: &str = "password";
const PERSISTENT: &str = "persistent";

/// A validated connection definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub identifier: String,
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Defaults to `true` when the source omits it
    pub persistent: bool,
    /// Unrecognized keys, preserved and otherwise ignored
    pub extra: BTreeMap<String, Value>,
}

impl ConnectionRecord {
    pub fn new(
        identifier: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConnectionRecord {
            identifier: identifier.into(),
            host: host.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            persistent: true,
            extra: BTreeMap::new(),
        }
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Builds a record from a raw key/value mapping.
    ///
    /// `connection_id` takes precedence over `identifier`; when neither is
    /// present `default_identifier` (a section or object key) is used.
    /// A key holding `null` counts as absent. Required fields are checked in
    /// the order identifier, host, database, username, password.
    pub fn from_map(
        map: &Map<String, Value>,
        default_identifier: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let identifier = match IDENTIFIER_KEYS.iter().find_map(|key| present(map, key)) {
            Some(value) => scalar_string("identifier", value)?,
            None => default_identifier
                .map(str::to_string)
                .ok_or_else(|| ConfigError::missing_field("identifier"))?,
        };

        let host = required(map, HOST)?;
        let database = required(map, DATABASE)?;
        let username = required(map, USERNAME)?;
        let password = required(map, PASSWORD)?;
        let persistent = match present(map, PERSISTENT) {
            Some(value) => parse_bool(PERSISTENT, value)?,
            None => true,
        };

        let extra = map
            .iter()
            .filter(|(key, _)| !is_known_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let record = ConnectionRecord {
            identifier,
            host,
            database,
            username,
            password,
            persistent,
            extra,
        };
        record.validate()?;
        Ok(record)
    }

    /// The identifier is the registry key and cannot be blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::invalid_value("identifier", self.identifier.clone()));
        }
        Ok(())
    }

    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            persistent: self.persistent,
        }
    }
}

fn is_known_key(key: &str) -> bool {
    IDENTIFIER_KEYS.contains(&key)
        || matches!(key, HOST | DATABASE | USERNAME | PASSWORD | PERSISTENT)
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| !value.is_null())
}

fn required(map: &Map<String, Value>, field: &'static str) -> Result<String, ConfigError> {
    let value = present(map, field).ok_or_else(|| ConfigError::missing_field(field))?;
    scalar_string(field, value)
}

fn scalar_string(field: &'static str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ConfigError::invalid_value(field, other.to_string())),
    }
}

fn parse_bool(field: &'static str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::invalid_value(field, s.clone())),
        },
        other => Err(ConfigError::invalid_value(field, other.to_string())),
    }
}
