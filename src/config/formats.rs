//! Format parsers for connection definition files.
//!
//! Every parser turns file text into a `serde_json::Value`; shaping that value
//! into records is format independent and happens in the loader.

use ::config::{Config, File, FileFormat};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Parses file contents into a generic value. Errors are plain messages; the
/// loader attaches the path.
pub type ParseFn = fn(&str) -> Result<Value, String>;

/// Maps lowercase file extensions to parsers.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = ParserRegistry::empty();
        registry.register("ini", parse_ini);
        registry.register("toml", parse_toml);
        registry.register("json", parse_json);
        registry
    }
}

impl ParserRegistry {
    pub fn empty() -> Self {
        ParserRegistry {
            parsers: HashMap::new(),
        }
    }

    /// Adds or replaces the parser for `extension` (matched case-insensitively).
    pub fn register(&mut self, extension: &str, parser: ParseFn) {
        self.parsers
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), parser);
    }

    pub fn get(&self, extension: &str) -> Option<ParseFn> {
        self.parsers.get(&extension.to_ascii_lowercase()).copied()
    }

    pub fn parser_for(&self, path: &Path) -> Option<ParseFn> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get(ext))
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

pub fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

pub fn parse_toml(text: &str) -> Result<Value, String> {
    toml::from_str(text).map_err(|e| e.to_string())
}

/// Flat key/value sections, read with the `config` crate's INI format:
///
/// ```text
/// ; comment
/// [rw]
/// host = localhost
/// password = "p;w"
/// ```
///
/// Keys before the first section form a single unnamed mapping; mixing them
/// with sections is rejected. Values stay strings.
pub fn parse_ini(text: &str) -> Result<Value, String> {
    let value: Value = Config::builder()
        .add_source(File::from_str(text, FileFormat::Ini))
        .build()
        .and_then(|config| config.try_deserialize())
        .map_err(|e| e.to_string())?;

    match &value {
        Value::Object(map) => {
            let sections = map.values().filter(|v| v.is_object()).count();
            if sections > 0 && sections < map.len() {
                return Err("keys outside of a section cannot be mixed with sections".to_string());
            }
            Ok(value)
        }
        other => Err(format!("expected key/value sections, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ini_sections() {
        let value = parse_ini(
            r#"
; connections
[rw]
host = localhost
database = testdb
username = u
password = "p;w"

# replica
[ro]
host = replica
persistent = off
"#,
        )
        .unwrap();

        assert_eq!(value["rw"]["host"], json!("localhost"));
        assert_eq!(value["rw"]["password"], json!("p;w"));
        assert_eq!(value["ro"]["host"], json!("replica"));
        assert_eq!(value["ro"]["persistent"], json!("off"));
    }

    #[test]
    fn test_parse_ini_root_keys() {
        let value = parse_ini("connection_id = rw\nhost = db.local\n").unwrap();
        assert_eq!(value, json!({"connection_id": "rw", "host": "db.local"}));
    }

    #[test]
    fn test_parse_ini_errors() {
        assert!(parse_ini("[broken\nhost = x").is_err());
        let err = parse_ini("host = x\n[a]\nhost = y").unwrap_err();
        assert!(err.contains("mixed"), "{}", err);
    }

    #[test]
    fn test_parse_toml_and_json() {
        let toml_value = parse_toml("[rw]\nhost = \"localhost\"\npersistent = false\n").unwrap();
        assert_eq!(toml_value["rw"]["persistent"], json!(false));

        let json_value = parse_json(r#"{"rw": {"host": "localhost"}}"#).unwrap();
        assert_eq!(json_value["rw"]["host"], json!("localhost"));
        assert!(parse_json("{ invalid json }").is_err());
    }

    #[test]
    fn test_registry_selects_by_extension() {
        let mut registry = ParserRegistry::default();
        assert_eq!(registry.extensions(), vec!["ini", "json", "toml"]);
        assert!(registry.parser_for(Path::new("conn.JSON")).is_some());
        assert!(registry.parser_for(Path::new("conn.yaml")).is_none());
        assert!(registry.parser_for(Path::new("noext")).is_none());

        registry.register(".conf", parse_ini);
        assert!(registry.parser_for(Path::new("db.conf")).is_some());
    }
}
