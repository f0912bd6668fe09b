//! Connection Definition Loading
//!
//! Turns a file, or a directory of files, into [`ConnectionRecord`]s. The
//! parser is picked by file extension from a [`ParserRegistry`]; the parsed
//! value may be a single record, an array of records, or an object/sections of
//! named records whose key is the default identifier.

pub mod formats;
pub mod record;

pub use formats::{ParseFn, ParserRegistry};
pub use record::ConnectionRecord;

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating connection definitions.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("unsupported config format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A record-level error located in a specific file
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub fn missing_field(field: &'static str) -> Self {
        ConfigError::MissingField { field }
    }

    pub fn invalid_value(field: &'static str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            value: value.into(),
        }
    }

    /// Name of the missing required field, looking through file context.
    pub fn missing_field_name(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField { field } => Some(*field),
            ConfigError::InFile { source, .. } => source.missing_field_name(),
            _ => None,
        }
    }

    fn in_file(self, path: &Path) -> Self {
        match self {
            err @ (ConfigError::Read { .. }
            | ConfigError::Parse { .. }
            | ConfigError::UnsupportedFormat { .. }
            | ConfigError::InFile { .. }) => err,
            err => ConfigError::InFile {
                path: path.to_path_buf(),
                source: Box::new(err),
            },
        }
    }
}

/// Loader behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Fail on files with an unregistered extension instead of skipping them
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { strict: true }
    }
}

/// Reads connection definitions from disk.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    parsers: ParserRegistry,
    options: LoadOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoadOptions) -> Self {
        ConfigLoader {
            parsers: ParserRegistry::default(),
            options,
        }
    }

    /// Skip unsupported files instead of failing.
    pub fn lenient(mut self) -> Self {
        self.options.strict = false;
        self
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn parsers_mut(&mut self) -> &mut ParserRegistry {
        &mut self.parsers
    }

    /// Loads a single file or every file directly inside a directory.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Vec<ConnectionRecord>, ConfigError> {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_dir(path)
        } else {
            self.load_file(path)
        }
    }

    /// Directory entries are read in file-name order; hidden files and
    /// subdirectories are ignored.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<ConnectionRecord>, ConfigError> {
        let read_err = |source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut records = Vec::new();
        for file in files {
            records.extend(self.load_file(&file)?);
        }
        Ok(records)
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<ConnectionRecord>, ConfigError> {
        let parser = match self.parsers.parser_for(path) {
            Some(parser) => parser,
            None if self.options.strict => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
            None => {
                debug!(path = %path.display(), "skipping unsupported config file");
                return Ok(Vec::new());
            }
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value = parser(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        let records = records_from_value(&value).map_err(|e| e.in_file(path))?;
        debug!(path = %path.display(), count = records.len(), "loaded connection definitions");
        Ok(records)
    }

    /// Parses in-memory text as if it came from a file with `extension`.
    pub fn load_str(&self, text: &str, extension: &str) -> Result<Vec<ConnectionRecord>, ConfigError> {
        let pseudo = PathBuf::from(format!("<memory>.{}", extension));
        let parser = self
            .parsers
            .get(extension)
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                path: pseudo.clone(),
            })?;
        let value = parser(text).map_err(|message| ConfigError::Parse {
            path: pseudo,
            message,
        })?;
        records_from_value(&value)
    }
}

/// Loads with default parsers; `strict == false` skips unsupported files.
pub fn load_path(path: impl AsRef<Path>, strict: bool) -> Result<Vec<ConnectionRecord>, ConfigError> {
    ConfigLoader::with_options(LoadOptions { strict }).load_path(path)
}

/// Shapes a parsed value into records.
///
/// An object whose values are all objects is a set of named records; any
/// other object is one record. Arrays hold records.
pub fn records_from_value(value: &Value) -> Result<Vec<ConnectionRecord>, ConfigError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => ConnectionRecord::from_map(map, None),
                other => Err(ConfigError::invalid_value("connection", other.to_string())),
            })
            .collect(),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Object(map) if map.values().all(Value::is_object) => map
            .iter()
            .map(|(name, item)| match item {
                Value::Object(inner) => ConnectionRecord::from_map(inner, Some(name.as_str())),
                other => Err(ConfigError::invalid_value("connection", other.to_string())),
            })
            .collect(),
        Value::Object(map) => Ok(vec![ConnectionRecord::from_map(map, None)?]),
        other => Err(ConfigError::invalid_value("connections", other.to_string())),
    }
}
