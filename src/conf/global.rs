//! Global configuration
//!
//! Loaded from JSON. Every entry under `paths` is a partial path
//! configuration laid over `pathDefaults`; entries keep the order in which
//! they appear in the document.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::duration::StringDuration;
use super::error::ConfError;
use super::path::PathConf;
use super::table::{PathMatch, PathTable};
use crate::conf::PathError;
use crate::logger::LogLevel;
use crate::source::SourceOptions;

/// Server-wide configuration
#[derive(Debug, Clone)]
pub struct Conf {
    /// Verbosity of the log output
    pub log_level: LogLevel,

    /// Read timeout handed to static sources
    pub read_timeout: Duration,

    /// Write timeout handed to static sources
    pub write_timeout: Duration,

    /// Depth of the write queue of every static source (power of two)
    pub write_queue_size: usize,

    /// Values every path entry starts from
    pub path_defaults: PathConf,

    /// Validated path entries
    pub paths: PathTable,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            write_queue_size: 512,
            path_defaults: PathConf::default(),
            paths: PathTable::new(),
        }
    }
}

/// On-disk shape before defaults are applied
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConf {
    log_level: Option<LogLevel>,
    read_timeout: Option<StringDuration>,
    write_timeout: Option<StringDuration>,
    write_queue_size: Option<usize>,
    path_defaults: Option<Value>,
    #[serde(default)]
    paths: OrderedEntries,
}

/// JSON object entries in document order
#[derive(Default)]
struct OrderedEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of path names to path configurations")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(OrderedEntries::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, Value)> = Vec::new();
                while let Some((name, value)) = map.next_entry::<String, Value>()? {
                    if entries.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!(
                            "path '{}' is declared more than once",
                            name
                        )));
                    }
                    entries.push((name, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}

impl Conf {
    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> Result<Self, ConfError> {
        let raw: RawConf = serde_json::from_str(text)?;
        let mut conf = Conf::default();

        if let Some(level) = raw.log_level {
            conf.log_level = level;
        }
        if let Some(timeout) = raw.read_timeout {
            conf.read_timeout = timeout.get();
        }
        if let Some(timeout) = raw.write_timeout {
            conf.write_timeout = timeout.get();
        }
        if let Some(size) = raw.write_queue_size {
            conf.write_queue_size = size;
        }

        let defaults = match raw.path_defaults {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(ConfError::Invalid("'pathDefaults' must be an object".into())),
        };
        conf.path_defaults = serde_json::from_value(Value::Object(defaults.clone()))?;

        for (name, value) in raw.paths.0 {
            let overlay = match value {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => return Err(ConfError::path(&name, "entry must be an object")),
            };

            let mut merged = defaults.clone();
            merged.extend(overlay);

            let path_conf: PathConf = serde_json::from_value(Value::Object(merged))?;
            conf.paths.insert(&name, path_conf)?;
        }

        conf.validate()?;
        Ok(conf)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the global settings
    pub fn validate(&self) -> Result<(), ConfError> {
        if !self.write_queue_size.is_power_of_two() {
            return Err(ConfError::Invalid(
                "'writeQueueSize' must be a power of two".into(),
            ));
        }
        Ok(())
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Settings every static source is built with
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            write_queue_size: self.write_queue_size,
        }
    }

    /// Add a path entry, validating it
    pub fn path(mut self, name: &str, conf: PathConf) -> Result<Self, ConfError> {
        self.paths.insert(name, conf)?;
        Ok(self)
    }

    /// Resolve a requested path name against this configuration
    pub fn find_path_conf(&self, name: &str) -> Result<PathMatch, PathError> {
        self.paths.find(name)
    }
}
