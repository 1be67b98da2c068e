//! Effective configuration with provenance
//!
//! Merges the four layers, validates the result, and records which files
//! contributed (with a SHA-256 of their raw bytes) so a rejection can be
//! traced back to the ceiling that caused it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::defaults::BuiltinDefaults;
use super::limits::{IngestConfig, IngestLimits, SelectionPolicy, WorkdirSettings};
use super::merge::merge_layers;
use crate::analyze::AnalyzeOptions;

/// Schema version for the effective config document
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "codebase-ingest/effective_config@1";

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Service,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers
    pub fn build(
        host_config_path: Option<&Path>,
        service_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Service, service_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Default host config location (`~/.config/codebase-ingest/config.toml`)
    pub fn default_host_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("codebase-ingest")
                .join("config.toml")
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let digest = hex::encode(Sha256::digest(&bytes));

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Validate configuration values
    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        for (key, expected) in KEY_TYPES {
            if let Some(value) = lookup(config, key) {
                expected.check(key, value)?;
            }
        }

        if let Some(entries) = lookup(config, "limits.max_entries").and_then(|v| v.as_u64()) {
            if entries > u64::from(u32::MAX) {
                return Err(ConfigError::ValidationError(format!(
                    "limits.max_entries must be at most {}",
                    u32::MAX
                )));
            }
        }

        if let Some(prefix) = lookup(config, "workdir.prefix").and_then(|v| v.as_str()) {
            if prefix.contains('/') || prefix.contains('\\') {
                return Err(ConfigError::ValidationError(
                    "workdir.prefix must not contain path separators".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.config, path)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    fn get_strings(&self, path: &str) -> Vec<String> {
        self.get(path)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert the merged document into typed settings
    pub fn settings(&self) -> IngestConfig {
        let defaults = IngestConfig::default();
        let d = &defaults;

        let limits = IngestLimits {
            max_entries: self
                .get_u64("limits.max_entries")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(d.limits.max_entries),
            max_total_uncompressed: self
                .get_u64("limits.max_total_uncompressed")
                .unwrap_or(d.limits.max_total_uncompressed),
            max_expansion_ratio: self
                .get_u64("limits.max_expansion_ratio")
                .unwrap_or(d.limits.max_expansion_ratio),
            declared_size_tolerance: self
                .get_u64("limits.declared_size_tolerance")
                .unwrap_or(d.limits.declared_size_tolerance),
        };

        let analysis = AnalyzeOptions {
            max_depth: self
                .get_u64("analysis.max_depth")
                .map(|v| v as usize)
                .unwrap_or(d.analysis.max_depth),
            max_entries: self
                .get_u64("analysis.max_entries")
                .unwrap_or(d.analysis.max_entries),
            sample_files: self
                .get_u64("analysis.sample_files")
                .map(|v| v as usize)
                .unwrap_or(d.analysis.sample_files),
            default_excludes: self
                .get_bool("analysis.default_excludes")
                .unwrap_or(d.analysis.default_excludes),
            exclude: self.get_strings("analysis.exclude"),
        };

        let workdir = WorkdirSettings {
            root: self.get_str("workdir.root").map(PathBuf::from),
            prefix: self
                .get_str("workdir.prefix")
                .map(str::to_string)
                .unwrap_or_else(|| d.workdir.prefix.clone()),
        };

        let selection = SelectionPolicy {
            allowed_roots: self
                .get_strings("selection.allowed_roots")
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        };

        let deadline = self
            .get_u64("session.deadline_seconds")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        IngestConfig {
            limits,
            analysis,
            workdir,
            selection,
            history_max_records: self
                .get_u64("history.max_records")
                .map(|v| v as usize)
                .unwrap_or(d.history_max_records),
            deadline,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Expected shape of a recognised key
#[derive(Debug, Clone, Copy)]
enum KeyType {
    /// Integer >= 1
    Positive,
    /// Integer >= 0
    NonNegative,
    Bool,
    Str,
    StrArray,
}

const KEY_TYPES: &[(&str, KeyType)] = &[
    ("limits.max_entries", KeyType::Positive),
    ("limits.max_total_uncompressed", KeyType::Positive),
    ("limits.max_expansion_ratio", KeyType::Positive),
    ("limits.declared_size_tolerance", KeyType::NonNegative),
    ("analysis.max_depth", KeyType::Positive),
    ("analysis.max_entries", KeyType::Positive),
    ("analysis.sample_files", KeyType::Positive),
    ("analysis.default_excludes", KeyType::Bool),
    ("analysis.exclude", KeyType::StrArray),
    ("workdir.root", KeyType::Str),
    ("workdir.prefix", KeyType::Str),
    ("selection.allowed_roots", KeyType::StrArray),
    ("history.max_records", KeyType::Positive),
    ("session.deadline_seconds", KeyType::NonNegative),
];

impl KeyType {
    fn check(self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let fail = |expected: &str| {
            Err(ConfigError::ValidationError(format!("{} must be {}", key, expected)))
        };
        match self {
            Self::Positive => match value.as_u64() {
                Some(0) => fail("greater than 0"),
                Some(_) => Ok(()),
                None => fail("a positive integer"),
            },
            Self::NonNegative => match value.as_u64() {
                Some(_) => Ok(()),
                None => fail("a non-negative integer"),
            },
            Self::Bool if value.is_boolean() => Ok(()),
            Self::Bool => fail("true or false"),
            Self::Str if value.is_string() => Ok(()),
            Self::Str => fail("a string"),
            Self::StrArray => match value.as_array() {
                Some(items) if items.iter().all(Value::is_string) => Ok(()),
                _ => fail("an array of strings"),
            },
        }
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
