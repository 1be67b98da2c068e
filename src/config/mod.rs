//! Configuration
//!
//! Four layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Host config (~/.config/codebase-ingest/config.toml)
//! 3. Service config (./ingest.toml or --config)
//! 4. CLI flags
//!
//! The merged document is validated once and turned into [`IngestConfig`],
//! which is read-only for the rest of the process.

mod defaults;
mod effective;
mod limits;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use limits::{IngestConfig, IngestLimits, SelectionPolicy, WorkdirSettings};
pub use merge::{deep_merge, merge_layers};
