//! Built-in defaults (layer 1)
//!
//! Every tunable ceiling has a default here; host and service config files
//! and CLI flags override them.

use serde::{Deserialize, Serialize};

/// 512 MiB
const DEFAULT_MAX_TOTAL_UNCOMPRESSED: u64 = 512 * 1024 * 1024;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Maximum number of archive entries (default: 10000)
    pub max_entries: u64,

    /// Maximum sum of uncompressed entry sizes (default: 512 MiB)
    pub max_total_uncompressed: u64,

    /// Maximum uncompressed/compressed ratio for one entry (default: 100)
    pub max_expansion_ratio: u64,

    /// Allowed difference between declared and actual upload size (default: 4096)
    pub declared_size_tolerance: u64,

    /// Maximum traversal depth during analysis (default: 32)
    pub analysis_max_depth: u64,

    /// Maximum entries visited during analysis (default: 50000)
    pub analysis_max_entries: u64,

    /// Number of sample files reported (default: 20)
    pub analysis_sample_files: u64,

    /// Apply the built-in VCS/build directory excludes (default: false)
    pub analysis_default_excludes: bool,

    /// Prefix for working directory names (default: "ingest-")
    pub workdir_prefix: String,

    /// Recent-selection history length (default: 20)
    pub history_max_records: u64,

    /// Overall session deadline in seconds, 0 = none (default: 0)
    pub session_deadline_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_total_uncompressed: DEFAULT_MAX_TOTAL_UNCOMPRESSED,
            max_expansion_ratio: 100,
            declared_size_tolerance: 4096,
            analysis_max_depth: 32,
            analysis_max_entries: 50_000,
            analysis_sample_files: 20,
            analysis_default_excludes: false,
            workdir_prefix: "ingest-".to_string(),
            history_max_records: 20,
            session_deadline_seconds: 0,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "limits": {
                "max_entries": self.max_entries,
                "max_total_uncompressed": self.max_total_uncompressed,
                "max_expansion_ratio": self.max_expansion_ratio,
                "declared_size_tolerance": self.declared_size_tolerance
            },
            "analysis": {
                "max_depth": self.analysis_max_depth,
                "max_entries": self.analysis_max_entries,
                "sample_files": self.analysis_sample_files,
                "default_excludes": self.analysis_default_excludes,
                "exclude": []
            },
            "workdir": {
                "prefix": self.workdir_prefix
            },
            "selection": {
                "allowed_roots": []
            },
            "history": {
                "max_records": self.history_max_records
            },
            "session": {
                "deadline_seconds": self.session_deadline_seconds
            }
        })
    }
}
