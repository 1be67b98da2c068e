//! Direct selection checks
//!
//! A selected folder is analyzed in place, so it must already be a
//! readable directory and, when allowed roots are configured, sit under
//! one of them after symlinks are resolved.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SelectionPolicy;

/// Resolve `path` and check it against `policy`, returning the canonical
/// path or a human-readable reason.
pub(crate) fn check_selection(path: &Path, policy: &SelectionPolicy) -> Result<PathBuf, String> {
    let canonical = fs::canonicalize(path).map_err(|e| format!("cannot resolve path: {}", e))?;

    let metadata = fs::metadata(&canonical).map_err(|e| format!("cannot stat path: {}", e))?;
    if !metadata.is_dir() {
        return Err("not a directory".to_string());
    }

    fs::read_dir(&canonical).map_err(|e| format!("directory is not readable: {}", e))?;

    if !policy.allowed_roots.is_empty() {
        let allowed = policy.allowed_roots.iter().any(|root| {
            fs::canonicalize(root)
                .map(|root| canonical.starts_with(root))
                .unwrap_or(false)
        });
        if !allowed {
            return Err("outside the allowed roots".to_string());
        }
    }

    Ok(canonical)
}
