//! Archive entry path normalization
//!
//! Entry names inside an archive are untrusted strings. Before a name is
//! used anywhere downstream it is reduced to a forward-slash relative path
//! made only of normal segments.

/// Reasons an entry name cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("entry path is absolute: {0}")]
    Absolute(String),

    #[error("entry path contains a parent-directory segment: {0}")]
    ParentSegment(String),

    #[error("entry path contains a NUL byte")]
    NulByte,

    #[error("entry path is empty after normalization: {0:?}")]
    Empty(String),
}

impl PathError {
    /// Whether this error means the name tried to leave the extraction root.
    pub fn is_traversal(&self) -> bool {
        matches!(self, PathError::Absolute(_) | PathError::ParentSegment(_))
    }
}

/// Normalize a raw archive entry name.
///
/// Backslashes are treated as separators, empty and `.` segments are
/// dropped, and the result never carries a trailing slash. Any `..`
/// segment is rejected outright, even when it would resolve back inside
/// the root, as are absolute paths and drive-letter prefixes.
pub fn normalize_entry_path(raw: &str) -> Result<String, PathError> {
    if raw.contains('\0') {
        return Err(PathError::NulByte);
    }

    let unified = raw.replace('\\', "/");

    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathError::Absolute(raw.to_string()));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::ParentSegment(raw.to_string())),
            normal => segments.push(normal),
        }
    }

    if segments.is_empty() {
        return Err(PathError::Empty(raw.to_string()));
    }

    Ok(segments.join("/"))
}

/// `C:` / `c:foo` style prefixes
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
