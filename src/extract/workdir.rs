//! Session-scoped working directories
//!
//! A [`WorkingDirectory`] owns a freshly created directory with a random
//! name. Dropping it removes the directory and everything below it, on
//! every exit path including unwinding. Collaborators only ever see a
//! [`ReadOnlyRoot`].

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::config::WorkdirSettings;
use crate::obs;

/// Exclusively owned, self-deleting directory for one ingestion
#[derive(Debug)]
pub struct WorkingDirectory {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create a new directory under the configured parent.
    pub fn create(settings: &WorkdirSettings) -> io::Result<Self> {
        let parent = settings.parent_dir();
        fs::create_dir_all(&parent)?;

        let dir = tempfile::Builder::new()
            .prefix(&settings.prefix)
            .tempdir_in(&parent)?;
        let path = dir.path().to_path_buf();

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow a read-only view for analysis and downstream consumers.
    pub fn read_only(&self) -> ReadOnlyRoot<'_> {
        ReadOnlyRoot::new(&self.path)
    }

    /// Delete the directory now, reporting failure instead of swallowing it.
    pub fn release(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                let result = dir.close();
                obs::emit_workdir_cleanup(&self.path, result.is_ok());
                result
            }
            None => Ok(()),
        }
    }

    /// Keep the directory on disk past the end of the session.
    pub fn persist(mut self) -> PathBuf {
        match self.dir.take() {
            Some(dir) => dir.keep(),
            None => self.path.clone(),
        }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let removed = dir.close().is_ok();
            obs::emit_workdir_cleanup(&self.path, removed);
        }
    }
}

/// Borrowed, non-owning view of an analysis root.
///
/// Exposes lookup only; it offers no way to write or delete.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyRoot<'a> {
    path: &'a Path,
}

impl<'a> ReadOnlyRoot<'a> {
    pub(crate) fn new(path: &'a Path) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// Resolve a forward-slash relative path inside the root.
    ///
    /// `None` when any segment is `.`, `..` or a platform prefix.
    pub fn join(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.path.to_path_buf();
        for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => path.push(part),
                _ => return None,
            }
        }
        Some(path)
    }
}

impl AsRef<Path> for ReadOnlyRoot<'_> {
    fn as_ref(&self) -> &Path {
        self.path
    }
}
