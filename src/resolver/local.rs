//! User-owned local template overrides
//!
//! The local override directory is the highest-priority template source and
//! is owned entirely by the end user. [`LocalTemplates`] is a deliberately
//! read-only handle: the path is private and only query methods are exposed,
//! so no code path in this subsystem can write to, move, or delete the
//! directory through it.

use std::path::Path;

use super::select_template_dir;

/// Read-only view of a discovered local override directory
#[derive(Debug)]
pub struct LocalTemplates {
    root: std::path::PathBuf,
    file_count: usize,
}

impl LocalTemplates {
    /// Discover local templates for `logical_name` under `local_dir`.
    ///
    /// A `<local_dir>/<logical_name>` subdirectory wins when present;
    /// otherwise the override root itself is used. Returns `None` unless the
    /// chosen directory contains at least one file.
    pub fn discover(local_dir: &Path, logical_name: &str) -> Option<Self> {
        let (root, file_count) = select_template_dir(local_dir, logical_name)?;
        Some(LocalTemplates { root, file_count })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }
}
