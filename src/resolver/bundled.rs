//! Bundled fallback templates shipped with the installation

use std::path::{Path, PathBuf};

use super::select_template_dir;

/// Locate bundled templates for `logical_name`, if the installation ships
/// any. Same layout rules as the local override: a `<dir>/<logical_name>`
/// subdirectory wins over the bundled root.
pub fn locate(bundled_dir: Option<&Path>, logical_name: &str) -> Option<PathBuf> {
    let dir = bundled_dir?;
    let (root, _) = select_template_dir(dir, logical_name)?;
    Some(root)
}
