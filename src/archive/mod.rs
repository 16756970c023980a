//! Template archive validation and extraction
//!
//! Downloaded archives are untrusted input. Validation happens in three
//! stages: a full integrity pass (every entry read to the end so CRCs are
//! verified) combined with entry-path safety checks before anything touches
//! the filesystem, then extraction, then a structure check that the expected
//! templates directory exists and is non-empty.
//!
//! Entry paths resolving outside the extraction directory (traversal via
//! `..`, absolute paths, or symlink entries) abort the whole extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Result, SddError};
use crate::progress::{ProgressPhase, ProgressSink, ProgressTracker};

/// Subdirectory of the cache lease the archive is unpacked into
pub const EXTRACT_DIR: &str = "extracted";

/// Removes a partially extracted tree unless disarmed on success
struct ExtractGuard<'a> {
    root: &'a Path,
    armed: bool,
}

impl Drop for ExtractGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(self.root);
        }
    }
}

/// Validate `archive_path` and extract it under `dest_dir`, returning the
/// resolved template root (`<archive root>/<templates_subdir>`).
pub fn validate_and_extract(
    archive_path: &Path,
    dest_dir: &Path,
    templates_subdir: &str,
    on_progress: ProgressSink<'_>,
) -> Result<PathBuf> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let total_bytes = verify_integrity(&mut archive)?;

    let extract_root = dest_dir.join(EXTRACT_DIR);
    fs::create_dir_all(&extract_root)?;
    let mut guard = ExtractGuard {
        root: &extract_root,
        armed: true,
    };

    extract_entries(&mut archive, &extract_root, total_bytes, on_progress)?;
    let template_root = locate_template_root(&extract_root, templates_subdir)?;

    guard.armed = false;
    Ok(template_root)
}

/// Read every entry to the end (verifying CRCs) and reject unsafe entry
/// paths, all before a single byte is written to disk. Returns the total
/// uncompressed size for extraction progress.
fn verify_integrity(archive: &mut ZipArchive<File>) -> Result<u64> {
    if archive.is_empty() {
        return Err(SddError::ArchiveCorrupt {
            reason: "archive contains no entries".to_string(),
        });
    }

    let mut total_bytes: u64 = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        check_entry_safety(&name, entry.enclosed_name(), entry.unix_mode())?;

        io::copy(&mut entry, &mut io::sink()).map_err(|e| SddError::ArchiveCorrupt {
            reason: format!("entry '{}': {}", name, e),
        })?;
        total_bytes += entry.size();
    }
    Ok(total_bytes)
}

/// Reject entries that would escape the extraction directory.
fn check_entry_safety(name: &str, enclosed: Option<PathBuf>, unix_mode: Option<u32>) -> Result<()> {
    // S_IFLNK: a symlink entry could redirect later writes outside the root
    if unix_mode.is_some_and(|mode| mode & 0o170000 == 0o120000) {
        return Err(SddError::ArchiveUnsafePath {
            entry: name.to_string(),
        });
    }
    // enclosed_name() is None for absolute paths and `..` traversal
    if enclosed.is_none() {
        return Err(SddError::ArchiveUnsafePath {
            entry: name.to_string(),
        });
    }
    Ok(())
}

fn extract_entries(
    archive: &mut ZipArchive<File>,
    extract_root: &Path,
    total_bytes: u64,
    on_progress: ProgressSink<'_>,
) -> Result<()> {
    let canonical_root = dunce::canonicalize(extract_root)?;
    let mut tracker = ProgressTracker::new(ProgressPhase::Extract, Some(total_bytes));
    let mut done: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let rel = entry.enclosed_name().ok_or_else(|| SddError::ArchiveUnsafePath {
            entry: name.clone(),
        })?;
        let out_path = extract_root.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
            // Canonicalized containment check; catches symlinked ancestors
            let canonical_parent = dunce::canonicalize(parent)?;
            if !canonical_parent.starts_with(&canonical_root) {
                return Err(SddError::ArchiveUnsafePath { entry: name });
            }
        }

        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file).map_err(|e| SddError::ArchiveCorrupt {
            reason: format!("entry '{}': {}", name, e),
        })?;

        done += entry.size();
        if let Some(event) = tracker.update(done) {
            on_progress(&event);
        }
    }

    on_progress(&tracker.finish(done));
    Ok(())
}

/// Find `<archive root>/<templates_subdir>` and verify it holds at least one
/// file. GitHub archives wrap everything in a single `<repo>-<branch>/`
/// directory, which is stripped here.
fn locate_template_root(extract_root: &Path, templates_subdir: &str) -> Result<PathBuf> {
    let archive_root = single_top_level_dir(extract_root)?.unwrap_or_else(|| extract_root.to_path_buf());

    let template_root = archive_root.join(templates_subdir);
    if !template_root.is_dir() {
        return Err(SddError::TemplatesInvalid {
            reason: format!(
                "archive does not contain a '{}' directory",
                templates_subdir
            ),
        });
    }

    let has_files = WalkDir::new(&template_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.file_type().is_file());
    if !has_files {
        return Err(SddError::TemplatesInvalid {
            reason: format!("'{}' directory contains no files", templates_subdir),
        });
    }

    Ok(template_root)
}

/// The lone top-level directory of `root`, if that is all it contains.
fn single_top_level_dir(root: &Path) -> Result<Option<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            return Ok(None);
        }
    }
    Ok(if dirs.len() == 1 { dirs.pop() } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn noop_sink() -> impl FnMut(&crate::progress::ProgressEvent) {
        |_| {}
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_round_trip_extraction() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(
            &archive,
            &[
                ("repo-main/templates/spec.md", "# Spec\n"),
                ("repo-main/templates/plan/feasibility.md", "# Feasibility\n"),
                ("repo-main/README.md", "readme\n"),
            ],
        );

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let root = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap();

        assert!(root.ends_with("repo-main/templates"));
        assert_eq!(fs::read_to_string(root.join("spec.md")).unwrap(), "# Spec\n");
        assert_eq!(
            fs::read_to_string(root.join("plan/feasibility.md")).unwrap(),
            "# Feasibility\n"
        );
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(
            &archive,
            &[
                ("repo-main/templates/ok.md", "fine\n"),
                ("../../evil.txt", "escaped\n"),
            ],
        );

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::ArchiveUnsafePath { .. }));

        // Nothing was written outside (or inside) the destination
        assert!(!temp.path().join("evil.txt").exists());
        assert!(!dest.path().join(EXTRACT_DIR).exists());
    }

    #[test]
    fn test_rejects_absolute_path_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(&archive, &[("/tmp/evil.txt", "escaped\n")]);

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::ArchiveUnsafePath { .. }));
    }

    #[test]
    fn test_rejects_symlink_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        let file = File::create(&archive).unwrap();
        let mut writer = ZipWriter::new(file);
        writer
            .add_symlink("repo-main/templates/link.md", "/etc/passwd", SimpleFileOptions::default())
            .unwrap();
        writer.finish().unwrap();

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::ArchiveUnsafePath { .. }));
    }

    #[test]
    fn test_rejects_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        fs::write(&archive, b"this is not a zip archive").unwrap();

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::ArchiveCorrupt { .. }));
    }

    #[test]
    fn test_rejects_missing_templates_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(&archive, &[("repo-main/README.md", "no templates here\n")]);

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::TemplatesInvalid { .. }));
    }

    #[test]
    fn test_rejects_empty_templates_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        let file = File::create(&archive).unwrap();
        let mut writer = ZipWriter::new(file);
        writer
            .add_directory("repo-main/templates/", SimpleFileOptions::default())
            .unwrap();
        writer.finish().unwrap();

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let err = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap_err();
        assert!(matches!(err, SddError::TemplatesInvalid { .. }));
    }

    #[test]
    fn test_flat_archive_without_wrapper_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(&archive, &[("templates/a.md", "# A\n"), ("extra.txt", "x\n")]);

        let dest = TempDir::new().unwrap();
        let mut sink = noop_sink();
        let root = validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap();
        assert!(root.join("a.md").is_file());
    }

    #[test]
    fn test_extract_progress_reaches_total() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        write_zip(&archive, &[("repo-main/templates/a.md", "0123456789")]);

        let dest = TempDir::new().unwrap();
        let mut last_done = 0;
        let mut last_total = None;
        let mut sink = |event: &crate::progress::ProgressEvent| {
            assert!(event.bytes_done >= last_done);
            last_done = event.bytes_done;
            last_total = event.bytes_total;
        };
        validate_and_extract(&archive, dest.path(), "templates", &mut sink).unwrap();
        assert_eq!(last_done, 10);
        assert_eq!(last_total, Some(10));
    }
}
