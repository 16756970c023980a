//! Download tier: cache lease + downloader + archive validator
//!
//! Orchestrates one download-and-validate pass into a fresh cache lease. A
//! validation failure (corrupt or structurally invalid archive) triggers
//! exactly one retry of the pair; network failures are returned to the
//! resolver immediately so it can fall back a tier. The lease is returned to
//! the resolver on success and dropped (directory removed) on failure.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::cache::{self, CacheLease};
use crate::config::{RepoRef, TemplateConfig};
use crate::download::Downloader;
use crate::error::{Result, SddError};
use crate::progress::ProgressSink;

pub(crate) fn fetch_remote(
    config: &TemplateConfig,
    repo: &RepoRef,
    on_progress: ProgressSink<'_>,
) -> Result<(CacheLease, PathBuf)> {
    let lease = cache::open_lease(config.cache_root.as_deref())?;

    // The lease must never sit inside the user-owned override tree
    if lease.path().starts_with(&config.local_dir) {
        return Err(SddError::CacheOperationFailed {
            message: format!(
                "cache directory {} would be inside the local template directory",
                lease.path().display()
            ),
        });
    }

    let downloader = Downloader::new(config.timeout)?;
    let url = config.archive_url(repo);

    let mut retried = false;
    loop {
        match download_and_validate(&downloader, &url, &lease, &config.templates_subdir, on_progress)
        {
            Ok(root) => return Ok((lease, root)),
            Err(err) if err.is_validation() && !retried => {
                retried = true;
                clear_lease_dir(lease.path());
            }
            // Dropping the lease removes the directory
            Err(err) => return Err(err),
        }
    }
}

fn download_and_validate(
    downloader: &Downloader,
    url: &str,
    lease: &CacheLease,
    templates_subdir: &str,
    on_progress: ProgressSink<'_>,
) -> Result<PathBuf> {
    let archive_path = downloader.download(url, lease.path(), on_progress)?;
    archive::validate_and_extract(&archive_path, lease.path(), templates_subdir, on_progress)
}

/// Remove the artifacts of a failed attempt so the retry starts clean.
fn clear_lease_dir(dir: &Path) {
    let _ = fs::remove_file(dir.join(crate::download::ARCHIVE_FILE_NAME));
    let _ = fs::remove_dir_all(dir.join(archive::EXTRACT_DIR));
}
