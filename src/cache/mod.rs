//! Ephemeral cache directories for downloaded template archives
//!
//! Each download gets one process-owned temporary directory, the cache lease.
//! The directory name embeds the owning pid (`sdd-tmpl-<pid>-<random>`) so a
//! later invocation can discover directories whose owner crashed before
//! cleanup and reclaim them. Leases are removed in `Drop` unless explicitly
//! kept, so cleanup runs even when an operation is interrupted mid-flight.
//!
//! Cache directories are always created under an absolute base outside the
//! current working directory tree, never inside the user's project.

pub mod liveness;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SddError};

use liveness::ProcessLiveness;

/// Directory name prefix for cache leases
pub const LEASE_PREFIX: &str = "sdd-tmpl-";

/// Lease bookkeeping file written inside each cache directory
const LEASE_FILE: &str = ".lease.json";

/// On-disk lease record, used by `cache list` for display
#[derive(Debug, Serialize, Deserialize)]
struct LeaseRecord {
    owner_pid: u32,
    created_at_epoch_secs: u64,
}

/// Exclusive, crash-detectable ownership of one temporary directory
#[derive(Debug)]
pub struct CacheLease {
    dir: PathBuf,
    pid: u32,
    created_at: SystemTime,
    keep: bool,
    closed: bool,
}

impl CacheLease {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn owner_pid(&self) -> u32 {
        self.pid
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Leave the directory on disk when the lease is dropped (`--no-cleanup`).
    pub fn keep_on_drop(&mut self) {
        self.keep = true;
    }

    /// Remove the directory now. Failures are reported so the caller can log
    /// a warning; they never abort the overall operation.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        fs::remove_dir_all(&self.dir).map_err(|e| SddError::CacheOperationFailed {
            message: format!("failed to remove {}: {}", self.dir.display(), e),
        })
    }
}

impl Drop for CacheLease {
    fn drop(&mut self) {
        if self.closed || self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            if self.dir.exists() {
                eprintln!(
                    "Warning: failed to clean up cache directory {}: {}",
                    self.dir.display(),
                    e
                );
            }
        }
    }
}

/// Absolute base directory for cache leases.
///
/// Uses the override when given, otherwise the OS temp root. Never returns a
/// path inside the current working directory tree (e.g. when `TMPDIR=tmp` and
/// the cwd is the project).
pub fn cache_base(cache_root: Option<&Path>) -> PathBuf {
    let base = match cache_root {
        Some(root) => root.to_path_buf(),
        None => env::temp_dir(),
    };

    let base = if base.is_absolute() {
        base
    } else {
        fallback_temp_root()
    };

    match env::current_dir() {
        Ok(cwd) if base.starts_with(&cwd) && cache_root.is_none() => fallback_temp_root(),
        _ => base,
    }
}

fn fallback_temp_root() -> PathBuf {
    #[cfg(windows)]
    {
        env::var("TEMP")
            .or_else(|_| env::var("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}

/// Create a fresh cache lease for the current process.
pub fn open_lease(cache_root: Option<&Path>) -> Result<CacheLease> {
    let base = cache_base(cache_root);
    fs::create_dir_all(&base).map_err(|e| SddError::CacheOperationFailed {
        message: format!("failed to create cache base {}: {}", base.display(), e),
    })?;

    let pid = std::process::id();
    let dir = tempfile::Builder::new()
        .prefix(&format!("{}{}-", LEASE_PREFIX, pid))
        .tempdir_in(&base)
        .map_err(|e| SddError::CacheOperationFailed {
            message: format!("failed to create cache directory under {}: {}", base.display(), e),
        })?
        .keep();

    let created_at = SystemTime::now();
    let record = LeaseRecord {
        owner_pid: pid,
        created_at_epoch_secs: created_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };
    // Bookkeeping only; the pid in the directory name is authoritative
    if let Ok(json) = serde_json::to_string_pretty(&record) {
        let _ = fs::write(dir.join(LEASE_FILE), json);
    }

    Ok(CacheLease {
        dir,
        pid,
        created_at,
        keep: false,
        closed: false,
    })
}

/// Extract the embedded owner pid from a lease directory name.
pub fn parse_lease_pid(name: &str) -> Option<u32> {
    let rest = name.strip_prefix(LEASE_PREFIX)?;
    let pid_part = rest.split('-').next()?;
    pid_part.parse().ok()
}

/// One discovered lease directory, for `cache list`
#[derive(Debug)]
pub struct LeaseInfo {
    pub path: PathBuf,
    pub owner_pid: u32,
    pub owner_alive: bool,
    pub created_at_epoch_secs: Option<u64>,
}

/// Enumerate lease directories under the cache base.
pub fn list_leases(cache_root: Option<&Path>) -> Result<Vec<LeaseInfo>> {
    let probe = liveness::platform_probe();
    list_leases_with(cache_root, &probe)
}

fn list_leases_with(
    cache_root: Option<&Path>,
    probe: &dyn ProcessLiveness,
) -> Result<Vec<LeaseInfo>> {
    let base = cache_base(cache_root);
    let mut leases = Vec::new();

    let entries = match fs::read_dir(&base) {
        Ok(entries) => entries,
        Err(_) => return Ok(leases),
    };

    for entry in entries.filter_map(std::result::Result::ok) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(pid) = parse_lease_pid(name) else {
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }

        let created_at_epoch_secs = fs::read_to_string(entry.path().join(LEASE_FILE))
            .ok()
            .and_then(|json| serde_json::from_str::<LeaseRecord>(&json).ok())
            .map(|record| record.created_at_epoch_secs);

        leases.push(LeaseInfo {
            path: entry.path(),
            owner_pid: pid,
            owner_alive: probe.is_alive(pid),
            created_at_epoch_secs,
        });
    }

    Ok(leases)
}

/// Remove lease directories whose owning process is no longer running.
///
/// Runs once at process start. Returns the number of directories removed.
pub fn reclaim_orphans(cache_root: Option<&Path>) -> Result<usize> {
    let probe = liveness::platform_probe();
    reclaim_orphans_with(cache_root, &probe)
}

/// Orphan reclamation with an explicit liveness probe.
pub fn reclaim_orphans_with(
    cache_root: Option<&Path>,
    probe: &dyn ProcessLiveness,
) -> Result<usize> {
    let current_pid = std::process::id();
    let mut removed = 0;

    for lease in list_leases_with(cache_root, probe)? {
        if lease.owner_pid == current_pid || lease.owner_alive {
            continue;
        }
        match fs::remove_dir_all(&lease.path) {
            Ok(()) => removed += 1,
            Err(e) => {
                eprintln!(
                    "Warning: failed to reclaim orphaned cache directory {}: {}",
                    lease.path.display(),
                    e
                );
            }
        }
    }

    Ok(removed)
}
