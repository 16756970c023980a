//! Three-tier template source resolution
//!
//! Priority is strictly Local > Bundled > Downloaded and is never reordered
//! by configuration. The resolver short-circuits on the first usable source
//! unless `force_download` bypasses the local and bundled tiers for the
//! current session. All outcomes, including every failure, are encoded in a
//! [`TemplateResolutionResult`]; resolution itself never returns an error to
//! the caller.

pub mod bundled;
pub mod local;
mod remote;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::CacheLease;
use crate::config::{RepoRef, TemplateConfig};
use crate::error::SddError;
use crate::progress::{ProgressEvent, ProgressSink};

pub use local::LocalTemplates;

/// Which tier a resolved template root came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSourceKind {
    Local,
    Bundled,
    Downloaded,
}

impl std::fmt::Display for TemplateSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TemplateSourceKind::Local => "local",
            TemplateSourceKind::Bundled => "bundled",
            TemplateSourceKind::Downloaded => "downloaded",
        };
        write!(f, "{}", label)
    }
}

/// One resolved template directory with provenance
#[derive(Debug)]
pub struct TemplateSource {
    pub root_path: PathBuf,
    pub kind: TemplateSourceKind,
    pub size_bytes: Option<u64>,
}

/// Inputs for one resolution call
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Logical template set, e.g. `spec-templates`
    pub logical_name: String,
    /// Skip the network tier entirely
    pub offline: bool,
    /// Bypass local and bundled tiers for this session only
    pub force_download: bool,
    /// Per-request template repository override
    pub repo_override: Option<RepoRef>,
}

impl ResolveRequest {
    pub fn new(logical_name: impl Into<String>) -> Self {
        ResolveRequest {
            logical_name: logical_name.into(),
            offline: false,
            force_download: false,
            repo_override: None,
        }
    }
}

/// Outcome of one resolution call; the sole interface back to the caller.
///
/// When the source is `Downloaded` the result owns the cache lease, so the
/// resolved root stays on disk until the caller signals completion via
/// [`cleanup`](Self::cleanup) (or drops the result, which also removes it).
#[derive(Debug)]
pub struct TemplateResolutionResult {
    pub source: Option<TemplateSource>,
    pub succeeded: bool,
    /// Human-readable outcome; on total failure this enumerates the tiers
    /// attempted, why each failed, and manual-setup guidance
    pub message: String,
    /// True when a lower tier was used (or reported) after the preferred
    /// tier failed or was skipped
    pub fallback_attempted: bool,
    /// Structured failure kind, for callers that pattern-match
    pub failure: Option<SddError>,
    lease: Option<CacheLease>,
}

impl TemplateResolutionResult {
    fn success(
        source: TemplateSource,
        message: String,
        fallback_attempted: bool,
        lease: Option<CacheLease>,
    ) -> Self {
        TemplateResolutionResult {
            source: Some(source),
            succeeded: true,
            message,
            fallback_attempted,
            failure: None,
            lease,
        }
    }

    fn failed(message: String, fallback_attempted: bool, failure: Option<SddError>) -> Self {
        TemplateResolutionResult {
            source: None,
            succeeded: false,
            message,
            fallback_attempted,
            failure,
            lease: None,
        }
    }

    pub fn kind(&self) -> Option<TemplateSourceKind> {
        self.source.as_ref().map(|s| s.kind)
    }

    /// Keep the cache directory on disk for debugging (`--no-cleanup`).
    pub fn keep_cache(&mut self) {
        if let Some(lease) = &mut self.lease {
            lease.keep_on_drop();
        }
    }

    /// Remove the cache directory now that the caller is done with the root.
    /// Failures are logged as warnings and never fail the resolution.
    pub fn cleanup(&mut self) {
        if let Some(lease) = self.lease.take() {
            if let Err(e) = lease.close() {
                eprintln!("Warning: {}", e);
            }
        }
    }
}

/// Resolves a template root from local, bundled, or downloaded sources
pub struct TemplateResolver {
    config: TemplateConfig,
}

impl TemplateResolver {
    pub fn new(config: TemplateConfig) -> Self {
        TemplateResolver { config }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Resolve without progress reporting.
    pub fn resolve(&self, request: &ResolveRequest) -> TemplateResolutionResult {
        let mut sink = |_: &ProgressEvent| {};
        self.resolve_with_progress(request, &mut sink)
    }

    /// Resolve a template root, streaming download/extract progress events
    /// to `on_progress`.
    pub fn resolve_with_progress(
        &self,
        request: &ResolveRequest,
        on_progress: ProgressSink<'_>,
    ) -> TemplateResolutionResult {
        let mut attempted: Vec<(&str, String)> = Vec::new();

        // Tier 1: local override. Always wins when present; never mutated.
        if request.force_download {
            attempted.push(("local", "bypassed by --force-download".to_string()));
        } else if let Some(local) = LocalTemplates::discover(&self.config.local_dir, &request.logical_name)
        {
            let message = format!(
                "Using local templates from {} ({} file{})",
                local.path().display(),
                local.file_count(),
                if local.file_count() == 1 { "" } else { "s" }
            );
            let source = TemplateSource {
                root_path: local.path().to_path_buf(),
                kind: TemplateSourceKind::Local,
                size_bytes: dir_size(local.path()),
            };
            return TemplateResolutionResult::success(source, message, false, None);
        } else {
            attempted.push((
                "local",
                format!("no template files in {}", self.config.local_dir.display()),
            ));
        }

        let bundled_root = bundled::locate(self.config.bundled_dir.as_deref(), &request.logical_name);

        // Tier 2: offline mode skips the network entirely.
        if request.offline {
            if let Some(root) = bundled_root {
                return self.bundled_result(root, false);
            }
            attempted.push(("bundled", "not installed".to_string()));
            attempted.push(("download", "skipped in offline mode".to_string()));
            let message = self.build_guidance(&request.logical_name, &attempted, None);
            return TemplateResolutionResult::failed(message, true, None);
        }

        // Tier 3: bundled fallback, preferred over the network.
        if request.force_download {
            attempted.push(("bundled", "bypassed by --force-download".to_string()));
        } else if let Some(root) = bundled_root.clone() {
            return self.bundled_result(root, false);
        } else {
            attempted.push(("bundled", "not installed".to_string()));
        }

        // Tier 4: download into a fresh cache lease.
        let repo = request
            .repo_override
            .clone()
            .unwrap_or_else(|| self.config.repo.clone());
        match remote::fetch_remote(&self.config, &repo, on_progress) {
            Ok((lease, root)) => {
                let message = format!(
                    "Downloaded templates from {} (branch {})",
                    repo, self.config.branch
                );
                let source = TemplateSource {
                    size_bytes: dir_size(&root),
                    root_path: root,
                    kind: TemplateSourceKind::Downloaded,
                };
                TemplateResolutionResult::success(source, message, false, Some(lease))
            }
            Err(err) => {
                attempted.push(("download", err.to_string()));
                if let Some(root) = bundled_root {
                    return self.bundled_result(root, true);
                }
                let message = self.build_guidance(&request.logical_name, &attempted, Some(&err));
                TemplateResolutionResult::failed(message, true, Some(err))
            }
        }
    }

    fn bundled_result(&self, root: PathBuf, fallback_attempted: bool) -> TemplateResolutionResult {
        let message = format!("Using bundled templates from {}", root.display());
        let source = TemplateSource {
            size_bytes: dir_size(&root),
            root_path: root,
            kind: TemplateSourceKind::Bundled,
        };
        TemplateResolutionResult::success(source, message, fallback_attempted, None)
    }

    /// Final all-tiers-failed message: which tiers were tried, why each
    /// failed, and how to set up templates manually.
    fn build_guidance(
        &self,
        logical_name: &str,
        attempted: &[(&str, String)],
        failure: Option<&SddError>,
    ) -> String {
        let mut message = format!("No usable template source found for '{}'.\n", logical_name);

        message.push_str("\nAttempted sources:\n");
        for (tier, reason) in attempted {
            message.push_str(&format!("  - {}: {}\n", tier, reason));
        }

        if let Some(SddError::RateLimited { retry_after_secs }) = failure {
            match retry_after_secs {
                Some(secs) => message.push_str(&format!(
                    "\nGitHub rate limit exceeded; retry after about {} seconds.\n",
                    secs
                )),
                None => message.push_str("\nGitHub rate limit exceeded; retry later.\n"),
            }
        }

        message.push_str(&format!(
            "\nTo set up templates manually, create {} and place your template \
             files there (e.g. spec.md, plan.md). sddkit never modifies that \
             directory. Once it exists, run again with --offline to skip \
             network access.\n",
            self.config.local_dir.display()
        ));

        message
    }
}

/// Pick the template directory for `logical_name` under `base`: an explicit
/// `<base>/<logical_name>` subdirectory when present, else `base` itself.
/// Returns the directory and its file count; `None` if it holds no files.
pub(crate) fn select_template_dir(base: &Path, logical_name: &str) -> Option<(PathBuf, usize)> {
    if !base.is_dir() {
        return None;
    }
    let candidate = base.join(logical_name);
    let root = if candidate.is_dir() {
        candidate
    } else {
        base.to_path_buf()
    };
    let file_count = count_files(&root);
    (file_count > 0).then_some((root, file_count))
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

fn dir_size(dir: &Path) -> Option<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
        if entry.file_type().is_file() {
            total += entry.metadata().ok()?.len();
        }
    }
    Some(total)
}
