//! Template source configuration
//!
//! All configuration is collected once (CLI flags, environment variables,
//! hard-coded defaults) into an immutable [`TemplateConfig`] value that is
//! passed into the resolver at construction time. There is no module-level
//! mutable state.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SddError};

/// Default template repository, in `owner/repo` form
pub const DEFAULT_TEMPLATE_REPO: &str = "asyrjasalo/sdd-templates";

/// Default branch to fetch template archives from
pub const DEFAULT_BRANCH: &str = "main";

/// Default archive host (codeload-style ZIP endpoint)
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://codeload.github.com";

/// Subdirectory inside the extracted archive root that holds the templates
pub const TEMPLATES_SUBDIR: &str = "templates";

/// Default overall download timeout (connect + transfer), in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Project-relative directory for user-owned template overrides
pub const LOCAL_TEMPLATES_DIR: &str = ".sdd/templates";

/// Environment variable overriding the default template repository
pub const ENV_TEMPLATE_REPO: &str = "SDDKIT_TEMPLATE_REPO";

/// Environment variable overriding the archive host (testing, GH Enterprise)
pub const ENV_ARCHIVE_BASE_URL: &str = "SDDKIT_ARCHIVE_BASE_URL";

/// Environment variable overriding the cache root directory
pub const ENV_CACHE_DIR: &str = "SDDKIT_CACHE_DIR";

/// Environment variable overriding the download timeout, in seconds
pub const ENV_DOWNLOAD_TIMEOUT: &str = "SDDKIT_DOWNLOAD_TIMEOUT";

/// Environment variable overriding the bundled templates directory
pub const ENV_BUNDLED_DIR: &str = "SDDKIT_BUNDLED_TEMPLATES_DIR";

/// Environment variable enabling offline mode by default
pub const ENV_OFFLINE: &str = "SDDKIT_OFFLINE";

/// A GitHub repository identifier in `owner/repo` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoRef {
    type Err = SddError;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('@');
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(RepoRef {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(SddError::InvalidTemplateRepo {
                input: input.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Immutable configuration for one template resolution session
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// Default template repository (overridable per request)
    pub repo: RepoRef,
    /// Branch whose archive is downloaded
    pub branch: String,
    /// Codeload-style archive host, e.g. `https://codeload.github.com`
    pub archive_base_url: String,
    /// Subdirectory inside the extracted archive that holds templates
    pub templates_subdir: String,
    /// Overall download timeout covering connect + transfer
    pub timeout: Duration,
    /// Cache root override; the OS temp root is used when unset
    pub cache_root: Option<PathBuf>,
    /// User-owned local override directory (never written to)
    pub local_dir: PathBuf,
    /// Bundled fallback directory shipped with the installation, if any
    pub bundled_dir: Option<PathBuf>,
}

impl TemplateConfig {
    /// Build a configuration with hard-coded defaults for `project_dir`.
    pub fn new(project_dir: &Path) -> Result<Self> {
        Ok(TemplateConfig {
            repo: DEFAULT_TEMPLATE_REPO.parse()?,
            branch: DEFAULT_BRANCH.to_string(),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            templates_subdir: TEMPLATES_SUBDIR.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_root: None,
            local_dir: project_dir.join(LOCAL_TEMPLATES_DIR),
            bundled_dir: default_bundled_dir(),
        })
    }

    /// Build a configuration for `project_dir`, applying environment overrides.
    pub fn from_env(project_dir: &Path) -> Result<Self> {
        let mut config = Self::new(project_dir)?;

        if let Ok(repo) = std::env::var(ENV_TEMPLATE_REPO) {
            config.repo = repo.parse()?;
        }
        if let Ok(base) = std::env::var(ENV_ARCHIVE_BASE_URL) {
            config.archive_base_url = base.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            config.cache_root = Some(PathBuf::from(dir));
        }
        if let Ok(secs) = std::env::var(ENV_DOWNLOAD_TIMEOUT) {
            let secs: u64 = secs.parse().map_err(|_| SddError::CacheOperationFailed {
                message: format!("{} must be a number of seconds, got '{}'", ENV_DOWNLOAD_TIMEOUT, secs),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var(ENV_BUNDLED_DIR) {
            config.bundled_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Codeload archive URL for `repo` on the configured branch.
    ///
    /// Example: `https://codeload.github.com/acme/sdd-templates/zip/refs/heads/main`
    pub fn archive_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/{}/{}/zip/refs/heads/{}",
            self.archive_base_url, repo.owner, repo.repo, self.branch
        )
    }
}

/// Locate the bundled fallback templates shipped with the installation.
///
/// Checked in order: next to the executable (`../share/sddkit/templates`),
/// then the per-user data directory. Returns the first existing candidate.
fn default_bundled_dir() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(prefix) = exe.parent().and_then(|bin| bin.parent()) {
            let share = prefix.join("share").join("sddkit").join(TEMPLATES_SUBDIR);
            if share.is_dir() {
                return Some(share);
            }
        }
    }

    let data = dirs::data_dir()?.join("sddkit").join(TEMPLATES_SUBDIR);
    data.is_dir().then_some(data)
}
