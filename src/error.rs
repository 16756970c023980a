//! Error types and handling for sddkit
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! The taxonomy is a flat tagged set rather than a hierarchy: network kinds
//! (timeout, API status, rate limit, transport), validation kinds (corrupt
//! archive, unsafe entry path, invalid template structure) and cache kinds.
//! The resolver pattern-matches on these to decide which tier to fall back to.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for sddkit operations
#[derive(Error, Diagnostic, Debug)]
pub enum SddError {
    // Network errors
    #[error("Download timed out after {seconds}s")]
    #[diagnostic(
        code(sddkit::net::timeout),
        help(
            "Check your network connection, or raise the limit with SDDKIT_DOWNLOAD_TIMEOUT. \
             Use --offline to skip the download entirely."
        )
    )]
    DownloadTimeout { seconds: u64 },

    #[error("GitHub returned HTTP {status}")]
    #[diagnostic(
        code(sddkit::net::github_api),
        help("Check that the template repository and branch exist and are public")
    )]
    GitHubApi { status: u16 },

    #[error("GitHub rate limit exceeded")]
    #[diagnostic(
        code(sddkit::net::rate_limited),
        help("Wait for the limit to reset, or use --offline with a local template directory")
    )]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Network error: {message}")]
    #[diagnostic(code(sddkit::net::transport))]
    Network { message: String },

    #[error("Refusing non-HTTPS template source: {url}")]
    #[diagnostic(
        code(sddkit::net::https_required),
        help("Template archives are only downloaded over https:// URLs")
    )]
    HttpsRequired { url: String },

    #[error("Invalid template repository: {input}")]
    #[diagnostic(
        code(sddkit::config::invalid_repo),
        help("Template repositories use the format owner/repo, e.g. acme/sdd-templates")
    )]
    InvalidTemplateRepo { input: String },

    // Validation errors
    #[error("Template archive is corrupt: {reason}")]
    #[diagnostic(code(sddkit::archive::corrupt))]
    ArchiveCorrupt { reason: String },

    #[error("Template archive contains an unsafe entry path: {entry}")]
    #[diagnostic(
        code(sddkit::archive::unsafe_path),
        help("The archive tried to write outside the extraction directory and was rejected")
    )]
    ArchiveUnsafePath { entry: String },

    #[error("Downloaded templates are invalid: {reason}")]
    #[diagnostic(code(sddkit::archive::invalid_templates))]
    TemplatesInvalid { reason: String },

    // Cache errors
    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(sddkit::cache::operation_failed))]
    CacheOperationFailed { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(sddkit::fs::io_error))]
    IoError { message: String },
}

impl SddError {
    /// True for any connectivity-related kind, including rate limits.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SddError::DownloadTimeout { .. }
                | SddError::GitHubApi { .. }
                | SddError::RateLimited { .. }
                | SddError::Network { .. }
                | SddError::HttpsRequired { .. }
        )
    }

    /// True for archive/template validation kinds. These trigger exactly one
    /// download retry in the resolver before falling back a tier.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SddError::ArchiveCorrupt { .. }
                | SddError::ArchiveUnsafePath { .. }
                | SddError::TemplatesInvalid { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SddError::RateLimited { .. })
    }
}

impl From<std::io::Error> for SddError {
    fn from(err: std::io::Error) -> Self {
        SddError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for SddError {
    fn from(err: zip::result::ZipError) -> Self {
        SddError::ArchiveCorrupt {
            reason: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for SddError {
    fn from(err: walkdir::Error) -> Self {
        SddError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, SddError>;
