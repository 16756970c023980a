//! Streaming template archive downloads
//!
//! Fetches one ZIP archive over HTTPS, writing straight to disk in fixed-size
//! chunks so the archive is never buffered in memory. A single timeout covers
//! connect and transfer. Failures are classified into the structured kinds
//! the resolver falls back on: timeout, API status, rate limit, transport.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;

use crate::error::{Result, SddError};
use crate::progress::{ProgressPhase, ProgressSink, ProgressTracker};

/// Filename the archive is streamed into inside the cache directory
pub const ARCHIVE_FILE_NAME: &str = "templates.zip";

/// Read/write chunk size for the streaming copy
const CHUNK_SIZE: usize = 64 * 1024;

/// Removes a partially written file unless disarmed on success
struct PartialGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for PartialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

/// One-shot HTTPS downloader with an overall timeout
pub struct Downloader {
    client: Client,
    timeout: Duration,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sddkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SddError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Downloader { client, timeout })
    }

    /// Download `url` into `dest_dir`, returning the archive path.
    ///
    /// Only `https://` URLs are accepted; plain `http://` is allowed solely
    /// for loopback hosts so tests can run a local stub server. Any error
    /// removes the partially written file before returning.
    pub fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: ProgressSink<'_>,
    ) -> Result<PathBuf> {
        ensure_https(url)?;

        let response = self.client.get(url).send().map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), response.headers()));
        }

        let archive_path = dest_dir.join(ARCHIVE_FILE_NAME);
        let mut guard = PartialGuard {
            path: &archive_path,
            armed: true,
        };

        let total = response.content_length();
        let written = self.stream_to_file(response, &archive_path, total, on_progress)?;

        if written == 0 {
            return Err(SddError::Network {
                message: format!("empty response body from {}", url),
            });
        }

        guard.armed = false;
        Ok(archive_path.clone())
    }

    fn stream_to_file(
        &self,
        mut response: Response,
        archive_path: &Path,
        total: Option<u64>,
        on_progress: ProgressSink<'_>,
    ) -> Result<u64> {
        let mut file = File::create(archive_path)?;
        let mut tracker = ProgressTracker::new(ProgressPhase::Download, total);
        let mut buf = [0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = response.read(&mut buf).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    SddError::DownloadTimeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    SddError::Network {
                        message: format!("transfer failed: {}", e),
                    }
                }
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            written += n as u64;
            if let Some(event) = tracker.update(written) {
                on_progress(&event);
            }
        }

        file.flush()?;
        on_progress(&tracker.finish(written));
        Ok(written)
    }

    fn classify(&self, err: reqwest::Error) -> SddError {
        if err.is_timeout() {
            SddError::DownloadTimeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            SddError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Reject non-HTTPS URLs, excepting loopback hosts for local stub servers.
fn ensure_https(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if let Some(rest) = url.strip_prefix("http://") {
        let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
        let host = if authority.starts_with('[') {
            authority.split(']').next().map(|h| &h[1..]).unwrap_or("")
        } else {
            authority.split(':').next().unwrap_or("")
        };
        if is_loopback(host) {
            return Ok(());
        }
    }
    Err(SddError::HttpsRequired {
        url: url.to_string(),
    })
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1" | "[::1]")
}

/// Map a non-success HTTP status to its structured error kind.
///
/// 429 is always a rate limit; GitHub also signals secondary rate limits as
/// 403 with rate-limit headers, which callers must tell apart from a plain
/// permission error.
fn classify_status(status: u16, headers: &HeaderMap) -> SddError {
    let rate_limited = status == 429
        || (status == 403
            && (headers.contains_key("retry-after")
                || header_str(headers, "x-ratelimit-remaining") == Some("0")));

    if rate_limited {
        SddError::RateLimited {
            retry_after_secs: retry_after_hint(headers),
        }
    } else {
        SddError::GitHubApi { status }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extract a wait hint from `Retry-After` (seconds) or `X-RateLimit-Reset`
/// (epoch timestamp).
fn retry_after_hint(headers: &HeaderMap) -> Option<u64> {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(secs);
    }
    let reset: u64 = header_str(headers, "x-ratelimit-reset")?.parse().ok()?;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(reset.saturating_sub(now))
}
