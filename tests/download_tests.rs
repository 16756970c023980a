//! Downloader integration tests against a loopback stub server

mod common;

use std::time::Duration;

use common::{StubResponse, StubServer};
use serial_test::serial;
use sddkit::download::Downloader;
use sddkit::error::SddError;
use sddkit::progress::ProgressPhase;
use tempfile::TempDir;

#[test]
fn test_download_streams_body_to_disk() {
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let server = StubServer::serve(vec![StubResponse::Ok(body.clone())]);
    let dest = TempDir::new().expect("dest dir");

    let downloader = Downloader::new(Duration::from_secs(5)).expect("client");
    let mut events = Vec::new();
    let mut sink = |event: &sddkit::progress::ProgressEvent| events.push(event.clone());
    let archive = downloader
        .download(&server.url("/acme/tmpl/zip/refs/heads/main"), dest.path(), &mut sink)
        .expect("download");

    assert_eq!(std::fs::read(&archive).expect("archive bytes"), body);

    // Progress is monotonic and ends at the full body size
    assert!(!events.is_empty());
    let mut last = 0;
    for event in &events {
        assert_eq!(event.phase, ProgressPhase::Download);
        assert!(event.bytes_done >= last);
        last = event.bytes_done;
    }
    assert_eq!(last, body.len() as u64);
}

#[test]
fn test_download_reports_status_errors() {
    let server = StubServer::serve(vec![StubResponse::Status {
        status: 404,
        reason: "Not Found",
        headers: vec![],
    }]);
    let dest = TempDir::new().expect("dest dir");

    let downloader = Downloader::new(Duration::from_secs(5)).expect("client");
    let mut sink = |_: &sddkit::progress::ProgressEvent| {};
    let err = downloader
        .download(&server.url("/missing"), dest.path(), &mut sink)
        .expect_err("should fail");

    assert!(matches!(err, SddError::GitHubApi { status: 404 }));
}

#[test]
fn test_rate_limit_classification_with_retry_after() {
    let server = StubServer::serve(vec![StubResponse::Status {
        status: 429,
        reason: "Too Many Requests",
        headers: vec![("Retry-After".to_string(), "30".to_string())],
    }]);
    let dest = TempDir::new().expect("dest dir");

    let downloader = Downloader::new(Duration::from_secs(5)).expect("client");
    let mut sink = |_: &sddkit::progress::ProgressEvent| {};
    let err = downloader
        .download(&server.url("/limited"), dest.path(), &mut sink)
        .expect_err("should fail");

    assert!(matches!(
        err,
        SddError::RateLimited {
            retry_after_secs: Some(30)
        }
    ));
}

// Timing-sensitive: serialized so a loaded test runner cannot skew the clock
#[test]
#[serial]
fn test_timeout_is_classified_and_leaves_no_partial_file() {
    let server = StubServer::serve(vec![StubResponse::Stall]);
    let dest = TempDir::new().expect("dest dir");

    let downloader = Downloader::new(Duration::from_secs(1)).expect("client");
    let mut sink = |_: &sddkit::progress::ProgressEvent| {};
    let err = downloader
        .download(&server.url("/slow"), dest.path(), &mut sink)
        .expect_err("should time out");

    assert!(matches!(err, SddError::DownloadTimeout { seconds: 1 }));
    let leftovers = std::fs::read_dir(dest.path()).expect("read dest").count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_non_loopback_http_is_rejected_without_network() {
    let dest = TempDir::new().expect("dest dir");
    let downloader = Downloader::new(Duration::from_secs(5)).expect("client");
    let mut sink = |_: &sddkit::progress::ProgressEvent| {};
    let err = downloader
        .download("http://example.com/archive.zip", dest.path(), &mut sink)
        .expect_err("should refuse");

    assert!(matches!(err, SddError::HttpsRequired { .. }));
}
