//! Common test utilities for sddkit integration tests

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A test project workspace for integration tests
pub struct TestWorkspace {
    /// Temporary directory
    pub temp: TempDir,
    /// Path to project root
    pub path: PathBuf,
}

impl TestWorkspace {
    /// Create a new test workspace
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// Write a file in the workspace
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from the workspace
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Check if a file exists in the workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Create the local template override directory (`.sdd/templates`)
    pub fn create_local_templates(&self) -> PathBuf {
        let dir = self.path.join(".sdd/templates");
        std::fs::create_dir_all(&dir).expect("Failed to create local templates directory");
        dir
    }

    /// Isolated cache root for this workspace
    pub fn cache_root(&self) -> PathBuf {
        let dir = self.path.join("cache-root");
        std::fs::create_dir_all(&dir).expect("Failed to create cache root");
        dir
    }

    /// Build a `sddkit` command running against this workspace with an
    /// isolated cache root and no ambient configuration
    pub fn sddkit_cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("sddkit").expect("sddkit binary not built");
        cmd.current_dir(&self.path)
            .env("SDDKIT_CACHE_DIR", self.cache_root())
            .env_remove("SDDKIT_OFFLINE")
            .env_remove("SDDKIT_TEMPLATE_REPO")
            .env_remove("SDDKIT_ARCHIVE_BASE_URL")
            .env_remove("SDDKIT_BUNDLED_TEMPLATES_DIR")
            .env_remove("SDDKIT_DOWNLOAD_TIMEOUT");
        cmd
    }
}

/// ZIP archive bytes holding the given (entry name, content) pairs
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip archive")
        .into_inner()
}

/// A GitHub-codeload-shaped archive: single `<repo>-<branch>/` wrapper
/// directory with a `templates/` subdirectory inside
pub fn github_archive_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<(String, &str)> = files
        .iter()
        .map(|(name, content)| (format!("sdd-templates-main/templates/{}", name), *content))
        .collect();
    let borrowed: Vec<(&str, &str)> = entries
        .iter()
        .map(|(name, content)| (name.as_str(), *content))
        .collect();
    zip_bytes(&borrowed)
}

/// One canned response for the stub HTTP server
#[derive(Clone)]
pub enum StubResponse {
    /// 200 with the given body
    Ok(Vec<u8>),
    /// Arbitrary status with extra headers and empty body
    Status {
        status: u16,
        reason: &'static str,
        headers: Vec<(String, String)>,
    },
    /// Accept the request, then stall until past any client timeout
    Stall,
}

/// Minimal single-threaded HTTP stub over a loopback TcpListener.
///
/// Serves canned responses in order; the last response repeats. Connections
/// that send no request bytes (the shutdown wake-up) are not counted.
pub struct StubServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn serve(responses: Vec<StubResponse>) -> Self {
        assert!(!responses.is_empty(), "StubServer needs at least one response");
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("Failed to read stub address");
        let hits = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_hits = Arc::clone(&hits);
        let thread_shutdown = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            let mut served = 0usize;
            for stream in listener.incoming() {
                if thread_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let response = responses[served.min(responses.len() - 1)].clone();
                if handle_connection(stream, &response) {
                    served += 1;
                    thread_hits.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        StubServer {
            addr,
            hits,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Base URL of the stub server, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Number of requests served so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop; this connection sends nothing and is ignored
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Returns true when a request was actually read and answered
fn handle_connection(mut stream: TcpStream, response: &StubResponse) -> bool {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));

    let mut buf = [0u8; 4096];
    let mut request = Vec::new();
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    if request.is_empty() {
        return false;
    }

    match response {
        StubResponse::Ok(body) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/zip\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
        StubResponse::Status {
            status,
            reason,
            headers,
        } => {
            let mut header = format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\n", status, reason);
            for (name, value) in headers {
                header.push_str(&format!("{}: {}\r\n", name, value));
            }
            header.push_str("Connection: close\r\n\r\n");
            let _ = stream.write_all(header.as_bytes());
        }
        StubResponse::Stall => {
            // Hold the connection open with no response bytes
            std::thread::sleep(Duration::from_secs(4));
        }
    }
    let _ = stream.flush();
    true
}
