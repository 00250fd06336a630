// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed workspace holding a script
// document and an optional settings file, a silent logger, and a one-shot
// HTTP server for remote-source tests.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use taskscript_cli::config::Config;
use taskscript_cli::exec::CancelToken;
use taskscript_cli::executors::Context;
use taskscript_cli::logging::Log;
use taskscript_cli::resources::download::Downloader;
use taskscript_cli::tasks::TaskRegistry;

/// Log sink that discards everything.
#[derive(Debug)]
pub struct NullLog;

impl Log for NullLog {
    fn stage(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Execution context using the system command runner and a silent logger.
pub fn context() -> Context {
    Context::new(Arc::new(NullLog), Downloader::default(), CancelToken::new())
}

/// An isolated workspace backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct Workspace {
    /// Temporary directory containing the document and any fixtures.
    pub root: tempfile::TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Absolute path of `name` inside the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Path of the script document.
    pub fn document(&self) -> PathBuf {
        self.path("site.yaml")
    }

    /// Write the script document. `{root}` is replaced with the workspace
    /// path so tasks can target files inside it.
    pub fn with_document(self, text: &str) -> Self {
        let text = text.replace("{root}", &self.root.path().display().to_string());
        std::fs::write(self.document(), text).expect("write document");
        self
    }

    /// Write `taskscript.toml` next to the document.
    pub fn with_settings(self, text: &str) -> Self {
        std::fs::write(self.path("taskscript.toml"), text).expect("write settings");
        self
    }

    /// Write a fixture file.
    pub fn with_file(self, name: &str, contents: &[u8]) -> Self {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture parent");
        }
        std::fs::write(path, contents).expect("write fixture");
        self
    }

    /// Load and build the document with the default task kinds.
    pub fn load(&self) -> Config {
        Config::load(&self.document(), None, &TaskRegistry::with_default_kinds())
            .expect("load config")
    }

    /// Read a workspace file as text.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("read workspace file")
    }

    /// Whether `name` exists in the workspace.
    pub fn exists(&self, name: &str) -> bool {
        Path::new(&self.path(name)).exists()
    }
}

/// Serve `body` to exactly one HTTP request on a local port.
///
/// Returns the base URL (`http://127.0.0.1:<port>`) and the server thread.
pub fn serve_once(body: &'static [u8]) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
    let addr = listener.local_addr().expect("local addr");
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write head");
        stream.write_all(body).expect("write body");
        stream.flush().expect("flush");
    });
    (format!("http://{addr}"), handle)
}
