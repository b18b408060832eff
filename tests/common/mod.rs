// Shared helpers for integration tests.
//
// Provides a temporary home directory with a registry file, plus in-process
// stand-ins for the HTTP transport and the process executor, so each
// integration test drives the public API end to end without network access
// or external programs.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use userapps_cli::config::{self, Registry};
use userapps_cli::exec::{ExecResult, Executor};
use userapps_cli::fetch::Context;
use userapps_cli::logging::{Log, OutcomeStatus};
use userapps_cli::transport::{Transport, TransportError};

/// Transport serving canned bodies by URL and counting downloads.
#[derive(Debug, Default)]
pub struct FakeTransport {
    bodies: HashMap<String, String>,
    downloads: Mutex<Vec<String>>,
}

impl FakeTransport {
    /// Serve `body` for GETs of `url` (both text and downloads).
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    /// URLs downloaded so far, in order.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().expect("downloads lock").clone()
    }

    fn body(&self, url: &str) -> Result<&String, TransportError> {
        self.bodies.get(url).ok_or_else(|| TransportError::Status {
            url: url.to_string(),
            code: 404,
        })
    }
}

impl Transport for FakeTransport {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.body(url).cloned()
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError> {
        let body = self.body(url)?;
        self.downloads
            .lock()
            .expect("downloads lock")
            .push(url.to_string());
        std::fs::write(dest, body).map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Executor standing in for `git` and unpackers.
///
/// `git clone <url> <dest>` creates `<dest>` and `git rev-parse --show-toplevel`
/// reports the working directory, so a second run sees a repository. Any other
/// program run in a directory "unpacks" by writing `files` there.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    files: Vec<(String, String)>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    /// Files (relative path, content) an unpack run creates in its working directory.
    pub fn unpacks(mut self, files: &[(&str, &str)]) -> Self {
        self.files = files
            .iter()
            .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
            .collect();
        self
    }

    /// Every command line run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, program: &str, args: &[&str]) {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().expect("calls lock").push(line);
    }
}

fn ok(stdout: impl Into<String>) -> ExecResult {
    ExecResult {
        stdout: stdout.into(),
        stderr: String::new(),
        success: true,
        code: Some(0),
    }
}

impl Executor for FakeExecutor {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.record(program, args);
        if program == "git"
            && args.first() == Some(&"clone")
            && let Some(dest) = args.last()
        {
            std::fs::create_dir_all(dest)?;
        }
        Ok(ok(""))
    }

    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.record(program, args);
        match program {
            "git" if args == ["rev-parse", "HEAD"] => Ok(ok("0123456789abcdef\n")),
            "git" => Ok(ok("")),
            _ => {
                for (path, content) in &self.files {
                    let file = dir.join(path);
                    if let Some(parent) = file.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(file, content)?;
                }
                Ok(ok(""))
            }
        }
    }

    fn run_unchecked_in(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
    ) -> anyhow::Result<ExecResult> {
        self.record(program, args);
        Ok(ok(dir.to_string_lossy()))
    }

    fn which(&self, program: &str) -> bool {
        program != "missing-unpacker"
    }
}

/// Logger that keeps recorded outcomes in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    outcomes: Mutex<Vec<(String, OutcomeStatus)>>,
}

impl MemoryLog {
    pub fn outcomes(&self) -> Vec<(String, OutcomeStatus)> {
        self.outcomes.lock().expect("outcomes lock").clone()
    }
}

impl Log for MemoryLog {
    fn stage(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn debug(&self, _: &str) {}
    fn warn(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn record_outcome(&self, id: &str, status: OutcomeStatus, _: Option<&str>) {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push((id.to_string(), status));
    }
}

/// An isolated home directory with a registry file, backed by a
/// [`tempfile::TempDir`].
pub struct TestHome {
    pub dir: tempfile::TempDir,
}

impl TestHome {
    /// Create a home whose `apps.toml` holds `registry`.
    pub fn with_registry(registry: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("apps.toml"), registry).expect("write registry");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("apps.toml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join(".local/state/userapps/update-data.json")
    }

    /// Load and validate the registry with paths expanded against this home.
    pub fn registry(&self) -> Registry {
        config::load(&self.config_path(), self.path()).expect("load registry")
    }
}

/// Build a fetch context from shared fakes.
pub fn context(
    executor: &Arc<FakeExecutor>,
    transport: &Arc<FakeTransport>,
    log: &Arc<MemoryLog>,
    forced: bool,
) -> Context {
    Context::new(
        Arc::clone(executor) as Arc<dyn Executor>,
        Arc::clone(transport) as Arc<dyn Transport>,
        Arc::clone(log) as Arc<dyn Log>,
        forced,
    )
}
