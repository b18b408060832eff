use anyhow::{Context as _, Result, bail};
use std::fmt::Debug;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between `try_wait` polls while a child process runs.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// A child process was killed because it outlived its deadline.
#[derive(Debug, thiserror::Error)]
#[error("{label} did not finish within {}s", after.as_secs())]
pub struct TimedOut {
    /// Command description.
    pub label: String,
    /// The limit that was exceeded.
    pub after: Duration,
}

/// Seam between fetch strategies and external programs (`git`, `hg`, unpackers).
///
/// Tests substitute a recording implementation; production code uses
/// [`SystemExecutor`].
pub trait Executor: Send + Sync + Debug {
    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned, times out, or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in a specific directory. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned, times out, or exits non-zero.
    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in a specific directory, allowing a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be spawned or times out.
    fn run_unchecked_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Runs real processes with stdin closed and a wall-clock limit.
#[derive(Debug, Clone, Copy)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    /// Create an executor that kills any child running longer than `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn execute(&self, mut cmd: Command, label: &str) -> Result<ExecResult> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to execute: {label}"))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = self.wait(&mut child, label)?;

        Ok(ExecResult {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            success: status.success(),
            code: status.code(),
        })
    }

    fn wait(&self, child: &mut Child, label: &str) -> Result<ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for: {label}"))?
            {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // Already-exited races are harmless here.
                let _ = child.kill();
                let _ = child.wait();
                return Err(TimedOut {
                    label: label.to_string(),
                    after: self.timeout,
                }
                .into());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn execute_checked(&self, cmd: Command, label: &str) -> Result<ExecResult> {
        let result = self.execute(cmd, label)?;
        if !result.success {
            bail!(
                "{label} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }
}

/// Read a child pipe to completion on a helper thread so a chatty process
/// cannot block on a full pipe while we poll it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.execute_checked(cmd, &label(program, args))
    }

    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);
        self.execute_checked(
            cmd,
            &format!("{} in {}", label(program, args), dir.display()),
        )
    }

    fn run_unchecked_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);
        self.execute(cmd, &format!("{} in {}", label(program, args), dir.display()))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// `program` plus its first argument (the subcommand for VCS tools).
fn label(program: &str, args: &[&str]) -> String {
    args.first()
        .map_or_else(|| program.to_string(), |sub| format!("{program} {sub}"))
}
