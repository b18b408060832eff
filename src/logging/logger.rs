//! Structured logger with per-application summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{Log, OutcomeEntry, OutcomeStatus};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with summary collection.
///
/// Console and file output go through [`tracing`]; the logger itself only
/// collects outcomes and remembers where the log file is for the summary.
#[derive(Debug)]
pub struct Logger {
    outcomes: Mutex<Vec<OutcomeEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// `log_file` is only shown in the run summary. The file itself is
    /// written by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub const fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded outcomes.
    #[must_use]
    pub fn outcomes(&self) -> Vec<OutcomeEntry> {
        self.outcomes.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "userapps::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file via the [`FileLayer`](super::subscriber::FileLayer)).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record an application result for the summary.
    pub fn record_outcome(&self, id: &str, status: OutcomeStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.outcomes.lock() {
            guard.push(OutcomeEntry {
                id: id.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed applications.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|o| o.status == OutcomeStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded outcomes.
    pub fn print_summary(&self) {
        let outcomes = self.outcomes();
        if outcomes.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        for outcome in &outcomes {
            let (icon, color) = match outcome.status {
                OutcomeStatus::Updated => ("✓", "\x1b[32m"),
                OutcomeStatus::UpToDate => ("=", "\x1b[2m"),
                OutcomeStatus::Skipped => ("○", "\x1b[33m"),
                OutcomeStatus::Failed => ("✗", "\x1b[31m"),
            };
            let suffix = outcome
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", outcome.id));
        }

        println!();
        self.info(&summary_line(&outcomes));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

/// One-line count of outcomes by status.
fn summary_line(outcomes: &[OutcomeEntry]) -> String {
    let count = |status| outcomes.iter().filter(|o| o.status == status).count();
    format!(
        "{} applications: \x1b[32m{} updated\x1b[0m, \x1b[2m{} up to date\x1b[0m, \x1b[33m{} skipped\x1b[0m, \x1b[31m{} failed\x1b[0m",
        outcomes.len(),
        count(OutcomeStatus::Updated),
        count(OutcomeStatus::UpToDate),
        count(OutcomeStatus::Skipped),
        count(OutcomeStatus::Failed),
    )
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_outcome(&self, id: &str, status: OutcomeStatus, message: Option<&str>) {
        self.record_outcome(id, status, message);
    }
}
