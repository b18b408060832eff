//! Core logging types: outcome entries, status, and the [`Log`] trait.
use std::fmt;

/// Per-application result for summary reporting.
#[derive(Debug, Clone)]
pub struct OutcomeEntry {
    /// Application id (or the unknown id / type that was requested).
    pub id: String,
    /// Final status of the application.
    pub status: OutcomeStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a processed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// New content was fetched and recorded.
    Updated,
    /// The remote had nothing newer.
    UpToDate,
    /// Not attempted (not due yet, or a required tool is missing).
    Skipped,
    /// The fetch failed; siblings were still processed.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Updated => "updated",
            Self::UpToDate => "up to date",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the production implementation;
/// tests may substitute a silent one.
pub trait Log: Send + Sync {
    /// Log a stage header (one per application).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record an application result for the summary.
    fn record_outcome(&self, id: &str, status: OutcomeStatus, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_is_human_readable() {
        assert_eq!(OutcomeStatus::UpToDate.to_string(), "up to date");
        assert_eq!(OutcomeStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn outcome_entry_clone() {
        let entry = OutcomeEntry {
            id: "bash-it".to_string(),
            status: OutcomeStatus::Updated,
            message: Some("abc123".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.id, entry.id);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
