//! Domain-specific error types for the application manager.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ConfigError`], [`FetchError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ConfigError : registry file missing, malformed, or invalid (fatal to the run)
//! FetchError  : one application's fetch failed (reported, run continues)
//! ├── Asset(MatchError)        : release asset rule did not resolve cleanly
//! ├── Transport(TransportError): HTTP failure
//! └── State(StateError)        : update record could not be persisted
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::assets::MatchError;
use crate::state::StateError;
use crate::transport::TransportError;

/// Errors that arise from loading and validating the application registry.
///
/// Any of these aborts the whole run before a single application is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The registry file could not be read.
    #[error("IO error reading config file {}: {source}", .path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The registry file is not valid TOML or has the wrong shape.
    #[error("Invalid TOML in {}: {message}", .path.display())]
    InvalidSyntax {
        /// Path to the offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The `applications` property is not defined.
    #[error("{} should have the <applications> property defined", .path.display())]
    MissingRegistry {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// One or more entries failed validation.
    #[error("{0}")]
    InvalidEntries(EntryErrors),
}

/// All validation problems found in a single registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    /// Zero-based position of the entry in the registry.
    pub index: usize,
    /// The entry's id, if it declared one.
    pub id: Option<String>,
    /// Human-readable problems, in detection order.
    pub problems: Vec<String>,
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "application '{id}': {}", self.problems.join("; ")),
            None => write!(
                f,
                "application #{}: {}",
                self.index + 1,
                self.problems.join("; ")
            ),
        }
    }
}

/// Every invalid entry of a registry, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryErrors(pub Vec<EntryError>);

impl fmt::Display for EntryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0.len();
        write!(
            f,
            "{count} invalid application {}:",
            if count == 1 { "entry" } else { "entries" }
        )?;
        for entry in &self.0 {
            write!(f, "\n  {entry}")?;
        }
        Ok(())
    }
}

/// Step of the archive sequence that failed after the download succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStep {
    /// Running the unpack program.
    Unpack,
    /// Moving an extracted entry into its destination folder.
    Install(String),
    /// Creating a post-extraction symlink.
    Symlink(PathBuf),
    /// Setting the executable bit on a post-extraction path.
    SetExec(PathBuf),
}

impl fmt::Display for ArchiveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpack => write!(f, "unpack"),
            Self::Install(source) => write!(f, "install '{source}'"),
            Self::Symlink(link) => write!(f, "symlink {}", link.display()),
            Self::SetExec(path) => write!(f, "set executable {}", path.display()),
        }
    }
}

/// Errors that abort a single application's fetch.
///
/// The orchestrator converts every one of these into a
/// [`FetchOutcome::Failed`](crate::fetch::FetchOutcome::Failed); none of them
/// stops sibling applications from being processed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// An `--id` filter named an application that is not configured.
    #[error("unknown application id")]
    UnknownId(String),

    /// A `--type` filter matched no configured application.
    #[error("no application of this type is configured")]
    UnknownType(String),

    /// The destination exists but is not a repository of the expected kind.
    #[error("{} is not a {expected} repository; manual intervention required", .path.display())]
    NotARepository {
        /// The conflicting destination.
        path: PathBuf,
        /// Name of the expected VCS ("git", "mercurial").
        expected: &'static str,
    },

    /// The release asset rule matched zero or several assets.
    #[error(transparent)]
    Asset(#[from] MatchError),

    /// The release manifest could not be interpreted.
    #[error("invalid release manifest from {url}: {message}")]
    Manifest {
        /// The manifest URL.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// An HTTP request failed.
    #[error(transparent)]
    Transport(TransportError),

    /// A network request or external command exceeded its time limit.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An external VCS command failed.
    #[error("{step} failed: {message}")]
    Command {
        /// The step that failed (e.g. "git clone").
        step: String,
        /// Error text, usually the command's stderr.
        message: String,
    },

    /// The pinned revision could not be checked out.
    #[error("cannot check out revision '{revision}': {message}")]
    Revision {
        /// The configured `checkout_revision`.
        revision: String,
        /// Error text from the VCS.
        message: String,
    },

    /// An archive step failed after the download succeeded; earlier steps stay applied.
    #[error("archive step '{step}' failed: {message}")]
    PartialArchive {
        /// The failing step.
        step: ArchiveStep,
        /// Error text.
        message: String,
    },

    /// A local filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The fetch succeeded but its update record could not be saved.
    #[error(transparent)]
    State(#[from] StateError),
}

impl FetchError {
    /// Classify an [`Executor`](crate::exec::Executor) failure for `step`.
    ///
    /// Timeouts raised by the executor become [`FetchError::Timeout`];
    /// everything else becomes [`FetchError::Command`].
    #[must_use]
    pub fn from_command(step: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::timeout_of(err).unwrap_or_else(|| Self::Command {
            step: step.into(),
            message: format!("{err:#}"),
        })
    }

    /// [`FetchError::Timeout`] if `err` is an executor timeout.
    #[must_use]
    pub fn timeout_of(err: &anyhow::Error) -> Option<Self> {
        err.downcast_ref::<crate::exec::TimedOut>()
            .map(|timeout| Self::Timeout(timeout.to_string()))
    }

    /// Wrap an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { url } => Self::Timeout(url),
            other => Self::Transport(other),
        }
    }
}
