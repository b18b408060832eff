//! Per-kind acquire/update protocols.
//!
//! Each [`AppKind`] has one strategy. [`apply`] dispatches to it and turns any
//! [`FetchError`] into [`FetchOutcome::Failed`], so callers never see a
//! per-application error escape.
mod archive;
mod file;
mod release;
mod repo;

use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::config::{AppKind, ApplicationSpec};
use crate::error::FetchError;
use crate::exec::Executor;
use crate::logging::{Log, OutcomeStatus};
use crate::state::UpdateRecord;
use crate::transport::Transport;

/// Result of processing one application.
#[derive(Debug)]
pub enum FetchOutcome {
    /// New content is in place.
    Updated {
        /// Release tag, commit/changeset id, or payload hash.
        remote_id: String,
        /// SHA-256 of the downloaded payload, if anything was downloaded.
        content_hash: Option<String>,
    },
    /// Nothing newer on the remote.
    UpToDate,
    /// Not attempted.
    Skipped(String),
    /// The attempt failed.
    Failed(FetchError),
}

impl FetchOutcome {
    /// Summary bucket for this outcome.
    #[must_use]
    pub const fn status(&self) -> OutcomeStatus {
        match self {
            Self::Updated { .. } => OutcomeStatus::Updated,
            Self::UpToDate => OutcomeStatus::UpToDate,
            Self::Skipped(_) => OutcomeStatus::Skipped,
            Self::Failed(_) => OutcomeStatus::Failed,
        }
    }

    /// Short human-readable detail for the summary line.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Updated { remote_id, .. } => Some(remote_id.clone()),
            Self::UpToDate => None,
            Self::Skipped(reason) => Some(reason.clone()),
            Self::Failed(err) => Some(err.to_string()),
        }
    }

    /// Whether this outcome is a failure.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Everything a strategy needs besides the spec and its prior record.
pub struct Context {
    /// Runs `git`, `hg`, and unpack programs.
    pub executor: Arc<dyn Executor>,
    /// Fetches manifests and payloads.
    pub transport: Arc<dyn Transport>,
    /// Progress output.
    pub log: Arc<dyn Log>,
    /// Bypass every "already up to date" check.
    pub forced: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("executor", &self.executor)
            .field("transport", &"<dyn Transport>")
            .field("log", &"<dyn Log>")
            .field("forced", &self.forced)
            .finish()
    }
}

impl Context {
    /// Creates a new fetch context.
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        transport: Arc<dyn Transport>,
        log: Arc<dyn Log>,
        forced: bool,
    ) -> Self {
        Self {
            executor,
            transport,
            log,
            forced,
        }
    }
}

/// Acquire or update one application.
///
/// Never fails: errors are reported as [`FetchOutcome::Failed`].
#[must_use]
pub fn apply(spec: &ApplicationSpec, prior: Option<&UpdateRecord>, ctx: &Context) -> FetchOutcome {
    let result = match spec.kind {
        AppKind::GitRepo | AppKind::HgRepo => repo::sync(spec, prior, ctx),
        AppKind::File => file::fetch(spec, prior, ctx),
        AppKind::Archive => archive::fetch(spec, prior, ctx),
    };
    result.unwrap_or_else(FetchOutcome::Failed)
}

/// The configured destination; validation guarantees one for non-archive kinds.
fn destination(spec: &ApplicationSpec) -> Result<&Path, FetchError> {
    spec.destination
        .as_deref()
        .ok_or_else(|| FetchError::Command {
            step: "resolve destination".to_string(),
            message: format!("'{}' has no destination", spec.id),
        })
}

/// Convert a filesystem helper failure into [`FetchError::Io`], keeping the
/// underlying [`io::Error`] when there is one.
fn local_io(context: impl Into<String>, err: anyhow::Error) -> FetchError {
    let source = match err.downcast::<io::Error>() {
        Ok(source) => source,
        Err(other) => io::Error::other(format!("{other:#}")),
    };
    FetchError::io(context, source)
}
