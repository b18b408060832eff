//! Idempotent filesystem primitives (check + apply pattern).
//!
//! Archive post-extraction actions are expressed as resources so that a
//! second run over an already-correct tree changes nothing.
pub mod chmod;
pub mod symlink;

pub mod helpers {
    //! Shared filesystem helpers.
    pub mod fs;
}

use anyhow::Result;

/// State of a resource on disk.
///
/// # Examples
///
/// ```
/// use userapps_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "points to /old".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_ne!(wrong, ResourceState::Correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// The current value of the resource.
        current: String,
    },
    /// Resource cannot be applied (e.g., a real directory sits at a link path).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
}

/// Unified interface for resources that can be checked and applied.
pub trait Resource {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource state cannot be determined due to I/O
    /// failures or permission issues.
    fn current_state(&self) -> Result<ResourceState>;

    /// Bring the resource to its desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is [`ResourceState::Invalid`] or the
    /// change cannot be made.
    fn apply(&self) -> Result<ResourceChange>;

    /// Determine if the resource needs to be changed.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state).
    fn needs_change(&self) -> Result<bool> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Missing | ResourceState::Incorrect { .. }
        ))
    }

    /// Apply only when [`needs_change`](Self::needs_change) says so.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is invalid or the change fails.
    fn ensure(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => {
                anyhow::bail!("{}: {reason}", self.description())
            }
            ResourceState::Missing | ResourceState::Incorrect { .. } => self.apply(),
        }
    }
}
