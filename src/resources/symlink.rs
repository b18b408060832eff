//! Symlink resource.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::helpers::fs::{ensure_parent_dir, is_real_dir};
use super::{Resource, ResourceChange, ResourceState};

/// A symlink at `link` pointing to `target`.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// What the symlink points to.
    pub target: PathBuf,
    /// Where the symlink is created.
    pub link: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(target: PathBuf, link: PathBuf) -> Self {
        Self { target, link }
    }
}

impl Resource for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.link.display(), self.target.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.target.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("target does not exist: {}", self.target.display()),
            });
        }

        if is_real_dir(&self.link) {
            return Ok(ResourceState::Invalid {
                reason: "link path is a real directory".to_string(),
            });
        }

        std::fs::read_link(&self.link).map_or_else(
            |_| {
                if self.link.exists() {
                    Ok(ResourceState::Incorrect {
                        current: "link path is a regular file".to_string(),
                    })
                } else {
                    Ok(ResourceState::Missing)
                }
            },
            |existing| {
                if existing == self.target {
                    Ok(ResourceState::Correct)
                } else {
                    Ok(ResourceState::Incorrect {
                        current: format!("points to {}", existing.display()),
                    })
                }
            },
        )
    }

    fn apply(&self) -> Result<ResourceChange> {
        ensure_parent_dir(&self.link)?;

        // Replace an existing link (possibly dangling) or regular file.
        if self.link.symlink_metadata().is_ok() {
            if is_real_dir(&self.link) {
                anyhow::bail!("refusing to replace directory {}", self.link.display());
            }
            std::fs::remove_file(&self.link)
                .with_context(|| format!("remove existing: {}", self.link.display()))?;
        }

        create_symlink(&self.target, &self.link)?;
        Ok(ResourceChange::Applied)
    }
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };

    result.with_context(|| {
        format!(
            "creating symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}
