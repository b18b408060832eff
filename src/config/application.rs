//! Typed application entries produced by registry validation.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::assets::AssetRule;

/// How an application is acquired and refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum AppKind {
    /// A Git repository cloned into `destination`.
    GitRepo,
    /// A Mercurial repository cloned into `destination`.
    HgRepo,
    /// A single downloaded file written to `destination`.
    File,
    /// A downloaded archive unpacked into one or more folders.
    Archive,
}

impl AppKind {
    /// Registry spelling of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitRepo => "git_repo",
            Self::HgRepo => "hg_repo",
            Self::File => "file",
            Self::Archive => "archive",
        }
    }

    /// Whether entries of this kind are version-control checkouts.
    #[must_use]
    pub const fn is_repository(self) -> bool {
        matches!(self, Self::GitRepo | Self::HgRepo)
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git_repo" => Ok(Self::GitRepo),
            "hg_repo" => Ok(Self::HgRepo),
            "file" => Ok(Self::File),
            "archive" => Ok(Self::Archive),
            other => Err(format!(
                "unknown type '{other}' (expected git_repo, hg_repo, file, or archive)"
            )),
        }
    }
}

/// Minimum interval between fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Frequency {
    /// Every run.
    Daily,
    /// At least 6 days apart.
    #[default]
    Weekly,
    /// At least 28 days apart.
    Monthly,
    /// At least 87 days apart.
    Semestrial,
}

impl Frequency {
    /// Whole days that must elapse since the last fetch before the next one.
    #[must_use]
    pub const fn threshold_days(self) -> i64 {
        match self {
            Self::Daily => 0,
            Self::Weekly => 6,
            Self::Monthly => 28,
            Self::Semestrial => 87,
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" | "daily" => Ok(Self::Daily),
            "w" | "weekly" => Ok(Self::Weekly),
            "m" | "monthly" => Ok(Self::Monthly),
            "s" | "semestrial" => Ok(Self::Semestrial),
            other => Err(format!(
                "unknown frequency '{other}' (expected daily, weekly, monthly, or semestrial)"
            )),
        }
    }
}

/// One `(source-in-archive, destination-folder)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackTarget {
    /// Path of the entry inside the extracted archive.
    pub source: String,
    /// Folder that receives `basename(source)`.
    pub destination_folder: PathBuf,
}

impl UnpackTarget {
    /// Final location of the installed entry. Validation guarantees `source`
    /// ends in a named entry.
    #[must_use]
    pub fn installed_path(&self) -> PathBuf {
        let name = Path::new(&self.source)
            .file_name()
            .map_or_else(|| PathBuf::from(&self.source), PathBuf::from);
        self.destination_folder.join(name)
    }
}

/// Unpack instructions for an archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpack {
    /// Program invoked to unpack (looked up on `PATH`).
    pub program: String,
    /// Arguments placed before the archive path.
    pub args: Vec<String>,
    /// Extracted entries to install, in order.
    pub targets: Vec<UnpackTarget>,
}

/// A symlink created after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkAction {
    /// What the link points at.
    pub target: PathBuf,
    /// Where the link is created.
    pub link: PathBuf,
}

/// Steps run after an archive's targets are installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostExtraction {
    /// Symlinks to create, in order.
    pub symlinks: Vec<SymlinkAction>,
    /// Paths that receive mode 0755.
    pub set_exec: Vec<PathBuf>,
}

/// A validated registry entry.
///
/// Paths are already expanded to absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSpec {
    pub id: String,
    pub name: String,
    pub kind: AppKind,
    pub url: String,
    /// Required for every kind except `archive`.
    pub destination: Option<PathBuf>,
    pub frequency: Frequency,
    /// Branch, tag, or commit to check out (repositories only).
    pub checkout_revision: Option<String>,
    /// Present exactly for `archive` entries.
    pub unpack: Option<Unpack>,
    pub post_extraction: PostExtraction,
    /// Present exactly for GitHub releases URLs.
    pub asset_rule: Option<AssetRule>,
}

impl ApplicationSpec {
    /// Paths whose absence means the application must be fetched again.
    ///
    /// The destination for files and repositories; each installed target for
    /// archives.
    #[must_use]
    pub fn installed_paths(&self) -> Vec<PathBuf> {
        match (&self.destination, &self.unpack) {
            (Some(dest), _) if self.kind != AppKind::Archive => vec![dest.clone()],
            (_, Some(unpack)) => unpack.targets.iter().map(UnpackTarget::installed_path).collect(),
            _ => Vec::new(),
        }
    }
}
