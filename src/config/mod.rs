//! Application registry: loading, validation, and run settings.
pub mod application;
pub mod paths;
pub mod validation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use application::{AppKind, ApplicationSpec, Frequency};

use crate::error::{ConfigError, EntryErrors};
use validation::RawApplication;

/// Tunables from the optional `[settings]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overall limit for one HTTP request, including the body.
    pub http_timeout_secs: u64,
    /// Limit for establishing an HTTP connection.
    pub connect_timeout_secs: u64,
    /// Limit for one external command (clone, pull, unpack).
    pub command_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_timeout_secs: 120,
            connect_timeout_secs: 10,
            command_timeout_secs: 900,
        }
    }
}

impl Settings {
    /// [`command_timeout_secs`](Self::command_timeout_secs) as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// The validated set of applications, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub apps: Vec<ApplicationSpec>,
    pub settings: Settings,
}

impl Registry {
    /// Find an application by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ApplicationSpec> {
        self.apps.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Deserialize)]
struct RawRegistry {
    applications: Option<Vec<RawApplication>>,
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Deserialize)]
struct IdsOnly {
    #[serde(default)]
    applications: Vec<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: Option<String>,
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the registry at `path`, expanding paths against `home`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, is not valid TOML,
/// lacks an `applications` array, or contains invalid entries.
pub fn load(path: &Path, home: &Path) -> Result<Registry, ConfigError> {
    let text = read(path)?;
    load_str(&text, path, home)
}

/// Parse and validate registry text; `origin` is only used in error messages.
///
/// # Errors
///
/// See [`load`].
pub fn load_str(text: &str, origin: &Path, home: &Path) -> Result<Registry, ConfigError> {
    let raw: RawRegistry = toml::from_str(text).map_err(|e| ConfigError::InvalidSyntax {
        path: origin.to_path_buf(),
        message: e.message().to_string(),
    })?;
    let applications = raw.applications.ok_or_else(|| ConfigError::MissingRegistry {
        path: origin.to_path_buf(),
    })?;
    let apps = validation::validate(applications, home)
        .map_err(|errors| ConfigError::InvalidEntries(EntryErrors(errors)))?;
    tracing::debug!("loaded {} application(s) from {}", apps.len(), origin.display());
    Ok(Registry {
        apps,
        settings: raw.settings,
    })
}

/// Declared ids in order, without validating entries.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or is not valid TOML.
pub fn list_ids(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = read(path)?;
    let ids: IdsOnly = toml::from_str(&text).map_err(|e| ConfigError::InvalidSyntax {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    Ok(ids.applications.into_iter().filter_map(|a| a.id).collect())
}

/// Resolve the registry path, failing when no candidate can be derived.
///
/// # Errors
///
/// Returns an error if neither an explicit path, an override variable, nor a
/// home directory is available.
pub fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    paths::config_path(explicit).ok_or_else(|| {
        anyhow::anyhow!("cannot locate the registry: pass --config or set USERAPPS_CONFIG")
    })
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const HOME: &str = "/home/u";

    const SAMPLE: &str = r#"
[settings]
command_timeout_secs = 60

[[applications]]
id = "bash-it"
name = "Bash-it"
type = "git_repo"
url = "https://github.com/Bash-it/bash-it.git"
destination = "~/.bash_it"

[[applications]]
id = "devdocs-desktop"
name = "DevDocs Desktop"
type = "file"
url = "https://api.github.com/repos/egoist/devdocs-desktop/releases/latest"
destination = "~/.local/bin/DevDocs.AppImage"
frequency = "m"

[applications.github_api_asset_data]
asset_name_contains = "x86_64"
asset_name_starts = "DevDocs"
asset_name_ends = "AppImage"

[[applications]]
id = "dart-sass"
name = "Dart Sass"
type = "archive"
url = "https://api.github.com/repos/sass/dart-sass/releases/latest"
unzip_prog = "tar"
unzip_args = ["-x", "-z", "-f"]
unzip_targets = [["dart-sass", "~/.local/lib"]]

[applications.post_extraction_actions]
symlinks = [["~/.local/lib/dart-sass/sass", "~/.local/bin/sass"]]
set_exec = ["~/.local/lib/dart-sass/sass"]

[applications.github_api_asset_data]
asset_name_contains = "linux-x64"
asset_name_starts = "dart-sass"
asset_name_ends = "tar.gz"
"#;

    fn load_sample(text: &str) -> Result<Registry, ConfigError> {
        load_str(text, Path::new("apps.toml"), Path::new(HOME))
    }

    #[test]
    fn loads_sample_registry() {
        let registry = load_sample(SAMPLE).unwrap();
        let ids: Vec<&str> = registry.apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["bash-it", "devdocs-desktop", "dart-sass"]);

        let devdocs = registry.get("devdocs-desktop").unwrap();
        assert_eq!(devdocs.kind, AppKind::File);
        assert_eq!(devdocs.frequency, Frequency::Monthly);
        assert_eq!(
            devdocs.asset_rule.as_ref().unwrap().starts.as_deref(),
            Some("DevDocs")
        );

        let sass = registry.get("dart-sass").unwrap();
        let unpack = sass.unpack.as_ref().unwrap();
        assert_eq!(unpack.args, vec!["-x", "-z", "-f"]);
        assert_eq!(sass.post_extraction.symlinks.len(), 1);
    }

    #[test]
    fn settings_default_when_partially_given() {
        let registry = load_sample(SAMPLE).unwrap();
        assert_eq!(registry.settings.command_timeout_secs, 60);
        assert_eq!(registry.settings.http_timeout_secs, 120);
        assert_eq!(registry.settings.connect_timeout_secs, 10);
    }

    #[test]
    fn missing_applications_property() {
        let err = load_sample("[settings]\nhttp_timeout_secs = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingRegistry { .. }));
    }

    #[test]
    fn malformed_document() {
        let err = load_sample("[[applications]\nid = ").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSyntax { .. }));
    }

    #[test]
    fn duplicate_id_is_a_config_error() {
        let text = r#"
[[applications]]
id = "x"
name = "X"
type = "git_repo"
url = "https://example.com/x.git"
destination = "~/x"

[[applications]]
id = "x"
name = "X again"
type = "hg_repo"
url = "https://example.com/x"
destination = "~/x2"
"#;
        let err = load_sample(text).unwrap_err();
        match err {
            ConfigError::InvalidEntries(EntryErrors(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].id.as_deref(), Some("x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = load_sample("applications = []\n").unwrap();
        assert!(registry.apps.is_empty());
    }

    #[test]
    fn list_ids_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[applications]]\nid = \"first\"\n\n[[applications]]\nid = \"second\"\ntype = \"bogus\""
        )
        .unwrap();
        assert_eq!(list_ids(file.path()).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.toml"), Path::new(HOME)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
