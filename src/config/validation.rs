//! Registry entry validation.
//!
//! Entries are deserialized loosely ([`RawApplication`], every field
//! optional) and then checked as a whole so that one pass reports every
//! problem of every entry.
use std::collections::HashSet;
use std::path::{Component, Path};

use serde::Deserialize;

use super::application::{
    AppKind, ApplicationSpec, Frequency, PostExtraction, SymlinkAction, Unpack, UnpackTarget,
};
use super::paths::expand;
use crate::assets::{AssetRule, is_github_releases_url};
use crate::error::EntryError;

/// `unzip_args` may be a single argument or a list of arguments.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UnzipArgs {
    One(String),
    Many(Vec<String>),
}

impl UnzipArgs {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(arg) => vec![arg],
            Self::Many(args) => args,
        }
    }
}

/// `post_extraction_actions` as written in the registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPostExtraction {
    /// `(target, link)` pairs.
    pub symlinks: Vec<(String, String)>,
    pub set_exec: Vec<String>,
}

/// One `[[applications]]` table before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawApplication {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub destination: Option<String>,
    pub frequency: Option<String>,
    pub checkout_revision: Option<String>,
    pub unzip_prog: Option<String>,
    pub unzip_args: Option<UnzipArgs>,
    /// `(source-in-archive, destination-folder)` pairs.
    pub unzip_targets: Option<Vec<(String, String)>>,
    pub post_extraction_actions: Option<RawPostExtraction>,
    pub github_api_asset_data: Option<AssetRule>,
}

/// Treat empty and whitespace-only strings as absent.
fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Validate every entry, returning typed specs in declaration order or all problems found.
///
/// # Errors
///
/// Returns one [`EntryError`] per offending entry.
pub fn validate(raw: Vec<RawApplication>, home: &Path) -> Result<Vec<ApplicationSpec>, Vec<EntryError>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut specs = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (index, entry) in raw.into_iter().enumerate() {
        let mut problems = check_entry(&entry);
        if let Some(id) = present(entry.id.as_ref())
            && !seen.insert(id.to_string())
        {
            problems.insert(0, format!("duplicate id '{id}'"));
        }

        if problems.is_empty() {
            if let Some(spec) = build(entry, home) {
                specs.push(spec);
            }
        } else {
            errors.push(EntryError {
                index,
                id: present(entry.id.as_ref()).map(String::from),
                problems,
            });
        }
    }

    if errors.is_empty() {
        Ok(specs)
    } else {
        Err(errors)
    }
}

/// Collect every problem of a single entry, in field order.
fn check_entry(entry: &RawApplication) -> Vec<String> {
    let mut problems = Vec::new();

    for (key, value) in [
        ("id", &entry.id),
        ("name", &entry.name),
        ("type", &entry.kind),
        ("url", &entry.url),
    ] {
        if present(value.as_ref()).is_none() {
            problems.push(format!("missing <{key}>"));
        }
    }

    let kind = match present(entry.kind.as_ref()).map(str::parse::<AppKind>) {
        Some(Ok(kind)) => Some(kind),
        Some(Err(e)) => {
            problems.push(e);
            None
        }
        None => None,
    };

    if let Some(Err(e)) = present(entry.frequency.as_ref()).map(str::parse::<Frequency>) {
        problems.push(e);
    }

    // Type-specific rules need a known type.
    let Some(kind) = kind else {
        return problems;
    };

    if kind != AppKind::Archive && present(entry.destination.as_ref()).is_none() {
        problems.push("missing <destination>".to_string());
    }

    if kind == AppKind::Archive {
        if present(entry.unzip_prog.as_ref()).is_none() {
            problems.push("missing <unzip_prog>".to_string());
        }
        if entry.unzip_targets.as_ref().is_none_or(Vec::is_empty) {
            problems.push("<unzip_targets> must list at least one (source, folder) pair".to_string());
        }
        for (source, _) in entry.unzip_targets.iter().flatten() {
            if !is_archive_entry(source) {
                problems.push(format!(
                    "<unzip_targets> source '{source}' must name an entry inside the archive"
                ));
            }
        }
    } else {
        for (key, set) in [
            ("unzip_prog", entry.unzip_prog.is_some()),
            ("unzip_args", entry.unzip_args.is_some()),
            ("unzip_targets", entry.unzip_targets.is_some()),
            ("post_extraction_actions", entry.post_extraction_actions.is_some()),
        ] {
            if set {
                problems.push(format!("<{key}> is only valid for archive applications"));
            }
        }
    }

    if !kind.is_repository() && entry.checkout_revision.is_some() {
        problems.push("<checkout_revision> is only valid for git_repo and hg_repo".to_string());
    }

    let releases_url = present(entry.url.as_ref()).is_some_and(is_github_releases_url);
    let downloadable = matches!(kind, AppKind::File | AppKind::Archive);
    match &entry.github_api_asset_data {
        Some(rule) if releases_url && downloadable => {
            let missing: Vec<&str> = [
                ("asset_name_contains", &rule.contains),
                ("asset_name_starts", &rule.starts),
                ("asset_name_ends", &rule.ends),
            ]
            .into_iter()
            .filter(|(_, v)| present(v.as_ref()).is_none())
            .map(|(k, _)| k)
            .collect();
            if !missing.is_empty() {
                problems.push(format!(
                    "<github_api_asset_data> is missing {}",
                    missing.join(", ")
                ));
            }
        }
        Some(_) => problems.push(
            "<github_api_asset_data> requires a GitHub API releases URL and type file or archive"
                .to_string(),
        ),
        None if releases_url && downloadable => {
            problems.push("GitHub API releases URL requires <github_api_asset_data>".to_string());
        }
        None => {}
    }

    problems
}

/// Whether `source` is a relative path that stays inside the extraction
/// directory and ends in a named entry.
fn is_archive_entry(source: &str) -> bool {
    let path = Path::new(source);
    path.file_name().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Convert an entry that passed [`check_entry`] into its typed form.
fn build(entry: RawApplication, home: &Path) -> Option<ApplicationSpec> {
    let kind = entry.kind.as_deref()?.parse::<AppKind>().ok()?;
    let frequency = match present(entry.frequency.as_ref()) {
        Some(f) => f.parse().ok()?,
        None => Frequency::default(),
    };

    let unpack = if kind == AppKind::Archive {
        Some(Unpack {
            program: entry.unzip_prog?,
            args: entry.unzip_args.map(UnzipArgs::into_vec).unwrap_or_default(),
            targets: entry
                .unzip_targets
                .unwrap_or_default()
                .into_iter()
                .map(|(source, folder)| UnpackTarget {
                    source,
                    destination_folder: expand(&folder, home),
                })
                .collect(),
        })
    } else {
        None
    };

    let post_extraction = entry
        .post_extraction_actions
        .map(|p| PostExtraction {
            symlinks: p
                .symlinks
                .into_iter()
                .map(|(target, link)| SymlinkAction {
                    target: expand(&target, home),
                    link: expand(&link, home),
                })
                .collect(),
            set_exec: p.set_exec.iter().map(|s| expand(s, home)).collect(),
        })
        .unwrap_or_default();

    Some(ApplicationSpec {
        id: entry.id?,
        name: entry.name?,
        kind,
        url: entry.url?,
        destination: present(entry.destination.as_ref()).map(|d| expand(d, home)),
        frequency,
        checkout_revision: entry.checkout_revision,
        unpack,
        post_extraction,
        asset_rule: entry.github_api_asset_data,
    })
}
