//! GitHub release manifests and asset selection.
//!
//! A release manifest lists every file attached to a release. An
//! [`AssetRule`] narrows that list down to exactly one asset; zero or several
//! matches are reported as errors rather than guessed at.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::transport::is_github_api;

/// Subset of the GitHub "get release" response this tool consumes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseManifest {
    /// Release tag, used as the remote identifier.
    pub tag_name: String,
    /// Attached assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseManifest {
    /// Parse a manifest from the API's JSON body.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not a release object.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// File name as shown on the release page.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Published checksum in `sha256:<hex>` form, when the API provides one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    /// Lowercase hex SHA-256 from [`digest`](Self::digest), if it is a SHA-256 digest.
    #[must_use]
    pub fn sha256(&self) -> Option<String> {
        self.digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
            .map(str::to_ascii_lowercase)
    }
}

/// Name constraints an asset must satisfy. Absent predicates always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetRule {
    /// Required substring.
    #[serde(rename = "asset_name_contains")]
    pub contains: Option<String>,
    /// Required prefix.
    #[serde(rename = "asset_name_starts")]
    pub starts: Option<String>,
    /// Required suffix.
    #[serde(rename = "asset_name_ends")]
    pub ends: Option<String>,
}

impl AssetRule {
    /// Whether `name` satisfies every present predicate (case-sensitive).
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.contains.as_deref().is_none_or(|c| name.contains(c))
            && self.starts.as_deref().is_none_or(|s| name.starts_with(s))
            && self.ends.as_deref().is_none_or(|e| name.ends_with(e))
    }
}

impl fmt::Display for AssetRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            ("contains", &self.contains),
            ("starts", &self.starts),
            ("ends", &self.ends),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k} '{v}'")))
        .collect();
        if parts.is_empty() {
            write!(f, "any name")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Asset selection failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No asset satisfies the rule.
    #[error("no release asset matches ({rule}); available: {}", .available.join(", "))]
    NoMatchingAsset {
        /// Rendered rule.
        rule: String,
        /// Every asset name in the release.
        available: Vec<String>,
    },

    /// More than one asset satisfies the rule.
    #[error("several release assets match ({rule}): {}", .candidates.join(", "))]
    AmbiguousAsset {
        /// Rendered rule.
        rule: String,
        /// Names of the matching assets.
        candidates: Vec<String>,
    },
}

/// Pick the single asset that satisfies `rule`.
///
/// # Errors
///
/// Returns [`MatchError::NoMatchingAsset`] when nothing matches and
/// [`MatchError::AmbiguousAsset`] when more than one asset does.
///
/// # Examples
///
/// ```
/// use userapps_cli::assets::{AssetRule, ReleaseAsset, select};
///
/// let assets = vec![
///     ReleaseAsset { name: "tool-linux.tar.gz".into(), browser_download_url: "u1".into(), digest: None },
///     ReleaseAsset { name: "tool-windows.zip".into(), browser_download_url: "u2".into(), digest: None },
/// ];
/// let rule = AssetRule { contains: Some("linux".into()), ..AssetRule::default() };
/// assert_eq!(select(&assets, &rule).unwrap().browser_download_url, "u1");
/// ```
pub fn select<'a>(assets: &'a [ReleaseAsset], rule: &AssetRule) -> Result<&'a ReleaseAsset, MatchError> {
    let mut matching = assets.iter().filter(|a| rule.matches(&a.name));
    match (matching.next(), matching.next()) {
        (Some(only), None) => Ok(only),
        (None, _) => Err(MatchError::NoMatchingAsset {
            rule: rule.to_string(),
            available: assets.iter().map(|a| a.name.clone()).collect(),
        }),
        (Some(_), Some(_)) => Err(MatchError::AmbiguousAsset {
            rule: rule.to_string(),
            candidates: assets
                .iter()
                .filter(|a| rule.matches(&a.name))
                .map(|a| a.name.clone())
                .collect(),
        }),
    }
}

/// Whether `url` points at a GitHub API releases endpoint
/// (`https://api.github.com/repos/<owner>/<repo>/releases/...`).
#[must_use]
pub fn is_github_releases_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !is_github_api(&parsed) {
        return false;
    }
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    matches!(segments.as_slice(), ["repos", _, _, "releases", ..])
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

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            browser_download_url: format!("https://github.com/o/r/releases/download/v1/{name}"),
            digest: None,
        }
    }

    fn dart_sass_assets() -> Vec<ReleaseAsset> {
        vec![
            asset("dart-sass-linux-x64.tar.gz"),
            asset("dart-sass-windows.zip"),
        ]
    }

    fn rule(contains: Option<&str>, starts: Option<&str>, ends: Option<&str>) -> AssetRule {
        AssetRule {
            contains: contains.map(String::from),
            starts: starts.map(String::from),
            ends: ends.map(String::from),
        }
    }

    #[test]
    fn selects_the_single_match() {
        let assets = dart_sass_assets();
        let picked = select(
            &assets,
            &rule(Some("linux-x64"), Some("dart-sass"), Some("tar.gz")),
        )
        .unwrap();
        assert_eq!(picked.name, "dart-sass-linux-x64.tar.gz");
    }

    #[test]
    fn rule_matching_both_is_ambiguous() {
        let assets = dart_sass_assets();
        let err = select(&assets, &rule(None, Some("dart-sass"), None)).unwrap_err();
        match err {
            MatchError::AmbiguousAsset { candidates, .. } => {
                assert_eq!(
                    candidates,
                    vec!["dart-sass-linux-x64.tar.gz", "dart-sass-windows.zip"]
                );
            }
            other => panic!("expected AmbiguousAsset, got {other:?}"),
        }
    }

    #[test]
    fn rule_matching_neither_is_no_match() {
        let assets = dart_sass_assets();
        let err = select(&assets, &rule(Some("darwin"), None, None)).unwrap_err();
        assert!(matches!(err, MatchError::NoMatchingAsset { .. }));
        insta::assert_snapshot!(err.to_string(), @"no release asset matches (contains 'darwin'); available: dart-sass-linux-x64.tar.gz, dart-sass-windows.zip");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let assets = dart_sass_assets();
        assert!(select(&assets, &rule(Some("LINUX"), None, None)).is_err());
    }

    #[test]
    fn all_predicates_must_hold() {
        let assets = dart_sass_assets();
        // Contains and prefix hold for the first asset, suffix does not.
        let err = select(&assets, &rule(Some("linux"), Some("dart"), Some(".zip"))).unwrap_err();
        assert!(matches!(err, MatchError::NoMatchingAsset { .. }));
    }

    #[test]
    fn empty_asset_list_is_no_match() {
        let err = select(&[], &AssetRule::default()).unwrap_err();
        assert!(matches!(err, MatchError::NoMatchingAsset { .. }));
    }

    #[test]
    fn parses_manifest_with_digest() {
        let json = r#"{
            "tag_name": "1.77.0",
            "name": "Dart Sass 1.77.0",
            "assets": [
                {
                    "name": "dart-sass-1.77.0-linux-x64.tar.gz",
                    "browser_download_url": "https://github.com/sass/dart-sass/releases/download/1.77.0/dart-sass-1.77.0-linux-x64.tar.gz",
                    "digest": "sha256:ABCDEF",
                    "size": 123
                },
                {
                    "name": "dart-sass-1.77.0-windows-x64.zip",
                    "browser_download_url": "https://github.com/sass/dart-sass/releases/download/1.77.0/dart-sass-1.77.0-windows-x64.zip"
                }
            ]
        }"#;
        let manifest = ReleaseManifest::parse(json).unwrap();
        assert_eq!(manifest.tag_name, "1.77.0");
        assert_eq!(manifest.assets.len(), 2);
        assert_eq!(manifest.assets[0].sha256().as_deref(), Some("abcdef"));
        assert_eq!(manifest.assets[1].sha256(), None);
    }

    #[test]
    fn manifest_without_tag_is_rejected() {
        assert!(ReleaseManifest::parse(r#"{"message": "Not Found"}"#).is_err());
    }

    #[test]
    fn non_sha256_digest_is_ignored() {
        let mut a = asset("x");
        a.digest = Some("md5:abc".to_string());
        assert_eq!(a.sha256(), None);
    }

    #[test]
    fn recognizes_github_releases_urls() {
        assert!(is_github_releases_url(
            "https://api.github.com/repos/sass/dart-sass/releases/latest"
        ));
        assert!(is_github_releases_url(
            "https://api.github.com/repos/o/r/releases/tags/v1.0"
        ));
        assert!(!is_github_releases_url(
            "https://github.com/sass/dart-sass/releases/latest"
        ));
        assert!(!is_github_releases_url("https://api.github.com/repos/o/r/tags"));
        assert!(!is_github_releases_url("https://example.com/file.txt"));
        assert!(!is_github_releases_url("api.github.com/repos/o/r/releases/latest"));
    }

    #[test]
    fn github_releases_host_ignores_case() {
        assert!(is_github_releases_url(
            "https://API.GitHub.com/repos/sass/dart-sass/releases/latest"
        ));
    }
}
