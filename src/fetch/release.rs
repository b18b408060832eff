//! Download URL resolution shared by the `file` and `archive` strategies.
use crate::assets::{self, ReleaseManifest};
use crate::config::ApplicationSpec;
use crate::error::FetchError;

use super::Context;

/// Where to download from, and what the remote calls this version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Resolved {
    pub url: String,
    /// Release tag; `None` for plain URLs.
    pub tag: Option<String>,
    /// Published SHA-256 of the selected asset.
    pub digest: Option<String>,
}

/// Resolve the payload URL for `spec`.
///
/// Plain URLs are used as-is. With an asset rule, `spec.url` is a GitHub
/// releases endpoint whose manifest is fetched and narrowed to one asset.
pub(super) fn resolve(spec: &ApplicationSpec, ctx: &Context) -> Result<Resolved, FetchError> {
    let Some(rule) = &spec.asset_rule else {
        return Ok(Resolved {
            url: spec.url.clone(),
            tag: None,
            digest: None,
        });
    };

    ctx.log.debug(&format!("reading release manifest {}", spec.url));
    let body = ctx.transport.get_text(&spec.url)?;
    let manifest = ReleaseManifest::parse(&body).map_err(|e| FetchError::Manifest {
        url: spec.url.clone(),
        message: e.to_string(),
    })?;
    if manifest.tag_name.trim().is_empty() {
        return Err(FetchError::Manifest {
            url: spec.url.clone(),
            message: "release has no tag_name".to_string(),
        });
    }

    let asset = assets::select(&manifest.assets, rule)?;
    ctx.log
        .debug(&format!("release {} asset {}", manifest.tag_name, asset.name));
    Ok(Resolved {
        url: asset.browser_download_url.clone(),
        digest: asset.sha256(),
        tag: Some(manifest.tag_name),
    })
}
