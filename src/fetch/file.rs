//! `file`: a single downloaded file, optionally from a GitHub release.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ApplicationSpec;
use crate::error::FetchError;
use crate::resources::Resource as _;
use crate::resources::chmod::ChmodResource;
use crate::resources::helpers::fs::{ensure_parent_dir, sha256_file};
use crate::state::UpdateRecord;

use super::release::{self, Resolved};
use super::{Context, FetchOutcome, destination, local_io};

pub(super) fn fetch(
    spec: &ApplicationSpec,
    prior: Option<&UpdateRecord>,
    ctx: &Context,
) -> Result<FetchOutcome, FetchError> {
    let dest = destination(spec)?;

    // Plain URLs are never re-diffed once the file is in place.
    if !ctx.forced && spec.asset_rule.is_none() && dest.exists() {
        ctx.log.debug(&format!("{} exists", dest.display()));
        return Ok(FetchOutcome::UpToDate);
    }

    let resolved = release::resolve(spec, ctx)?;
    if !ctx.forced && is_current(dest, &resolved, prior) {
        ctx.log.debug(&format!(
            "release {} already installed",
            resolved.tag.as_deref().unwrap_or_default()
        ));
        return Ok(FetchOutcome::UpToDate);
    }

    let hash = install(dest, &resolved, ctx)?;
    Ok(FetchOutcome::Updated {
        remote_id: resolved.tag.unwrap_or_else(|| hash.clone()),
        content_hash: Some(hash),
    })
}

/// Whether the installed file already is the resolved release.
///
/// The tag must match the prior record. Content is then checked against the
/// published digest if there is one, else against the hash recorded at the
/// last download; with neither, the tag alone decides.
fn is_current(dest: &Path, resolved: &Resolved, prior: Option<&UpdateRecord>) -> bool {
    let (Some(tag), Some(prior)) = (&resolved.tag, prior) else {
        return false;
    };
    if !dest.is_file() || prior.remote_id != *tag {
        return false;
    }
    let expected = resolved
        .digest
        .as_deref()
        .or(prior.content_hash.as_deref());
    expected.is_none_or(|expected| {
        sha256_file(dest).is_ok_and(|actual| actual.eq_ignore_ascii_case(expected))
    })
}

/// Download next to `dest`, swap it into place, and make it executable.
/// Returns the payload hash.
fn install(dest: &Path, resolved: &Resolved, ctx: &Context) -> Result<String, FetchError> {
    ensure_parent_dir(dest).map_err(|e| local_io("create destination folder", e))?;
    let part = part_path(dest);
    ctx.log
        .info(&format!("downloading {} to {}", resolved.url, dest.display()));
    if let Err(err) = ctx.transport.download(&resolved.url, &part) {
        std::fs::remove_file(&part).ok();
        return Err(err.into());
    }

    let hash = sha256_file(&part).map_err(|e| local_io("hash download", e))?;
    std::fs::rename(&part, dest)
        .map_err(|e| FetchError::io(format!("replace {}", dest.display()), e))?;
    ChmodResource::executable(dest.to_path_buf())
        .ensure()
        .map_err(|e| local_io(format!("set permissions on {}", dest.display()), e))?;
    Ok(hash)
}

/// `<dest>.part` in the same directory, so the final rename stays on one
/// filesystem.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(".part");
    dest.with_file_name(name)
}
