//! `archive`: download, unpack, install selected entries, post-process.
use std::path::Path;

use crate::config::ApplicationSpec;
use crate::config::application::{PostExtraction, Unpack};
use crate::error::{ArchiveStep, FetchError};
use crate::resources::Resource as _;
use crate::resources::chmod::ChmodResource;
use crate::resources::helpers::fs::{merge_into, sha256_file};
use crate::resources::symlink::SymlinkResource;
use crate::state::UpdateRecord;

use super::{Context, FetchOutcome, local_io, release};

pub(super) fn fetch(
    spec: &ApplicationSpec,
    prior: Option<&UpdateRecord>,
    ctx: &Context,
) -> Result<FetchOutcome, FetchError> {
    let unpack = spec.unpack.as_ref().ok_or_else(|| FetchError::Command {
        step: "resolve unpack settings".to_string(),
        message: format!("'{}' has no unzip_prog", spec.id),
    })?;
    if !ctx.executor.which(&unpack.program) {
        return Ok(FetchOutcome::Skipped(format!(
            "{} is not installed",
            unpack.program
        )));
    }

    let resolved = release::resolve(spec, ctx)?;
    // Only the tag is compared; installed files are not inspected.
    if !ctx.forced
        && let Some(tag) = &resolved.tag
        && prior.is_some_and(|p| p.remote_id == *tag)
    {
        ctx.log.debug(&format!("release {tag} already installed"));
        return Ok(FetchOutcome::UpToDate);
    }

    let work = tempfile::Builder::new()
        .prefix(&format!("userapps-{}-", spec.id))
        .tempdir()
        .map_err(|e| FetchError::io("create temporary directory", e))?;
    let archive = work.path().join(archive_name(&resolved.url, &spec.id));
    ctx.log
        .info(&format!("downloading {}", resolved.url));
    ctx.transport.download(&resolved.url, &archive)?;
    let hash = sha256_file(&archive).map_err(|e| local_io("hash download", e))?;

    let extracted = work.path().join("extracted");
    std::fs::create_dir(&extracted)
        .map_err(|e| FetchError::io("create extraction directory", e))?;
    extract(unpack, &archive, &extracted, ctx)?;
    install_targets(unpack, &extracted, ctx)?;
    post_process(&spec.post_extraction, ctx)?;

    Ok(FetchOutcome::Updated {
        remote_id: resolved.tag.unwrap_or_else(|| hash.clone()),
        content_hash: Some(hash),
    })
}

fn partial(step: ArchiveStep, err: &anyhow::Error) -> FetchError {
    FetchError::PartialArchive {
        step,
        message: format!("{err:#}"),
    }
}

/// Run `<program> <args...> <archive>` inside `into`.
fn extract(unpack: &Unpack, archive: &Path, into: &Path, ctx: &Context) -> Result<(), FetchError> {
    let archive = archive.to_string_lossy();
    let args: Vec<&str> = unpack
        .args
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(archive.as_ref()))
        .collect();
    ctx.log
        .debug(&format!("{} {}", unpack.program, args.join(" ")));
    ctx.executor
        .run_in(into, &unpack.program, &args)
        .map_err(|e| FetchError::timeout_of(&e).unwrap_or_else(|| partial(ArchiveStep::Unpack, &e)))?;
    Ok(())
}

/// Merge each extracted entry into `destination_folder/<basename(source)>`.
fn install_targets(unpack: &Unpack, extracted: &Path, ctx: &Context) -> Result<(), FetchError> {
    for target in &unpack.targets {
        let step = || ArchiveStep::Install(target.source.clone());
        let source = extracted.join(&target.source);
        if source.symlink_metadata().is_err() {
            return Err(partial(
                step(),
                &anyhow::anyhow!("'{}' not found in archive", target.source),
            ));
        }
        let installed = target.installed_path();
        ctx.log.info(&format!("installing {}", installed.display()));
        merge_into(&source, &installed).map_err(|e| partial(step(), &e))?;
    }
    Ok(())
}

fn post_process(actions: &PostExtraction, ctx: &Context) -> Result<(), FetchError> {
    for action in &actions.symlinks {
        let resource = SymlinkResource::new(action.target.clone(), action.link.clone());
        ctx.log.debug(&resource.description());
        resource
            .ensure()
            .map_err(|e| partial(ArchiveStep::Symlink(action.link.clone()), &e))?;
    }
    for path in &actions.set_exec {
        ChmodResource::executable(path.clone())
            .ensure()
            .map_err(|e| partial(ArchiveStep::SetExec(path.clone()), &e))?;
    }
    Ok(())
}

/// Last path segment of `url` (query and fragment dropped), or `fallback`.
fn archive_name<'a>(url: &'a str, fallback: &'a str) -> &'a str {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback)
}
