//! Command: list configured application ids.
use std::io::Write;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config;

/// Print every declared id, one per line, without validating entries.
///
/// Used by shell completion for `manage --id`, so a registry with invalid
/// entries still completes.
///
/// # Errors
///
/// Returns an error if the registry cannot be located, read, or parsed.
pub fn run(global: &GlobalOpts) -> Result<()> {
    let path = config::resolve_config_path(global.config.as_deref())?;
    let ids = config::list_ids(&path)?;
    write_ids(&mut std::io::stdout().lock(), &ids)?;
    Ok(())
}

fn write_ids(out: &mut impl Write, ids: &[String]) -> std::io::Result<()> {
    for id in ids {
        writeln!(out, "{id}")?;
    }
    Ok(())
}
