//! User application manager.
//!
//! Keeps a declared set of git/mercurial repositories, single files, and
//! release archives up to date inside the home directory. Each entry in a TOML
//! registry names a source, a destination, and an update cadence; a run decides
//! which entries are due, fetches them, and remembers what it saw.
//!
//! The public API is organised in layers:
//!
//! - **[`config`]**: parse and validate the application registry
//! - **[`state`]**: per-application update records persisted across runs
//! - **[`assets`]**: pick one asset out of a GitHub release manifest
//! - **[`fetch`]**: acquire/update protocol per application type
//! - **[`orchestrator`]**: selection, staleness, dispatch, and bookkeeping
//! - **[`commands`]**: top-level subcommands (`manage`, `ids`, `completions`, `version`)
//!
//! External programs and HTTP are reached only through the [`exec::Executor`]
//! and [`transport::Transport`] traits.
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod assets;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod resources;
pub mod state;
pub mod transport;

/// Build version: `USERAPPS_VERSION` from the build script, else `dev-<crate version>`.
pub const VERSION: &str = match option_env!("USERAPPS_VERSION") {
    Some(version) => version,
    None => concat!("dev-", env!("CARGO_PKG_VERSION")),
};
