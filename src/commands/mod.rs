//! Subcommand handlers. Each takes parsed options and returns `anyhow::Result`.
pub mod completions;
pub mod ids;
pub mod manage;
pub mod version;
