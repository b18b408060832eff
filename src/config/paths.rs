//! Location of the registry, state, and log files, and `~` expansion.
use std::path::{Path, PathBuf};

/// File name of the registry inside the config directory.
const REGISTRY_FILE: &str = "apps.toml";

/// File name of the update records inside the state directory.
const STATE_FILE: &str = "update-data.json";

/// Subdirectory used under each XDG base directory.
const APP_DIR: &str = "userapps";

/// Current user's home directory from `HOME` (or `USERPROFILE`).
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    home_from(|k| std::env::var(k).ok())
}

fn home_from(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    env("HOME")
        .or_else(|| env("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` and anchor relative paths at `home`.
#[must_use]
pub fn expand(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}

/// Registry path: `explicit`, else `$USERAPPS_CONFIG`, else
/// `$XDG_CONFIG_HOME/userapps/apps.toml`, else `~/.config/userapps/apps.toml`.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    config_path_from(explicit, |k| std::env::var(k).ok())
}

/// State path: `explicit`, else `$USERAPPS_STATE`, else
/// `$XDG_STATE_HOME/userapps/update-data.json`, else
/// `~/.local/state/userapps/update-data.json`.
#[must_use]
pub fn state_path(explicit: Option<&Path>) -> Option<PathBuf> {
    state_path_from(explicit, |k| std::env::var(k).ok())
}

/// Per-command log file: `$USERAPPS_LOG_FILE`, else
/// `$XDG_CACHE_HOME/userapps/<command>.log`, else
/// `~/.cache/userapps/<command>.log`.
#[must_use]
pub fn log_path(command: &str) -> Option<PathBuf> {
    log_path_from(command, |k| std::env::var(k).ok())
}

fn log_path_from(command: &str, env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    resolve(
        None,
        &env,
        "USERAPPS_LOG_FILE",
        "XDG_CACHE_HOME",
        ".cache",
        &format!("{command}.log"),
    )
}

fn config_path_from(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    resolve(explicit, &env, "USERAPPS_CONFIG", "XDG_CONFIG_HOME", ".config", REGISTRY_FILE)
}

fn state_path_from(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    resolve(explicit, &env, "USERAPPS_STATE", "XDG_STATE_HOME", ".local/state", STATE_FILE)
}

fn resolve(
    explicit: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
    override_var: &str,
    xdg_var: &str,
    home_fallback: &str,
    file: &str,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let non_empty = |k: &str| env(k).filter(|v| !v.is_empty());
    if let Some(path) = non_empty(override_var) {
        return Some(PathBuf::from(path));
    }
    let base = non_empty(xdg_var)
        .map(PathBuf::from)
        .or_else(|| home_from(env).map(|h| h.join(home_fallback)))?;
    Some(base.join(APP_DIR).join(file))
}
