//! Command: fetch or update the selected applications.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;

use crate::cli::{GlobalOpts, ManageOpts};
use crate::config::{self, paths};
use crate::exec::SystemExecutor;
use crate::fetch::Context;
use crate::logging::{Log, Logger};
use crate::orchestrator::{self, Filter};
use crate::state::JsonStateStore;
use crate::transport::HttpTransport;

/// Run the manage command.
///
/// Configuration problems abort before anything is fetched. Per-application
/// failures are reported in the summary and turn into a non-zero exit.
///
/// # Errors
///
/// Returns an error if the registry or state file cannot be loaded, or if any
/// application failed.
pub fn run(global: &GlobalOpts, opts: &ManageOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("userapps {}", crate::VERSION));

    let home = paths::home_dir().context("cannot determine the home directory")?;
    let config_path = config::resolve_config_path(global.config.as_deref())?;

    log.stage("Loading configuration");
    let registry = config::load(&config_path, &home)?;
    log.info(&format!(
        "loaded {} application(s) from {}",
        registry.apps.len(),
        config_path.display()
    ));

    let state_path = paths::state_path(global.state.as_deref())
        .context("cannot locate the state file: pass --state or set USERAPPS_STATE")?;
    let mut store = JsonStateStore::open(&state_path)?;
    log.debug(&format!("state: {}", state_path.display()));

    let ctx = Context::new(
        Arc::new(SystemExecutor::new(registry.settings.command_timeout())),
        Arc::new(HttpTransport::new(&registry.settings)),
        Arc::clone(log) as Arc<dyn Log>,
        opts.force_update,
    );
    let filter = Filter {
        ids: opts.ids.clone(),
        kinds: opts.types.clone(),
    };

    let results = orchestrator::run(&registry, &filter, &mut store, &ctx, Utc::now());
    log.print_summary();

    let failed = results.iter().filter(|(_, o)| o.is_failed()).count();
    if failed > 0 {
        anyhow::bail!("{failed} application(s) failed");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::path::Path;

    fn global(dir: &Path) -> GlobalOpts {
        GlobalOpts {
            config: Some(dir.join("apps.toml")),
            state: Some(dir.join("state/update-data.json")),
        }
    }

    #[test]
    fn empty_registry_succeeds_without_state_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("apps.toml"), "applications = []\n").unwrap();
        let (log, _tmp, _guard) = isolated_logger();

        run(&global(dir.path()), &ManageOpts::default(), &Arc::new(log)).unwrap();
        assert!(
            !dir.path().join("state/update-data.json").exists(),
            "state file is only created on first write"
        );
    }

    #[test]
    fn invalid_registry_aborts_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("apps.toml"),
            "[[applications]]\nid = \"x\"\n\n[[applications]]\nid = \"x\"\n",
        )
        .unwrap();
        let (log, _tmp, _guard) = isolated_logger();

        let err = run(&global(dir.path()), &ManageOpts::default(), &Arc::new(log)).unwrap_err();
        assert!(err.to_string().contains("duplicate id 'x'"), "{err:#}");
    }

    #[test]
    fn unknown_id_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("apps.toml"), "applications = []\n").unwrap();
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        let opts = ManageOpts {
            ids: vec!["ghost".to_string()],
            ..ManageOpts::default()
        };

        let err = run(&global(dir.path()), &opts, &log).unwrap_err();
        assert_eq!(err.to_string(), "1 application(s) failed");
        assert_eq!(log.failure_count(), 1);
    }
}
