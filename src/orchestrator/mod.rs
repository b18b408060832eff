//! One update run: select applications, decide which are due, fetch them, and
//! record what changed.
//!
//! The orchestrator is the only writer of the [`StateStore`]. Each record is
//! written as soon as its application finishes, so an interrupted run keeps
//! everything completed before the interruption.
mod staleness;

pub use staleness::{next_due, should_fetch};

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::{AppKind, ApplicationSpec, Registry};
use crate::error::FetchError;
use crate::fetch::{self, Context, FetchOutcome};
use crate::logging::OutcomeStatus;
use crate::state::{StateStore, UpdateRecord};

/// Which applications a run covers. Empty means all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Explicit ids; takes precedence over `kinds`.
    pub ids: Vec<String>,
    /// Application types.
    pub kinds: Vec<AppKind>,
}

/// A selected registry entry, or a request that matched nothing.
#[derive(Debug)]
enum Selection<'a> {
    App(&'a ApplicationSpec),
    Unmatched(String, FetchError),
}

fn select<'a>(registry: &'a Registry, filter: &Filter) -> Vec<Selection<'a>> {
    if !filter.ids.is_empty() {
        let wanted: HashSet<&str> = filter.ids.iter().map(String::as_str).collect();
        let mut selected: Vec<Selection<'a>> = registry
            .apps
            .iter()
            .filter(|app| wanted.contains(app.id.as_str()))
            .map(Selection::App)
            .collect();
        let mut seen = HashSet::new();
        for id in &filter.ids {
            if registry.get(id).is_none() && seen.insert(id.as_str()) {
                selected.push(Selection::Unmatched(
                    id.clone(),
                    FetchError::UnknownId(id.clone()),
                ));
            }
        }
        return selected;
    }

    if !filter.kinds.is_empty() {
        let mut selected: Vec<Selection<'a>> = registry
            .apps
            .iter()
            .filter(|app| filter.kinds.contains(&app.kind))
            .map(Selection::App)
            .collect();
        let mut seen = HashSet::new();
        for kind in &filter.kinds {
            if !registry.apps.iter().any(|app| app.kind == *kind) && seen.insert(*kind) {
                selected.push(Selection::Unmatched(
                    kind.to_string(),
                    FetchError::UnknownType(kind.to_string()),
                ));
            }
        }
        return selected;
    }

    registry.apps.iter().map(Selection::App).collect()
}

/// Process every selected application in order.
///
/// `Updated` writes a new record; `UpToDate` refreshes the fetch time of an
/// existing one. Returns one `(id, outcome)` pair per selected application,
/// followed by one per requested id or type that matched nothing. `ctx.forced` bypasses both
/// the staleness window and the strategies' own up-to-date checks.
pub fn run(
    registry: &Registry,
    filter: &Filter,
    store: &mut dyn StateStore,
    ctx: &Context,
    now: DateTime<Utc>,
) -> Vec<(String, FetchOutcome)> {
    let mut results = Vec::new();
    for selection in select(registry, filter) {
        let (id, outcome) = match selection {
            Selection::App(spec) => {
                ctx.log.stage(&format!("{} ({})", spec.name, spec.id));
                (spec.id.clone(), process(spec, store, ctx, now))
            }
            Selection::Unmatched(key, err) => {
                ctx.log.stage(&key);
                (key, FetchOutcome::Failed(err))
            }
        };
        report(ctx, &id, &outcome);
        results.push((id, outcome));
    }
    results
}

fn process(
    spec: &ApplicationSpec,
    store: &mut dyn StateStore,
    ctx: &Context,
    now: DateTime<Utc>,
) -> FetchOutcome {
    let prior = store.get(&spec.id).cloned();
    let last_fetch = prior.as_ref().map(|r| r.last_fetch);

    let missing = spec
        .installed_paths()
        .iter()
        .any(|path| path.symlink_metadata().is_err());
    if missing {
        ctx.log.debug("destination missing, fetching regardless of schedule");
    }

    if !missing
        && !should_fetch(now, spec.frequency, last_fetch, ctx.forced)
        && let Some(last) = last_fetch
    {
        return FetchOutcome::Skipped(format!(
            "not due until {}",
            next_due(spec.frequency, last).format("%Y-%m-%d")
        ));
    }

    let outcome = fetch::apply(spec, prior.as_ref(), ctx);
    let record = match &outcome {
        FetchOutcome::Updated {
            remote_id,
            content_hash,
        } => Some(UpdateRecord {
            last_fetch: now,
            remote_id: remote_id.clone(),
            content_hash: content_hash.clone(),
        }),
        // A successful check restarts the window as well.
        FetchOutcome::UpToDate => prior.map(|prior| UpdateRecord {
            last_fetch: now,
            ..prior
        }),
        FetchOutcome::Skipped(_) | FetchOutcome::Failed(_) => None,
    };
    if let Some(record) = record
        && let Err(err) = store.put(&spec.id, record)
    {
        return FetchOutcome::Failed(err.into());
    }
    outcome
}

fn report(ctx: &Context, id: &str, outcome: &FetchOutcome) {
    let detail = outcome.detail();
    match outcome.status() {
        OutcomeStatus::Updated => ctx
            .log
            .info(&format!("updated to {}", detail.as_deref().unwrap_or_default())),
        OutcomeStatus::UpToDate => ctx.log.info("already up to date"),
        OutcomeStatus::Skipped => ctx
            .log
            .info(&format!("skipped: {}", detail.as_deref().unwrap_or_default())),
        OutcomeStatus::Failed => ctx.log.error(&format!(
            "{id}: {}",
            detail.as_deref().unwrap_or_default()
        )),
    }
    ctx.log.record_outcome(id, outcome.status(), detail.as_deref());
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
    use crate::config;
    use crate::fetch::test_helpers::{RecordingExecutor, context};
    use crate::state::{MemoryStateStore, StateError};
    use crate::transport::{MockTransport, TransportError};
    use chrono::Duration;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const REGISTRY: &str = r#"
[[applications]]
id = "a"
name = "Tool A"
type = "file"
url = "https://example.com/a"
destination = "bin/a"

[[applications]]
id = "b"
name = "Tool B"
type = "file"
url = "https://example.com/b"
destination = "bin/b"
frequency = "monthly"

[[applications]]
id = "repo"
name = "Some repo"
type = "git_repo"
url = "https://example.com/repo.git"
destination = "src/repo"
"#;

    fn registry(home: &Path) -> config::Registry {
        config::load_str(REGISTRY, Path::new("apps.toml"), home).unwrap()
    }

    fn downloads(times: usize) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_download()
            .times(times)
            .returning(|url, dest| {
                std::fs::write(dest, url).map_err(|source| TransportError::Io {
                    path: dest.to_path_buf(),
                    source,
                })
            });
        transport
    }

    fn ids(filter: &[&str]) -> Filter {
        Filter {
            ids: filter.iter().map(ToString::to_string).collect(),
            kinds: Vec::new(),
        }
    }

    fn summary(results: &[(String, FetchOutcome)]) -> Vec<(String, OutcomeStatus)> {
        results
            .iter()
            .map(|(id, outcome)| (id.clone(), outcome.status()))
            .collect()
    }

    #[test]
    fn unknown_ids_follow_known_ones() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(1),
            false,
        );
        let mut store = MemoryStateStore::new();

        let results = run(
            &registry(home.path()),
            &ids(&["z", "a", "z"]),
            &mut store,
            &ctx,
            Utc::now(),
        );

        assert_eq!(
            summary(&results),
            vec![
                ("a".to_string(), OutcomeStatus::Updated),
                ("z".to_string(), OutcomeStatus::Failed)
            ]
        );
        assert!(matches!(&results[1].1, FetchOutcome::Failed(FetchError::UnknownId(id)) if id == "z"));
        assert!(home.path().join("bin/a").exists(), "a was processed");
        assert!(store.get("a").is_some());
    }

    #[test]
    fn ids_are_processed_in_declaration_order() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(2),
            false,
        );
        let mut store = MemoryStateStore::new();

        let results = run(&registry(home.path()), &ids(&["b", "a"]), &mut store, &ctx, Utc::now());
        let order: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn unmatched_kind_is_reported_once() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(2),
            false,
        );
        let filter = Filter {
            ids: Vec::new(),
            kinds: vec![AppKind::File, AppKind::Archive, AppKind::Archive],
        };

        let results = run(
            &registry(home.path()),
            &filter,
            &mut MemoryStateStore::new(),
            &ctx,
            Utc::now(),
        );

        assert_eq!(
            summary(&results),
            vec![
                ("a".to_string(), OutcomeStatus::Updated),
                ("b".to_string(), OutcomeStatus::Updated),
                ("archive".to_string(), OutcomeStatus::Failed),
            ]
        );
        assert!(matches!(&results[2].1, FetchOutcome::Failed(FetchError::UnknownType(kind)) if kind == "archive"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let home = tempfile::tempdir().unwrap();
        let registry = registry(home.path());
        let filter = ids(&["a", "b"]);
        let mut store = MemoryStateStore::new();
        let now = Utc::now();

        let first = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(2),
            false,
        );
        let results = run(&registry, &filter, &mut store, &first, now);
        assert!(results.iter().all(|(_, o)| o.status() == OutcomeStatus::Updated));

        let second = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(0),
            false,
        );
        let results = run(&registry, &filter, &mut store, &second, now + Duration::hours(1));
        for (id, outcome) in &results {
            assert!(
                matches!(outcome, FetchOutcome::Skipped(reason) if reason.starts_with("not due until")),
                "{id}: {outcome:?}"
            );
        }
    }

    #[test]
    fn deleted_destination_is_fetched_inside_window() {
        let home = tempfile::tempdir().unwrap();
        let registry = registry(home.path());
        let mut store = MemoryStateStore::new();
        let now = Utc::now();
        store
            .put(
                "a",
                UpdateRecord {
                    last_fetch: now - Duration::days(1),
                    remote_id: "old".to_string(),
                    content_hash: None,
                },
            )
            .unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(1),
            false,
        );

        let results = run(&registry, &ids(&["a"]), &mut store, &ctx, now);
        assert_eq!(results[0].1.status(), OutcomeStatus::Updated);
        assert_eq!(store.get("a").unwrap().last_fetch, now);
    }

    #[test]
    fn forced_run_ignores_window() {
        let home = tempfile::tempdir().unwrap();
        let registry = registry(home.path());
        let dest: PathBuf = home.path().join("bin/a");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "old").unwrap();
        let mut store = MemoryStateStore::new();
        let now = Utc::now();
        store
            .put(
                "a",
                UpdateRecord {
                    last_fetch: now,
                    remote_id: "old".to_string(),
                    content_hash: None,
                },
            )
            .unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(1),
            true,
        );

        let results = run(&registry, &ids(&["a"]), &mut store, &ctx, now);
        assert_eq!(results[0].1.status(), OutcomeStatus::Updated);
    }

    #[test]
    fn failure_does_not_stop_siblings() {
        let home = tempfile::tempdir().unwrap();
        // Not a repository: a plain directory whose root check fails.
        std::fs::create_dir_all(home.path().join("src/repo")).unwrap();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![(false, "")]));
        let ctx = context(executor, downloads(2), false);

        let results = run(
            &registry(home.path()),
            &Filter::default(),
            &mut MemoryStateStore::new(),
            &ctx,
            Utc::now(),
        );

        assert_eq!(
            summary(&results),
            vec![
                ("a".to_string(), OutcomeStatus::Updated),
                ("b".to_string(), OutcomeStatus::Updated),
                ("repo".to_string(), OutcomeStatus::Failed),
            ]
        );
        assert!(matches!(
            &results[2].1,
            FetchOutcome::Failed(FetchError::NotARepository { .. })
        ));
    }

    #[test]
    fn up_to_date_restarts_the_window() {
        let home = tempfile::tempdir().unwrap();
        let registry = registry(home.path());
        let dest = home.path().join("src/repo");
        std::fs::create_dir_all(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let mut store = MemoryStateStore::new();
        let now = Utc::now();
        let earlier = now - Duration::days(8);
        store
            .put(
                "repo",
                UpdateRecord {
                    last_fetch: earlier,
                    remote_id: "abc123".to_string(),
                    content_hash: None,
                },
            )
            .unwrap();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (true, "Already up to date."),
            (true, "abc123"),
        ]));
        let ctx = context(executor, MockTransport::new(), false);

        let results = run(&registry, &ids(&["repo"]), &mut store, &ctx, now);

        assert_eq!(results[0].1.status(), OutcomeStatus::UpToDate);
        let record = store.get("repo").unwrap();
        assert_eq!(record.last_fetch, now);
        assert_eq!(record.remote_id, "abc123");
    }

    #[derive(Debug, Default)]
    struct ReadOnlyStore;

    impl StateStore for ReadOnlyStore {
        fn get(&self, _: &str) -> Option<&UpdateRecord> {
            None
        }

        fn put(&mut self, _: &str, _: UpdateRecord) -> Result<(), StateError> {
            Err(StateError::Write {
                path: PathBuf::from("/read-only/update-data.json"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[test]
    fn state_write_failure_fails_that_application() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(
            Arc::new(RecordingExecutor::with_responses(vec![])),
            downloads(1),
            false,
        );

        let results = run(&registry(home.path()), &ids(&["a"]), &mut ReadOnlyStore, &ctx, Utc::now());
        assert!(matches!(
            &results[0].1,
            FetchOutcome::Failed(FetchError::State(StateError::Write { .. }))
        ));
    }
}
