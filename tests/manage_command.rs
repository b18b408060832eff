#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `manage` flow.
//!
//! These tests drive configuration loading, the orchestrator, every fetch
//! strategy, and the JSON state store together, with in-process fakes for the
//! network and external programs.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::*;
use userapps_cli::config::{self, AppKind};
use userapps_cli::error::{ConfigError, FetchError};
use userapps_cli::fetch::FetchOutcome;
use userapps_cli::logging::OutcomeStatus;
use userapps_cli::orchestrator::{self, Filter};
use userapps_cli::state::{JsonStateStore, StateStore};

const RELEASE_URL: &str = "https://api.github.com/repos/sass/dart-sass/releases/latest";
const ASSET_URL: &str =
    "https://github.com/sass/dart-sass/releases/download/1.77.8/dart-sass-1.77.8-linux-x64.tar.gz";
const TOOL_URL: &str = "https://example.com/tool.sh";

const RELEASE_JSON: &str = r#"{
    "tag_name": "1.77.8",
    "assets": [
        {"name": "dart-sass-1.77.8-linux-x64.tar.gz", "browser_download_url": "https://github.com/sass/dart-sass/releases/download/1.77.8/dart-sass-1.77.8-linux-x64.tar.gz"},
        {"name": "dart-sass-1.77.8-windows-x64.zip", "browser_download_url": "https://github.com/sass/dart-sass/releases/download/1.77.8/dart-sass-1.77.8-windows-x64.zip"}
    ]
}"#;

const REGISTRY: &str = r#"
[[applications]]
id = "bash-it"
name = "Bash-it"
type = "git_repo"
url = "https://github.com/Bash-it/bash-it.git"
destination = "src/bash-it"

[[applications]]
id = "tool"
name = "Tool script"
type = "file"
url = "https://example.com/tool.sh"
destination = "bin/tool"

[[applications]]
id = "dart-sass"
name = "Dart Sass"
type = "archive"
url = "https://api.github.com/repos/sass/dart-sass/releases/latest"
unzip_prog = "tar"
unzip_args = "-xzf"
unzip_targets = [["dart-sass", "lib"]]

[applications.post_extraction_actions]
symlinks = [["lib/dart-sass/sass", "bin/sass"]]
set_exec = ["lib/dart-sass/sass"]

[applications.github_api_asset_data]
asset_name_contains = "linux-x64"
asset_name_starts = "dart-sass"
asset_name_ends = "tar.gz"
"#;

fn fakes() -> (Arc<FakeExecutor>, Arc<FakeTransport>, Arc<MemoryLog>) {
    (
        Arc::new(FakeExecutor::default().unpacks(&[("dart-sass/sass", "#!/bin/sh\n")])),
        Arc::new(
            FakeTransport::default()
                .with(RELEASE_URL, RELEASE_JSON)
                .with(ASSET_URL, "tarball")
                .with(TOOL_URL, "#!/bin/sh\necho tool\n"),
        ),
        Arc::new(MemoryLog::default()),
    )
}

fn statuses(results: &[(String, FetchOutcome)]) -> Vec<(&str, OutcomeStatus)> {
    results
        .iter()
        .map(|(id, outcome)| (id.as_str(), outcome.status()))
        .collect()
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[test]
fn first_run_installs_everything() {
    let home = TestHome::with_registry(REGISTRY);
    let (executor, transport, log) = fakes();
    let ctx = context(&executor, &transport, &log, false);
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();

    let results = orchestrator::run(
        &home.registry(),
        &Filter::default(),
        &mut store,
        &ctx,
        Utc::now(),
    );

    assert_eq!(
        statuses(&results),
        vec![
            ("bash-it", OutcomeStatus::Updated),
            ("tool", OutcomeStatus::Updated),
            ("dart-sass", OutcomeStatus::Updated),
        ]
    );
    assert!(home.path().join("src/bash-it").is_dir());
    assert!(home.path().join("bin/tool").is_file());
    assert!(home.path().join("lib/dart-sass/sass").is_file());
    assert!(home.path().join("bin/sass").symlink_metadata().is_ok());
    assert!(executor.calls()[0].starts_with("git clone --depth=1"));
    assert_eq!(log.outcomes().len(), 3);

    let persisted = std::fs::read_to_string(home.state_path()).unwrap();
    for id in ["bash-it", "tool", "dart-sass"] {
        assert!(persisted.contains(id), "state file should record {id}");
    }
}

#[test]
fn second_run_is_idempotent() {
    let home = TestHome::with_registry(REGISTRY);
    let registry = home.registry();
    let now = Utc::now();

    let (executor, transport, log) = fakes();
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();
    let first = orchestrator::run(
        &registry,
        &Filter::default(),
        &mut store,
        &context(&executor, &transport, &log, false),
        now,
    );
    assert!(first.iter().all(|(_, o)| o.status() == OutcomeStatus::Updated));

    // A fresh process: state comes back from disk.
    let (executor, transport, log) = fakes();
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();
    let second = orchestrator::run(
        &registry,
        &Filter::default(),
        &mut store,
        &context(&executor, &transport, &log, false),
        now + Duration::hours(2),
    );

    for (id, outcome) in &second {
        assert!(
            matches!(
                outcome.status(),
                OutcomeStatus::UpToDate | OutcomeStatus::Skipped
            ),
            "{id} changed on the second run: {outcome:?}"
        );
    }
    assert!(transport.downloads().is_empty());
    assert!(executor.calls().is_empty());
}

#[test]
fn daily_second_run_reports_up_to_date() {
    let daily = REGISTRY
        .replace(
            "destination = \"src/bash-it\"",
            "destination = \"src/bash-it\"\nfrequency = \"daily\"",
        )
        .replace(
            "destination = \"bin/tool\"",
            "destination = \"bin/tool\"\nfrequency = \"d\"",
        )
        .replace("unzip_prog = \"tar\"", "unzip_prog = \"tar\"\nfrequency = \"daily\"");
    let home = TestHome::with_registry(&daily);
    let registry = home.registry();
    let filter = Filter {
        ids: Vec::new(),
        kinds: vec![AppKind::GitRepo, AppKind::File, AppKind::Archive],
    };
    let now = Utc::now();

    let (executor, transport, log) = fakes();
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();
    orchestrator::run(
        &registry,
        &filter,
        &mut store,
        &context(&executor, &transport, &log, false),
        now,
    );

    let (executor, transport, log) = fakes();
    let second = orchestrator::run(
        &registry,
        &filter,
        &mut store,
        &context(&executor, &transport, &log, false),
        now + Duration::days(1),
    );
    assert_eq!(
        statuses(&second),
        vec![
            ("bash-it", OutcomeStatus::UpToDate),
            ("tool", OutcomeStatus::UpToDate),
            ("dart-sass", OutcomeStatus::UpToDate)
        ]
    );
    assert!(transport.downloads().is_empty());
    assert!(
        executor.calls().contains(&"git pull --ff-only".to_string()),
        "a due repository is still pulled"
    );
}

#[test]
fn forced_run_fetches_again() {
    let home = TestHome::with_registry(REGISTRY);
    let registry = home.registry();
    let filter = Filter {
        ids: vec!["bash-it".to_string(), "tool".to_string()],
        kinds: Vec::new(),
    };
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();

    let (executor, transport, log) = fakes();
    orchestrator::run(
        &registry,
        &filter,
        &mut store,
        &context(&executor, &transport, &log, false),
        Utc::now(),
    );

    let (executor, transport, log) = fakes();
    let results = orchestrator::run(
        &registry,
        &filter,
        &mut store,
        &context(&executor, &transport, &log, true),
        Utc::now(),
    );
    assert!(results.iter().all(|(_, o)| o.status() == OutcomeStatus::Updated));
    assert!(executor.calls().contains(&"git pull --ff-only".to_string()));
    assert_eq!(transport.downloads(), vec![TOOL_URL.to_string()]);
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[test]
fn unknown_id_is_reported_after_known_ones() {
    let home = TestHome::with_registry(REGISTRY);
    let (executor, transport, log) = fakes();
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();
    let filter = Filter {
        ids: vec!["tool".to_string(), "z".to_string()],
        kinds: Vec::new(),
    };

    let results = orchestrator::run(
        &home.registry(),
        &filter,
        &mut store,
        &context(&executor, &transport, &log, false),
        Utc::now(),
    );

    assert_eq!(
        statuses(&results),
        vec![("tool", OutcomeStatus::Updated), ("z", OutcomeStatus::Failed)]
    );
    assert!(matches!(&results[1].1, FetchOutcome::Failed(FetchError::UnknownId(_))));
    assert!(store.get("z").is_none());
}

#[test]
fn missing_unpacker_skips_archive() {
    let registry = REGISTRY.replace("unzip_prog = \"tar\"", "unzip_prog = \"missing-unpacker\"");
    let home = TestHome::with_registry(&registry);
    let (executor, transport, log) = fakes();
    let mut store = JsonStateStore::open(&home.state_path()).unwrap();

    let results = orchestrator::run(
        &home.registry(),
        &Filter {
            ids: vec!["dart-sass".to_string()],
            kinds: Vec::new(),
        },
        &mut store,
        &context(&executor, &transport, &log, false),
        Utc::now(),
    );

    assert_eq!(statuses(&results), vec![("dart-sass", OutcomeStatus::Skipped)]);
    assert!(transport.downloads().is_empty());
    assert!(store.get("dart-sass").is_none(), "skips are not recorded");
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[test]
fn duplicate_id_is_a_config_error() {
    let text = "[[applications]]\nid = \"x\"\nname = \"X\"\ntype = \"file\"\nurl = \"https://e.com/x\"\ndestination = \"x\"\n\n[[applications]]\nid = \"x\"\nname = \"X2\"\ntype = \"file\"\nurl = \"https://e.com/x2\"\ndestination = \"x2\"\n";
    let home = TestHome::with_registry(text);
    let err = config::load(&home.config_path(), home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEntries(_)));
    assert!(err.to_string().contains("duplicate id 'x'"));
}

#[test]
fn archive_without_targets_is_a_config_error() {
    let text = REGISTRY.replace("unzip_targets = [[\"dart-sass\", \"lib\"]]", "unzip_targets = []");
    let home = TestHome::with_registry(&text);
    let err = config::load(&home.config_path(), home.path()).unwrap_err();
    assert!(err.to_string().contains("dart-sass"), "{err}");
}

#[test]
fn ids_are_listed_without_validation() {
    let home = TestHome::with_registry(
        "[[applications]]\nid = \"first\"\n\n[[applications]]\nid = \"second\"\ntype = \"bogus\"\n",
    );
    assert_eq!(
        config::list_ids(&home.config_path()).unwrap(),
        vec!["first", "second"]
    );
    assert!(config::load(&home.config_path(), home.path()).is_err());
}
