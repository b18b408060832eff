//! `git_repo` and `hg_repo`: clone when absent, pull when present.
use std::path::Path;

use crate::config::{AppKind, ApplicationSpec};
use crate::error::FetchError;
use crate::state::UpdateRecord;

use super::{Context, FetchOutcome, destination};

/// Command vocabulary of one version control system.
#[derive(Debug, Clone, Copy)]
struct Vcs {
    program: &'static str,
    label: &'static str,
    root: &'static [&'static str],
    pull: &'static [&'static str],
    pull_pinned: &'static [&'static str],
    checkout: &'static str,
    identify: &'static [&'static str],
}

const GIT: Vcs = Vcs {
    program: "git",
    label: "git",
    root: &["rev-parse", "--show-toplevel"],
    pull: &["pull", "--ff-only"],
    pull_pinned: &["fetch", "--tags"],
    checkout: "checkout",
    identify: &["rev-parse", "HEAD"],
};

const HG: Vcs = Vcs {
    program: "hg",
    label: "mercurial",
    root: &["root"],
    pull: &["pull", "-u"],
    pull_pinned: &["pull"],
    checkout: "update",
    identify: &["id", "-i"],
};

impl Vcs {
    const fn for_kind(kind: AppKind) -> Self {
        match kind {
            AppKind::HgRepo => HG,
            _ => GIT,
        }
    }

    fn clone_args<'a>(self, url: &'a str, dest: &'a str, pinned: bool) -> Vec<&'a str> {
        let mut args = vec!["clone"];
        if self.program == "git" && !pinned {
            args.push("--depth=1");
        }
        args.extend([url, dest]);
        args
    }

    /// Whether `dir` is the root of a working copy of this kind. A directory
    /// nested inside some other repository is not.
    fn is_root(self, dir: &Path, ctx: &Context) -> Result<bool, FetchError> {
        if !dir.is_dir() {
            return Ok(false);
        }
        let result = ctx
            .executor
            .run_unchecked_in(dir, self.program, self.root)
            .map_err(|e| FetchError::from_command(format!("{} root check", self.program), &e))?;
        if !result.success {
            return Ok(false);
        }
        let reported = Path::new(result.stdout.trim());
        Ok(match (reported.canonicalize(), dir.canonicalize()) {
            (Ok(reported), Ok(dir)) => reported == dir,
            _ => false,
        })
    }
}

/// Clone or pull `spec`, check out its pinned revision, and report the
/// working-copy revision.
///
/// A pull that leaves the working copy at the revision recorded in `prior`
/// is `UpToDate`; a fresh clone or a forced run is always `Updated`.
pub(super) fn sync(
    spec: &ApplicationSpec,
    prior: Option<&UpdateRecord>,
    ctx: &Context,
) -> Result<FetchOutcome, FetchError> {
    let vcs = Vcs::for_kind(spec.kind);
    let dest = destination(spec)?;
    let revision = spec.checkout_revision.as_deref();

    let cloned = dest.symlink_metadata().is_err();
    if cloned {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FetchError::io(format!("create parent {}", parent.display()), e)
            })?;
        }
        let target = dest.to_string_lossy();
        ctx.log.info(&format!("cloning {} into {}", spec.url, dest.display()));
        ctx.executor
            .run(
                vcs.program,
                &vcs.clone_args(&spec.url, &target, revision.is_some()),
            )
            .map_err(|e| FetchError::from_command(format!("{} clone", vcs.program), &e))?;
    } else if vcs.is_root(dest, ctx)? {
        let args = if revision.is_some() {
            vcs.pull_pinned
        } else {
            vcs.pull
        };
        ctx.log.info(&format!("pulling {}", dest.display()));
        let result = ctx
            .executor
            .run_in(dest, vcs.program, args)
            .map_err(|e| FetchError::from_command(format!("{} {}", vcs.program, args.join(" ")), &e))?;
        ctx.log.debug(result.stdout.trim());
    } else {
        return Err(FetchError::NotARepository {
            path: dest.to_path_buf(),
            expected: vcs.label,
        });
    }

    if let Some(revision) = revision {
        ctx.log.debug(&format!("checking out {revision}"));
        ctx.executor
            .run_in(dest, vcs.program, &[vcs.checkout, revision])
            .map_err(|e| {
                FetchError::timeout_of(&e).unwrap_or_else(|| FetchError::Revision {
                    revision: revision.to_string(),
                    message: format!("{e:#}"),
                })
            })?;
    }

    let id = ctx
        .executor
        .run_in(dest, vcs.program, vcs.identify)
        .map_err(|e| FetchError::from_command(format!("{} {}", vcs.program, vcs.identify.join(" ")), &e))?;
    let remote_id = id.stdout.trim().to_string();
    if !cloned && !ctx.forced && prior.is_some_and(|p| p.remote_id == remote_id) {
        ctx.log.debug(&format!("still at {remote_id}"));
        return Ok(FetchOutcome::UpToDate);
    }
    Ok(FetchOutcome::Updated {
        remote_id,
        content_hash: None,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Frequency;
    use crate::config::application::PostExtraction;
    use crate::fetch::test_helpers::{RecordingExecutor, context};
    use crate::transport::MockTransport;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn repo_spec(kind: AppKind, dest: PathBuf, revision: Option<&str>) -> ApplicationSpec {
        ApplicationSpec {
            id: "bash-it".to_string(),
            name: "Bash-it".to_string(),
            kind,
            url: "https://github.com/Bash-it/bash-it.git".to_string(),
            destination: Some(dest),
            frequency: Frequency::Weekly,
            checkout_revision: revision.map(String::from),
            unpack: None,
            post_extraction: PostExtraction::default(),
            asset_rule: None,
        }
    }

    fn run(spec: &ApplicationSpec, executor: &Arc<RecordingExecutor>) -> Result<FetchOutcome, FetchError> {
        run_after(spec, None, executor, false)
    }

    fn run_after(
        spec: &ApplicationSpec,
        prior: Option<&UpdateRecord>,
        executor: &Arc<RecordingExecutor>,
        forced: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let ctx = context(Arc::clone(executor), MockTransport::new(), forced);
        sync(spec, prior, &ctx)
    }

    fn recorded(remote_id: &str) -> UpdateRecord {
        UpdateRecord {
            last_fetch: chrono::Utc::now(),
            remote_id: remote_id.to_string(),
            content_hash: None,
        }
    }

    /// An existing working copy whose pull leaves HEAD at `head`.
    fn pulled_repository(dir: &Path, head: &str) -> (PathBuf, Arc<RecordingExecutor>) {
        let dest = dir.join("bash-it");
        std::fs::create_dir(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (true, "Already up to date."),
            (true, head),
        ]));
        (dest, executor)
    }

    #[test]
    fn unchanged_pull_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let (dest, executor) = pulled_repository(dir.path(), "abc123\n");
        let prior = recorded("abc123");

        let outcome = run_after(&repo_spec(AppKind::GitRepo, dest, None), Some(&prior), &executor, false)
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::UpToDate));
        assert!(executor.ran("git pull --ff-only"), "the remote is still consulted");
    }

    #[test]
    fn pull_that_moves_head_is_updated() {
        let dir = tempfile::tempdir().unwrap();
        let (dest, executor) = pulled_repository(dir.path(), "def456");
        let prior = recorded("abc123");

        let outcome = run_after(&repo_spec(AppKind::GitRepo, dest, None), Some(&prior), &executor, false)
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Updated { ref remote_id, .. } if remote_id == "def456"));
    }

    #[test]
    fn forced_pull_is_updated_even_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (dest, executor) = pulled_repository(dir.path(), "abc123");
        let prior = recorded("abc123");

        let outcome = run_after(&repo_spec(AppKind::GitRepo, dest, None), Some(&prior), &executor, true)
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Updated { .. }));
    }

    #[test]
    fn fresh_clone_is_updated_even_with_matching_record() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, ""),
            (true, "abc123"),
        ]));
        let prior = recorded("abc123");

        let outcome = run_after(&repo_spec(AppKind::GitRepo, dest, None), Some(&prior), &executor, false)
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Updated { .. }));
    }

    #[test]
    fn timed_out_checkout_is_a_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        let executor = Arc::new(
            RecordingExecutor::with_responses(vec![(true, "")]).timing_out_on("git checkout"),
        );

        let err = run(&repo_spec(AppKind::GitRepo, dest, Some("v3.0.0")), &executor).unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)), "{err:?}");
    }

    #[test]
    fn absent_destination_is_cloned_shallow() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("src/bash-it");
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, ""),
            (true, "0123abcd\n"),
        ]));

        let outcome = run(&repo_spec(AppKind::GitRepo, dest.clone(), None), &executor).unwrap();

        let commands = executor.commands();
        assert_eq!(
            commands[0],
            format!(
                "git clone --depth=1 https://github.com/Bash-it/bash-it.git {}",
                dest.display()
            )
        );
        assert!(!executor.ran("git pull"));
        assert!(dest.parent().unwrap().is_dir(), "parent is created for the clone");
        assert!(matches!(
            outcome,
            FetchOutcome::Updated { ref remote_id, content_hash: None } if remote_id == "0123abcd"
        ));
    }

    #[test]
    fn pinned_clone_is_full_and_checks_out() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, ""),
            (true, ""),
            (true, "feedface"),
        ]));

        run(&repo_spec(AppKind::GitRepo, dest, Some("v3.0.0")), &executor).unwrap();

        let commands = executor.commands();
        assert!(!commands[0].contains("--depth"), "pinned clones need history");
        assert_eq!(commands[1], "git checkout v3.0.0");
        assert_eq!(commands[2], "git rev-parse HEAD");
    }

    #[test]
    fn existing_repository_is_pulled_not_cloned() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        std::fs::create_dir(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (true, "Already up to date."),
            (true, "0123abcd"),
        ]));

        run(&repo_spec(AppKind::GitRepo, dest, None), &executor).unwrap();

        assert_eq!(
            executor.commands(),
            vec![
                "git rev-parse --show-toplevel",
                "git pull --ff-only",
                "git rev-parse HEAD"
            ]
        );
        assert!(!executor.ran("git clone"));
    }

    #[test]
    fn pinned_git_repository_fetches_tags() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        std::fs::create_dir(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (true, ""),
            (true, ""),
            (true, "0123abcd"),
        ]));

        run(&repo_spec(AppKind::GitRepo, dest, Some("v3.0.0")), &executor).unwrap();
        assert_eq!(executor.commands()[1], "git fetch --tags");
    }

    #[test]
    fn nested_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("inner");
        std::fs::create_dir(&dest).unwrap();
        // The enclosing repository's root is reported, not `dest`.
        let outer = dir.path().to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![(true, outer.as_str())]));

        let err = run(&repo_spec(AppKind::GitRepo, dest, None), &executor).unwrap_err();

        assert!(matches!(err, FetchError::NotARepository { expected: "git", .. }));
        assert!(!executor.ran("git clone"));
        assert!(!executor.ran("git pull"));
    }

    #[test]
    fn regular_file_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        std::fs::write(&dest, "not a repo").unwrap();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![]));

        let err = run(&repo_spec(AppKind::HgRepo, dest, None), &executor).unwrap_err();

        assert!(matches!(err, FetchError::NotARepository { expected: "mercurial", .. }));
        assert!(executor.commands().is_empty());
    }

    #[test]
    fn mercurial_uses_its_own_verbs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("hgrepo");
        std::fs::create_dir(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (true, ""),
            (true, ""),
            (true, "a1b2c3d4e5f6\n"),
        ]));

        let outcome = run(&repo_spec(AppKind::HgRepo, dest, Some("stable")), &executor).unwrap();

        assert_eq!(
            executor.commands(),
            vec!["hg root", "hg pull", "hg update stable", "hg id -i"]
        );
        assert!(matches!(outcome, FetchOutcome::Updated { ref remote_id, .. } if remote_id == "a1b2c3d4e5f6"));
    }

    #[test]
    fn failed_checkout_is_a_revision_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, ""),
            (false, "pathspec 'nope' did not match"),
        ]));

        let err = run(&repo_spec(AppKind::GitRepo, dest, Some("nope")), &executor).unwrap_err();
        assert!(matches!(err, FetchError::Revision { ref revision, .. } if revision == "nope"));
    }

    #[test]
    fn failed_pull_is_a_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bash-it");
        std::fs::create_dir(&dest).unwrap();
        let root = dest.to_string_lossy().into_owned();
        let executor = Arc::new(RecordingExecutor::with_responses(vec![
            (true, root.as_str()),
            (false, "diverged"),
        ]));

        let err = run(&repo_spec(AppKind::GitRepo, dest, None), &executor).unwrap_err();
        assert!(matches!(err, FetchError::Command { ref step, .. } if step == "git pull --ff-only"));
    }
}
