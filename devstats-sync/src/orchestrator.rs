//! Sequential, fail-soft sync of every enabled project.
//!
//! ## Run phases
//!
//! 1. Acquire the instance lock; if another run holds it, stop with
//!    [`RunOutcome::AlreadyRunning`].
//! 2. Unless `skip_get_repos` is set, run `get_repos` once with
//!    `GHA2DB_PROCESS_REPOS=1`. A failure ends the run with
//!    [`RunOutcome::RepoRefreshFailed`]; no project is attempted.
//! 3. Run `gha2db_sync` for each scheduled project in ascending order. A
//!    failing project is logged and the loop moves on.
//! 4. Release the lock on every path above.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use devstats_core::{registry, Configuration, Manifest, ProjectName, ScheduledProject};

use crate::error::{ExecError, LockError, SyncError};
use crate::exec::{Step, StepRunner, GET_REPOS, GHA2DB_SYNC};
use crate::lock::InstanceLock;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of one project's sync step.
#[derive(Debug)]
pub struct ProjectOutcome {
    pub name: ProjectName,
    pub order: i64,
    pub elapsed: Duration,
    pub result: Result<(), ExecError>,
}

impl ProjectOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Another instance holds the lock; nothing was attempted.
    AlreadyRunning { pid_file: PathBuf },
    /// The repository refresh failed; no project was attempted.
    RepoRefreshFailed {
        elapsed: Duration,
        error: ExecError,
    },
    /// The project loop ran. Individual projects may still have failed.
    Completed { projects: Vec<ProjectOutcome> },
}

impl RunOutcome {
    /// The top-level "did we sync" answer: true once the project loop ran.
    pub fn synced(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    /// Per-project outcomes; empty unless the loop ran.
    pub fn projects(&self) -> &[ProjectOutcome] {
        match self {
            RunOutcome::Completed { projects } => projects,
            _ => &[],
        }
    }

    pub fn failed_projects(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.projects().iter().filter(|p| !p.succeeded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.synced() && self.failed_projects().next().is_none()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one sync run over a manifest.
pub struct SyncOrchestrator<'a, R> {
    config: &'a Configuration,
    runner: R,
    pid_file: PathBuf,
}

impl<'a, R: StepRunner> SyncOrchestrator<'a, R> {
    pub fn new(config: &'a Configuration, runner: R, pid_file: impl Into<PathBuf>) -> Self {
        Self {
            config,
            runner,
            pid_file: pid_file.into(),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Hand back the runner, e.g. to inspect a recording runner in tests.
    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Execute a full run.
    ///
    /// Only lock management errors are returned as `Err`; step failures are
    /// part of the [`RunOutcome`].
    pub fn run(&mut self, manifest: &Manifest) -> Result<RunOutcome, SyncError> {
        let projects = registry::schedule(manifest, self.config);

        let lock = match InstanceLock::acquire(&self.pid_file) {
            Ok(lock) => lock,
            Err(LockError::AlreadyRunning { path }) => {
                tracing::info!(
                    "Another `devstats` instance is running, PID file '{}' exists, exiting",
                    path.display()
                );
                return Ok(RunOutcome::AlreadyRunning { pid_file: path });
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = self.run_locked(&projects);
        lock.release()?;
        Ok(outcome)
    }

    fn run_locked(&mut self, projects: &[ScheduledProject]) -> RunOutcome {
        if !self.config.skip_get_repos {
            if let Err((elapsed, error)) = self.refresh_repos() {
                return RunOutcome::RepoRefreshFailed { elapsed, error };
            }
        }

        let projects = projects
            .iter()
            .fold(Vec::with_capacity(projects.len()), |mut acc, project| {
                acc.push(self.sync_project(project));
                acc
            });
        RunOutcome::Completed { projects }
    }

    fn refresh_repos(&mut self) -> Result<(), (Duration, ExecError)> {
        tracing::info!("Updating git repos for all projects");
        let env = BTreeMap::from([("GHA2DB_PROCESS_REPOS".to_string(), "1".to_string())]);
        let step = Step::new(self.program(GET_REPOS), env);

        let started = Instant::now();
        let result = self.runner.run(&step);
        let elapsed = started.elapsed();
        match result {
            Ok(()) => {
                tracing::info!("Updated git repos, took: {elapsed:?}");
                Ok(())
            }
            Err(err) => {
                tracing::error!("Error updating git repos (took {elapsed:?}): {err}");
                Err((elapsed, err))
            }
        }
    }

    fn sync_project(&mut self, project: &ScheduledProject) -> ProjectOutcome {
        let order = project.descriptor.order;
        tracing::info!("Syncing #{order} {}", project.name);
        let step = Step::new(self.program(GHA2DB_SYNC), project.sync_env());

        let started = Instant::now();
        let result = self.runner.run(&step);
        let elapsed = started.elapsed();
        match &result {
            Ok(()) => tracing::info!("Synced {}, took: {elapsed:?}", project.name),
            Err(err) => tracing::error!(
                "Error result for {} (took {elapsed:?}): {err}",
                project.name
            ),
        }

        ProjectOutcome {
            name: project.name.clone(),
            order,
            elapsed,
            result,
        }
    }

    fn program(&self, name: &str) -> String {
        format!("{}{name}", self.config.command_prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::TempDir;

    /// Records every step and fails the listed programs.
    #[derive(Default)]
    struct Recorder {
        steps: Vec<Step>,
        fail_programs: Vec<String>,
    }

    impl StepRunner for Recorder {
        fn run(&mut self, step: &Step) -> Result<(), ExecError> {
            self.steps.push(step.clone());
            if self.fail_programs.contains(&step.program) {
                return Err(ExecError::Spawn {
                    program: step.program.clone(),
                    source: io::Error::other("scripted failure"),
                });
            }
            Ok(())
        }
    }

    fn manifest() -> Manifest {
        devstats_core::registry::load(
            b"projects:\n  k8s:\n    order: 1\n    psql_db: gha\n    influx_db: k8s\n",
        )
        .expect("manifest")
    }

    #[test]
    fn local_mode_prefixes_programs() {
        let home = TempDir::new().expect("tempdir");
        let config = Configuration {
            local: true,
            ..Configuration::with_home("")
        };
        let mut orch =
            SyncOrchestrator::new(&config, Recorder::default(), home.path().join("d.pid"));
        let outcome = orch.run(&manifest()).expect("run");
        assert!(outcome.all_succeeded());

        let programs: Vec<_> = orch
            .into_runner()
            .steps
            .into_iter()
            .map(|s| s.program)
            .collect();
        assert_eq!(programs, vec!["./get_repos", "./gha2db_sync"]);
    }

    #[test]
    fn repo_refresh_carries_process_repos_flag() {
        let home = TempDir::new().expect("tempdir");
        let config = Configuration::with_home("");
        let mut orch =
            SyncOrchestrator::new(&config, Recorder::default(), home.path().join("d.pid"));
        orch.run(&manifest()).expect("run");

        let steps = orch.into_runner().steps;
        assert_eq!(steps[0].program, "get_repos");
        assert_eq!(steps[0].env["GHA2DB_PROCESS_REPOS"], "1");
    }

    #[test]
    fn skip_get_repos_goes_straight_to_projects() {
        let home = TempDir::new().expect("tempdir");
        let config = Configuration {
            skip_get_repos: true,
            ..Configuration::with_home("")
        };
        let mut orch =
            SyncOrchestrator::new(&config, Recorder::default(), home.path().join("d.pid"));
        let outcome = orch.run(&manifest()).expect("run");
        assert_eq!(outcome.projects().len(), 1);

        let steps = orch.into_runner().steps;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].program, "gha2db_sync");
    }

    #[test]
    fn lock_released_after_repo_refresh_failure() {
        let home = TempDir::new().expect("tempdir");
        let pid_file = home.path().join("d.pid");
        let config = Configuration::with_home("");
        let runner = Recorder {
            fail_programs: vec!["get_repos".into()],
            ..Recorder::default()
        };
        let mut orch = SyncOrchestrator::new(&config, runner, &pid_file);
        let outcome = orch.run(&manifest()).expect("run");
        assert!(matches!(outcome, RunOutcome::RepoRefreshFailed { .. }));
        assert!(!outcome.synced());
        assert!(!pid_file.exists());
    }
}
