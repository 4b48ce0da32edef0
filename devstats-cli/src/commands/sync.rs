//! `devstats sync`: run every enabled project's sync step.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use devstats_core::{registry, Configuration};
use devstats_sync::{ProcessRunner, RunOutcome, SyncOrchestrator, DEFAULT_PID_FILE};

/// Arguments for `devstats sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Projects manifest (default: `<data dir>/<GHA2DB_PROJECTS_YAML>`).
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Instance marker guarding against concurrent runs.
    #[arg(long, global = true, default_value = DEFAULT_PID_FILE)]
    pub pid_file: PathBuf,
}

impl SyncArgs {
    pub fn run(self, config: &Configuration) -> Result<()> {
        if config.ctx_out {
            println!("{}", super::config::render(config, false)?);
        }

        let started = Instant::now();
        let manifest_path = self.manifest.unwrap_or_else(|| {
            PathBuf::from(format!("{}{}", config.data_prefix(), config.projects_yaml))
        });
        let manifest = registry::load_file(&manifest_path)
            .with_context(|| format!("cannot load manifest '{}'", manifest_path.display()))?;

        let runner = ProcessRunner::new(config.cmd_debug > 0);
        let mut orchestrator = SyncOrchestrator::new(config, runner, self.pid_file);
        let outcome = orchestrator.run(&manifest).context("sync run aborted")?;

        print_outcome(&outcome);
        if outcome.synced() {
            tracing::info!("Synced all projects in: {:?}", started.elapsed());
        }
        Ok(())
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::AlreadyRunning { pid_file } => {
            println!(
                "another devstats instance is running (PID file '{}'), nothing synced",
                pid_file.display()
            );
        }
        RunOutcome::RepoRefreshFailed { elapsed, error } => {
            println!("✗ repository refresh failed after {elapsed:?}, nothing synced: {error}");
        }
        RunOutcome::Completed { projects } => {
            if projects.is_empty() {
                println!("No enabled projects in the manifest.");
                return;
            }
            for p in projects {
                match &p.result {
                    Ok(()) => println!("✓ #{} {} ({:?})", p.order, p.name, p.elapsed),
                    Err(err) => println!("✗ #{} {} ({:?}): {err}", p.order, p.name, p.elapsed),
                }
            }
            let failed = outcome.failed_projects().count();
            println!("{} synced, {failed} failed", projects.len() - failed);
        }
    }
}
