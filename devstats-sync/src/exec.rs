//! External step invocation.
//!
//! The orchestrator only knows a step's program name, the environment it
//! adds, and whether it succeeded. [`StepRunner`] is the seam; the real
//! implementation is [`ProcessRunner`].

use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use crate::error::ExecError;

/// Program that refreshes every project's git clones.
pub const GET_REPOS: &str = "get_repos";

/// Program that syncs one project's databases.
pub const GHA2DB_SYNC: &str = "gha2db_sync";

/// One external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Program path or name (looked up on `PATH` when bare).
    pub program: String,
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl Step {
    pub fn new(program: impl Into<String>, env: BTreeMap<String, String>) -> Self {
        Self {
            program: program.into(),
            env,
        }
    }
}

/// Runs a step to completion.
pub trait StepRunner {
    fn run(&mut self, step: &Step) -> Result<(), ExecError>;
}

/// Runs steps as child processes and blocks until each one exits.
///
/// The child inherits this process's environment plus the step's additions
/// and its stdout. Stderr is captured so failures can be reported.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Log every command line at debug level.
    pub trace_commands: bool,
}

impl ProcessRunner {
    pub fn new(trace_commands: bool) -> Self {
        Self { trace_commands }
    }
}

impl StepRunner for ProcessRunner {
    fn run(&mut self, step: &Step) -> Result<(), ExecError> {
        if self.trace_commands {
            tracing::debug!(program = %step.program, env = ?step.env, "executing");
        }

        let child = Command::new(&step.program)
            .envs(&step.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: step.program.clone(),
                source,
            })?;
        let output = child.wait_with_output().map_err(|source| ExecError::Spawn {
            program: step.program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }
        Err(ExecError::Failed {
            program: step.program.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_program_is_ok() {
        let mut runner = ProcessRunner::default();
        runner.run(&Step::new("true", BTreeMap::new())).expect("true succeeds");
    }

    #[test]
    fn failing_program_reports_status() {
        let mut runner = ProcessRunner::default();
        let err = runner.run(&Step::new("false", BTreeMap::new())).unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }), "got: {err}");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let mut runner = ProcessRunner::new(true);
        let err = runner
            .run(&Step::new("/nonexistent/devstats-step", BTreeMap::new()))
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }), "got: {err}");
    }

    #[test]
    fn step_env_reaches_child_and_stderr_is_captured() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let script = dir.path().join("check_env");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"project=$GHA2DB_PROJECT\" >&2\nexit 3\n",
        )
        .expect("write script");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }

        let env = BTreeMap::from([("GHA2DB_PROJECT".to_string(), "kubernetes".to_string())]);
        let mut runner = ProcessRunner::default();
        let err = runner
            .run(&Step::new(script.to_string_lossy(), env))
            .unwrap_err();
        match err {
            ExecError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "project=kubernetes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
