//! # devstats-sync
//!
//! Single-instance, sequential sync of every enabled project.
//!
//! Build a [`SyncOrchestrator`] from a resolved
//! [`devstats_core::Configuration`], a [`StepRunner`] (normally
//! [`ProcessRunner`]) and a PID file path, then call
//! [`SyncOrchestrator::run`] with the loaded manifest.

pub mod error;
pub mod exec;
pub mod lock;
pub mod orchestrator;

pub use error::{ExecError, LockError, SyncError};
pub use exec::{ProcessRunner, Step, StepRunner};
pub use lock::{InstanceLock, DEFAULT_PID_FILE};
pub use orchestrator::{ProjectOutcome, RunOutcome, SyncOrchestrator};
