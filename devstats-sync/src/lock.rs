//! Single-instance guard backed by a PID file.
//!
//! The marker is created with `O_CREAT | O_EXCL` semantics, so an existing
//! marker is never overwritten. It holds the owner's PID for operators; the
//! content is never read back.
//!
//! Release is explicit via [`InstanceLock::release`], which surfaces removal
//! failures. A lock dropped without release (early return, panic unwind)
//! still removes its marker and logs any failure. A killed process leaves
//! the marker behind.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{io_err, LockError};

/// Well-known marker location.
pub const DEFAULT_PID_FILE: &str = "/tmp/devstats.pid";

/// Exclusive ownership of the instance marker for one run.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Create the marker at `path`.
    ///
    /// Returns [`LockError::AlreadyRunning`] without touching the file when
    /// it already exists.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyRunning {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(io_err(path, err)),
        };

        // From here on `lock` owns the marker, so a failure below still removes it.
        let lock = Self {
            path: path.to_path_buf(),
            released: false,
        };
        set_file_permissions(path)?;
        write!(file, "{}", std::process::id()).map_err(|e| io_err(path, e))?;
        tracing::debug!(path = %path.display(), "acquired instance lock");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the marker.
    ///
    /// A failure here is fatal for the caller: a stale marker blocks every
    /// later run.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|e| io_err(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "released instance lock");
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "failed to remove instance lock; later runs will refuse to start"
            );
        }
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), LockError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), LockError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_writes_pid_and_release_removes() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("devstats.pid");

        let lock = InstanceLock::acquire(&path).expect("acquire");
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, std::process::id().to_string());

        lock.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_reports_already_running_and_keeps_marker() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("devstats.pid");
        std::fs::write(&path, "4242").expect("seed marker");

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::AlreadyRunning { .. }), "got: {err}");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "4242");
    }

    #[test]
    fn drop_without_release_removes_marker() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("devstats.pid");
        {
            let _lock = InstanceLock::acquire(&path).expect("acquire");
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn release_of_vanished_marker_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("devstats.pid");
        let lock = InstanceLock::acquire(&path).expect("acquire");
        std::fs::remove_file(&path).expect("remove behind the lock's back");

        let err = lock.release().unwrap_err();
        assert!(matches!(err, LockError::Io { .. }), "got: {err}");
    }

    #[test]
    fn missing_parent_directory_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("no_such_dir").join("devstats.pid");
        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Io { .. }), "got: {err}");
    }
}
