//! Exclusive workspace lock.
//!
//! Exclusive-create is the sole synchronization primitive: no retry, no
//! blocking wait. Contention is a hard failure surfaced to the operator,
//! because chaos runs against one workspace are mutually exclusive by
//! policy, not by queuing.

use crate::error::{HavocError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the lock artifact inside the workspace.
pub const LOCK_FILE: &str = "chaos_runner.lock";

/// A held lock over one workspace directory, tagged with the owning pid.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
    pid: u32,
}

impl WorkspaceLock {
    /// Acquire the lock for `workspace`.
    ///
    /// The workspace must be an existing directory. The lock file is
    /// created with exclusive-create semantics; if it already exists no
    /// lock was taken and nothing must be released. After creation the
    /// file is re-read to confirm the recorded owner is this process.
    pub fn acquire(workspace: &Path) -> Result<Self> {
        if !workspace.is_dir() {
            return Err(HavocError::WorkspaceNotFound(workspace.to_path_buf()));
        }
        let path = workspace.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HavocError::LockConflict(path));
            }
            Err(e) => return Err(e.into()),
        };
        let pid = std::process::id();
        write!(file, "{pid}")?;
        file.sync_all()?;
        drop(file);

        let lock = Self { path, pid };
        lock.verify()?;
        debug!(path = %lock.path.display(), pid, "workspace lock acquired");
        Ok(lock)
    }

    /// Re-read the lock artifact and confirm it still records our pid.
    /// A mismatch means another process tampered with the lock — a fatal
    /// integrity violation, not a retryable condition.
    pub fn verify(&self) -> Result<()> {
        let found = fs::read_to_string(&self.path)?;
        let found = found.trim();
        if found != self.pid.to_string() {
            return Err(HavocError::LockIntegrity {
                path: self.path.clone(),
                found: found.to_string(),
                expected: self.pid,
            });
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock artifact.
    ///
    /// An already-absent file is a benign warning, since cancellation can
    /// legitimately race with lock removal. Any other I/O failure
    /// propagates.
    pub fn release(self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "workspace lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "lock file not found");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
