//! Run-log setup.
//!
//! Each run writes to `<workspace>/log/results.log`, rotating numbered
//! backups of the previous run's log first. Writes are best-effort: a
//! chaos window that cuts off I/O must not bring the runner down, and the
//! fmt writer swallows write errors.

use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const LOG_DIR: &str = "log";
pub const LOG_FILE: &str = "results.log";

/// Install the file subscriber for this run.
pub fn init(workspace: &Path, log_count: u32) -> anyhow::Result<()> {
    let log_dir = workspace.join(LOG_DIR);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join(LOG_FILE);
    rotate(&log_path, log_count).context("failed to rotate log backups")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    let file = Arc::new(file);
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_ansi(false)
        .with_target(false)
        .with_writer(move || file.clone())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(())
}

/// Fallback when the workspace log cannot be used.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Shift `results.log` -> `results.log.1` -> ... keeping at most `count`
/// backups. With a count of zero the previous log is simply discarded.
fn rotate(path: &Path, count: u32) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if count == 0 {
        return fs::remove_file(path);
    }
    let backup = |n: u32| path.with_extension(format!("log.{n}"));
    let _ = fs::remove_file(backup(count));
    for n in (1..count).rev() {
        let from = backup(n);
        if from.exists() {
            fs::rename(&from, backup(n + 1))?;
        }
    }
    fs::rename(path, backup(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rotate_missing_file_is_noop() {
        let dir = TempDir::new().unwrap();
        rotate(&dir.path().join(LOG_FILE), 2).unwrap();
    }

    #[test]
    fn rotate_shifts_numbered_backups() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join(LOG_FILE);
        fs::write(&log, "run-1").unwrap();
        rotate(&log, 2).unwrap();
        fs::write(&log, "run-2").unwrap();
        rotate(&log, 2).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("results.log.1")).unwrap(),
            "run-2"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("results.log.2")).unwrap(),
            "run-1"
        );
    }

    #[test]
    fn rotate_caps_backups_at_count() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join(LOG_FILE);
        for n in 0..4 {
            fs::write(&log, format!("run-{n}")).unwrap();
            rotate(&log, 2).unwrap();
        }
        assert!(dir.path().join("results.log.1").exists());
        assert!(dir.path().join("results.log.2").exists());
        assert!(!dir.path().join("results.log.3").exists());
    }

    #[test]
    fn rotate_zero_count_discards_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join(LOG_FILE);
        fs::write(&log, "run-1").unwrap();
        rotate(&log, 0).unwrap();
        assert!(!log.exists());
        assert!(!dir.path().join("results.log.1").exists());
    }
}
