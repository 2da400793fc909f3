use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HavocError {
    #[error("invalid value given on command line: {0}")]
    InvalidToken(String),

    #[error("lock file already exists: {}", .0.display())]
    LockConflict(PathBuf),

    #[error("unexpected pid '{found}' in {}, expected: {expected}", .path.display())]
    LockIntegrity {
        path: PathBuf,
        found: String,
        expected: u32,
    },

    #[error("not a directory: {}", .0.display())]
    WorkspaceNotFound(PathBuf),

    #[error("chaos action '{command}' failed: {reason}")]
    Fault { command: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HavocError>;
