use std::io;
use std::ops::Range;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Why a single block failed.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("invalid file mode '{0}': expected an octal permission value")]
    InvalidMode(String),
    #[error("createFile block '{0}' has no path")]
    MissingPath(String),
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("shell execution failed: {0}")]
    ShellExecution(#[from] ShellFailure),
}

impl ExecutionError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| ExecutionError::Io { path, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShellFailure {
    #[error("could not start '{}': {source}", .script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("script {0}")]
    Exit(ExitStatus),
    #[error("could not relay script output: {0}")]
    Output(#[source] io::Error),
}

/// A block failure enriched with which block failed and where it lives in
/// source.
#[derive(Debug, thiserror::Error)]
#[error("block {} ('{name}') failed: {error}", .index + 1)]
pub struct RunError {
    /// Zero-based position of the block in the runbook.
    pub index: usize,
    pub name: String,
    pub span: Range<usize>,
    pub source_id: usize,
    #[source]
    pub error: ExecutionError,
}
