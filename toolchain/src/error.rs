use std::path::PathBuf;

/// Which output stream of the child failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// Transport failure of a toolchain run. The in-progress diagnostic, if any,
/// is dropped.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read {stream} of child process: {source}")]
    Stream {
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Failure to locate or drive a Gobo Eiffel tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("Gobo Eiffel installation not found (set GOBO or [toolchain] gobo in the config)")]
    NoInstallation,
    #[error("{tool} not found: {path:?}")]
    NotFound { tool: String, path: PathBuf },
    #[error("{tool} is not executable: {path:?}")]
    NotExecutable { tool: String, path: PathBuf },
    #[error("Cannot determine the executable name of {file:?}")]
    UnknownExecutable { file: PathBuf },
    #[error(transparent)]
    Run(#[from] RunError),
}
