//! Locating a Gobo Eiffel installation and its tools.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ToolchainError;

/// Environment variable naming the installation root.
pub const GOBO_ENV: &str = "GOBO";

/// Tools shipped in `<root>/bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Gec,
    Gelint,
    Gedoc,
    Gelsp,
}

impl Tool {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gec => "gec",
            Self::Gelint => "gelint",
            Self::Gedoc => "gedoc",
            Self::Gelsp => "gelsp",
        }
    }

    /// File name of the tool on this platform.
    #[must_use]
    pub fn file_name(self) -> String {
        executable_file_name(self.name())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `name` with the platform executable suffix (`.exe` on Windows).
#[must_use]
pub fn executable_file_name(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

/// Root directory of a Gobo Eiffel installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoboInstallation {
    root: PathBuf,
}

impl GoboInstallation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the installation: `configured` root, else `$GOBO`, else the
    /// directory above the `bin/` that holds `gec` on `PATH`.
    pub fn locate(configured: Option<&Path>) -> Result<Self, ToolchainError> {
        Self::locate_from(configured, std::env::var_os(GOBO_ENV), || {
            which::which(Tool::Gec.name()).ok()
        })
    }

    fn locate_from(
        configured: Option<&Path>,
        gobo_env: Option<OsString>,
        find_gec: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<Self, ToolchainError> {
        if let Some(root) = configured.filter(|p| !p.as_os_str().is_empty()) {
            tracing::debug!(root = %root.display(), "using configured Gobo Eiffel root");
            return Ok(Self::new(root));
        }
        if let Some(root) = gobo_env.filter(|v| !v.is_empty()) {
            tracing::debug!(root = ?root, "using $GOBO");
            return Ok(Self::new(root));
        }
        let gec = find_gec().ok_or(ToolchainError::NoInstallation)?;
        let root = gec
            .parent()
            .and_then(Path::parent)
            .ok_or(ToolchainError::NoInstallation)?;
        tracing::debug!(root = %root.display(), "found gec on PATH");
        Ok(Self::new(root))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    #[must_use]
    pub fn tool_path(&self, tool: Tool) -> PathBuf {
        self.bin_dir().join(tool.file_name())
    }

    /// Path of `tool`, checked to exist and be executable.
    pub fn require(&self, tool: Tool) -> Result<PathBuf, ToolchainError> {
        let path = self.tool_path(tool);
        check_executable(&path, tool.name())?;
        Ok(path)
    }

    /// Variables for programs run on behalf of the user: `GOBO` and `PATH`
    /// with `<root>/bin` in front.
    #[must_use]
    pub fn user_environment(&self, path: Option<OsString>) -> Vec<(OsString, OsString)> {
        let bin = self.bin_dir();
        let mut entries = vec![bin.clone()];
        if let Some(existing) = path.as_ref().filter(|p| !p.is_empty()) {
            entries.extend(std::env::split_paths(existing));
        }
        let joined = std::env::join_paths(&entries).unwrap_or_else(|e| {
            tracing::debug!("cannot join PATH entries: {e}");
            bin.into_os_string()
        });
        vec![
            (OsString::from(GOBO_ENV), self.root.clone().into_os_string()),
            (OsString::from("PATH"), joined),
        ]
    }
}

/// Fails with `NotFound` or `NotExecutable` unless `path` can be spawned.
pub fn check_executable(path: &Path, what: &str) -> Result<(), ToolchainError> {
    let metadata = std::fs::metadata(path).map_err(|_| ToolchainError::NotFound {
        tool: what.to_string(),
        path: path.to_path_buf(),
    })?;
    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(ToolchainError::NotExecutable {
            tool: what.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}
