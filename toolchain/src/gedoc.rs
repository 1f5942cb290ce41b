//! ECF queries answered by `gedoc`.
//!
//! Each query is a short-lived `gedoc` run whose stdout is read in one go.
//! Any failure (spawn error, non-zero exit, empty answer) is reported as
//! `None`: callers fall back to not knowing the target or executable.
//!
//! [`Gedoc::create_ecf`] is the exception: it is interactive and talks to the
//! user on the inherited terminal.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::error::{RunError, ToolchainError};
use crate::installation::{GoboInstallation, Tool};

/// Handle on the `gedoc` executable of an installation.
#[derive(Debug, Clone)]
pub struct Gedoc {
    program: PathBuf,
}

impl Gedoc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `gedoc` of `installation`, checked to be executable.
    pub fn from_installation(installation: &GoboInstallation) -> Result<Self, ToolchainError> {
        installation.require(Tool::Gedoc).map(Self::new)
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Targets declared in the ECF file, in declaration order.
    pub async fn available_targets(&self, ecf: &Path) -> Option<Vec<String>> {
        let stdout = self
            .query(&[
                "--format=available_targets".into(),
                "--no-benchmark".into(),
                ecf.as_os_str().to_owned(),
            ])
            .await?;
        parse_targets(&stdout)
    }

    /// Target used when none is given: the last one of the ECF file.
    pub async fn default_target(&self, ecf: &Path) -> Option<String> {
        self.available_targets(ecf)
            .await
            .and_then(|mut targets| targets.pop())
    }

    /// Name (without directory or platform suffix) of the executable built
    /// from `file` and `target`.
    pub async fn executable_name(&self, file: &Path, target: Option<&str>) -> Option<String> {
        let mut args = vec![OsString::from("--format=executable_name")];
        if let Some(target) = target {
            args.push(format!("--target={target}").into());
        }
        args.push("--no-benchmark".into());
        args.push(file.as_os_str().to_owned());
        let stdout = self.query(&args).await?;
        parse_first_line(&stdout)
    }

    /// Interactively write an ECF file for the root class in `file`.
    ///
    /// Runs next to `file` with inherited stdio and waits for it.
    pub async fn create_ecf(
        &self,
        file: &Path,
        env: &[(OsString, OsString)],
    ) -> Result<ExitStatus, RunError> {
        let cwd = file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tracing::debug!(program = %self.program.display(), file = %file.display(), "creating ECF file");
        let mut child = Command::new(&self.program)
            .args(create_ecf_args(file))
            .current_dir(cwd)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        child.wait().await.map_err(RunError::Wait)
    }

    async fn query(&self, args: &[OsString]) -> Option<String> {
        tracing::debug!(program = %self.program.display(), ?args, "running gedoc query");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                tracing::debug!(status = %output.status, "gedoc query failed");
                None
            }
            Err(e) => {
                tracing::debug!("cannot run gedoc: {e}");
                None
            }
        }
    }
}

pub(crate) fn create_ecf_args(file: &Path) -> Vec<OsString> {
    vec![
        "--format=ecf_pretty_print".into(),
        "--interactive".into(),
        file.as_os_str().to_owned(),
    ]
}

/// One target per non-empty line; `None` if there are none.
fn parse_targets(stdout: &str) -> Option<Vec<String>> {
    let targets: Vec<String> = stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    (!targets.is_empty()).then_some(targets)
}

fn parse_first_line(stdout: &str) -> Option<String> {
    let first = stdout.lines().next()?.trim_end_matches('\r');
    (!first.is_empty()).then(|| first.to_string())
}
