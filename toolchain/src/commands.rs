//! The user-facing toolchain operations: compile, lint and run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::error::{RunError, ToolchainError};
use crate::gedoc::{Gedoc, create_ecf_args};
use crate::installation::{GoboInstallation, Tool, check_executable, executable_file_name};
use crate::runner::{RunContext, RunOutcome, RunRequest, StopSignal};
use crate::sink::{DiagnosticsSink, DisplaySink};

/// Inputs of [`Toolchain::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileJob {
    /// ECF file, or a single Eiffel class file.
    pub file: PathBuf,
    pub target: Option<String>,
    pub options: Vec<String>,
    /// Where `gec` runs and writes the executable.
    pub build_dir: PathBuf,
    pub env: Vec<(OsString, OsString)>,
}

/// Inputs of [`Toolchain::lint`].
#[derive(Debug, Clone, Default)]
pub struct LintJob {
    pub file: PathBuf,
    pub target: Option<String>,
    pub options: Vec<String>,
    pub env: Vec<(OsString, OsString)>,
}

/// Inputs of [`Toolchain::run`].
#[derive(Debug, Clone, Default)]
pub struct RunJob {
    /// File the system was compiled from.
    pub file: PathBuf,
    pub target: Option<String>,
    pub build_dir: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(OsString, OsString)>,
}

/// Entry point for driving the tools of one installation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    installation: GoboInstallation,
}

impl Toolchain {
    #[must_use]
    pub fn new(installation: GoboInstallation) -> Self {
        Self { installation }
    }

    #[must_use]
    pub fn installation(&self) -> &GoboInstallation {
        &self.installation
    }

    pub fn gedoc(&self) -> Result<Gedoc, ToolchainError> {
        Gedoc::from_installation(&self.installation)
    }

    /// Compile `job.file` with `gec`, streaming output to the context sinks.
    pub async fn compile<D: DisplaySink, P: DiagnosticsSink>(
        &self,
        ctx: &mut RunContext<D, P>,
        job: &CompileJob,
        stop: Option<StopSignal>,
    ) -> Result<RunOutcome, ToolchainError> {
        let request = self.compile_request(job).await?;
        let outcome = ctx.run(&request, stop).await?;
        log_outcome(Tool::Gec, &outcome);
        Ok(outcome)
    }

    /// Lint `job.file` with `gelint`, streaming output to the context sinks.
    pub async fn lint<D: DisplaySink, P: DiagnosticsSink>(
        &self,
        ctx: &mut RunContext<D, P>,
        job: &LintJob,
        stop: Option<StopSignal>,
    ) -> Result<RunOutcome, ToolchainError> {
        let request = self.lint_request(job).await?;
        let outcome = ctx.run(&request, stop).await?;
        log_outcome(Tool::Gelint, &outcome);
        Ok(outcome)
    }

    /// `gec [--target=T] <options…> <file>` in the build directory.
    pub async fn compile_request(&self, job: &CompileJob) -> Result<RunRequest, ToolchainError> {
        let gec = self.installation.require(Tool::Gec)?;
        let label = self.target_label(&job.file, job.target.as_deref()).await;
        Ok(RunRequest::new(gec)
            .args(target_arg(job.target.as_deref()))
            .args(&job.options)
            .arg(absolute(&job.file))
            .current_dir(&job.build_dir)
            .envs(job.env.iter().cloned())
            .banner(format!("Compiling {label}{}...", job.file.display())))
    }

    /// `gelint [--target=T] <options…> --flat <file>` next to the file.
    pub async fn lint_request(&self, job: &LintJob) -> Result<RunRequest, ToolchainError> {
        let gelint = self.installation.require(Tool::Gelint)?;
        let label = self.target_label(&job.file, job.target.as_deref()).await;
        let cwd = if job.file.exists() {
            job.file
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        } else {
            PathBuf::from(".")
        };
        Ok(RunRequest::new(gelint)
            .args(target_arg(job.target.as_deref()))
            .args(&job.options)
            .arg("--flat")
            .arg(absolute(&job.file))
            .current_dir(cwd)
            .envs(job.env.iter().cloned())
            .banner(format!("Linting {label}{}...", job.file.display())))
    }

    /// Run the compiled system with inherited stdio and wait for it.
    ///
    /// The command line is shown on `display` before the program starts.
    pub async fn run(
        &self,
        display: &mut impl DisplaySink,
        job: &RunJob,
    ) -> Result<ExitStatus, ToolchainError> {
        let program = self.executable_path(job).await?;
        let full_path = job.working_dir.join(&program);
        check_executable(&full_path, &program.display().to_string())?;

        display.append_line(&display_command_line(&shown_program(&program), &job.args));

        let mut cmd = Command::new(&full_path);
        cmd.args(&job.args)
            .current_dir(&job.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .envs(job.env.iter().cloned())
            .envs(
                self.installation
                    .user_environment(std::env::var_os("PATH")),
            );
        tracing::debug!(program = %full_path.display(), args = ?job.args, "running compiled system");

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: full_path.clone(),
            source,
        })?;
        let status = child.wait().await.map_err(RunError::Wait)?;
        Ok(status)
    }

    /// Compile, then run only if compilation exited with code 0.
    pub async fn compile_and_run<D: DisplaySink, P: DiagnosticsSink>(
        &self,
        ctx: &mut RunContext<D, P>,
        compile: &CompileJob,
        run: &RunJob,
        stop: Option<StopSignal>,
    ) -> Result<(RunOutcome, Option<ExitStatus>), ToolchainError> {
        let outcome = self.compile(ctx, compile, stop).await?;
        if !outcome.success() {
            return Ok((outcome, None));
        }
        let status = self.run(ctx.display(), run).await?;
        Ok((outcome, Some(status)))
    }

    /// Let `gedoc` interactively create an ECF file for the class in `file`.
    ///
    /// The command line is shown on `display`; the tool then talks to the user
    /// on the inherited terminal.
    pub async fn create_ecf(
        &self,
        display: &mut impl DisplaySink,
        file: &Path,
    ) -> Result<ExitStatus, ToolchainError> {
        let gedoc = self.gedoc()?;
        let file = absolute(file);
        let args: Vec<String> = create_ecf_args(&file)
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        display.append_line(&display_command_line(
            &gedoc.program().display().to_string(),
            &args,
        ));
        let env = self
            .installation
            .user_environment(std::env::var_os("PATH"));
        Ok(gedoc.create_ecf(&file, &env).await?)
    }

    /// Path of the executable relative to the working directory (or absolute
    /// when the build directory is).
    async fn executable_path(&self, job: &RunJob) -> Result<PathBuf, ToolchainError> {
        let gedoc = self.gedoc()?;
        let name = gedoc
            .executable_name(&absolute(&job.file), job.target.as_deref())
            .await
            .ok_or_else(|| ToolchainError::UnknownExecutable {
                file: job.file.clone(),
            })?;
        let exe = PathBuf::from(executable_file_name(&name));
        if job.build_dir == job.working_dir {
            Ok(exe)
        } else {
            Ok(job.build_dir.join(exe))
        }
    }

    /// `'<target>' from ` for the banner: the explicit target, or the ECF
    /// default target when compiling a system rather than a class file.
    async fn target_label(&self, file: &Path, target: Option<&str>) -> String {
        if let Some(target) = target {
            return format!("'{target}' from ");
        }
        if is_class_file(file) {
            return String::new();
        }
        let gedoc = match self.gedoc() {
            Ok(gedoc) => gedoc,
            Err(e) => {
                tracing::debug!("no default target lookup: {e}");
                return String::new();
            }
        };
        match gedoc.default_target(&absolute(file)).await {
            Some(target) => format!("'{target}' from "),
            None => String::new(),
        }
    }
}

/// A single Eiffel class file, as opposed to an ECF system file.
#[must_use]
pub fn is_class_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "e")
}

fn target_arg(target: Option<&str>) -> Option<String> {
    target.map(|t| format!("--target={t}"))
}

/// Absolute form of `path`; the tools run in other directories.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Program as a user would type it: relative paths get a `./` prefix.
fn shown_program(program: &Path) -> String {
    let text = program.display().to_string();
    let prefix = if cfg!(windows) { ".\\" } else { "./" };
    if program.is_absolute() || text.starts_with(prefix) {
        text
    } else {
        format!("{prefix}{text}")
    }
}

fn log_outcome(tool: Tool, outcome: &RunOutcome) {
    if outcome.cancelled() {
        tracing::info!(%tool, "stopped");
    } else if let Some(code) = outcome.exit_code().filter(|code| *code != 0) {
        tracing::info!(%tool, code, "failed with code {code}");
    }
}

/// Shell-style rendering of a command line for display.
///
/// Arguments are quoted only when needed. The `--name=` part of long options
/// is never escaped.
#[must_use]
pub fn display_command_line(program: &str, args: &[String]) -> String {
    let mut line = quote_arg(program);
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg));
    }
    line
}

fn quote_arg(arg: &str) -> String {
    match split_long_option(arg) {
        Some((option, "")) => option.to_string(),
        Some((option, value)) => format!("{option}{}", quote_word(value)),
        None => quote_word(arg),
    }
}

fn quote_word(word: &str) -> String {
    match shlex::try_quote(word) {
        Ok(quoted) => quoted.into_owned(),
        Err(e) => {
            tracing::debug!("cannot quote {word:?} for display: {e}");
            word.to_string()
        }
    }
}

/// `--name=value` → (`--name=`, `value`).
fn split_long_option(arg: &str) -> Option<(&str, &str)> {
    let rest = arg.strip_prefix("--")?;
    let eq = rest.find('=')?;
    let name = &rest[..eq];
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    Some(arg.split_at(eq + 3))
}
