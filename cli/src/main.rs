//! `gobo` - drive the Gobo Eiffel compiler, linter and compiled systems from
//! the command line.
//!
//! Tool output is echoed to stdout as it arrives. Diagnostics parsed from it
//! are written to stderr when publishing is enabled (`--publish-diagnostics`
//! or `[toolchain] publish_diagnostics` in the config).
//!
//! Exit status: the tool's own exit code, 1 when it was killed, 2 when it
//! could not be run at all.

mod report;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{IsTerminal, Stderr, Stdout, stderr, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gobo_config::{EnvExpander, GoboConfig, expand_env_vars};
use gobo_toolchain::{
    CompileJob, GoboInstallation, LintJob, RunContext, RunJob, RunOutcome, StopSignal, Toolchain,
    WriterDisplay, is_class_file, stop_channel,
};

use report::{DiagnosticFormat, StreamDiagnostics};

/// Filter directives for logging, e.g. `GOBO_LOG=gobo_toolchain=trace`.
const LOG_ENV: &str = "GOBO_LOG";

/// Exit status when the tool could not be run.
const EXIT_FAILURE_TO_RUN: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "gobo", version, about = "Gobo Eiffel toolchain driver")]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write diagnostics to stderr as they are parsed.
    #[arg(long, global = true)]
    publish_diagnostics: bool,

    /// Format of diagnostics written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = DiagnosticFormat::Text)]
    format: DiagnosticFormat,

    /// Gobo Eiffel installation root (overrides the config and $GOBO).
    #[arg(long, global = true)]
    gobo: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile an ECF file or Eiffel class file with gec.
    Compile(CompileArgs),
    /// Check an ECF file or Eiffel class file with gelint.
    Lint(LintArgs),
    /// Run an already compiled system.
    Run(RunArgs),
    /// Compile, then run if compilation succeeded.
    CompileAndRun(CompileAndRunArgs),
    /// List the targets of an ECF file; the last one is the default.
    Targets {
        file: PathBuf,
    },
    /// Interactively create an ECF file for the root class in an Eiffel file.
    CreateEcf {
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct CompileArgs {
    file: PathBuf,
    #[arg(long)]
    target: Option<String>,
    /// Where gec runs (default: directory of FILE).
    #[arg(long)]
    build_dir: Option<PathBuf>,
    /// Extra gec options, after `--`.
    #[arg(last = true)]
    options: Vec<String>,
}

#[derive(Debug, Args)]
struct LintArgs {
    file: PathBuf,
    #[arg(long)]
    target: Option<String>,
    /// Extra gelint options, after `--`.
    #[arg(last = true)]
    options: Vec<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    build_dir: Option<PathBuf>,
    /// Where the system runs (default: directory of FILE).
    #[arg(long)]
    working_dir: Option<PathBuf>,
    /// Arguments for the system, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct CompileAndRunArgs {
    file: PathBuf,
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    build_dir: Option<PathBuf>,
    #[arg(long)]
    working_dir: Option<PathBuf>,
    /// Extra gec option (repeatable).
    #[arg(long = "option", allow_hyphen_values = true)]
    options: Vec<String>,
    /// Arguments for the system, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(stderr().is_terminal())
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

/// Directory of `file` when it exists, else the current directory.
fn default_dir(file: &Path) -> PathBuf {
    if file.exists()
        && let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty())
    {
        return parent.to_path_buf();
    }
    PathBuf::from(".")
}

/// Configured ECF targets only apply to ECF files, never to class files.
fn configured_target(file: &Path, configured: Option<String>) -> Option<String> {
    configured.filter(|_| !is_class_file(file))
}

fn env_pairs(env: &BTreeMap<String, String>) -> Vec<(OsString, OsString)> {
    env.iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect()
}

type CliContext = RunContext<WriterDisplay<Stdout>, StreamDiagnostics<Stderr>>;

/// Everything resolved before a subcommand runs.
struct Session {
    config: GoboConfig,
    toolchain: Toolchain,
    publish_diagnostics: bool,
    format: DiagnosticFormat,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let raw = GoboConfig::load().context("loading configuration")?;
        let configured_root = raw
            .gobo_root()
            .map(|root| PathBuf::from(expand_env_vars(&root.to_string_lossy())));
        let installation =
            GoboInstallation::locate(cli.gobo.as_deref().or(configured_root.as_deref()))?;
        tracing::debug!(root = %installation.root().display(), "Gobo Eiffel installation");

        let expander =
            EnvExpander::from_env().gobo_fallback(installation.root().to_string_lossy());
        let config = raw.expanded(&expander);
        let publish_diagnostics = cli.publish_diagnostics || config.publish_diagnostics();

        Ok(Self {
            config,
            toolchain: Toolchain::new(installation),
            publish_diagnostics,
            format: cli.format,
        })
    }

    fn context(&self) -> CliContext {
        RunContext::new(
            WriterDisplay::new(stdout()),
            StreamDiagnostics::new(stderr(), self.format),
        )
        .publish_diagnostics(self.publish_diagnostics)
    }

    fn compile_job(
        &self,
        file: &Path,
        target: Option<String>,
        build_dir: Option<PathBuf>,
        extra: &[String],
    ) -> CompileJob {
        let section = self.config.compile.clone().unwrap_or_default();
        let mut options = section.options;
        options.extend_from_slice(extra);
        CompileJob {
            file: file.to_path_buf(),
            target: target.or_else(|| configured_target(file, section.ecf_target)),
            options,
            build_dir: build_dir
                .or(section.build_dir.map(PathBuf::from))
                .unwrap_or_else(|| default_dir(file)),
            env: env_pairs(&section.environment),
        }
    }

    fn lint_job(&self, args: LintArgs) -> LintJob {
        let section = self.config.lint.clone().unwrap_or_default();
        let mut options = section.options;
        options.extend(args.options);
        LintJob {
            target: args
                .target
                .or_else(|| configured_target(&args.file, section.ecf_target)),
            options,
            env: env_pairs(&section.environment),
            file: args.file,
        }
    }

    fn run_job(
        &self,
        file: &Path,
        target: Option<String>,
        build_dir: Option<PathBuf>,
        working_dir: Option<PathBuf>,
        args: Vec<String>,
    ) -> RunJob {
        let section = self.config.run.clone().unwrap_or_default();
        let compile_build_dir = self
            .config
            .compile
            .as_ref()
            .and_then(|c| c.build_dir.clone());
        RunJob {
            file: file.to_path_buf(),
            target: target.or_else(|| configured_target(file, section.ecf_target)),
            build_dir: build_dir
                .or(section.build_dir.map(PathBuf::from))
                .or(compile_build_dir.map(PathBuf::from))
                .unwrap_or_else(|| default_dir(file)),
            working_dir: working_dir
                .or(section.working_dir.map(PathBuf::from))
                .unwrap_or_else(|| default_dir(file)),
            args: if args.is_empty() { section.args } else { args },
            env: env_pairs(&section.environment),
        }
    }
}

/// Stop the running tool on Ctrl-C.
fn stop_on_ctrl_c() -> StopSignal {
    let (handle, signal) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            handle.stop();
        }
    });
    signal
}

fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

fn report_outcome(what: &str, outcome: &RunOutcome) -> ExitCode {
    let diagnostics = outcome.diagnostics();
    tracing::info!(
        files = diagnostics.file_count(),
        count = diagnostics.total_count(),
        "diagnostics parsed"
    );
    if outcome.cancelled() {
        eprintln!("{what} stopped");
        return ExitCode::FAILURE;
    }
    match outcome.exit_code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => {
            eprintln!("{what} failed with code {code}");
            exit_code(Some(code))
        }
        None => {
            eprintln!("{what} was terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let session = Session::open(&cli)?;
    let toolchain = &session.toolchain;

    match cli.command {
        Command::Compile(args) => {
            let job = session.compile_job(&args.file, args.target, args.build_dir, &args.options);
            let mut ctx = session.context();
            let outcome = toolchain
                .compile(&mut ctx, &job, Some(stop_on_ctrl_c()))
                .await?;
            Ok(report_outcome("Compilation", &outcome))
        }
        Command::Lint(args) => {
            let job = session.lint_job(args);
            let mut ctx = session.context();
            let outcome = toolchain
                .lint(&mut ctx, &job, Some(stop_on_ctrl_c()))
                .await?;
            Ok(report_outcome("Linting", &outcome))
        }
        Command::Run(args) => {
            let job = session.run_job(
                &args.file,
                args.target,
                args.build_dir,
                args.working_dir,
                args.args,
            );
            let mut display = WriterDisplay::new(stdout());
            let status = toolchain.run(&mut display, &job).await?;
            Ok(exit_code(status.code()))
        }
        Command::CompileAndRun(args) => {
            let compile = session.compile_job(
                &args.file,
                args.target.clone(),
                args.build_dir.clone(),
                &args.options,
            );
            let run = session.run_job(
                &args.file,
                args.target,
                args.build_dir,
                args.working_dir,
                args.args,
            );
            let mut ctx = session.context();
            let (outcome, status) = toolchain
                .compile_and_run(&mut ctx, &compile, &run, Some(stop_on_ctrl_c()))
                .await?;
            match status {
                Some(status) => Ok(exit_code(status.code())),
                None => Ok(report_outcome("Compilation", &outcome)),
            }
        }
        Command::Targets { file } => {
            let gedoc = toolchain.gedoc()?;
            let Some(targets) = gedoc.available_targets(&file).await else {
                bail!("no targets found in {}", file.display());
            };
            for target in targets {
                println!("{target}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CreateEcf { file } => {
            let mut display = WriterDisplay::new(stdout());
            let status = toolchain.create_ecf(&mut display, &file).await?;
            Ok(exit_code(status.code()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE_TO_RUN)
        }
    }
}
