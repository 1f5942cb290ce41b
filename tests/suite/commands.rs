//! Compile, lint and run against a fake installation.

#![cfg(unix)]

use std::path::{Path, PathBuf};

use gobo_toolchain::{
    CompileJob, GoboInstallation, LintJob, MemoryDisplay, RunJob, Toolchain, ToolchainError,
};

use crate::common::{fake_installation, memory_context, write_script};

/// Prints where it runs and what it was given.
const ECHO_TOOL: &str = r#"echo "cwd=$(pwd -P)"
for arg in "$@"; do echo "arg=$arg"; done"#;

const GEDOC: &str = r#"case "$1" in
  --format=available_targets) printf 'lib\napp\n' ;;
  --format=executable_name) echo hello ;;
  --format=ecf_pretty_print) echo "$2 $GOBO" > created.out ;;
  *) exit 1 ;;
esac"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    project: PathBuf,
}

impl Fixture {
    fn new(gec: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("gobo");
        fake_installation(
            &root,
            &[("gec", gec), ("gelint", ECHO_TOOL), ("gedoc", GEDOC)],
        );
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("app.ecf"), "<system/>").unwrap();
        std::fs::write(project.join("main.e"), "class MAIN end").unwrap();
        Self {
            _dir: dir,
            root,
            project,
        }
    }

    fn toolchain(&self) -> Toolchain {
        Toolchain::new(GoboInstallation::new(&self.root))
    }

    fn compile_job(&self, file: &str) -> CompileJob {
        CompileJob {
            file: self.project.join(file),
            build_dir: self.project.clone(),
            ..CompileJob::default()
        }
    }

    fn run_job(&self) -> RunJob {
        RunJob {
            file: self.project.join("app.ecf"),
            build_dir: self.project.clone(),
            working_dir: self.project.clone(),
            args: vec!["--name=world".to_string()],
            ..RunJob::default()
        }
    }
}

fn physical(path: &Path) -> String {
    path.canonicalize().unwrap().display().to_string()
}

fn args(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("arg="))
        .collect()
}

#[tokio::test]
async fn compile_passes_target_options_and_absolute_file() {
    let fixture = Fixture::new(ECHO_TOOL);
    let build = fixture.project.join("build");
    std::fs::create_dir_all(&build).unwrap();
    let job = CompileJob {
        target: Some("app".to_string()),
        options: vec!["--finalize".to_string()],
        build_dir: build.clone(),
        ..fixture.compile_job("app.ecf")
    };

    let mut ctx = memory_context();
    let outcome = fixture
        .toolchain()
        .compile(&mut ctx, &job, None)
        .await
        .unwrap();
    assert!(outcome.success());

    let file = fixture.project.join("app.ecf");
    let lines = ctx.display().lines();
    assert_eq!(
        lines[0],
        format!("Compiling 'app' from {}...", file.display())
    );
    assert_eq!(lines[1], format!("cwd={}", physical(&build)));
    assert_eq!(
        args(lines),
        ["--target=app", "--finalize", file.to_str().unwrap()]
    );
}

#[tokio::test]
async fn compile_banner_uses_ecf_default_target() {
    let fixture = Fixture::new(ECHO_TOOL);
    let mut ctx = memory_context();
    fixture
        .toolchain()
        .compile(&mut ctx, &fixture.compile_job("app.ecf"), None)
        .await
        .unwrap();

    let file = fixture.project.join("app.ecf");
    assert_eq!(
        ctx.display().lines()[0],
        format!("Compiling 'app' from {}...", file.display())
    );
    // The default target is only shown, never passed.
    assert_eq!(args(ctx.display().lines()), [file.to_str().unwrap()]);
}

#[tokio::test]
async fn compile_banner_of_class_file_has_no_target() {
    let fixture = Fixture::new(ECHO_TOOL);
    let mut ctx = memory_context();
    fixture
        .toolchain()
        .compile(&mut ctx, &fixture.compile_job("main.e"), None)
        .await
        .unwrap();

    let file = fixture.project.join("main.e");
    assert_eq!(
        ctx.display().lines()[0],
        format!("Compiling {}...", file.display())
    );
}

#[tokio::test]
async fn compile_collects_diagnostics() {
    let gec = "printf '[VEEN] class MAIN (1,7): unknown identifier.\\n\\tclass MAIN: main.e\\n----\\n'\nexit 1";
    let fixture = Fixture::new(gec);
    let mut ctx = memory_context().publish_diagnostics(true);
    let outcome = fixture
        .toolchain()
        .compile(&mut ctx, &fixture.compile_job("main.e"), None)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), Some(1));
    assert_eq!(outcome.diagnostics().total_count(), 1);
    assert_eq!(ctx.publisher().get("main.e").unwrap()[0].code(), Some("VEEN"));
}

#[tokio::test]
async fn lint_runs_next_to_the_file_with_flat() {
    let fixture = Fixture::new(ECHO_TOOL);
    let job = LintJob {
        file: fixture.project.join("main.e"),
        options: vec!["--void".to_string()],
        ..LintJob::default()
    };

    let mut ctx = memory_context();
    fixture
        .toolchain()
        .lint(&mut ctx, &job, None)
        .await
        .unwrap();

    let lines = ctx.display().lines();
    assert_eq!(lines[0], format!("Linting {}...", job.file.display()));
    assert_eq!(lines[1], format!("cwd={}", physical(&fixture.project)));
    assert_eq!(
        args(lines),
        ["--void", "--flat", job.file.to_str().unwrap()]
    );
}

#[tokio::test]
async fn missing_compiler_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = Toolchain::new(GoboInstallation::new(dir.path()));
    let job = CompileJob {
        file: dir.path().join("app.ecf"),
        build_dir: dir.path().to_path_buf(),
        ..CompileJob::default()
    };

    let err = toolchain
        .compile(&mut memory_context(), &job, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolchainError::NotFound { .. }));
}

#[tokio::test]
async fn run_executes_with_gobo_environment() {
    let fixture = Fixture::new(ECHO_TOOL);
    write_script(
        &fixture.project,
        "hello",
        "echo \"$GOBO $1\" > run.out\nexit 7",
    );

    let mut display = MemoryDisplay::new();
    let status = fixture
        .toolchain()
        .run(&mut display, &fixture.run_job())
        .await
        .unwrap();

    assert_eq!(status.code(), Some(7));
    assert_eq!(display.lines(), ["./hello --name=world"]);
    let written = std::fs::read_to_string(fixture.project.join("run.out")).unwrap();
    assert_eq!(
        written.trim_end(),
        format!("{} --name=world", fixture.root.display())
    );
}

#[tokio::test]
async fn run_without_executable_fails() {
    let fixture = Fixture::new(ECHO_TOOL);
    let err = fixture
        .toolchain()
        .run(&mut MemoryDisplay::new(), &fixture.run_job())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolchainError::NotFound { .. }));
}

#[tokio::test]
async fn compile_and_run_skips_run_after_failed_compile() {
    let fixture = Fixture::new("echo broken\nexit 2");
    write_script(&fixture.project, "hello", "exit 0");

    let mut ctx = memory_context();
    let (outcome, status) = fixture
        .toolchain()
        .compile_and_run(&mut ctx, &fixture.compile_job("app.ecf"), &fixture.run_job(), None)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), Some(2));
    assert!(status.is_none());
}

#[tokio::test]
async fn compile_and_run_runs_after_successful_compile() {
    let fixture = Fixture::new("echo compiled");
    write_script(&fixture.project, "hello", "exit 0");

    let mut ctx = memory_context();
    let (outcome, status) = fixture
        .toolchain()
        .compile_and_run(&mut ctx, &fixture.compile_job("app.ecf"), &fixture.run_job(), None)
        .await
        .unwrap();

    assert!(outcome.success());
    assert_eq!(status.unwrap().code(), Some(0));
    assert_eq!(
        ctx.display().lines().last().unwrap(),
        "./hello --name=world"
    );
}

#[tokio::test]
async fn create_ecf_runs_gedoc_next_to_the_file() {
    let fixture = Fixture::new(ECHO_TOOL);
    let file = fixture.project.join("main.e");

    let mut display = MemoryDisplay::new();
    let status = fixture
        .toolchain()
        .create_ecf(&mut display, &file)
        .await
        .unwrap();

    assert!(status.success());
    assert!(display.lines()[0].ends_with(&format!(
        "gedoc --format=ecf_pretty_print --interactive {}",
        file.display()
    )));
    let written = std::fs::read_to_string(fixture.project.join("created.out")).unwrap();
    assert_eq!(
        written.trim_end(),
        format!("--interactive {}", fixture.root.display())
    );
}
